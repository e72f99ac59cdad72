//! Session registry with idle expiry

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::session::{ReaderSession, SessionPhase};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub type SharedSession = Arc<Mutex<ReaderSession>>;

/// One line of the session listing
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub phase: SessionPhase,
    pub document: Option<String>,
    pub current_page: u32,
    pub total_pages: u32,
}

pub struct SessionManager {
    sessions: RwLock<HashMap<String, SharedSession>>,
    max_sessions: usize,
    idle_timeout: Duration,
    cleanup_interval: Duration,
}

impl SessionManager {
    pub fn new(max_sessions: usize, idle_timeout: Duration, cleanup_interval: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            idle_timeout,
            cleanup_interval,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.max_sessions,
            config.session_idle_timeout,
            config.cleanup_interval,
        )
    }

    /// Spawn the periodic expiry sweep.
    ///
    /// Send `true` on the returned channel to stop it.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let manager = Arc::clone(self);
        let interval = manager.cleanup_interval;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let removed = manager.cleanup_expired();
                        if removed > 0 {
                            tracing::info!(
                                removed,
                                remaining = manager.count(),
                                "expired sessions removed"
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    pub fn create(&self) -> Result<(String, SharedSession)> {
        let mut sessions = self.sessions.write();

        if sessions.len() >= self.max_sessions {
            self.remove_expired(&mut sessions);
            if sessions.len() >= self.max_sessions {
                return Err(Error::SessionLimit {
                    max: self.max_sessions,
                });
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(ReaderSession::new(id.clone())));
        sessions.insert(id.clone(), Arc::clone(&session));

        tracing::info!(session = %id, "session created");
        Ok((id, session))
    }

    /// Look a session up and mark it active
    pub fn get(&self, id: &str) -> Result<SharedSession> {
        let session = self
            .sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound { id: id.to_string() })?;
        session.lock().touch();
        Ok(session)
    }

    /// Close and forget a session, returning the id of the document it held
    pub fn remove(&self, id: &str) -> Result<Option<String>> {
        let session = self
            .sessions
            .write()
            .remove(id)
            .ok_or_else(|| Error::SessionNotFound { id: id.to_string() })?;

        let mut session = session.lock();
        let document_id = session.document().map(|doc| doc.id().to_string());
        session.close();
        tracing::info!(session = %id, "session removed");
        Ok(document_id)
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .values()
            .map(|session| {
                let session = session.lock();
                SessionSummary {
                    id: session.id().to_string(),
                    phase: session.phase(),
                    document: session.document().map(|doc| doc.name().to_string()),
                    current_page: session.current_page(),
                    total_pages: session.total_pages(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Drop sessions idle for longer than the timeout
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        self.remove_expired(&mut sessions)
    }

    fn remove_expired(&self, sessions: &mut HashMap<String, SharedSession>) -> usize {
        let timeout = self.idle_timeout;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.lock().is_expired(timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(session) = sessions.remove(id) {
                session.lock().close();
                tracing::info!(session = %id, "session expired");
            }
        }
        expired.len()
    }
}
