//! Configuration for the PDF speech server
//!
//! Everything is read from the environment. Provider credentials have no
//! defaults and must be supplied explicitly.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default PlayAI streaming synthesis endpoint
pub const DEFAULT_TTS_URL: &str = "https://api.play.ai/v1/tts/stream";
/// Default PlayAI model identifier
pub const DEFAULT_TTS_MODEL: &str = "PlayDialog";

/// Settings for the remote text-to-speech provider
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Synthesis endpoint
    pub api_url: Url,
    /// Secret sent in the `AUTHORIZATION` header
    pub api_key: String,
    /// Account id sent in the `X-USER-ID` header
    pub user_id: String,
    /// Model identifier placed in every request body
    pub model: String,
    /// Upper bound for one synthesis round trip (default: 60s)
    pub timeout: Duration,
    /// Largest audio payload accepted from the provider (default: 50MB)
    pub max_audio_bytes: u64,
}

impl SpeechConfig {
    /// Build a provider config from explicit credentials and defaults for the rest
    pub fn new(api_key: impl Into<String>, user_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_url: parse_url(DEFAULT_TTS_URL)?,
            api_key: api_key.into(),
            user_id: user_id.into(),
            model: DEFAULT_TTS_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            max_audio_bytes: 50 * 1024 * 1024,
        })
    }
}

/// HTTP server and session limits
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted upload size in bytes (default: 100MB)
    pub max_upload_bytes: usize,
    /// Maximum number of concurrent reading sessions (default: 100)
    pub max_sessions: usize,
    /// Idle time after which a session is discarded (default: 1 hour)
    pub session_idle_timeout: Duration,
    /// How often expired sessions are swept (default: 5 minutes)
    pub cleanup_interval: Duration,
    /// Byte budget for cached rendered pages (default: 256MB)
    pub frame_cache_bytes: usize,
    /// Maximum number of cached rendered pages (default: 64)
    pub frame_cache_entries: usize,
    /// Extra directory searched first for the PDFium library
    pub pdfium_library_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_bytes: 100 * 1024 * 1024,
            max_sessions: 100,
            session_idle_timeout: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(300),
            frame_cache_bytes: 256 * 1024 * 1024,
            frame_cache_entries: 64,
            pdfium_library_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config {
                reason: format!("Invalid listen address {}:{}: {}", self.host, self.port, e),
            })
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub speech: SpeechConfig,
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Load configuration from the environment, with variables from an env
    /// file at `path` filling in anything the process does not set.
    /// A missing file is not an error.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut vars = read_env_file(path.as_ref())?;
        vars.extend(std::env::vars());
        Self::from_vars(vars)
    }

    /// Load configuration from a variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).map(str::to_string).ok_or_else(|| Error::Config {
                reason: format!("{} must be set", key),
            })
        };

        let mut speech = SpeechConfig::new(required("PLAYAI_API_KEY")?, required("PLAYAI_USER_ID")?)?;
        if let Some(url) = get("PLAYAI_API_URL") {
            speech.api_url = parse_url(url)?;
        }
        if let Some(model) = get("PLAYAI_MODEL") {
            speech.model = model.to_string();
        }
        if let Some(secs) = get("TTS_TIMEOUT_SECS") {
            speech.timeout = Duration::from_secs(parse_number("TTS_TIMEOUT_SECS", secs)?);
        }
        if let Some(bytes) = get("MAX_AUDIO_BYTES") {
            speech.max_audio_bytes = parse_number("MAX_AUDIO_BYTES", bytes)?;
        }

        let mut server = ServerConfig::default();
        if let Some(host) = get("READER_HOST") {
            server.host = host.to_string();
        }
        if let Some(port) = get("READER_PORT") {
            server.port = parse_number("READER_PORT", port)?;
        }
        if let Some(bytes) = get("MAX_UPLOAD_BYTES") {
            server.max_upload_bytes = parse_number("MAX_UPLOAD_BYTES", bytes)?;
        }
        if let Some(max) = get("MAX_SESSIONS") {
            server.max_sessions = parse_number("MAX_SESSIONS", max)?;
        }
        if let Some(secs) = get("SESSION_IDLE_SECS") {
            server.session_idle_timeout =
                Duration::from_secs(parse_number("SESSION_IDLE_SECS", secs)?);
        }
        if let Some(bytes) = get("FRAME_CACHE_BYTES") {
            server.frame_cache_bytes = parse_number("FRAME_CACHE_BYTES", bytes)?;
        }
        server.pdfium_library_dir = get("PDFIUM_LIBRARY_DIR").map(PathBuf::from);

        Ok(Self { server, speech })
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let invalid = |e: dotenvy::Error| Error::Config {
        reason: format!("Invalid env file {}: {}", path.display(), e),
    };
    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter.collect::<std::result::Result<_, _>>().map_err(invalid),
        Err(e) if e.not_found() => Ok(HashMap::new()),
        Err(e) => Err(invalid(e)),
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::Config {
        reason: format!("Invalid URL {}: {}", raw, e),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config {
            reason: format!("Unsupported URL scheme: {}", other),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| Error::Config {
        reason: format!("{} must be a number, got {:?}", key, raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_sessions, 100);
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.session_idle_timeout, Duration::from_secs(3600));
        assert!(config.pdfium_library_dir.is_none());
        assert!(config.socket_addr().is_ok());
    }

    #[test]
    fn test_credentials_required() {
        let result = Config::from_vars(vars(&[("PLAYAI_USER_ID", "user")]));
        assert!(matches!(result, Err(Error::Config { reason }) if reason.contains("PLAYAI_API_KEY")));

        let result = Config::from_vars(vars(&[("PLAYAI_API_KEY", "key"), ("PLAYAI_USER_ID", "  ")]));
        assert!(matches!(result, Err(Error::Config { reason }) if reason.contains("PLAYAI_USER_ID")));
    }

    #[test]
    fn test_from_vars_with_overrides() {
        let config = Config::from_vars(vars(&[
            ("PLAYAI_API_KEY", "ak-test"),
            ("PLAYAI_USER_ID", "user-1"),
            ("PLAYAI_API_URL", "http://127.0.0.1:9000/tts"),
            ("TTS_TIMEOUT_SECS", "5"),
            ("READER_PORT", "8080"),
            ("MAX_SESSIONS", "2"),
            ("PDFIUM_LIBRARY_DIR", "/usr/local/lib/pdfium"),
        ]))
        .unwrap();

        assert_eq!(config.speech.api_key, "ak-test");
        assert_eq!(config.speech.user_id, "user-1");
        assert_eq!(config.speech.api_url.as_str(), "http://127.0.0.1:9000/tts");
        assert_eq!(config.speech.model, DEFAULT_TTS_MODEL);
        assert_eq!(config.speech.timeout, Duration::from_secs(5));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_sessions, 2);
        assert_eq!(
            config.server.pdfium_library_dir,
            Some(PathBuf::from("/usr/local/lib/pdfium"))
        );
    }

    fn write_env_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("reader-{}.env", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_read_env_file() {
        let path = write_env_file(
            "# local credentials\nPLAYAI_API_KEY=file-key\nPLAYAI_MODEL=\"FileModel\"\n",
        );
        let loaded = read_env_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["PLAYAI_API_KEY"], "file-key");
        assert_eq!(loaded["PLAYAI_MODEL"], "FileModel");
    }

    #[test]
    fn test_missing_env_file_is_empty() {
        let path = std::env::temp_dir().join(format!("absent-{}.env", uuid::Uuid::new_v4()));
        assert!(read_env_file(&path).unwrap().is_empty());
    }

    #[test]
    fn test_env_file_feeds_config() {
        let path = write_env_file(
            "PLAYAI_API_KEY=file-key\nPLAYAI_USER_ID=file-user\nREADER_TEST_ONLY=1\n",
        );
        let result = Config::from_env_file(&path);
        std::fs::remove_file(&path).unwrap();

        // Process variables win, so only check the credentials are satisfied
        let config = result.unwrap();
        assert!(!config.speech.api_key.is_empty());
        assert!(!config.speech.user_id.is_empty());
    }

    #[test]
    fn test_malformed_env_file_rejected() {
        let path = write_env_file("PLAYAI_API_KEY='unterminated\n");
        let result = read_env_file(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(Error::Config { reason }) if reason.contains("Invalid env file")));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = [("PLAYAI_API_KEY", "k"), ("PLAYAI_USER_ID", "u")];

        let mut bad_port = base.to_vec();
        bad_port.push(("READER_PORT", "eighty"));
        assert!(Config::from_vars(vars(&bad_port)).is_err());

        let mut bad_url = base.to_vec();
        bad_url.push(("PLAYAI_API_URL", "ftp://example.com/tts"));
        assert!(Config::from_vars(vars(&bad_url)).is_err());
    }
}
