//! Performance benchmarks for page extraction and rendering
//!
//! Run with: `cargo bench`
//! PDFium benchmarks are skipped when the library cannot be bound.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdf_speech_server::pdf::{
    self, Document, FrameCache, FrameKey, PdfiumBackend, RenderedPage, MAX_SCALE, MIN_SCALE,
};
use std::path::PathBuf;
use std::sync::Arc;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(name);
    path
}

fn load_fixture(name: &str) -> Document {
    let data = std::fs::read(fixture_path(name)).expect("Failed to read fixture");
    Document::from_bytes(name, data).expect("Fixture is not a PDF")
}

fn pdfium() -> Option<PdfiumBackend> {
    let backend = PdfiumBackend::new();
    if backend.is_available() {
        Some(backend)
    } else {
        eprintln!("PDFium not available, skipping PDFium benchmarks");
        None
    }
}

/// Benchmark single-page text extraction
fn bench_text_extraction(c: &mut Criterion) {
    let Some(backend) = pdfium() else { return };
    let document = load_fixture("three_pages.pdf");

    let mut group = c.benchmark_group("text_extraction");
    group.throughput(Throughput::Bytes(document.len() as u64));

    for page in 1..=3u32 {
        group.bench_with_input(BenchmarkId::new("page", page), &page, |b, &page| {
            b.iter(|| pdf::extract(&backend, black_box(&document), page).unwrap());
        });
    }

    group.finish();
}

/// Benchmark page rendering across the zoom range
fn bench_rendering(c: &mut Criterion) {
    let Some(backend) = pdfium() else { return };
    let document = load_fixture("three_pages.pdf");

    let mut group = c.benchmark_group("rendering");
    group.sample_size(20);

    for scale in [MIN_SCALE, 1.5, MAX_SCALE] {
        group.bench_with_input(BenchmarkId::new("scale", scale), &scale, |b, &scale| {
            b.iter(|| pdf::render(&backend, black_box(&document), 1, scale).unwrap());
        });
    }

    group.finish();
}

/// Benchmark PNG encoding of a rendered page
fn bench_png_encoding(c: &mut Criterion) {
    let frame = RenderedPage::blank(1, 1.5, 918, 1188);

    c.bench_function("png_encode_letter_1_5x", |b| {
        b.iter(|| black_box(&frame).to_png().unwrap());
    });
}

/// Benchmark frame cache lookups under eviction pressure
fn bench_frame_cache(c: &mut Criterion) {
    let frame = Arc::new(RenderedPage::blank(1, 1.0, 100, 130));
    let cache = FrameCache::new(16, frame.byte_len() * 16);

    c.bench_function("frame_cache_put_get", |b| {
        let mut page = 0u32;
        b.iter(|| {
            page = page.wrapping_add(1);
            let key = FrameKey::new("bench", page % 32, 1.0);
            if cache.get(&key).is_none() {
                cache.put(key, Arc::clone(&frame));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_text_extraction,
    bench_rendering,
    bench_png_encoding,
    bench_frame_cache
);
criterion_main!(benches);
