//! Integration tests for the generation pipeline.
//!
//! Everything runs against the in-memory stores and a scripted fetcher, so
//! no network access is needed.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, Rgba};
use orderform::{
    build_artifact, generate, generate_to_file, inspect_artifact, Backend, BlobFetcher, BlobStore,
    FetchedBlob, GenerationConfig, MemoryBlobStore, MemoryRecordStore, OrderFormError,
    RecordStore, ResourceError, SourceRecord, StoreError,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route the crate's logs to the test output; set `RUST_LOG` to see more.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("orderform=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([30, 120, 200])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
        width,
        height,
        Rgba([10, 200, 10, 128]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

enum Reply {
    Ok(Vec<u8>, &'static str),
    Status(u16),
}

/// Scripted fetcher. Unknown URLs fail at the transport level.
#[derive(Default)]
struct ScriptedFetcher {
    replies: HashMap<String, Reply>,
}

impl ScriptedFetcher {
    fn with(mut self, url: &str, reply: Reply) -> Self {
        self.replies.insert(url.to_string(), reply);
        self
    }
}

#[async_trait]
impl BlobFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBlob, StoreError> {
        // Vary latency so completions interleave.
        tokio::time::sleep(Duration::from_millis(url.len() as u64 % 7 * 3)).await;
        match self.replies.get(url) {
            Some(Reply::Ok(bytes, ct)) => Ok(FetchedBlob {
                bytes: bytes.clone(),
                content_type: Some(ct.to_string()),
            }),
            Some(Reply::Status(status)) => Err(StoreError::Http {
                status: *status,
                body: "nope".into(),
            }),
            None => Err(StoreError::Transport("connection refused".into())),
        }
    }
}

fn config_with(fetcher: ScriptedFetcher) -> GenerationConfig {
    GenerationConfig::builder()
        .fetcher(Arc::new(fetcher))
        .fetch_concurrency(3)
        .build()
        .unwrap()
}

fn memory_backend(records: &[SourceRecord]) -> (Arc<MemoryRecordStore>, Arc<MemoryBlobStore>, Backend) {
    let store = Arc::new(MemoryRecordStore::new());
    for r in records {
        store.insert(r.clone());
    }
    let blobs = Arc::new(MemoryBlobStore::new("https://cdn.example/enquiry-pdfs"));
    let backend = Backend::new(store.clone(), blobs.clone());
    (store, blobs, backend)
}

fn asha() -> SourceRecord {
    SourceRecord {
        name: Some("Asha".into()),
        contact: Some("9999999999".into()),
        location: Some("Kochi".into()),
        service: Some("Renovation".into()),
        area_sq_ft: Some(1200.0),
        requirements: Some("Open kitchen, 2BHK, budget paint".into()),
        image_urls: vec![
            "https://img.example/ok.jpg".into(),
            "https://img.example/missing.jpg".into(),
        ],
        ..SourceRecord::new("asha-1")
    }
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack
        .windows(needle.len())
        .any(|w| w == needle.as_bytes())
}

fn position(haystack: &[u8], needle: &str) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w == needle.as_bytes())
}

// ── Structure ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn zero_images_gives_one_page_and_consistent_xref() {
    init_logging();
    let record = SourceRecord::new("empty");
    let built = build_artifact(&record, &GenerationConfig::default())
        .await
        .unwrap();
    assert_eq!(built.page_count, 1);

    let summary = inspect_artifact(&built.bytes).unwrap();
    assert_eq!(summary.page_count, 1);
    assert_eq!(summary.offsets.len() as u32, summary.object_count);
    assert!(contains(&built.bytes, &format!("/Size {}", summary.object_count + 1)));
    // Every field falls back to the placeholder.
    assert!(contains(&built.bytes, "(N/A) Tj"));
}

#[tokio::test]
async fn failed_images_are_omitted_and_order_is_kept() {
    init_logging();
    let urls = [
        "https://img.example/a.jpg",
        "https://img.example/404.jpg",
        "https://img.example/b.png",
        "https://img.example/unreachable.jpg",
        "https://img.example/c.jpg",
    ];
    let fetcher = ScriptedFetcher::default()
        .with(urls[0], Reply::Ok(jpeg(11, 7), "image/jpeg"))
        .with(urls[1], Reply::Status(404))
        .with(urls[2], Reply::Ok(png(22, 7), "image/png"))
        .with(urls[4], Reply::Ok(jpeg(33, 7), "image/jpeg"));
    let record = SourceRecord {
        image_urls: urls.iter().map(|u| u.to_string()).collect(),
        ..SourceRecord::new("mixed")
    };

    let built = build_artifact(&record, &config_with(fetcher)).await.unwrap();
    assert_eq!(built.page_count, 1 + 3);
    assert_eq!(built.stats.images_requested, 5);
    assert_eq!(built.stats.images_embedded, 3);
    assert_eq!(
        built.skipped.iter().map(ResourceError::index).collect::<Vec<_>>(),
        vec![1, 3]
    );

    let summary = inspect_artifact(&built.bytes).unwrap();
    assert_eq!(summary.page_count, 4);
    assert_eq!(summary.image_count, 3);

    let a = position(&built.bytes, "/Width 11 ").unwrap();
    let b = position(&built.bytes, "/Width 22 ").unwrap();
    let c = position(&built.bytes, "/Width 33 ").unwrap();
    assert!(a < b && b < c);
    assert!(contains(&built.bytes, "/Filter /FlateDecode"));
    assert!(contains(&built.bytes, "(5 \\(3 embedded\\)) Tj"));
}

#[tokio::test]
async fn offsets_round_trip_with_a_decode_failure() {
    init_logging();
    let mut fetcher = ScriptedFetcher::default();
    let mut urls = Vec::new();
    for i in 0..5 {
        let url = format!("https://img.example/{i}.jpg");
        let reply = if i == 2 {
            Reply::Ok(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00], "image/jpeg")
        } else {
            Reply::Ok(jpeg(20 + i, 10), "image/jpeg")
        };
        fetcher = fetcher.with(&url, reply);
        urls.push(url);
    }
    let record = SourceRecord {
        image_urls: urls,
        ..asha()
    };

    let built = build_artifact(&record, &config_with(fetcher)).await.unwrap();
    assert_eq!(built.page_count, 5);
    assert!(matches!(
        built.skipped.as_slice(),
        [ResourceError::DecodeFailed { index: 2, .. }]
    ));

    let summary = inspect_artifact(&built.bytes).unwrap();
    for (i, &offset) in summary.offsets.iter().enumerate() {
        let marker = format!("{} 0 obj", i + 1);
        assert_eq!(&built.bytes[offset..offset + marker.len()], marker.as_bytes());
    }
}

#[tokio::test]
async fn stream_lengths_match_payloads() {
    init_logging();
    let fetcher = ScriptedFetcher::default()
        .with("https://img.example/x.jpg", Reply::Ok(jpeg(64, 48), "image/jpeg"));
    let record = SourceRecord {
        image_urls: vec!["https://img.example/x.jpg".into()],
        requirements: Some("word ".repeat(200)),
        ..SourceRecord::new("long")
    };
    let built = build_artifact(&record, &config_with(fetcher)).await.unwrap();

    let bytes = &built.bytes;
    let mut from = 0;
    let mut streams = 0;
    while let Some(rel) = position(&bytes[from..], "/Length ") {
        let start = from + rel + "/Length ".len();
        let digits: String = bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .map(|&b| b as char)
            .collect();
        let declared: usize = digits.parse().unwrap();
        let data = start + position(&bytes[start..], "stream\n").unwrap() + "stream\n".len();
        assert_eq!(&bytes[data + declared..data + declared + 10], b"\nendstream");
        streams += 1;
        from = data + declared;
    }
    // Two content streams and one image.
    assert_eq!(streams, 3);
}

// ── Publishing ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn asha_scenario() {
    init_logging();
    let record = asha();
    let (records, blobs, backend) = memory_backend(&[record.clone()]);
    let fetcher = ScriptedFetcher::default()
        .with(&record.image_urls[0], Reply::Ok(jpeg(800, 400), "image/jpeg"))
        .with(&record.image_urls[1], Reply::Status(404));

    let output = generate("asha-1", &backend, &config_with(fetcher))
        .await
        .unwrap();

    assert_eq!(output.page_count, 2);
    assert_eq!(output.path, "asha-1/order-form.pdf");
    assert_eq!(
        output.url,
        "https://cdn.example/enquiry-pdfs/asha-1/order-form.pdf"
    );
    assert!(output.record_updated);
    assert_eq!(output.skipped.len(), 1);
    assert!(matches!(
        output.skipped[0],
        ResourceError::HttpStatus { index: 1, status: 404, .. }
    ));

    let stored = blobs.get("asha-1/order-form.pdf").unwrap();
    assert_eq!(stored.len(), output.bytes);
    for text in [
        "(Name:)",
        "(Phone:)",
        "(Location:)",
        "(Service:)",
        "(Area:)",
        "(Requirements:)",
        "(Date:)",
        "(Asha)",
        "(9999999999)",
        "(Kochi)",
        "(Renovation)",
        "(1200 sq.ft)",
        "(Open kitchen, 2BHK, budget paint)",
    ] {
        assert!(contains(&stored, text), "missing {text}");
    }
    // 800x400 scaled to the 495pt printable width, centred vertically.
    assert!(contains(&stored, "q 495 0 0 247.5 50 297.25 cm /Im1 Do Q"));

    let summary = inspect_artifact(&stored).unwrap();
    assert_eq!(summary.page_count, 2);
    assert_eq!(
        records.snapshot("asha-1").unwrap().artifact_url.as_deref(),
        Some(output.url.as_str())
    );
}

#[tokio::test]
async fn regenerating_overwrites_the_same_path() {
    init_logging();
    let mut record = SourceRecord::new("again");
    record.name = Some("First".into());
    let (records, blobs, backend) = memory_backend(&[record.clone()]);
    let config = GenerationConfig::default();

    let first = generate("again", &backend, &config).await.unwrap();
    record.name = Some("Second".into());
    records.insert(record);
    let second = generate("again", &backend, &config).await.unwrap();

    assert_eq!(first.url, second.url);
    assert_eq!(blobs.paths(), vec!["again/order-form.pdf".to_string()]);
    let stored = blobs.get("again/order-form.pdf").unwrap();
    assert!(inspect_artifact(&stored).is_ok());
    assert!(contains(&stored, "(Second)"));
    assert!(!contains(&stored, "(First)"));
}

#[tokio::test]
async fn unknown_record_is_an_error_with_no_upload() {
    init_logging();
    let (_, blobs, backend) = memory_backend(&[]);
    let err = generate("missing", &backend, &GenerationConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFormError::RecordNotFound { ref id } if id == "missing"));
    assert!(blobs.paths().is_empty());
}

#[tokio::test]
async fn invalid_record_id_is_rejected_before_io() {
    init_logging();
    let (_, blobs, backend) = memory_backend(&[]);
    let err = generate("../../etc/passwd", &backend, &GenerationConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFormError::InvalidRecordId { .. }));
    assert!(blobs.paths().is_empty());
}

struct RejectingBlobStore;

#[async_trait]
impl BlobStore for RejectingBlobStore {
    async fn put(&self, _path: &str, _bytes: Vec<u8>, _ct: &str) -> Result<String, StoreError> {
        Err(StoreError::Http {
            status: 507,
            body: "bucket full".into(),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://cdn.example/{path}")
    }
}

#[tokio::test]
async fn publish_failure_is_distinct_and_skips_write_back() {
    init_logging();
    let records = Arc::new(MemoryRecordStore::new());
    records.insert(SourceRecord::new("r1"));
    let backend = Backend::new(records.clone(), Arc::new(RejectingBlobStore));

    let err = generate("r1", &backend, &GenerationConfig::default())
        .await
        .unwrap_err();
    match err {
        OrderFormError::PublishFailed { path, bytes, .. } => {
            assert_eq!(path, "r1/order-form.pdf");
            assert!(bytes > 0);
        }
        other => panic!("expected PublishFailed, got {other:?}"),
    }
    assert_eq!(records.snapshot("r1").unwrap().artifact_url, None);
}

/// Serves reads but refuses every write.
struct ReadOnlyRecords(SourceRecord);

#[async_trait]
impl RecordStore for ReadOnlyRecords {
    async fn get(&self, id: &str) -> Result<Option<SourceRecord>, StoreError> {
        Ok((id == self.0.id).then(|| self.0.clone()))
    }

    async fn set_artifact_url(&self, _id: &str, _url: &str) -> Result<(), StoreError> {
        Err(StoreError::Transport("read-only replica".into()))
    }
}

#[tokio::test]
async fn write_back_failure_does_not_fail_generation() {
    init_logging();
    let blobs = Arc::new(MemoryBlobStore::default());
    let backend = Backend::new(
        Arc::new(ReadOnlyRecords(SourceRecord::new("ro"))),
        blobs.clone(),
    );
    let output = generate("ro", &backend, &GenerationConfig::default())
        .await
        .unwrap();
    assert!(!output.record_updated);
    assert!(blobs.get("ro/order-form.pdf").is_some());
}

// ── File output ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn generate_to_file_writes_atomically() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("form.pdf");

    let built = generate_to_file(&asha_without_images(), &path, &GenerationConfig::default())
        .await
        .unwrap();

    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(on_disk, built.bytes);
    assert!(!path.with_extension("pdf.tmp").exists());
    assert_eq!(inspect_artifact(&on_disk).unwrap().page_count, 1);
}

fn asha_without_images() -> SourceRecord {
    SourceRecord {
        image_urls: Vec::new(),
        ..asha()
    }
}

#[test]
fn output_serialises_to_json() {
    let err = ResourceError::HttpStatus {
        index: 1,
        url: "https://img.example/missing.jpg".into(),
        status: 404,
    };
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["HttpStatus"]["status"], 404);
}
