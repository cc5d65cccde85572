use catalog_search::config::SearchServiceConfig;
use catalog_search::search::memory::{MemoryBackend, RefreshPolicy};
use catalog_search::search::{SearchBackend, SearchService, StaticEntityRegistry};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Entity types registered by [`Harness`], in declaration order.
#[allow(dead_code)]
pub const ENTITY_TYPES: &[&str] = &["testEntity", "dataset", "chart", "corpuser"];

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// Test entity URN of the form `urn:li:testEntity:(id,urn_part,VALUE)`.
#[allow(dead_code)]
pub fn test_urn(key_part: &str, urn_part: &str, value: &str) -> String {
    format!("urn:li:testEntity:({key_part},{urn_part},{value})")
}

/// A search document for `urn` with the given extra fields merged in.
#[allow(dead_code)]
pub fn document(urn: &str, fields: Value) -> Value {
    let mut doc = json!({ "urn": urn });
    if let (Some(target), Value::Object(extra)) = (doc.as_object_mut(), fields) {
        target.extend(extra);
    }
    doc
}

/// A service over a fresh [`MemoryBackend`], with the backend kept for direct writes.
#[allow(dead_code)]
pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub service: SearchService,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with(RefreshPolicy::Immediate, SearchServiceConfig::default())
    }

    pub fn with(policy: RefreshPolicy, config: SearchServiceConfig) -> Self {
        let backend = Arc::new(MemoryBackend::with_refresh_policy(policy));
        let service = SearchService::from_config(
            &config,
            Arc::new(StaticEntityRegistry::new(ENTITY_TYPES.iter().copied())),
            backend.clone(),
        );
        Self { backend, service }
    }

    /// Write straight to the backend, bypassing cache invalidation.
    pub fn upsert_raw(&self, entity_type: &str, doc_id: &str, doc: &Value) {
        self.backend
            .upsert_document(entity_type, &doc.to_string(), doc_id)
            .expect("upsert");
    }

    /// Write through the service, which invalidates both caches.
    pub fn upsert(&self, entity_type: &str, doc_id: &str, doc: &Value) {
        self.service
            .upsert_document(entity_type, &doc.to_string(), doc_id)
            .expect("upsert");
    }
}

#[allow(dead_code)]
pub struct TempFixtureDir {
    pub dir: TempDir,
}

#[allow(dead_code)]
impl TempFixtureDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Write `contents` to `name` inside the directory and return its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }
}
