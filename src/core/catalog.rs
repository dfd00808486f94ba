//! Fund catalog snapshot and the cache manager that keeps it fresh.

use crate::core::error::{FundError, StoreError};
use crate::store::document::JsonDocument;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_TTL_HOURS: i64 = 48;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    /// Display name; this is the text substring queries match against.
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub searchable_aliases: Vec<String>,
}

impl CatalogEntry {
    pub fn matches(&self, query: &str, include_aliases: bool) -> bool {
        self.code == query
            || self.name.contains(query)
            || (include_aliases && self.searchable_aliases.iter().any(|a| a.contains(query)))
    }
}

/// A complete catalog as fetched at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(rename = "expires", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "data")]
    pub entries: Vec<CatalogEntry>,
}

impl CatalogSnapshot {
    pub fn new(entries: Vec<CatalogEntry>, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            expires_at: fetched_at + ttl,
            entries,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Entries whose name contains `query` or whose code equals it. Unbounded.
    pub fn filter(&self, query: &str, include_aliases: bool) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.matches(query, include_aliases))
            .collect()
    }
}

/// Source of the canonical fund catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, FundError>;
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    document: JsonDocument<CatalogSnapshot>,
    ttl: Duration,
    serve_stale_on_error: bool,
    clock: Clock,
    current: Mutex<Option<Arc<CatalogSnapshot>>>,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn CatalogSource>, document: JsonDocument<CatalogSnapshot>) -> Self {
        Self {
            source,
            document,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
            serve_stale_on_error: false,
            clock: Arc::new(Utc::now),
            current: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_serve_stale_on_error(mut self, enabled: bool) -> Self {
        self.serve_stale_on_error = enabled;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns a snapshot that has not expired, refetching the whole catalog when
    /// the held or persisted one is absent or expired.
    pub async fn ensure_fresh(&self) -> Result<Arc<CatalogSnapshot>, FundError> {
        let mut current = self.current.lock().await;
        let now = (self.clock)();

        if let Some(snapshot) = current.as_ref().filter(|s| s.is_fresh(now)) {
            debug!("Catalog HIT (memory)");
            return Ok(Arc::clone(snapshot));
        }

        let persisted = match self.document.read() {
            Ok(snapshot) => snapshot,
            Err(StoreError::Corrupt { path, source }) => {
                warn!(error = %source, "Catalog document {} is corrupt", path.display());
                self.document.quarantine()?;
                None
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(snapshot) = persisted {
            if snapshot.is_fresh(now) {
                debug!("Catalog HIT (disk), {} entries", snapshot.entries.len());
                let snapshot = Arc::new(snapshot);
                *current = Some(Arc::clone(&snapshot));
                return Ok(snapshot);
            }
            debug!("Catalog expired at {}", snapshot.expires_at);
            *current = Some(Arc::new(snapshot));
        }

        self.refetch(&mut current, now).await
    }

    /// Refetches the catalog regardless of freshness.
    pub async fn refresh(&self) -> Result<Arc<CatalogSnapshot>, FundError> {
        let mut current = self.current.lock().await;
        let now = (self.clock)();
        self.refetch(&mut current, now).await
    }

    async fn refetch(
        &self,
        current: &mut Option<Arc<CatalogSnapshot>>,
        now: DateTime<Utc>,
    ) -> Result<Arc<CatalogSnapshot>, FundError> {
        let entries = match self.source.fetch_catalog().await {
            Ok(entries) => entries,
            Err(e) => {
                if self.serve_stale_on_error
                    && let Some(stale) = current.as_ref()
                {
                    warn!(error = %e, "Catalog refresh failed, serving stale snapshot");
                    return Ok(Arc::clone(stale));
                }
                return Err(e);
            }
        };

        let snapshot = CatalogSnapshot::new(entries, now, self.ttl);
        self.document.write(&snapshot)?;
        info!(
            "Catalog refreshed with {} entries, expires at {}",
            snapshot.entries.len(),
            snapshot.expires_at
        );

        let snapshot = Arc::new(snapshot);
        *current = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};

    struct MockSource {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl MockSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl CatalogSource for MockSource {
        async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, FundError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(FundError::upstream("connection refused"));
            }
            Ok(vec![
                entry("110022", "易方达消费行业"),
                entry("000001", &format!("华夏成长混合{n}")),
            ])
        }
    }

    fn entry(code: &str, name: &str) -> CatalogEntry {
        CatalogEntry {
            code: code.to_string(),
            name: name.to_string(),
            category: "股票型".to_string(),
            searchable_aliases: vec![format!("ALIAS{code}")],
        }
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Fixture {
        _dir: TempDir,
        source: Arc<MockSource>,
        now: Arc<std::sync::Mutex<DateTime<Utc>>>,
        path: std::path::PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let path = dir.path().join("catalog.json");
            Self {
                _dir: dir,
                source: MockSource::new(),
                now: Arc::new(std::sync::Mutex::new(start())),
                path,
            }
        }

        fn cache(&self) -> CatalogCache {
            let now = Arc::clone(&self.now);
            CatalogCache::new(self.source.clone(), JsonDocument::new(&self.path))
                .with_clock(Arc::new(move || *now.lock().unwrap()))
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }

        fn calls(&self) -> usize {
            self.source.calls.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_first_use_fetches_and_persists() {
        let fx = Fixture::new();
        let cache = fx.cache();

        let snapshot = cache.ensure_fresh().await.unwrap();
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.expires_at, start() + Duration::hours(48));
        assert_eq!(fx.calls(), 1);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&fx.path).unwrap()).unwrap();
        assert_eq!(
            raw["expires"].as_i64().unwrap(),
            (start() + Duration::hours(48)).timestamp_millis()
        );
        assert_eq!(raw["data"][0]["code"], "110022");
    }

    #[tokio::test]
    async fn test_snapshot_reused_until_expiry_then_replaced() {
        let fx = Fixture::new();
        let cache = fx.cache();

        let first = cache.ensure_fresh().await.unwrap();
        fx.advance(Duration::hours(48) - Duration::milliseconds(1));
        let second = cache.ensure_fresh().await.unwrap();
        assert_eq!(fx.calls(), 1);
        assert_eq!(first, second);

        fx.advance(Duration::milliseconds(1));
        let third = cache.ensure_fresh().await.unwrap();
        assert_eq!(fx.calls(), 2);
        assert_eq!(third.entries[1].name, "华夏成长混合1");
        assert_eq!(third.expires_at, start() + Duration::hours(96));
    }

    #[tokio::test]
    async fn test_persisted_snapshot_is_used_by_new_cache() {
        let fx = Fixture::new();
        fx.cache().ensure_fresh().await.unwrap();

        let snapshot = fx.cache().ensure_fresh().await.unwrap();
        assert_eq!(fx.calls(), 1);
        assert_eq!(snapshot.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_without_snapshot_is_upstream_unavailable() {
        let fx = Fixture::new();
        fx.source.fail.store(true, Ordering::SeqCst);

        let err = fx.cache().ensure_fresh().await.unwrap_err();
        assert!(matches!(err, FundError::UpstreamUnavailable(_)));
        assert!(!fx.path.exists());
    }

    #[tokio::test]
    async fn test_expired_snapshot_not_served_on_failure_by_default() {
        let fx = Fixture::new();
        let cache = fx.cache();
        cache.ensure_fresh().await.unwrap();

        fx.advance(Duration::hours(49));
        fx.source.fail.store(true, Ordering::SeqCst);
        assert!(cache.ensure_fresh().await.is_err());
    }

    #[tokio::test]
    async fn test_expired_snapshot_served_on_failure_when_enabled() {
        let fx = Fixture::new();
        let cache = fx.cache().with_serve_stale_on_error(true);
        let first = cache.ensure_fresh().await.unwrap();

        fx.advance(Duration::hours(49));
        fx.source.fail.store(true, Ordering::SeqCst);
        let stale = cache.ensure_fresh().await.unwrap();
        assert_eq!(first, stale);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_quarantined_and_refetched() {
        let fx = Fixture::new();
        std::fs::write(&fx.path, "{\"expires\": 12, \"data\": [").unwrap();

        let snapshot = fx.cache().ensure_fresh().await.unwrap();
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(fx.calls(), 1);

        let corrupt = fx.path.with_file_name("catalog.json.corrupt");
        assert!(corrupt.exists());
    }

    #[tokio::test]
    async fn test_refresh_ignores_freshness() {
        let fx = Fixture::new();
        let cache = fx.cache();
        cache.ensure_fresh().await.unwrap();
        cache.refresh().await.unwrap();
        assert_eq!(fx.calls(), 2);
    }

    #[test]
    fn test_filter_matches_name_substring_or_exact_code() {
        let snapshot = CatalogSnapshot::new(
            vec![
                entry("110022", "易方达消费行业"),
                entry("110011", "易方达中小盘"),
                entry("000001", "华夏成长混合"),
            ],
            start(),
            Duration::hours(48),
        );

        let codes = |q: &str| {
            snapshot
                .filter(q, false)
                .iter()
                .map(|e| e.code.as_str())
                .collect::<Vec<_>>()
        };

        assert_eq!(codes("易方达"), vec!["110022", "110011"]);
        assert_eq!(codes("110022"), vec!["110022"]);
        // Partial codes only match through the name.
        assert!(codes("1100").is_empty());
        assert!(codes("zzzz_no_match").is_empty());
        // Case sensitive.
        assert!(codes("alias110022").is_empty());
    }

    #[test]
    fn test_filter_aliases_when_enabled() {
        let snapshot = CatalogSnapshot::new(
            vec![entry("110022", "易方达消费行业")],
            start(),
            Duration::hours(48),
        );
        assert!(snapshot.filter("ALIAS", false).is_empty());
        assert_eq!(snapshot.filter("ALIAS", true).len(), 1);
    }
}
