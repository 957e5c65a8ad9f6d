use crate::age::AgeParseMode;
use crate::error::Result;
use crate::record::Record;
use crate::source::DataSource;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct Entry {
    fetched_at: Instant,
    records: Arc<Vec<Record>>,
}

/// Short-TTL cache over the single global dataset.
///
/// Every request used to refetch the sheet; this keeps one fetched copy for
/// `ttl` and hands out shared references. Staleness is explicit: the TTL is
/// visible configuration and [`DatasetCache::invalidate`] drops the copy
/// immediately. Concurrent refreshes may both fetch; last writer wins, which
/// is harmless for an immutable snapshot.
pub struct DatasetCache {
    ttl: Duration,
    slot: Mutex<Option<Entry>>,
}

impl DatasetCache {
    pub fn new(ttl: Duration) -> DatasetCache {
        DatasetCache {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// The current dataset, fetched through `source` if the cached copy is
    /// missing or older than the TTL.
    pub async fn records(
        &self,
        source: &DataSource,
        mode: AgeParseMode,
    ) -> Result<Arc<Vec<Record>>> {
        {
            let slot = self.slot.lock().expect("cache lock poisoned");
            if let Some(entry) = slot.as_ref() {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&entry.records));
                }
            }
        }
        // Lock released while the fetch is in flight.
        let records = Arc::new(source.fetch(mode).await?);
        let mut slot = self.slot.lock().expect("cache lock poisoned");
        *slot = Some(Entry {
            fetched_at: Instant::now(),
            records: Arc::clone(&records),
        });
        Ok(records)
    }

    /// Drop the cached copy so the next request refetches.
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().expect("cache lock poisoned");
        *slot = None;
        log::debug!("dataset cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_source(body: &str) -> (tempfile::NamedTempFile, DataSource) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        let source = DataSource::CsvFile {
            path: file.path().to_path_buf(),
        };
        (file, source)
    }

    const ONE_ROW: &str = "Make,TYPE OF DAMPER,Age,Test Result\nKONI,X,400,FAIL\n";
    const TWO_ROWS: &str =
        "Make,TYPE OF DAMPER,Age,Test Result\nKONI,X,400,FAIL\nSACHS,Y,800,PASS\n";

    #[tokio::test]
    async fn serves_cached_copy_within_ttl() {
        let (file, source) = csv_source(ONE_ROW);
        let cache = DatasetCache::new(Duration::from_secs(60));
        let first = cache.records(&source, AgeParseMode::Lenient).await.unwrap();
        assert_eq!(first.len(), 1);

        // Grow the file; within the TTL the cache must not notice.
        std::fs::write(file.path(), TWO_ROWS).unwrap();
        let second = cache.records(&source, AgeParseMode::Lenient).await.unwrap();
        assert_eq!(second.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let (file, source) = csv_source(ONE_ROW);
        let cache = DatasetCache::new(Duration::from_secs(60));
        cache.records(&source, AgeParseMode::Lenient).await.unwrap();

        std::fs::write(file.path(), TWO_ROWS).unwrap();
        cache.invalidate();
        let refreshed = cache.records(&source, AgeParseMode::Lenient).await.unwrap();
        assert_eq!(refreshed.len(), 2);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let (file, source) = csv_source(ONE_ROW);
        let cache = DatasetCache::new(Duration::ZERO);
        cache.records(&source, AgeParseMode::Lenient).await.unwrap();
        std::fs::write(file.path(), TWO_ROWS).unwrap();
        let refreshed = cache.records(&source, AgeParseMode::Lenient).await.unwrap();
        assert_eq!(refreshed.len(), 2);
    }

    #[tokio::test]
    async fn fetch_errors_are_not_cached() {
        let (file, source) = csv_source("Make,Age\nbad,table\n");
        let cache = DatasetCache::new(Duration::from_secs(60));
        assert!(cache.records(&source, AgeParseMode::Lenient).await.is_err());

        std::fs::write(file.path(), ONE_ROW).unwrap();
        let recovered = cache.records(&source, AgeParseMode::Lenient).await.unwrap();
        assert_eq!(recovered.len(), 1);
    }
}
