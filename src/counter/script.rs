use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use serde::{Deserialize, Serialize};
use snafu::OptionExt;
use tokio::sync::watch;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

use super::{Result, ScriptUnavailableSnafu, Source};
use crate::model::Counts;

/// How often the published slot is checked.
const POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Retries after the initial check; the last one lands at the 800ms mark,
/// the window the legacy widget waited before reading the script's globals.
const POLL_RETRIES: usize = 4;

/// The counters a third-party counting script reports, mirroring the nested
/// shape of the object the script exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScriptCounts {
    pub site: PageViews,
    pub page: PageViews,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageViews {
    pub pv: i64,
}

impl ScriptCounts {
    /// The legacy widget trusted the script's fields only when both were
    /// truthy, so a zero count reads as "not reported yet".
    fn is_reported(&self) -> bool {
        self.site.pv > 0 && self.page.pv > 0
    }
}

/// The slot the counting script publishes into. This service only ever
/// reads it; writes come from the script through the ingest endpoint.
#[derive(Debug, Clone)]
pub struct PublishedCounters {
    slot: Arc<watch::Sender<Option<ScriptCounts>>>,
}

impl Default for PublishedCounters {
    fn default() -> PublishedCounters {
        let (tx, _rx) = watch::channel(None);
        PublishedCounters { slot: Arc::new(tx) }
    }
}

impl PublishedCounters {
    pub fn publish(&self, counts: ScriptCounts) {
        self.slot.send_replace(Some(counts));
    }

    pub fn get(&self) -> Option<ScriptCounts> {
        *self.slot.borrow()
    }
}

/// Reads whatever the counting script has published, giving the script a
/// bounded window to report before degrading.
#[derive(Debug, Clone, new)]
pub struct ScriptCounter {
    counters: PublishedCounters,
}

impl ScriptCounter {
    pub fn counters(&self) -> &PublishedCounters {
        &self.counters
    }
}

struct NotReady;

impl Source for ScriptCounter {
    async fn counts(&self, _path: &str) -> Result<Counts> {
        let strategy = FixedInterval::new(POLL_INTERVAL).take(POLL_RETRIES);
        let reported = Retry::spawn(strategy, || async {
            self.counters
                .get()
                .filter(ScriptCounts::is_reported)
                .ok_or(NotReady)
        })
        .await;

        let counts = reported.ok().context(ScriptUnavailableSnafu)?;

        Ok(Counts {
            site: counts.site.pv,
            page: counts.page.pv,
        })
    }
}
