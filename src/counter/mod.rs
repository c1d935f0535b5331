use std::future::Future;

use snafu::{Location, ResultExt, Snafu};
use url::Url;

use crate::config::{Config, CounterMode};
use crate::error::{ApplicationError, ConnectStoreSnafu};
use crate::model::Counts;

pub mod backend;
pub mod script;

pub use backend::BackendCounter;
pub use script::{PublishedCounters, ScriptCounter};

pub type Result<T, E = CounterError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CounterError {
    #[snafu(display("counting script has not published usable counters"))]
    ScriptUnavailable {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot connect to the view store `{url}` at {location}: {source}"))]
    StoreConnection {
        url: Url,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to query the view store at {location}: {source}"))]
    StoreQuery {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to deserialize the view store response at {location}: {source}"))]
    StoreDeserialize {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("view store returned an empty response at {location}"))]
    EmptyResponse {
        #[snafu(implicit)]
        location: Location,
    },
}

impl CounterError {
    /// True for the script-mode degradation, where the widget shows the
    /// "unknown" token instead of the failure label.
    pub fn is_unavailable_dependency(&self) -> bool {
        matches!(self, CounterError::ScriptUnavailable { .. })
    }
}

/// A source of view counts for a given page path.
pub trait Source {
    fn counts(&self, path: &str) -> impl Future<Output = Result<Counts>> + Send;
}

/// The counting strategy this deployment runs with. Selected once from the
/// configuration; the two variants are never active at the same time.
#[derive(Debug, Clone)]
pub enum Counter {
    Script(ScriptCounter),
    Backend(BackendCounter),
}

impl Counter {
    pub async fn counts(&self, path: &str) -> Result<Counts> {
        match self {
            Counter::Script(script) => script.counts(path).await,
            Counter::Backend(backend) => backend.counts(path).await,
        }
    }
}

pub async fn connect(config: &Config) -> Result<Counter, ApplicationError> {
    match config.mode {
        CounterMode::Script => Ok(Counter::Script(ScriptCounter::new(
            PublishedCounters::default(),
        ))),
        CounterMode::Backend => {
            let backend = BackendCounter::connect(&backend::StoreConfig::fixed())
                .await
                .context(ConnectStoreSnafu)?;
            Ok(Counter::Backend(backend))
        }
    }
}
