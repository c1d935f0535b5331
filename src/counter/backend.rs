use once_cell::sync::Lazy;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::Surreal;
use url::Url;

use super::{
    EmptyResponseSnafu, Result, Source, StoreConnectionSnafu, StoreDeserializeSnafu,
    StoreQuerySnafu,
};
use crate::model::{Counts, PageView, VIEWS_TABLE};

const SETUP: &str = include_str!("../../schema.surrealql");

// The view store lives at a fixed endpoint and authenticates with embedded
// application credentials; none of this is deployment configuration.
static STORE_ENDPOINT: Lazy<Url> = Lazy::new(|| {
    "https://views.pages-docs.net"
        .parse()
        .expect("embedded store endpoint is a valid url")
});
const STORE_NAMESPACE: &str = "docs";
const STORE_DATABASE: &str = "views";
const APP_ID: &str = "soroban-docs";
const APP_KEY: &str = "qdQC4mSXKKk3mQgqLUxE6sb1";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub endpoint: Url,
    pub namespace: String,
    pub database: String,
    pub credentials: Option<StoreCredentials>,
}

#[derive(Debug, Clone)]
pub struct StoreCredentials {
    pub username: String,
    pub password: String,
}

impl StoreConfig {
    /// The embedded production configuration.
    pub fn fixed() -> StoreConfig {
        StoreConfig {
            endpoint: STORE_ENDPOINT.clone(),
            namespace: STORE_NAMESPACE.to_string(),
            database: STORE_DATABASE.to_string(),
            credentials: Some(StoreCredentials {
                username: APP_ID.to_string(),
                password: APP_KEY.to_string(),
            }),
        }
    }

    /// An in-process store with no authentication, for tests.
    pub fn ephemeral() -> StoreConfig {
        StoreConfig {
            endpoint: Url::parse("mem://").expect("mem engine url is valid"),
            namespace: STORE_NAMESPACE.to_string(),
            database: STORE_DATABASE.to_string(),
            credentials: None,
        }
    }
}

/// A handle to the remote view store, resolved once at startup and shared
/// for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct BackendCounter {
    db: Surreal<Any>,
}

impl BackendCounter {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let url = || StoreConnectionSnafu {
            url: config.endpoint.clone(),
        };

        let db = surrealdb::engine::any::connect(config.endpoint.as_str())
            .await
            .with_context(|_| url())?;

        if let Some(credentials) = &config.credentials {
            db.signin(auth::Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &credentials.username,
                password: &credentials.password,
            })
            .await
            .with_context(|_| url())?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .with_context(|_| url())?;

        db.query(SETUP).await.context(StoreQuerySnafu)?;

        Ok(Self { db })
    }

    /// Looks up the record tracking the given page path, if one exists yet.
    pub async fn find(&self, path: &str) -> Result<Option<PageView>> {
        let mut response = self
            .db
            .query("SELECT * FROM views WHERE path = $path LIMIT 1")
            .bind(("path", path.to_string()))
            .await
            .context(StoreQuerySnafu)?;

        response.take::<Option<PageView>>(0).context(StoreDeserializeSnafu)
    }

    pub async fn create(&self, view: PageView) -> Result<PageView> {
        tracing::info!(path = %view.path, "creating view record");
        let mut created: Vec<PageView> = self
            .db
            .create(VIEWS_TABLE)
            .content(&view)
            .await
            .context(StoreQuerySnafu)?;
        created.pop().context(EmptyResponseSnafu)
    }

    /// Bumps the record's count by one on the server and persists it.
    pub async fn increment(&self, view: &PageView) -> Result<PageView> {
        tracing::debug!(path = %view.path, count = view.count, "incrementing view record");
        let mut response = self
            .db
            .query("UPDATE $id SET count += 1, updated_at = time::now() RETURN AFTER")
            .bind(("id", view.id.clone()))
            .await
            .context(StoreQuerySnafu)?;

        response
            .take::<Option<PageView>>(0)
            .context(StoreDeserializeSnafu)?
            .context(EmptyResponseSnafu)
    }

    /// Find-or-create for the current page, counting the visit.
    ///
    /// The find and the create are two round trips, so two first visitors
    /// can race; the unique index on `path` makes the loser fail instead of
    /// splitting the count across two records.
    pub async fn record_view(&self, path: &str) -> Result<PageView> {
        match self.find(path).await? {
            Some(view) => self.increment(&view).await,
            None => self.create(PageView::new(path.to_string())).await,
        }
    }

    /// Sum of every record's count. An absent aggregate reads as zero.
    pub async fn total(&self) -> Result<i64> {
        let mut response = self
            .db
            .query("SELECT math::sum(count) AS total FROM views GROUP ALL")
            .await
            .context(StoreQuerySnafu)?;

        let total = response
            .take::<Option<SiteTotal>>(0)
            .context(StoreDeserializeSnafu)?;

        Ok(total.and_then(|aggregate| aggregate.total).unwrap_or(0))
    }
}

#[derive(Debug, Deserialize)]
struct SiteTotal {
    total: Option<i64>,
}

impl Source for BackendCounter {
    async fn counts(&self, path: &str) -> Result<Counts> {
        let view = self.record_view(path).await?;
        let site = self.total().await?;

        Ok(Counts {
            site,
            page: view.count,
        })
    }
}

#[cfg(test)]
impl BackendCounter {
    /// A client that was never connected; every operation fails, the same
    /// way a network outage does.
    pub(crate) fn disconnected() -> Self {
        Self { db: Surreal::init() }
    }
}
