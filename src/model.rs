use derive_new::new;
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime, Thing};

pub const VIEWS_TABLE: &str = "views";

pub type ViewId = Thing;

pub fn new_view_id() -> ViewId {
    (VIEWS_TABLE.to_string(), surrealdb::sql::Id::rand()).into()
}

/// A per-path view counter record.
///
/// One record exists per documentation page, keyed by the page's route.
/// The record is created with a count of 1 on the first visit and only ever
/// incremented afterwards; nothing deletes it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct PageView {
    #[new(value = "new_view_id()")]
    pub id: ViewId,
    #[new(value = "Datetime::default()")]
    pub created_at: Datetime,
    #[new(value = "Datetime::default()")]
    pub updated_at: Datetime,

    pub path: String,
    #[new(value = "1")]
    pub count: i64,
}

/// The pair of numbers the widget displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Counts {
    pub site: i64,
    pub page: i64,
}
