use crate::common::error::Result;
use crate::domain::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage trait for the canonical event store. The import engine only ever
/// needs keyed lookups and single-row creates/updates; the backing store is
/// expected to provide ACID per-row semantics.
#[async_trait]
pub trait Storage: Send + Sync {
    // Location operations
    async fn create_location(&self, location: &mut Location) -> Result<()>;
    async fn get_location_by_name_city(&self, name: &str, city: &str) -> Result<Option<Location>>;

    // Organizer operations
    async fn create_organizer(&self, organizer: &mut Organizer) -> Result<()>;
    async fn get_organizer_by_id(&self, id: i64) -> Result<Option<Organizer>>;
    async fn get_organizer_by_name(&self, name: &str) -> Result<Option<Organizer>>;

    // Event operations
    async fn create_event(&self, event: &mut Event) -> Result<()>;
    async fn get_event_by_slug(&self, slug: &str) -> Result<Option<Event>>;
    async fn update_event(&self, event: &Event) -> Result<()>;
    async fn delete_event(&self, event_id: i64) -> Result<()>;

    // EventDate operations
    async fn create_event_date(&self, event_date: &mut EventDate) -> Result<()>;
    async fn get_event_date(
        &self,
        event_id: i64,
        start: DateTime<Utc>,
        location_id: Option<i64>,
    ) -> Result<Option<EventDate>>;
    async fn get_event_dates(&self, event_id: i64) -> Result<Vec<EventDate>>;
}
