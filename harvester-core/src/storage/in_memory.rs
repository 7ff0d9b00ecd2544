use super::traits::Storage;
use crate::common::error::Result;
use crate::domain::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-memory storage implementation for development and testing.
pub struct InMemoryStorage {
    locations: Arc<Mutex<HashMap<i64, Location>>>,
    organizers: Arc<Mutex<HashMap<i64, Organizer>>>,
    events: Arc<Mutex<HashMap<i64, Event>>>,
    event_dates: Arc<Mutex<HashMap<i64, EventDate>>>,
    next_id: AtomicI64,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            locations: Arc::new(Mutex::new(HashMap::new())),
            organizers: Arc::new(Mutex::new(HashMap::new())),
            events: Arc::new(Mutex::new(HashMap::new())),
            event_dates: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicI64::new(1),
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Row counts (locations, organizers, events, event dates), for tests.
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.locations.lock().unwrap().len(),
            self.organizers.lock().unwrap().len(),
            self.events.lock().unwrap().len(),
            self.event_dates.lock().unwrap().len(),
        )
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_location(&self, location: &mut Location) -> Result<()> {
        let id = self.allocate_id();
        location.id = Some(id);

        let mut locations = self.locations.lock().unwrap();
        locations.insert(id, location.clone());

        debug!("Created location: {} ({}) with id {}", location.name, location.city, id);
        Ok(())
    }

    async fn get_location_by_name_city(&self, name: &str, city: &str) -> Result<Option<Location>> {
        let locations = self.locations.lock().unwrap();
        let location = locations
            .values()
            .find(|l| l.name == name && l.city == city)
            .cloned();
        Ok(location)
    }

    async fn create_organizer(&self, organizer: &mut Organizer) -> Result<()> {
        let id = self.allocate_id();
        organizer.id = Some(id);

        let mut organizers = self.organizers.lock().unwrap();
        organizers.insert(id, organizer.clone());

        debug!("Created organizer: {} with id {}", organizer.name, id);
        Ok(())
    }

    async fn get_organizer_by_id(&self, id: i64) -> Result<Option<Organizer>> {
        let organizers = self.organizers.lock().unwrap();
        Ok(organizers.get(&id).cloned())
    }

    async fn get_organizer_by_name(&self, name: &str) -> Result<Option<Organizer>> {
        let organizers = self.organizers.lock().unwrap();
        let organizer = organizers.values().find(|o| o.name == name).cloned();
        Ok(organizer)
    }

    async fn create_event(&self, event: &mut Event) -> Result<()> {
        let id = self.allocate_id();
        event.id = Some(id);

        let mut events = self.events.lock().unwrap();
        events.insert(id, event.clone());

        debug!("Created event: {} with id {}", event.slug, id);
        Ok(())
    }

    async fn get_event_by_slug(&self, slug: &str) -> Result<Option<Event>> {
        let events = self.events.lock().unwrap();
        let event = events.values().find(|e| e.slug == slug).cloned();
        Ok(event)
    }

    async fn update_event(&self, event: &Event) -> Result<()> {
        let event_id = event.id.ok_or_else(|| {
            crate::common::error::HarvesterError::Storage {
                message: "Cannot update event without ID".to_string(),
            }
        })?;

        let mut events = self.events.lock().unwrap();
        events.insert(event_id, event.clone());

        debug!("Updated event: {} with id {}", event.slug, event_id);
        Ok(())
    }

    async fn delete_event(&self, event_id: i64) -> Result<()> {
        let mut events = self.events.lock().unwrap();
        events.remove(&event_id);

        // Event owns its dates: cascade
        let mut event_dates = self.event_dates.lock().unwrap();
        event_dates.retain(|_, d| d.event_id != event_id);

        debug!("Deleted event {} and its dates", event_id);
        Ok(())
    }

    async fn create_event_date(&self, event_date: &mut EventDate) -> Result<()> {
        let id = self.allocate_id();
        event_date.id = Some(id);

        let mut event_dates = self.event_dates.lock().unwrap();
        event_dates.insert(id, event_date.clone());

        debug!(
            "Created event date {} for event {} at location {:?}",
            event_date.start, event_date.event_id, event_date.location_id
        );
        Ok(())
    }

    async fn get_event_date(
        &self,
        event_id: i64,
        start: DateTime<Utc>,
        location_id: Option<i64>,
    ) -> Result<Option<EventDate>> {
        let event_dates = self.event_dates.lock().unwrap();
        let found = event_dates
            .values()
            .find(|d| d.event_id == event_id && d.start == start && d.location_id == location_id)
            .cloned();
        Ok(found)
    }

    async fn get_event_dates(&self, event_id: i64) -> Result<Vec<EventDate>> {
        let event_dates = self.event_dates.lock().unwrap();
        let mut dates: Vec<EventDate> = event_dates
            .values()
            .filter(|d| d.event_id == event_id)
            .cloned()
            .collect();
        dates.sort_by_key(|d| d.id);
        Ok(dates)
    }
}
