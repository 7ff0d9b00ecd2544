//! Event import engine.
//!
//! Consumes batches of import records (scraped or hand-written JSON) and
//! merges them into the canonical store without creating duplicates:
//! locations and organizers are matched-or-created by identity key, events
//! are found by slug with a numeric-suffix collision probe, and event dates
//! are diff-added per `(event, start, location)`.

use std::sync::Arc;

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::common::error::{HarvesterError, Result};
use crate::domain::*;
use crate::storage::Storage;

/// Where a record landed after the slug-chain probe.
enum Slot {
    /// Every date+location pair already exists under this event.
    Skip(Event),
    /// Some pairs exist under this event: same event, attach the rest.
    Update(Event),
    /// No matching event in the chain; create at this free slug.
    Create(String),
}

struct DateOverlap {
    all_exist: bool,
    any_exist: bool,
}

pub struct EventImporter {
    storage: Arc<dyn Storage>,
    timezone: Tz,
}

impl EventImporter {
    pub fn new(storage: Arc<dyn Storage>, timezone: Tz) -> Self {
        Self { storage, timezone }
    }

    /// Parse a date string into UTC. An explicit ISO-8601 offset is honored
    /// as given; naive datetimes are interpreted in the configured timezone.
    pub fn parse_date(&self, value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: [&str; 4] = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
        ];
        for fmt in FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
                return self.localize(naive);
            }
        }
        None
    }

    fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            // DST fold: take the earlier instant
            LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
            LocalResult::None => None,
        }
    }

    /// Match-or-create a location by `(name, city)`. Returns None when the
    /// payload carries no name.
    async fn get_or_create_location(&self, payload: &LocationPayload) -> Result<Option<Location>> {
        let name = match payload.name.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => return Ok(None),
        };
        let city = payload.city.clone().unwrap_or_default();

        if let Some(existing) = self.storage.get_location_by_name_city(name, &city).await? {
            debug!("Found existing location: {} ({})", name, city);
            return Ok(Some(existing));
        }

        let mut location = Location {
            id: None,
            name: name.to_string(),
            shortname: payload.shortname.clone().unwrap_or_default(),
            city,
            address: payload.address.clone().unwrap_or_default(),
            latitude: payload.latitude,
            longitude: payload.longitude,
            google_maps_url: payload.google_maps_url.clone().unwrap_or_default(),
            website: payload.website.clone().unwrap_or_default(),
            phone: payload.phone.clone().unwrap_or_default(),
            email: payload.email.clone().unwrap_or_default(),
            capacity: payload.capacity,
            location_type: LocationType::parse_or_default(payload.location_type.as_deref()),
            amenities: payload.amenities.clone(),
            description: payload.description.clone().unwrap_or_default(),
            active: true,
            created_at: Utc::now(),
        };
        self.storage.create_location(&mut location).await?;
        info!("Created new location: {} ({})", location.name, location.city);
        Ok(Some(location))
    }

    /// Pure lookup variant used by the existence check: resolves the same way
    /// as `get_or_create_location` but never creates anything.
    async fn lookup_location(&self, payload: &LocationPayload) -> Result<Option<Location>> {
        let name = match payload.name.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => return Ok(None),
        };
        let city = payload.city.clone().unwrap_or_default();
        self.storage.get_location_by_name_city(name, &city).await
    }

    /// Resolve the organizer reference: explicit id first (an unresolvable id
    /// is a warning, not an error), then match-or-create by name.
    async fn resolve_organizer(&self, record: &ImportRecord) -> Result<Option<i64>> {
        if let Some(id) = record.organizer_id {
            match self.storage.get_organizer_by_id(id).await? {
                Some(organizer) => return Ok(organizer.id),
                None => warn!("Organizer ID {} not found", id),
            }
        }

        let name = match record.organizer_name.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => return Ok(None),
        };

        if let Some(existing) = self.storage.get_organizer_by_name(name).await? {
            debug!("Found existing organizer: {}", name);
            return Ok(existing.id);
        }

        let mut organizer = Organizer {
            id: None,
            name: name.to_string(),
            contact_email: String::new(),
            contact_phone: String::new(),
            website: String::new(),
            created_at: Utc::now(),
        };
        self.storage.create_organizer(&mut organizer).await?;
        info!("Created new organizer: {}", name);
        Ok(organizer.id)
    }

    /// Check how many of the record's date+location pairs already exist under
    /// an event. Unparseable dates are ignored, matching the import loop that
    /// skips them too.
    async fn date_overlap(&self, event_id: i64, dates: &[DateEntry]) -> Result<DateOverlap> {
        let mut parseable = 0usize;
        let mut existing = 0usize;

        for entry in dates {
            let start = match entry.start_date.as_deref().and_then(|s| self.parse_date(s)) {
                Some(start) => start,
                None => continue,
            };
            parseable += 1;

            let location_id = match &entry.location {
                Some(payload) => self.lookup_location(payload).await?.and_then(|l| l.id),
                None => None,
            };

            if self
                .storage
                .get_event_date(event_id, start, location_id)
                .await?
                .is_some()
            {
                existing += 1;
            }
        }

        Ok(DateOverlap {
            all_exist: existing == parseable,
            any_exist: existing > 0,
        })
    }

    /// Walk the slug chain `base`, `base-1`, `base-2`, ... until the record
    /// either matches an existing event or reaches a free slug.
    async fn find_event_slot(&self, base_slug: &str, dates: &[DateEntry]) -> Result<Slot> {
        let mut slug = base_slug.to_string();
        let mut counter = 0usize;

        loop {
            let event = match self.storage.get_event_by_slug(&slug).await? {
                Some(event) => event,
                None => return Ok(Slot::Create(slug)),
            };

            let event_id = event.id.expect("persisted event has an id");
            let overlap = self.date_overlap(event_id, dates).await?;
            if overlap.all_exist {
                return Ok(Slot::Skip(event));
            }
            if overlap.any_exist {
                return Ok(Slot::Update(event));
            }

            // Same slug, fully disjoint dates: a different event that happens
            // to share the title. Probe the next suffix.
            counter += 1;
            slug = format!("{}-{}", base_slug, counter);
        }
    }

    /// Reapply mutable fields from the record. Populated fields are never
    /// overwritten by empty or absent incoming values.
    fn apply_record_fields(&self, event: &mut Event, record: &ImportRecord, organizer_id: Option<i64>) {
        if let Some(title) = record.title.as_deref().filter(|t| !t.is_empty()) {
            event.title = title.to_string();
        }
        if let Some(description) = record.description.as_deref().filter(|d| !d.is_empty()) {
            event.description = description.to_string();
        }
        if record.category.is_some() {
            event.category = EventCategory::parse_or_default(record.category.as_deref());
        }
        if record.event_type.is_some() {
            event.event_type = EventType::parse_or_default(record.event_type.as_deref());
        }
        if record.price_type.is_some() {
            event.price_type = PriceType::parse_or_default(record.price_type.as_deref());
        }
        if record.price_amount.is_some() {
            event.price_amount = record.price_amount;
        }
        if let Some(currency) = record.currency.as_deref().filter(|c| !c.is_empty()) {
            event.currency = currency.to_string();
        }
        if record.age_restriction.is_some() {
            event.age_restriction = record.age_restriction;
        }
        if let Some(url) = record.external_url.as_deref().filter(|u| !u.is_empty()) {
            event.external_url = url.to_string();
        }
        if let Some(url) = record.ticket_url.as_deref().filter(|u| !u.is_empty()) {
            event.ticket_url = url.to_string();
        }
        if record.external_event_id.is_some() {
            event.external_event_id = record.external_event_id.clone();
        }
        if !record.images.is_empty() {
            event.images = record.images.clone();
        }
        if organizer_id.is_some() {
            event.organizer_id = organizer_id;
        }
        event.updated_at = Utc::now();
    }

    /// Attach any of the record's dates that don't yet exist under the event.
    async fn attach_dates(&self, event_id: i64, dates: &[DateEntry]) -> Result<usize> {
        let mut added = 0usize;

        // Dates are processed in the order given; display ordering is a
        // read-side concern.
        for entry in dates {
            let start = match entry.start_date.as_deref().and_then(|s| self.parse_date(s)) {
                Some(start) => start,
                None => continue,
            };
            let end = entry.end_date.as_deref().and_then(|s| self.parse_date(s));

            let location = match &entry.location {
                Some(payload) => self.get_or_create_location(payload).await?,
                None => None,
            };
            let location_id = location.as_ref().and_then(|l| l.id);

            if self
                .storage
                .get_event_date(event_id, start, location_id)
                .await?
                .is_some()
            {
                debug!("Date already exists: {} at {:?}", start, location_id);
                continue;
            }

            let mut event_date = EventDate {
                id: None,
                event_id,
                location_id,
                start,
                end,
                duration_minutes: entry.duration_minutes,
                notes: entry.notes.clone().unwrap_or_default(),
                created_at: Utc::now(),
            };
            self.storage.create_event_date(&mut event_date).await?;
            info!("Added new date: {} at {:?}", start, location_id);
            added += 1;
        }

        Ok(added)
    }

    /// Import a single record. Returns true if the record was imported
    /// (created or updated), false if skipped or invalid.
    async fn import_record(
        &self,
        record: &ImportRecord,
        index: usize,
        result: &mut ImportResult,
    ) -> Result<bool> {
        let title = match record.title.as_deref().filter(|t| !t.is_empty()) {
            Some(title) => title.to_string(),
            None => {
                let err = HarvesterError::MissingField("title".to_string());
                result.add_error(index, "N/A", err.to_string());
                return Ok(false);
            }
        };

        if record.dates.is_empty() {
            let err = HarvesterError::MissingField("dates".to_string());
            result.add_error(index, &title, err.to_string());
            return Ok(false);
        }

        let organizer_id = self.resolve_organizer(record).await?;
        let base_slug = slugify(&title);

        let mut event = match self.find_event_slot(&base_slug, &record.dates).await? {
            Slot::Skip(_) => {
                info!("Skipping existing event: {}", title);
                result.skipped += 1;
                return Ok(false);
            }
            Slot::Update(event) => {
                info!("Updating existing event with new dates: {}", title);
                event
            }
            Slot::Create(slug) => {
                info!("Creating new event: {} ({})", title, slug);
                Event {
                    id: None,
                    title: title.clone(),
                    slug,
                    description: String::new(),
                    category: EventCategory::parse_or_default(record.category.as_deref()),
                    event_type: EventType::parse_or_default(record.event_type.as_deref()),
                    price_type: PriceType::parse_or_default(record.price_type.as_deref()),
                    price_amount: None,
                    currency: "PLN".to_string(),
                    age_restriction: None,
                    organizer_id,
                    external_url: String::new(),
                    ticket_url: String::new(),
                    external_event_id: None,
                    images: Vec::new(),
                    source: EventSource::Manual,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                }
            }
        };

        self.apply_record_fields(&mut event, record, organizer_id);
        if event.id.is_none() {
            self.storage.create_event(&mut event).await?;
        } else {
            self.storage.update_event(&event).await?;
        }
        let event_id = event.id.expect("event persisted above");

        self.attach_dates(event_id, &record.dates).await?;

        result.imported += 1;
        Ok(true)
    }

    /// Import a batch of records. Records are independent units of work: a
    /// failure in one is captured in the result and processing continues.
    pub async fn import_batch(&self, records: &[ImportRecord]) -> ImportResult {
        let mut result = ImportResult::default();

        for (index, record) in records.iter().enumerate() {
            if let Err(e) = self.import_record(record, index, &mut result).await {
                let title = record.title.clone().unwrap_or_else(|| "N/A".to_string());
                result.add_error(index, &title, e.to_string());
            }
        }

        info!(
            "Import finished: {} imported, {} skipped, {} errors",
            result.imported,
            result.skipped,
            result.errors.len()
        );
        result
    }

    /// Import from a JSON string. The top level must be an array of records;
    /// anything else is a batch-level error.
    pub async fn import_from_str(&self, json: &str) -> ImportResult {
        let value: serde_json::Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                let mut result = ImportResult::default();
                result.add_error(0, "N/A", format!("Invalid JSON: {}", e));
                return result;
            }
        };

        if !value.is_array() {
            let mut result = ImportResult::default();
            result.add_error(0, "N/A", "JSON data must be an array");
            return result;
        }

        let records: Vec<ImportRecord> = match serde_json::from_value(value) {
            Ok(records) => records,
            Err(e) => {
                let mut result = ImportResult::default();
                result.add_error(0, "N/A", format!("Invalid JSON: {}", e));
                return result;
            }
        };

        self.import_batch(&records).await
    }

    /// Import from a JSON file on disk.
    pub async fn import_from_file(&self, path: &std::path::Path) -> ImportResult {
        match std::fs::read_to_string(path) {
            Ok(contents) => self.import_from_str(&contents).await,
            Err(e) => {
                let mut result = ImportResult::default();
                result.add_error(0, "N/A", format!("Error reading file: {}", e));
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use chrono_tz::Europe::Warsaw;

    fn importer(storage: Arc<InMemoryStorage>) -> EventImporter {
        EventImporter::new(storage, Warsaw)
    }

    fn record(title: &str, starts: &[&str]) -> ImportRecord {
        ImportRecord {
            title: Some(title.to_string()),
            dates: starts
                .iter()
                .map(|s| DateEntry {
                    start_date: Some(s.to_string()),
                    location: Some(LocationPayload {
                        name: Some("Dom Kultury".to_string()),
                        city: Some("Lesko".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rerunning_identical_batch_is_idempotent() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage.clone());
        let batch = vec![record(
            "Koncert Noworoczny",
            &["2025-02-01T19:00:00", "2025-02-02T19:00:00"],
        )];

        let first = importer.import_batch(&batch).await;
        assert_eq!(first.imported, 1);
        assert_eq!(first.skipped, 0);

        let second = importer.import_batch(&batch).await;
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 1);
        assert!(second.errors.is_empty());

        let (_, _, events, dates) = storage.counts();
        assert_eq!(events, 1);
        assert_eq!(dates, 2);
    }

    #[tokio::test]
    async fn same_title_disjoint_dates_gets_suffixed_slug() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage.clone());
        let batch = vec![
            record("Wieczór Poezji", &["2025-03-01T18:00:00"]),
            record("Wieczór Poezji", &["2025-04-01T18:00:00"]),
        ];

        let result = importer.import_batch(&batch).await;
        assert_eq!(result.imported, 2);

        assert!(storage.get_event_by_slug("wieczor-poezji").await.unwrap().is_none());
        // Polish diacritics survive slugification as-is; the identity key
        // only needs to be deterministic
        let first = storage.get_event_by_slug("wieczór-poezji").await.unwrap();
        let second = storage.get_event_by_slug("wieczór-poezji-1").await.unwrap();
        assert!(first.is_some());
        assert!(second.is_some());

        // Rerun finds both chain positions and skips
        let rerun = importer.import_batch(&batch).await;
        assert_eq!(rerun.imported, 0);
        assert_eq!(rerun.skipped, 2);
        let (_, _, events, dates) = storage.counts();
        assert_eq!(events, 2);
        assert_eq!(dates, 2);
    }

    #[tokio::test]
    async fn overlapping_dates_update_existing_event() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage.clone());

        let result = importer
            .import_batch(&[record("Festiwal Sztuki", &["2025-06-01T12:00:00"])])
            .await;
        assert_eq!(result.imported, 1);

        // Same event announced again with an extra date
        let result = importer
            .import_batch(&[record(
                "Festiwal Sztuki",
                &["2025-06-01T12:00:00", "2025-06-02T12:00:00"],
            )])
            .await;
        assert_eq!(result.imported, 1);
        assert_eq!(result.skipped, 0);

        let (_, _, events, dates) = storage.counts();
        assert_eq!(events, 1);
        assert_eq!(dates, 2);
    }

    #[tokio::test]
    async fn organizer_upserted_by_name_once() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage.clone());

        let mut a = record("Koncert A", &["2025-02-01T19:00:00"]);
        a.organizer_name = Some("GOK Cisna".to_string());
        let mut b = record("Koncert B", &["2025-02-02T19:00:00"]);
        b.organizer_name = Some("GOK Cisna".to_string());

        importer.import_batch(&[a, b]).await;

        let (_, organizers, _, _) = storage.counts();
        assert_eq!(organizers, 1);
    }

    #[tokio::test]
    async fn unresolvable_organizer_id_falls_through_to_name() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage.clone());

        let mut rec = record("Spektakl", &["2025-05-10T19:00:00"]);
        rec.organizer_id = Some(999);
        rec.organizer_name = Some("Teatr Lalek".to_string());

        let result = importer.import_batch(&[rec]).await;
        assert_eq!(result.imported, 1);
        assert!(result.errors.is_empty());

        let organizer = storage.get_organizer_by_name("Teatr Lalek").await.unwrap();
        assert!(organizer.is_some());
        let event = storage.get_event_by_slug("spektakl").await.unwrap().unwrap();
        assert_eq!(event.organizer_id, organizer.unwrap().id);
    }

    #[tokio::test]
    async fn invalid_records_are_reported_and_batch_continues() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage.clone());

        let no_title = ImportRecord {
            dates: vec![DateEntry {
                start_date: Some("2025-02-01T19:00:00".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let no_dates = ImportRecord {
            title: Some("Bez terminów".to_string()),
            ..Default::default()
        };
        let ok = record("Poprawny", &["2025-02-01T19:00:00"]);

        let result = importer.import_batch(&[no_title, no_dates, ok]).await;
        assert_eq!(result.imported, 1);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].index, 0);
        assert_eq!(result.errors[0].title, "N/A");
        assert!(result.errors[0].error.contains("title"));
        assert_eq!(result.errors[1].index, 1);
        assert!(result.errors[1].error.contains("dates"));
    }

    #[tokio::test]
    async fn unknown_category_coerces_to_default() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage.clone());

        let mut rec = record("Tajemnicze Wydarzenie", &["2025-02-01T19:00:00"]);
        rec.category = Some("RAVE".to_string());

        let result = importer.import_batch(&[rec]).await;
        assert_eq!(result.imported, 1);
        assert!(result.errors.is_empty());

        let event = storage
            .get_event_by_slug("tajemnicze-wydarzenie")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.category, EventCategory::Cultural);
    }

    #[tokio::test]
    async fn update_never_overwrites_populated_fields_with_empty() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage.clone());

        let mut first = record("Warsztaty Garncarskie", &["2025-02-01T10:00:00"]);
        first.description = Some("Warsztaty dla dzieci".to_string());
        first.category = Some("WORKSHOP".to_string());
        importer.import_batch(&[first]).await;

        // Second run adds a date but carries no description or category
        let update = record(
            "Warsztaty Garncarskie",
            &["2025-02-01T10:00:00", "2025-02-08T10:00:00"],
        );
        importer.import_batch(&[update]).await;

        let event = storage
            .get_event_by_slug("warsztaty-garncarskie")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.description, "Warsztaty dla dzieci");
        assert_eq!(event.category, EventCategory::Workshop);
    }

    #[tokio::test]
    async fn explicit_offset_is_honored_naive_is_localized() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage);

        // Naive winter datetime: Warsaw is UTC+1
        let local = importer.parse_date("2025-02-01T19:00:00").unwrap();
        assert_eq!(local.to_rfc3339(), "2025-02-01T18:00:00+00:00");

        // Explicit offset wins over the configured zone
        let explicit = importer.parse_date("2025-02-01T19:00:00+03:00").unwrap();
        assert_eq!(explicit.to_rfc3339(), "2025-02-01T16:00:00+00:00");
    }

    #[tokio::test]
    async fn non_array_json_is_a_batch_error() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage);

        let result = importer.import_from_str("{\"title\": \"x\"}").await;
        assert_eq!(result.imported, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].error.contains("must be an array"));

        let result = importer.import_from_str("not json").await;
        assert!(result.errors[0].error.contains("Invalid JSON"));
    }

    #[tokio::test]
    async fn import_from_file_round_trip() {
        use std::io::Write;

        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer(storage.clone());

        let batch = vec![record("Kino Plenerowe", &["2025-07-15T21:00:00"])];
        let json = serde_json::to_string(&batch).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let result = importer.import_from_file(file.path()).await;
        assert_eq!(result.imported, 1);
        assert!(storage.get_event_by_slug("kino-plenerowe").await.unwrap().is_some());
    }
}
