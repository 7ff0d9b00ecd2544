use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event category, detected from post text or supplied by an import batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    Concert,
    Festival,
    Theatre,
    Cinema,
    Workshop,
    Food,
    Cultural,
}

impl EventCategory {
    /// Parse a free-text category, falling back to the default for anything
    /// unrecognized. Upstream sources routinely send arbitrary strings here.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some("CONCERT") => Self::Concert,
            Some("FESTIVAL") => Self::Festival,
            Some("THEATRE") => Self::Theatre,
            Some("CINEMA") => Self::Cinema,
            Some("WORKSHOP") => Self::Workshop,
            Some("FOOD") => Self::Food,
            _ => Self::Cultural,
        }
    }
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concert => "CONCERT",
            Self::Festival => "FESTIVAL",
            Self::Theatre => "THEATRE",
            Self::Cinema => "CINEMA",
            Self::Workshop => "WORKSHOP",
            Self::Food => "FOOD",
            Self::Cultural => "CULTURAL",
        }
    }
}

impl Default for EventCategory {
    fn default() -> Self {
        Self::Cultural
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Event,
    Product,
    Workshop,
}

impl EventType {
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some("PRODUCT") => Self::Product,
            Some("WORKSHOP") => Self::Workshop,
            _ => Self::Event,
        }
    }
}

impl Default for EventType {
    fn default() -> Self {
        Self::Event
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    Free,
    Paid,
}

impl PriceType {
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some("PAID") => Self::Paid,
            _ => Self::Free,
        }
    }
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Paid => "PAID",
        }
    }
}

impl Default for PriceType {
    fn default() -> Self {
        Self::Free
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Venue,
    Outdoor,
    Private,
    Virtual,
}

impl LocationType {
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some("OUTDOOR") => Self::Outdoor,
            Some("PRIVATE") => Self::Private,
            Some("VIRTUAL") => Self::Virtual,
            _ => Self::Venue,
        }
    }
}

impl Default for LocationType {
    fn default() -> Self {
        Self::Venue
    }
}

/// Where an event record originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    Manual,
    Scraped,
    UserSubmitted,
}

impl Default for EventSource {
    fn default() -> Self {
        Self::Manual
    }
}

/// A physical place where events happen. Shared across events; matched by
/// `(name, city)` rather than by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: Option<i64>,
    pub name: String,
    pub shortname: String,
    pub city: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub google_maps_url: String,
    pub website: String,
    pub phone: String,
    pub email: String,
    pub capacity: Option<u32>,
    pub location_type: LocationType,
    pub amenities: Vec<String>,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organizer {
    pub id: Option<i64>,
    pub name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub website: String,
    pub created_at: DateTime<Utc>,
}

/// Canonical event. One event owns its `EventDate` rows; repeated imports may
/// attach new dates but never change the slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: EventCategory,
    pub event_type: EventType,
    pub price_type: PriceType,
    pub price_amount: Option<f64>,
    pub currency: String,
    pub age_restriction: Option<u32>,
    pub organizer_id: Option<i64>,
    pub external_url: String,
    pub ticket_url: String,
    pub external_event_id: Option<String>,
    pub images: Vec<String>,
    pub source: EventSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One concrete occurrence of an event. `location_id` may be absent for
/// undated-venue legacy rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDate {
    pub id: Option<i64>,
    pub event_id: i64,
    pub location_id: Option<i64>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// One record of the import batch format. Every field is optional at the
/// serde level so a malformed record fails inside the batch loop instead of
/// aborting deserialization of the whole array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub price_type: Option<String>,
    #[serde(default)]
    pub price_amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub age_restriction: Option<u32>,
    #[serde(default)]
    pub organizer_id: Option<i64>,
    #[serde(default)]
    pub organizer_name: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub ticket_url: Option<String>,
    #[serde(default)]
    pub external_event_id: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub dates: Vec<DateEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateEntry {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub location: Option<LocationPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub shortname: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub google_maps_url: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub location_type: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportError {
    pub index: usize,
    pub title: String,
    pub error: String,
}

/// Outcome of one import run. Never persisted; returned to the caller and
/// rendered for the admin upload action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

impl ImportResult {
    pub fn add_error(&mut self, index: usize, title: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("Import error at index {} ({}): {}", index, title, message);
        self.errors.push(ImportError {
            index,
            title: title.to_string(),
            error: message,
        });
    }

    /// Human-readable summary: counts plus the first ten errors, with any
    /// remainder collapsed into a count.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Imported: {}, skipped: {}, errors: {}",
            self.imported,
            self.skipped,
            self.errors.len()
        );
        for err in self.errors.iter().take(10) {
            out.push_str(&format!("\n  [{}] {}: {}", err.index, err.title, err.error));
        }
        if self.errors.len() > 10 {
            out.push_str(&format!("\n  ... and {} more errors", self.errors.len() - 10));
        }
        out
    }
}

/// Slug used as the event identity key. Lowercases, drops punctuation, and
/// joins words with dashes.
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .replace(' ', "-")
        .replace(['\'', '"', '.', ',', '!', '?', '&', ':'], "")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}
