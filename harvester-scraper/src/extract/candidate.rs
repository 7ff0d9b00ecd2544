//! Builds structured event candidates out of raw feed units.

use chrono::NaiveDateTime;
use harvester_core::{DateEntry, EventCategory, ImportRecord, LocationPayload};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::datetime;
use super::heuristics::{self, ContactInfo, PriceInfo};

const MAX_IMAGES: usize = 5;

static TRACKING_PARAMS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&](?:oh|oe)=[^&]*").expect("valid tracking param pattern"));

/// One raw unit of feed content as captured from the source, before any
/// interpretation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawUnit {
    #[serde(default)]
    pub text: String,
    /// Emphasized spans (headings, bold runs) in document order.
    #[serde(default)]
    pub emphasized: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub permalink: Option<String>,
}

/// A structured event candidate, not yet reconciled against the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub title: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub location_text: Option<String>,
    pub category: EventCategory,
    pub price: PriceInfo,
    pub images: Vec<String>,
    pub source_url: Option<String>,
    pub external_id: Option<String>,
    pub description: String,
    pub contact: ContactInfo,
}

impl CandidateEvent {
    /// A candidate is worth importing if its title carries real signal, or
    /// if a thin or missing title is backed by both a date and a location.
    pub fn is_valid(&self) -> bool {
        if let Some(title) = &self.title {
            if title.chars().count() >= 5 {
                return true;
            }
        }
        self.start.is_some() && self.location_text.is_some()
    }

    /// Convert into the batch import format consumed by the reconciliation
    /// engine. Wall times are serialized without offset; the importer
    /// localizes them in its configured timezone.
    pub fn into_import_record(self) -> ImportRecord {
        let location = self.location_text.map(|name| LocationPayload {
            name: Some(name),
            ..Default::default()
        });

        let dates = self
            .start
            .map(|start| {
                vec![DateEntry {
                    start_date: Some(start.format("%Y-%m-%dT%H:%M:%S").to_string()),
                    end_date: self.end.map(|e| e.format("%Y-%m-%dT%H:%M:%S").to_string()),
                    location,
                    ..Default::default()
                }]
            })
            .unwrap_or_default();

        ImportRecord {
            title: self.title,
            description: Some(self.description),
            category: Some(self.category.as_str().to_string()),
            price_type: Some(self.price.price_type.as_str().to_string()),
            price_amount: self.price.amount,
            currency: Some(self.price.currency),
            external_url: self.source_url,
            external_event_id: self.external_id,
            images: self.images,
            dates,
            ..Default::default()
        }
    }
}

/// Strip volatile CDN tracking params, drop inline data URIs, dedup while
/// keeping first-seen order, cap the list.
pub fn normalize_images(images: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for url in images {
        if url.starts_with("data:") {
            continue;
        }
        let cleaned = TRACKING_PARAMS_RE.replace_all(url, "").to_string();
        if !seen.contains(&cleaned) {
            seen.push(cleaned);
        }
        if seen.len() == MAX_IMAGES {
            break;
        }
    }
    seen
}

/// Run the full extraction pipeline over one raw unit. `now` anchors relative
/// date resolution. Returns None when the unit fails the admission gate or
/// yields nothing importable.
pub fn build(unit: &RawUnit, now: NaiveDateTime) -> Option<CandidateEvent> {
    if !heuristics::is_event_like(&unit.text) {
        return None;
    }

    let title = heuristics::extract_title(&unit.emphasized, &unit.text);
    let resolved = datetime::resolve(&unit.text, now);

    let candidate = CandidateEvent {
        title,
        start: resolved.map(|(s, _)| s),
        end: resolved.and_then(|(_, e)| e),
        location_text: heuristics::extract_location(&unit.text),
        category: heuristics::detect_category(&unit.text),
        price: heuristics::detect_price(&unit.text),
        images: normalize_images(&unit.images),
        source_url: unit.permalink.clone(),
        external_id: None,
        description: heuristics::sanitize_text(&unit.text),
        contact: heuristics::extract_contact_info(&unit.text),
    };

    if !candidate.is_valid() {
        debug!("Discarding thin candidate: {:?}", candidate.title);
        return None;
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use harvester_core::PriceType;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn unit(text: &str) -> RawUnit {
        RawUnit {
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn full_pipeline_on_a_typical_announcement() {
        let unit = RawUnit {
            text: "Koncert Noworoczny w Lesko\n15.12.2025 o 18:00\nBilety: 25 zł".to_string(),
            emphasized: vec!["Koncert Noworoczny".to_string()],
            images: vec!["https://cdn.example/a.jpg?oh=x&w=10".to_string()],
            permalink: Some("https://example.com/posts/1".to_string()),
        };

        let candidate = build(&unit, now()).unwrap();
        assert_eq!(candidate.title.as_deref(), Some("Koncert Noworoczny"));
        assert_eq!(candidate.category, EventCategory::Concert);
        assert_eq!(candidate.price.price_type, PriceType::Paid);
        assert_eq!(candidate.price.amount, Some(25.0));
        assert_eq!(candidate.location_text, Some("Lesko".to_string()));
        assert_eq!(
            candidate.start.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2025-12-15 18:00"
        );
        assert_eq!(candidate.images, vec!["https://cdn.example/a.jpg&w=10"]);
    }

    #[test]
    fn non_event_text_is_gated_out() {
        assert!(build(&unit("Sprzedam opony zimowe, stan dobry"), now()).is_none());
    }

    #[test]
    fn event_keyword_without_title_signal_is_dropped() {
        // Passes the gate but the only line is too short for a title and
        // there is nothing else to stand on
        assert!(build(&unit("koncert"), now()).is_none());
    }

    #[test]
    fn dated_located_post_survives_without_a_title() {
        // First line too short for a title, but start and location are both
        // present, which is enough to import
        let candidate = build(&unit("koncert\n15.12.2025 w Cisna"), now()).unwrap();
        assert_eq!(candidate.title, None);
        assert!(candidate.start.is_some());
        assert_eq!(candidate.location_text.as_deref(), Some("Cisna"));

        let record = candidate.into_import_record();
        assert_eq!(record.title, None);
        assert_eq!(record.dates.len(), 1);
    }

    #[test]
    fn image_normalization_dedups_and_caps() {
        let images: Vec<String> = (0..8)
            .map(|i| format!("https://cdn.example/{}.jpg?oh=tok{}", i % 6, i))
            .collect();
        let normalized = normalize_images(&images);
        assert_eq!(normalized.len(), 5);
        assert!(normalized.iter().all(|u| !u.contains("oh=")));

        assert!(normalize_images(&["data:image/png;base64,xyz".to_string()]).is_empty());
    }

    #[test]
    fn import_record_carries_wall_time_and_location() {
        let candidate = build(
            &unit("Wieczór poezji śpiewanej\nZapraszamy 15 grudnia 2025 o 19:00 do Cisna"),
            now(),
        )
        .unwrap();
        let record = candidate.into_import_record();

        assert_eq!(record.title.as_deref(), Some("Wieczór poezji śpiewanej"));
        assert_eq!(record.dates.len(), 1);
        assert_eq!(
            record.dates[0].start_date.as_deref(),
            Some("2025-12-15T19:00:00")
        );
        let location = record.dates[0].location.as_ref().unwrap();
        assert_eq!(location.name.as_deref(), Some("Cisna"));
    }
}
