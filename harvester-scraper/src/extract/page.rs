//! Extraction from a single event detail page, as opposed to a feed unit.
//! Structured data (JSON-LD) is preferred; DOM heuristics fill the gaps.

use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;

use super::candidate::{normalize_images, CandidateEvent};
use super::heuristics;

static EVENT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/events/(\d+)").expect("valid event id pattern"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// The subset of a schema.org Event node we care about.
#[derive(Debug, Default, Deserialize)]
struct JsonLdEvent {
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    location: Option<JsonLdLocation>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JsonLdLocation {
    name: Option<String>,
}

fn parse_json_ld(document: &Html) -> Option<JsonLdEvent> {
    let script_sel = selector(r#"script[type="application/ld+json"]"#);
    for script in document.select(&script_sel) {
        let raw = script.text().collect::<String>();
        if let Ok(event) = serde_json::from_str::<JsonLdEvent>(&raw) {
            if event.start_date.is_some() || event.location.is_some() {
                return Some(event);
            }
        }
    }
    None
}

/// JSON-LD dates are ISO strings, with or without an offset. The offset is
/// discarded: we keep the wall time as written and the importer localizes it.
fn parse_iso_wall_time(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

fn extract_heading(document: &Html) -> Option<String> {
    for css in ["h1", r#"[role="heading"]"#] {
        let sel = selector(css);
        for element in document.select(&sel) {
            let text = heuristics::sanitize_text(&element.text().collect::<String>());
            if text.chars().count() > 5 {
                return Some(text);
            }
        }
    }
    None
}

/// All paragraph text in document order, one line per paragraph. This is
/// what the text heuristics run over; short paragraphs still count because
/// date and venue lines are usually one-liners.
fn collect_body_text(document: &Html) -> String {
    let p_sel = selector("p");
    document
        .select(&p_sel)
        .map(|p| heuristics::sanitize_text(&p.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_description(document: &Html, body_text: &str) -> String {
    let og_sel = selector(r#"meta[property="og:description"]"#);
    if let Some(meta) = document.select(&og_sel).next() {
        if let Some(content) = meta.value().attr("content") {
            let text = heuristics::sanitize_text(content);
            if !text.is_empty() {
                return text;
            }
        }
    }

    body_text
        .lines()
        .find(|line| line.chars().count() > 80)
        .unwrap_or_default()
        .to_string()
}

fn extract_images(document: &Html) -> Vec<String> {
    let img_sel = selector("img[src]");
    let urls: Vec<String> = document
        .select(&img_sel)
        .filter_map(|img| img.value().attr("src"))
        .map(str::to_string)
        .collect();
    normalize_images(&urls)
}

/// Extract an event candidate from a detail page. Returns None when no
/// usable heading is found; everything else degrades gracefully.
pub fn extract_event_page(html: &str, url: &str, now: NaiveDateTime) -> Option<CandidateEvent> {
    let document = Html::parse_document(html);

    let title = extract_heading(&document)?;
    let body_text = format!("{}\n{}", title, collect_body_text(&document));
    let description = extract_description(&document, &body_text);

    let json_ld = parse_json_ld(&document);

    let (mut start, mut end) = (None, None);
    let mut location_text = None;
    if let Some(ld) = &json_ld {
        start = ld.start_date.as_deref().and_then(parse_iso_wall_time);
        end = ld.end_date.as_deref().and_then(parse_iso_wall_time);
        location_text = ld.location.as_ref().and_then(|l| l.name.clone());
        debug!("Using structured data for {}: start={:?}", url, start);
    }

    if start.is_none() {
        if let Some((s, e)) = super::datetime::resolve(&body_text, now) {
            start = Some(s);
            end = e;
        }
    }
    if location_text.is_none() {
        location_text = heuristics::extract_location(&body_text);
    }

    let description = json_ld
        .and_then(|ld| ld.description)
        .map(|d| heuristics::sanitize_text(&d))
        .filter(|d| !d.is_empty())
        .unwrap_or(description);

    let candidate = CandidateEvent {
        title: Some(title),
        start,
        end,
        location_text,
        category: heuristics::detect_category(&body_text),
        price: heuristics::detect_price(&body_text),
        images: extract_images(&document),
        source_url: Some(url.to_string()),
        external_id: EVENT_ID_RE
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        description,
        contact: heuristics::extract_contact_info(&body_text),
    };

    candidate.is_valid().then_some(candidate)
}
