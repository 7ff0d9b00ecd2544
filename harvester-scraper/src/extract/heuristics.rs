//! Field heuristics over free-form post text.
//!
//! Every detector is driven by an explicit ordered rule table evaluated
//! first-match-wins, so precedence (FREE before PAID, gazetteer before
//! generic patterns, specific category keywords before generic ones) is
//! data, not control flow.

use harvester_core::{EventCategory, PriceType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Keywords that mark a post as event-like. Polish first, then English.
pub static EVENT_KEYWORDS: &[&str] = &[
    "koncert",
    "festiwal",
    "wydarzenie",
    "spektakl",
    "wystawa",
    "warsztaty",
    "spotkanie",
    "impreza",
    "zabawa",
    "pokaz",
    "prezentacja",
    "konferencja",
    "wykład",
    "prelekcja",
    "występ",
    "performance",
    "projekcja",
    "film",
    "concert",
    "festival",
    "event",
    "show",
    "exhibition",
    "workshop",
    "meeting",
    "party",
    "presentation",
    "lecture",
    "screening",
    "movie",
];

/// Ordered keyword-to-category table. Specific keywords (e.g. "projekcja")
/// must come before generic ones ("event").
pub static CATEGORY_RULES: &[(&str, EventCategory)] = &[
    ("koncert", EventCategory::Concert),
    ("concert", EventCategory::Concert),
    ("festiwal", EventCategory::Festival),
    ("festival", EventCategory::Festival),
    ("spektakl", EventCategory::Theatre),
    ("theatre", EventCategory::Theatre),
    ("theater", EventCategory::Theatre),
    ("teatr", EventCategory::Theatre),
    ("film", EventCategory::Cinema),
    ("movie", EventCategory::Cinema),
    ("cinema", EventCategory::Cinema),
    ("kino", EventCategory::Cinema),
    ("projekcja", EventCategory::Cinema),
    ("warsztaty", EventCategory::Workshop),
    ("workshop", EventCategory::Workshop),
    ("wykład", EventCategory::Workshop),
    ("lecture", EventCategory::Workshop),
    ("prelekcja", EventCategory::Workshop),
    ("degustacja", EventCategory::Food),
    ("kulinarn", EventCategory::Food),
    ("wystawa", EventCategory::Cultural),
    ("exhibition", EventCategory::Cultural),
    ("impreza", EventCategory::Cultural),
    ("event", EventCategory::Cultural),
];

/// Known venues and towns of the covered region. An exact substring hit here
/// beats any generic location pattern.
pub static REGION_GAZETTEER: &[&str] = &[
    "Ustrzyki Dolne",
    "Ustrzyki Górne",
    "Lesko",
    "Cisna",
    "Solina",
    "Polańczyk",
    "Wetlina",
    "Bereżki",
    "Muczne",
    "Czarna",
    "Baligród",
    "Komańcza",
    "Sanok",
    "Bieszczady",
    "Bieszczadach",
];

/// Date-shaped patterns used by the admission gate (bare times included:
/// a post with a clock time is likely an event announcement).
pub static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\d{1,2}\.\d{1,2}\.\d{4}",
        r"\d{1,2}\s+(?:stycznia|lutego|marca|kwietnia|maja|czerwca|lipca|sierpnia|września|października|listopada|grudnia)",
        r"\d{1,2}-\d{1,2}-\d{4}",
        r"\d{4}-\d{1,2}-\d{1,2}",
        r"\d{1,2}:\d{2}",
        r"\d{1,2}\.\d{2}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid date pattern"))
    .collect()
});

/// Free-entry patterns; checked before the paid group so a voluntary
/// donation amount never flips a free event to PAID.
static FREE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bwstęp\s+wolny\b",
        r"\bza\s+darmo\b",
        r"\bbezpłatn",
        r"\bgratis\b",
        r"\bfree\s+entry\b",
        r"\bfree\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid free pattern"))
    .collect()
});

static PAID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\d+\s*zł",
        r"\d+\s*pln",
        r"bilet",
        r"ticket",
        r"wstęp:\s*\d+",
        r"koszt",
        r"price",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid paid pattern"))
    .collect()
});

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:zł|PLN)").expect("valid amount pattern"));

/// Generic location patterns, tried only after the gazetteer misses.
/// Order: explicit label, capitalized phrase after a preposition, @-venue.
static LOCATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:miejsce|location|venue)[:\s]+([^\n,]+)",
        r"\b(?:w|in)\s+([A-ZŁĄĆĘŃÓŚŹŻ][a-złąćęńóśźż\s]+(?:Dolne|Górne|Nowy|Stary)?)",
        r"@\s*([A-ZŁĄĆĘŃÓŚŹŻ][a-złąćęńóśźż\s]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid location pattern"))
    .collect()
});

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s<>]+").expect("valid url pattern"));

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws pattern"));

static BOILERPLATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:See (?:more|translation)|Zobacz (?:więcej|tłumaczenie))")
        .expect("valid boilerplate pattern")
});

static PHONE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\+?48\s*\d{3}\s*\d{3}\s*\d{3}",
        r"\d{3}[-\s]?\d{3}[-\s]?\d{3}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid phone pattern"))
    .collect()
});

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email pattern")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub price_type: PriceType,
    pub amount: Option<f64>,
    pub currency: String,
}

impl Default for PriceInfo {
    fn default() -> Self {
        Self {
            price_type: PriceType::Free,
            amount: None,
            currency: "PLN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.email.is_none() && self.website.is_none()
    }
}

/// Collapse whitespace, strip URLs and feed boilerplate.
pub fn sanitize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = URL_RE.replace_all(text, "");
    let text = BOILERPLATE_RE.replace_all(&text, "");
    let text = WHITESPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Admission gate: a unit of content is worth full extraction only if it
/// mentions an event keyword or contains a date-shaped pattern. Biased
/// toward false negatives; spam is worse than a missed post.
pub fn is_event_like(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();

    if EVENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return true;
    }
    DATE_PATTERNS.iter().any(|p| p.is_match(text))
}

/// First keyword hit in table order wins; default CULTURAL.
pub fn detect_category(text: &str) -> EventCategory {
    let lower = text.to_lowercase();
    for (keyword, category) in CATEGORY_RULES {
        if lower.contains(keyword) {
            return *category;
        }
    }
    EventCategory::Cultural
}

/// Free patterns are checked before paid ones: free-entry announcements often
/// mention a voluntary donation amount which must not override FREE.
pub fn detect_price(text: &str) -> PriceInfo {
    let lower = text.to_lowercase();
    let mut result = PriceInfo::default();

    for pattern in FREE_PATTERNS.iter() {
        if pattern.is_match(&lower) {
            return result;
        }
    }

    for pattern in PAID_PATTERNS.iter() {
        if pattern.is_match(&lower) {
            result.price_type = PriceType::Paid;
            result.amount = AMOUNT_RE
                .captures(text)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok());
            return result;
        }
    }

    result
}

/// Gazetteer first (high confidence), then generic patterns. Generic matches
/// outside (3, 50) characters are discarded as noise.
pub fn extract_location(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let lower = text.to_lowercase();

    for known in REGION_GAZETTEER {
        if lower.contains(&known.to_lowercase()) {
            return Some((*known).to_string());
        }
    }

    for pattern in LOCATION_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(text) {
            if let Some(m) = captures.get(1) {
                let location = m.as_str().trim();
                let len = location.chars().count();
                if len > 3 && len < 50 {
                    return Some(location.to_string());
                }
            }
        }
    }

    None
}

/// Title: an emphasized span within [10, 200] chars wins; otherwise the first
/// line of the body if it fits the same bounds.
pub fn extract_title(emphasized: &[String], text: &str) -> Option<String> {
    for span in emphasized {
        let candidate = sanitize_text(span);
        let len = candidate.chars().count();
        if (10..=200).contains(&len) {
            return Some(candidate);
        }
    }

    let first_line = text.lines().next().map(sanitize_text).unwrap_or_default();
    let len = first_line.chars().count();
    if (10..=200).contains(&len) {
        return Some(first_line);
    }

    None
}

/// Organizer contact details mentioned in the post body.
pub fn extract_contact_info(text: &str) -> ContactInfo {
    let phone = PHONE_PATTERNS
        .iter()
        .find_map(|p| p.find(text))
        .map(|m| m.as_str().to_string());
    let email = EMAIL_RE.find(text).map(|m| m.as_str().to_string());
    let website = URL_RE.find(text).map(|m| m.as_str().to_string());

    ContactInfo {
        phone,
        email,
        website,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_keyword_beats_paid_looking_amount() {
        let price = detect_price("Wstęp wolny, dobrowolna wpłata 10 zł");
        assert_eq!(price.price_type, PriceType::Free);
        assert_eq!(price.amount, None);
    }

    #[test]
    fn paid_with_amount_extracts_number() {
        let price = detect_price("Bilety: 25 zł do nabycia w kasie");
        assert_eq!(price.price_type, PriceType::Paid);
        assert_eq!(price.amount, Some(25.0));
    }

    #[test]
    fn paid_without_amount_keeps_amount_empty() {
        let price = detect_price("Bilety dostępne wkrótce");
        assert_eq!(price.price_type, PriceType::Paid);
        assert_eq!(price.amount, None);
    }

    #[test]
    fn no_price_cue_defaults_to_free() {
        let price = detect_price("Zapraszamy serdecznie wszystkich");
        assert_eq!(price.price_type, PriceType::Free);
    }

    #[test]
    fn category_table_order_is_the_tie_break() {
        assert_eq!(detect_category("Projekcja filmu o górach"), EventCategory::Cinema);
        assert_eq!(detect_category("Wielki koncert rockowy"), EventCategory::Concert);
        assert_eq!(detect_category("Zwykłe ogłoszenie"), EventCategory::Cultural);
    }

    #[test]
    fn gazetteer_beats_generic_patterns() {
        let text = "Miejsce: Remiza OSP. Zapraszamy do Wetlina!";
        assert_eq!(extract_location(text), Some("Wetlina".to_string()));
    }

    #[test]
    fn label_pattern_used_when_gazetteer_misses() {
        let text = "Miejsce: Remiza OSP\nGodzina 18:00";
        assert_eq!(extract_location(text), Some("Remiza OSP".to_string()));
    }

    #[test]
    fn overlong_location_matches_are_discarded() {
        let long_name = format!("Miejsce: {}", "a".repeat(60));
        assert_eq!(extract_location(&long_name), None);
    }

    #[test]
    fn admission_gate_requires_keyword_or_date() {
        assert!(is_event_like("Zapraszamy na koncert"));
        assert!(is_event_like("Widzimy się 15.12.2025"));
        assert!(is_event_like("Spotykamy się o 18:00"));
        assert!(!is_event_like("Sprzedam opony zimowe"));
        assert!(!is_event_like(""));
    }

    #[test]
    fn title_prefers_emphasized_spans() {
        let emphasized = vec!["Koncert Noworoczny 2025".to_string()];
        let title = extract_title(&emphasized, "jakiś tekst\nKoncert Noworoczny 2025");
        assert_eq!(title, Some("Koncert Noworoczny 2025".to_string()));
    }

    #[test]
    fn title_falls_back_to_first_line_within_bounds() {
        let title = extract_title(&[], "Wieczór poezji śpiewanej\nSzczegóły wkrótce");
        assert_eq!(title, Some("Wieczór poezji śpiewanej".to_string()));

        // Too short a first line gives no title
        assert_eq!(extract_title(&[], "Hej\nDruga linia"), None);
    }

    #[test]
    fn sanitize_strips_urls_and_boilerplate() {
        let text = "Zapraszamy!   Zobacz więcej https://example.com/event \n\n Do zobaczenia";
        assert_eq!(sanitize_text(text), "Zapraszamy! Do zobaczenia");
    }

    #[test]
    fn contact_info_finds_phone_and_email() {
        let text = "Kontakt: 123-456-789, biuro@gok.pl, https://gok.pl";
        let contact = extract_contact_info(text);
        assert_eq!(contact.phone, Some("123-456-789".to_string()));
        assert_eq!(contact.email, Some("biuro@gok.pl".to_string()));
        assert_eq!(contact.website, Some("https://gok.pl".to_string()));
    }
}
