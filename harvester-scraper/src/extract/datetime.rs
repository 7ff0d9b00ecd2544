//! Multi-format, multi-language date/time resolution for free-form text.
//!
//! The resolver is a fixed cascade of ordered rule tables: numeric date
//! formats first, then Polish month names, then English ones, then relative
//! weekdays. The first table that matches wins for each component. A bare
//! clock time without any date never resolves; the resolver does not guess
//! "today".

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Polish month names: genitive forms first (the usual case in dates), then
/// nominative, then short forms. Order matters: "marca" must be tried before
/// "mar" so the short form never clips a longer match.
static POLISH_MONTHS: &[(&str, u32)] = &[
    ("stycznia", 1),
    ("lutego", 2),
    ("marca", 3),
    ("kwietnia", 4),
    ("maja", 5),
    ("czerwca", 6),
    ("lipca", 7),
    ("sierpnia", 8),
    ("września", 9),
    ("października", 10),
    ("listopada", 11),
    ("grudnia", 12),
    ("styczeń", 1),
    ("luty", 2),
    ("marzec", 3),
    ("kwiecień", 4),
    ("maj", 5),
    ("czerwiec", 6),
    ("lipiec", 7),
    ("sierpień", 8),
    ("wrzesień", 9),
    ("październik", 10),
    ("listopad", 11),
    ("grudzień", 12),
    ("sty", 1),
    ("lut", 2),
    ("mar", 3),
    ("kwi", 4),
    ("cze", 6),
    ("lip", 7),
    ("sie", 8),
    ("wrz", 9),
    ("paź", 10),
    ("lis", 11),
    ("gru", 12),
];

static ENGLISH_MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

/// Weekday names for relative resolution, Monday = 0.
static POLISH_DAYS: &[(&str, u32)] = &[
    ("poniedziałek", 0),
    ("wtorek", 1),
    ("środa", 2),
    ("czwartek", 3),
    ("piątek", 4),
    ("sobota", 5),
    ("niedziela", 6),
    ("pn", 0),
    ("wt", 1),
    ("śr", 2),
    ("czw", 3),
    ("pt", 4),
    ("sob", 5),
    ("ndz", 6),
];

static DMY_DOTTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\.(\d{1,2})\.(\d{4})").expect("valid pattern"));
static DMY_DASHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})-(\d{1,2})-(\d{4})").expect("valid pattern"));
static YMD_ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").expect("valid pattern"));

static MONTH_NAME_PATTERNS: Lazy<Vec<(Regex, u32)>> = Lazy::new(|| {
    POLISH_MONTHS
        .iter()
        .chain(ENGLISH_MONTHS.iter())
        .map(|(name, month)| {
            let pattern = format!(r"(\d{{1,2}})\s+{}(?:\s+(\d{{4}}))?", name);
            (Regex::new(&pattern).expect("valid month pattern"), *month)
        })
        .collect()
});

static WEEKDAY_PATTERNS: Lazy<Vec<(Regex, u32)>> = Lazy::new(|| {
    POLISH_DAYS
        .iter()
        .map(|(name, offset)| {
            let pattern = format!(r"\b{}\b", name);
            (Regex::new(&pattern).expect("valid weekday pattern"), *offset)
        })
        .collect()
});

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[:.](\d{2})").expect("valid time pattern"));

static END_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"do\s+(\d{1,2})[:.](\d{2})|until\s+(\d{1,2})[:.](\d{2})|[-–]\s*(\d{1,2})[:.](\d{2})")
        .expect("valid end time pattern")
});

struct DateHit {
    day: u32,
    month: u32,
    year: i32,
    /// Byte span of the match in the lowercased text, blanked before time
    /// extraction so "15.12.2025" is never misread as a clock time.
    span: (usize, usize),
}

fn find_date(lower: &str, now: NaiveDateTime) -> Option<DateHit> {
    if let Some(c) = DMY_DOTTED.captures(lower) {
        let m = c.get(0).unwrap();
        return Some(DateHit {
            day: c[1].parse().ok()?,
            month: c[2].parse().ok()?,
            year: c[3].parse().ok()?,
            span: (m.start(), m.end()),
        });
    }
    if let Some(c) = DMY_DASHED.captures(lower) {
        let m = c.get(0).unwrap();
        return Some(DateHit {
            day: c[1].parse().ok()?,
            month: c[2].parse().ok()?,
            year: c[3].parse().ok()?,
            span: (m.start(), m.end()),
        });
    }
    if let Some(c) = YMD_ISO.captures(lower) {
        let m = c.get(0).unwrap();
        return Some(DateHit {
            year: c[1].parse().ok()?,
            month: c[2].parse().ok()?,
            day: c[3].parse().ok()?,
            span: (m.start(), m.end()),
        });
    }

    // Localized month names: primary language table first, then secondary.
    for (pattern, month) in MONTH_NAME_PATTERNS.iter() {
        if let Some(c) = pattern.captures(lower) {
            let m = c.get(0).unwrap();
            let day: u32 = c[1].parse().ok()?;
            let mut year: i32 = match c.get(2) {
                Some(y) => y.as_str().parse().ok()?,
                None => now.year(),
            };
            // Recurring announcements mean "the next occurrence": a month
            // already behind us rolls into next year
            if c.get(2).is_none() && *month < now.month() {
                year += 1;
            }
            return Some(DateHit {
                day,
                month: *month,
                year,
                span: (m.start(), m.end()),
            });
        }
    }

    // Relative weekday: next occurrence strictly after `now`; an exact
    // weekday match never means "today"
    for (pattern, offset) in WEEKDAY_PATTERNS.iter() {
        if let Some(m) = pattern.find(lower) {
            let mut days_ahead = *offset as i64 - now.weekday().num_days_from_monday() as i64;
            if days_ahead <= 0 {
                days_ahead += 7;
            }
            let target = now.date() + Duration::days(days_ahead);
            return Some(DateHit {
                day: target.day(),
                month: target.month(),
                year: target.year(),
                span: (m.start(), m.end()),
            });
        }
    }

    None
}

fn blank_span(text: &str, span: (usize, usize)) -> String {
    let mut masked = String::with_capacity(text.len());
    masked.push_str(&text[..span.0]);
    for _ in text[span.0..span.1].bytes() {
        masked.push(' ');
    }
    masked.push_str(&text[span.1..]);
    masked
}

/// Resolve free text into a `(start, end)` wall-time pair, relative to an
/// explicit `now` (never ambient time, so rollover logic stays testable).
/// Returns None when no date component is found, even if a time is present.
pub fn resolve(text: &str, now: NaiveDateTime) -> Option<(NaiveDateTime, Option<NaiveDateTime>)> {
    if text.is_empty() {
        return None;
    }
    let lower = text.to_lowercase();

    let hit = find_date(&lower, now)?;
    let date = NaiveDate::from_ymd_opt(hit.year, hit.month, hit.day)?;

    let masked = blank_span(&lower, hit.span);

    let mut start = date.and_hms_opt(0, 0, 0)?;
    if let Some(c) = TIME_RE.captures(&masked) {
        let mut hour: u32 = c[1].parse().ok()?;
        let minute: u32 = c[2].parse().ok()?;

        // 12-hour clock markers
        if masked.contains("pm") && hour < 12 {
            hour += 12;
        } else if masked.contains("am") && hour == 12 {
            hour = 0;
        }

        start = date.and_hms_opt(hour, minute, 0)?;
    }

    let mut end = None;
    if let Some(c) = END_TIME_RE.captures(&masked) {
        // The alternation yields one populated pair out of three
        for i in (1..=5).step_by(2) {
            if let (Some(h), Some(m)) = (c.get(i), c.get(i + 1)) {
                let end_hour: u32 = h.as_str().parse().ok()?;
                let end_minute: u32 = m.as_str().parse().ok()?;
                end = date.and_hms_opt(end_hour, end_minute, 0);
                break;
            }
        }
    }

    // An end clock earlier than the start clock means the event runs past
    // midnight; roll it to the next day so end never precedes start
    if let Some(e) = end {
        if e < start {
            end = Some(e + Duration::days(1));
        }
    }

    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        // A Sunday
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn dotted_date_without_time_resolves_to_midnight() {
        let (start, end) = resolve("Zapraszamy 15.12.2025", now()).unwrap();
        assert_eq!(start, dt(2025, 12, 15, 0, 0));
        assert_eq!(end, None);
    }

    #[test]
    fn dotted_date_with_time_is_not_misread_as_clock() {
        let (start, _) = resolve("15.12.2025, 18:00", now()).unwrap();
        assert_eq!(start, dt(2025, 12, 15, 18, 0));
    }

    #[test]
    fn polish_month_name_with_time() {
        let (start, end) = resolve("15 grudnia 2025 o 18:00", now()).unwrap();
        assert_eq!(start, dt(2025, 12, 15, 18, 0));
        assert_eq!(end, None);
    }

    #[test]
    fn english_month_name_with_pm_marker() {
        let (start, _) = resolve("15 december at 6:30 pm", now()).unwrap();
        assert_eq!(start, dt(2025, 12, 15, 18, 30));
    }

    #[test]
    fn iso_and_dashed_formats() {
        let (start, _) = resolve("event on 2025-12-15", now()).unwrap();
        assert_eq!(start, dt(2025, 12, 15, 0, 0));

        let (start, _) = resolve("15-12-2025 koncert", now()).unwrap();
        assert_eq!(start, dt(2025, 12, 15, 0, 0));
    }

    #[test]
    fn bare_time_never_resolves() {
        assert!(resolve("spotykamy się o 18:00", now()).is_none());
        assert!(resolve("", now()).is_none());
    }

    #[test]
    fn month_already_past_rolls_year_forward() {
        // now is June 2025; March has passed
        let (start, _) = resolve("5 marca godz. 10:00", now()).unwrap();
        assert_eq!(start, dt(2026, 3, 5, 10, 0));
    }

    #[test]
    fn explicit_year_suppresses_rollover() {
        let (start, _) = resolve("5 marca 2025", now()).unwrap();
        assert_eq!(start, dt(2025, 3, 5, 0, 0));
    }

    #[test]
    fn weekday_resolves_to_next_occurrence() {
        // now() is Sunday 2025-06-15; piątek (Friday) is five days ahead
        let (start, _) = resolve("piątek godz. 18:00", now()).unwrap();
        assert_eq!(start, dt(2025, 6, 20, 18, 0));
    }

    #[test]
    fn same_weekday_means_next_week_not_today() {
        // niedziela (Sunday) on a Sunday resolves seven days out
        let (start, _) = resolve("niedziela 12:00", now()).unwrap();
        assert_eq!(start, dt(2025, 6, 22, 12, 0));
    }

    #[test]
    fn end_time_from_do_marker() {
        let (start, end) = resolve("15.12.2025 od 18:00 do 21:30", now()).unwrap();
        assert_eq!(start, dt(2025, 12, 15, 18, 0));
        assert_eq!(end, Some(dt(2025, 12, 15, 21, 30)));
    }

    #[test]
    fn end_time_from_trailing_dash() {
        let (start, end) = resolve("15.12.2025 18:00-20:00", now()).unwrap();
        assert_eq!(start, dt(2025, 12, 15, 18, 0));
        assert_eq!(end, Some(dt(2025, 12, 15, 20, 0)));
    }

    #[test]
    fn past_midnight_end_rolls_to_next_day() {
        let (start, end) = resolve("31.12.2025 22:00-01:00", now()).unwrap();
        assert_eq!(start, dt(2025, 12, 31, 22, 0));
        assert_eq!(end, Some(dt(2026, 1, 1, 1, 0)));
    }

    #[test]
    fn invalid_calendar_date_fails() {
        assert!(resolve("31.02.2025", now()).is_none());
    }
}
