//! Event listings.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::SanityClient;

const EVENTS_QUERY: &str = r#"*[_type == "event"] | order(sortOrder asc, startDate asc) {
  _id,
  name,
  location,
  startDate,
  endDate,
  link,
  isNext,
  "logoUrl": logo.asset->url
}"#;

/// An event as shown on the events page and homepage slider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Full date or range, e.g. `3 – 5 May 2026`.
    pub date: String,
    pub date_month_abbr: String,
    /// Day or day range for the date badge, e.g. `3–5`.
    pub date_day_display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub is_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDocument {
    #[serde(rename = "_id")]
    id: String,
    name: Option<String>,
    location: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    link: Option<String>,
    is_next: Option<bool>,
    logo_url: Option<String>,
}

/// Events split around today.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventsSplit {
    pub upcoming: Vec<EventItem>,
    /// Most recent first.
    pub past: Vec<EventItem>,
}

/// Load all events, ordered as curated in the CMS.
///
/// Returns an empty list when no client is configured or the query fails.
#[instrument(skip(client))]
pub async fn load_events(client: Option<&SanityClient>) -> Vec<EventItem> {
    let Some(client) = client else {
        return Vec::new();
    };

    match client.query::<Vec<EventDocument>>(EVENTS_QUERY).await {
        Ok(docs) => build_events(docs),
        Err(e) => {
            warn!(error = %e, "Failed to load events");
            Vec::new()
        }
    }
}

fn build_events(docs: Vec<EventDocument>) -> Vec<EventItem> {
    let mut events: Vec<EventItem> = docs
        .into_iter()
        .filter_map(|doc| {
            let start = doc.start_date?;
            let (month_abbr, day_display) = card_display(&start, doc.end_date.as_deref());
            Some(EventItem {
                id: doc.id,
                name: doc.name.unwrap_or_else(|| "Event".to_string()),
                location: doc.location.unwrap_or_default(),
                date: format_date_range(&start, doc.end_date.as_deref()),
                date_month_abbr: month_abbr,
                date_day_display: day_display,
                start_date: Some(start),
                end_date: doc.end_date,
                link: doc.link,
                is_next: doc.is_next.unwrap_or(false),
                logo_url: doc.logo_url,
            })
        })
        .collect();

    if !events.iter().any(|e| e.is_next)
        && let Some(first) = events.first_mut()
    {
        first.is_next = true;
    }

    events
}

/// Split events into upcoming and past relative to `today`.
#[must_use]
pub fn split_events(events: Vec<EventItem>, today: NaiveDate) -> EventsSplit {
    let (upcoming, mut past): (Vec<_>, Vec<_>) =
        events.into_iter().partition(|e| is_upcoming(e, today));
    past.reverse();
    EventsSplit { upcoming, past }
}

/// First `limit` upcoming events.
#[must_use]
pub fn upcoming_events(events: Vec<EventItem>, today: NaiveDate, limit: usize) -> Vec<EventItem> {
    events
        .into_iter()
        .filter(|e| is_upcoming(e, today))
        .take(limit)
        .collect()
}

/// An event is upcoming until the end of its last day.
#[must_use]
pub fn is_upcoming(event: &EventItem, today: NaiveDate) -> bool {
    event
        .end_date
        .as_deref()
        .or(event.start_date.as_deref())
        .and_then(parse_date)
        .is_some_and(|last_day| last_day >= today)
}

/// Today's date in UTC.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates.
fn parse_date(value: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}

fn long_date(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}

fn month_abbr(date: NaiveDate) -> String {
    // en-GB abbreviates September with four letters
    if date.month() == 9 {
        "Sept".to_string()
    } else {
        date.format("%b").to_string()
    }
}

fn format_date_range(start: &str, end: Option<&str>) -> String {
    let Some(start_date) = parse_date(start) else {
        return String::new();
    };
    let start_str = long_date(start_date);

    let Some(end_date) = end.and_then(parse_date) else {
        return start_str;
    };
    let end_str = long_date(end_date);

    if start_str == end_str {
        start_str
    } else if start_date.month() == end_date.month() && start_date.year() == end_date.year() {
        format!(
            "{} – {} {}",
            start_date.day(),
            end_date.day(),
            end_date.format("%B %Y")
        )
    } else {
        format!("{start_str} – {end_str}")
    }
}

fn card_display(start: &str, end: Option<&str>) -> (String, String) {
    let Some(start_date) = parse_date(start) else {
        return (String::new(), String::new());
    };
    let abbr = month_abbr(start_date);

    let Some(end_date) = end.and_then(parse_date) else {
        return (abbr, start_date.day().to_string());
    };

    let day = if start_date.day() == end_date.day() && start_date.month() == end_date.month() {
        start_date.day().to_string()
    } else if start_date.month() == end_date.month() && start_date.year() == end_date.year() {
        format!("{}–{}", start_date.day(), end_date.day())
    } else {
        format!("{}+", start_date.day())
    };

    (abbr, day)
}
