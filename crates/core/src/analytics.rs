//! Aggregations over waitlist signups and provider bookings.
//!
//! Everything here is a pure reducer over records the caller has already
//! loaded. Grouping keys keep first-seen order so that "top" selection breaks
//! ties by iteration order, and records missing a grouping field are counted
//! under [`UNKNOWN`].

use chrono::{DateTime, Days, NaiveDate, TimeDelta, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::types::Amount;

/// Bucket for records without a value for the grouped field.
pub const UNKNOWN: &str = "Unknown";

/// Window for [`WaitlistAnalytics::recent_signups`].
pub const RECENT_WINDOW: TimeDelta = TimeDelta::hours(24);

/// Frequency table that remembers the order keys were first seen.
///
/// Serializes as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    entries: Vec<(String, u64)>,
}

impl Tally {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Count one occurrence of `key`.
    pub fn add(&mut self, key: &str) {
        if let Some((_, count)) = self.entries.iter_mut().find(|(k, _)| k == key) {
            *count += 1;
        } else {
            self.entries.push((key.to_owned(), 1));
        }
    }

    /// Count one occurrence of `key`, or of [`UNKNOWN`] when absent or blank.
    pub fn add_or_unknown(&mut self, key: Option<&str>) {
        match key.map(str::trim) {
            Some(k) if !k.is_empty() => self.add(k),
            _ => self.add(UNKNOWN),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> u64 {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map_or(0, |(_, c)| *c)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), *c))
    }

    /// The key with the highest count; the earliest-seen key wins ties.
    #[must_use]
    pub fn top(&self) -> Option<(&str, u64)> {
        let mut best: Option<(&str, u64)> = None;
        for (key, count) in self.iter() {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((key, count));
            }
        }
        best
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, count) in &self.entries {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

/// The fields of a waitlist signup that analytics groups on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignupFacts<'a> {
    pub city: Option<&'a str>,
    pub services_interested: &'a [String],
    pub how_soon: Option<&'a str>,
    pub vehicle_type: Option<&'a str>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Grouped counts over the waitlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistAnalytics {
    pub total_count: u64,
    pub by_city: Tally,
    /// One count per service named in each signup's interest list.
    pub by_service: Tally,
    pub by_urgency: Tally,
    pub by_vehicle_type: Tally,
    /// Signups created within [`RECENT_WINDOW`] before `now`.
    pub recent_signups: u64,
}

impl WaitlistAnalytics {
    /// Reduce `signups` into grouped counts relative to `now`.
    pub fn aggregate<'a, I>(signups: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = SignupFacts<'a>>,
    {
        let cutoff = now - RECENT_WINDOW;
        let mut out = Self::default();

        for signup in signups {
            out.total_count += 1;
            out.by_city.add_or_unknown(signup.city);
            for service in signup.services_interested {
                out.by_service.add(service);
            }
            out.by_urgency.add_or_unknown(signup.how_soon);
            out.by_vehicle_type.add_or_unknown(signup.vehicle_type);
            if signup.created_at.is_some_and(|t| t >= cutoff) {
                out.recent_signups += 1;
            }
        }
        out
    }

    /// City with the most signups.
    #[must_use]
    pub fn top_city(&self) -> Option<(&str, u64)> {
        self.by_city.top()
    }

    /// Most requested service.
    #[must_use]
    pub fn top_service(&self) -> Option<(&str, u64)> {
        self.by_service.top()
    }
}

/// The fields of a booking that the provider dashboard reads.
#[derive(Debug, Clone)]
pub struct BookingFacts<K> {
    /// Caller's handle for the booking (usually its ID).
    pub key: K,
    pub date: NaiveDate,
    pub provider_amount: Amount,
}

/// Headline numbers for a provider's dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats<K> {
    /// Bookings scheduled for today.
    pub today_bookings: u64,
    /// Sum of provider payouts for bookings dated within the last 7 days
    /// (or later).
    pub week_revenue: Amount,
    pub total_jobs: u64,
    /// Up to [`DashboardStats::UPCOMING_LIMIT`] bookings from today on,
    /// soonest first.
    pub upcoming: Vec<K>,
}

impl<K: Clone> DashboardStats<K> {
    pub const UPCOMING_LIMIT: usize = 5;

    pub fn compute(bookings: &[BookingFacts<K>], today: NaiveDate) -> Self {
        let week_start = today.checked_sub_days(Days::new(7)).unwrap_or(NaiveDate::MIN);

        let today_bookings = bookings.iter().filter(|b| b.date == today).count() as u64;
        let week_revenue = bookings
            .iter()
            .filter(|b| b.date >= week_start)
            .map(|b| b.provider_amount)
            .sum();

        let mut upcoming: Vec<&BookingFacts<K>> =
            bookings.iter().filter(|b| b.date >= today).collect();
        upcoming.sort_by_key(|b| b.date);

        Self {
            today_bookings,
            week_revenue,
            total_jobs: bookings.len() as u64,
            upcoming: upcoming
                .into_iter()
                .take(Self::UPCOMING_LIMIT)
                .map(|b| b.key.clone())
                .collect(),
        }
    }
}

/// "Today", "Tomorrow" or the ISO date, for upcoming-booking lists.
#[must_use]
pub fn relative_day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_owned()
    } else if today.succ_opt() == Some(date) {
        "Tomorrow".to_owned()
    } else {
        date.to_string()
    }
}
