//! Stored bookings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use brnno_core::BookingId;
use brnno_core::analytics::{BookingFacts, relative_day_label};
use brnno_core::wizard::booking::BookingRecord;

/// A persisted booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    #[serde(flatten)]
    pub record: BookingRecord,
    /// Processor payment intent, created by settlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    #[must_use]
    pub fn facts(&self) -> BookingFacts<BookingId> {
        BookingFacts {
            key: self.id.clone(),
            date: self.record.date,
            provider_amount: self.record.provider_amount,
        }
    }
}

/// A booking as listed on a provider's dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingBooking {
    pub id: BookingId,
    pub customer: String,
    pub service: String,
    pub vehicle: String,
    pub date: String,
    pub time: String,
    pub address: String,
}

impl UpcomingBooking {
    /// Dashboard row for `booking`, with the date relative to `today`.
    #[must_use]
    pub fn new(booking: &Booking, today: NaiveDate) -> Self {
        let record = &booking.record;
        Self {
            id: booking.id.clone(),
            customer: record.customer_name.clone(),
            service: record.service.name.clone(),
            vehicle: record.vehicle.label(),
            date: relative_day_label(record.date, today),
            time: record.time.clone(),
            address: record.address.clone(),
        }
    }
}
