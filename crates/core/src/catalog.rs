//! The fixed service menu, booking time slots and form option lists.
//!
//! These are the same for every provider; bookings snapshot the chosen
//! service so later menu edits never rewrite history.

use serde::{Deserialize, Serialize};

use crate::types::{Amount, ServiceId};

/// A detailing service a customer can book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOffering {
    pub id: ServiceId,
    pub name: String,
    pub price: Amount,
    pub duration: String,
    pub description: String,
}

/// `(id, name, price, duration, description)` rows of the service menu.
const SERVICE_ROWS: [(&str, &str, u64, &str, &str); 6] = [
    (
        "1",
        "Basic Wash & Vacuum",
        50,
        "1 hour",
        "Exterior wash and interior vacuum",
    ),
    (
        "2",
        "Interior Detail",
        120,
        "2 hours",
        "Deep clean interior, seats, carpets, dashboard",
    ),
    (
        "3",
        "Exterior Detail",
        150,
        "2.5 hours",
        "Wash, clay bar, polish, wax",
    ),
    (
        "4",
        "Full Detail",
        200,
        "4 hours",
        "Complete interior and exterior detailing",
    ),
    (
        "5",
        "Paint Correction",
        400,
        "6 hours",
        "Multi-stage paint correction and polish",
    ),
    (
        "6",
        "Ceramic Coating",
        800,
        "8 hours",
        "Professional ceramic coating with warranty",
    ),
];

/// Bookable start times, in display form.
pub const TIME_SLOTS: [&str; 9] = [
    "8:00 AM", "9:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "1:00 PM", "2:00 PM", "3:00 PM",
    "4:00 PM",
];

/// Services a provider may list on their application.
pub const PROVIDER_SERVICE_OPTIONS: [&str; 8] = [
    "Basic Wash & Vacuum",
    "Interior Detailing",
    "Exterior Detailing",
    "Full Detail",
    "Paint Correction",
    "Ceramic Coating",
    "Headlight Restoration",
    "Engine Bay Cleaning",
];

/// Services a waitlist signup may express interest in.
pub const WAITLIST_SERVICE_OPTIONS: [&str; 7] = [
    "Basic Wash & Vacuum",
    "Interior Detailing",
    "Exterior Detailing",
    "Full Detail",
    "Paint Correction",
    "Ceramic Coating",
    "Not sure yet",
];

/// Legal structures accepted on a provider application.
pub const BUSINESS_TYPES: [&str; 4] = ["sole_proprietor", "llc", "corporation", "partnership"];

/// The full service menu.
#[must_use]
pub fn services() -> Vec<ServiceOffering> {
    SERVICE_ROWS
        .iter()
        .map(|&(id, name, price, duration, description)| ServiceOffering {
            id: ServiceId::new(id),
            name: name.to_owned(),
            price: Amount::new(price),
            duration: duration.to_owned(),
            description: description.to_owned(),
        })
        .collect()
}

/// Look up a service on the menu.
#[must_use]
pub fn find_service(id: &ServiceId) -> Option<ServiceOffering> {
    services().into_iter().find(|s| &s.id == id)
}

/// Whether `slot` is one of the bookable start times.
#[must_use]
pub fn is_time_slot(slot: &str) -> bool {
    TIME_SLOTS.contains(&slot)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_prices() {
        let prices: Vec<u64> = services().iter().map(|s| s.price.dollars()).collect();
        assert_eq!(prices, vec![50, 120, 150, 200, 400, 800]);
    }

    #[test]
    fn test_find_service() {
        let exterior = find_service(&ServiceId::new("3")).unwrap();
        assert_eq!(exterior.name, "Exterior Detail");
        assert!(find_service(&ServiceId::new("99")).is_none());
    }

    #[test]
    fn test_time_slots() {
        assert!(is_time_slot("8:00 AM"));
        assert!(is_time_slot("4:00 PM"));
        assert!(!is_time_slot("5:00 PM"));
    }
}
