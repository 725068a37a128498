//! Status and classification enums for marketplace records.
//!
//! Every enum serializes to the lower-case string stored in documents and
//! round-trips through `Display`/`FromStr` with the same spelling.

use serde::{Deserialize, Serialize};

/// Implements `as_str`, `Display` and `FromStr` for a unit-only enum using
/// the listed wire names.
macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The stored string form of this value.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $kind, ": {}"), s)),
                }
            }
        }
    };
}

/// Lifecycle of a booking.
///
/// `Pending -> Confirmed -> Completed`, or `Cancelled` from either of the
/// first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

wire_enum!(BookingStatus, "booking status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl BookingStatus {
    /// Whether the booking may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Completed | Self::Cancelled)
        )
    }
}

/// Payment state of a booking.
///
/// `Pending -> Paid | Failed`, and `Paid -> Refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

wire_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// Kind of account a user profile represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Books services.
    #[default]
    Customer,
    /// Supplies services; set when a provider application is submitted.
    Provider,
}

wire_enum!(AccountType, "account type", {
    Customer => "customer",
    Provider => "provider",
});

/// Permission level of a user profile.
///
/// Admins are promoted out of band (operator CLI); sign-up always yields
/// `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

wire_enum!(Role, "role", {
    User => "user",
    Admin => "admin",
});

/// Status of a waitlist signup. Only `Pending` is ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    #[default]
    Pending,
}

wire_enum!(WaitlistStatus, "waitlist status", {
    Pending => "pending",
});

/// Review state of a provider application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

wire_enum!(ApplicationStatus, "application status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// How soon a waitlist signup wants service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Asap,
    Week,
    Month,
    Flexible,
}

wire_enum!(Urgency, "urgency", {
    Asap => "asap",
    Week => "week",
    Month => "month",
    Flexible => "flexible",
});

/// Vehicle class collected on the waitlist form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Sedan,
    Suv,
    Truck,
    Van,
    Luxury,
    Sports,
    Rv,
    Motorcycle,
}

wire_enum!(VehicleType, "vehicle type", {
    Sedan => "sedan",
    Suv => "suv",
    Truck => "truck",
    Van => "van",
    Luxury => "luxury",
    Sports => "sports",
    Rv => "rv",
    Motorcycle => "motorcycle",
});
