//! Business logic and external gateways.
//!
//! # Services
//!
//! - `auth` - sign-up/sign-in against the identity provider, profile bootstrap
//! - `payments` - payment processor gateway (intents, confirmation, payouts)
//! - `places` - address autocomplete, place details and geocoding
//! - `providers` - provider application submission, review and listings
//! - `referral` - waitlist referral codes
//! - `settlement` - background job that confirms payment for new bookings
//! - `waitlist` - pre-launch signups and referral credit

pub mod auth;
pub mod payments;
pub mod places;
pub mod providers;
pub mod referral;
pub mod settlement;
pub mod waitlist;
