//! Domain models for the marketplace API.
//!
//! Each persisted model pairs a record (the fields written to the document
//! store) with the metadata the store assigns (`id`, timestamps).

pub mod booking;
pub mod provider;
pub mod session;
pub mod user;
pub mod waitlist;

pub use booking::Booking;
pub use provider::{ProviderApplication, ProviderListing};
pub use session::{SessionContext, SessionEvent, session_keys};
pub use user::{ProfileUpdate, UserProfile, UserProfileRecord};
pub use waitlist::{NewWaitlistEntry, WaitlistEntry};
