//! Core types for the BRNNO marketplace.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Amount, FeeMode, FeeSplit, PLATFORM_FEE_PERCENT, PROVIDER_SHARE_PERCENT};
pub use status::*;
