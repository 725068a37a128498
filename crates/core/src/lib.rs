//! BRNNO Core - Shared domain library.
//!
//! This crate provides the pure domain layer used by every BRNNO component:
//! - `storefront` - The marketplace HTTP API
//! - `cli` - Operator tools for migrations, approvals and reports
//!
//! # Architecture
//!
//! The core crate contains only types, state machines and reducers - no I/O,
//! no database access, no HTTP clients. Anything here can be exercised in a
//! plain unit test.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, money and status enums
//! - [`catalog`] - The fixed service menu and booking time slots
//! - [`wizard`] - The step-gated booking and provider-application flows
//! - [`analytics`] - Waitlist and provider dashboard aggregations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod analytics;
pub mod catalog;
pub mod types;
pub mod wizard;

pub use types::*;
