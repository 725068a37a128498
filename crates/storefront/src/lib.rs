//! BRNNO marketplace API library.
//!
//! Customers book mobile detailing through a step-gated wizard, providers
//! onboard through an application wizard reviewed by admins, and a
//! pre-launch waitlist tracks referrals. The binary in `main.rs` wires this
//! library to the environment; tests drive [`routes::build_app`] directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
