//! Best Wishes Core - Shared domain types.
//!
//! This crate provides the types used across the Best Wishes workspace:
//! - `server` - The JSON API behind the gifting storefront
//! - `cli` - Command-line tools for migrations, staff accounts, and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Status transition tables and money arithmetic live
//! here so they can be tested without a running server.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, roles, statuses, catalog enums, and money helpers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
