//! Core types for Best Wishes.
//!
//! This module provides type-safe wrappers for common domain concepts.

#[macro_use]
mod label;

pub mod catalog;
pub mod email;
pub mod id;
pub mod money;
pub mod role;
pub mod status;

pub use catalog::*;
pub use email::{Email, EmailError};
pub use id::*;
pub use money::*;
pub use role::Role;
pub use status::*;
