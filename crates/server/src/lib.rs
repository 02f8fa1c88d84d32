//! Best Wishes API server library.
//!
//! The binary in `main.rs` wires these modules into an axum server. They are
//! exposed as a library so route helpers and services can be tested directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
