//! Business logic that spans more than one repository.
//!
//! # Services
//!
//! - `auth` - Password accounts, OTP and password reset codes
//! - `chatbot` - Stateless gift-finder conversation
//! - `collaborative` - Split-payment purchases and their transactional flows
//! - `email` - Transactional email over SMTP
//! - `fulfillment` - Order and surprise gift status changes, with stock commit
//! - `notifications` - Stored notifications, live push, and status emails
//! - `recommendations` - Occasion keyword matching over the catalog
//! - `reminders` - Background delivery of event reminders

pub mod auth;
pub mod chatbot;
pub mod collaborative;
pub mod email;
pub mod fulfillment;
pub mod notifications;
pub mod recommendations;
pub mod reminders;
