//! Domain models.
//!
//! Most types here are database rows (`sqlx::FromRow`) that serialize
//! straight to the camelCase JSON the API returns. Detail types combine a
//! parent row with its child rows.

pub mod category;
pub mod collaborative;
pub mod customization;
pub mod event;
pub mod feedback;
pub mod gift_contribution;
pub mod notification;
pub mod order;
pub mod order_summary;
pub mod product;
pub mod quote;
pub mod reminder;
pub mod session;
pub mod surprise_gift;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};
