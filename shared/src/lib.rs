//! Shared types for the QR ordering platform
//!
//! Domain models and push-event types used by the server and its
//! clients (customer web app, kitchen display, cashier terminal).

pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use message::{PushEvent, Room};
