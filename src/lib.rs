pub mod client;
pub mod config;
pub mod extract;
pub mod listing;
pub mod models;
pub mod session;
pub mod transport;

pub use client::{AssistantClient, ClientError, ImageAttachment, SendOutcome};
pub use config::{BackendConfig, BackendMode};
pub use models::{Price, PriceValue, ProductRecord, normalize_price};
