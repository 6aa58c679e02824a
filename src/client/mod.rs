//! HTTP client stack for the social API.
//!
//! Calls flow through three layers, each unaware of the one above it:
//!
//! - **Transport** executes exactly one HTTP call and classifies the result
//! - **Flight controller** coalesces identical in-flight calls, paces dispatch
//!   and retries on 429
//! - **ApiClient** attaches the session token and keeps session state current
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── api       - ApiClient façade
//! ├── config    - Client configuration and endpoint paths
//! ├── flight    - Request coalescing and retry loop
//! ├── pacing    - Shared dispatch spacing and 429 back-pressure
//! ├── transport - reqwest wrapper, 401 hook
//! └── utils     - Backoff helpers
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ApiClient`] | Façade used by the UI layer |
//! | [`FlightController`] | Coalescing, pacing and retry |
//! | [`Transport`] | One HTTP call, classified |
//! | [`ClientConfig`] | Client configuration options |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use social_api::client::{ApiClient, ClientConfig};
//!
//! let config = ClientConfig {
//!     base_url: "https://api.example.com/api/".into(),
//!     max_retries: 5,
//!     ..Default::default()
//! };
//! let client = ApiClient::new(config).unwrap();
//! assert!(!client.is_authenticated());
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use social_api::client::{exponential_backoff, rate_limit_delay};
//! use std::time::Duration;
//!
//! assert_eq!(exponential_backoff(2, 100), Duration::from_millis(400));
//!
//! // A server hint wins over the computed delay
//! let hinted = rate_limit_delay(0, Some(Duration::from_secs(3)), 1000, 30_000);
//! assert_eq!(hinted, Duration::from_secs(3));
//! ```

mod api;
pub mod config;
mod flight;
mod pacing;
pub mod transport;
mod utils;

pub use api::ApiClient;
pub use config::{ClientConfig, Endpoints};
pub use flight::FlightController;
pub use pacing::{DispatchEpoch, Pacer};
pub use transport::{Transport, UnauthorizedHook};
pub use utils::*;
