#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Social API: network access layer
//!
//! Everything between the UI of a social-media client and the network: a
//! single HTTP transport, a flight controller that merges identical calls and
//! respects the server's rate limit, per-client session state, identity
//! resolution, and automation of the two server-rendered email forms that have
//! no JSON endpoint.
//!
//! ## Overview
//!
//! 1. **Transport** - one HTTP call, classified into a typed result
//! 2. **Flight controller** - coalescing, global pacing, 429 retry
//! 3. **Session** - token and identity with generation-checked writes
//! 4. **Identity resolver** - bootstrap/profile cascade
//! 5. **Form bridge** - CSRF/snapshot extraction and component updates
//! 6. **Registration flow** - state machine spanning the emailed link
//!
//! ## Client Usage
//!
//! ```ignore
//! use social_api::{ApiClient, ClientConfig, Params};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     social_api::logging::init();
//!     let client = ApiClient::new(ClientConfig::from_env())?;
//!
//!     client.on_unauthorized(|event| {
//!         eprintln!("signed out by {}", event.endpoint);
//!     });
//!
//!     let me = client.login("jane@example.com", "hunter2").await?;
//!     let posts = client
//!         .get("posts", Params::new().with("user_id", me.id))
//!         .await?;
//!     println!("{}", posts);
//!     Ok(())
//! }
//! ```
//!
//! ## Registration
//!
//! ```ignore
//! use social_api::{ApiClient, RegistrationFlow};
//!
//! async fn register(client: &ApiClient, email: &str) -> social_api::Result<()> {
//!     let mut flow = RegistrationFlow::default();
//!     flow.submit_email()?;
//!     let outcome = client.send_verification_email(email).await?;
//!     flow.on_outcome(outcome)?;
//!     // ...later, the emailed link delivers the real token
//!     flow.on_token_received("ABC123")?;
//!     let token = flow.begin_profile_completion()?;
//!     client.complete_registration(&token, "jane", "hunter2", None).await?;
//!     flow.on_registered()
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[client]** - Transport, flight controller, configuration and the façade
//! - **[error]** - Error taxonomy and result handling
//! - **[flow]** - Registration state machine
//! - **[forms]** - Form-automation bridge
//! - **[identity]** - Identity resolution cascade
//! - **[logging]** - Tracing subscriber bootstrap
//! - **[protocol]** - Header constants and query encoding
//! - **[session]** - Session state and persistence seam
//! - **[types]** - Request/response value types

pub mod client;
pub mod error;
pub mod flow;
pub mod forms;
pub mod identity;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod types;

pub use client::{ApiClient, ClientConfig, Endpoints, FlightController, Transport};
pub use error::{ApiError, Result};
pub use flow::{RegistrationFlow, RegistrationState};
pub use forms::{FormBridge, FormOutcome};
pub use identity::{Identity, IdentityResolver};
pub use protocol::Params;
pub use session::{MemorySessionStore, SessionSnapshot, SessionState, SessionStore};
pub use types::{ApiRequest, ApiResponse, RawResponse, UnauthorizedEvent, UserProfile};

#[cfg(test)]
mod tests;
