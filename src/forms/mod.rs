//! Form automation for flows that have no JSON endpoint.
//!
//! ```text
//! forms/
//! ├── extract - CSRF token and component snapshot extraction
//! ├── outcome - update response interpretation
//! └── bridge  - page fetch + component update driver
//! ```

pub mod bridge;
pub mod extract;
pub mod outcome;

pub use bridge::{build_update_envelope, FormBridge};
pub use extract::{extract, extract_csrf, extract_snapshot, ComponentSnapshot, CsrfExtraction};
pub use outcome::{interpret_update, FormOutcome, PENDING_VERIFICATION_TOKEN};
