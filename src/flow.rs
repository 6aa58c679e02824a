//! Registration flow state machine.
//!
//! ```text
//! Idle ──submit_email──▶ EmailSubmitted ──on_outcome──┬─▶ ValidationFailed ──acknowledge──▶ Idle
//!                                                      ├─▶ SessionExpired  ──acknowledge──▶ Idle
//!                                                      └─▶ AwaitingExternalVerification
//! AwaitingExternalVerification ──on_token_received──▶ TokenReceived
//!                              ──on_verification_timeout──▶ (unchanged)
//! TokenReceived ──begin_profile_completion──▶ ProfileCompletion ──on_registered──▶ Registered
//! ```
//!
//! The pending token is the only state needed to resume after a cold start; see
//! [`RegistrationFlow::resume`].

use crate::error::{ApiError, Result};
use crate::forms::FormOutcome;
use std::fmt;

/// Where a registration currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    /// Nothing submitted yet
    Idle,
    /// Verification email request in flight
    EmailSubmitted,
    /// The server rejected the email
    ValidationFailed(String),
    /// The form page went stale; start over
    SessionExpired,
    /// Waiting for the user to follow the emailed link
    AwaitingExternalVerification {
        /// Token obtained from the submission (possibly the pending placeholder)
        pending_token: String,
    },
    /// The emailed link delivered the real flow token
    TokenReceived {
        /// Flow token
        token: String,
    },
    /// Username/password form being filled
    ProfileCompletion {
        /// Flow token
        token: String,
    },
    /// Account created
    Registered,
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationState::Idle => "Idle",
            RegistrationState::EmailSubmitted => "EmailSubmitted",
            RegistrationState::ValidationFailed(_) => "ValidationFailed",
            RegistrationState::SessionExpired => "SessionExpired",
            RegistrationState::AwaitingExternalVerification { .. } => {
                "AwaitingExternalVerification"
            }
            RegistrationState::TokenReceived { .. } => "TokenReceived",
            RegistrationState::ProfileCompletion { .. } => "ProfileCompletion",
            RegistrationState::Registered => "Registered",
        };
        f.write_str(name)
    }
}

/// Tracks one registration attempt across the out-of-app email step.
#[derive(Debug, Clone)]
pub struct RegistrationFlow {
    state: RegistrationState,
}

impl Default for RegistrationFlow {
    fn default() -> Self {
        Self {
            state: RegistrationState::Idle,
        }
    }
}

impl RegistrationFlow {
    /// Rebuild the awaiting state from a persisted pending token.
    pub fn resume(pending_token: impl Into<String>) -> Self {
        Self {
            state: RegistrationState::AwaitingExternalVerification {
                pending_token: pending_token.into(),
            },
        }
    }

    /// Current state
    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    /// Pending token while awaiting verification
    pub fn pending_token(&self) -> Option<&str> {
        match &self.state {
            RegistrationState::AwaitingExternalVerification { pending_token } => {
                Some(pending_token)
            }
            _ => None,
        }
    }

    /// The email is being submitted.
    pub fn submit_email(&mut self) -> Result<()> {
        match self.state {
            RegistrationState::Idle
            | RegistrationState::ValidationFailed(_)
            | RegistrationState::SessionExpired => {
                self.state = RegistrationState::EmailSubmitted;
                Ok(())
            }
            _ => Err(self.invalid("submit email")),
        }
    }

    /// The bridge answered.
    pub fn on_outcome(&mut self, outcome: FormOutcome) -> Result<&RegistrationState> {
        if self.state != RegistrationState::EmailSubmitted {
            return Err(self.invalid("apply form outcome"));
        }
        self.state = match outcome {
            FormOutcome::ValidationError(message) => RegistrationState::ValidationFailed(message),
            FormOutcome::SessionExpired => RegistrationState::SessionExpired,
            FormOutcome::Success(token) | FormOutcome::Unrecognized(token) => {
                RegistrationState::AwaitingExternalVerification {
                    pending_token: token,
                }
            }
        };
        Ok(&self.state)
    }

    /// The user saw the failure; go back to the email form.
    pub fn acknowledge_failure(&mut self) -> Result<()> {
        match self.state {
            RegistrationState::ValidationFailed(_) | RegistrationState::SessionExpired => {
                self.state = RegistrationState::Idle;
                Ok(())
            }
            _ => Err(self.invalid("acknowledge failure")),
        }
    }

    /// A deep link, clipboard poll or foreground re-check delivered the token.
    pub fn on_token_received(&mut self, token: impl Into<String>) -> Result<()> {
        match self.state {
            RegistrationState::AwaitingExternalVerification { .. } => {
                self.state = RegistrationState::TokenReceived {
                    token: token.into(),
                };
                Ok(())
            }
            _ => Err(self.invalid("receive token")),
        }
    }

    /// Waiting timed out; keep the pending token and keep waiting.
    pub fn on_verification_timeout(&mut self) -> Result<()> {
        match self.state {
            RegistrationState::AwaitingExternalVerification { .. } => Ok(()),
            _ => Err(self.invalid("time out verification")),
        }
    }

    /// Start filling the profile form.
    pub fn begin_profile_completion(&mut self) -> Result<String> {
        let token = match &self.state {
            RegistrationState::TokenReceived { token } => token.clone(),
            _ => return Err(self.invalid("begin profile completion")),
        };
        self.state = RegistrationState::ProfileCompletion {
            token: token.clone(),
        };
        Ok(token)
    }

    /// The account was created.
    pub fn on_registered(&mut self) -> Result<()> {
        match self.state {
            RegistrationState::ProfileCompletion { .. } => {
                self.state = RegistrationState::Registered;
                Ok(())
            }
            _ => Err(self.invalid("complete registration")),
        }
    }

    fn invalid(&self, action: &str) -> ApiError {
        ApiError::InvalidTransition {
            state: self.state.to_string(),
            action: action.to_string(),
        }
    }
}
