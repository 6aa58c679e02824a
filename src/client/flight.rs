//! Flight controller: coalescing, pacing and bounded retry over [`Transport`].
//!
//! Every typed call in the crate goes through [`FlightController::request`]:
//!
//! 1. **Coalesce** - the call is keyed by `(method, resolved URL)` plus the JSON
//!    body and the bearer token it is sent with. Calls under different tokens
//!    never share a ticket. If a ticket with that key is outstanding, the
//!    caller awaits the same shared future instead of dispatching again. Finished
//!    tickets stay joinable for a short linger so near-simultaneous bursts still
//!    merge; completed results are never cached beyond that.
//! 2. **Pace** - the shared [`Pacer`] spaces physical dispatches.
//! 3. **Retry** - 429s raise the mandated delay and are retried up to
//!    `max_retries`; transient network failures back off exponentially. Any
//!    other failure surfaces immediately.
//!
//! The controller never reads or writes session state; the bearer token is
//! passed in by the caller.

use crate::client::config::ClientConfig;
use crate::client::pacing::Pacer;
use crate::client::transport::Transport;
use crate::client::utils::{exponential_backoff, rate_limit_delay};
use crate::error::{ApiError, Result};
use crate::types::{ApiRequest, ApiResponse, RawResponse};
use futures::future::{BoxFuture, FutureExt, Shared};
use http::Method;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

type Ticket = Shared<BoxFuture<'static, Result<ApiResponse>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TicketKey {
    method: Method,
    url: String,
    body: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Clone)]
struct RetryPolicy {
    max_retries: u32,
    retry_delay_ms: u64,
    rate_limit_base_ms: u64,
    rate_limit_max_ms: u64,
    linger: Duration,
    enable_logging: bool,
}

struct FlightInner {
    transport: Transport,
    pacer: Pacer,
    tickets: Mutex<HashMap<TicketKey, Ticket>>,
    policy: RetryPolicy,
}

/// Request coalescer and rate limiter. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct FlightController {
    inner: Arc<FlightInner>,
}

impl FlightController {
    /// Wrap a transport with the pacing and retry policy from `config`
    pub fn new(transport: Transport, config: &ClientConfig) -> Self {
        Self {
            inner: Arc::new(FlightInner {
                transport,
                pacer: Pacer::new(config.min_spacing(), config.decay_step()),
                tickets: Mutex::new(HashMap::new()),
                policy: RetryPolicy {
                    max_retries: config.max_retries,
                    retry_delay_ms: config.retry_delay_ms,
                    rate_limit_base_ms: config.rate_limit_base_delay_ms,
                    rate_limit_max_ms: config.rate_limit_max_delay_ms,
                    linger: config.ticket_linger(),
                    enable_logging: config.enable_logging,
                },
            }),
        }
    }

    /// Underlying transport
    pub fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    /// Number of tickets currently registered (in flight or lingering)
    pub fn in_flight(&self) -> usize {
        self.inner.tickets.lock().len()
    }

    /// Currently mandated delay between dispatches
    pub async fn mandated_delay(&self) -> Duration {
        self.inner.pacer.mandated_delay().await
    }

    /// Issue a call, joining an identical in-flight one when possible.
    ///
    /// Every caller that joins a ticket receives the same outcome, error included.
    pub async fn request(&self, call: ApiRequest, token: Option<String>) -> Result<ApiResponse> {
        let url = self.inner.transport.resolve_url(&call)?;
        let key = TicketKey {
            method: call.method.clone(),
            url: url.to_string(),
            body: call.body.as_ref().map(|b| b.to_string()),
            token: token.clone().filter(|_| !call.unauthenticated),
        };

        let (ticket, fresh) = {
            let mut tickets = self.inner.tickets.lock();
            match tickets.get(&key) {
                Some(existing) => {
                    tracing::debug!(method = %key.method, url = %key.url, "joining in-flight request");
                    (existing.clone(), false)
                }
                None => {
                    let this = self.clone();
                    let ticket = async move { this.dispatch(&call, token.as_deref()).await }
                        .boxed()
                        .shared();
                    tickets.insert(key.clone(), ticket.clone());
                    (ticket, true)
                }
            }
        };

        if fresh {
            self.schedule_release(key, ticket.clone());
        }
        ticket.await
    }

    /// Issue a call without coalescing or status classification.
    ///
    /// Pacing and 429 retry still apply. Used by the form bridge, which needs the
    /// body of non-2xx responses.
    pub async fn request_raw(&self, call: ApiRequest) -> Result<RawResponse> {
        let transport = &self.inner.transport;
        let call = &call;
        self.paced(move || transport.execute_raw(call)).await
    }

    async fn dispatch(&self, call: &ApiRequest, token: Option<&str>) -> Result<ApiResponse> {
        let transport = &self.inner.transport;
        self.paced(move || transport.execute(call, token)).await
    }

    async fn paced<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = &self.inner.policy;
        let mut throttled = 0u32;
        let mut transient = 0u32;

        loop {
            let epoch = self.inner.pacer.wait_turn().await;
            match op().await {
                Err(ApiError::Throttled { retry_after }) => {
                    if throttled >= policy.max_retries {
                        tracing::warn!(attempts = throttled + 1, "rate limit retries exhausted");
                        return Err(ApiError::RateLimited {
                            attempts: throttled + 1,
                        });
                    }
                    let delay = rate_limit_delay(
                        throttled,
                        retry_after,
                        policy.rate_limit_base_ms,
                        policy.rate_limit_max_ms,
                    );
                    self.inner.pacer.throttle(delay).await;
                    if policy.enable_logging {
                        tracing::warn!(
                            "Rate limited (attempt {}), backing off for {:?}",
                            throttled + 1,
                            delay
                        );
                    }
                    sleep(delay).await;
                    throttled += 1;
                }
                Err(e) if e.is_retryable() && transient < policy.max_retries => {
                    let delay = exponential_backoff(transient, policy.retry_delay_ms);
                    if policy.enable_logging {
                        tracing::warn!(
                            "Request failed (attempt {}), retrying after {:?}: {}",
                            transient + 1,
                            delay,
                            e
                        );
                    }
                    sleep(delay).await;
                    transient += 1;
                }
                result => {
                    if !matches!(result, Err(ApiError::Network { .. })) {
                        self.inner.pacer.relax(epoch).await;
                    }
                    return result;
                }
            }
        }
    }

    fn schedule_release(&self, key: TicketKey, ticket: Ticket) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _ = ticket.clone().await;
            if !inner.policy.linger.is_zero() {
                sleep(inner.policy.linger).await;
            }
            let mut tickets = inner.tickets.lock();
            if tickets
                .get(&key)
                .is_some_and(|current| current.ptr_eq(&ticket))
            {
                tickets.remove(&key);
            }
        });
    }
}
