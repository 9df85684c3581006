//! Bounded collaborator calls
//!
//! Each call runs on a blocking worker of a private current-thread runtime and
//! is abandoned after the timeout. A call is attempted `1 + retries` times.
//! Abandoned workers are detached; dropping the caller never waits on them.
//!
//! A timed-out worker keeps its blocking-pool thread until the collaborator
//! returns. A collaborator that hangs forever would strand one thread per
//! attempt, so each collaborator may have at most `max_stranded` attempts
//! still running. Past that, calls fail as unavailable without spawning.
//!
//! `call` blocks the current thread and must not be used from inside an async
//! runtime.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use super::errors::{CollaboratorError, CollaboratorResult};

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 250;
/// Default retries after the first attempt
pub const DEFAULT_RETRIES: u32 = 1;
/// Default cap on a collaborator's attempts still running
pub const DEFAULT_MAX_STRANDED: usize = 8;

/// Releases an attempt's slot when the worker finishes, even after a timeout
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs fallible, possibly slow calls with a timeout and bounded retry
pub struct BoundedCaller {
    runtime: Option<Runtime>,
    timeout: Duration,
    retries: u32,
    max_stranded: usize,
    in_flight: Mutex<BTreeMap<&'static str, Arc<AtomicUsize>>>,
}

impl BoundedCaller {
    /// Creates a caller with its own runtime.
    ///
    /// # Errors
    ///
    /// Fails if the runtime cannot be built; the error is reported against
    /// `"runtime"` and callers treat every collaborator as unavailable.
    pub fn new(timeout: Duration, retries: u32) -> CollaboratorResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .thread_name("retrorule-collaborator")
            .build()
            .map_err(|e| CollaboratorError::unavailable("runtime", e.to_string()))?;

        Ok(Self {
            runtime: Some(runtime),
            timeout,
            retries,
            max_stranded: DEFAULT_MAX_STRANDED,
            in_flight: Mutex::new(BTreeMap::new()),
        })
    }

    /// Caps how many attempts per collaborator may still be running.
    /// Zero is treated as one.
    pub fn with_max_stranded(mut self, max_stranded: usize) -> Self {
        self.max_stranded = max_stranded.max(1);
        self
    }

    /// Attempts of `collaborator` still running, including abandoned ones
    pub fn in_flight(&self, collaborator: &'static str) -> usize {
        self.slots(collaborator).load(Ordering::SeqCst)
    }

    fn slots(&self, collaborator: &'static str) -> Arc<AtomicUsize> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(collaborator).or_default())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Runs `f` with the configured timeout, retrying on any failure.
    ///
    /// Returns the error of the last attempt when every attempt fails. A
    /// retry refused by the stranded-attempt cap also returns the previous
    /// attempt's error.
    pub fn call<T, F>(&self, collaborator: &'static str, f: F) -> CollaboratorResult<T>
    where
        T: Send + 'static,
        F: Fn() -> CollaboratorResult<T> + Send + Sync + 'static,
    {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| CollaboratorError::unavailable(collaborator, "runtime shut down"))?;

        let f = Arc::new(f);
        let slots = self.slots(collaborator);
        let timeout_ms = self.timeout.as_millis() as u64;
        let mut last_error = CollaboratorError::unavailable(collaborator, "no attempt made");

        for attempt_no in 0..=self.retries {
            let running = slots.fetch_add(1, Ordering::SeqCst);
            let guard = InFlight(Arc::clone(&slots));
            if running >= self.max_stranded {
                if attempt_no > 0 {
                    return Err(last_error);
                }
                return Err(CollaboratorError::unavailable(
                    collaborator,
                    format!("{} earlier attempts still running", running),
                ));
            }

            let job = Arc::clone(&f);
            let attempt = runtime.block_on(async {
                tokio::time::timeout(
                    self.timeout,
                    tokio::task::spawn_blocking(move || {
                        let _guard = guard;
                        (*job)()
                    }),
                )
                .await
            });

            last_error = match attempt {
                Ok(Ok(Ok(value))) => return Ok(value),
                Ok(Ok(Err(e))) => e,
                Ok(Err(join_error)) => {
                    CollaboratorError::unavailable(collaborator, join_error.to_string())
                }
                Err(_elapsed) => CollaboratorError::Timeout {
                    collaborator,
                    timeout_ms,
                },
            };
        }

        Err(last_error)
    }
}

impl Drop for BoundedCaller {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for BoundedCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCaller")
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("max_stranded", &self.max_stranded)
            .finish()
    }
}
