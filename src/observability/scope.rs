//! Request-scoped begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed
//! - Logs `{name}_INCOMPLETE` on drop if never closed

use std::cell::Cell;
use std::time::Instant;

use super::logger::Logger;

/// A scope that logs start and completion of one unit of work.
///
/// Every line it emits carries the fields given at creation plus `elapsed_ms`
/// on close.
///
/// ```ignore
/// let scope = ObservationScope::with_fields("RETRODICTION", &[("trace_id", &id)]);
/// // ... work ...
/// scope.complete_with_fields(&[("chains", "3")]);
/// ```
pub struct ObservationScope {
    name: &'static str,
    closed: Cell<bool>,
    fields: Vec<(&'static str, String)>,
    start: Instant,
}

impl ObservationScope {
    /// Opens a scope with no extra fields
    pub fn new(name: &'static str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Opens a scope whose fields are repeated on every line it logs
    pub fn with_fields(name: &'static str, fields: &[(&'static str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);

        Self {
            name,
            closed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            start: Instant::now(),
        }
    }

    fn base_fields(&self) -> Vec<(&str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }

    /// Milliseconds since the scope was opened
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    /// Closes the scope successfully
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Closes the scope successfully with extra fields
    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.closed.set(true);
        let elapsed = self.elapsed_ms().to_string();
        let mut all_fields = self.base_fields();
        all_fields.extend(extra_fields.iter().copied());
        all_fields.push(("elapsed_ms", &elapsed));
        Logger::info(&format!("{}_COMPLETE", self.name), &all_fields);
    }

    /// Closes the scope as failed
    pub fn fail(self, code: &str, reason: &str) {
        self.closed.set(true);
        let mut all_fields = self.base_fields();
        all_fields.push(("code", code));
        all_fields.push(("reason", reason));
        Logger::error(&format!("{}_FAILED", self.name), &all_fields);
    }

    /// Check if the scope has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.closed.get() {
            let mut all_fields = self.base_fields();
            all_fields.push(("reason", "scope dropped without completion"));
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &all_fields);
        }
    }
}
