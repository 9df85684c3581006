//! Observability for the retrodiction engine
//!
//! - Structured logging (JSON lines)
//! - Monotonic counters
//! - Request begin/complete scopes
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on matching, tracing or ranking
//! 3. No background threads
//! 4. Deterministic output ordering
//!
//! # Usage
//!
//! ```ignore
//! use retrorule::observability::{log_event_with_fields, Event, Logger};
//!
//! log_event_with_fields(Event::TraceComplete, &[("chains", "2")]);
//! Logger::warn("RANKING_DEGRADED", &[("collaborator", "trust")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a typed event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a typed event with fields.
///
/// Severity follows the event: FATAL for request-ending events, WARN for
/// degraded operation, INFO otherwise.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else if event.is_degraded() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::StoreSnapshotTaken);
        log_event(Event::TraceComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::CollaboratorTimeout, &[("collaborator", "trust")]);
    }
}
