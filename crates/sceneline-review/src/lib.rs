//! Review coordination for escalated screenplay lines.
//!
//! A request is validated, turned into a prompt, sent to the decision
//! service (primary, then fallback, inside one time budget), and the reply
//! is reconciled into decisions plus coverage metadata.

pub mod config;
pub mod coordinator;
pub mod coverage;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod transport;
pub mod validate;

pub use config::ReviewerConfig;
pub use coordinator::{ReviewCoordinator, apply_decisions};
pub use coverage::{compute_coverage, status_for};
pub use error::{TransportError, ValidationError, ValidationErrorBody};
pub use parse::{ParsedDecisions, parse_decisions};
pub use prompt::{ReviewPayload, build_payload};
#[cfg(feature = "http")]
pub use transport::MessagesTransport;
pub use transport::ReviewTransport;
pub use validate::{Validate, validate_request};
