//! Pawflux - pet activity extraction and analysis
//!
//! Pawflux turns loosely structured pet-camera activity documents into typed
//! events and aggregated reports through a deterministic pipeline:
//! record extraction → aggregation → insight generation → JSON encoding.
//!
//! ## Modules
//!
//! - **Pipeline**: documents or TSV exports in, reports, timelines and
//!   app-history records out
//! - **Dispatch**: camera and document requests proxied to a chat-completion
//!   backend, degrading to placeholder text when the backend is unavailable

pub mod aggregator;
pub mod config;
pub mod dispatch;
pub mod encoder;
pub mod error;
pub mod extractor;
pub mod insights;
pub mod interchange;
pub mod pipeline;
pub mod quality;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::Aggregator;
pub use config::{AggregatorConfig, ExtractorConfig, PawfluxConfig};
pub use error::{DispatchError, FluxError};
pub use extractor::{Extraction, Extractor};
pub use pipeline::{document_to_report, tsv_to_app_history, InputFormat, PawfluxProcessor};
pub use types::{Event, EventTimestamp, Report};

// Dispatch exports
pub use dispatch::{AnalysisMode, CompletionClient, Dispatcher};

/// Pawflux version embedded in all reports
pub const PAWFLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "pawflux";
