// src/lib.rs
pub mod cache;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod index;
pub mod metadata;
pub mod normalizer;
pub mod pattern;
pub mod pipeline;
pub mod processor;
pub mod record;
pub mod rules;

pub use error::*;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Settings, ViaqConfig};
pub use diagnostics::{DiagnosticSink, MemorySink, Severity, TracingSink};
pub use index::{IndexRouter, RouteOutcome};
pub use metadata::{Identity, PipelineStage};
pub use normalizer::FieldNormalizer;
pub use pipeline::config::{ErrorStrategy, PipelineConfig};
pub use pipeline::context::{Event, ProcessingStats};
pub use pipeline::stream::StreamPipeline;
pub use processor::ViaqProcessor;
pub use record::{KeepFieldSet, Record};
pub use rules::{FormatterKind, IndexNameType};
