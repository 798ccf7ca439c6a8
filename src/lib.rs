//! Compiler for the IANA time zone database text format.
//!
//! ```text
//! tzdb text ──> Extractor ──> Transformer ──> Estimator ──> Assembler ──> ZoneInfoDatabase
//!               (raw maps)    (validated,     (buffer       (tables,       └─ to_json()
//!                             truncated)       sizes)        encoding)
//! ```
//!
//! Each stage is usable on its own; [`compile`] runs them in order and
//! times them.

#[macro_use]
mod macros;
mod api;
mod calendar;

pub mod assembler;
pub mod error;
pub mod estimator;
pub mod extractor;
pub mod metrics;
pub mod scope;
pub mod transformer;
pub mod types;

pub use api::{CompileOptions, CompileOutput, SourceFile, compile};
pub use assembler::{ZoneInfoDatabase, assemble};
pub use error::{CompileError, EncodingRangeError, EstimateError, ParseError, ValidationError};
pub use estimator::{BufferSize, BufferStats, DEFAULT_MAX_TRANSITIONS, estimate};
pub use extractor::{Extractor, RawDatabase, parse};
pub use scope::{Scope, ScopeConfig};
pub use transformer::{TransformOptions, ValidatedDatabase, transform};
