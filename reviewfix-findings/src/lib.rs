//! Findings ingestion.
//!
//! Findings come from static analyzers whose output format drifted over time: field names
//! changed casing and the container key went from plural to singular and back. Rather than
//! hard-coding one schema, the loader inspects which known keys are present, picks a
//! [`SchemaVariant`], and normalizes every record into the canonical [`Finding`] shape.
//!
//! Normalization is strict about required fields (a missing one is a [`SchemaError`]) and
//! tolerant about everything else: unknown fields are ignored and line numbers may arrive as
//! numbers or numeric strings. Range validity is the planner's job, not the loader's.
//!
//! [`Finding`]: reviewfix_types::Finding

mod load;
mod schema;

pub use load::{FindingsFormat, FindingsLoadError, LoadedFindings, load_findings, parse_findings};
pub use schema::{SchemaError, SchemaVariant, normalize};
