//! Find/replace engine for office documents.
//!
//! The editing primitives of office documents are not trusted on their own.
//! The engine drives a [`DocumentSession`] through several redundant
//! replacement strategies per rule, reconciles their counts, and lets a
//! sample-based [`verification`] oracle decide which counts are believed.
//!
//! The [`ooxml`] module supplies the concrete editor: word-processor
//! documents (`.docx`, `.docm`) and workbooks (`.xlsx`, `.xlsm`) are edited
//! in-process, run by run, so formatting around a match survives.

pub mod engine;
pub mod ooxml;
pub mod rules;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_doubles;
pub mod verification;

pub use engine::{EngineError, EngineReport, ReplacementEngine, RuleOutcome, Strategy};
pub use ooxml::{OoxmlEditor, OoxmlOptions, OoxmlSession};
pub use rules::{Rule, RuleSet, RuleSetError};
pub use session::{
    BLOCK_SEPARATOR, DocumentFormat, DocumentKind, DocumentSession, Editor, SessionError,
};
pub use verification::{MAX_SAMPLES, SampleSet, Verdict};
