//! Heuristic de-identification of inline names and date stamps.
//!
//! Names are learned per patient: every document of a patient is observed
//! first, then each is redacted against the complete registry, so a name
//! that only appears as a signature in the discharge record is still removed
//! from the admission record.

pub mod redact;
pub mod registry;

pub use redact::Deidentifier;
pub use registry::NameRegistry;
