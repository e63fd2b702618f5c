//! Domain model for the design preview pipeline.
//!
//! Holds the preview job state machine, the guest quota rule, frame-angle
//! math, and the ports (`JobStore`, `SubjectCatalog`, `PromptBuilder`)
//! that the worker loop and the HTTP surface are written against.

pub mod error;
pub mod frames;
pub mod ports;
pub mod preview;
pub mod prompt;
pub mod quota;
pub mod types;
