//! Selfie generation pipeline.
//!
//! The [`Orchestrator`](orchestrator::Orchestrator) sequences a generation
//! end to end: upload the user's photo, submit a prediction, poll it to a
//! terminal state, re-host the result, and always clean up the transient
//! upload.

pub mod error;
pub mod orchestrator;
