//! Domain types shared by the selfie generation crates.
//!
//! Holds the generation request, the prediction job state machine, stored
//! asset handles, and the core error type. Contains no I/O.

pub mod asset;
pub mod error;
pub mod generation;
pub mod job;
pub mod types;
