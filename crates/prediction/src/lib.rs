//! Prediction service client and job poller.
//!
//! Provides the [`PredictionService`](service::PredictionService) seam, a
//! REST client for Replicate-style `/v1/predictions` endpoints, typed wire
//! messages, exponential backoff helpers, and the bounded, cancellable
//! [`JobPoller`](poller::JobPoller) that drives a submitted job to a
//! terminal state.

pub mod api;
pub mod backoff;
pub mod messages;
pub mod poller;
pub mod service;
