//! facefind-api — Adapters for the hosted face-recognition service.
//!
//! Wraps the remote detect and compare endpoints behind the
//! [`FaceService`] trait and provides the shared [`RateLimiter`] that
//! spaces out calls against the per-credential quota.

pub mod client;
pub mod rate_limit;

pub use client::{FaceApiError, FaceService, FaceServiceClient, FaceServiceConfig};
pub use rate_limit::RateLimiter;
