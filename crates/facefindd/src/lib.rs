//! facefindd — Event-photo face matching daemon.
//!
//! Attendees of an event submit a selfie; the daemon compares it
//! against the faces extracted from the event's photo set via a hosted
//! face-recognition API and records which photos they appear in.

pub mod config;
pub mod http;
pub mod pipeline;
pub mod store;

pub use http::{build_router, AppState};
