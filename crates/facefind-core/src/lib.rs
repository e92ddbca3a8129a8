//! facefind-core — Match decision logic for event-photo face matching.
//!
//! Pure domain types and the per-run decision machinery: candidate
//! ranking by face prominence and the threshold/dedupe ledger. No I/O;
//! the remote face service and the store live in sibling crates.

pub mod ledger;
pub mod ranker;
pub mod types;

pub use ledger::MatchLedger;
pub use ranker::rank_candidates;
pub use types::{Candidate, DetectedFace, FaceRect, MatchFailure, MatchReport, PhotoMatch};
