//! Per-run match bookkeeping.
//!
//! The compare loop is a fold over the ranked candidate list: each
//! candidate yields a confidence, and the ledger decides whether that
//! constitutes a new match. Keeping the decision here, separate from
//! persistence, makes the threshold/dedupe policy testable without any
//! remote service or store.

use std::collections::HashSet;

use crate::types::{MatchReport, PhotoMatch};

/// Accumulates match decisions for a single run.
///
/// A participant is matched against a *photo*, even though comparison
/// operates on individual faces. If several faces in one photo clear
/// the threshold, only the first one reached in ranked order counts;
/// later faces of an already-matched photo should not even be compared
/// (see [`is_matched`](Self::is_matched)).
#[derive(Debug)]
pub struct MatchLedger {
    threshold: f64,
    matched_photos: HashSet<String>,
    matches: Vec<PhotoMatch>,
}

impl MatchLedger {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            matched_photos: HashSet::new(),
            matches: Vec::new(),
        }
    }

    /// Whether this run has already matched the given photo. Callers
    /// check this before spending a rate-limited comparison on another
    /// face of the same photo.
    pub fn is_matched(&self, photo_id: &str) -> bool {
        self.matched_photos.contains(photo_id)
    }

    /// Record one comparison outcome. Returns the match to persist if
    /// the confidence clears the threshold and the photo has not
    /// already matched in this run.
    pub fn observe(&mut self, photo_id: &str, confidence: f64) -> Option<&PhotoMatch> {
        if confidence < self.threshold || self.matched_photos.contains(photo_id) {
            return None;
        }
        self.matched_photos.insert(photo_id.to_string());
        self.matches.push(PhotoMatch {
            photo_id: photo_id.to_string(),
            confidence,
        });
        self.matches.last()
    }

    /// Count of unique matched photos so far.
    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Finish the run, yielding matches in the order they were decided.
    pub fn into_report(self) -> MatchReport {
        MatchReport {
            success: true,
            match_count: self.matches.len(),
            matches: self.matches,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold_is_not_a_match() {
        let mut ledger = MatchLedger::new(60.0);
        assert!(ledger.observe("p1", 59.9).is_none());
        assert_eq!(ledger.match_count(), 0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut ledger = MatchLedger::new(60.0);
        let m = ledger.observe("p1", 60.0).unwrap();
        assert_eq!(m.photo_id, "p1");
        assert_eq!(m.confidence, 60.0);
    }

    #[test]
    fn test_second_face_of_matched_photo_is_ignored() {
        let mut ledger = MatchLedger::new(60.0);
        assert!(ledger.observe("p1", 80.0).is_some());
        assert!(ledger.observe("p1", 95.0).is_none());

        let report = ledger.into_report();
        assert_eq!(report.match_count, 1);
        // The first face reached in ranked order wins, not the highest.
        assert_eq!(report.matches[0].confidence, 80.0);
    }

    #[test]
    fn test_matches_keep_decision_order() {
        let mut ledger = MatchLedger::new(50.0);
        ledger.observe("p3", 55.0);
        ledger.observe("p1", 90.0);
        ledger.observe("p2", 70.0);

        let report = ledger.into_report();
        let ids: Vec<&str> = report.matches.iter().map(|m| m.photo_id.as_str()).collect();
        assert_eq!(ids, ["p3", "p1", "p2"]);
        assert_eq!(report.match_count, 3);
        assert!(report.success);
    }

    #[test]
    fn test_is_matched_reflects_observations() {
        let mut ledger = MatchLedger::new(60.0);
        assert!(!ledger.is_matched("p1"));
        ledger.observe("p1", 45.0);
        assert!(!ledger.is_matched("p1"));
        ledger.observe("p1", 75.0);
        assert!(ledger.is_matched("p1"));
    }

    #[test]
    fn test_failed_comparison_degraded_to_zero_never_matches() {
        // A remote comparison error surfaces as confidence 0 and must
        // simply read as "no match" for that candidate.
        let mut ledger = MatchLedger::new(45.0);
        assert!(ledger.observe("p1", 0.0).is_none());
        assert!(ledger.observe("p2", 50.0).is_some());
        assert_eq!(ledger.into_report().match_count, 1);
    }
}
