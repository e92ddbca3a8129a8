//! The matching pipeline: selfie → ranked candidates → rate-limited
//! comparison loop → persisted matches.
//!
//! One run is intentionally a single sequential loop. The remote
//! service enforces its quota per credential, so comparisons cannot be
//! fanned out; the shared [`RateLimiter`] is the only coordination
//! point between concurrent runs.

use std::sync::Arc;

use facefind_api::{FaceService, RateLimiter};
use facefind_core::{rank_candidates, MatchLedger, MatchReport};
use thiserror::Error;

use crate::store::{MatchStore, StoreError};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The data store is unreachable or rejected a required write.
    /// Adapter failures never surface here; they degrade per candidate.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of a full re-detection pass over an event's photo set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RefreshReport {
    pub processed_photos: usize,
    pub total_faces: usize,
}

/// Orchestrates matching and detection runs against one face service
/// credential. Shared across request handlers via `Arc`.
pub struct MatchEngine<S, F> {
    store: S,
    faces: F,
    limiter: Arc<RateLimiter>,
    /// Minimum confidence for a comparison to count as a match, on the
    /// service's native scale. Operationally tuned, so injected rather
    /// than hardcoded.
    threshold: f64,
    /// Upper bound on candidates compared per run. Bounds worst-case
    /// wall-clock time at `cap × rate-limit interval`.
    candidate_cap: usize,
}

impl<S: MatchStore, F: FaceService> MatchEngine<S, F> {
    pub fn new(
        store: S,
        faces: F,
        limiter: Arc<RateLimiter>,
        threshold: f64,
        candidate_cap: usize,
    ) -> Self {
        Self { store, faces, limiter, threshold, candidate_cap }
    }

    /// Match a participant's selfie against every face extracted from
    /// the event's photos.
    ///
    /// Match rows are written as soon as they are decided, so partial
    /// progress survives a mid-run crash. The participant's
    /// denormalized count is written once, after the loop, from this
    /// run's unique matched photos only — a re-run overwrites the
    /// count (it never increments) but leaves prior match rows in
    /// place.
    pub async fn run_match(
        &self,
        participant_id: &str,
        selfie_url: &str,
        event_id: &str,
    ) -> Result<MatchReport, PipelineError> {
        // The detection endpoint draws on the same per-credential
        // quota as comparison, so the selfie detect claims a turn too.
        self.limiter.wait_turn().await;
        let selfie_faces = self.faces.detect(selfie_url).await;
        let Some(selfie) = selfie_faces.first() else {
            tracing::info!(participant_id, "no face detected in selfie");
            return Ok(MatchReport::no_face_in_selfie());
        };

        let candidates = self.store.candidate_faces_for_event(event_id).await?;
        if candidates.is_empty() {
            tracing::info!(event_id, "event has no candidate faces yet");
            return Ok(MatchReport::nothing_to_compare());
        }

        let total = candidates.len();
        let ranked = rank_candidates(candidates, Some(self.candidate_cap));
        tracing::info!(
            participant_id,
            event_id,
            candidates = total,
            compared = ranked.len(),
            "starting comparison loop"
        );

        let mut ledger = MatchLedger::new(self.threshold);
        for candidate in &ranked {
            // A photo that already matched this run cannot match
            // again; skip before spending a rate-limited call.
            if ledger.is_matched(&candidate.photo_id) {
                continue;
            }

            self.limiter.wait_turn().await;
            let confidence = self.faces.compare(&selfie.token, &candidate.face_token).await;
            tracing::debug!(photo_id = %candidate.photo_id, confidence, "compared candidate");

            if let Some(m) = ledger.observe(&candidate.photo_id, confidence) {
                // Failed inserts are logged and skipped; the decision
                // stands and the loop continues. A retried insert is a
                // no-op thanks to the unique (participant, photo) index.
                if let Err(err) = self
                    .store
                    .insert_match(participant_id, &m.photo_id, m.confidence)
                    .await
                {
                    tracing::warn!(
                        photo_id = %m.photo_id,
                        error = %err,
                        "failed to persist match; continuing"
                    );
                }
            }
        }

        let report = ledger.into_report();
        self.store
            .set_participant_match_count(participant_id, report.match_count)
            .await?;

        tracing::info!(participant_id, matches = report.match_count, "matching run complete");
        Ok(report)
    }

    /// Run one detection pass for a photo and store its faces,
    /// replacing any faces from a previous pass.
    pub async fn ingest_photo(&self, photo_id: &str, image_url: &str) -> Result<usize, PipelineError> {
        self.limiter.wait_turn().await;
        let faces = self.faces.detect(image_url).await;
        self.store.replace_photo_faces(photo_id, faces.clone()).await?;
        tracing::info!(photo_id, faces = faces.len(), "detection pass stored");
        Ok(faces.len())
    }

    /// Re-detect faces for every photo in an event. Each photo's face
    /// set is replaced atomically, so a refresh that dies partway
    /// leaves every photo with exactly one coherent detection pass.
    pub async fn refresh_event(&self, event_id: &str) -> Result<RefreshReport, PipelineError> {
        let photos = self.store.photos_for_event(event_id).await?;
        tracing::info!(event_id, photos = photos.len(), "refreshing face tokens");

        let mut total_faces = 0;
        for photo in &photos {
            total_faces += self.ingest_photo(&photo.id, &photo.original_url).await?;
        }

        Ok(RefreshReport {
            processed_photos: photos.len(),
            total_faces,
        })
    }
}
