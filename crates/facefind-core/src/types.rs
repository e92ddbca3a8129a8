use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in the coordinate system of the
/// source image (pixels, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub top: i64,
    pub left: i64,
    pub width: i64,
    pub height: i64,
}

impl FaceRect {
    /// Pixel area of the box. Used only as a prominence signal for
    /// ranking, never for identity. Saturates rather than overflowing
    /// on absurd remote-supplied dimensions.
    pub fn area(&self) -> i64 {
        self.width.saturating_mul(self.height)
    }
}

/// One face found by a single detection pass over one image.
///
/// The token is an opaque handle minted by the remote detection
/// service; it is not stable across repeated detection runs on the
/// same image, so a fresh pass must always replace the stored set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFace {
    pub token: String,
    pub rect: FaceRect,
}

/// A stored face belonging to some photo in the target event,
/// eligible for comparison against a selfie's reference face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub face_token: String,
    pub photo_id: String,
    pub rect: FaceRect,
}

/// One photo a participant was matched to, with the comparison
/// service's confidence preserved on its native scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoMatch {
    pub photo_id: String,
    pub confidence: f64,
}

/// Why a matching run terminated without comparing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchFailure {
    /// The selfie contained no detectable face; the participant must
    /// retake it. Distinct from a legitimate zero-match result.
    NoFaceInSelfie,
}

/// Outcome of one matching run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    pub success: bool,
    pub match_count: usize,
    pub matches: Vec<PhotoMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<MatchFailure>,
}

impl MatchReport {
    /// Terminal failure: nothing was compared, nothing was written.
    pub fn no_face_in_selfie() -> Self {
        Self {
            success: false,
            match_count: 0,
            matches: Vec::new(),
            reason: Some(MatchFailure::NoFaceInSelfie),
        }
    }

    /// Successful run that had nothing to compare (an event with no
    /// photos or no extracted faces yet).
    pub fn nothing_to_compare() -> Self {
        Self {
            success: true,
            match_count: 0,
            matches: Vec::new(),
            reason: None,
        }
    }
}
