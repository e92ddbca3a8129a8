//! Candidate ordering for the comparison loop.
//!
//! Every comparison costs one rate-limited remote call, so when the
//! candidate set is capped the most prominent faces must come first.
//! Prominence is bounding-box area: larger, closer faces are more
//! likely to be the intended subject and to compare reliably.

use crate::types::Candidate;

/// Order candidates by bounding-box area, largest first, and truncate
/// to `cap` entries if given.
///
/// The sort is stable, so candidates with equal area keep their input
/// order. Capping is a latency/quality trade-off, not a correctness
/// rule: candidates beyond the cap are simply not evaluated in this
/// run and can only be found by a later re-run.
pub fn rank_candidates(mut candidates: Vec<Candidate>, cap: Option<usize>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.rect.area().cmp(&a.rect.area()));
    if let Some(cap) = cap {
        candidates.truncate(cap);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FaceRect;

    fn candidate(token: &str, photo: &str, width: i64, height: i64) -> Candidate {
        Candidate {
            face_token: token.to_string(),
            photo_id: photo.to_string(),
            rect: FaceRect { top: 0, left: 0, width, height },
        }
    }

    #[test]
    fn test_ranking_is_area_descending() {
        let ranked = rank_candidates(
            vec![
                candidate("b", "p2", 20, 20),
                candidate("a", "p1", 30, 30),
                candidate("c", "p3", 10, 10),
            ],
            None,
        );
        let tokens: Vec<&str> = ranked.iter().map(|c| c.face_token.as_str()).collect();
        assert_eq!(tokens, ["a", "b", "c"]);

        let mut last_area = i64::MAX;
        for c in &ranked {
            assert!(c.rect.area() <= last_area);
            last_area = c.rect.area();
        }
    }

    #[test]
    fn test_equal_areas_keep_input_order() {
        let ranked = rank_candidates(
            vec![
                candidate("first", "p1", 20, 20),
                candidate("second", "p2", 20, 20),
                candidate("third", "p3", 20, 20),
            ],
            None,
        );
        let tokens: Vec<&str> = ranked.iter().map(|c| c.face_token.as_str()).collect();
        assert_eq!(tokens, ["first", "second", "third"]);
    }

    #[test]
    fn test_cap_truncates_after_sorting() {
        let ranked = rank_candidates(
            vec![
                candidate("small", "p1", 5, 5),
                candidate("big", "p2", 50, 50),
                candidate("mid", "p3", 20, 20),
            ],
            Some(2),
        );
        let tokens: Vec<&str> = ranked.iter().map(|c| c.face_token.as_str()).collect();
        assert_eq!(tokens, ["big", "mid"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(rank_candidates(Vec::new(), Some(10)).is_empty());
    }
}
