//! Thread identity: encoding and decoding of the opaque conversation id.
//!
//! A thread is (event id, counterpart user id) from the viewer's point of
//! view. The canonical wire format joins both with `--`. Historical data
//! used a single `_`, which is ambiguous because seeded ids contain
//! underscores themselves (`usr_100`, `pub_001`). Decoding therefore
//! returns an ordered candidate list; callers must existence-check each
//! candidate against the store and take the first that resolves.

use std::collections::HashSet;

/// Upper bound on decoded candidates. The underscore sweep is a heuristic
/// of last resort and must not do unbounded work on pathological input.
const MAX_CANDIDATES: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadParts {
    pub event_id: String,
    pub other_user_id: String,
}

/// Canonical thread id: `{event_id}--{other_user_id}`.
pub fn format_thread_id(event_id: &str, other_user_id: &str) -> String {
    format!("{}--{}", event_id, other_user_id)
}

/// Symmetric channel key for the realtime transports.
///
/// Thread ids are viewer-relative, so the two participants of one
/// conversation derive different strings. Pub/sub channels need one name
/// both sides agree on: event id plus the participant pair in sorted order.
pub fn channel_key(event_id: &str, user_a: &str, user_b: &str) -> String {
    let (lo, hi) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    format!("{}--{}--{}", event_id, lo, hi)
}

/// Decode a thread id into candidate (event, counterpart) pairs, most
/// likely first. Syntax alone cannot disambiguate legacy ids; the caller
/// validates each candidate against the store in order.
pub fn thread_id_candidates(thread_id: &str) -> Vec<ThreadParts> {
    let mut candidates: Vec<ThreadParts> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    let mut push = |candidates: &mut Vec<ThreadParts>, event_id: &str, other_user_id: &str| {
        let event_id = event_id.trim();
        let other_user_id = other_user_id.trim();
        if event_id.is_empty() || other_user_id.is_empty() {
            return;
        }
        if seen.insert((event_id.to_string(), other_user_id.to_string())) {
            candidates.push(ThreadParts {
                event_id: event_id.to_string(),
                other_user_id: other_user_id.to_string(),
            });
        }
    };

    // Preferred format: {eventId}--{otherUserId}, split on first occurrence.
    if let Some(idx) = thread_id.find("--") {
        push(&mut candidates, &thread_id[..idx], &thread_id[idx + 2..]);
    }

    // Legacy format: {eventId}_{otherUserId}. Seeded user ids look like
    // usr_100, so an embedded `_usr_` marks the most plausible split.
    if let Some(idx) = thread_id.find("_usr_") {
        push(&mut candidates, &thread_id[..idx], &thread_id[idx + 1..]);
    }

    // Legacy public event ids: pub_NNN_{userId} with a three-digit suffix.
    if let Some(parts) = split_legacy_public_id(thread_id) {
        push(&mut candidates, parts.0, parts.1);
    }

    // Generic fallback: try every underscore split point, bounded.
    let before_sweep = candidates.len();
    for (idx, ch) in thread_id.char_indices() {
        if ch != '_' {
            continue;
        }
        push(&mut candidates, &thread_id[..idx], &thread_id[idx + 1..]);
        if candidates.len() >= MAX_CANDIDATES && candidates.len() > before_sweep {
            break;
        }
    }

    candidates
}

/// `pub_001_usr_42` → (`pub_001`, `usr_42`). The event half is fixed-width:
/// `pub_` plus exactly three ASCII digits.
fn split_legacy_public_id(thread_id: &str) -> Option<(&str, &str)> {
    let rest = thread_id.strip_prefix("pub_")?;
    let digits = rest.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let tail = rest.get(3..)?.strip_prefix('_')?;
    if tail.is_empty() {
        return None;
    }
    Some((&thread_id[..7], tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(event_id: &str, other_user_id: &str) -> ThreadParts {
        ThreadParts {
            event_id: event_id.to_string(),
            other_user_id: other_user_id.to_string(),
        }
    }

    #[test]
    fn canonical_round_trip_is_first_candidate() {
        let id = format_thread_id("evt_1", "usr_100");
        let candidates = thread_id_candidates(&id);
        assert_eq!(candidates[0], parts("evt_1", "usr_100"));
    }

    #[test]
    fn canonical_split_uses_first_double_dash() {
        let candidates = thread_id_candidates("evt--a--b");
        assert_eq!(candidates[0], parts("evt", "a--b"));
    }

    #[test]
    fn legacy_usr_marker_split() {
        let candidates = thread_id_candidates("evt_9_usr_100");
        assert!(candidates.contains(&parts("evt_9", "usr_100")));
    }

    #[test]
    fn legacy_public_event_prefix() {
        let candidates = thread_id_candidates("pub_001_cku12abc");
        assert_eq!(candidates[0], parts("pub_001", "cku12abc"));
    }

    #[test]
    fn public_prefix_requires_three_digits() {
        let candidates = thread_id_candidates("pub_12_x");
        assert!(!candidates.contains(&parts("pub_12", "x")));
    }

    #[test]
    fn underscore_sweep_covers_counterpart_with_separator() {
        // Counterpart id itself contains the legacy separator.
        let candidates = thread_id_candidates("evt1_usr_100");
        assert!(candidates.contains(&parts("evt1", "usr_100")));
        assert!(candidates.contains(&parts("evt1_usr", "100")));
    }

    #[test]
    fn sweep_is_bounded_on_pathological_input() {
        let id = "_".repeat(200);
        let candidates = thread_id_candidates(&id);
        assert!(candidates.len() <= MAX_CANDIDATES);
    }

    #[test]
    fn no_candidates_for_unsplittable_id() {
        assert!(thread_id_candidates("justoneword").is_empty());
    }

    #[test]
    fn duplicate_splits_collapse() {
        let candidates = thread_id_candidates("pub_001_usr_5");
        let hits = candidates
            .iter()
            .filter(|c| **c == parts("pub_001", "usr_5"))
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn channel_key_is_symmetric() {
        assert_eq!(
            channel_key("evt_1", "usr_2", "usr_1"),
            channel_key("evt_1", "usr_1", "usr_2"),
        );
    }
}
