//! Helpers for reasoning about slash separated object paths.

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Return whether `candidate` is a shorter path to the same object as
/// `recorded`.
///
/// `candidate` qualifies when its final segment equals `recorded`'s final
/// segment, it has strictly fewer segments, and all of its remaining
/// segments appear in `recorded`'s prefix in the same order. The in-order
/// requirement guards against coincidentally similar but unrelated paths.
pub fn is_shorter_path(candidate: &str, recorded: &str) -> bool {
    let candidate = segments(candidate);
    let recorded = segments(recorded);

    let (Some(candidate_last), Some(recorded_last)) = (candidate.last(), recorded.last()) else {
        return false;
    };
    if candidate_last != recorded_last {
        return false;
    }
    if candidate.len() >= recorded.len() {
        return false;
    }

    is_subsequence(
        &candidate[..candidate.len() - 1],
        &recorded[..recorded.len() - 1],
    )
}

fn is_subsequence(needle: &[&str], haystack: &[&str]) -> bool {
    let mut pos = 0;
    for segment in needle {
        match haystack[pos..].iter().position(|other| other == segment) {
            Some(offset) => pos += offset + 1,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_skips_empty_components() {
        assert_eq!(segments("/plone/parent/child"), ["plone", "parent", "child"]);
        assert_eq!(segments("plone//child/"), ["plone", "child"]);
        assert!(segments("/").is_empty());
    }

    #[test]
    fn test_shorter_path_is_detected() {
        assert!(is_shorter_path("bar", "foo/bar"));
        assert!(is_shorter_path("/plone/doc", "/plone/folder/doc"));
        assert!(is_shorter_path("foo/zwo/bar", "foo/eins/zwo/bar"));
    }

    #[test]
    fn test_identical_path_is_not_shorter() {
        assert!(!is_shorter_path("foo/bar", "foo/bar"));
    }

    #[test]
    fn test_longer_path_is_not_shorter() {
        assert!(!is_shorter_path("foo/qux/bar", "foo/bar"));
    }

    #[test]
    fn test_out_of_order_segments_do_not_match() {
        assert!(!is_shorter_path("foo/1/zwo/bar", "foo/zwo/1/bar"));
        assert!(!is_shorter_path("zwo/eins/bar", "eins/zwo/x/bar"));
    }

    #[test]
    fn test_different_final_segment_does_not_match() {
        assert!(!is_shorter_path("foo", "foo/bar"));
        assert!(!is_shorter_path("", "foo/bar"));
    }
}
