/// Compare a caller-supplied admin key against the configured one.
///
/// Runs in time independent of where the keys first differ. An empty
/// configured key never matches, so a missing secret cannot open the
/// admin endpoints.
pub fn verify_api_key(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }

    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    provided.len() == expected.len()
        && provided
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_key() {
        assert!(verify_api_key("change-me", "change-me"));
    }

    #[test]
    fn test_wrong_key() {
        assert!(!verify_api_key("change-you", "change-me"));
        assert!(!verify_api_key("Change-Me", "change-me"));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(!verify_api_key("change", "change-me"));
        assert!(!verify_api_key("change-me-please", "change-me"));
    }

    #[test]
    fn test_empty_configured_key_never_matches() {
        assert!(!verify_api_key("", ""));
        assert!(!verify_api_key("anything", ""));
    }
}
