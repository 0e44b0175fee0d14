use lokiscope_types::Severity;

/// Classify a raw line by keyword.
///
/// Case-insensitive substring match in priority order (fatal, error, warn, info);
/// the highest-priority keyword present wins regardless of where it appears.
pub fn classify(text: &str) -> Severity {
    let lower = text.to_lowercase();

    Severity::PRIORITY
        .into_iter()
        .find(|level| level.keyword().is_some_and(|kw| lower.contains(kw)))
        .unwrap_or(Severity::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_higher_priority_keyword_wins() {
        assert_eq!(classify("warn: error occurred"), Severity::Error);
        assert_eq!(classify("info: retrying after fatal signal"), Severity::Fatal);
    }

    #[test]
    fn test_no_keyword_is_other() {
        assert_eq!(classify("all good"), Severity::Other);
        assert_eq!(classify(""), Severity::Other);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("[WARNING] disk at 91%"), Severity::Warn);
        assert_eq!(classify("Information only"), Severity::Info);
        assert_eq!(classify("ErRoR"), Severity::Error);
    }

    #[test]
    fn test_substring_match() {
        // keywords match inside words too
        assert_eq!(classify("terrors of the deep"), Severity::Error);
        assert_eq!(classify("GET /healthz 200 ─ ok"), Severity::Other);
    }
}
