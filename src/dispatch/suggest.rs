//! "Did you mean" suggestions for unresolvable procedure names.

use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher};

use crate::Error;

/// Minimum fuzzy score for a catalog entry to be offered as a suggestion.
///
/// Scores below this are noise — a plain not-found message is more honest
/// than a far-fetched suggestion.
pub const SUGGESTION_MIN_SCORE: u32 = 100;

/// The closest catalog entry to `requested`, if any clears the score cutoff.
///
/// Smart-case fuzzy scoring: the typo class this catches is casing and
/// dropped characters (`gds.pagerank.stream` → `gds.pageRank.stream`).
pub fn suggest(requested: &str, candidates: &[String]) -> Option<String> {
    let mut matcher = Matcher::new(Config::DEFAULT);
    let pattern = Pattern::parse(requested, CaseMatching::Ignore, Normalization::Smart);
    pattern
        .match_list(candidates.iter(), &mut matcher)
        .into_iter()
        .next()
        .filter(|(_, score)| *score >= SUGGESTION_MIN_SCORE)
        .map(|(name, _)| name.clone())
}

/// Build the unresolvable-call error for `requested`, naming the closest
/// known procedure when one exists.
pub fn suggestive_error(requested: &str, candidates: &[String]) -> Error {
    let message = match suggest(requested, candidates) {
        Some(best) => {
            format!("There is no '{requested}' to call. Did you mean '{best}'?")
        }
        None => format!("There is no '{requested}' to call."),
    };
    Error::UnresolvableCall(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<String> {
        [
            "gds.pageRank.stream",
            "gds.pageRank.stats",
            "gds.wcc.stream",
            "gds.graph.project",
            "gds.graph.drop",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn casing_typo_is_suggested() {
        let suggestion = suggest("gds.pagerank.stream", &catalog());
        assert_eq!(suggestion.as_deref(), Some("gds.pageRank.stream"));
    }

    #[test]
    fn unrelated_name_gets_no_suggestion() {
        assert_eq!(suggest("zzz.qqq.vvv", &catalog()), None);
    }

    #[test]
    fn error_message_names_the_suggestion() {
        let err = suggestive_error("gds.pagerank.stream", &catalog());
        let message = err.to_string();
        assert!(message.contains("There is no 'gds.pagerank.stream' to call"));
        assert!(message.contains("Did you mean 'gds.pageRank.stream'?"));
    }

    #[test]
    fn error_message_without_suggestion_is_plain() {
        let err = suggestive_error("zzz.qqq.vvv", &catalog());
        let message = err.to_string();
        assert!(message.contains("There is no 'zzz.qqq.vvv' to call."));
        assert!(!message.contains("Did you mean"));
    }
}
