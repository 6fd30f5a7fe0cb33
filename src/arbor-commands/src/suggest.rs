//! "Did you mean" suggestions for unrecognized command paths.

use crate::distance::normalized_distance;
use crate::tree::CommandTree;

/// Candidates scoring at or above this normalized distance are not offered.
pub const SUGGESTION_THRESHOLD: f64 = 0.3;

/// Closest registered command path to `typed`, if any is close enough.
///
/// Every registered path is a candidate, aliases included. Ties keep the
/// first candidate in tree order.
pub fn suggest<S: AsRef<str>>(tree: &CommandTree, typed: &[S]) -> Option<String> {
    suggest_from(tree, typed, typed.len())
}

/// Like [`suggest`], but scores every prefix of `typed` holding at least
/// `min_len` segments and keeps the closest.
///
/// Trailing positional arguments then do not push a near miss over the
/// threshold. Ties keep the shorter prefix.
pub fn suggest_from<S: AsRef<str>>(
    tree: &CommandTree,
    typed: &[S],
    min_len: usize,
) -> Option<String> {
    let segments: Vec<&str> = typed.iter().map(AsRef::as_ref).collect();
    let start = min_len.clamp(1, segments.len().max(1));

    let mut best: Option<(f64, String)> = None;
    for len in start..=segments.len() {
        if let Some((score, path)) = closest(tree, &segments[..len].join(" "))
            && best.as_ref().is_none_or(|(best_score, _)| score < *best_score)
        {
            best = Some((score, path));
        }
    }

    best.filter(|(score, _)| *score < SUGGESTION_THRESHOLD)
        .map(|(_, path)| path)
}

fn closest(tree: &CommandTree, typed: &str) -> Option<(f64, String)> {
    let mut best: Option<(f64, String)> = None;
    for entry in tree.commands() {
        let candidate = entry.display_path();
        let score = normalized_distance(typed, &candidate);
        if best.as_ref().is_none_or(|(best_score, _)| score < *best_score) {
            best = Some((score, candidate));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{CommandHandler, handler_fn};
    use crate::tree::CommandOptions;
    use std::sync::Arc;

    fn tree(paths: &[&[&str]]) -> CommandTree {
        let mut tree = CommandTree::new();
        for path in paths {
            let handler: Arc<dyn CommandHandler> =
                Arc::new(handler_fn(|_args, _flags, _ctx| async { Ok(()) }));
            tree.register(path, handler, CommandOptions::new()).unwrap();
        }
        tree
    }

    #[test]
    fn test_close_match() {
        let tree = tree(&[&["user", "add"], &["user", "remove"], &["greet"]]);
        assert_eq!(suggest(&tree, &["usr", "add"]), Some("user add".to_string()));
        assert_eq!(suggest(&tree, &["gret"]), Some("greet".to_string()));
    }

    #[test]
    fn test_nothing_close() {
        let tree = tree(&[&["user", "add"], &["greet"]]);
        assert_eq!(suggest(&tree, &["deploy"]), None);
        assert_eq!(suggest::<&str>(&tree, &[]), None);
    }

    #[test]
    fn test_empty_tree() {
        assert_eq!(suggest(&CommandTree::new(), &["anything"]), None);
    }

    #[test]
    fn test_threshold_is_strict() {
        // 3 edits over 10 chars is exactly 0.3
        let tree = tree(&[&["abcdefghij"]]);
        assert_eq!(suggest(&tree, &["abcdefgxyz"]), None);
        assert_eq!(
            suggest(&tree, &["abcdefghyz"]),
            Some("abcdefghij".to_string())
        );
    }

    #[test]
    fn test_tie_keeps_first_in_order() {
        let tree = tree(&[&["list"], &["lost"]]);
        assert_eq!(suggest(&tree, &["lust"]), Some("list".to_string()));
    }

    #[test]
    fn test_trailing_args_do_not_hide_match() {
        let tree = tree(&[&["user", "add"], &["user", "remove"]]);
        let typed = ["user", "ad", "bob"];
        assert_eq!(suggest(&tree, &typed), None);
        assert_eq!(suggest_from(&tree, &typed, 2), Some("user add".to_string()));
        // prefixes shorter than min_len are never scored
        assert_eq!(suggest_from(&tree, &["user", "ad", "bob"], 3), None);
    }

    #[test]
    fn test_shorter_prefix_wins_tie() {
        let tree = tree(&[&["ab"], &["ab", "c"]]);
        assert_eq!(suggest_from(&tree, &["ab", "c"], 1), Some("ab".to_string()));
        assert_eq!(suggest_from::<&str>(&tree, &[], 0), None);
    }

    #[test]
    fn test_suggestion_is_registered() {
        let tree = tree(&[&["cluster", "node", "list"], &["cluster", "status"]]);
        for typed in [&["cluster", "node", "lsit"][..], &["clustr", "status"][..]] {
            if let Some(path) = suggest(&tree, typed) {
                let segments: Vec<&str> = path.split(' ').collect();
                assert!(tree.get(&segments).is_some_and(|n| n.is_registered()));
            }
        }
    }
}
