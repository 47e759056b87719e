//! # Topic matching.
//!
//! A registered (possibly generic) topic is matched against an exact target
//! topic position by position:
//!
//! | pattern part | target part | matched iff          | captured |
//! |--------------|-------------|----------------------|----------|
//! | `Exact(a)`   | `Exact(b)`  | `a == b`             | `b`      |
//! | `Any(n)`     | `Exact(b)`  | always               | `b` as `n` |
//! | `Range(o)`   | `Exact(b)`  | `b ∈ o`              | `b`      |
//! | `Pattern(r)` | `Exact(b)`  | `r` matches all of `b` | `b`    |
//! | anything     | generic     | never                | —        |
//!
//! Differing part counts never match. There is no specificity tie-break
//! between generic topics; the engine fires every matching hook in
//! registration order.

use crate::topics::part::TopicPart;
use crate::topics::topic::Topic;

/// Per-part outcome of a match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchNode {
    /// Whether this position matched.
    pub matched: bool,
    /// The target fragment at this position.
    pub literal: String,
    /// Wildcard name when the pattern part was `Any`.
    pub name: Option<String>,
}

/// Outcome of matching a pattern topic against a target topic.
#[derive(Clone, Debug, Default)]
pub struct MatchResult {
    matched: bool,
    nodes: Vec<MatchNode>,
}

impl MatchResult {
    /// Evaluates `pattern` against `target`.
    pub(crate) fn evaluate(pattern: &Topic, target: &Topic) -> Self {
        if pattern.len() != target.len() || !target.is_exact() {
            return Self::default();
        }

        let mut nodes = Vec::with_capacity(target.len());
        let mut matched = true;

        for (pattern_part, target_part) in pattern.iter().zip(target.iter()) {
            let TopicPart::Exact(fragment) = target_part else {
                unreachable!("exact topics contain only literal parts");
            };
            let hit = pattern_part.matches_fragment(fragment);
            matched &= hit;
            nodes.push(MatchNode {
                matched: hit,
                literal: fragment.clone(),
                name: pattern_part.wildcard_name().map(str::to_owned),
            });
        }

        Self { matched, nodes }
    }

    /// Whether every position matched.
    #[must_use]
    pub fn matched(&self) -> bool {
        self.matched
    }

    /// Per-part nodes; empty when the part counts differed or the target was
    /// generic.
    #[must_use]
    pub fn nodes(&self) -> &[MatchNode] {
        &self.nodes
    }

    /// Captured `name → fragment` pairs for the pattern's `Any` parts.
    ///
    /// Empty unless the match succeeded.
    pub fn captures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes
            .iter()
            .filter(move |_| self.matched)
            .filter_map(|node| {
                node.name
                    .as_deref()
                    .map(|name| (name, node.literal.as_str()))
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::Topic;

    fn topic(s: &str) -> Topic {
        Topic::parse(s).unwrap()
    }

    #[test]
    fn exact_vs_exact_is_key_equality() {
        let p = topic("A.B.C");
        assert!(p.matches(&topic("A.B.C")).matched());
        assert!(!p.matches(&topic("A.B.D")).matched());
        assert!(!p.matches(&topic("A.B")).matched());
        assert!(!p.matches(&topic("A.B.C.D")).matched());
    }

    #[test]
    fn wildcard_captures_fragment() {
        let p = topic("M.Data.{symbol}");
        let result = p.matches(&topic("M.Data.AAPL"));
        assert!(result.matched());
        let captures: Vec<_> = result.captures().collect();
        assert_eq!(captures, vec![("symbol", "AAPL")]);
    }

    #[test]
    fn range_matches_listed_options_only() {
        let p = topic("M.(Equity|Futures).Trade");
        assert!(p.matches(&topic("M.Equity.Trade")).matched());
        assert!(p.matches(&topic("M.Futures.Trade")).matched());
        assert!(!p.matches(&topic("M.Options.Trade")).matched());
    }

    #[test]
    fn pattern_matches_whole_fragment() {
        let p = topic(r"M.Data./^[A-Z]{4}$/");
        assert!(p.matches(&topic("M.Data.AAPL")).matched());
        assert!(!p.matches(&topic("M.Data.A")).matched());
        assert!(!p.matches(&topic("M.Data.AAPLX")).matched());
    }

    #[test]
    fn generic_target_never_matches() {
        let p = topic("M.Data.{symbol}");
        assert!(!p.matches(&topic("M.Data.{symbol}")).matched());
        assert!(!p.matches(&topic("M.Data.(a|b)")).matched());
    }

    #[test]
    fn nodes_record_per_part_outcome() {
        let p = topic("M.{kind}.Trade");
        let result = p.matches(&topic("M.Equity.Quote"));
        assert!(!result.matched());
        let nodes = result.nodes();
        assert_eq!(nodes.len(), 3);
        assert!(nodes[0].matched);
        assert!(nodes[1].matched);
        assert!(!nodes[2].matched);
        // No captures surface from a failed match.
        assert_eq!(result.captures().count(), 0);
    }

    #[test]
    fn multi_generic_topic() {
        let p = topic(r"{exchange}.(Trade|Quote)./^[A-Z]+$/");
        let result = p.matches(&topic("NASDAQ.Trade.MSFT"));
        assert!(result.matched());
        let captures: Vec<_> = result.captures().collect();
        assert_eq!(captures, vec![("exchange", "NASDAQ")]);
    }
}
