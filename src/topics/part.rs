//! # Topic parts.
//!
//! A topic is a `.`-separated sequence of parts. [`TopicPart`] is the typed
//! form of one segment:
//!
//! - `Exact` — literal fragment, e.g. `Trade`
//! - `Any` — named wildcard, e.g. `{symbol}`; captures any exact fragment
//! - `Range` — alternation, e.g. `(Equity|Futures)`
//! - `Pattern` — regular expression, e.g. `/^[A-Z]{4}$/`; compiled eagerly
//!   and matched against the whole fragment

use std::fmt;

use regex::Regex;

/// Tag bytes used in the canonical key encoding.
pub(crate) const TAG_EXACT: u8 = b'E';
pub(crate) const TAG_ANY: u8 = b'A';
pub(crate) const TAG_RANGE: u8 = b'R';
pub(crate) const TAG_PATTERN: u8 = b'P';

/// One segment of a topic.
#[derive(Clone, Debug)]
pub enum TopicPart {
    /// Literal fragment.
    Exact(String),
    /// Named wildcard; matches any exact fragment and captures it.
    Any(String),
    /// Ordered alternation; matches a fragment equal to any option.
    Range(Vec<String>),
    /// Regular expression over one fragment.
    Pattern {
        /// Pattern text as written between the slashes.
        source: String,
        /// Compiled form, anchored to match the whole fragment.
        regex: Regex,
    },
}

impl TopicPart {
    /// Builds a pattern part, anchoring the expression to the full fragment.
    pub(crate) fn pattern(source: String) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(TopicPart::Pattern { source, regex })
    }

    /// Whether this part is a literal.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self, TopicPart::Exact(_))
    }

    /// Wildcard name for `Any` parts.
    #[must_use]
    pub fn wildcard_name(&self) -> Option<&str> {
        match self {
            TopicPart::Any(name) => Some(name),
            _ => None,
        }
    }

    /// Whether an exact target fragment satisfies this part.
    #[must_use]
    pub fn matches_fragment(&self, fragment: &str) -> bool {
        match self {
            TopicPart::Exact(literal) => literal == fragment,
            TopicPart::Any(_) => true,
            TopicPart::Range(options) => options.iter().any(|opt| opt == fragment),
            TopicPart::Pattern { regex, .. } => regex.is_match(fragment),
        }
    }

    /// Canonical key tag for this part kind.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            TopicPart::Exact(_) => TAG_EXACT,
            TopicPart::Any(_) => TAG_ANY,
            TopicPart::Range(_) => TAG_RANGE,
            TopicPart::Pattern { .. } => TAG_PATTERN,
        }
    }

    /// Canonical key content for this part.
    ///
    /// Range options cannot contain `|` (the parser splits on it), so the
    /// joined form stays injective.
    pub(crate) fn canonical_content(&self) -> String {
        match self {
            TopicPart::Exact(literal) => literal.clone(),
            TopicPart::Any(name) => name.clone(),
            TopicPart::Range(options) => options.join("|"),
            TopicPart::Pattern { source, .. } => source.clone(),
        }
    }
}

impl PartialEq for TopicPart {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TopicPart::Exact(a), TopicPart::Exact(b)) => a == b,
            (TopicPart::Any(a), TopicPart::Any(b)) => a == b,
            (TopicPart::Range(a), TopicPart::Range(b)) => a == b,
            (TopicPart::Pattern { source: a, .. }, TopicPart::Pattern { source: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for TopicPart {}

impl fmt::Display for TopicPart {
    /// Renders the part as it appears in a topic string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicPart::Exact(literal) => f.write_str(literal),
            TopicPart::Any(name) => write!(f, "{{{name}}}"),
            TopicPart::Range(options) => write!(f, "({})", options.join("|")),
            TopicPart::Pattern { source, .. } => write!(f, "/{source}/"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TopicPart;

    #[test]
    fn fragment_matching_table() {
        let exact = TopicPart::Exact("Trade".into());
        assert!(exact.matches_fragment("Trade"));
        assert!(!exact.matches_fragment("Quote"));

        let any = TopicPart::Any("symbol".into());
        assert!(any.matches_fragment("AAPL"));

        let range = TopicPart::Range(vec!["Equity".into(), "Futures".into()]);
        assert!(range.matches_fragment("Equity"));
        assert!(range.matches_fragment("Futures"));
        assert!(!range.matches_fragment("Options"));

        let pattern = TopicPart::pattern("[A-Z]{4}".into()).unwrap();
        assert!(pattern.matches_fragment("AAPL"));
        assert!(!pattern.matches_fragment("A"));
        // Anchored: a partial hit inside the fragment does not count.
        assert!(!pattern.matches_fragment("AAPLX"));
    }

    #[test]
    fn display_round_trips_source_forms() {
        assert_eq!(TopicPart::Exact("a".into()).to_string(), "a");
        assert_eq!(TopicPart::Any("sym".into()).to_string(), "{sym}");
        assert_eq!(
            TopicPart::Range(vec!["x".into(), "y".into()]).to_string(),
            "(x|y)"
        );
        assert_eq!(
            TopicPart::pattern("^a+$".into()).unwrap().to_string(),
            "/^a+$/"
        );
    }

    #[test]
    fn equality_ignores_compiled_regex() {
        let a = TopicPart::pattern("[0-9]+".into()).unwrap();
        let b = TopicPart::pattern("[0-9]+".into()).unwrap();
        let c = TopicPart::pattern("[0-9]*".into()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
