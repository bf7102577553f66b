//! Search pattern rendering.
//!
//! A rule's `search` template becomes a compiled matcher. Literal rules match
//! the rendered text exactly. Regex rules are rendered a second time with
//! every context value escaped and compiled; if that fails, the matcher
//! quietly degrades to the literal one so a bad pattern never aborts a run.

use regex::{Regex, RegexBuilder};
use tracing::{debug, error, instrument};

use crate::context::RenderContext;
use crate::rule::ChangeRule;
use crate::template::{self, RenderResult};

/// A compiled search matcher plus the literal text it was rendered from.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    /// The matcher to run against file content.
    pub matcher: Regex,
    /// `search` rendered without escaping, for messages and fallbacks.
    pub raw: String,
    /// Compile error of the regex form, when the literal fallback was used.
    pub regex_error: Option<regex::Error>,
}

impl SearchPattern {
    /// Whether the matcher finds anything in `haystack`.
    pub fn is_match(&self, haystack: &str) -> bool {
        self.matcher.is_match(haystack)
    }

    /// Whether the regex form failed to compile and the literal is in use.
    pub const fn fell_back(&self) -> bool {
        self.regex_error.is_some()
    }
}

/// Render a rule's `search` template into a matcher.
///
/// # Errors
///
/// Fails when the template references an unknown placeholder or is
/// malformed. An invalid regex is not an error.
#[instrument(skip_all, fields(search = %rule.search, regex = rule.regex))]
pub fn render_search_pattern(
    rule: &ChangeRule,
    context: &RenderContext,
) -> RenderResult<SearchPattern> {
    let raw = template::render(&rule.search, context)?;
    let literal = compile(&regex::escape(&raw))?;

    if !rule.regex {
        debug!(pattern = %literal.as_str(), "searching for literal text");
        return Ok(SearchPattern {
            matcher: literal,
            raw,
            regex_error: None,
        });
    }

    let source = template::render_with(&rule.search, context, regex::escape)?;
    match compile(&source) {
        Ok(matcher) => {
            debug!(pattern = %matcher.as_str(), "searching for regex");
            Ok(SearchPattern {
                matcher,
                raw,
                regex_error: None,
            })
        }
        Err(err) => {
            error!(pattern = %source, error = %err, "invalid regex, searching for literal text instead");
            Ok(SearchPattern {
                matcher: literal,
                raw,
                regex_error: Some(err),
            })
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .dot_matches_new_line(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextValue, Layer};
    use crate::rule::fixtures::rule;
    use crate::template::RenderError;

    fn ctx(pairs: &[(&str, &str)]) -> RenderContext {
        let layer: Layer = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), ContextValue::from(*v)))
            .collect();
        RenderContext::from_layers([layer])
    }

    #[test]
    fn literal_matches_exact_text_only() {
        let context = ctx(&[("current_version", "1.2.3")]);
        let pattern =
            render_search_pattern(&rule("version = {current_version}", ""), &context).unwrap();

        assert_eq!(pattern.raw, "version = 1.2.3");
        assert!(pattern.is_match("version = 1.2.3\n"));
        // the dots are not wildcards
        assert!(!pattern.is_match("version = 1x2x3\n"));
    }

    #[test]
    fn literal_neutralizes_metacharacters() {
        let context = ctx(&[("current_version", "1.0.0")]);
        let pattern =
            render_search_pattern(&rule("[v{current_version}](*)+?", ""), &context).unwrap();
        assert!(pattern.is_match("see [v1.0.0](*)+? here"));
        assert!(!pattern.is_match("v1.0.0"));
    }

    #[test]
    fn regex_mode_escapes_values_but_not_template() {
        let context = ctx(&[("current_version", "1.2.3")]);
        let mut r = rule(r"version\s*=\s*{current_version}", "");
        r.regex = true;
        let pattern = render_search_pattern(&r, &context).unwrap();

        assert!(pattern.regex_error.is_none());
        assert_eq!(pattern.matcher.as_str(), r"version\s*=\s*1\.2\.3");
        assert_eq!(pattern.raw, r"version\s*=\s*1.2.3");
        assert!(pattern.is_match("version   =  1.2.3"));
        assert!(!pattern.is_match("version = 1x2x3"));
    }

    #[test]
    fn invalid_regex_falls_back_to_literal() {
        let context = ctx(&[("current_version", "1.2.3")]);
        let mut regex_rule = rule("(unclosed {current_version}", "");
        regex_rule.regex = true;
        let literal_rule = rule("(unclosed {current_version}", "");

        let fallback = render_search_pattern(&regex_rule, &context).unwrap();
        let literal = render_search_pattern(&literal_rule, &context).unwrap();

        assert!(fallback.fell_back());
        assert_eq!(fallback.matcher.as_str(), literal.matcher.as_str());
        assert_eq!(fallback.raw, literal.raw);
        assert!(fallback.is_match("x (unclosed 1.2.3 y"));
    }

    #[test]
    fn multiline_and_dotall() {
        let context = ctx(&[("current_version", "2.0")]);
        let mut r = rule(r"^\[tool\].*?version = {current_version}$", "");
        r.regex = true;
        let pattern = render_search_pattern(&r, &context).unwrap();
        assert!(pattern.is_match("name = 1\n[tool]\nother = 3\nversion = 2.0\nend"));
    }

    #[test]
    fn undefined_placeholder_is_fatal() {
        let err = render_search_pattern(&rule("{nope}", ""), &ctx(&[])).unwrap_err();
        assert!(matches!(err, RenderError::UndefinedPlaceholder { ref key, .. } if key == "nope"));
    }
}
