//! Placeholder templates: `{key}`, `{key:format}`, `{{` and `}}`.
//!
//! Every search, replace, serialize, and message string in a configuration is
//! a template. Placeholders are resolved against a [`RenderContext`]; a key
//! missing from every layer is an error rather than being left in place.

use thiserror::Error;

use crate::context::{FormatError, RenderContext};

/// Errors from rendering a template.
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    /// The template references a key that no context layer provides.
    #[error("undefined placeholder {{{key}}} in template {template:?}")]
    UndefinedPlaceholder {
        /// The missing key.
        key: String,
        /// The template being rendered.
        template: String,
    },

    /// The template text itself could not be parsed.
    #[error("malformed template {template:?} at byte {position}: {reason}")]
    MalformedTemplate {
        /// The template being parsed.
        template: String,
        /// Byte offset of the offending brace.
        position: usize,
        /// What was wrong.
        reason: &'static str,
    },

    /// A format spec was given that the value cannot honor.
    #[error("cannot format {{{key}}} with {spec:?}: {source}")]
    InvalidFormatSpec {
        /// The placeholder key.
        key: String,
        /// The format spec after the colon.
        spec: String,
        /// Why the spec was rejected.
        #[source]
        source: FormatError,
    },

    /// A rendered literal was too large to compile into a matcher.
    #[error("search pattern could not be compiled: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result alias for template operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// A parsed piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(String),
    Field { key: &'a str, spec: Option<&'a str> },
}

/// Render a template, substituting every placeholder from `context`.
pub fn render(template: &str, context: &RenderContext) -> RenderResult<String> {
    render_with(template, context, |value| value.to_owned())
}

/// Render a template, passing every substituted value through `escape`.
///
/// Literal template text is never escaped; only the values pulled from the
/// context are. Used to build regex sources where context values must match
/// literally.
pub fn render_with<F>(template: &str, context: &RenderContext, escape: F) -> RenderResult<String>
where
    F: Fn(&str) -> String,
{
    let mut out = String::with_capacity(template.len());
    for segment in parse(template)? {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Field { key, spec } => {
                let value =
                    context
                        .get(key)
                        .ok_or_else(|| RenderError::UndefinedPlaceholder {
                            key: key.to_owned(),
                            template: template.to_owned(),
                        })?;
                let formatted =
                    value
                        .format(spec)
                        .map_err(|source| RenderError::InvalidFormatSpec {
                            key: key.to_owned(),
                            spec: spec.unwrap_or_default().to_owned(),
                            source,
                        })?;
                out.push_str(&escape(&formatted));
            }
        }
    }
    Ok(out)
}

/// List the placeholder keys of a template, in order of appearance.
pub fn labels(template: &str) -> RenderResult<Vec<&str>> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Field { key, .. } => Some(key),
            Segment::Literal(_) => None,
        })
        .collect())
}

fn parse(template: &str) -> RenderResult<Vec<Segment<'_>>> {
    let malformed = |position, reason| RenderError::MalformedTemplate {
        template: template.to_owned(),
        position,
        reason,
    };

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut pos = 0;

    while let Some(found) = template[pos..].find(['{', '}']) {
        let at = pos + found;
        literal.push_str(&template[pos..at]);
        let rest = &template[at + 1..];

        if template[at..].starts_with('}') {
            if !rest.starts_with('}') {
                return Err(malformed(at, "single '}' outside a placeholder"));
            }
            literal.push('}');
            pos = at + 2;
            continue;
        }

        if rest.starts_with('{') {
            literal.push('{');
            pos = at + 2;
            continue;
        }

        let close = rest
            .find('}')
            .ok_or_else(|| malformed(at, "unterminated placeholder"))?;
        let field = &rest[..close];
        if field.contains('{') {
            return Err(malformed(at, "'{' inside a placeholder"));
        }
        let (key, spec) = match field.split_once(':') {
            Some((key, spec)) => (key, Some(spec)),
            None => (field, None),
        };
        if key.is_empty() {
            return Err(malformed(at, "empty placeholder"));
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Field { key, spec });
        pos = at + 1 + close + 1;
    }

    literal.push_str(&template[pos..]);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextValue, Layer};
    use chrono::NaiveDate;

    fn ctx(pairs: &[(&str, &str)]) -> RenderContext {
        let layer: Layer = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), ContextValue::from(*v)))
            .collect();
        RenderContext::from_layers([layer])
    }

    #[test]
    fn renders_placeholders() {
        let context = ctx(&[("current_version", "1.2.3")]);
        assert_eq!(
            render("version = {current_version}", &context).unwrap(),
            "version = 1.2.3"
        );
    }

    #[test]
    fn doubled_braces_are_literal() {
        let context = ctx(&[("v", "1")]);
        assert_eq!(render("{{v}} = {v}", &context).unwrap(), "{v} = 1");
        assert_eq!(render(r"\d{{3}}", &context).unwrap(), r"\d{3}");
    }

    #[test]
    fn undefined_placeholder_names_key() {
        let context = ctx(&[]);
        let err = render("{missing}", &context).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UndefinedPlaceholder { ref key, ref template }
                if key == "missing" && template == "{missing}"
        ));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        let context = ctx(&[("a", "1")]);
        assert!(matches!(
            render("{a", &context),
            Err(RenderError::MalformedTemplate { position: 0, .. })
        ));
        assert!(matches!(
            render("a}", &context),
            Err(RenderError::MalformedTemplate { position: 1, .. })
        ));
        assert!(matches!(
            render("x {}", &context),
            Err(RenderError::MalformedTemplate { position: 2, .. })
        ));
    }

    #[test]
    fn escape_applies_to_values_only() {
        let context = ctx(&[("current_version", "1.2.3")]);
        let out = render_with("v{current_version}.*", &context, |v| regex::escape(v)).unwrap();
        assert_eq!(out, r"v1\.2\.3.*");
    }

    #[test]
    fn env_style_keys_resolve() {
        let context = ctx(&[("$BUILD_ID", "42")]);
        assert_eq!(render("build {$BUILD_ID}", &context).unwrap(), "build 42");
    }

    #[test]
    fn timestamp_format_spec() {
        let when = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(13, 5, 0)
            .unwrap();
        let mut layer = Layer::new();
        layer.insert("now".into(), ContextValue::Timestamp(when));
        let context = RenderContext::from_layers([layer]);
        assert_eq!(
            render("{now:%Y.%m.%d}", &context).unwrap(),
            "2024.02.29"
        );
    }

    #[test]
    fn text_rejects_format_spec() {
        let context = ctx(&[("major", "1")]);
        assert!(matches!(
            render("{major:>3}", &context),
            Err(RenderError::InvalidFormatSpec { .. })
        ));
    }

    #[test]
    fn labels_in_order() {
        assert_eq!(
            labels("{major}.{minor}{{x}}-{release:%s}").unwrap(),
            vec!["major", "minor", "release"]
        );
    }
}
