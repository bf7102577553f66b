//! Version part specifications.

use serde::{Deserialize, Deserializer, Serialize};

/// How one segment of a version behaves.
///
/// A part with no `values` is numeric and unbounded. A part with `values`
/// cycles through that ordered list.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct VersionPartSpec {
    /// Allowed values, in order. Absent or empty means numeric.
    #[serde(
        deserialize_with = "opt_scalar_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub values: Option<Vec<String>>,
    /// The value that may be left out when serializing.
    ///
    /// Defaults to the first value.
    #[serde(
        deserialize_with = "opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub optional_value: Option<String>,
    /// The value the part starts at.
    ///
    /// Defaults to the first entry of `values`, or `0` for numeric parts.
    #[serde(
        deserialize_with = "opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_value: Option<String>,
    /// Whether this part changes without resetting its siblings.
    pub independent: bool,
}

impl VersionPartSpec {
    /// Whether the part is numeric rather than drawn from a value list.
    pub fn is_numeric(&self) -> bool {
        self.values.as_ref().is_none_or(Vec::is_empty)
    }

    /// The effective first value.
    pub fn first_value(&self) -> &str {
        if let Some(ref first) = self.first_value {
            return first;
        }
        match self.values {
            Some(ref values) if !values.is_empty() => &values[0],
            _ => "0",
        }
    }

    /// The effective optional value.
    pub fn optional_value(&self) -> &str {
        self.optional_value
            .as_deref()
            .unwrap_or_else(|| self.first_value())
    }

    /// Check these settings, returning a description of the first
    /// violation.
    pub fn check(&self) -> Result<(), String> {
        let Some(ref values) = self.values else {
            return Ok(());
        };
        if values.is_empty() {
            return Ok(());
        }
        if let Some(ref optional) = self.optional_value
            && !values.contains(optional)
        {
            return Err(format!(
                "optional_value {optional:?} is not one of the allowed values"
            ));
        }
        if let Some(ref first) = self.first_value
            && !values.contains(first)
        {
            return Err(format!(
                "first_value {first:?} is not one of the allowed values"
            ));
        }
        Ok(())
    }
}

/// One segment of a parsed version: its value and the spec governing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPart {
    value: Option<String>,
    spec: VersionPartSpec,
}

impl VersionPart {
    /// Create a part; `None` or an empty string means "not present".
    pub fn new(value: Option<String>, spec: VersionPartSpec) -> Self {
        Self {
            value: value.filter(|v| !v.is_empty()),
            spec,
        }
    }

    /// The part's value, falling back to its optional value when absent.
    pub fn value(&self) -> &str {
        self.value
            .as_deref()
            .unwrap_or_else(|| self.spec.optional_value())
    }

    /// Whether the value can be omitted from a serialized version.
    pub fn is_optional(&self) -> bool {
        self.value() == self.spec.optional_value()
    }

    /// The governing spec.
    pub const fn spec(&self) -> &VersionPartSpec {
        &self.spec
    }
}

// Config files often spell numeric part values as bare integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => s,
            Scalar::Int(i) => i.to_string(),
        }
    }
}

fn opt_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

fn opt_scalar_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Scalar>>::deserialize(deserializer)?
        .map(|values| values.into_iter().map(String::from).collect()))
}
