//! The layered rendering context.
//!
//! A [`RenderContext`] is an ordered stack of key/value layers, highest
//! priority first. Looking up a key walks the stack and stops at the first
//! layer that has it; layers never merge.
//!
//! [`ContextBuilder`] assembles the standard stack:
//!
//! 1. `new_<part>` for each part of the new version
//! 2. `current_<part>` for each part of the current version
//! 3. `current_version` from the configuration
//! 4. `now` and `utcnow`
//! 5. every environment variable as `$NAME`
//! 6. every SCM metadata field
//! 7. `#` and `;` mapped to themselves

use std::fmt;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDateTime, Utc};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::git::ScmInfo;
use crate::project::Project;
use crate::version::Version;

/// Default rendering of a timestamp without a format spec.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Characters that map to themselves so templates can spell them out.
const PASSTHROUGH: &[&str] = &["#", ";"];

/// Why a value could not be formatted with a spec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Text values take no format spec.
    #[error("text values do not accept a format spec")]
    TextSpec,

    /// The strftime spec has an unknown or incomplete directive.
    #[error("invalid strftime directive")]
    Strftime,
}

/// A single value in a context layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextValue {
    /// Plain text, substituted as-is.
    Text(String),
    /// A point in time; honors strftime format specs like `{now:%Y-%m-%d}`.
    Timestamp(NaiveDateTime),
}

impl ContextValue {
    /// Render the value, applying an optional format spec.
    pub fn format(&self, spec: Option<&str>) -> Result<String, FormatError> {
        match (self, spec) {
            (Self::Text(text), None) => Ok(text.clone()),
            (Self::Text(text), Some(spec)) if spec.is_empty() => Ok(text.clone()),
            (Self::Text(_), Some(_)) => Err(FormatError::TextSpec),
            (Self::Timestamp(ts), spec) => {
                let spec = spec.filter(|s| !s.is_empty()).unwrap_or(TIMESTAMP_FORMAT);
                if StrftimeItems::new(spec).any(|item| matches!(item, Item::Error)) {
                    return Err(FormatError::Strftime);
                }
                Ok(ts.format(spec).to_string())
            }
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One priority level of a [`RenderContext`].
pub type Layer = IndexMap<String, ContextValue>;

/// An immutable stack of layers, highest priority first.
///
/// Layers are shared between derived contexts, so [`with_layer`](Self::with_layer)
/// is cheap even when the environment layer is large.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    layers: Vec<Arc<Layer>>,
}

impl RenderContext {
    /// Build a context from layers given highest priority first.
    pub fn from_layers<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().map(Arc::new).collect(),
        }
    }

    /// Look up a key; the first layer holding it wins.
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }

    /// Whether any layer provides `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Derive a new context with `layer` on top of this one.
    #[must_use]
    pub fn with_layer(&self, layer: Layer) -> Self {
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.push(Arc::new(layer));
        layers.extend(self.layers.iter().cloned());
        Self { layers }
    }

    /// Number of layers in the stack.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Every visible key with its winning value, in priority order.
    pub fn flatten(&self) -> IndexMap<&str, &ContextValue> {
        let mut out = IndexMap::new();
        for layer in &self.layers {
            for (key, value) in layer.iter() {
                out.entry(key.as_str()).or_insert(value);
            }
        }
        out
    }
}

/// Assembles the standard context stack.
///
/// Environment, clock, and SCM inputs default to the live process state and
/// can be replaced for deterministic rendering.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    current_version: Option<String>,
    scm_info: ScmInfo,
    env: Option<Vec<(String, String)>>,
    now: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl ContextBuilder {
    /// Start a builder with the configured `current_version` setting.
    pub fn new(current_version: Option<&str>) -> Self {
        Self {
            current_version: current_version.map(str::to_owned),
            ..Self::default()
        }
    }

    /// Use this SCM snapshot for the metadata layer.
    #[must_use]
    pub fn with_scm_info(mut self, scm_info: ScmInfo) -> Self {
        self.scm_info = scm_info;
        self
    }

    /// Use these variables instead of the process environment.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Pin `now` (local) and `utcnow` instead of reading the clock.
    #[must_use]
    pub const fn at(mut self, now: NaiveDateTime, utcnow: NaiveDateTime) -> Self {
        self.now = Some((now, utcnow));
        self
    }

    /// Build the context for the given versions.
    #[instrument(skip_all, fields(current = current.is_some(), new = new.is_some()))]
    pub fn build(&self, current: Option<&Version>, new: Option<&Version>) -> RenderContext {
        let mut layers = Vec::with_capacity(7);

        if let Some(version) = new {
            layers.push(part_layer("new_", version));
        }
        if let Some(version) = current {
            layers.push(part_layer("current_", version));
        }

        let mut settings = Layer::new();
        if let Some(ref current_version) = self.current_version {
            settings.insert("current_version".into(), current_version.as_str().into());
        }
        layers.push(settings);

        let (now, utcnow) = self
            .now
            .unwrap_or_else(|| (Local::now().naive_local(), Utc::now().naive_utc()));
        let mut clock = Layer::new();
        clock.insert("now".into(), ContextValue::Timestamp(now));
        clock.insert("utcnow".into(), ContextValue::Timestamp(utcnow));
        layers.push(clock);

        let env: Layer = match self.env {
            Some(ref vars) => vars
                .iter()
                .map(|(k, v)| (format!("${k}"), v.as_str().into()))
                .collect(),
            None => std::env::vars()
                .map(|(k, v)| (format!("${k}"), v.into()))
                .collect(),
        };
        layers.push(env);

        layers.push(
            self.scm_info
                .fields()
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.into()))
                .collect(),
        );

        layers.push(
            PASSTHROUGH
                .iter()
                .map(|c| ((*c).to_owned(), (*c).into()))
                .collect(),
        );

        let context = RenderContext::from_layers(layers);
        debug!(depth = context.depth(), "built render context");
        context
    }
}

/// Build the standard context for a project.
pub fn build(project: &Project, current: Option<&Version>, new: Option<&Version>) -> RenderContext {
    ContextBuilder::new(project.config().current_version.as_deref())
        .with_scm_info(project.scm_info().clone())
        .build(current, new)
}

fn part_layer(prefix: &str, version: &Version) -> Layer {
    version
        .iter()
        .map(|(name, value)| (format!("{prefix}{name}"), value.into()))
        .collect()
}
