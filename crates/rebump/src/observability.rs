//! Structured JSONL logging.
//!
//! Logs never go to stdout, which carries command output (including
//! `--json`). They go to a daily-rolling file, or to stderr when no log
//! location is writable.
//!
//! The log location is, in order: `REBUMP_LOG_PATH`, `REBUMP_LOG_DIR`, the
//! configured `log_dir`, the platform data directory, the temp directory.
//! The project being bumped is never a candidate, since a log file there
//! would dirty the working tree.

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::{Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::Event;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "REBUMP_LOG_PATH";
const ENV_LOG_DIR: &str = "REBUMP_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where logs should go, before environment overrides are applied.
#[derive(Clone, Debug)]
pub struct LogSettings {
    /// Stem of the log file name and the `service` field of every entry.
    pub service: String,
    /// The configured `log_dir`, if any.
    pub log_dir: Option<Utf8PathBuf>,
}

impl LogSettings {
    /// Settings for this binary with the configured log directory.
    pub fn new(log_dir: Option<Utf8PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: Utf8PathBuf,
    file_name: String,
}

/// Keeps the background log writer alive; drop it last.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Currently infallible; an unwritable log location degrades to stderr.
pub fn init_observability(
    settings: &LogSettings,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, guard) = match resolve_log_target(settings) {
        Ok(target) => {
            let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
            tracing_appender::non_blocking(appender)
        }
        Err(err) => {
            eprintln!("Warning: {err}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLogLayer::new(writer, settings.service.clone()))
        .init();

    tracing::debug!("logging initialized");

    Ok(ObservabilityGuard { _log_guard: guard })
}

/// Build an `EnvFilter` based on CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > RUST_LOG env > default_level
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    if verbose > 0 {
        let level = match verbose {
            1 => "debug",
            _ => "trace",
        };
        return EnvFilter::new(level);
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

// ============================================================================
// JSON Log Layer
// ============================================================================

struct JsonLogLayer<W> {
    writer: W,
    service: String,
}

impl<W> JsonLogLayer<W> {
    const fn new(writer: W, service: String) -> Self {
        Self { writer, service }
    }
}

impl<S, W> tracing_subscriber::Layer<S> for JsonLogLayer<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = JsonVisitor::default();
            attrs.record(&mut visitor);
            span.extensions_mut().insert(SpanFields {
                values: visitor.values,
            });
        }
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            let mut extensions = span.extensions_mut();
            if let Some(fields) = extensions.get_mut::<SpanFields>() {
                fields.values.extend(visitor.values);
            } else {
                extensions.insert(SpanFields {
                    values: visitor.values,
                });
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let mut map = Map::new();
        map.insert("timestamp".into(), Value::String(timestamp()));
        map.insert(
            "level".into(),
            Value::String(event.metadata().level().as_str().to_lowercase()),
        );
        map.insert("service".into(), Value::String(self.service.clone()));
        map.insert(
            "target".into(),
            Value::String(event.metadata().target().to_string()),
        );

        if let Some(scope) = ctx.event_scope(event) {
            let mut spans = Vec::new();
            for span in scope.from_root() {
                spans.push(Value::String(span.name().to_string()));
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    map.extend(fields.values.clone());
                }
            }
            map.insert("spans".into(), Value::Array(spans));
        }

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        map.extend(visitor.values);

        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &Value::Object(map)).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

#[derive(Clone, Debug)]
struct SpanFields {
    values: Map<String, Value>,
}

#[derive(Default)]
struct JsonVisitor {
    values: Map<String, Value>,
}

impl tracing::field::Visit for JsonVisitor {
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.values
            .insert(field.name().to_string(), Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.values
            .insert(field.name().to_string(), Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.values
            .insert(field.name().to_string(), Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.values
                .insert(field.name().to_string(), Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.values
            .insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.values
            .insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.values.insert(
            field.name().to_string(),
            Value::String(format!("{value:?}")),
        );
    }
}

/// RFC 3339 UTC timestamp with millisecond precision.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Log Target Resolution
// ============================================================================

fn resolve_log_target(settings: &LogSettings) -> Result<LogTarget> {
    let from_env = |name: &str| {
        std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .map(Utf8PathBuf::from)
    };
    resolve_log_target_with(
        &settings.service,
        from_env(ENV_LOG_PATH),
        from_env(ENV_LOG_DIR),
        settings.log_dir.clone(),
        default_candidates(),
    )
}

fn default_candidates() -> Vec<Utf8PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = rebump_core::config::user_data_local_dir() {
        candidates.push(dir.join("logs"));
    }
    if let Ok(tmp) = Utf8PathBuf::try_from(std::env::temp_dir()) {
        candidates.push(tmp.join("rebump"));
    }
    candidates
}

fn resolve_log_target_with(
    service: &str,
    path_override: Option<Utf8PathBuf>,
    dir_override: Option<Utf8PathBuf>,
    config_dir: Option<Utf8PathBuf>,
    candidates: Vec<Utf8PathBuf>,
) -> Result<LogTarget> {
    if let Some(path) = path_override {
        return log_target_from_path(&path);
    }

    let file_name = format!("{service}{LOG_FILE_SUFFIX}");
    // An explicit directory must work; fallbacks are tried quietly.
    if let Some(dir) = dir_override.or(config_dir) {
        ensure_writable(&dir, &file_name)?;
        return Ok(LogTarget { dir, file_name });
    }

    candidates
        .into_iter()
        .find(|dir| ensure_writable(dir, &file_name).is_ok())
        .map(|dir| LogTarget {
            dir,
            file_name: file_name.clone(),
        })
        .ok_or_else(|| anyhow!("no writable log directory found"))
}

fn log_target_from_path(path: &Utf8Path) -> Result<LogTarget> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("{ENV_LOG_PATH} must include a file name"))?
        .to_string();
    let dir = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."))
        .to_path_buf();
    ensure_writable(&dir, &file_name)?;
    Ok(LogTarget { dir, file_name })
}

fn ensure_writable(dir: &Utf8Path, file_name: &str) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow!("failed to create log directory {dir}: {e}"))?;

    let path = dir.join(file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| anyhow!("failed to open log file {path}: {e}"))?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
