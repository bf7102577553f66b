//! Show command: print configuration values and template placeholders.

use anyhow::{Context, bail};
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use rebump_core::{Config, context};

/// Arguments for the `show` subcommand.
#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Keys to print: dotted config paths (`files.0.filename`) or
    /// placeholder names (`current_major`, `$HOME`, `branch_name`)
    #[arg(value_name = "KEY")]
    pub keys: Vec<String>,

    /// Also expose `new_*` placeholders for this version
    #[arg(long, value_name = "VERSION")]
    pub new_version: Option<String>,
}

/// Execute the show command.
#[instrument(name = "cmd_show", skip_all, fields(json_output))]
pub fn cmd_show(
    args: ShowArgs,
    global_json: bool,
    config: Config,
    root: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, keys = args.keys.len(), "executing show command");

    let tree = serde_json::to_value(&config).context("failed to serialize configuration")?;

    if args.keys.is_empty() {
        if global_json {
            println!("{}", serde_json::to_string_pretty(&tree)?);
        } else {
            print!("{}", serde_saphyr::to_string(&config)?);
        }
        return Ok(());
    }

    let values = lookup_all(&args, &tree, config, root)?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&Value::Object(values))?);
    } else if values.len() == 1 {
        if let Some(value) = values.values().next() {
            println!("{}", display(value));
        }
    } else {
        for (key, value) in &values {
            println!("{}: {}", key.dimmed(), display(value));
        }
    }
    Ok(())
}

fn lookup_all(
    args: &ShowArgs,
    tree: &Value,
    config: Config,
    root: &Utf8Path,
) -> anyhow::Result<Map<String, Value>> {
    let mut values = Map::new();
    let mut pending = Vec::new();
    for key in &args.keys {
        match lookup_path(tree, key) {
            Some(value) => {
                values.insert(key.clone(), value.clone());
            }
            None => pending.push(key.as_str()),
        }
    }
    if pending.is_empty() {
        return Ok(values);
    }

    let project = super::open_project(config, root)?;
    let versions = project.version_config();
    let current = project
        .config()
        .current_version
        .as_deref()
        .map(|v| versions.parse(v))
        .transpose()
        .context("cannot parse current_version")?;
    let new = args
        .new_version
        .as_deref()
        .map(|v| versions.parse(v))
        .transpose()
        .context("cannot parse --new-version")?;
    let ctx = context::build(&project, current.as_ref(), new.as_ref());

    for key in pending {
        let Some(value) = ctx.get(key) else {
            bail!("unknown key {key:?}: not a config path or placeholder");
        };
        let text = value
            .format(None)
            .with_context(|| format!("cannot display {key:?}"))?;
        values.insert(key.to_owned(), Value::String(text));
    }
    Ok(values)
}

/// Walk a dotted path through objects and arrays.
fn lookup_path<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(tree, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
