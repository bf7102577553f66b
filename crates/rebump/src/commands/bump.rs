//! Bump command: thin CLI layer over `rebump_core::bump`.

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use rebump_core::Config;
use rebump_core::bump::{self, BumpOutcome, BumpPlan, BumpRequest};
use rebump_core::files::FileUpdate;

/// Arguments for the `bump` subcommand.
#[derive(Args, Debug, Default)]
pub struct BumpArgs {
    /// The version to move to
    #[arg(long, value_name = "VERSION")]
    pub new_version: String,

    /// Override the configured current version
    #[arg(long, value_name = "VERSION")]
    pub current_version: Option<String>,

    /// Show what would change without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Extra files to update with the top-level settings
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,
}

/// Execute the bump command.
#[instrument(name = "cmd_bump", skip_all, fields(json_output))]
pub fn cmd_bump(
    args: BumpArgs,
    global_json: bool,
    config: Config,
    root: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(
        json_output = global_json,
        dry_run = args.dry_run,
        "executing bump command"
    );

    let mut project = super::open_project(config, root)?;
    let request = BumpRequest {
        new_version: args.new_version,
        current_version: args.current_version,
        files: args.files,
    };
    let plan = bump::plan_bump(&mut project, &request).context("bump planning failed")?;
    let outcome = plan
        .execute(project.root(), args.dry_run)
        .context("bump failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_plan(&plan);
    print_outcome(&outcome);
    Ok(())
}

fn print_plan(plan: &BumpPlan) {
    println!(
        "{}: {} → {}",
        "Version".bold(),
        plan.current_version.dimmed(),
        plan.new_version.green().bold()
    );
    if let Some(ref message) = plan.commit_message {
        println!("{}: {}", "Commit".dimmed(), message);
    }
    if let Some(ref tag) = plan.tag_name {
        println!("{}: {}", "Tag".dimmed(), tag);
    }
}

fn print_outcome(outcome: &BumpOutcome) {
    println!();
    let mut changed = 0;
    for file in outcome.changed_files() {
        changed += 1;
        if outcome.dry_run {
            println!("  {} {}", "~".yellow(), file.filename.cyan());
            print_diff(file);
        } else {
            println!("  {} {}", "✓".green(), file.filename.cyan());
        }
    }
    for file in outcome.files.iter().filter(|f| !f.is_changed()) {
        println!("  {} {} (unchanged)", "○".dimmed(), file.filename.dimmed());
    }

    println!();
    if outcome.dry_run {
        println!(
            "{}",
            format!("Dry run: {changed} file(s) would change, nothing written.").yellow()
        );
    } else {
        println!(
            "  {} Version updated to {} in {} file(s)",
            "✓".green(),
            outcome.new_version.green().bold(),
            outcome.modified_files.len()
        );
    }
}

/// Print the lines that differ, position by position.
fn print_diff(file: &FileUpdate) {
    let before: Vec<&str> = file.before.lines().collect();
    let after: Vec<&str> = file.after.lines().collect();
    for i in 0..before.len().max(after.len()) {
        match (before.get(i), after.get(i)) {
            (Some(old), Some(new)) if old == new => {}
            (old, new) => {
                if let Some(old) = old {
                    println!("      {}", format!("-{old}").red());
                }
                if let Some(new) = new {
                    println!("      {}", format!("+{new}").green());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rebump_core::config::FileConfig;
    use tempfile::TempDir;

    fn setup(body: &str) -> (TempDir, Utf8PathBuf, Config) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        std::fs::write(root.join("VERSION"), body).unwrap();
        let config = Config {
            current_version: Some("1.2.3".into()),
            files: vec![FileConfig {
                filename: Some("VERSION".into()),
                ..FileConfig::default()
            }],
            ..Config::default()
        };
        (tmp, root, config)
    }

    fn args(new: &str, dry_run: bool) -> BumpArgs {
        BumpArgs {
            new_version: new.into(),
            dry_run,
            ..BumpArgs::default()
        }
    }

    #[test]
    fn test_cmd_bump_writes_file() {
        let (_tmp, root, config) = setup("1.2.3\n");
        cmd_bump(args("1.3.0", false), false, config, &root).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("VERSION")).unwrap(), "1.3.0\n");
    }

    #[test]
    fn test_cmd_bump_dry_run_leaves_file() {
        let (_tmp, root, config) = setup("1.2.3\n");
        cmd_bump(args("1.3.0", true), true, config, &root).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("VERSION")).unwrap(), "1.2.3\n");
    }

    #[test]
    fn test_cmd_bump_missing_version_fails() {
        let (_tmp, root, config) = setup("nothing here\n");
        assert!(cmd_bump(args("1.3.0", false), false, config, &root).is_err());
    }
}
