use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

use crate::BIN_NAME;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory (default: dist/share/man/man1)
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::workspace_root().join(args.out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let cmd = rebump::command();
    write_page(cmd.clone(), &out_dir.join(format!("{BIN_NAME}.1")))?;

    // `rebump bump` documents as rebump-bump(1)
    for subcommand in cmd.get_subcommands() {
        let name = format!("{BIN_NAME}-{}", subcommand.get_name());
        let page = subcommand.clone().name(name.clone());
        write_page(page, &out_dir.join(format!("{name}.1")))?;
    }

    Ok(())
}

fn write_page(cmd: clap::Command, path: &Path) -> Result<(), String> {
    let mut buffer: Vec<u8> = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("render {}: {e}", path.display()))?;
    fs::write(path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
