use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::error;

use crate::pipeline::load_flashmap;
use crate::project::{load_project, PackageDb};

/// Emit `sysflash/sysflash.h` and its matching source file for a BSP's
/// flash map. Aborts without writing anything if the map has a conflict.
#[derive(Debug, Parser)]
pub struct FlashmapEmit {
    #[clap(long = "project-path")]
    project_path: Option<PathBuf>,

    /// Name of the BSP package whose `bsp.yml` carries the flash map.
    #[clap(long = "bsp")]
    bsp: String,

    #[clap(long = "include-dir")]
    include_dir: PathBuf,

    #[clap(long = "src-dir")]
    src_dir: PathBuf,
}

impl FlashmapEmit {
    pub async fn run(&self) -> Result<()> {
        let project = load_project(self.project_path.as_deref())?;
        let db = PackageDb::scan(&project.repo_paths())?;

        let map = load_flashmap(&db, &self.bsp)?
            .with_context(|| format!("bsp '{}' has no bsp.yml flash map", self.bsp))?;

        let diagnostics = map.diagnostics();
        if !diagnostics.is_empty() {
            for diag in &diagnostics {
                error!("{diag}");
            }
            anyhow::bail!("flash map has one or more conflicts; not writing sysflash");
        }

        anvil_flashmap::emit(&map, &self.include_dir, &self.src_dir)
            .context("writing sysflash.h/sysflash.c")?;
        Ok(())
    }
}
