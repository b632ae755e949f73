use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::common::report_diagnostics;
use crate::pipeline::{load_flashmap, load_project, resolve_target};
use crate::project::{load_target, PackageDb};

/// Resolve a target and emit its `syscfg/syscfg.h` and `logcfg/logcfg.h`.
#[derive(Debug, Parser)]
pub struct SyscfgEmit {
    #[clap(long = "project-path")]
    project_path: Option<PathBuf>,

    #[clap(long = "target")]
    target: PathBuf,

    /// Directory the `syscfg/` and `logcfg/` header trees are written
    /// under.
    #[clap(long = "include-dir")]
    include_dir: PathBuf,

    #[clap(long)]
    force_overflow: bool,
}

impl SyscfgEmit {
    pub async fn run(&self) -> Result<()> {
        let project = load_project(self.project_path.as_deref())?;
        let db = PackageDb::scan(&project.repo_paths())?;
        let target = load_target(&self.target)?;

        let flashmap = match &target.bsp {
            Some(bsp) => load_flashmap(&db, bsp)?,
            None => None,
        };

        let (resolution, _loader) =
            resolve_target(&db, &target, &project.file.injected, flashmap.as_ref())?;

        let has_errors = report_diagnostics(&resolution.diagnostics, self.force_overflow);
        anyhow::ensure!(!has_errors, "resolution reported one or more errors");

        anvil_syscfg::emit(&resolution.syscfg, &self.include_dir)
            .context("writing syscfg.h/logcfg.h")?;
        Ok(())
    }
}
