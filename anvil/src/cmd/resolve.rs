use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::common::report_diagnostics;
use crate::pipeline::{load_flashmap, load_project, resolve_target};
use crate::project::{load_target, PackageDb};

/// Run the resolver end to end over a project and target, printing the
/// resolved package set and any diagnostics.
#[derive(Debug, Parser)]
pub struct Resolve {
    /// Path to Project.toml. Searched for upward from the current
    /// directory when absent.
    #[clap(long = "project-path")]
    project_path: Option<PathBuf>,

    /// Path to the target's `target.yml`.
    #[clap(long = "target")]
    target: PathBuf,

    /// Treat an image-overflow diagnostic as a warning instead of an
    /// error when deciding the process exit status.
    #[clap(long)]
    force_overflow: bool,
}

impl Resolve {
    pub async fn run(&self) -> Result<()> {
        let project = load_project(self.project_path.as_deref())?;
        let db = PackageDb::scan(&project.repo_paths())?;
        let target = load_target(&self.target)?;

        let flashmap = match &target.bsp {
            Some(bsp) => load_flashmap(&db, bsp)?,
            None => None,
        };

        let (resolution, loader) =
            resolve_target(&db, &target, &project.file.injected, flashmap.as_ref())?;

        if let Some(loader) = &loader {
            info!("loader stage: {} packages", loader.packages.len());
            for (name, pkg) in &loader.packages {
                println!("loader\t{name}\t{:?}", pkg.package.kind);
            }
        }
        for (name, pkg) in &resolution.packages {
            println!("app\t{name}\t{:?}", pkg.package.kind);
        }

        let mut has_errors = report_diagnostics(&resolution.diagnostics, self.force_overflow);
        if let Some(loader) = &loader {
            has_errors |= report_diagnostics(&loader.diagnostics, self.force_overflow);
        }
        anyhow::ensure!(!has_errors, "resolution reported one or more errors");
        Ok(())
    }
}
