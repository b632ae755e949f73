use std::path::PathBuf;

use anvil_manifest::{GitQuery, ManifestPackageInput};
use anyhow::{Context, Result};
use clap::Parser;

use crate::common::{report_diagnostics, settings_map};
use crate::pipeline::{load_flashmap, load_project, resolve_target};
use crate::project::{load_target, PackageDb};

/// Resolve a target and build its JSON build manifest.
#[derive(Debug, Parser)]
pub struct Manifest {
    #[clap(long = "project-path")]
    project_path: Option<PathBuf>,

    #[clap(long = "target")]
    target: PathBuf,

    /// Name recorded as the manifest's `target` field.
    #[clap(long = "target-name")]
    target_name: String,

    #[clap(long = "output")]
    output: PathBuf,

    /// Optional GNU-ld–style linker map to attribute per-package sizes from.
    #[clap(long = "linker-map")]
    linker_map: Option<PathBuf>,

    #[clap(long)]
    force_overflow: bool,
}

impl Manifest {
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

        let inputs: Vec<ManifestPackageInput> = resolution
            .packages
            .values()
            .map(|resolved| ManifestPackageInput {
                name: resolved.package.name.clone(),
                base_path: resolved.package.base_path.clone(),
            })
            .collect();

        let linker_map_text = self
            .linker_map
            .as_ref()
            .map(|path| {
                std::fs::read_to_string(path)
                    .with_context(|| format!("reading '{}'", path.display()))
            })
            .transpose()?;

        let settings = settings_map(&resolution.syscfg);
        let syscfg: std::collections::BTreeMap<String, String> = settings.into_iter().collect();

        let manifest = anvil_manifest::build(
            &self.target_name,
            &inputs,
            &syscfg,
            flashmap.as_ref(),
            linker_map_text.as_deref(),
            &GitQuery,
        )
        .await
        .context("building manifest")?;

        anvil_manifest::write(&manifest, &self.output).context("writing manifest")?;
        Ok(())
    }
}
