use std::path::PathBuf;

use anvil_model::package::PackageName;
use anvil_resolver::Resolution;
use anvil_stagecall::CallEntry;
use anyhow::{Context, Result};
use clap::Parser;
use serde_yaml::Value;

use crate::common::{report_diagnostics, settings_map};
use crate::pipeline::{load_flashmap, load_project, resolve_target};
use crate::project::{load_target, PackageDb};

/// Resolve a target and emit its `sysinit`/`sysdown` call tables.
#[derive(Debug, Parser)]
pub struct StagecallEmit {
    #[clap(long = "project-path")]
    project_path: Option<PathBuf>,

    #[clap(long = "target")]
    target: PathBuf,

    /// Name the generated tables and files are prefixed with.
    #[clap(long = "target-name")]
    target_name: String,

    #[clap(long = "src-dir")]
    src_dir: PathBuf,

    #[clap(long)]
    force_overflow: bool,
}

/// Pull `{symbol: stage}` entries out of a package's raw `pkg.yml` mapping
/// under `key` (`pkg.init_funcs` or `pkg.down_funcs`). Only the exact flat
/// key is read; conditional `.{expression}` variants are a stretch this
/// thin CLI doesn't attempt.
fn call_entries(resolution: &Resolution, key: &str) -> Vec<CallEntry> {
    let mut entries = Vec::new();
    for resolved in resolution.packages.values() {
        let Some(table) = resolved
            .package
            .pkg_yml
            .as_mapping()
            .and_then(|m| m.get(Value::from(key)))
            .and_then(Value::as_mapping)
        else {
            continue;
        };
        for (symbol, stage) in table {
            let Some(symbol) = symbol.as_str() else {
                continue;
            };
            let raw_stage = match stage {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            entries.push(CallEntry::new(
                symbol,
                PackageName::new(resolved.package.name.to_string()),
                raw_stage,
            ));
        }
    }
    entries
}

impl StagecallEmit {
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

        let settings = settings_map(&resolution.syscfg);
        let view: &dyn anvil_expr::SettingsView = &settings;

        let init_entries = call_entries(&resolution, "pkg.init_funcs");
        let down_entries = call_entries(&resolution, "pkg.down_funcs");

        let (init_resolved, init_dupes) = anvil_stagecall::resolve_stages(&init_entries, view)
            .context("resolving sysinit stages")?;
        let (down_resolved, down_dupes) = anvil_stagecall::resolve_stages(&down_entries, view)
            .context("resolving sysdown stages")?;
        for (stage, symbol) in init_dupes.iter().chain(down_dupes.iter()) {
            log::warn!("duplicate stage-call entry at stage {stage}: {symbol}");
        }

        anvil_stagecall::emit(&self.target_name, &self.src_dir, &init_resolved, &down_resolved)
            .context("writing sysinit/sysdown tables")?;
        Ok(())
    }
}
