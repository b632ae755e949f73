use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::pipeline::load_flashmap;
use crate::project::{load_project, PackageDb};

#[derive(Debug, Parser)]
pub enum MfgCommand {
    /// Split a full-flash blob into one file per area.
    Split(MfgSplit),
    /// Reassemble per-area files into a full-flash blob.
    Join(MfgJoin),
}

/// Split a full-flash image into one sub-blob per area on a device.
#[derive(Debug, Parser)]
pub struct MfgSplit {
    #[clap(long = "project-path")]
    project_path: Option<PathBuf>,

    #[clap(long = "bsp")]
    bsp: String,

    #[clap(long)]
    device: u32,

    #[clap(long)]
    blob: PathBuf,

    /// Directory each `<area>.bin` file is written under.
    #[clap(long = "out-dir")]
    out_dir: PathBuf,
}

impl MfgSplit {
    pub async fn run(&self) -> Result<()> {
        let project = load_project(self.project_path.as_deref())?;
        let db = PackageDb::scan(&project.repo_paths())?;
        let map = load_flashmap(&db, &self.bsp)?
            .with_context(|| format!("bsp '{}' has no bsp.yml flash map", self.bsp))?;

        let blob = std::fs::read(&self.blob)
            .with_context(|| format!("reading '{}'", self.blob.display()))?;
        let parts = anvil_mfgimage::split(&blob, self.device, &map.areas)
            .context("splitting manufacturing image")?;

        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating '{}'", self.out_dir.display()))?;
        for (name, bytes) in parts {
            let path = self.out_dir.join(format!("{name}.bin"));
            std::fs::write(&path, bytes)
                .with_context(|| format!("writing '{}'", path.display()))?;
        }
        Ok(())
    }
}

/// Reassemble per-area files back into a full-flash blob.
#[derive(Debug, Parser)]
pub struct MfgJoin {
    #[clap(long = "project-path")]
    project_path: Option<PathBuf>,

    #[clap(long = "bsp")]
    bsp: String,

    /// Directory holding one `<area>.bin` file per area to include.
    #[clap(long = "in-dir")]
    in_dir: PathBuf,

    #[clap(long = "fill-byte", default_value_t = 0xff)]
    fill_byte: u8,

    #[clap(long)]
    output: PathBuf,
}

impl MfgJoin {
    pub async fn run(&self) -> Result<()> {
        let project = load_project(self.project_path.as_deref())?;
        let db = PackageDb::scan(&project.repo_paths())?;
        let map = load_flashmap(&db, &self.bsp)?
            .with_context(|| format!("bsp '{}' has no bsp.yml flash map", self.bsp))?;

        let mut area_blobs = std::collections::BTreeMap::new();
        for area in &map.areas {
            let path = self.in_dir.join(format!("{}.bin", area.name));
            if path.is_file() {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("reading '{}'", path.display()))?;
                area_blobs.insert(area.name.clone(), bytes);
            }
        }

        let blob = anvil_mfgimage::join(&area_blobs, self.fill_byte, &map.areas)
            .context("joining manufacturing image")?;
        std::fs::write(&self.output, blob)
            .with_context(|| format!("writing '{}'", self.output.display()))?;
        Ok(())
    }
}
