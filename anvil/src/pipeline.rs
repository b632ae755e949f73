use std::collections::BTreeMap;
use std::path::Path;

use anvil_flashmap::{parse_areas, FlashMap};
use anvil_resolver::{resolve_split, Resolution, Resolver};
use anyhow::{ensure, Context, Result};
use serde_yaml::Value;

use crate::project::{PackageDb, Project, TargetFile};

pub(crate) fn load_project(project_path: Option<&Path>) -> Result<Project> {
    match project_path {
        Some(p) => Project::load(p),
        None => Project::find_and_load(Path::new(".")),
    }
}

/// A BSP's flash map lives in its own `bsp.yml` under the literal flat key
/// `bsp.flash_map.areas`: a mapping of area name to `{device, offset,
/// size[, user_id]}`. Returns `None` when the BSP carries no `bsp.yml`.
pub(crate) fn load_flashmap(db: &PackageDb, bsp_name: &str) -> Result<Option<FlashMap>> {
    let bsp_pkg = db
        .packages()
        .find(|p| p.name.as_str() == bsp_name)
        .with_context(|| format!("bsp package '{bsp_name}' not found"))?;
    let bsp_yml_path = bsp_pkg.base_path.join("bsp.yml");
    if !bsp_yml_path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&bsp_yml_path)
        .with_context(|| format!("reading '{}'", bsp_yml_path.display()))?;
    let value: Value = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing '{}'", bsp_yml_path.display()))?;
    let areas_value = value
        .as_mapping()
        .and_then(|m| m.get(Value::from("bsp.flash_map.areas")))
        .cloned()
        .unwrap_or(Value::Null);
    let areas = parse_areas(&areas_value).context("parsing bsp.flash_map.areas")?;
    Ok(Some(FlashMap::new(areas)))
}

/// Resolve a target's package set: a single run seeded from its BSP/app
/// when there's no loader, or a split loader-then-app run when
/// `target.loader` is set. Returns the app-stage resolution plus the
/// loader-stage resolution, if any.
pub(crate) fn resolve_target(
    db: &PackageDb,
    target: &TargetFile,
    injected: &BTreeMap<String, String>,
    flashmap: Option<&FlashMap>,
) -> Result<(Resolution, Option<Resolution>)> {
    let mut app_seeds = Vec::new();
    if let Some(bsp) = &target.bsp {
        app_seeds.push(bsp.clone());
    }
    if let Some(app) = &target.app {
        app_seeds.push(app.clone());
    }
    ensure!(
        !app_seeds.is_empty(),
        "target has neither target.bsp nor target.app to seed from"
    );

    if let Some(loader) = &target.loader {
        let (loader_res, app_res) = resolve_split(
            db,
            std::slice::from_ref(loader),
            &app_seeds,
            injected,
            flashmap,
        )
        .context("resolving loader/app target")?;
        Ok((app_res, Some(loader_res)))
    } else {
        let resolution = Resolver::new(db)
            .resolve(&app_seeds, injected, flashmap, target.app.is_some())
            .context("resolving target")?;
        Ok((resolution, None))
    }
}
