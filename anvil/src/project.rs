use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anvil_model::{Package, PackageType};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_yaml::Value;

pub(crate) const PROJECT_FILE_NAME: &str = "Project.toml";

/// The project-level configuration file, the workspace-wide equivalent of
/// `target.yml`'s umbrella: which repositories to scan for packages and
/// any settings the driving tool injects directly.
#[derive(Debug, Deserialize)]
pub(crate) struct ProjectFile {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) repositories: Vec<PathBuf>,
    #[serde(default)]
    pub(crate) injected: BTreeMap<String, String>,
}

pub(crate) struct Project {
    pub(crate) file: ProjectFile,
    pub(crate) project_dir: PathBuf,
}

impl Project {
    /// Load a specific `Project.toml`-like file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading project file '{}'", path.display()))?;
        let file: ProjectFile = toml::from_str(&text)
            .with_context(|| format!("parsing project file '{}'", path.display()))?;
        let project_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Project { file, project_dir })
    }

    /// Search `start` and its ancestors for `Project.toml`.
    pub(crate) fn find_and_load(start: &Path) -> Result<Self> {
        let abs = start
            .canonicalize()
            .with_context(|| format!("resolving '{}'", start.display()))?;
        for dir in abs.ancestors() {
            let candidate = dir.join(PROJECT_FILE_NAME);
            if candidate.is_file() {
                return Self::load(&candidate);
            }
        }
        bail!(
            "no {} found searching upward from '{}'",
            PROJECT_FILE_NAME,
            start.display()
        )
    }

    /// Repository paths resolved relative to the project directory.
    pub(crate) fn repo_paths(&self) -> Vec<PathBuf> {
        self.file
            .repositories
            .iter()
            .map(|p| self.project_dir.join(p))
            .collect()
    }
}

fn mapping_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_mapping()?.get(Value::from(key))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    mapping_get(value, key)?.as_str().map(str::to_string)
}

fn string_list_field(value: &Value, key: &str) -> Vec<String> {
    mapping_get(value, key)
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn package_type_of(text: Option<&str>) -> PackageType {
    match text {
        Some("bsp") => PackageType::Bsp,
        Some("app") => PackageType::App,
        Some("unittest") => PackageType::Unittest,
        Some("target") => PackageType::Target,
        Some("sdk") => PackageType::Sdk,
        Some("compiler") => PackageType::Compiler,
        _ => PackageType::Lib,
    }
}

/// Load one package from its `pkg.yml` path, pulling in a sibling
/// `syscfg.yml` when present. `pkg.yml`'s keys are flat, dotted strings
/// (`pkg.name`, `pkg.deps`, ...) — not a nested `pkg:` mapping — so the
/// raw value is stored as-is for `anvil_resolver`'s `build_ycfg` to merge,
/// and the identity fields below are read the same flat way.
fn load_package(pkg_yml_path: &Path) -> Result<Package> {
    let text = std::fs::read_to_string(pkg_yml_path)
        .with_context(|| format!("reading '{}'", pkg_yml_path.display()))?;
    let value: Value = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing '{}'", pkg_yml_path.display()))?;

    let name = string_field(&value, "pkg.name")
        .with_context(|| format!("'{}' has no pkg.name", pkg_yml_path.display()))?;
    let kind = package_type_of(string_field(&value, "pkg.type").as_deref());
    let base_path = pkg_yml_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut package = Package::new(name, kind, base_path);
    package.deps = string_list_field(&value, "pkg.deps");
    package.provided_apis = string_list_field(&value, "pkg.apis");
    package.required_apis = string_list_field(&value, "pkg.req_apis");
    package.pkg_yml = value;

    let syscfg_path = pkg_yml_path.with_file_name("syscfg.yml");
    if syscfg_path.is_file() {
        let syscfg_text = std::fs::read_to_string(&syscfg_path)
            .with_context(|| format!("reading '{}'", syscfg_path.display()))?;
        package.syscfg_yml = serde_yaml::from_str(&syscfg_text)
            .with_context(|| format!("parsing '{}'", syscfg_path.display()))?;
    }

    Ok(package)
}

fn find_pkg_ymls(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            find_pkg_ymls(&path, out)?;
        } else if path.file_name().is_some_and(|n| n == "pkg.yml") {
            out.push(path);
        }
    }
    Ok(())
}

/// An in-memory package database built by scanning a project's
/// repositories for `pkg.yml` files; implements
/// [`anvil_resolver::DependencyOracle`] directly so the resolver never
/// touches the filesystem itself.
pub(crate) struct PackageDb {
    by_name: BTreeMap<String, Package>,
}

impl PackageDb {
    pub(crate) fn scan(repos: &[PathBuf]) -> Result<Self> {
        let mut paths = Vec::new();
        for repo in repos {
            if repo.is_dir() {
                find_pkg_ymls(repo, &mut paths)?;
            }
        }
        let mut by_name = BTreeMap::new();
        for path in paths {
            let package = load_package(&path)?;
            by_name.insert(package.name.to_string(), package);
        }
        Ok(PackageDb { by_name })
    }

    pub(crate) fn packages(&self) -> impl Iterator<Item = &Package> {
        self.by_name.values()
    }
}

impl anvil_resolver::DependencyOracle for PackageDb {
    fn lookup(&self, name: &str) -> Option<Package> {
        self.by_name.get(name).cloned()
    }
}

/// A target's configuration (`target.yml`): the BSP, optional app and
/// loader seed packages, and a syscfg fragment of its own.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TargetFile {
    #[serde(rename = "target.bsp")]
    pub(crate) bsp: Option<String>,
    #[serde(rename = "target.app")]
    pub(crate) app: Option<String>,
    #[serde(rename = "target.loader")]
    pub(crate) loader: Option<String>,
}

pub(crate) fn load_target(path: &Path) -> Result<TargetFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading '{}'", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing '{}'", path.display()))
}
