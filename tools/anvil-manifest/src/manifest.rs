use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anvil_flashmap::FlashMap;
use anvil_model::package::PackageName;
use serde::Serialize;
use snafu::ResultExt;

use crate::error::{Result, SerializeSnafu, WriteSnafu};
use crate::linkermap::{attribute_sizes, parse_linker_map};
use crate::vcs::VersionControlQuery;

/// One resolved package as it appears in a manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestPackage {
    pub name: String,
    pub repo: String,
    pub commit_hash: String,
    pub dirty: bool,
    pub origin_url: String,
    pub size: u64,
}

/// One flash area as it appears in a manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestArea {
    pub name: String,
    pub id: u32,
    pub device: u32,
    pub offset: u64,
    pub size: u64,
}

/// The full build manifest: package list with VCS provenance, syscfg
/// values, per-package linker-map sizes, and the flash area list.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub target: String,
    pub packages: Vec<ManifestPackage>,
    pub syscfg: BTreeMap<String, String>,
    pub flash_areas: Vec<ManifestArea>,
}

/// Repo name heuristic: the `@repo/...` prefix of a package name, or the
/// first path segment when there's no `@repo` prefix.
fn repo_of(name: &str) -> String {
    if let Some(rest) = name.strip_prefix('@') {
        rest.split('/').next().unwrap_or(rest).to_string()
    } else {
        name.split('/').next().unwrap_or(name).to_string()
    }
}

/// One package input to manifest assembly: its identity, on-disk base
/// path (for VCS queries and linker-map attribution), and resolution
/// status.
pub struct ManifestPackageInput {
    pub name: PackageName,
    pub base_path: PathBuf,
}

/// Build the manifest for `target`: query VCS info for each package
/// (via `vcs`), attribute linker-map sizes, and pair with the already-
/// computed syscfg and flash map.
pub async fn build(
    target: &str,
    packages: &[ManifestPackageInput],
    syscfg: &BTreeMap<String, String>,
    flashmap: Option<&FlashMap>,
    linker_map_text: Option<&str>,
    vcs: &dyn VersionControlQuery,
) -> Result<Manifest> {
    let sizes = linker_map_text
        .map(|text| {
            let entries = parse_linker_map(text);
            let package_paths: Vec<(String, PathBuf)> = packages
                .iter()
                .map(|p| (p.name.to_string(), p.base_path.clone()))
                .collect();
            attribute_sizes(&entries, &package_paths)
        })
        .unwrap_or_default();

    let mut manifest_packages = Vec::with_capacity(packages.len());
    for p in packages {
        let info = vcs.query(&p.base_path).await?;
        manifest_packages.push(ManifestPackage {
            name: p.name.to_string(),
            repo: repo_of(p.name.as_str()),
            commit_hash: info.commit_hash,
            dirty: info.dirty,
            origin_url: info.origin_url,
            size: sizes.get(&p.name.to_string()).copied().unwrap_or(0),
        });
    }
    manifest_packages.sort_by(|a, b| a.name.cmp(&b.name));

    let flash_areas = flashmap
        .map(|m| {
            let mut areas: Vec<ManifestArea> = m
                .sorted_by_id()
                .into_iter()
                .map(|a| ManifestArea {
                    name: a.name.clone(),
                    id: a.id,
                    device: a.device,
                    offset: a.offset,
                    size: a.size,
                })
                .collect();
            areas.sort_by_key(|a| a.id);
            areas
        })
        .unwrap_or_default();

    Ok(Manifest {
        target: target.to_string(),
        packages: manifest_packages,
        syscfg: syscfg.clone(),
        flash_areas,
    })
}

/// Pretty-print the manifest as JSON and write it to `path`, only if the
/// contents differ from what's already there. `serde_json` never escapes
/// `<`, `>`, or `&` (unlike some JSON encoders), so "without HTML
/// escaping" falls out of using it directly with no extra configuration.
pub fn write(manifest: &Manifest, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(manifest).context(SerializeSnafu)?;
    if let Ok(existing) = std::fs::read_to_string(path) {
        if existing == text {
            return Ok(());
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context(WriteSnafu { path: path.to_path_buf() })?;
    }
    std::fs::write(path, text).context(WriteSnafu { path: path.to_path_buf() })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn repo_of_handles_at_prefixed_and_bare_names() {
        assert_eq!(repo_of("@apache-mynewt-core/kernel/os"), "apache-mynewt-core");
        assert_eq!(repo_of("lib/a"), "lib");
    }

    #[tokio::test]
    async fn build_sorts_packages_by_name() {
        struct FakeVcs;
        #[async_trait::async_trait]
        impl VersionControlQuery for FakeVcs {
            async fn query(&self, _base_path: &Path) -> Result<crate::vcs::VcsInfo> {
                Ok(crate::vcs::VcsInfo {
                    commit_hash: "abc123".to_string(),
                    dirty: false,
                    origin_url: "git@example.com:repo.git".to_string(),
                })
            }
        }

        let packages = vec![
            ManifestPackageInput {
                name: PackageName::new("lib/b"),
                base_path: PathBuf::from("b"),
            },
            ManifestPackageInput {
                name: PackageName::new("lib/a"),
                base_path: PathBuf::from("a"),
            },
        ];
        let manifest = build(
            "myapp",
            &packages,
            &BTreeMap::new(),
            None,
            None,
            &FakeVcs,
        )
        .await
        .unwrap();

        let names: Vec<&str> = manifest.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["lib/a", "lib/b"]);
    }
}
