mod error;
mod linkermap;
mod manifest;
mod vcs;

pub use error::{Error, Result};
pub use linkermap::{attribute_sizes, parse_linker_map, MapEntry};
pub use manifest::{build, write, Manifest, ManifestArea, ManifestPackage, ManifestPackageInput};
pub use vcs::{GitQuery, VcsInfo, VersionControlQuery};
