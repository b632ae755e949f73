use std::fmt;

use crate::package::PackageName;

/// Diagnostics never abort a run on their own: the resolver and syscfg
/// collect them and the caller decides, at the end, whether any `Error`-
/// severity diagnostic should fail the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// One recorded diagnostic. Variants mirror the collected (non-short-
/// circuiting) error kinds; `ParseError`/`TypeMismatch`/`Io`/`Crypto`
/// are not here because those abort the operation that raised them
/// immediately and are represented as ordinary `Result` errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Override of a name no package defines.
    Orphan { setting: String, source: PackageName },
    /// Two distinct packages define the same setting.
    Redefine {
        setting: String,
        packages: Vec<PackageName>,
    },
    /// Override by a package not of strictly higher priority class than
    /// the definer (and not a self-override).
    PriorityViolation {
        setting: String,
        definer: PackageName,
        source: PackageName,
    },
    /// Disagreeing overrides from same-class packages.
    Ambiguity {
        setting: String,
        packages: Vec<PackageName>,
    },
    /// A `$notnull`, expression, choice, or range restriction failed.
    RestrictionViolation { setting: String, restriction: String },
    /// Two flash areas overlap, two ids collide, or two `flash_owner`
    /// settings point at the same area.
    FlashConflict { detail: String },
    /// Multiple packages provide the same API.
    ApiConflict {
        api: String,
        providers: Vec<PackageName>,
    },
    /// No package provides a required API.
    UnsatisfiedApi { api: String, requirer: PackageName },
    /// A conditional YAML child name failed to parse as an expression.
    UnparseableConditional { path: String, text: String },
    /// Image plus trailer exceeds the slot's maximum size; downgraded from
    /// an error to a warning when the build's force switch is set.
    ImageOverflow { size: usize, max: usize },
    /// A free-form duplicate-registration warning, e.g. two stage-call
    /// entries at the same (stage, name).
    Duplicate { detail: String },
}

impl Diagnostic {
    pub fn severity(&self, force_overflow: bool) -> Severity {
        match self {
            Diagnostic::Orphan { .. }
            | Diagnostic::UnparseableConditional { .. }
            | Diagnostic::Duplicate { .. } => Severity::Warning,
            Diagnostic::ImageOverflow { .. } if force_overflow => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Orphan { setting, source } => {
                write!(f, "override of undefined setting '{setting}' by '{source}'")
            }
            Diagnostic::Redefine { setting, packages } => write!(
                f,
                "setting '{setting}' redefined by {}",
                join_names(packages)
            ),
            Diagnostic::PriorityViolation {
                setting,
                definer,
                source,
            } => write!(
                f,
                "'{source}' may not override '{setting}' defined by '{definer}' (insufficient priority class)"
            ),
            Diagnostic::Ambiguity { setting, packages } => write!(
                f,
                "ambiguous value for '{setting}' among {}",
                join_names(packages)
            ),
            Diagnostic::RestrictionViolation {
                setting,
                restriction,
            } => write!(f, "restriction '{restriction}' violated for '{setting}'"),
            Diagnostic::FlashConflict { detail } => write!(f, "flash map conflict: {detail}"),
            Diagnostic::ApiConflict { api, providers } => write!(
                f,
                "api '{api}' provided by more than one package: {}",
                join_names(providers)
            ),
            Diagnostic::UnsatisfiedApi { api, requirer } => {
                write!(f, "'{requirer}' requires api '{api}', which nothing provides")
            }
            Diagnostic::UnparseableConditional { path, text } => {
                write!(f, "unparseable conditional key at '{path}': '{text}'")
            }
            Diagnostic::ImageOverflow { size, max } => {
                write!(f, "image size {size} exceeds slot maximum {max}")
            }
            Diagnostic::Duplicate { detail } => write!(f, "duplicate entry: {detail}"),
        }
    }
}

fn join_names(names: &[PackageName]) -> String {
    names
        .iter()
        .map(PackageName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// An accumulated set of diagnostics from a single resolver/syscfg run.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticList {
    items: Vec<Diagnostic>,
}

impl DiagnosticList {
    pub fn new() -> Self {
        DiagnosticList::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.items.push(diag);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    /// True if any diagnostic is error-severity once `force_overflow` has
    /// been applied to any `ImageOverflow` entries.
    pub fn has_errors(&self, force_overflow: bool) -> bool {
        self.items
            .iter()
            .any(|d| d.severity(force_overflow) == Severity::Error)
    }

    pub fn warnings(&self, force_overflow: bool) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(move |d| d.severity(force_overflow) == Severity::Warning)
    }

    pub fn errors(&self, force_overflow: bool) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(move |d| d.severity(force_overflow) == Severity::Error)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn orphan_is_always_a_warning() {
        let d = Diagnostic::Orphan {
            setting: "FOO".into(),
            source: PackageName::new("lib/a"),
        };
        assert_eq!(d.severity(false), Severity::Warning);
        assert_eq!(d.severity(true), Severity::Warning);
    }

    #[test]
    fn overflow_downgrades_only_with_force() {
        let d = Diagnostic::ImageOverflow { size: 9000, max: 8192 };
        assert_eq!(d.severity(false), Severity::Error);
        assert_eq!(d.severity(true), Severity::Warning);
    }

    #[test]
    fn has_errors_reflects_force_flag() {
        let mut list = DiagnosticList::new();
        list.push(Diagnostic::ImageOverflow { size: 9000, max: 8192 });
        assert!(list.has_errors(false));
        assert!(!list.has_errors(true));
    }
}
