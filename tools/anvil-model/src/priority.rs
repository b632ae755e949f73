use crate::package::PackageType;

/// Priority class, highest first: target > app (or unittest if no app) >
/// bsp > everything else. Equal-class override conflicts with differing
/// values are ambiguity errors; an override is legal only if its class is
/// strictly higher than the defining package's, or it is a self-override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityClass {
    Other,
    Bsp,
    AppOrUnittest,
    Target,
}

impl PriorityClass {
    /// `has_app` distinguishes an app-having build (where unittest drops
    /// below app) from a unittest-only build, where unittest takes app's
    /// rank. Both app and unittest share [`PriorityClass::AppOrUnittest`]
    /// here; the tie only matters between the two of them, and callers that
    /// care can special-case `PackageType::App` vs `PackageType::Unittest`
    /// directly.
    pub fn of(kind: PackageType, has_app: bool) -> Self {
        match kind {
            PackageType::Target => PriorityClass::Target,
            PackageType::App => PriorityClass::AppOrUnittest,
            PackageType::Unittest if !has_app => PriorityClass::AppOrUnittest,
            PackageType::Unittest => PriorityClass::Other,
            PackageType::Bsp => PriorityClass::Bsp,
            PackageType::Lib | PackageType::Sdk | PackageType::Compiler => PriorityClass::Other,
        }
    }
}

/// Definitions and overrides are applied in this package-type order; it is
/// distinct from [`PriorityClass`] (which governs override legality, not
/// ingestion order).
pub const INGESTION_ORDER: [PackageType; 5] = [
    PackageType::Lib,
    PackageType::Bsp,
    PackageType::Unittest,
    PackageType::App,
    PackageType::Target,
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn target_outranks_everything() {
        assert!(PriorityClass::Target > PriorityClass::AppOrUnittest);
        assert!(PriorityClass::AppOrUnittest > PriorityClass::Bsp);
        assert!(PriorityClass::Bsp > PriorityClass::Other);
    }

    #[test]
    fn unittest_only_build_ranks_like_app() {
        assert_eq!(
            PriorityClass::of(PackageType::Unittest, false),
            PriorityClass::AppOrUnittest
        );
        assert_eq!(
            PriorityClass::of(PackageType::Unittest, true),
            PriorityClass::Other
        );
    }
}
