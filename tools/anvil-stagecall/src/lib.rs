//! Collection and emission of stage-ordered call tables (`pkg.init_funcs`
//! / `pkg.down_funcs`): numeric or `$before:`/`$after:`-relative stages
//! resolved to a deterministic order and emitted as a C function-pointer
//! array.

mod emit;
mod error;
mod stage;

pub use emit::{emit, table_text};
pub use error::{Error, Result};
pub use stage::{resolve_stages, CallEntry, ResolvedEntry, StageSpec};

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use anvil_expr::SettingsView;
    use anvil_model::package::PackageName;

    use super::*;

    fn settings() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("MYAPP_LATE_STAGE".to_string(), "50".to_string());
        m
    }

    #[test]
    fn numeric_and_symbolic_stages_interleave_in_order() {
        let entries = vec![
            CallEntry::new("os_init", PackageName::new("lib/os"), "0"),
            CallEntry::new("log_init", PackageName::new("lib/log"), "$after:os_init"),
            CallEntry::new(
                "app_init",
                PackageName::new("app/main"),
                "MYAPP_LATE_STAGE",
            ),
            CallEntry::new(
                "shell_init",
                PackageName::new("lib/shell"),
                "$before:app_init",
            ),
        ];
        let view: &dyn SettingsView = &settings();
        let (resolved, duplicates) = resolve_stages(&entries, view).unwrap();
        assert!(duplicates.is_empty());
        let order: Vec<&str> = resolved.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(order, vec!["os_init", "log_init", "shell_init", "app_init"]);
    }

    #[test]
    fn unresolvable_symbolic_reference_is_an_error() {
        let entries = vec![CallEntry::new(
            "late",
            PackageName::new("lib/a"),
            "$after:missing",
        )];
        let view: &dyn SettingsView = &HashMap::new();
        let err = resolve_stages(&entries, view).unwrap_err();
        assert!(matches!(err, Error::UnknownStageReference { .. }));
    }

    #[test]
    fn duplicate_stage_and_symbol_pair_is_reported() {
        let entries = vec![
            CallEntry::new("init_a", PackageName::new("lib/a"), "5"),
            CallEntry::new("init_a", PackageName::new("lib/b"), "5"),
        ];
        let view: &dyn SettingsView = &HashMap::new();
        let (_, duplicates) = resolve_stages(&entries, view).unwrap();
        assert_eq!(duplicates, vec![("5".to_string(), "init_a".to_string())]);
    }
}
