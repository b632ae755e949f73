use std::collections::HashMap;

use anvil_syscfg::Syscfg;

/// Flatten a resolved syscfg's current values into a plain string map, the
/// form every `anvil_expr::SettingsView`/stage-resolution consumer expects.
pub(crate) fn settings_map(syscfg: &Syscfg) -> HashMap<String, String> {
    syscfg
        .settings
        .iter()
        .filter_map(|(name, setting)| {
            setting
                .history
                .last()
                .map(|point| (name.clone(), point.value.clone()))
        })
        .collect()
}

/// Print every diagnostic, and return whether any of them is error-severity
/// once `force_overflow` has downgraded `ImageOverflow` entries.
pub(crate) fn report_diagnostics(
    diagnostics: &anvil_model::DiagnosticList,
    force_overflow: bool,
) -> bool {
    for diag in diagnostics.iter() {
        let severity = diag.severity(force_overflow);
        log::log!(
            match severity {
                anvil_model::Severity::Error => log::Level::Error,
                anvil_model::Severity::Warning => log::Level::Warn,
            },
            "{diag}"
        );
    }
    diagnostics.has_errors(force_overflow)
}
