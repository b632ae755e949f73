use std::collections::BTreeMap;

use anvil_expr::SettingsView;
use anvil_model::setting::Setting;

/// A read-only view of the settings table under construction, handed to
/// expression evaluation during ingestion.
pub struct SettingsSnapshot<'a>(pub &'a BTreeMap<String, Setting>);

impl SettingsView for SettingsSnapshot<'_> {
    fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(Setting::current_value)
    }
}
