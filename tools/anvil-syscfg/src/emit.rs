use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anvil_model::package::PackageName;
use snafu::ResultExt;

use crate::error::{Result, WriteSnafu};
use crate::ingest::Syscfg;

/// The standard log severities, weakest first, and the numeric threshold
/// each corresponds to when compared against a log's configured `level`.
const LOG_LEVELS: [(&str, u8); 5] = [
    ("DEBUG", 0),
    ("INFO", 1),
    ("WARN", 2),
    ("ERROR", 3),
    ("CRITICAL", 4),
];

fn level_threshold(level: &str) -> u8 {
    let trimmed = level.trim();
    for (name, value) in LOG_LEVELS {
        if trimmed.eq_ignore_ascii_case(name) {
            return value;
        }
    }
    trimmed.parse().unwrap_or(0)
}

/// Render `syscfg/syscfg.h`: one `#define SYSCFG_VAL_<NAME> (<value>)` per
/// setting, grouped by defining package and sorted by name within each
/// group. Overridden settings get a preceding comment naming their most
/// recent source; empty values emit `#undef` instead.
pub fn header_text(syscfg: &Syscfg) -> String {
    let mut by_package: BTreeMap<&PackageName, Vec<&String>> = BTreeMap::new();
    for name in syscfg.settings.keys() {
        if let Some(definer) = syscfg.defining.get(name) {
            by_package.entry(definer).or_default().push(name);
        }
    }

    let mut out = String::new();
    out.push_str("#ifndef H_SYSCFG_\n#define H_SYSCFG_\n\n");
    out.push_str("#define SYSCFG_VAL(x) SYSCFG_VAL_##x\n\n");

    for (package, mut names) in by_package {
        names.sort();
        out.push_str(&format!("/* {package} */\n"));
        for name in names {
            let setting = &syscfg.settings[name];
            if setting.history.len() > 1 {
                let last = setting.history.last().unwrap();
                let source = last
                    .source
                    .as_ref()
                    .map(PackageName::as_str)
                    .unwrap_or("<injected>");
                out.push_str(&format!("/* Overridden by {source} */\n"));
            }
            let value = setting.current_value();
            if value.is_empty() {
                out.push_str(&format!("#undef SYSCFG_VAL_{name}\n"));
            } else {
                out.push_str(&format!("#define SYSCFG_VAL_{name} ({value})\n"));
            }
        }
        out.push('\n');
    }

    out.push_str("#endif\n");
    out
}

/// Render `logcfg/logcfg.h`: one `MODLOG_<NAME>_<LEVEL>` macro per log per
/// standard severity, sorted by name. A severity at or above the log's
/// configured threshold expands to a real `modlog_printf` call; anything
/// weaker expands to nothing.
pub fn logcfg_text(syscfg: &Syscfg) -> String {
    let mut out = String::new();
    out.push_str("#ifndef H_LOGCFG_\n#define H_LOGCFG_\n\n");

    for (name, log) in &syscfg.logs {
        let threshold = level_threshold(&log.level);
        out.push_str(&format!("/* {name}: module {}, level {} */\n", log.module, log.level));
        for (level_name, level_value) in LOG_LEVELS {
            if level_value >= threshold {
                out.push_str(&format!(
                    "#define MODLOG_{name}_{level_name}(...) modlog_printf({}, LOG_LEVEL_{level_name}, __VA_ARGS__)\n",
                    log.module
                ));
            } else {
                out.push_str(&format!("#define MODLOG_{name}_{level_name}(...)\n"));
            }
        }
        out.push('\n');
    }

    out.push_str("#endif\n");
    out
}

fn ensure_written(path: &Path, contents: &str) -> Result<()> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            return Ok(());
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context(WriteSnafu {
            path: path.to_path_buf(),
        })?;
    }
    fs::write(path, contents).context(WriteSnafu {
        path: path.to_path_buf(),
    })
}

pub fn emit(syscfg: &Syscfg, include_dir: &Path) -> Result<()> {
    ensure_written(&include_dir.join("syscfg").join("syscfg.h"), &header_text(syscfg))?;
    ensure_written(&include_dir.join("logcfg").join("logcfg.h"), &logcfg_text(syscfg))
}

#[cfg(test)]
mod test {
    use super::*;
    use anvil_model::setting::CfgPoint;

    #[test]
    fn groups_by_package_and_sorts_names() {
        let mut syscfg = Syscfg::default();
        let p1 = PackageName::new("lib/p1");
        syscfg.settings.insert(
            "B".to_string(),
            anvil_model::setting::Setting::new(
                "B",
                anvil_model::setting::SettingType::Raw,
                CfgPoint::from_package(p1.clone(), "2"),
            ),
        );
        syscfg.settings.insert(
            "A".to_string(),
            anvil_model::setting::Setting::new(
                "A",
                anvil_model::setting::SettingType::Raw,
                CfgPoint::from_package(p1.clone(), "1"),
            ),
        );
        syscfg.defining.insert("A".to_string(), p1.clone());
        syscfg.defining.insert("B".to_string(), p1.clone());
        let text = header_text(&syscfg);
        assert!(text.find("SYSCFG_VAL_A").unwrap() < text.find("SYSCFG_VAL_B").unwrap());
    }

    #[test]
    fn empty_value_emits_undef() {
        let mut syscfg = Syscfg::default();
        let p1 = PackageName::new("lib/p1");
        syscfg.settings.insert(
            "A".to_string(),
            anvil_model::setting::Setting::new(
                "A",
                anvil_model::setting::SettingType::Raw,
                CfgPoint::from_package(p1.clone(), ""),
            ),
        );
        syscfg.defining.insert("A".to_string(), p1);
        let text = header_text(&syscfg);
        assert!(text.contains("#undef SYSCFG_VAL_A"));
    }

    #[test]
    fn logcfg_gates_macros_by_threshold() {
        let mut syscfg = Syscfg::default();
        syscfg.logs.insert(
            "APP".to_string(),
            crate::ingest::LogConfig {
                module: "APP_LOG_MODULE".to_string(),
                level: "WARN".to_string(),
            },
        );
        let text = logcfg_text(&syscfg);
        assert!(text.contains("#define MODLOG_APP_DEBUG(...)\n"));
        assert!(text.contains("#define MODLOG_APP_INFO(...)\n"));
        assert!(text.contains(
            "#define MODLOG_APP_WARN(...) modlog_printf(APP_LOG_MODULE, LOG_LEVEL_WARN, __VA_ARGS__)"
        ));
        assert!(text.contains(
            "#define MODLOG_APP_CRITICAL(...) modlog_printf(APP_LOG_MODULE, LOG_LEVEL_CRITICAL, __VA_ARGS__)"
        ));
    }

    #[test]
    fn logcfg_defaults_to_numeric_level() {
        let mut syscfg = Syscfg::default();
        syscfg.logs.insert(
            "NET".to_string(),
            crate::ingest::LogConfig {
                module: "NET_LOG_MODULE".to_string(),
                level: "2".to_string(),
            },
        );
        let text = logcfg_text(&syscfg);
        assert!(text.contains("#define MODLOG_NET_DEBUG(...)\n"));
        assert!(text.contains(
            "#define MODLOG_NET_WARN(...) modlog_printf(NET_LOG_MODULE, LOG_LEVEL_WARN, __VA_ARGS__)"
        ));
    }
}
