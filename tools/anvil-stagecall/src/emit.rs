use std::fs;
use std::path::Path;

use snafu::ResultExt;

use crate::error::{Result, WriteSnafu};
use crate::stage::ResolvedEntry;

/// Render the prototype block and the terminated function-pointer array
/// for one table (`sysinit` or `sysdown`).
pub fn table_text(target: &str, table: &str, entries: &[ResolvedEntry]) -> String {
    let mut out = String::new();
    out.push_str("/* Auto-generated code; do not edit. */\n\n");
    for e in entries {
        out.push_str(&format!("void {}(void);\n", e.symbol));
    }
    out.push('\n');
    out.push_str(&format!(
        "void (* const g_{target}_{table}_funcs[])(void) = {{\n"
    ));
    for e in entries {
        out.push_str(&format!("    {}, /* {} */\n", e.symbol, e.source));
    }
    out.push_str("    0,\n");
    out.push_str("};\n");
    out
}

fn ensure_written(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context(WriteSnafu { path: path.to_path_buf() })?;
    }
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            return Ok(());
        }
    }
    fs::write(path, contents).context(WriteSnafu { path: path.to_path_buf() })
}

pub fn emit(
    target: &str,
    src_dir: &Path,
    init_entries: &[ResolvedEntry],
    down_entries: &[ResolvedEntry],
) -> Result<()> {
    ensure_written(
        &src_dir.join(format!("{target}-sysinit.c")),
        &table_text(target, "sysinit", init_entries),
    )?;
    ensure_written(
        &src_dir.join(format!("{target}-sysdown.c")),
        &table_text(target, "sysdown", down_entries),
    )
}

#[cfg(test)]
mod test {
    use anvil_model::package::PackageName;

    use super::*;

    #[test]
    fn emits_prototypes_and_terminated_array() {
        let entries = vec![
            ResolvedEntry {
                symbol: "os_init".to_string(),
                source: PackageName::new("lib/os"),
                sort_key: 0.0,
            },
            ResolvedEntry {
                symbol: "log_init".to_string(),
                source: PackageName::new("lib/log"),
                sort_key: 1.0,
            },
        ];
        let text = table_text("myapp", "sysinit", &entries);
        assert!(text.contains("void os_init(void);"));
        assert!(text.contains("g_myapp_sysinit_funcs[]"));
        let array_tail = text.split("= {\n").nth(1).unwrap();
        assert!(array_tail.trim_end().ends_with("0,\n};"));
    }

    #[test]
    fn emission_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        emit("myapp", dir.path(), &[], &[]).unwrap();
        let path = dir.path().join("myapp-sysinit.c");
        let mtime1 = fs::metadata(&path).unwrap().modified().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        emit("myapp", dir.path(), &[], &[]).unwrap();
        let mtime2 = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(mtime1, mtime2);
    }
}
