use std::collections::BTreeMap;
use std::path::Path;

/// One `<object file, byte size>` pair contributed by a GNU-ld–style
/// linker map's allocated-section lines (`.text`, `.data`, `.bss`, ...).
/// Symbol/section name and address are parsed but not retained; only the
/// size, attributed to the object file that produced it, matters for the
/// manifest's per-package size table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub object: String,
    pub size: u64,
}

fn parse_hex(text: &str) -> Option<u64> {
    u64::from_str_radix(text.strip_prefix("0x")?, 16).ok()
}

/// Parse allocated-section lines of the form
/// `<section> <address> <size> <object>`, tolerating the wrapped form
/// GNU ld emits when the section name alone doesn't fit the column
/// (name on its own line, `address size object` on the next).
pub fn parse_linker_map(text: &str) -> Vec<MapEntry> {
    let mut entries = Vec::new();
    let mut pending_section: Option<String> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || !line.starts_with(' ') {
            pending_section = None;
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();

        let (address, size, object) = match fields.len() {
            4 if fields[0].starts_with('.') => {
                pending_section = None;
                (fields[1], fields[2], fields[3])
            }
            3 if pending_section.is_some() => (fields[0], fields[1], fields[2]),
            1 if fields[0].starts_with('.') => {
                pending_section = Some(fields[0].to_string());
                continue;
            }
            _ => {
                pending_section = None;
                continue;
            }
        };

        if let (Some(_addr), Some(size)) = (parse_hex(address), parse_hex(size)) {
            if size > 0 {
                entries.push(MapEntry {
                    object: object.to_string(),
                    size,
                });
            }
        }
    }
    entries
}

/// Attribute each map entry's size to whichever package's base path is a
/// prefix of the entry's object file path, summing contributions from
/// multiple object files into one package.
pub fn attribute_sizes(
    entries: &[MapEntry],
    packages: &[(String, std::path::PathBuf)],
) -> BTreeMap<String, u64> {
    let mut out: BTreeMap<String, u64> = BTreeMap::new();
    for entry in entries {
        let object_path = Path::new(&entry.object);
        if let Some((name, _)) = packages
            .iter()
            .filter(|(_, base)| object_path.starts_with(base))
            .max_by_key(|(_, base)| base.as_os_str().len())
        {
            *out.entry(name.clone()).or_default() += entry.size;
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_single_line_sections() {
        let map = "\
Linker script and memory map

.text           0x08000000     0x1234 pkg/a/main.o
.data           0x20000000      0x100 pkg/a/main.o
";
        let entries = parse_linker_map(map);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].object, "pkg/a/main.o");
        assert_eq!(entries[0].size, 0x1234);
    }

    #[test]
    fn parses_wrapped_section_name() {
        let map = "\
.text.foo
                0x08001234     0x0040 pkg/b/foo.o
";
        let entries = parse_linker_map(map);
        assert_eq!(entries, vec![MapEntry { object: "pkg/b/foo.o".to_string(), size: 0x40 }]);
    }

    #[test]
    fn attributes_to_longest_matching_package_path() {
        let entries = vec![
            MapEntry { object: "build/pkg/a/sub/main.o".to_string(), size: 10 },
            MapEntry { object: "build/pkg/a/sub/main.o".to_string(), size: 20 },
        ];
        let packages = vec![
            ("lib/a".to_string(), std::path::PathBuf::from("build/pkg/a")),
            ("lib/a/sub".to_string(), std::path::PathBuf::from("build/pkg/a/sub")),
        ];
        let sizes = attribute_sizes(&entries, &packages);
        assert_eq!(sizes.get("lib/a/sub"), Some(&30));
        assert_eq!(sizes.get("lib/a"), None);
    }
}
