use std::collections::BTreeMap;

use anvil_model::diagnostic::Diagnostic;
use serde_yaml::Value;

use crate::error::{BadNumberSnafu, Error, MissingDeviceSnafu, MissingOffsetSnafu, MissingSizeSnafu, MissingUserIdSnafu, Result};
use snafu::OptionExt;

fn parse_integer_field(name: &str, text: &str) -> Result<i64> {
    anvil_expr::parse_integer(text).context(BadNumberSnafu {
        name: name.to_string(),
        text: text.to_string(),
    })
}

/// Fixed ids for the predefined system area names.
fn system_id(name: &str) -> Option<u32> {
    match name {
        "bootloader" => Some(0),
        "image_0" => Some(1),
        "image_1" => Some(2),
        "image_scratch" => Some(3),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashArea {
    pub name: String,
    pub id: u32,
    pub device: u32,
    pub offset: u64,
    pub size: u64,
}

impl FlashArea {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    fn overlaps(&self, other: &FlashArea) -> bool {
        self.device == other.device && self.offset < other.end() && other.offset < self.end()
    }
}

/// Parse a numeric field using the non-octal rule (a leading `0` never
/// triggers octal parsing), with a `kb` suffix optionally scaling the
/// size by 1024.
fn parse_number(name: &str, text: &str) -> Result<u64> {
    let trimmed = text.trim();
    let (digits, scale) = if let Some(prefix) = trimmed.strip_suffix("kb").or_else(|| trimmed.strip_suffix("KB")) {
        (prefix.trim(), 1024u64)
    } else {
        (trimmed, 1u64)
    };
    let value = parse_integer_field(name, digits)?;
    Ok(value as u64 * scale)
}

fn value_as_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse every area under the `areas.<name>` sub-tree of a flash map YAML
/// document.
pub fn parse_areas(areas_yaml: &Value) -> Result<Vec<FlashArea>> {
    let mapping = match areas_yaml.as_mapping() {
        Some(m) => m,
        None => return Ok(Vec::new()),
    };

    let mut out = Vec::new();
    for (key, entry) in mapping {
        let name = key.as_str().unwrap_or_default().to_string();
        let entry = entry.as_mapping();

        let field = |field_name: &str| -> Option<Value> {
            entry.and_then(|m| m.get(Value::from(field_name)).cloned())
        };

        let device_text = field("device")
            .as_ref()
            .and_then(value_as_str)
            .context(MissingDeviceSnafu { name: name.clone() })?;
        let device = parse_number(&name, &device_text)? as u32;

        let offset_text = field("offset")
            .as_ref()
            .and_then(value_as_str)
            .context(MissingOffsetSnafu { name: name.clone() })?;
        let offset = parse_number(&name, &offset_text)?;

        let size_text = field("size")
            .as_ref()
            .and_then(value_as_str)
            .context(MissingSizeSnafu { name: name.clone() })?;
        let size = parse_number(&name, &size_text)?;

        let id = match system_id(&name) {
            Some(id) => id,
            None => {
                let user_id_text = field("user_id")
                    .as_ref()
                    .and_then(value_as_str)
                    .context(MissingUserIdSnafu { name: name.clone() })?;
                parse_number(&name, &user_id_text)? as u32 + 16
            }
        };

        out.push(FlashArea {
            name,
            id,
            device,
            offset,
            size,
        });
    }
    Ok(out)
}

/// The parsed flash map plus the two error classes detected over it.
#[derive(Debug, Clone, Default)]
pub struct FlashMap {
    pub areas: Vec<FlashArea>,
}

impl FlashMap {
    pub fn new(areas: Vec<FlashArea>) -> Self {
        FlashMap { areas }
    }

    /// Areas sharing a device whose byte ranges intersect.
    pub fn overlaps(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for i in 0..self.areas.len() {
            for j in (i + 1)..self.areas.len() {
                if self.areas[i].overlaps(&self.areas[j]) {
                    out.push((self.areas[i].name.clone(), self.areas[j].name.clone()));
                }
            }
        }
        out
    }

    /// Distinct areas sharing a numeric id.
    pub fn id_conflicts(&self) -> Vec<(String, String)> {
        let mut by_id: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
        for area in &self.areas {
            by_id.entry(area.id).or_default().push(&area.name);
        }
        let mut out = Vec::new();
        for names in by_id.values() {
            if names.len() > 1 {
                for i in 0..names.len() {
                    for j in (i + 1)..names.len() {
                        out.push((names[i].to_string(), names[j].to_string()));
                    }
                }
            }
        }
        out
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for (a, b) in self.overlaps() {
            diags.push(Diagnostic::FlashConflict {
                detail: format!("areas '{a}' and '{b}' overlap"),
            });
        }
        for (a, b) in self.id_conflicts() {
            diags.push(Diagnostic::FlashConflict {
                detail: format!("areas '{a}' and '{b}' share the same id"),
            });
        }
        diags
    }

    pub fn by_name(&self, name: &str) -> Option<&FlashArea> {
        self.areas.iter().find(|a| a.name == name)
    }

    /// Areas sorted by id, the order both emitted artifacts use.
    pub fn sorted_by_id(&self) -> Vec<&FlashArea> {
        let mut areas: Vec<&FlashArea> = self.areas.iter().collect();
        areas.sort_by_key(|a| a.id);
        areas
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn yaml(src: &str) -> Value {
        serde_yaml::from_str(src).unwrap()
    }

    #[test]
    fn parses_system_areas_with_fixed_ids() {
        let areas = parse_areas(&yaml(
            "bootloader: {device: 0, offset: 0, size: 32kb}\nimage_0: {device: 0, offset: 32kb, size: 128kb}\n",
        ))
        .unwrap();
        let boot = areas.iter().find(|a| a.name == "bootloader").unwrap();
        assert_eq!(boot.id, 0);
        assert_eq!(boot.size, 32 * 1024);
        let img0 = areas.iter().find(|a| a.name == "image_0").unwrap();
        assert_eq!(img0.id, 1);
        assert_eq!(img0.offset, 32 * 1024);
    }

    #[test]
    fn user_area_requires_user_id() {
        let err = parse_areas(&yaml("scratch2: {device: 0, offset: 0, size: 4kb}\n")).unwrap_err();
        assert!(matches!(err, Error::MissingUserId { .. }));
    }

    #[test]
    fn user_area_id_offset_by_sixteen() {
        let areas = parse_areas(&yaml(
            "custom: {device: 0, offset: 0, size: 4kb, user_id: 2}\n",
        ))
        .unwrap();
        assert_eq!(areas[0].id, 18);
    }

    #[test]
    fn detects_overlap() {
        let areas = vec![
            FlashArea { name: "X".into(), id: 16, device: 0, offset: 0, size: 1024 },
            FlashArea { name: "Y".into(), id: 17, device: 0, offset: 512, size: 1024 },
        ];
        let map = FlashMap::new(areas);
        let overlaps = map.overlaps();
        assert_eq!(overlaps, vec![("X".to_string(), "Y".to_string())]);
    }

    #[test]
    fn detects_id_conflict() {
        let areas = vec![
            FlashArea { name: "X".into(), id: 16, device: 0, offset: 0, size: 1024 },
            FlashArea { name: "Y".into(), id: 16, device: 0, offset: 4096, size: 1024 },
        ];
        let map = FlashMap::new(areas);
        assert_eq!(map.id_conflicts(), vec![("X".to_string(), "Y".to_string())]);
    }

    #[test]
    fn non_octal_rule_applies_to_offsets() {
        let areas = parse_areas(&yaml(
            "a: {device: 0, offset: \"010\", size: \"010\", user_id: 0}\n",
        ))
        .unwrap();
        assert_eq!(areas[0].offset, 10);
        assert_eq!(areas[0].size, 10);
    }
}
