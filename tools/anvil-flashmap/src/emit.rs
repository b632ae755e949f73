use std::fs;
use std::path::Path;

use snafu::ResultExt;

use crate::area::FlashMap;
use crate::error::{Result, WriteSnafu};

/// Write `contents` to `path` only if the file doesn't already hold those
/// exact bytes, so unrelated rebuilds don't touch file mtimes.
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

fn header_text(map: &FlashMap) -> String {
    let mut out = String::new();
    out.push_str("#ifndef H_SYSFLASH_\n#define H_SYSFLASH_\n\n");
    out.push_str("#include <flash_map/flash_map.h>\n\n");
    let areas = map.sorted_by_id();
    out.push_str(&format!(
        "extern const struct flash_area sysflash_map_dflt[{}];\n\n",
        areas.len()
    ));
    for area in &areas {
        out.push_str(&format!(
            "#define FLASH_AREA_{} {}\n",
            area.name.to_uppercase(),
            area.id
        ));
    }
    out.push_str("\n#endif\n");
    out
}

fn source_text(map: &FlashMap) -> String {
    let mut out = String::new();
    out.push_str("#include <sysflash/sysflash.h>\n\n");
    let areas = map.sorted_by_id();
    out.push_str(&format!(
        "const struct flash_area sysflash_map_dflt[{}] = {{\n",
        areas.len()
    ));
    for area in &areas {
        out.push_str(&format!(
            "    {{ .fa_id = {}, .fa_device_id = {}, .fa_off = {}, .fa_size = {} }},\n",
            area.id, area.device, area.offset, area.size
        ));
    }
    out.push_str("};\n");
    out
}

/// Write `sysflash/sysflash.h` and its matching source file, each only if
/// their on-disk bytes would actually change.
pub fn emit(map: &FlashMap, include_dir: &Path, src_dir: &Path) -> Result<()> {
    ensure_written(&include_dir.join("sysflash").join("sysflash.h"), &header_text(map))?;
    ensure_written(&src_dir.join("sysflash.c"), &source_text(map))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::area::FlashArea;

    fn sample_map() -> FlashMap {
        FlashMap::new(vec![
            FlashArea { name: "bootloader".into(), id: 0, device: 0, offset: 0, size: 32768 },
            FlashArea { name: "image_0".into(), id: 1, device: 0, offset: 32768, size: 131072 },
        ])
    }

    #[test]
    fn header_declares_areas_sorted_by_id() {
        let text = header_text(&sample_map());
        assert!(text.contains("#define FLASH_AREA_BOOTLOADER 0"));
        assert!(text.contains("#define FLASH_AREA_IMAGE_0 1"));
        assert!(text.find("BOOTLOADER").unwrap() < text.find("IMAGE_0").unwrap());
    }

    #[test]
    fn emit_is_idempotent_and_skips_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let map = sample_map();
        emit(&map, dir.path(), dir.path()).unwrap();
        let header_path = dir.path().join("sysflash").join("sysflash.h");
        let first_write = fs::metadata(&header_path).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        emit(&map, dir.path(), dir.path()).unwrap();
        let second_write = fs::metadata(&header_path).unwrap().modified().unwrap();
        assert_eq!(first_write, second_write);
    }
}
