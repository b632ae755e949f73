use std::collections::BTreeMap;

use anvil_flashmap::FlashArea;

use crate::error::{AreaOutOfBoundsSnafu, Result};
use snafu::ensure;

/// Split a full-flash `blob` into one sub-blob per area on `device`,
/// keyed by area name. Areas on other devices are ignored; an area
/// whose extent runs past the end of `blob` is an error rather than a
/// silent truncation.
pub fn split(blob: &[u8], device: u32, areas: &[FlashArea]) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut out = BTreeMap::new();
    for area in areas {
        if area.device != device {
            continue;
        }
        let end = area.end();
        ensure!(
            end <= blob.len() as u64,
            AreaOutOfBoundsSnafu {
                name: area.name.clone(),
                offset: area.offset,
                end,
                blob_len: blob.len() as u64,
            }
        );
        out.insert(
            area.name.clone(),
            blob[area.offset as usize..end as usize].to_vec(),
        );
    }
    Ok(out)
}

/// Reassemble a full-flash blob from per-area sub-blobs. The result is
/// `fill_byte`-initialized up to the highest `offset + size` across
/// `areas`; areas with no entry in `area_blobs` stay filled. Each
/// supplied blob must fit exactly within its area's declared size.
pub fn join(
    area_blobs: &BTreeMap<String, Vec<u8>>,
    fill_byte: u8,
    areas: &[FlashArea],
) -> Result<Vec<u8>> {
    let total = areas.iter().map(|a| a.end()).max().unwrap_or(0);
    let mut blob = vec![fill_byte; total as usize];
    for area in areas {
        if let Some(sub) = area_blobs.get(&area.name) {
            let end = area.offset as usize + sub.len();
            ensure!(
                end as u64 <= area.end(),
                AreaOutOfBoundsSnafu {
                    name: area.name.clone(),
                    offset: area.offset,
                    end: end as u64,
                    blob_len: total,
                }
            );
            blob[area.offset as usize..end].copy_from_slice(sub);
        }
    }
    Ok(blob)
}
