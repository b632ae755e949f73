use sha2::{Digest, Sha256};
use snafu::{ensure, OptionExt};

use crate::error::{BadTlvSnafu, KeyNotFoundSnafu, NoHashTlvSnafu, RegionOutOfBoundsSnafu, Result};
use crate::mmr::{
    parse_tlvs, Footer, MmrTlv, FOOTER_SIZE, KEY_TLV_VALUE_LEN, TLV_FLASH_AREA, TLV_HASH, TLV_ISK,
    TLV_KEK,
};

/// A flash-map area as referenced from an MMR, decoded from its TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashAreaRef {
    pub id: u32,
    pub device: u32,
    pub offset: u64,
    pub size: u64,
}

/// A parsed meta region (MMR): its location within the blob, the parsed
/// TLV list (in on-disk order, including the hash TLV), and the footer
/// that identified it.
#[derive(Debug, Clone)]
pub struct Meta {
    meta_start: usize,
    meta_end_offset: usize,
    footer: Footer,
    tlvs: Vec<MmrTlv>,
}

/// Locate and parse an MMR ending at `meta_end_offset` within `blob`.
/// Returns `Ok(None)` when there's no recognizable MMR there (too short,
/// or the footer magic doesn't match) — the region is optional per its
/// own contract. A footer that *does* match but whose TLVs are malformed
/// is a hard error rather than a silent `None`.
pub fn parse(blob: &[u8], meta_end_offset: usize, _fill_byte: u8) -> Result<Option<Meta>> {
    if meta_end_offset < FOOTER_SIZE || meta_end_offset > blob.len() {
        return Ok(None);
    }
    let footer_bytes = &blob[meta_end_offset - FOOTER_SIZE..meta_end_offset];
    let footer = match Footer::from_bytes(footer_bytes) {
        Ok(f) => f,
        Err(_) => return Ok(None),
    };

    let region_len = footer.region_len as usize;
    ensure!(region_len >= FOOTER_SIZE, RegionOutOfBoundsSnafu);
    ensure!(region_len <= meta_end_offset, RegionOutOfBoundsSnafu);
    let meta_start = meta_end_offset - region_len;
    let tlv_bytes = &blob[meta_start..meta_end_offset - FOOTER_SIZE];
    let tlvs = parse_tlvs(tlv_bytes)?;

    ensure!(
        tlvs.iter().filter(|t| t.kind == TLV_HASH).count() == 1,
        BadTlvSnafu {
            reason: "MMR must carry exactly one hash TLV".to_string()
        }
    );

    Ok(Some(Meta {
        meta_start,
        meta_end_offset,
        footer,
        tlvs,
    }))
}

impl Meta {
    pub fn version(&self) -> u8 {
        self.footer.version
    }

    pub fn flash_areas(&self) -> Vec<FlashAreaRef> {
        self.tlvs
            .iter()
            .filter(|t| t.kind == TLV_FLASH_AREA)
            .filter_map(|t| {
                let v = &t.value;
                if v.len() != 24 {
                    return None;
                }
                Some(FlashAreaRef {
                    id: u32::from_le_bytes(v[0..4].try_into().unwrap()),
                    device: u32::from_le_bytes(v[4..8].try_into().unwrap()),
                    offset: u64::from_le_bytes(v[8..16].try_into().unwrap()),
                    size: u64::from_le_bytes(v[16..24].try_into().unwrap()),
                })
            })
            .collect()
    }

    pub fn content_hash(&self) -> Option<[u8; 32]> {
        self.tlvs
            .iter()
            .find(|t| t.kind == TLV_HASH)
            .and_then(|t| t.value.as_slice().try_into().ok())
    }

    /// The region's span within its parent blob, `[start, end)`,
    /// including the footer.
    pub fn span(&self) -> std::ops::Range<usize> {
        self.meta_start..self.meta_end_offset
    }

    fn hash_input(&self) -> Vec<u8> {
        self.tlvs
            .iter()
            .filter(|t| t.kind != TLV_HASH)
            .flat_map(|t| t.to_bytes())
            .collect()
    }

    /// Recompute the content hash over every TLV except the hash TLV
    /// itself, and write the updated MMR back into `blob`. Calling this
    /// twice in a row is a no-op the second time: the digest it computes
    /// depends only on the non-hash TLVs, which `recalc_hash` never
    /// touches.
    pub fn recalc_hash(&mut self, blob: &mut [u8]) -> Result<()> {
        let digest = Sha256::digest(self.hash_input());
        let idx = self
            .tlvs
            .iter()
            .position(|t| t.kind == TLV_HASH)
            .context(NoHashTlvSnafu)?;
        self.tlvs[idx].value = digest.to_vec();
        self.write_into(blob)
    }

    /// Replace a 256-bit key-encrypting-key TLV whose current value's
    /// SHA-256 digest equals `old_key_digest`.
    pub fn replace_kek(
        &mut self,
        blob: &mut [u8],
        old_key_digest: &[u8; 32],
        new_key: &[u8; KEY_TLV_VALUE_LEN],
    ) -> Result<()> {
        self.replace_key(blob, TLV_KEK, "KEK", old_key_digest, new_key)
    }

    /// Replace a 256-bit image-signing-key TLV whose current value's
    /// SHA-256 digest equals `old_key_digest`.
    pub fn replace_isk(
        &mut self,
        blob: &mut [u8],
        old_key_digest: &[u8; 32],
        new_key: &[u8; KEY_TLV_VALUE_LEN],
    ) -> Result<()> {
        self.replace_key(blob, TLV_ISK, "ISK", old_key_digest, new_key)
    }

    fn replace_key(
        &mut self,
        blob: &mut [u8],
        kind: u8,
        label: &'static str,
        old_key_digest: &[u8; 32],
        new_key: &[u8; KEY_TLV_VALUE_LEN],
    ) -> Result<()> {
        let idx = self
            .tlvs
            .iter()
            .position(|t| t.kind == kind && Sha256::digest(&t.value).as_slice() == old_key_digest)
            .context(KeyNotFoundSnafu { kind: label })?;
        self.tlvs[idx].value = new_key.to_vec();
        self.write_into(blob)
    }

    fn write_into(&self, blob: &mut [u8]) -> Result<()> {
        let mut offset = self.meta_start;
        for t in &self.tlvs {
            let bytes = t.to_bytes();
            blob[offset..offset + bytes.len()].copy_from_slice(&bytes);
            offset += bytes.len();
        }
        debug_assert_eq!(offset, self.meta_end_offset - FOOTER_SIZE);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mmr::MMR_MAGIC;

    fn build_mmr(hash: [u8; 32], kek: Option<[u8; 32]>) -> Vec<u8> {
        let mut tlvs = vec![MmrTlv::new(TLV_FLASH_AREA, {
            let mut v = Vec::with_capacity(24);
            v.extend_from_slice(&1u32.to_le_bytes());
            v.extend_from_slice(&0u32.to_le_bytes());
            v.extend_from_slice(&0u64.to_le_bytes());
            v.extend_from_slice(&1024u64.to_le_bytes());
            v
        })];
        if let Some(kek) = kek {
            tlvs.push(MmrTlv::new(TLV_KEK, kek.to_vec()));
        }
        tlvs.push(MmrTlv::new(TLV_HASH, hash.to_vec()));

        let mut region = Vec::new();
        for t in &tlvs {
            region.extend_from_slice(&t.to_bytes());
        }
        let footer = Footer {
            version: 1,
            fill_byte: 0xff,
            region_len: (region.len() + FOOTER_SIZE) as u32,
        };
        region.extend_from_slice(&footer.to_bytes());
        assert_eq!(u32::from_le_bytes(region[region.len() - 16..region.len() - 12].try_into().unwrap()), MMR_MAGIC);
        region
    }

    #[test]
    fn parse_reports_none_for_unmagicked_tail() {
        let blob = vec![0xffu8; 64];
        assert!(parse(&blob, 64, 0xff).unwrap().is_none());
    }

    #[test]
    fn recalc_hash_is_idempotent_and_leaves_other_bytes_alone() {
        let mmr = build_mmr([0u8; 32], None);
        let mut blob = vec![0xaa; 16];
        blob.extend_from_slice(&mmr);
        let end = blob.len();

        let mut meta = parse(&blob, end, 0xff).unwrap().unwrap();
        meta.recalc_hash(&mut blob).unwrap();
        let first_pass = blob.clone();

        let mut meta2 = parse(&blob, end, 0xff).unwrap().unwrap();
        meta2.recalc_hash(&mut blob).unwrap();

        assert_eq!(blob, first_pass);
        assert_eq!(&blob[0..16], &[0xaa; 16][..]);
        assert!(meta2.content_hash().unwrap() != [0u8; 32]);
    }

    #[test]
    fn replace_kek_matches_by_digest_and_rejects_unknown_digest() {
        let kek = [7u8; 32];
        let mmr = build_mmr([0u8; 32], Some(kek));
        let mut blob = mmr.clone();
        let end = blob.len();
        let mut meta = parse(&blob, end, 0xff).unwrap().unwrap();

        let digest: [u8; 32] = Sha256::digest(kek).into();
        let new_key = [9u8; 32];
        meta.replace_kek(&mut blob, &digest, &new_key).unwrap();

        let reparsed = parse(&blob, end, 0xff).unwrap().unwrap();
        let kek_tlv = reparsed
            .tlvs
            .iter()
            .find(|t| t.kind == TLV_KEK)
            .unwrap();
        assert_eq!(kek_tlv.value, new_key.to_vec());

        let mut meta2 = parse(&blob, end, 0xff).unwrap().unwrap();
        assert!(meta2
            .replace_kek(&mut blob, &[0xee; 32], &new_key)
            .is_err());
    }

    #[test]
    fn flash_areas_decode_from_tlv() {
        let mmr = build_mmr([0u8; 32], None);
        let meta = parse(&mmr, mmr.len(), 0xff).unwrap().unwrap();
        let areas = meta.flash_areas();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].id, 1);
        assert_eq!(areas[0].size, 1024);
    }
}
