use crate::error::{BadTlvSnafu, Result};
use snafu::ensure;

/// MMR footer magic, distinguishing it from arbitrary trailing bytes.
pub const MMR_MAGIC: u32 = 0x3bb2_a269;
pub const FOOTER_SIZE: usize = 16;

pub const TLV_HASH: u8 = 1;
pub const TLV_FLASH_AREA: u8 = 2;
pub const TLV_KEK: u8 = 3;
pub const TLV_ISK: u8 = 4;

pub const HASH_TLV_VALUE_LEN: usize = 32;
pub const KEY_TLV_VALUE_LEN: usize = 32;
/// `id: u32, device: u32, offset: u64, size: u64`.
pub const FLASH_AREA_TLV_VALUE_LEN: usize = 24;

/// One MMR TLV record: a 1-byte kind, a 1-byte reserved pad, a 2-byte
/// little-endian value length, then the value itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmrTlv {
    pub kind: u8,
    pub value: Vec<u8>,
}

impl MmrTlv {
    pub fn new(kind: u8, value: Vec<u8>) -> Self {
        MmrTlv { kind, value }
    }

    pub fn encoded_len(&self) -> usize {
        4 + self.value.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.kind);
        out.push(0);
        out.extend_from_slice(&(self.value.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.value);
        out
    }
}

/// Parse a back-to-back run of TLVs spanning the whole of `bytes`.
pub fn parse_tlvs(bytes: &[u8]) -> Result<Vec<MmrTlv>> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        ensure!(
            offset + 4 <= bytes.len(),
            BadTlvSnafu {
                reason: "truncated TLV header".to_string()
            }
        );
        let kind = bytes[offset];
        let len = u16::from_le_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        let value_start = offset + 4;
        let value_end = value_start + len;
        ensure!(
            value_end <= bytes.len(),
            BadTlvSnafu {
                reason: "truncated TLV value".to_string()
            }
        );
        out.push(MmrTlv {
            kind,
            value: bytes[value_start..value_end].to_vec(),
        });
        offset = value_end;
    }
    Ok(out)
}

/// The fixed-size footer sitting at the very end of an MMR, identifying
/// it and giving the total region length (TLVs + footer) so a reader can
/// locate the region's start from its end offset alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub version: u8,
    pub fill_byte: u8,
    pub region_len: u32,
}

impl Footer {
    pub fn to_bytes(self) -> [u8; FOOTER_SIZE] {
        let mut out = [0u8; FOOTER_SIZE];
        out[0..4].copy_from_slice(&MMR_MAGIC.to_le_bytes());
        out[4] = self.version;
        out[5] = self.fill_byte;
        out[6..8].copy_from_slice(&[0u8; 2]);
        out[8..12].copy_from_slice(&self.region_len.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() == FOOTER_SIZE,
            BadTlvSnafu {
                reason: format!("footer must be {FOOTER_SIZE} bytes, got {}", bytes.len())
            }
        );
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        ensure!(
            magic == MMR_MAGIC,
            BadTlvSnafu {
                reason: format!("bad MMR footer magic 0x{magic:08x}")
            }
        );
        Ok(Footer {
            version: bytes[4],
            fill_byte: bytes[5],
            region_len: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tlv_round_trips_through_bytes() {
        let tlvs = vec![
            MmrTlv::new(TLV_HASH, vec![0xab; HASH_TLV_VALUE_LEN]),
            MmrTlv::new(TLV_FLASH_AREA, vec![1, 2, 3, 4]),
        ];
        let mut bytes = Vec::new();
        for t in &tlvs {
            bytes.extend_from_slice(&t.to_bytes());
        }
        let parsed = parse_tlvs(&bytes).unwrap();
        assert_eq!(parsed, tlvs);
    }

    #[test]
    fn footer_round_trips_and_checks_magic() {
        let footer = Footer {
            version: 1,
            fill_byte: 0xff,
            region_len: 128,
        };
        let bytes = footer.to_bytes();
        assert_eq!(Footer::from_bytes(&bytes).unwrap(), footer);

        let mut corrupt = bytes;
        corrupt[0] ^= 0xff;
        assert!(Footer::from_bytes(&corrupt).is_err());
    }
}
