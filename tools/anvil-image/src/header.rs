use crate::error::{BadHeaderSnafu, Result};

pub const MAGIC: u32 = 0x96f3_b83c;
pub const HEADER_SIZE: usize = 32;

pub const IMAGE_F_SHA256: u32 = 0x0000_0002;
pub const IMAGE_F_PKCS15_RSA2048_SHA256: u32 = 0x0000_0004;
pub const IMAGE_F_ECDSA224_SHA256: u32 = 0x0000_0008;
pub const IMAGE_F_NON_BOOTABLE: u32 = 0x0000_0010;

pub const TLV_TYPE_SHA256: u8 = 1;
pub const TLV_TYPE_RSA2048: u8 = 2;
pub const TLV_TYPE_ECDSA224: u8 = 3;

pub const SHA256_TLV_LEN: usize = 32;
pub const RSA2048_TLV_LEN: usize = 256;
pub const ECDSA224_TLV_LEN: usize = 68;

/// `{major, minor}.{revision}.{build_num}` as the four version fields
/// packed into the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageVersion {
    pub major: u8,
    pub minor: u8,
    pub revision: u16,
    pub build_num: u32,
}

impl ImageVersion {
    pub fn new(major: u8, minor: u8, revision: u16, build_num: u32) -> Self {
        ImageVersion {
            major,
            minor,
            revision,
            build_num,
        }
    }
}

/// The fixed 32-byte image header. `pad` fields are never read but
/// are always written as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub tlv_sz: u16,
    pub key_id: u8,
    pub hdr_sz: u16,
    pub img_sz: u32,
    pub flags: u32,
    pub version: ImageVersion,
}

impl Header {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut b = [0u8; HEADER_SIZE];
        b[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        b[4..6].copy_from_slice(&self.tlv_sz.to_le_bytes());
        b[6] = self.key_id;
        b[8..10].copy_from_slice(&self.hdr_sz.to_le_bytes());
        b[12..16].copy_from_slice(&self.img_sz.to_le_bytes());
        b[16..20].copy_from_slice(&self.flags.to_le_bytes());
        b[20] = self.version.major;
        b[21] = self.version.minor;
        b[22..24].copy_from_slice(&self.version.revision.to_le_bytes());
        b[24..28].copy_from_slice(&self.version.build_num.to_le_bytes());
        b
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self> {
        if b.len() < HEADER_SIZE {
            return BadHeaderSnafu {
                reason: format!("header truncated: {} bytes", b.len()),
            }
            .fail();
        }
        let magic = u32::from_le_bytes(b[0..4].try_into().unwrap());
        if magic != MAGIC {
            return BadHeaderSnafu {
                reason: format!("bad magic 0x{magic:08x}"),
            }
            .fail();
        }
        Ok(Header {
            tlv_sz: u16::from_le_bytes(b[4..6].try_into().unwrap()),
            key_id: b[6],
            hdr_sz: u16::from_le_bytes(b[8..10].try_into().unwrap()),
            img_sz: u32::from_le_bytes(b[12..16].try_into().unwrap()),
            flags: u32::from_le_bytes(b[16..20].try_into().unwrap()),
            version: ImageVersion {
                major: b[20],
                minor: b[21],
                revision: u16::from_le_bytes(b[22..24].try_into().unwrap()),
                build_num: u32::from_le_bytes(b[24..28].try_into().unwrap()),
            },
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let h = Header {
            tlv_sz: 36,
            key_id: 0,
            hdr_sz: HEADER_SIZE as u16,
            img_sz: 256,
            flags: IMAGE_F_SHA256,
            version: ImageVersion::new(1, 5, 0, 0),
        };
        let bytes = h.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(Header::from_bytes(&bytes).unwrap(), h);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = 0xff;
        assert!(Header::from_bytes(&bytes).is_err());
    }
}
