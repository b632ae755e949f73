use snafu::ensure;

use crate::error::{BadHeaderSnafu, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::tlv::Tlv;

/// A parsed image: header, raw payload, and decoded trailer TLVs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedImage {
    pub header: Header,
    pub payload: Vec<u8>,
    pub tlvs: Vec<Tlv>,
}

pub fn parse(bytes: &[u8]) -> Result<ParsedImage> {
    let header = Header::from_bytes(bytes)?;
    let payload_start = header.hdr_sz as usize;
    let payload_end = payload_start + header.img_sz as usize;
    let trailer_end = payload_end + header.tlv_sz as usize;
    ensure!(
        bytes.len() >= trailer_end,
        BadHeaderSnafu {
            reason: format!(
                "image truncated: need {trailer_end} bytes, have {}",
                bytes.len()
            ),
        }
    );
    ensure!(
        payload_start >= HEADER_SIZE,
        BadHeaderSnafu {
            reason: format!("header size {payload_start} smaller than fixed header"),
        }
    );
    let payload = bytes[payload_start..payload_end].to_vec();
    let tlvs = Tlv::parse_all(&bytes[payload_end..trailer_end])?;
    Ok(ParsedImage {
        header,
        payload,
        tlvs,
    })
}

#[cfg(test)]
mod test {
    use sha2::{Digest, Sha256};

    use super::*;
    use crate::build::{build, ImageParams};
    use crate::header::{ImageVersion, TLV_TYPE_SHA256};

    #[test]
    fn round_trips_an_unsigned_image() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let params = ImageParams {
            version: ImageVersion::new(1, 5, 0, 0),
            ..Default::default()
        };
        let built = build(&payload, &params).unwrap();
        let parsed = parse(&built.bytes).unwrap();

        assert_eq!(parsed.payload, payload);
        assert_eq!(parsed.header.version, ImageVersion::new(1, 5, 0, 0));

        let sha_tlv = parsed
            .tlvs
            .iter()
            .find(|t| t.kind == TLV_TYPE_SHA256)
            .unwrap();
        let mut hasher = Sha256::new();
        hasher.update(parsed.header.to_bytes());
        hasher.update(&parsed.payload);
        let expected: [u8; 32] = hasher.finalize().into();
        assert_eq!(sha_tlv.value, expected.to_vec());
    }

    #[test]
    fn tlv_sz_equals_sum_of_encoded_tlv_lengths() {
        let payload = vec![0u8; 64];
        let params = ImageParams::default();
        let built = build(&payload, &params).unwrap();
        let parsed = parse(&built.bytes).unwrap();
        let sum: usize = parsed.tlvs.iter().map(Tlv::encoded_len).sum();
        assert_eq!(parsed.header.tlv_sz as usize, sum);
    }
}
