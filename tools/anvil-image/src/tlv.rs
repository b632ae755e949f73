use crate::error::{BadTlvSnafu, Result};

/// One `{type, pad, len, value}` trailer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub kind: u8,
    pub value: Vec<u8>,
}

impl Tlv {
    pub fn new(kind: u8, value: Vec<u8>) -> Self {
        Tlv { kind, value }
    }

    /// `4 + len(value)`, the quantity the header's `tlv_sz` sums over.
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

    /// Parse a contiguous run of TLVs filling exactly `bytes`.
    pub fn parse_all(bytes: &[u8]) -> Result<Vec<Tlv>> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            if bytes.len() - offset < 4 {
                return BadTlvSnafu {
                    reason: "truncated TLV header".to_string(),
                }
                .fail();
            }
            let kind = bytes[offset];
            let len = u16::from_le_bytes(bytes[offset + 2..offset + 4].try_into().unwrap()) as usize;
            let value_start = offset + 4;
            let value_end = value_start + len;
            if value_end > bytes.len() {
                return BadTlvSnafu {
                    reason: format!("TLV type {kind} claims {len} bytes past end of trailer"),
                }
                .fail();
            }
            out.push(Tlv::new(kind, bytes[value_start..value_end].to_vec()));
            offset = value_end;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_multiple_tlvs() {
        let tlvs = vec![
            Tlv::new(1, vec![0xaa; 32]),
            Tlv::new(2, vec![0xbb; 256]),
        ];
        let mut bytes = Vec::new();
        for t in &tlvs {
            bytes.extend_from_slice(&t.to_bytes());
        }
        assert_eq!(Tlv::parse_all(&bytes).unwrap(), tlvs);
    }

    #[test]
    fn rejects_truncated_value() {
        let mut bytes = Tlv::new(1, vec![0; 32]).to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(Tlv::parse_all(&bytes).is_err());
    }
}
