use std::fmt::Write as _;

/// Converts a finished image to a hex-record text format at a given base
/// address, standing in for an external `objcopy`-like conversion. A real
/// deployment would substitute a toolchain-specific `objcopy` wrapper; the
/// built-in [`IntelHexEncoder`] keeps this usable without one.
pub trait HexConverter {
    fn convert(&self, image: &[u8], base_address: u32) -> String;
}

/// A minimal Intel HEX (I8HEX/I32HEX) encoder: 16 data bytes per record,
/// an extended linear address record whenever the upper 16 bits of the
/// address change, and a trailing EOF record.
pub struct IntelHexEncoder;

const BYTES_PER_RECORD: usize = 16;

fn checksum(bytes: &[u8]) -> u8 {
    let sum: u32 = bytes.iter().map(|b| *b as u32).sum();
    (!(sum as u8)).wrapping_add(1)
}

fn write_record(out: &mut String, byte_count: u8, address: u16, record_type: u8, data: &[u8]) {
    let mut body = Vec::with_capacity(4 + data.len());
    body.push(byte_count);
    body.extend_from_slice(&address.to_be_bytes());
    body.push(record_type);
    body.extend_from_slice(data);
    let cksum = checksum(&body);

    out.push(':');
    for b in &body {
        let _ = write!(out, "{b:02X}");
    }
    let _ = writeln!(out, "{cksum:02X}");
}

impl HexConverter for IntelHexEncoder {
    fn convert(&self, image: &[u8], base_address: u32) -> String {
        let mut out = String::new();
        let mut last_upper: Option<u16> = None;

        for (i, chunk) in image.chunks(BYTES_PER_RECORD).enumerate() {
            let address = base_address.wrapping_add((i * BYTES_PER_RECORD) as u32);
            let upper = (address >> 16) as u16;
            if last_upper != Some(upper) {
                write_record(&mut out, 2, 0, 0x04, &upper.to_be_bytes());
                last_upper = Some(upper);
            }
            write_record(&mut out, chunk.len() as u8, address as u16, 0x00, chunk);
        }

        write_record(&mut out, 0, 0, 0x01, &[]);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_known_record_with_correct_checksum() {
        let encoder = IntelHexEncoder;
        let text = encoder.convert(&[0x00, 0x01, 0x02, 0x03], 0x0000);
        let first_line = text.lines().next().unwrap();
        assert_eq!(first_line, ":0400000000010203F6");
    }

    #[test]
    fn ends_with_eof_record() {
        let encoder = IntelHexEncoder;
        let text = encoder.convert(&[0xaa; 32], 0);
        assert_eq!(text.lines().last().unwrap(), ":00000001FF");
    }

    #[test]
    fn emits_extended_linear_address_record_past_64k() {
        let encoder = IntelHexEncoder;
        let text = encoder.convert(&[0x00; 16], 0x0001_0000);
        assert!(text.lines().next().unwrap().contains("040000"));
    }
}
