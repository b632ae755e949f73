//! Firmware image assembly: header + payload + TLV trailer, streaming
//! SHA-256 with optional RSA/ECDSA signing, and conversion to Intel HEX
//! text.

mod build;
mod error;
mod header;
mod hex;
mod parse;
mod tlv;

pub use build::{build, BuiltImage, ImageParams};
pub use error::{Error, Result};
pub use header::{
    Header, ImageVersion, ECDSA224_TLV_LEN, HEADER_SIZE, IMAGE_F_ECDSA224_SHA256,
    IMAGE_F_NON_BOOTABLE, IMAGE_F_PKCS15_RSA2048_SHA256, IMAGE_F_SHA256, MAGIC, RSA2048_TLV_LEN,
    SHA256_TLV_LEN, TLV_TYPE_ECDSA224, TLV_TYPE_RSA2048, TLV_TYPE_SHA256,
};
pub use hex::{HexConverter, IntelHexEncoder};
pub use parse::{parse, ParsedImage};
pub use tlv::Tlv;
