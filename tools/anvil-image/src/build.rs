use ecdsa::signature::hazmat::PrehashSigner;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};

use crate::error::{OverflowSnafu, Result};
use crate::header::{
    Header, ImageVersion, ECDSA224_TLV_LEN, HEADER_SIZE, IMAGE_F_ECDSA224_SHA256,
    IMAGE_F_NON_BOOTABLE, IMAGE_F_PKCS15_RSA2048_SHA256, IMAGE_F_SHA256, RSA2048_TLV_LEN,
    SHA256_TLV_LEN, TLV_TYPE_ECDSA224, TLV_TYPE_RSA2048, TLV_TYPE_SHA256,
};
use crate::tlv::Tlv;

/// Inputs to one image build. `ec_key` is `p224`'s ECDSA signing
/// key; the digest it signs is the project's own SHA-256 over
/// `loader_hash || header || payload`, not a curve-native re-hash.
#[derive(Default)]
pub struct ImageParams {
    pub key_id: u8,
    pub version: ImageVersion,
    pub loader_hash: Option<[u8; 32]>,
    pub rsa_key: Option<RsaPrivateKey>,
    pub ec_key: Option<p224::ecdsa::SigningKey>,
    pub slot_max: Option<usize>,
    pub force_overflow: bool,
}

/// The assembled image plus the digest that was signed, and any
/// diagnostics the build produced (presently only a downgraded
/// `ImageOverflow`).
pub struct BuiltImage {
    pub bytes: Vec<u8>,
    pub digest: [u8; 32],
    pub diagnostics: Vec<anvil_model::Diagnostic>,
}

/// Run the build algorithm: stream a SHA-256 over an optional loader hash,
/// the header, and the payload; append a SHA256 TLV and, if keys are
/// configured, RSA2048/ECDSA224 signature TLVs; verify the result against
/// `slot_max`.
pub fn build(payload: &[u8], params: &ImageParams) -> Result<BuiltImage> {
    let mut tlv_sz: u16 = (SHA256_TLV_LEN + 4) as u16;
    let mut flags = IMAGE_F_SHA256;
    if params.rsa_key.is_some() {
        flags |= IMAGE_F_PKCS15_RSA2048_SHA256;
        tlv_sz += (RSA2048_TLV_LEN + 4) as u16;
    }
    if params.ec_key.is_some() {
        flags |= IMAGE_F_ECDSA224_SHA256;
        tlv_sz += (ECDSA224_TLV_LEN + 4) as u16;
    }
    if params.loader_hash.is_some() {
        flags |= IMAGE_F_NON_BOOTABLE;
    }

    let header = Header {
        tlv_sz,
        key_id: params.key_id,
        hdr_sz: HEADER_SIZE as u16,
        img_sz: payload.len() as u32,
        flags,
        version: params.version,
    };
    let header_bytes = header.to_bytes();

    let mut hasher = Sha256::new();
    if let Some(loader_hash) = &params.loader_hash {
        hasher.update(loader_hash);
    }
    hasher.update(header_bytes);
    hasher.update(payload);
    let digest: [u8; 32] = hasher.finalize().into();

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len() + tlv_sz as usize);
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(payload);
    out.extend_from_slice(&Tlv::new(TLV_TYPE_SHA256, digest.to_vec()).to_bytes());

    if let Some(key) = &params.rsa_key {
        let scheme = Pkcs1v15Sign::new::<Sha256>();
        let mut sig = key
            .sign(scheme, &digest)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            .context_crypto("RSA PKCS#1 v1.5 signing failed")?;
        sig.resize(RSA2048_TLV_LEN, 0);
        out.extend_from_slice(&Tlv::new(TLV_TYPE_RSA2048, sig).to_bytes());
    }

    if let Some(key) = &params.ec_key {
        let sig: p224::ecdsa::Signature = key
            .sign_prehash(&digest)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            .context_crypto("ECDSA P-224 signing failed")?;
        let der = sig.to_der();
        let mut value: Vec<u8> = AsRef::<[u8]>::as_ref(&der).to_vec();
        value.resize(ECDSA224_TLV_LEN, 0);
        out.extend_from_slice(&Tlv::new(TLV_TYPE_ECDSA224, value).to_bytes());
    }

    let total = out.len();
    let mut diagnostics = Vec::new();
    if let Some(max) = params.slot_max {
        if total > max {
            diagnostics.push(anvil_model::Diagnostic::ImageOverflow { size: total, max });
            if !params.force_overflow {
                return OverflowSnafu { size: total, max }.fail();
            }
        }
    }

    Ok(BuiltImage {
        bytes: out,
        digest,
        diagnostics,
    })
}

trait CryptoContext<T> {
    fn context_crypto(self, detail: &str) -> Result<T>;
}

impl<T> CryptoContext<T> for std::result::Result<T, Box<dyn std::error::Error + Send + Sync>> {
    fn context_crypto(self, detail: &str) -> Result<T> {
        self.map_err(|source| crate::error::Error::Crypto {
            detail: detail.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unsigned_256_byte_payload_matches_expected_length() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let params = ImageParams {
            version: ImageVersion::new(1, 5, 0, 0),
            ..Default::default()
        };
        let built = build(&payload, &params).unwrap();
        assert_eq!(built.bytes.len(), HEADER_SIZE + 256 + 4 + SHA256_TLV_LEN);
    }

    #[test]
    fn overflow_without_force_is_an_error() {
        let payload = vec![0u8; 9000 - HEADER_SIZE - 4 - SHA256_TLV_LEN];
        let params = ImageParams {
            slot_max: Some(8192),
            ..Default::default()
        };
        let err = build(&payload, &params).unwrap_err();
        assert!(matches!(err, crate::error::Error::Overflow { .. }));
    }

    #[test]
    fn overflow_with_force_is_a_warning() {
        let payload = vec![0u8; 9000 - HEADER_SIZE - 4 - SHA256_TLV_LEN];
        let params = ImageParams {
            slot_max: Some(8192),
            force_overflow: true,
            ..Default::default()
        };
        let built = build(&payload, &params).unwrap();
        assert_eq!(built.diagnostics.len(), 1);
    }
}
