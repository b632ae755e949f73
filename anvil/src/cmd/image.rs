use std::path::PathBuf;

use anvil_image::{HexConverter, ImageParams, ImageVersion, IntelHexEncoder};
use anyhow::{Context, Result};
use clap::Parser;
use log::error;
use rsa::pkcs8::DecodePrivateKey as _;
use rsa::RsaPrivateKey;

/// Build a firmware image: header, payload, SHA-256 TLV and, if keys are
/// given, signature TLVs.
#[derive(Debug, Parser)]
pub struct Image {
    /// Path to the raw payload to wrap.
    #[clap(long)]
    payload: PathBuf,

    /// Path the finished image is written to.
    #[clap(long)]
    output: PathBuf,

    #[clap(long = "key-id", default_value_t = 0)]
    key_id: u8,

    /// `major.minor.revision.build`, e.g. `1.5.0.0`.
    #[clap(long)]
    version: String,

    /// PEM-encoded PKCS#8 RSA private key to sign with.
    #[clap(long = "rsa-key")]
    rsa_key: Option<PathBuf>,

    /// PEM-encoded PKCS#8 ECDSA (P-224) private key to sign with.
    #[clap(long = "ec-key")]
    ec_key: Option<PathBuf>,

    /// SHA-256 of a preceding loader image, hex-encoded, for a split
    /// loader/app image.
    #[clap(long = "loader-hash")]
    loader_hash: Option<String>,

    #[clap(long = "slot-max")]
    slot_max: Option<usize>,

    #[clap(long)]
    force_overflow: bool,

    /// Also write an Intel HEX rendering of the built image to this path.
    #[clap(long = "hex-out", requires = "base_address")]
    hex_out: Option<PathBuf>,

    #[clap(long = "base-address")]
    base_address: Option<u32>,
}

fn parse_version(text: &str) -> Result<ImageVersion> {
    let parts: Vec<&str> = text.split('.').collect();
    anyhow::ensure!(
        parts.len() == 4,
        "version '{text}' must be major.minor.revision.build"
    );
    Ok(ImageVersion::new(
        parts[0].parse().context("major version")?,
        parts[1].parse().context("minor version")?,
        parts[2].parse().context("revision")?,
        parts[3].parse().context("build number")?,
    ))
}

fn parse_loader_hash(text: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(text).context("decoding --loader-hash")?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("--loader-hash must be exactly 32 bytes of hex"))
}

impl Image {
    pub async fn run(&self) -> Result<()> {
        let payload = std::fs::read(&self.payload)
            .with_context(|| format!("reading '{}'", self.payload.display()))?;

        let rsa_key = self
            .rsa_key
            .as_ref()
            .map(|path| {
                let pem = std::fs::read_to_string(path)
                    .with_context(|| format!("reading '{}'", path.display()))?;
                RsaPrivateKey::from_pkcs8_pem(&pem)
                    .with_context(|| format!("parsing RSA key '{}'", path.display()))
            })
            .transpose()?;

        let ec_key = self
            .ec_key
            .as_ref()
            .map(|path| {
                let pem = std::fs::read_to_string(path)
                    .with_context(|| format!("reading '{}'", path.display()))?;
                <p224::ecdsa::SigningKey as p224::elliptic_curve::pkcs8::DecodePrivateKey>::from_pkcs8_pem(&pem)
                    .with_context(|| format!("parsing EC key '{}'", path.display()))
            })
            .transpose()?;

        let loader_hash = self
            .loader_hash
            .as_deref()
            .map(parse_loader_hash)
            .transpose()?;

        let params = ImageParams {
            key_id: self.key_id,
            version: parse_version(&self.version)?,
            loader_hash,
            rsa_key,
            ec_key,
            slot_max: self.slot_max,
            force_overflow: self.force_overflow,
        };

        let built = anvil_image::build(&payload, &params).context("building image")?;
        for diag in &built.diagnostics {
            error!("{diag}");
        }

        std::fs::write(&self.output, &built.bytes)
            .with_context(|| format!("writing '{}'", self.output.display()))?;

        if let (Some(hex_out), Some(base_address)) = (&self.hex_out, self.base_address) {
            let encoder = IntelHexEncoder;
            let text = encoder.convert(&built.bytes, base_address);
            std::fs::write(hex_out, text)
                .with_context(|| format!("writing '{}'", hex_out.display()))?;
        }

        Ok(())
    }
}
