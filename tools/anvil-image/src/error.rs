use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("bad image header: {reason}"))]
    BadHeader { reason: String },

    #[snafu(display("bad TLV trailer: {reason}"))]
    BadTlv { reason: String },

    #[snafu(display("{detail}: {source}"))]
    Crypto {
        detail: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("image size {size} exceeds slot maximum {max}"))]
    Overflow { size: usize, max: usize },
}
