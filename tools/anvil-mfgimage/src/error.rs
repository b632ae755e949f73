use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("area {name} [{offset}, {end}) extends past blob of length {blob_len}"))]
    AreaOutOfBounds {
        name: String,
        offset: u64,
        end: u64,
        blob_len: u64,
    },

    #[snafu(display("MMR footer declares a region larger than is available before its end offset"))]
    RegionOutOfBounds,

    #[snafu(display("malformed MMR TLV: {reason}"))]
    BadTlv { reason: String },

    #[snafu(display("MMR has no hash TLV to recompute"))]
    NoHashTlv,

    #[snafu(display("no {kind} TLV matches the supplied old-key digest"))]
    KeyNotFound { kind: &'static str },
}
