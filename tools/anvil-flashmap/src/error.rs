use std::path::PathBuf;

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("flash area '{name}' has no 'device' field"))]
    MissingDevice { name: String },

    #[snafu(display("flash area '{name}' has no 'offset' field"))]
    MissingOffset { name: String },

    #[snafu(display("flash area '{name}' has no 'size' field"))]
    MissingSize { name: String },

    #[snafu(display("flash area '{name}' is not a system area and has no 'user_id'"))]
    MissingUserId { name: String },

    #[snafu(display("flash area '{name}' has an unparseable numeric field '{text}'"))]
    BadNumber { name: String, text: String },

    #[snafu(display("failed to write '{}': {}", path.display(), source))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
