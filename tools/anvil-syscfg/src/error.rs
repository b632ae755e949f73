use std::path::PathBuf;

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("setting '{name}' has an unparseable restriction '{text}': {source}"))]
    BadRestriction {
        name: String,
        text: String,
        source: anvil_expr::ParseError,
    },

    #[snafu(display("setting '{name}' has an unparseable range interval '{text}'"))]
    BadRange { name: String, text: String },

    #[snafu(display("failed to write '{}': {}", path.display(), source))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
