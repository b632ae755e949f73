use std::path::PathBuf;

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("running '{program} {args:?}' in {path}: {source}"))]
    CommandFailed {
        program: String,
        args: Vec<String>,
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("'{program} {args:?}' in {path} exited with {status}: {stderr}"))]
    CommandExit {
        program: String,
        args: Vec<String>,
        path: PathBuf,
        status: String,
        stderr: String,
    },

    #[snafu(display("parsing linker map {path}: {reason}"))]
    BadLinkerMap { path: PathBuf, reason: String },

    #[snafu(display("serializing manifest: {source}"))]
    Serialize { source: serde_json::Error },

    #[snafu(display("writing manifest to {path}: {source}"))]
    Write { path: PathBuf, source: std::io::Error },
}
