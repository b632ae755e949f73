use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("bad stage expression '{text}' for '{symbol}': {source}"))]
    BadStage {
        symbol: String,
        text: String,
        source: anvil_expr::Error,
    },

    #[snafu(display("stage value '{text}' for '{symbol}' is not an integer"))]
    NotAnInteger { symbol: String, text: String },

    #[snafu(display("'{symbol}' is staged {relation} '{target}', which is not in this table"))]
    UnknownStageReference {
        symbol: String,
        target: String,
        relation: &'static str,
    },

    #[snafu(display("write {path}: {source}"))]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
