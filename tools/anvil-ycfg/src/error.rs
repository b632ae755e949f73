use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("cannot merge into '{path}': existing value is not a map or list"))]
    TypeMismatch { path: String },
}

/// A non-fatal issue surfaced while evaluating `get`. Warnings never fail
/// the lookup; the entry they concern is simply dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub path: String,
    pub text: String,
    pub reason: String,
}
