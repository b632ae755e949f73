use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("package '{requirer}' depends on '{name}', which does not exist"))]
    UnresolvedDependency { requirer: String, name: String },

    #[snafu(display("seed package '{name}' does not exist"))]
    UnknownSeed { name: String },
}
