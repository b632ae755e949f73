use snafu::Snafu;

/// Parse errors default their `Result` alias to themselves; callers that need
/// to unify parse and eval failures reach for [`Error`] instead.
pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Errors produced while lexing or parsing an expression.
#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum ParseError {
    #[snafu(display("unterminated string literal starting at offset {offset}"))]
    UnterminatedString { offset: usize },

    #[snafu(display("unbalanced parentheses in expression '{text}'"))]
    UnbalancedParens { text: String },

    #[snafu(display("unexpected end of expression, expected {expected}"))]
    UnexpectedEnd { expected: String },

    #[snafu(display("unexpected token '{found}' at offset {offset}, expected {expected}"))]
    UnexpectedToken {
        found: String,
        expected: String,
        offset: usize,
    },

    #[snafu(display("trailing input '{text}' after a complete expression"))]
    TrailingInput { text: String },

    #[snafu(display("empty expression"))]
    Empty,
}

/// Errors produced while evaluating a parsed expression.
#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum EvalError {
    #[snafu(display("'{op}' requires both operands to coerce to an integer (got '{lhs}' and '{rhs}')"))]
    NotAnInteger { op: String, lhs: String, rhs: String },

    #[snafu(display("unknown function '{name}'"))]
    UnknownFunction { name: String },

    #[snafu(display("function '{name}' expects {expected} argument(s), got {found}"))]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[snafu(display("circular reference detected while resolving '{name}'"))]
    CircularReference { name: String },

    #[snafu(display("failed to resolve identifier '{name}': {reason}"))]
    ResolutionFailed { name: String, reason: String },

    #[snafu(display("unsupported operator '{op}' in this evaluation context"))]
    UnsupportedOperator { op: String },
}

pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Unifies parse and evaluation failures for callers that run both stages
/// back to back (`parse` then `eval_bool`/`eval_value`) and want one error
/// type to propagate with `?`.
#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{source}"))]
    Parse { source: ParseError },

    #[snafu(display("{source}"))]
    Eval { source: EvalError },
}

impl From<ParseError> for Error {
    fn from(source: ParseError) -> Self {
        Error::Parse { source }
    }
}

impl From<EvalError> for Error {
    fn from(source: EvalError) -> Self {
        Error::Eval { source }
    }
}
