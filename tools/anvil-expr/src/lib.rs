//! Lexer, parser, and evaluators for the small expression language used for
//! conditional YAML keys, setting restrictions, and package dependency
//! conditions.

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;
mod valueexpr;

pub use ast::Expr;
pub use error::{Error, EvalError, EvalResult, ParseError, Result};
pub use eval::{eval_bool, eval_value, SettingsView, ValueResolver};
pub use lexer::{lex, parse_integer, Token, TokenKind};
pub use parser::parse;
pub use valueexpr::{parse_value, ValueExpr};
