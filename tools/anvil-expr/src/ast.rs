use std::fmt;

/// A parsed expression tree: a binary tree whose nodes carry their own
/// textual operator (or literal) and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Ident(String),
    Int(i64),
    Str(String),
    Unary {
        op: String,
        expr: Box<Expr>,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn is_commutative_op(op: &str) -> bool {
        matches!(op, "&&" | "||" | "^^" | "==" | "!=")
    }

    /// Canonicalize commutative binary nodes by sorting their two children
    /// according to textual representation. `a && b` and `b && a` parse to
    /// distinct trees that are nonetheless equivalent; lexing, parsing, and
    /// re-stringifying round-trips only up to this reordering.
    pub fn sort_nodes(&mut self) {
        match self {
            Expr::Unary { expr, .. } => expr.sort_nodes(),
            Expr::Binary { op, lhs, rhs } => {
                lhs.sort_nodes();
                rhs.sort_nodes();
                if Self::is_commutative_op(op) && lhs.to_string() > rhs.to_string() {
                    std::mem::swap(lhs, rhs);
                }
            }
            Expr::Ident(_) | Expr::Int(_) | Expr::Str(_) => {}
        }
    }

    pub fn sorted(mut self) -> Self {
        self.sort_nodes();
        self
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Str(s) => write!(f, "\"{s}\""),
            Expr::Unary { op, expr } => write!(f, "{op}({expr})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
        }
    }
}
