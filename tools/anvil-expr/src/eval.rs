use crate::ast::Expr;
use crate::error::{EvalError, EvalResult};
use crate::valueexpr::ValueExpr;

/// Read-only access to the current setting values an expression's
/// identifiers resolve against. An identifier with no entry resolves to the
/// empty string.
pub trait SettingsView {
    fn get(&self, name: &str) -> Option<&str>;
}

impl<S: ::std::hash::BuildHasher> SettingsView for ::std::collections::HashMap<String, String, S> {
    fn get(&self, name: &str) -> Option<&str> {
        ::std::collections::HashMap::get(self, name).map(String::as_str)
    }
}

/// The kind of a leaf operand in an equality comparison, or `Computed` for a
/// sub-expression that had to be evaluated down to a boolean first.
enum Operand<'a> {
    Ident(&'a str),
    Int(i64),
    Str(&'a str),
    Computed(bool),
}

fn classify<'a>(expr: &'a Expr, view: &dyn SettingsView) -> EvalResult<Operand<'a>> {
    Ok(match expr {
        Expr::Ident(name) => Operand::Ident(name),
        Expr::Int(n) => Operand::Int(*n),
        Expr::Str(s) => Operand::Str(s),
        other => Operand::Computed(eval_bool(other, view)?),
    })
}

fn text_of(name: &str, view: &dyn SettingsView) -> String {
    view.get(name).unwrap_or("").to_string()
}

/// Empty string, or text that parses as the integer zero, coerces to
/// `false`. Everything else coerces to `true`.
fn coerce_bool(text: &str) -> bool {
    if text.is_empty() {
        false
    } else if let Some(n) = crate::lexer::parse_integer(text) {
        n != 0
    } else {
        true
    }
}

fn bool_value(op: &Operand<'_>, view: &dyn SettingsView) -> bool {
    match op {
        Operand::Ident(name) => coerce_bool(&text_of(name, view)),
        Operand::Int(n) => *n != 0,
        Operand::Str(s) => coerce_bool(s),
        Operand::Computed(b) => *b,
    }
}

fn int_value(op: &Operand<'_>, view: &dyn SettingsView, op_name: &str) -> EvalResult<i64> {
    let (text, other) = match op {
        Operand::Ident(name) => (text_of(name, view), name.to_string()),
        Operand::Int(n) => return Ok(*n),
        Operand::Str(s) => (s.to_string(), s.to_string()),
        Operand::Computed(b) => return Ok(if *b { 1 } else { 0 }),
    };
    crate::lexer::parse_integer(&text).ok_or_else(|| EvalError::NotAnInteger {
        op: op_name.to_string(),
        lhs: other,
        rhs: text,
    })
}

/// Type-aware equality: the *syntactic kind* of each operand (not
/// its runtime type) picks the comparison rule. Identifier-vs-identifier and
/// identifier-vs-string compare textually; identifier-vs-number parses the
/// identifier's value; number-vs-number compares numerically;
/// number-vs-string compares textually. Anything else (a parenthesized
/// sub-expression on either side) falls back to boolean coercion of both
/// sides.
fn eval_eq(lhs: &Expr, rhs: &Expr, view: &dyn SettingsView) -> EvalResult<bool> {
    let l = classify(lhs, view)?;
    let r = classify(rhs, view)?;
    Ok(match (&l, &r) {
        (Operand::Ident(a), Operand::Ident(b)) => text_of(a, view) == text_of(b, view),
        (Operand::Ident(a), Operand::Int(n)) | (Operand::Int(n), Operand::Ident(a)) => {
            int_value(&Operand::Ident(a), view, "==")? == *n
        }
        (Operand::Ident(a), Operand::Str(s)) | (Operand::Str(s), Operand::Ident(a)) => {
            text_of(a, view) == *s
        }
        (Operand::Int(a), Operand::Int(b)) => a == b,
        (Operand::Int(a), Operand::Str(s)) | (Operand::Str(s), Operand::Int(a)) => {
            a.to_string() == *s
        }
        (Operand::Str(a), Operand::Str(b)) => a == b,
        _ => bool_value(&l, view) == bool_value(&r, view),
    })
}

/// Evaluate a boolean expression against `view`. Relational and equality
/// operators apply the coercion rules above; `&&`/`||`/`^^` are ordinary
/// short-circuit-free boolean connectives (both sides are always evaluated,
/// matching the pure/side-effect-free nature of identifier resolution).
pub fn eval_bool(expr: &Expr, view: &dyn SettingsView) -> EvalResult<bool> {
    match expr {
        Expr::Ident(name) => Ok(coerce_bool(&text_of(name, view))),
        Expr::Int(n) => Ok(*n != 0),
        Expr::Str(s) => Ok(coerce_bool(s)),
        Expr::Unary { op, expr } if op == "!" => Ok(!eval_bool(expr, view)?),
        Expr::Unary { op, expr } if op == "-" => {
            let v = int_value(&classify(expr, view)?, view, "-")?;
            Ok(-v != 0)
        }
        Expr::Unary { op, .. } => Err(EvalError::UnsupportedOperator { op: op.clone() }),
        Expr::Binary { op, lhs, rhs } => match op.as_str() {
            "&&" => Ok(eval_bool(lhs, view)? && eval_bool(rhs, view)?),
            "||" => Ok(eval_bool(lhs, view)? || eval_bool(rhs, view)?),
            "^^" => Ok(eval_bool(lhs, view)? ^ eval_bool(rhs, view)?),
            "==" => eval_eq(lhs, rhs, view),
            "!=" => eval_eq(lhs, rhs, view).map(|b| !b),
            "<" | "<=" | ">" | ">=" => {
                let a = int_value(&classify(lhs, view)?, view, op)?;
                let b = int_value(&classify(rhs, view)?, view, op)?;
                Ok(match op.as_str() {
                    "<" => a < b,
                    "<=" => a <= b,
                    ">" => a > b,
                    ">=" => a >= b,
                    _ => unreachable!(),
                })
            }
            other => Err(EvalError::UnsupportedOperator {
                op: other.to_string(),
            }),
        },
    }
}

/// Resolves a named setting to its textual value, for use by [`eval_value`]
/// when a value expression references another setting. Implementations are
/// expected to detect cycles (a setting whose own value expression, directly
/// or transitively, depends on itself) and return
/// [`EvalError::CircularReference`]; this crate has no notion of the
/// {none,running,success,failed} state machine that requires — that lives
/// with whoever owns the full setting table.
pub trait ValueResolver {
    fn resolve(&mut self, name: &str) -> EvalResult<String>;
}

fn eval_int(expr: &ValueExpr, resolver: &mut dyn ValueResolver) -> EvalResult<i64> {
    let text = eval_value(expr, resolver)?;
    crate::lexer::parse_integer(&text).ok_or_else(|| EvalError::NotAnInteger {
        op: "function argument".into(),
        lhs: text.clone(),
        rhs: text,
    })
}

fn eval_bool_value(expr: &ValueExpr, resolver: &mut dyn ValueResolver) -> EvalResult<bool> {
    let text = eval_value(expr, resolver)?;
    Ok(coerce_bool(&text))
}

fn require_arity(name: &str, args: &[ValueExpr], expected: usize) -> EvalResult<()> {
    if args.len() != expected {
        return Err(EvalError::WrongArity {
            name: name.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

/// Evaluate a value expression (identifier, literal, or function call) to
/// its textual result. Functions are pure and return textual values like
/// every setting does; booleans are represented as `"1"`/`"0"`.
pub fn eval_value(expr: &ValueExpr, resolver: &mut dyn ValueResolver) -> EvalResult<String> {
    match expr {
        ValueExpr::Ident(name) => resolver.resolve(name),
        ValueExpr::Int(n) => Ok(n.to_string()),
        ValueExpr::Str(s) => Ok(s.clone()),
        ValueExpr::Call { name, args } => match name.as_str() {
            "negate" => {
                require_arity(name, args, 1)?;
                Ok((-eval_int(&args[0], resolver)?).to_string())
            }
            "min" => {
                require_arity(name, args, 2)?;
                let a = eval_int(&args[0], resolver)?;
                let b = eval_int(&args[1], resolver)?;
                Ok(a.min(b).to_string())
            }
            "max" => {
                require_arity(name, args, 2)?;
                let a = eval_int(&args[0], resolver)?;
                let b = eval_int(&args[1], resolver)?;
                Ok(a.max(b).to_string())
            }
            "clamp" => {
                require_arity(name, args, 3)?;
                let v = eval_int(&args[0], resolver)?;
                let lo = eval_int(&args[1], resolver)?;
                let hi = eval_int(&args[2], resolver)?;
                Ok(v.clamp(lo, hi).to_string())
            }
            "ite" => {
                require_arity(name, args, 3)?;
                if eval_bool_value(&args[0], resolver)? {
                    eval_value(&args[1], resolver)
                } else {
                    eval_value(&args[2], resolver)
                }
            }
            "in_range" => {
                require_arity(name, args, 3)?;
                let v = eval_int(&args[0], resolver)?;
                let lo = eval_int(&args[1], resolver)?;
                let hi = eval_int(&args[2], resolver)?;
                Ok(if v >= lo && v <= hi { "1" } else { "0" }.to_string())
            }
            "in_set" => {
                if args.is_empty() {
                    return Err(EvalError::WrongArity {
                        name: name.to_string(),
                        expected: 2,
                        found: 0,
                    });
                }
                let v = eval_value(&args[0], resolver)?;
                for candidate in &args[1..] {
                    if eval_value(candidate, resolver)? == v {
                        return Ok("1".to_string());
                    }
                }
                Ok("0".to_string())
            }
            other => Err(EvalError::UnknownFunction {
                name: other.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse;
    use crate::valueexpr::parse_value;
    use std::collections::HashMap;

    fn view(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn ident_equals_ident_is_textual() {
        let v = view(&[("A", "FOO"), ("B", "FOO")]);
        assert!(eval_bool(&parse("A == B").unwrap(), &v).unwrap());
    }

    #[test]
    fn ident_equals_number_parses_value() {
        let v = view(&[("A", "42")]);
        assert!(eval_bool(&parse("A == 42").unwrap(), &v).unwrap());
        assert!(eval_bool(&parse("42 == A").unwrap(), &v).unwrap());
    }

    #[test]
    fn ident_equals_number_rejects_non_numeric() {
        let v = view(&[("A", "not-a-number")]);
        assert!(eval_bool(&parse("A == 42").unwrap(), &v).is_err());
    }

    #[test]
    fn undefined_ident_coerces_to_empty_and_false() {
        let v = view(&[]);
        assert!(!eval_bool(&parse("MISSING").unwrap(), &v).unwrap());
    }

    #[test]
    fn relational_requires_integers() {
        let v = view(&[("A", "3"), ("B", "5")]);
        assert!(eval_bool(&parse("A < B").unwrap(), &v).unwrap());
        let v2 = view(&[("A", "x"), ("B", "5")]);
        assert!(eval_bool(&parse("A < B").unwrap(), &v2).is_err());
    }

    #[test]
    fn boolean_connectives() {
        let v = view(&[("A", "1"), ("B", "0")]);
        assert!(eval_bool(&parse("A || B").unwrap(), &v).unwrap());
        assert!(!eval_bool(&parse("A && B").unwrap(), &v).unwrap());
        assert!(eval_bool(&parse("A ^^ B").unwrap(), &v).unwrap());
    }

    #[test]
    fn nested_subexpr_equality_falls_back_to_bool_coercion() {
        let v = view(&[("A", "1"), ("B", "0"), ("C", "1")]);
        // (A && B) == C: lhs is computed (false), rhs is an ident ("1" -> true).
        assert!(!eval_bool(&parse("(A && B) == C").unwrap(), &v).unwrap());
    }

    struct MapResolver<'a>(&'a HashMap<String, String>);

    impl ValueResolver for MapResolver<'_> {
        fn resolve(&mut self, name: &str) -> EvalResult<String> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::ResolutionFailed {
                    name: name.to_string(),
                    reason: "undefined setting".into(),
                })
        }
    }

    #[test]
    fn clamp_and_min_max() {
        let settings = view(&[("FOO", "20")]);
        let mut r = MapResolver(&settings);
        let expr = parse_value("clamp(FOO, 0, 10)").unwrap();
        assert_eq!(eval_value(&expr, &mut r).unwrap(), "10");

        let expr = parse_value("min(3, 7)").unwrap();
        assert_eq!(eval_value(&expr, &mut r).unwrap(), "3");
        let expr = parse_value("max(3, 7)").unwrap();
        assert_eq!(eval_value(&expr, &mut r).unwrap(), "7");
    }

    #[test]
    fn ite_only_evaluates_taken_branch() {
        let settings = view(&[("COND", "1")]);
        let mut r = MapResolver(&settings);
        let expr = parse_value("ite(COND, 1, UNDEFINED)").unwrap();
        assert_eq!(eval_value(&expr, &mut r).unwrap(), "1");
    }

    #[test]
    fn in_range_and_in_set() {
        let settings = view(&[]);
        let mut r = MapResolver(&settings);
        assert_eq!(eval_value(&parse_value("in_range(5, 0, 10)").unwrap(), &mut r).unwrap(), "1");
        assert_eq!(eval_value(&parse_value("in_range(15, 0, 10)").unwrap(), &mut r).unwrap(), "0");
        assert_eq!(
            eval_value(&parse_value("in_set(\"b\", \"a\", \"b\", \"c\")").unwrap(), &mut r).unwrap(),
            "1"
        );
    }

    #[test]
    fn unknown_function_errors() {
        let settings = view(&[]);
        let mut r = MapResolver(&settings);
        assert!(eval_value(&parse_value("bogus(1)").unwrap(), &mut r).is_err());
    }
}
