use anvil_expr::SettingsView;
use anvil_model::setting::{Interval, Restriction};
use serde_yaml::Value;
use snafu::ResultExt;

use crate::error::{BadRangeSnafu, BadRestrictionSnafu, Result};

/// Normalize a restriction expression's deprecated shorthands:
/// `X` standing alone means `X || !<base>` (the restriction only applies
/// while the base setting is truthy); the older `X if Y` form means
/// `X || !Y`.
fn normalize(raw: &str, base: &str) -> String {
    if let Some((x, y)) = raw.split_once(" if ") {
        format!("({}) || !({})", x.trim(), y.trim())
    } else {
        format!("({}) || !({})", raw.trim(), base)
    }
}

pub fn parse_expr_restriction(name: &str, raw: &str) -> Result<Restriction> {
    let normalized = normalize(raw, name);
    let expr = anvil_expr::parse(&normalized).context(BadRestrictionSnafu {
        name: name.to_string(),
        text: raw.to_string(),
    })?;
    Ok(Restriction::Expr(expr))
}

fn parse_interval(name: &str, text: &str) -> Result<Interval> {
    let text = text.trim();
    if let Some((lo, hi)) = text.split_once("..") {
        let lo = anvil_expr::parse_integer(lo.trim()).context(BadRangeSnafu {
            name: name.to_string(),
            text: text.to_string(),
        })?;
        let hi = anvil_expr::parse_integer(hi.trim()).context(BadRangeSnafu {
            name: name.to_string(),
            text: text.to_string(),
        })?;
        Ok(Interval { lo, hi })
    } else {
        let v = anvil_expr::parse_integer(text).context(BadRangeSnafu {
            name: name.to_string(),
            text: text.to_string(),
        })?;
        Ok(Interval::single(v))
    }
}

/// Parse the `restrictions`/`choices`/`range` fields of a single
/// `syscfg.defs.<NAME>` entry into the model's [`Restriction`] list.
pub fn parse_restrictions(name: &str, def: &Value) -> Result<Vec<Restriction>> {
    let mut out = Vec::new();
    let Some(map) = def.as_mapping() else {
        return Ok(out);
    };

    if let Some(list) = map.get(Value::from("restrictions")).and_then(Value::as_sequence) {
        for entry in list {
            if let Some(text) = entry.as_str() {
                if text == "$notnull" {
                    out.push(Restriction::NotNull);
                } else {
                    out.push(parse_expr_restriction(name, text)?);
                }
            }
        }
    }

    if let Some(choices) = map.get(Value::from("choices")).and_then(Value::as_sequence) {
        let list: Vec<String> = choices
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        if !list.is_empty() {
            out.push(Restriction::Choice(list));
        }
    }

    if let Some(range) = map.get(Value::from("range")).and_then(Value::as_sequence) {
        let mut intervals = Vec::new();
        for v in range {
            if let Some(text) = v.as_str() {
                intervals.push(parse_interval(name, text)?);
            } else if let Some(n) = v.as_i64() {
                intervals.push(Interval::single(n));
            }
        }
        if !intervals.is_empty() {
            out.push(Restriction::Range(intervals));
        }
    }

    Ok(out)
}

/// Evaluate one restriction against the setting's current value and the
/// rest of the settings table. `true` means satisfied.
pub fn check(restriction: &Restriction, current_value: &str, settings: &dyn SettingsView) -> bool {
    match restriction {
        Restriction::NotNull => !current_value.is_empty(),
        Restriction::Expr(expr) => anvil_expr::eval_bool(expr, settings).unwrap_or(false),
        Restriction::Choice(choices) => choices
            .iter()
            .any(|c| c.eq_ignore_ascii_case(current_value)),
        Restriction::Range(intervals) => anvil_expr::parse_integer(current_value)
            .map(|v| intervals.iter().any(|iv| iv.contains(v)))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn bare_expression_gets_base_disable_clause() {
        let r = parse_expr_restriction("FOO", "BAR").unwrap();
        let settings: HashMap<String, String> =
            [("BAR".to_string(), "0".to_string()), ("FOO".to_string(), "0".to_string())]
                .into_iter()
                .collect();
        // BAR is false, but FOO itself is also false, so the disable clause
        // `!FOO` makes the whole restriction vacuously true.
        assert!(check(&r, "0", &settings));
    }

    #[test]
    fn deprecated_if_shorthand() {
        let r = parse_expr_restriction("FOO", "BAR if BAZ").unwrap();
        let settings: HashMap<String, String> = [("BAZ".to_string(), "0".to_string())].into_iter().collect();
        assert!(check(&r, "anything", &settings));
    }

    #[test]
    fn range_with_interval_and_single_value() {
        let r = Restriction::Range(vec![Interval { lo: 1, hi: 4 }, Interval::single(7)]);
        let settings: HashMap<String, String> = HashMap::new();
        assert!(!check(&r, "5", &settings));
        assert!(check(&r, "7", &settings));
        assert!(check(&r, "2", &settings));
    }

    #[test]
    fn choice_is_case_insensitive() {
        let r = Restriction::Choice(vec!["Foo".to_string(), "bar".to_string()]);
        let settings: HashMap<String, String> = HashMap::new();
        assert!(check(&r, "FOO", &settings));
        assert!(!check(&r, "baz", &settings));
    }
}
