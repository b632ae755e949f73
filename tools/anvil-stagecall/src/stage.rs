use std::collections::BTreeMap;

use anvil_expr::{eval_value, parse_integer, parse_value, EvalError, SettingsView, ValueResolver};
use anvil_model::package::PackageName;
use snafu::{OptionExt, ResultExt};

use crate::error::{BadStageSnafu, NotAnIntegerSnafu, Result, UnknownStageReferenceSnafu};

/// A stage as it appears in `pkg.init_funcs`/`pkg.down_funcs` before
/// resolution: either a syscfg-resolvable value expression or a symbolic
/// ordering relative to another symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSpec {
    Numeric(String),
    Before(String),
    After(String),
}

pub fn parse_stage(raw: &str) -> StageSpec {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("$before:") {
        StageSpec::Before(rest.trim().to_string())
    } else if let Some(rest) = raw.strip_prefix("$after:") {
        StageSpec::After(rest.trim().to_string())
    } else {
        StageSpec::Numeric(raw.to_string())
    }
}

/// One collected call-table entry: a symbol, the package that declared it,
/// and its unresolved stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEntry {
    pub symbol: String,
    pub source: PackageName,
    pub raw_stage: String,
    pub stage: StageSpec,
}

impl CallEntry {
    pub fn new(symbol: impl Into<String>, source: PackageName, raw_stage: impl Into<String>) -> Self {
        let raw_stage = raw_stage.into();
        let stage = parse_stage(&raw_stage);
        CallEntry {
            symbol: symbol.into(),
            source,
            raw_stage,
            stage,
        }
    }
}

/// A call entry with its final numeric sort key resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    pub symbol: String,
    pub source: PackageName,
    pub sort_key: f64,
}

struct SettingsValueResolver<'a>(&'a dyn SettingsView);

impl ValueResolver for SettingsValueResolver<'_> {
    fn resolve(&mut self, name: &str) -> anvil_expr::EvalResult<String> {
        self.0
            .get(name)
            .map(str::to_string)
            .ok_or_else(|| EvalError::ResolutionFailed {
                name: name.to_string(),
                reason: "undefined setting".to_string(),
            })
    }
}

fn resolve_numeric(symbol: &str, text: &str, settings: &dyn SettingsView) -> Result<f64> {
    let expr = parse_value(text)
        .map_err(anvil_expr::Error::from)
        .context(BadStageSnafu {
            symbol: symbol.to_string(),
            text: text.to_string(),
        })?;
    let mut resolver = SettingsValueResolver(settings);
    let value_text = eval_value(&expr, &mut resolver)
        .map_err(anvil_expr::Error::from)
        .context(BadStageSnafu {
            symbol: symbol.to_string(),
            text: text.to_string(),
        })?;
    let n = parse_integer(&value_text).context(NotAnIntegerSnafu {
        symbol: symbol.to_string(),
        text: text.to_string(),
    })?;
    Ok(n as f64)
}

/// Resolve every entry's stage to a final `f64` sort key: numeric stages
/// evaluate directly; `$before:X`/`$after:X` stages resolve to `key(X) -
/// 0.5`/`key(X) + 0.5`, iterated to a fixed point since `X` may itself be
/// a symbolic stage. Entries sharing the same raw `(stage, symbol)` pair
/// are reported via `duplicates`.
pub fn resolve_stages(
    entries: &[CallEntry],
    settings: &dyn SettingsView,
) -> Result<(Vec<ResolvedEntry>, Vec<(String, String)>)> {
    let mut seen: BTreeMap<(String, String), u32> = BTreeMap::new();
    let mut duplicates = Vec::new();
    for e in entries {
        let key = (e.raw_stage.clone(), e.symbol.clone());
        let count = seen.entry(key.clone()).or_insert(0);
        *count += 1;
        if *count == 2 {
            duplicates.push(key);
        }
    }

    let mut keys: BTreeMap<String, f64> = BTreeMap::new();
    let mut pending: Vec<&CallEntry> = Vec::new();
    for e in entries {
        match &e.stage {
            StageSpec::Numeric(text) => {
                let k = resolve_numeric(&e.symbol, text, settings)?;
                keys.entry(e.symbol.clone()).or_insert(k);
            }
            StageSpec::Before(_) | StageSpec::After(_) => pending.push(e),
        }
    }

    let mut remaining = pending;
    loop {
        let mut progressed = false;
        let mut still_pending = Vec::new();
        for e in remaining {
            let (target, offset, relation) = match &e.stage {
                StageSpec::Before(target) => (target, -0.5, "before"),
                StageSpec::After(target) => (target, 0.5, "after"),
                StageSpec::Numeric(_) => unreachable!(),
            };
            if let Some(target_key) = keys.get(target) {
                keys.entry(e.symbol.clone()).or_insert(target_key + offset);
                progressed = true;
            } else {
                still_pending.push(e);
            }
        }
        let done = still_pending.is_empty();
        let stalled = !progressed && !still_pending.is_empty();
        remaining = still_pending;
        if done {
            break;
        }
        if stalled {
            let e = remaining[0];
            let (target, relation) = match &e.stage {
                StageSpec::Before(target) => (target.clone(), "before"),
                StageSpec::After(target) => (target.clone(), "after"),
                StageSpec::Numeric(_) => unreachable!(),
            };
            return UnknownStageReferenceSnafu {
                symbol: e.symbol.clone(),
                target,
                relation,
            }
            .fail();
        }
    }

    let mut resolved: Vec<ResolvedEntry> = entries
        .iter()
        .map(|e| ResolvedEntry {
            symbol: e.symbol.clone(),
            source: e.source.clone(),
            sort_key: *keys.get(&e.symbol).expect("every symbol resolved above"),
        })
        .collect();
    resolved.sort_by(|a, b| {
        a.sort_key
            .partial_cmp(&b.sort_key)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    Ok((resolved, duplicates))
}
