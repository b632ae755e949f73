use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Debug, Parser)]
pub enum DebugCommand {
    /// Parse and evaluate an expression against a settings file.
    Expr(DebugExpr),
}

/// Evaluate a boolean expression against a flat `name: value` settings
/// file, the same language used for conditional YAML keys and setting
/// restrictions.
#[derive(Debug, Parser)]
pub struct DebugExpr {
    /// The expression text to evaluate.
    expr: String,

    /// A YAML file of flat `name: value` settings.
    #[clap(long)]
    settings: Option<PathBuf>,
}

impl DebugExpr {
    pub async fn run(&self) -> Result<()> {
        let settings: HashMap<String, String> = match &self.settings {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading '{}'", path.display()))?;
                serde_yaml::from_str(&text)
                    .with_context(|| format!("parsing '{}'", path.display()))?
            }
            None => HashMap::new(),
        };

        let expr = anvil_expr::parse(&self.expr).context("parsing expression")?;
        let view: &dyn anvil_expr::SettingsView = &settings;
        let result = anvil_expr::eval_bool(&expr, view).context("evaluating expression")?;
        println!("{result}");
        Ok(())
    }
}
