//! A tree of named nodes over conditional YAML keys, queried against the
//! current settings to decide which entries apply. Backs both `pkg.yml`
//! and `syscfg.yml` views throughout the rest of `anvil`.

mod error;
mod node;

pub use error::{Error, Result, Warning};
pub use node::{Entry, Ycfg};
