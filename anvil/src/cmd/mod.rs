mod debug;
mod flashmap;
mod image;
mod manifest;
mod mfg;
mod resolve;
mod stagecall;
mod syscfg;

use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Warn;

/// A thin driver over the embedded config/resolver/image/manifest core. It
/// loads inputs from disk and calls into the library crates; it does not
/// acquire repositories, invoke a compiler or linker, or talk to hardware.
#[derive(Debug, Parser)]
#[clap(about, long_about = None, version)]
pub struct Args {
    /// Set the logging level. One of [off|error|warn|info|debug|trace].
    /// Defaults to warn. You can also leave this unset and use the
    /// RUST_LOG env variable.
    #[clap(long = "log-level")]
    pub log_level: Option<LevelFilter>,

    #[clap(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(Debug, Parser)]
pub enum Subcommand {
    /// Resolve a target's package set and print it with any diagnostics.
    Resolve(resolve::Resolve),

    /// Emit syscfg/flashmap/stagecall C artifacts for a resolved target.
    #[clap(subcommand)]
    Emit(EmitCommand),

    /// Build a firmware image.
    Image(image::Image),

    /// Build a JSON build manifest.
    Manifest(manifest::Manifest),

    /// Split or join a manufacturing image.
    #[clap(subcommand)]
    Mfg(mfg::MfgCommand),

    /// Commands for troubleshooting the core's internals.
    #[clap(subcommand)]
    Debug(debug::DebugCommand),
}

#[derive(Debug, Parser)]
pub enum EmitCommand {
    Syscfg(syscfg::SyscfgEmit),
    Flashmap(flashmap::FlashmapEmit),
    Stagecall(stagecall::StagecallEmit),
}

pub async fn run(args: Args) -> Result<()> {
    match args.subcommand {
        Subcommand::Resolve(cmd) => cmd.run().await,
        Subcommand::Emit(EmitCommand::Syscfg(cmd)) => cmd.run().await,
        Subcommand::Emit(EmitCommand::Flashmap(cmd)) => cmd.run().await,
        Subcommand::Emit(EmitCommand::Stagecall(cmd)) => cmd.run().await,
        Subcommand::Image(cmd) => cmd.run().await,
        Subcommand::Manifest(cmd) => cmd.run().await,
        Subcommand::Mfg(MfgCommand::Split(cmd)) => cmd.run().await,
        Subcommand::Mfg(MfgCommand::Join(cmd)) => cmd.run().await,
        Subcommand::Debug(DebugCommand::Expr(cmd)) => cmd.run().await,
    }
}

pub use debug::DebugCommand;
pub use mfg::MfgCommand;

/// Use `level` if present, or else `RUST_LOG` if present, or else a
/// per-crate default filter.
pub fn init_logger(level: Option<LevelFilter>) {
    match (std::env::var(env_logger::DEFAULT_FILTER_ENV).ok(), level) {
        (Some(_), None) => {
            Builder::from_default_env().init();
        }
        _ => {
            Builder::new()
                .filter(
                    Some(env!("CARGO_CRATE_NAME")),
                    level.unwrap_or(DEFAULT_LEVEL_FILTER),
                )
                .init();
        }
    }
}
