use std::path::PathBuf;

use bundler_config::{CliOverrides, ConfigFormat, ConfigTarget};

/// Top-level CLI (§6 configuration surface, driven from flags + a config
/// file): one binary, two subcommands. Mirrors the teacher's
/// `src/cli.rs` (a bare `clap::Parser` struct with no logic of its own —
/// `src/bin/good-fences.rs` does the work).
#[derive(Debug, clap::Parser)]
#[command(name = "jsbundle", about = "A JavaScript/TypeScript bundler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Run the pipeline once and exit.
    Build(BuildArgs),
    /// Watch the project and rebuild on every change, printing dev-server
    /// messages to stdout (§6 "Dev-server wire protocol").
    Dev(BuildArgs),
}

/// Flags shared by `build` and `dev`. `--root`/`--config` locate the
/// config file; the rest are [`CliOverrides`] applied after it loads —
/// the teacher's `--base-url` overriding `tsconfig.json`'s `baseUrl` is
/// the direct precedent for every one of these.
#[derive(Debug, Clone, clap::Args)]
pub struct BuildArgs {
    /// Project root the config file and entry paths are resolved against.
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Path to the bundler config file, relative to `--root`.
    #[arg(short, long, default_value = "jsbundle.json")]
    pub config: PathBuf,

    /// Override `entry`; repeatable. Leaves the config file's value in
    /// place when empty.
    #[arg(long = "entry")]
    pub entry: Vec<String>,

    #[arg(long)]
    pub outdir: Option<String>,

    #[arg(long, value_enum)]
    pub target: Option<CliTarget>,

    #[arg(long, value_enum)]
    pub format: Option<CliFormat>,

    #[arg(long)]
    pub no_splitting: bool,

    #[arg(long)]
    pub no_treeshake: bool,

    #[arg(long)]
    pub minify: bool,
}

impl BuildArgs {
    pub fn config_path(&self) -> PathBuf {
        self.root.join(&self.config)
    }

    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            entry: self.entry.clone(),
            outdir: self.outdir.clone(),
            target: self.target.map(Into::into),
            format: self.format.map(Into::into),
            splitting: self.no_splitting.then_some(false),
            treeshake: self.no_treeshake.then_some(false),
            minify: self.minify.then_some(true),
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliTarget {
    Browser,
    Server,
}

impl From<CliTarget> for ConfigTarget {
    fn from(value: CliTarget) -> Self {
        match value {
            CliTarget::Browser => ConfigTarget::Browser,
            CliTarget::Server => ConfigTarget::Server,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    Iife,
    Cjs,
    Esm,
}

impl From<CliFormat> for ConfigFormat {
    fn from(value: CliFormat) -> Self {
        match value {
            CliFormat::Iife => ConfigFormat::Iife,
            CliFormat::Cjs => ConfigFormat::Cjs,
            CliFormat::Esm => ConfigFormat::Esm,
        }
    }
}
