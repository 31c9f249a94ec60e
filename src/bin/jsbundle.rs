use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;

use bundler_config::BuildConfig;
use bundler_core::{build, write_output, BuildEnv, DevSession};
use bundler_devserver::NotifyWatcher;
use bundler_plugin::PluginPipeline;
use jsbundle::cli::{BuildArgs, Cli, Command};
use logger::StdioLogger;

fn main() -> Result<()> {
    tracing_subscriber::fmt::try_init().ok();
    let cli = Cli::parse();

    match &cli.command {
        Command::Build(args) => run_build(args),
        Command::Dev(args) => run_dev(args),
    }
}

fn run_build(args: &BuildArgs) -> Result<()> {
    let config = load_config(args)?;
    let logger = StdioLogger::new();
    let plugins = PluginPipeline::build(&[]).context("setting up plugins")?;

    let env = BuildEnv::new(args.root.clone(), &config, &logger);
    let cache = bundler_graph::cache::TransformCache::new();
    let output = build(&env, &plugins, &cache).context("build failed")?;
    write_output(&args.root, &config, &output).context("writing build output")?;

    println!(
        "built {} module(s) into {} chunk(s) -> {}",
        output.module_count,
        output.chunk_count,
        config.outdir.display()
    );
    Ok(())
}

fn run_dev(args: &BuildArgs) -> Result<()> {
    let config = load_config(args)?;
    let logger = StdioLogger::new();
    let plugins = PluginPipeline::build(&[]).context("setting up plugins")?;

    let watcher = NotifyWatcher::new();
    let mut session =
        DevSession::start(watcher, &args.root).context("starting the file watcher")?;

    println!("watching {} for changes...", args.root.display());
    while let Some(message) = session.next_cycle(&args.root, &config, &logger, &plugins, now_millis())
    {
        println!("{}", serde_json::to_string(&message)?);
    }
    Ok(())
}

fn load_config(args: &BuildArgs) -> Result<BuildConfig> {
    let path = args.config_path();
    BuildConfig::load(&path, &args.overrides())
        .with_context(|| format!("loading config from {}", path.display()))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
