use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use futures::TryStreamExt as _;
use tokio::io::AsyncWriteExt as _;
use uriopen::OpenerRegistry;
use uriopen_config::{ConfigStore as _, FsConfigStore, LoadedSources};
use uriopen_fs::FsOpenerConfig;
use uriopen_http::HttpOpener;
use uriopen_memory::MemoryOpener;
use uriopen_s3_light::S3OpenerConfig;

#[derive(Parser)]
#[command(name = "uriopen-cat")]
#[command(about = "Print the content behind URIs or configured source names")]
#[command(long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory holding `sources/*.{yaml,yml,json}` [default: ~/.config/uriopen]
    #[arg(long, global = true, value_name = "DIR", env = "URIOPEN_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// JSON or YAML file with S3 connection settings; enables `s3://`
    #[arg(long, global = true, value_name = "FILE", env = "URIOPEN_S3_CONFIG")]
    s3_config: Option<PathBuf>,

    /// Serve VALUE under `memory://KEY`; may be repeated
    #[arg(long = "memory", value_name = "KEY=VALUE", value_parser = parse_memory_entry)]
    memory: Vec<(String, String)>,

    /// Restrict `file://` access to this directory
    #[arg(long, value_name = "DIR")]
    fs_root: Option<PathBuf>,

    /// URIs or source names to print, in order
    #[arg(value_name = "URI|NAME")]
    targets: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// List configured sources
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let store = match &cli.config_dir {
        Some(dir) => Some(FsConfigStore::new(dir.clone())),
        None => FsConfigStore::new_default()
            .inspect_err(|err| tracing::debug!(error = %err, "no default config directory"))
            .ok(),
    };
    let sources = load_sources(store.as_ref()).await?;

    match cli.command {
        Some(Command::Sources) => {
            list_sources(&sources);
            Ok(())
        }
        None => {
            if cli.targets.is_empty() {
                bail!("nothing to print: pass at least one URI or source name");
            }
            let registry =
                build_registry(&cli.memory, cli.fs_root, cli.s3_config.as_deref()).await?;
            cat(&registry, &sources, &cli.targets).await
        }
    }
}

fn parse_memory_entry(entry: &str) -> Result<(String, String), String> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{entry}'")),
    }
}

/// Without a store there are no sources, and every argument is a URI.
async fn load_sources(store: Option<&FsConfigStore>) -> Result<LoadedSources, anyhow::Error> {
    let Some(store) = store else {
        return Ok(LoadedSources::default());
    };
    let sources = store.load_sources().await?;
    for failed in &sources.failed {
        tracing::warn!(%failed, "skipping invalid source config");
    }
    Ok(sources)
}

fn list_sources(sources: &LoadedSources) {
    for source in &sources.sources {
        let config = &source.config;
        match &config.description {
            Some(description) => println!("{}\t{}\t{}", config.name, config.uri, description),
            None => println!("{}\t{}", config.name, config.uri),
        }
    }
}

fn load_s3_config(path: &Path) -> Result<S3OpenerConfig, anyhow::Error> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("could not read s3 config '{}'", path.display()))?;
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents).context("invalid JSON s3 config")?,
        Some("yaml" | "yml") => serde_yaml::from_str(&contents).context("invalid YAML s3 config")?,
        _ => bail!(
            "s3 config '{}' must be a .json, .yaml or .yml file",
            path.display()
        ),
    };
    Ok(config)
}

async fn build_registry(
    memory: &[(String, String)],
    fs_root: Option<PathBuf>,
    s3_config: Option<&Path>,
) -> Result<OpenerRegistry, anyhow::Error> {
    let memory_opener = MemoryOpener::new();
    for (key, value) in memory {
        memory_opener.insert(key.clone(), value.clone()).await;
    }

    let mut registry = memory_opener.register(OpenerRegistry::new());
    registry = uriopen_fs::register(registry, FsOpenerConfig { root: fs_root })?;
    registry = HttpOpener::new()?.register(registry);
    if let Some(path) = s3_config {
        registry = uriopen_s3_light::register(registry, load_s3_config(path)?)?;
    }

    tracing::debug!(schemes = ?registry.schemes(), "registry ready");
    Ok(registry.into_traced())
}

async fn cat(
    registry: &OpenerRegistry,
    sources: &LoadedSources,
    targets: &[String],
) -> Result<(), anyhow::Error> {
    let mut stdout = tokio::io::stdout();

    for target in targets {
        let uri = sources.expand(target);
        let mut stream = registry.resolve(uri).await?;
        while let Some(chunk) = stream
            .try_next()
            .await
            .with_context(|| format!("failed reading '{uri}'"))?
        {
            stdout.write_all(&chunk).await?;
        }
    }
    stdout.flush().await?;

    Ok(())
}
