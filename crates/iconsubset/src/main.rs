//! CLI for `iconsubset`.

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::Parser;
use iconsubset::{AmbiguousVariant, Config, Pipeline};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Shrinks icon webfonts to the icons used by a static site.
#[derive(Debug, Parser)]
#[command(name = "iconsubset", version)]
struct Args {
    /// Root directory of the site. Overrides `root` from the configuration file.
    root: Option<PathBuf>,
    /// Path to the configuration file. By default, `iconsubset.toml` in the site root is used
    /// if it exists.
    #[arg(long, short = 'c', env = "ICONSUBSET_CONFIG")]
    config: Option<PathBuf>,
    /// File stem of generated files.
    #[arg(long)]
    stem: Option<String>,
    /// Output directory for the stylesheet, relative to the site root.
    #[arg(long)]
    css_dir: Option<PathBuf>,
    /// Output directory for fonts, relative to the site root.
    #[arg(long)]
    font_dir: Option<PathBuf>,
    /// Family name of the generated font.
    #[arg(long)]
    family: Option<String>,
    /// Do not rewrite stylesheet links in the site markup.
    #[arg(long)]
    no_rewrite: bool,
    /// Add a content hash to names of generated files.
    #[arg(long)]
    hash: bool,
    /// First allocated codepoint as a hex number, e.g. `e000`.
    #[arg(long, value_parser = parse_hex)]
    base: Option<u32>,
    /// Policy for icons whose modifiers select several font faces.
    #[arg(long, value_enum)]
    ambiguous: Option<AmbiguousVariant>,
    /// Additional non-prefixed classes allowed in icon class combinations.
    #[arg(long = "extra", value_name = "CLASS")]
    extra_classes: Vec<String>,
}

fn parse_hex(raw: &str) -> Result<u32, String> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("U+"))
        .unwrap_or(raw);
    u32::from_str_radix(digits, 16).map_err(|err| err.to_string())
}

impl Args {
    fn load_config(&self) -> anyhow::Result<Config> {
        let root = self.root.clone().unwrap_or_else(|| PathBuf::from("."));
        let config_path = self
            .config
            .clone()
            .or_else(|| Some(root.join(Config::FILE_NAME)).filter(|path| path.is_file()));
        let mut config = if let Some(path) = &config_path {
            tracing::info!(path = %path.display(), "loading configuration");
            Config::from_file(path)
                .with_context(|| format!("cannot load configuration from `{}`", path.display()))?
        } else {
            Config::default()
        };

        if let Some(root) = &self.root {
            config.root.clone_from(root);
        }
        if let Some(stem) = &self.stem {
            config.output_stem.clone_from(stem);
        }
        if let Some(dir) = &self.css_dir {
            config.css_dir.clone_from(dir);
        }
        if let Some(dir) = &self.font_dir {
            config.font_dir.clone_from(dir);
        }
        if let Some(family) = &self.family {
            config.font_family.clone_from(family);
        }
        if self.no_rewrite {
            config.rewrite_links = false;
        }
        if self.hash {
            config.content_hash = true;
        }
        if let Some(base) = self.base {
            config.codepoint_base = base;
        }
        if let Some(policy) = self.ambiguous {
            config.ambiguous_variant = policy;
        }
        config.extra_classes.extend(self.extra_classes.iter().cloned());
        Ok(config)
    }
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let config = args.load_config()?;
    tracing::debug!(?config, "loaded configuration");
    let pipeline = Pipeline::new(config).context("invalid configuration")?;
    let summary = pipeline.run().await.context("failed processing site")?;

    for report in &summary.reports {
        println!("{report}");
    }
    let is_success = summary.is_success();
    for failure in summary.failures {
        let err = anyhow::Error::from(failure.error);
        eprintln!("{}: {err:#}", failure.stylesheet);
    }
    Ok(is_success)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let is_success = run(args).await?;
    Ok(if is_success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
