use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use tracing_subscriber::EnvFilter;
use veredicto::cli::{Cli, OutputFormat};
use veredicto::config::AnalysisConfig;
use veredicto::{dataset, pipeline, report};

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    args.apply_overrides(&mut config);
    config
        .validate()
        .context("Invalid analysis configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(&args)?;

    let events = dataset::load_events(&args.events, args.delimiter)
        .with_context(|| format!("Failed to read events from {}", args.events.display()))?;
    let countries = dataset::load_countries(&args.countries, args.delimiter).with_context(|| {
        format!("Failed to read countries from {}", args.countries.display())
    })?;

    let analysis =
        pipeline::analyze(&events, &countries, &config).context("Analysis aborted")?;

    let rendered = match args.format {
        OutputFormat::Text => report::render_text(&analysis),
        OutputFormat::Markdown => report::render_markdown(&analysis),
        OutputFormat::Json => report::to_json(&analysis).context("Failed to serialize report")?,
    };

    match &args.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
