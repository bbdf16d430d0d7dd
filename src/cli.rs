//! CLI argument parsing for veredicto

use crate::config::AnalysisConfig;
use crate::dataset::SegmentKey;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the analysis report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal summary (default)
    Text,
    /// JSON metrics record for dashboards
    Json,
    /// Markdown decision report
    Markdown,
}

#[derive(Parser, Debug)]
#[command(name = "veredicto")]
#[command(version)]
#[command(about = "Statistical rollout decisions for A/B conversion experiments", long_about = None)]
pub struct Cli {
    /// Event table (user_id, timestamp, group, landing_page, converted)
    #[arg(long = "events", value_name = "PATH")]
    pub events: PathBuf,

    /// Country lookup table (user_id, country)
    #[arg(long = "countries", value_name = "PATH")]
    pub countries: PathBuf,

    /// TOML analysis configuration
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Field delimiter of both input tables
    #[arg(short = 'd', long = "delimiter", default_value = ",")]
    pub delimiter: char,

    /// Significance level (overrides config)
    #[arg(long = "alpha")]
    pub alpha: Option<f64>,

    /// Monte Carlo seed (overrides config)
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Monte Carlo draws per arm (overrides config)
    #[arg(long = "samples")]
    pub samples: Option<usize>,

    /// Segmentation attribute (overrides config)
    #[arg(long = "segment-key", value_enum)]
    pub segment_key: Option<SegmentKey>,

    /// Run the independent analyses in parallel
    #[arg(long = "parallel")]
    pub parallel: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of file/default configuration
    pub fn apply_overrides(&self, config: &mut AnalysisConfig) {
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        if let Some(samples) = self.samples {
            config.bayesian_sample_count = samples;
        }
        if let Some(key) = self.segment_key {
            config.segment_key = key;
        }
        if self.parallel {
            config.parallel = true;
        }
    }
}
