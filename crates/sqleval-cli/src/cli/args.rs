use clap::{Parser, Subcommand, ValueEnum};
use sqleval_core::model::{Experiment, ModelType};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sqleval",
    version,
    about = "Execution-based evaluation of text-to-SQL predictions"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file (defaults apply when the default file is absent)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Reject unknown config keys instead of warning
    #[arg(long, global = true)]
    pub strict_config: bool,

    /// Reference database, overrides config and SQLEVAL_DB
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub records_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub reports_dir: Option<PathBuf>,

    /// Concurrent query workers
    #[arg(long, global = true)]
    pub parallel: Option<usize>,

    /// Per-query timeout in seconds (0 disables)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute gold (and optionally predicted) SQL and persist the outcomes
    Records(RecordsArgs),
    /// Score predictions against gold SQL by executing both
    Evaluate(EvaluateArgs),
    /// Inspect mismatches and errors from persisted outcomes
    Mismatches(MismatchesArgs),
    /// Dataset statistics
    Stats(StatsArgs),
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelTypeArg {
    Ft,
    Scr,
}

impl From<ModelTypeArg> for ModelType {
    fn from(m: ModelTypeArg) -> Self {
        match m {
            ModelTypeArg::Ft => ModelType::Ft,
            ModelTypeArg::Scr => ModelType::Scr,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct ExperimentArgs {
    #[arg(long)]
    pub experiment: Option<String>,

    #[arg(long, value_enum, default_value_t = ModelTypeArg::Ft)]
    pub model_type: ModelTypeArg,
}

impl ExperimentArgs {
    pub fn experiment(&self) -> Option<Experiment> {
        self.experiment
            .as_ref()
            .map(|name| Experiment::new(name.clone(), self.model_type.into()))
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct RecordsArgs {
    #[arg(long, default_value = "dev")]
    pub split: String,

    /// Re-execute gold SQL even if its cache exists
    #[arg(long)]
    pub refresh: bool,

    #[command(flatten)]
    pub exp: ExperimentArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long, default_value = "dev")]
    pub split: String,

    // one experiment; all discovered experiments otherwise
    #[command(flatten)]
    pub exp: ExperimentArgs,

    #[arg(long)]
    pub refresh_gold: bool,

    /// Exit 1 when any experiment's record EM is below this rate
    #[arg(long)]
    pub fail_under: Option<f64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MismatchesArgs {
    #[arg(long, default_value = "dev")]
    pub split: String,

    #[arg(long)]
    pub experiment: String,

    #[arg(long, value_enum, default_value_t = ModelTypeArg::Ft)]
    pub model_type: ModelTypeArg,

    /// Skip writing report files
    #[arg(long)]
    pub no_write: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StatsArgs {
    #[arg(long = "split", default_values_t = vec!["train".to_string(), "dev".to_string()])]
    pub splits: Vec<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}
