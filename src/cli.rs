//! Command-line arguments for the importer

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;
use crate::ingest::source::SourceFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Jsonl,
}

impl From<FormatArg> for SourceFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => SourceFormat::Csv,
            FormatArg::Jsonl => SourceFormat::Jsonl,
        }
    }
}

/// Load legislator posts from a CSV or JSONL file into PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "civicwatch-import")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input file
    pub input: PathBuf,

    /// Input format (default: detected from the file extension)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Posts buffered before each flush
    #[arg(long, env = "IMPORT_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Maximum posts per upsert statement
    #[arg(long, env = "IMPORT_SUB_BATCH_SIZE")]
    pub sub_batch_size: Option<usize>,

    /// Create missing tables and views before loading
    #[arg(long)]
    pub init_schema: bool,

    /// Do not refresh the aggregate views after commit
    #[arg(long)]
    pub skip_refresh: bool,

    /// Run every stage against an in-memory store instead of PostgreSQL
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn source_format(&self) -> Option<SourceFormat> {
        self.format.map(SourceFormat::from)
    }

    /// Flags override values loaded from the environment.
    pub fn apply(&self, config: &mut Config) {
        if let Some(batch_size) = self.batch_size {
            config.import.batch_size = batch_size;
        }
        if let Some(sub_batch_size) = self.sub_batch_size {
            config.import.sub_batch_size = sub_batch_size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "civicwatch-import",
            "posts.jsonl",
            "--format",
            "csv",
            "--batch-size",
            "5000",
            "--sub-batch-size",
            "3000",
            "--dry-run",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.import.batch_size, 5000);
        assert_eq!(config.import.sub_batch_size, 3000);
        assert_eq!(cli.source_format(), Some(SourceFormat::Csv));
        assert!(cli.dry_run);
        assert!(!cli.init_schema);
    }

    #[test]
    fn test_input_is_required() {
        assert!(Cli::try_parse_from(["civicwatch-import"]).is_err());
    }
}
