// CivicWatch importer - loads a post export into PostgreSQL and refreshes the dashboard views

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use civicwatch_ingest::{
    cli::Cli,
    config::Config,
    infrastructure::{IngestStore, MemoryStore, PostgresStore},
    ingest::{open_source, ImportPipeline, PipelineOptions, PipelineStage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    config.import.validate()?;

    let source = open_source(&cli.input, cli.source_format());

    let mut postgres = None;
    let store: Arc<dyn IngestStore> = if cli.dry_run {
        info!("Dry run: loading into an in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let pg = Arc::new(
            PostgresStore::connect(&config.database)
                .await
                .context("could not connect to PostgreSQL")?,
        );
        postgres = Some(pg.clone());
        pg
    };

    if cli.init_schema {
        store.ensure_schema().await?;
    }

    let options = PipelineOptions {
        skip_refresh: cli.skip_refresh,
    };
    let mut pipeline = ImportPipeline::new(store.clone(), config.import.clone()).with_options(options);
    let result = pipeline.run(source.as_ref()).await;

    if let Some(pg) = postgres {
        pg.close().await;
    }

    match result {
        Ok(summary) => {
            summary.log();
            if cli.dry_run {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(())
        }
        Err(e) => {
            if e.is_post_commit() {
                error!("Rows were committed but the aggregate views are stale");
            } else if pipeline.stage() == PipelineStage::RolledBack {
                error!("Import rolled back, no rows were written");
            }
            Err(e.into())
        }
    }
}
