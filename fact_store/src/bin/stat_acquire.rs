use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;

use fact_store::db::{connect_sqlite, run_pending};
use fact_store::pipeline::{CancelFlag, Orchestrator, RunState};
use fact_store::repo::{facts, query};
use stat_ingestor::providers::provider_for_location;
use stat_ingestor::registry::DatasetRegistry;

#[derive(Parser)]
#[command(version, about = "Statistics acquisition CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending database migrations.
    Migrate,
    /// Fetch, normalize, and persist datasets.
    Acquire {
        /// Dataset id to ingest; repeatable.
        #[arg(long = "dataset", value_name = "ID", conflicts_with = "all")]
        datasets: Vec<String>,
        /// Ingest every dataset in the registry.
        #[arg(long)]
        all: bool,
        /// Registry TOML path; the built-in catalogue is used when absent.
        #[arg(long, value_name = "FILE")]
        registry: Option<String>,
        /// Where to acquire from: an API root URL or a directory of staged
        /// JSON files. Defaults to the Eurostat API.
        #[arg(long, value_name = "LOCATION")]
        source: Option<String>,
        /// Extra query parameter override, as key=value; repeatable.
        /// Only applies to single-dataset runs.
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
    /// Print demographic facts as JSON.
    QueryDemographics {
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        year_from: Option<i32>,
        #[arg(long)]
        year_to: Option<i32>,
        /// Sex category (M, F, O, Total).
        #[arg(long)]
        sex: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Print industrial facts as JSON.
    QueryIndustrial {
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        year_from: Option<i32>,
        #[arg(long)]
        year_to: Option<i32>,
        /// NACE activity code.
        #[arg(long)]
        nace: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Print summary figures for the matching facts.
    Stats {
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        year_from: Option<i32>,
        #[arg(long)]
        year_to: Option<i32>,
    },
    /// Delete every fact for one source. The raw snapshot archive is kept.
    Purge {
        /// Source name, usually the dataset id.
        #[arg(long)]
        source: String,
    },
}

fn parse_overrides(params: &[String]) -> Result<IndexMap<String, String>> {
    let mut overrides = IndexMap::new();
    for param in params {
        let (key, value) = param
            .split_once('=')
            .with_context(|| format!("--param '{param}' is not key=value"))?;
        overrides.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(overrides)
}

fn load_registry(path: Option<&str>) -> Result<DatasetRegistry> {
    let registry = match path {
        Some(path) => DatasetRegistry::from_path(path)?,
        None => DatasetRegistry::builtin()?,
    };
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    match cli.cmd {
        Cmd::Migrate => {
            run_pending(&db_url)?;
        }
        Cmd::Acquire {
            datasets,
            all,
            registry,
            source,
            params,
        } => {
            let registry = load_registry(registry.as_deref())?;
            let ids: Vec<String> = if all {
                registry.all().map(|d| d.id.clone()).collect()
            } else if datasets.is_empty() {
                bail!("pass --dataset <ID> (repeatable) or --all");
            } else {
                datasets
            };
            let overrides = parse_overrides(&params)?;
            if !overrides.is_empty() && ids.len() != 1 {
                bail!("--param only applies to a single --dataset run");
            }

            let provider = provider_for_location(source.as_deref())?;
            let orchestrator = Orchestrator::new(provider, registry, db_url);

            let cancel = CancelFlag::new();
            let ctrl_c_flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, finishing the current page");
                    ctrl_c_flag.cancel();
                }
            });

            let reports = if ids.len() == 1 {
                vec![
                    orchestrator
                        .run_dataset(&ids[0], &overrides, &cancel)
                        .await,
                ]
            } else {
                orchestrator.run_all(&ids, &cancel).await
            };

            println!("{}", serde_json::to_string_pretty(&reports)?);
            if reports.iter().any(|r| r.state == RunState::Failed) {
                bail!("one or more dataset runs failed");
            }
        }
        Cmd::QueryDemographics {
            region,
            year_from,
            year_to,
            sex,
            limit,
        } => {
            let mut conn = connect_sqlite(&db_url)?;
            let filters = query::FactFilters {
                region_code: region,
                year_from,
                year_to,
                sex,
                limit,
                ..query::FactFilters::default()
            };
            let response = query::query_demographics(&mut conn, &filters)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Cmd::QueryIndustrial {
            region,
            year_from,
            year_to,
            nace,
            limit,
        } => {
            let mut conn = connect_sqlite(&db_url)?;
            let filters = query::FactFilters {
                region_code: region,
                year_from,
                year_to,
                nace,
                limit,
                ..query::FactFilters::default()
            };
            let response = query::query_industrial(&mut conn, &filters)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Cmd::Stats {
            region,
            year_from,
            year_to,
        } => {
            let mut conn = connect_sqlite(&db_url)?;
            let filters = query::FactFilters {
                region_code: region,
                year_from,
                year_to,
                ..query::FactFilters::default()
            };
            let summary = query::statistics(&mut conn, &filters)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Cmd::Purge { source } => {
            let mut conn = connect_sqlite(&db_url)?;
            let removed = facts::delete_by_source(&mut conn, &source)?;
            println!("removed {removed} facts for source '{source}'");
        }
    }

    Ok(())
}
