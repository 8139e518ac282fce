//! cruxd - Crux rule verification and workflow command-line daemon
//!
//! Loads a rule bundle, admits it through the verifiers and then:
//! - reports the admitted registry (`verify`)
//! - checks an entity against its class schema (`check-entity`)
//! - evaluates a rule set against an entity (`match`)
//! - starts a workflow instance in the configured store (`start-instance`)
//!
//! `schema` manages the class schemas kept in the configured store and
//! needs no bundle.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use crux_service::{
    load_registry, match_rule_set, CruxConfig, SchemaService, StartInstanceRequest,
    StorageConfig, WorkflowInstanceService,
};
use crux_storage::{InMemoryCruxStorage, RuleSetRow, WorkflowStore};
use crux_types::{Entity, RuleSchema, RuleSetKind};
use crux_verifier::{verify_entity, Registry, SharedRegistry};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// cruxd CLI
#[derive(Parser)]
#[command(name = "cruxd")]
#[command(about = "Crux rule verification and workflow daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CRUX_CONFIG")]
    config: Option<String>,

    /// Rule bundle (.json, .yaml or .yml); overrides `rules.bundle`
    #[arg(short, long, env = "CRUX_BUNDLE")]
    bundle: Option<PathBuf>,

    /// Log level; overrides `logging.level`
    #[arg(long, env = "CRUX_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "CRUX_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the bundle and print what was admitted
    Verify,

    /// Verify an entity (JSON file) against its class schema
    CheckEntity {
        #[arg(short, long)]
        entity: PathBuf,
    },

    /// Evaluate a rule set against an entity (JSON file) and print the actions
    Match {
        #[arg(short, long)]
        rule_set: String,

        #[arg(short, long)]
        entity: PathBuf,
    },

    /// Start a workflow instance from a request (JSON file)
    StartInstance {
        #[arg(short, long)]
        request: PathBuf,
    },

    /// Class schemas kept in the configured store
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Verify and store a new schema (JSON file)
    New {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long, value_enum, default_value = "business")]
        kind: KindArg,

        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Verify and replace a stored schema (JSON file)
    Update {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long, value_enum, default_value = "business")]
        kind: KindArg,

        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Print one stored schema
    Get {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(short, long)]
        class: String,
    },

    /// List stored schemas
    List {
        #[arg(long)]
        slice: Option<i32>,

        #[arg(long)]
        app: Option<String>,
    },

    /// Delete a stored schema no rule set uses
    Delete {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(short, long)]
        class: String,
    },
}

#[derive(clap::Args)]
struct ScopeArgs {
    #[arg(long)]
    slice: i32,

    #[arg(long)]
    app: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindArg {
    Business,
    Workflow,
}

impl From<KindArg> for RuleSetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Business => RuleSetKind::Business,
            KindArg::Workflow => RuleSetKind::Workflow,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config =
        CruxConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    // Override with CLI args
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.logging.json |= cli.json;
    if let Some(bundle) = &cli.bundle {
        config.rules.bundle = Some(bundle.display().to_string());
    }

    init_tracing(&config);

    match cli.command {
        Commands::Verify => {
            let registry = admit_bundle(&config)?;
            for entry in registry.schemas() {
                println!("schema   {} ({})", entry.schema.class, entry.kind);
            }
            for (name, rule_set) in registry.rule_sets() {
                println!(
                    "ruleset  {name} -> {} ({}, {} rules)",
                    rule_set.class,
                    rule_set.kind,
                    rule_set.rules.len()
                );
            }
            println!(
                "ok: {} schemas, {} rule sets",
                registry.schema_count(),
                registry.rule_set_count()
            );
        }

        Commands::CheckEntity { entity } => {
            let registry = admit_bundle(&config)?;
            let entity: Entity = read_json(&entity)?;
            verify_entity(&entity, &registry)?;
            println!("ok: entity of class {} is valid", entity.class);
        }

        Commands::Match { rule_set, entity } => {
            let registry = admit_bundle(&config)?;
            let entity: Entity = read_json(&entity)?;
            let actions = match_rule_set(&registry, &entity, &rule_set)?;
            println!("{}", serde_json::to_string_pretty(&actions)?);
        }

        Commands::StartInstance { request } => {
            let registry = admit_bundle(&config)?;
            let request: StartInstanceRequest = read_json(&request)?;
            let store = open_store(&config.storage).await?;
            seed_rule_set_rows(store.as_ref(), &registry).await?;

            let service =
                WorkflowInstanceService::new(store, Arc::new(SharedRegistry::new(registry)));
            let outcome = service.start_instance(request).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Commands::Schema { command } => {
            let schemas = SchemaService::new(open_store(&config.storage).await?);
            run_schema_command(&schemas, command).await?;
        }
    }

    Ok(())
}

async fn run_schema_command(schemas: &SchemaService, command: SchemaCommands) -> anyhow::Result<()> {
    match command {
        SchemaCommands::New { scope, kind, schema } => {
            let schema: RuleSchema = read_json(&schema)?;
            let class = schema.class.clone();
            schemas
                .create(scope.slice, &scope.app, kind.into(), schema)
                .await?;
            println!("ok: schema {class} created");
        }
        SchemaCommands::Update { scope, kind, schema } => {
            let schema: RuleSchema = read_json(&schema)?;
            let class = schema.class.clone();
            schemas
                .update(scope.slice, &scope.app, kind.into(), schema)
                .await?;
            println!("ok: schema {class} updated");
        }
        SchemaCommands::Get { scope, class } => {
            let row = schemas.get(scope.slice, &scope.app, &class).await?;
            println!("{}", serde_json::to_string_pretty(&row)?);
        }
        SchemaCommands::List { slice, app } => {
            for row in schemas.list(slice, app.as_deref()).await? {
                println!("{}/{}/{} ({})", row.slice, row.app, row.class(), row.kind);
            }
        }
        SchemaCommands::Delete { scope, class } => {
            schemas.delete(scope.slice, &scope.app, &class).await?;
            println!("ok: schema {class} deleted");
        }
    }
    Ok(())
}

fn admit_bundle(config: &CruxConfig) -> anyhow::Result<Registry> {
    let Some(bundle_path) = config.rules.bundle.as_deref() else {
        bail!("no rule bundle configured (use --bundle or rules.bundle)");
    };
    load_registry(bundle_path).with_context(|| format!("failed to admit bundle {bundle_path}"))
}

fn init_tracing(config: &CruxConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

async fn open_store(storage: &StorageConfig) -> anyhow::Result<Arc<dyn WorkflowStore>> {
    match storage {
        StorageConfig::Memory => Ok(Arc::new(InMemoryCruxStorage::new())),
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let store = crux_storage::postgres::PostgresCruxStorage::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => {
            bail!("cruxd was built without the `postgres` feature")
        }
    }
}

/// Add a row for every admitted rule set that has none yet. Rows already in
/// the store keep their active/internal flags.
async fn seed_rule_set_rows(store: &dyn WorkflowStore, registry: &Registry) -> anyhow::Result<()> {
    let mut added = 0;
    for rule_set in registry.rule_sets().values() {
        if store.insert_rule_set_row(RuleSetRow::from(rule_set)).await? {
            added += 1;
        }
    }
    tracing::info!(
        rule_sets = registry.rule_set_count(),
        added,
        "Rule set rows seeded"
    );
    Ok(())
}
