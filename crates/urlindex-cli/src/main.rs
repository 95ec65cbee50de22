use std::collections::HashSet;
use std::env;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use urlindex_core::identity::DatasetRegistry;
use urlindex_core::writer::Writer;
use urlindex_core::{builder, identity, normalize};
use urlindex_types::config::Config;
use urlindex_types::model::{DatasetId, DomainId, PartitionKey, RowRecord};
use urlindex_server::state::AppState;

fn begin_logging() {
    let log_format = if let Ok(var) = env::var("RUST_LOG_FORMAT") {
        let mut set = HashSet::new();
        for s in var.split(',') {
            set.insert(s.to_string());
        }
        set
    } else {
        HashSet::new()
    };

    let logger = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(!log_format.contains("no-ansi"));

    if log_format.contains("json") {
        logger.json().init();
    } else if log_format.contains("pretty") {
        logger.pretty().init();
    } else if log_format.contains("compact") {
        logger.compact().init();
    } else {
        logger.init();
    }
}

/// Driver for the URL domain/dataset index: ingestion, index builds,
/// the query server, and operator inspection.
#[derive(Debug, Parser)]
#[command(name = "urlindex")]
struct Args {
    /// Path to the config YAML (§9)
    #[arg(short, long, value_parser, default_value = "urlindex.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest URLs (one per line) from `source` into dataset `name`
    Ingest {
        /// Dataset name, resolved to a `dataset_id` via the dataset registry
        name: String,
        /// Path to a newline-delimited file of raw URLs
        source: PathBuf,
    },
    /// Run the Index Builder
    Build {
        /// Reuse the previous version's artifacts where unchanged
        #[arg(long, action(clap::ArgAction::SetTrue))]
        incremental: bool,
    },
    /// Serve the query API and Prometheus metrics
    Serve {
        #[arg(short, long, value_parser, default_value_t = Ipv4Addr::UNSPECIFIED)]
        interface: Ipv4Addr,
        #[arg(short, long, value_parser, default_value_t = 8080)]
        port: u16,
        #[arg(long, value_parser, default_value_t = 9421)]
        metrics_port: u16,
    },
    /// Print manifest and dictionary summary, or resolve a single domain
    Inspect {
        /// Print the dictionary/membership/postings state for this domain
        domain: Option<String>,
    },
    /// Trim manifest versions beyond `version_retention_count`
    Gc {},
}

fn load_config(path: &PathBuf) -> Config {
    match Config::from_file(&path.display().to_string()) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(?error, path = %path.display(), "could not load configuration");
            process::exit(1);
        }
    }
}

fn run_ingest(config: &Config, name: &str, source: &PathBuf) {
    let registry = match DatasetRegistry::load(config.registry_path()) {
        Ok(r) => r,
        Err(error) => {
            tracing::error!(?error, "could not load dataset registry");
            process::exit(1);
        }
    };
    let dataset_id = match registry.resolve(name) {
        Ok(id) => id,
        Err(error) => {
            tracing::error!(?error, name, "could not assign dataset_id");
            process::exit(1);
        }
    };

    let file = match std::fs::File::open(source) {
        Ok(f) => f,
        Err(error) => {
            tracing::error!(?error, path = %source.display(), "could not open source file");
            process::exit(1);
        }
    };

    let columnar_root = PathBuf::from(config.columnar_root());
    let writer = Writer::new(
        &columnar_root,
        config.partition_buffer_size,
        config.global_buffer_limit,
        config.compression_level,
    );

    let mut accepted = 0u64;
    let mut rejected = 0u64;

    for line in BufReader::new(file).lines() {
        let Ok(raw) = line else { continue };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        match normalize::normalize(raw) {
            Ok(canonical) => {
                let key = PartitionKey {
                    dataset_id,
                    domain_prefix: identity::domain_prefix(&canonical.domain),
                };
                let row = RowRecord {
                    domain_id: DomainId(0),
                    url_id: identity::url_id(raw),
                    scheme: canonical.scheme,
                    host: canonical.host,
                    path_query: canonical.path_query,
                    domain: canonical.domain,
                };
                if let Err(error) = writer.write_row(key, row) {
                    tracing::error!(?error, "could not write row, aborting ingest");
                    process::exit(1);
                }
                accepted += 1;
            }
            Err(error) => {
                tracing::debug!(%error, url = raw, "rejected malformed url");
                rejected += 1;
            }
        }
    }

    if let Err(error) = writer.flush_all() {
        tracing::error!(?error, "could not flush partitions");
        process::exit(1);
    }

    tracing::info!(dataset = name, dataset_id = dataset_id.0, accepted, rejected, "ingest complete");
}

fn run_build(config: &Config, incremental: bool) {
    let result = if incremental {
        builder::incremental_build(config)
    } else {
        builder::full_build(config)
    };

    match result {
        Ok(report) => {
            tracing::info!(
                version = report.version,
                files_scanned = report.files_scanned,
                domains_added = report.domains_added,
                was_noop = report.was_noop,
                "build complete"
            );
        }
        Err(error) => {
            tracing::error!(?error, "build failed");
            process::exit(1);
        }
    }
}

async fn run_serve(config: Config, interface: Ipv4Addr, port: u16, metrics_port: u16) {
    let state = match AppState::open(config) {
        Ok(state) => Arc::new(state),
        Err(error) => {
            tracing::error!(?error, "could not load a published index version");
            process::exit(1);
        }
    };

    let app = urlindex_server::build_router(state);

    tracing::info!(%interface, port, "binding query API HTTP socket");
    let listener = match tokio::net::TcpListener::bind((interface, port)).await {
        Ok(l) => l,
        Err(error) => {
            tracing::error!(?error, "could not bind query API HTTP socket");
            process::exit(1);
        }
    };

    tracing::info!(%interface, port = metrics_port, "binding metrics HTTP socket");
    tokio::spawn(urlindex_server::metrics::serve_prometheus_endpoint_task(
        std::net::SocketAddr::from((interface, metrics_port)),
    ));

    if let Err(error) = axum::serve(listener, app).await {
        tracing::error!(?error, "query API server exited");
        process::exit(1);
    }
}

fn run_inspect(config: &Config, domain: Option<String>) {
    let manifest = match urlindex_core::manifest::load(&PathBuf::from(config.manifest_path())) {
        Ok(m) => m,
        Err(error) => {
            tracing::error!(?error, "could not load manifest");
            process::exit(1);
        }
    };

    let Some(artifacts) = manifest.current().cloned() else {
        tracing::warn!("manifest does not name a published version");
        return;
    };

    tracing::info!(
        version = artifacts.version,
        retained_versions = manifest.versions.len(),
        "current published version"
    );

    let Some(domain) = domain else { return };

    let loaded = match urlindex_core::query::LoadedVersion::open(config, artifacts) {
        Ok(v) => v,
        Err(error) => {
            tracing::error!(?error, "could not load version artifacts");
            process::exit(1);
        }
    };

    match urlindex_core::query::datasets_of(&loaded, &domain) {
        Ok(result) => {
            tracing::info!(
                domain = result.domain,
                domain_id = ?result.domain_id,
                dataset_count = result.datasets.len(),
                "resolved"
            );
        }
        Err(error) => {
            tracing::error!(?error, "could not resolve domain");
            process::exit(1);
        }
    }
}

/// Deletes version directories under `index_root` that the manifest no
/// longer references. `manifest::publish` only trims the document; this
/// is the disk-reclamation half of that contract.
fn run_gc(config: &Config) {
    let manifest_path = PathBuf::from(config.manifest_path());
    let manifest = match urlindex_core::manifest::load(&manifest_path) {
        Ok(m) => m,
        Err(error) => {
            tracing::error!(?error, "could not load manifest");
            process::exit(1);
        }
    };

    let live: HashSet<String> = manifest.versions.iter().map(|v| v.version.clone()).collect();
    let index_root = PathBuf::from(config.index_root());

    let entries = match std::fs::read_dir(&index_root) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("index root does not exist yet, nothing to collect");
            return;
        }
        Err(error) => {
            tracing::error!(?error, path = %index_root.display(), "could not list index root");
            process::exit(1);
        }
    };

    let mut removed = 0u64;
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else { continue };
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if live.contains(&name) {
            continue;
        }
        if let Err(error) = std::fs::remove_dir_all(entry.path()) {
            tracing::warn!(?error, version = name, "could not remove stale version directory");
            continue;
        }
        removed += 1;
    }

    tracing::info!(retained = live.len(), removed, "gc complete");
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    begin_logging();

    let config = load_config(&args.config);

    match args.command {
        Command::Ingest { name, source } => run_ingest(&config, &name, &source),
        Command::Build { incremental } => run_build(&config, incremental),
        Command::Serve { interface, port, metrics_port } => {
            run_serve(config, interface, port, metrics_port).await
        }
        Command::Inspect { domain } => run_inspect(&config, domain),
        Command::Gc {} => run_gc(&config),
    }
}
