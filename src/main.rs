use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use lookbook::{EncoderKind, Lookbook, LookbookConfig, QueryMode, SearchResponse};
use lookbook_core::cluster::distinct_count;
use lookbook_core::{ClusterIndex, KMeans};
use lookbook_similarity::BuildArtifact;
use lookbook_storage::{load_aesthetics, load_catalog, SnapshotManager};
use serde_json::json;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Match fashion queries and aesthetics against a clothing catalog
#[derive(Parser, Debug)]
#[command(name = "lookbook")]
#[command(about = "Embedding-based fashion retrieval", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Text encoder
    #[arg(long, value_enum)]
    encoder: Option<EncoderKind>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build an index from CSV files and save it as a snapshot
    Build {
        /// Catalog CSV (image,description,features[,id])
        #[arg(long)]
        catalog: PathBuf,

        /// Aesthetics CSV (Aesthetic,Key motifs,Key colours)
        #[arg(long)]
        aesthetics: PathBuf,

        /// Number of catalog clusters
        #[arg(short = 'k', long)]
        clusters: Option<usize>,

        /// Also cluster the aesthetic profiles into this many groups
        #[arg(long)]
        aesthetic_clusters: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Rank catalog items against a free-text query
    Search {
        query: String,

        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,

        /// Snapshot to serve; the newest when omitted
        #[arg(long)]
        snapshot: Option<String>,
    },

    /// Rank catalog items against a named aesthetic
    Aesthetic {
        name: String,

        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,

        #[arg(long)]
        snapshot: Option<String>,
    },

    /// Print cluster sizes and inertia for a snapshot
    Clusters {
        #[arg(long)]
        snapshot: Option<String>,

        /// Also print inertia for every k from 1 to this value
        #[arg(long)]
        elbow: Option<usize>,

        /// Also list the item ids in each cluster
        #[arg(long)]
        members: bool,
    },

    /// Manage saved snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand, Debug)]
enum SnapshotAction {
    /// List snapshots, newest first
    List,
    /// Delete a snapshot
    Delete { name: String },
}

fn load_config(args: &Args) -> anyhow::Result<LookbookConfig> {
    let mut config = match &args.config {
        Some(path) => LookbookConfig::load(path)?,
        None => LookbookConfig::default(),
    };
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(encoder) = args.encoder {
        config.encoder = encoder;
    }
    Ok(config)
}

fn open_artifact(manager: &SnapshotManager, name: Option<&str>) -> anyhow::Result<BuildArtifact> {
    match name {
        Some(name) => manager.load_artifact(name),
        None => match manager.load_latest()? {
            Some((description, snapshot)) => {
                info!("Serving snapshot {}", description.name);
                snapshot.into_artifact()
            }
            None => bail!(
                "no snapshots in {}; run `lookbook build` first",
                manager.dir().display()
            ),
        },
    }
}

fn serve(config: &LookbookConfig, snapshot: Option<&str>) -> anyhow::Result<Lookbook> {
    let manager = SnapshotManager::new(config.snapshot_dir())?;
    let artifact = open_artifact(&manager, snapshot)?;
    let service = Lookbook::new(config, config.encoder()?)?;
    service.install(artifact)?;
    Ok(service)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(&args)?;
    info!("lookbook v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", config.data_dir);

    match args.command {
        Command::Build {
            catalog,
            aesthetics,
            clusters,
            aesthetic_clusters,
            seed,
        } => {
            if let Some(k) = clusters {
                config.catalog_clusters = k;
            }
            if aesthetic_clusters.is_some() {
                config.aesthetic_clusters = aesthetic_clusters;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            config.validate()?;

            let records = load_catalog(&catalog)?;
            let aesthetics = load_aesthetics(&aesthetics)?;
            info!("Loaded {} catalog items and {} aesthetics", records.len(), aesthetics.len());

            let service = Lookbook::new(&config, config.encoder()?)?;
            let artifact = service.build(records, aesthetics).await?;

            let manager = SnapshotManager::new(config.snapshot_dir())?;
            let snapshot = manager.save(&artifact).context("failed to save snapshot")?;

            print_json(&json!({
                "snapshot": snapshot,
                "encoder": artifact.info().encoder,
                "dim": artifact.dim(),
                "items": artifact.len(),
                "aesthetics": artifact.aesthetics().len(),
                "clusters": artifact.item_clusters().k(),
                "cluster_sizes": artifact.item_clusters().cluster_sizes(),
                "inertia": artifact.item_clusters().inertia(),
            }))?;
        }

        Command::Search {
            query,
            top_k,
            snapshot,
        } => {
            config.validate()?;
            let service = serve(&config, snapshot.as_deref())?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown signal received");
                    on_signal.cancel();
                }
            });

            let hits = service.search_by_text(&query, top_k, &cancel).await?;
            let candidates = service.engine()?.artifact().len();
            print_json(&SearchResponse::new(QueryMode::Text, query, hits, candidates))?;
        }

        Command::Aesthetic {
            name,
            top_k,
            snapshot,
        } => {
            config.validate()?;
            let service = serve(&config, snapshot.as_deref())?;
            let engine = service.engine()?;
            if engine.artifact().aesthetic(&name).is_none() {
                let known: Vec<&str> = engine.artifact().aesthetics().iter().map(|a| a.name.as_str()).collect();
                info!("Known aesthetics: {}", known.join(", "));
            }

            let hits = service.search_by_aesthetic(&name, top_k)?;
            print_json(&SearchResponse::new(QueryMode::Aesthetic, name, hits, engine.artifact().len()))?;
        }

        Command::Clusters {
            snapshot,
            elbow,
            members,
        } => {
            let manager = SnapshotManager::new(config.snapshot_dir())?;
            let artifact = open_artifact(&manager, snapshot.as_deref())?;
            let clusters = artifact.item_clusters();

            let elbow = match elbow {
                Some(max_k) => {
                    let max_k = max_k.min(distinct_count(artifact.items().vectors()));
                    ClusterIndex::elbow(artifact.items(), 1..=max_k, clusters.seed(), &KMeans::default())?
                }
                None => Vec::new(),
            };
            let members = members.then(|| {
                let ids = artifact.items().ids();
                (0..clusters.k())
                    .map(|c| clusters.members(c).into_iter().map(|i| &ids[i]).collect::<Vec<_>>())
                    .collect::<Vec<_>>()
            });

            print_json(&json!({
                "k": clusters.k(),
                "seed": clusters.seed(),
                "inertia": clusters.inertia(),
                "cluster_sizes": clusters.cluster_sizes(),
                "aesthetic_cluster_sizes": artifact.aesthetic_clusters().map(|c| c.cluster_sizes().to_vec()),
                "elbow": elbow
                    .iter()
                    .map(|(k, inertia)| json!({ "k": k, "inertia": inertia }))
                    .collect::<Vec<_>>(),
                "members": members,
            }))?;
        }

        Command::Snapshots { action } => {
            let manager = SnapshotManager::new(config.snapshot_dir())?;
            match action {
                SnapshotAction::List => print_json(&manager.list()?)?,
                SnapshotAction::Delete { name } => {
                    if !manager.delete(&name)? {
                        bail!("snapshot '{}' not found", name);
                    }
                    info!("Deleted {}", name);
                }
            }
        }
    }

    Ok(())
}
