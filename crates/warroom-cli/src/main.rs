use anyhow::{anyhow, bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warroom_sync::dashboard::{blocker_view, network_view, pipeline_view};
use warroom_sync::{
    group_by_status, BlockerStatus, BoardStatus, CollectionRef, Direction, Entity, InMemoryStore,
    OrderedCollectionView, PipelineStage, SortKey, SortKeys, SortMode, StoreValue, SyncClient,
    SyncConfig, ViewSettings,
};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Command::new("warroom")
        .version(warroom_sync::VERSION)
        .about("War Room live collection viewer")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("board")
                .about("Load seed documents and print one board")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file mapping collection -> document id -> fields"),
                )
                .arg(
                    Arg::new("preset")
                        .long("preset")
                        .default_value("blockers")
                        .help("Preset query to open"),
                )
                .arg(
                    Arg::new("search")
                        .long("search")
                        .help("Case-insensitive text filter"),
                )
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .default_value("none")
                        .value_parser(["none", "primary", "secondary"])
                        .help("Client sort toggle state"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration with extra presets"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the projected entities as JSON"),
                ),
        )
        .subcommand(
            Command::new("presets")
                .about("List preset queries")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration with extra presets"),
                ),
        );

    let matches = cli.get_matches();
    init_logging(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("board", args)) => run_board(args).await,
        Some(("presets", args)) => {
            let config = load_config(args.get_one::<PathBuf>("config"))?;
            for (name, preset) in &config.presets {
                let order = preset
                    .query
                    .order_by_field
                    .as_deref()
                    .map(|field| format!(" by {} {:?}", field, preset.query.direction))
                    .unwrap_or_default();
                let limit = preset
                    .query
                    .limit
                    .map(|n| format!(" limit {}", n))
                    .unwrap_or_default();
                println!("{:<10} {}{}{}", name, preset.collection, order, limit);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    // stdout carries the board
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    let _ = result;
}

async fn run_board(args: &ArgMatches) -> Result<()> {
    let seed = args
        .get_one::<PathBuf>("seed")
        .ok_or_else(|| anyhow!("--seed is required"))?;
    let preset = args
        .get_one::<String>("preset")
        .map_or("blockers", String::as_str);
    let sort = parse_sort(args.get_one::<String>("sort").map_or("none", String::as_str))?;
    let config = load_config(args.get_one::<PathBuf>("config"))?;

    let store = Arc::new(InMemoryStore::new());
    let seeded = load_seed(seed, &store)?;
    tracing::info!("Seeded {} documents from {}", seeded, seed.display());

    let mut settings = board_view(preset).unwrap_or_else(|| fallback_view(&config, preset));
    if let Some(query) = args.get_one::<String>("search") {
        settings = settings.with_query(query.clone());
    }
    settings = settings.with_sort(sort);

    let client = SyncClient::with_config(store, config);
    let view = first_snapshot(&client, preset).await?;
    let projected = settings.project(&view);

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&projected)?);
        return Ok(());
    }

    match preset {
        "blockers" => print!("{}", render_board::<BlockerStatus>(&projected, "status", "title")),
        "pipeline" => print!("{}", render_board::<PipelineStage>(&projected, "stage", "projectTitle")),
        _ => print!("{}", render_list(&projected)),
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<SyncConfig> {
    match path {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(SyncConfig::default()),
    }
}

fn parse_sort(value: &str) -> Result<SortMode> {
    match value {
        "none" => Ok(SortMode::None),
        "primary" => Ok(SortMode::Primary),
        "secondary" => Ok(SortMode::Secondary),
        other => bail!("unknown sort mode '{}'", other),
    }
}

/// Seed the store from `{ collection: { id: { field: value } } }`
fn load_seed(path: &Path, store: &InMemoryStore) -> Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing seed file {}", path.display()))?;

    let collections = json
        .as_object()
        .ok_or_else(|| anyhow!("seed root must be an object of collections"))?;

    let mut count = 0;
    for (collection, documents) in collections {
        let documents = documents
            .as_object()
            .ok_or_else(|| anyhow!("collection '{}' must be an object of documents", collection))?;
        for (id, fields) in documents {
            let fields = StoreValue::fields_from_json(fields.clone())
                .ok_or_else(|| anyhow!("document '{}/{}' must be an object", collection, id))?;
            store.insert(CollectionRef::new(collection.as_str()), id.as_str(), fields);
            count += 1;
        }
    }
    Ok(count)
}

/// Open `preset`, wait for its first view and close the handle
async fn first_snapshot(client: &SyncClient, preset: &str) -> Result<Arc<OrderedCollectionView>> {
    let handle = client.open_named(preset)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on_snapshot(handle, move |update| {
        let _ = tx.send(update.result);
    })?;

    let received = tokio::time::timeout(SNAPSHOT_TIMEOUT, rx.recv()).await;
    client.close(handle);

    let result = received
        .context("timed out waiting for the first snapshot")?
        .ok_or_else(|| anyhow!("handle closed before the first snapshot"))?;
    Ok(result?)
}

fn board_view(preset: &str) -> Option<ViewSettings> {
    match preset {
        "blockers" => Some(blocker_view()),
        "pipeline" => Some(pipeline_view()),
        "network" => Some(network_view()),
        _ => None,
    }
}

/// Search nothing; toggle on the preset's own order field
fn fallback_view(config: &SyncConfig, preset: &str) -> ViewSettings {
    let field = config
        .preset(preset)
        .and_then(|p| p.query.order_by_field.clone())
        .unwrap_or_else(|| "name".to_string());
    ViewSettings::new(
        &[],
        SortKeys {
            primary: SortKey::new(field.clone(), Direction::Asc),
            secondary: SortKey::new(field, Direction::Desc),
        },
    )
}

fn render_board<S: BoardStatus>(entities: &[Entity], status_field: &str, title_field: &str) -> String {
    let board = group_by_status::<S>(entities, status_field);
    let mut out = String::new();
    for (bucket, members) in board.columns() {
        let _ = writeln!(out, "== {} ({})", bucket.label(), members.len());
        for entity in members {
            let title = entity.str_field(title_field).unwrap_or("-");
            let _ = writeln!(out, "  {:<28} {}", entity.id, title);
        }
    }
    out
}

fn render_list(entities: &[Entity]) -> String {
    let mut out = String::new();
    for entity in entities {
        let fields = serde_json::to_string(&entity.fields).unwrap_or_default();
        let _ = writeln!(out, "{:<28} {}", entity.id, fields);
    }
    out
}
