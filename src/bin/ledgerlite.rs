use clap::{Parser, Subcommand};
use ledgerlite::cli::{self as prog_cli, Command, OutputMode};
use ledgerlite::config::StoreConfig;
use ledgerlite::{Store, logger};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ledgerlite", version, about = "LedgerLite document store CLI", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). If omitted, the standard locations are searched.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Override the data directory. Takes precedence over config/env.")]
    data_dir: Option<PathBuf>,
    #[arg(long, help = "Print results as JSON")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Open the store, creating and seeding collections as needed")]
    Init,
    #[command(about = "Find documents matching a query; prints NDJSON")]
    Get {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(default_value = "{}", help = "Query JSON (e.g. {\"id\": \"C1\"})")]
        query: String,
    },
    #[command(name = "get-one", about = "Print the first document matching a query")]
    GetOne {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(default_value = "{}", help = "Query JSON")]
        query: String,
    },
    #[command(about = "Insert a document; prints it with its assigned _id")]
    Insert {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Document JSON; use - to read from stdin")]
        json: String,
    },
    #[command(about = "Apply a patch to the first (or every) matching document")]
    Update {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Query JSON")]
        query: String,
        #[arg(help = "Patch JSON: a replacement document or {\"$set\": {...}}")]
        patch: String,
        #[arg(long, help = "Update every match, not just the first")]
        multi: bool,
        #[arg(long, help = "Insert a document when nothing matches")]
        upsert: bool,
    },
    #[command(about = "Remove the first (or every) matching document")]
    Remove {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Query JSON")]
        query: String,
        #[arg(long, help = "Remove every match, not just the first")]
        multi: bool,
    },
    #[command(about = "Count documents matching a query")]
    Count {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(default_value = "{}", help = "Query JSON")]
        query: String,
    },
    #[command(about = "Read a dataset through the fallback chain (store, cache, legacy collections)")]
    Recover {
        #[arg(help = "Dataset name or alias (e.g. payables)")]
        dataset: String,
    },
    #[command(about = "Destructively wipe every dataset, its aliases and cached copies")]
    Clean {
        #[arg(long, help = "Required: confirm the wipe")]
        yes: bool,
    },
    #[command(about = "Rewrite every datafile down to its live documents")]
    Compact,
    #[command(subcommand, about = "Inspect or edit the secondary cache")]
    Cache(CacheCommands),
    #[command(about = "Answer JSON bridge requests, one per stdin line, until EOF")]
    Serve,
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    Get { key: String },
    Set { key: String, value: String },
    Remove { key: String },
    List,
}

fn read_payload(arg: String) -> Result<String, Box<dyn std::error::Error>> {
    if arg != "-" {
        return Ok(arg);
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn load_config(cli: &Cli) -> Result<StoreConfig, Box<dyn std::error::Error>> {
    // Precedence: CLI > env > config files > defaults
    let mut cfg = StoreConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        cfg.data_dir = dir.clone();
    }
    Ok(cfg)
}

fn to_command(cmd: Commands) -> Result<Command, Box<dyn std::error::Error>> {
    Ok(match cmd {
        Commands::Serve => return Err("serve is not a one-shot command".into()),
        Commands::Init => Command::Init,
        Commands::Get { collection, query } => Command::Get { collection, query_json: query },
        Commands::GetOne { collection, query } => Command::GetOne { collection, query_json: query },
        Commands::Insert { collection, json } => Command::Insert { collection, json: read_payload(json)? },
        Commands::Update { collection, query, patch, multi, upsert } => {
            Command::Update { collection, query_json: query, patch_json: patch, multi, upsert }
        }
        Commands::Remove { collection, query, multi } => {
            Command::Remove { collection, query_json: query, multi }
        }
        Commands::Count { collection, query } => Command::Count { collection, query_json: query },
        Commands::Recover { dataset } => Command::Recover { dataset },
        Commands::Clean { yes } => {
            if !yes {
                return Err("clean wipes every dataset; pass --yes to confirm".into());
            }
            Command::Clean
        }
        Commands::Compact => Command::Compact,
        Commands::Cache(CacheCommands::Get { key }) => Command::CacheGet { key },
        Commands::Cache(CacheCommands::Set { key, value }) => {
            Command::CacheSet { key, value: read_payload(value)? }
        }
        Commands::Cache(CacheCommands::Remove { key }) => Command::CacheRemove { key },
        Commands::Cache(CacheCommands::List) => Command::CacheList,
    })
}

fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = load_config(&cli)?;
    if let Some(path) = &cfg.log_config {
        logger::init_file(path)?;
    } else if let Some(dir) = &cfg.log_dir {
        logger::configure_logging(Some(dir), cfg.log_level.as_deref(), None)?;
    } else {
        logger::configure_from_env();
    }
    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if matches!(cli.command, Commands::Serve) {
        let store = Store::open(cfg)?;
        let stdin = std::io::stdin();
        let served = prog_cli::serve_lines(&store, &mut stdin.lock(), &mut out)?;
        log::info!("served {served} bridge request(s)");
        return Ok(());
    }
    let command = to_command(cli.command)?;
    let store = Store::open(cfg)?;
    prog_cli::run(&store, command, mode, &mut out)
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = execute(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
