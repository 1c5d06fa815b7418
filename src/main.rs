use anyhow::{Context, Result};
use pointstore::cli::{self, USAGE};
use pointstore::core::config::Config;
use pointstore::core::tracing_init::init_tracing;
use pointstore::persist::persister::Persister;
use pointstore::persist::storage::{FileStorage, StateStorage};
use pointstore::stores::auth_store::AuthStore;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if matches!(args.first().map(String::as_str), Some("-h" | "--help" | "help")) {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    let invocation = match cli::parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    match run(invocation) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::from_file(path).context(format!(
            "Failed to load configuration from '{}'",
            path.display()
        )),
        None => {
            let default_path = PathBuf::from("config.toml");
            if default_path.exists() {
                Config::from_file(&default_path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn run(invocation: cli::Invocation) -> Result<()> {
    let config = load_config(invocation.config_path.as_deref())?;

    init_tracing(&config.logging);

    let storage = FileStorage::new(&config.storage.dir).context(format!(
        "Failed to open storage directory '{}'",
        config.storage.dir.display()
    ))?;

    info!(
        storage_dir = %storage.dir().display(),
        key = %config.storage.key,
        version = config.storage.version,
        "Storage opened"
    );

    let storage: Arc<dyn StateStorage> = Arc::new(storage);
    let mut persister = Persister::new(storage, config.persist_options());
    let mut store = AuthStore::new();

    let hydration = persister
        .hydrate(&mut store)
        .context("Failed to load persisted state")?;
    debug!(outcome = ?hydration, "Hydration finished");

    persister.attach(&mut store);

    let output = cli::run(invocation.command, &mut store, &persister)?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
