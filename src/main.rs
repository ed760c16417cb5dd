//! atlas-watch binary entry point

use std::{io::Write, path::Path};

use atlas_watch::{
    cli::{Cli, Commands},
    client::{WatchClient, WatchRequest},
    config::{Config, Settings},
    watch::{change_stream, ChangeStream},
};
use color_eyre::{
    eyre::{bail, WrapErr},
    Result,
};
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Install error handler
    color_eyre::install()?;
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up logging; stdout is reserved for events
    let filter = if cli.verbose {
        EnvFilter::new("atlas_watch=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Handle commands
    match cli.command {
        Commands::Tail {
            database,
            collection,
            ids,
            filter,
            app_id,
            base_url,
        } => {
            let mut settings = load_config(cli.config.as_deref())?.settings;
            if let Some(app_id) = app_id {
                settings.app_id = app_id;
            }
            if let Some(base_url) = base_url {
                settings.base_url = base_url;
            }

            let mut request = WatchRequest::new(database, collection);
            if !ids.is_empty() {
                request = request.with_ids(ids);
            } else if let Some(filter) = filter {
                request = request.with_filter(filter);
            }

            let client = WatchClient::new(settings)?;
            let events = client.watch(&request).await?;
            print_events(events).await?;
        }
        Commands::Decode { file } => {
            let events: ChangeStream = match file.filter(|path| path != Path::new("-")) {
                Some(path) => {
                    let capture = tokio::fs::File::open(&path)
                        .await
                        .wrap_err_with(|| format!("failed to open {}", path.display()))?;
                    change_stream(ReaderStream::new(capture))
                }
                None => change_stream(ReaderStream::new(tokio::io::stdin())),
            };
            print_events(events).await?;
        }
        Commands::Config { show, init } => {
            let global = cli.config.clone().unwrap_or_else(Config::global_config_path);
            if init {
                if global.exists() {
                    bail!("{} already exists", global.display());
                }
                let mut settings = Settings::default();
                settings.apply_env(|key| std::env::var(key).ok());
                settings.save_to_path(&global)?;
                println!("wrote {}", global.display());
            }
            println!("global:  {}", global.display());
            println!("project: {}", Config::project_config_path().display());
            if show {
                let config = load_config(cli.config.as_deref())?;
                println!("{}", serde_json::to_string_pretty(&config.settings.redacted())?);
            }
        }
        Commands::Version => {
            println!("atlas-watch version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn load_config(global: Option<&Path>) -> atlas_watch::Result<Config> {
    match global {
        Some(path) => Config::load_from(path, &Config::project_config_path()),
        None => Config::load(),
    }
}

/// Print events as JSON lines until the stream ends or fails
async fn print_events(mut events: ChangeStream) -> Result<()> {
    let mut count = 0usize;
    while let Some(event) = events.next().await {
        let event = event.wrap_err_with(|| format!("change stream failed after {count} events"))?;
        writeln!(std::io::stdout().lock(), "{}", serde_json::to_string(&event)?)?;
        count += 1;
    }
    Ok(())
}
