use clap::{Parser, Subcommand};
use messenger::event::MessagingEvent;
use messenger::webhook::{self, WebhookServer};
use std::io::Read;
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "messenger")]
#[command(about = "Messenger webhook receiver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: MESSENGER_CONFIG_PATH or ~/.messenger/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the webhook endpoint. Classified events are printed to stdout as JSON lines.
    Serve {
        /// Config file path (default: MESSENGER_CONFIG_PATH or ~/.messenger/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from config or 8080)
        #[arg(long, short)]
        port: Option<u16>,

        /// Verification secret (overrides webhook.verifyToken)
        #[arg(long, value_name = "TOKEN")]
        verify_token: Option<String>,
    },

    /// Decode a webhook payload and print the category of each dispatched event.
    Classify {
        /// JSON payload file; reads stdin when omitted.
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("messenger {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve {
            config,
            port,
            verify_token,
        }) => {
            if let Err(e) = run_serve(config, port, verify_token).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Classify { file }) => {
            if let Err(e) = run_classify(file) {
                log::error!("classify failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(messenger::config::default_config_path);
    let dir = messenger::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    verify_token: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, _path) = messenger::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    if let Some(t) = verify_token {
        config.webhook.verify_token = Some(t);
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<MessagingEvent>();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("{}", event_line(&event));
        }
    });

    log::info!("starting webhook on {}:{}", config.server.bind, config.server.port);
    webhook::run_server(config, event_tx).await
}

fn run_classify(file: Option<PathBuf>) -> anyhow::Result<()> {
    use anyhow::Context;

    let body = match file {
        Some(path) => std::fs::read(&path)
            .with_context(|| format!("reading payload from {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading payload from stdin")?;
            buf
        }
    };
    let event = webhook::decode_event(&body)?;
    // Same entry handling as the live endpoint; the token is never checked here.
    let printer = WebhookServer::new("", |event: MessagingEvent| println!("{}", event_line(&event)));
    let n = printer.dispatch(event);
    log::info!("classified {} event(s)", n);
    Ok(())
}

/// One JSON line per event: category, sender, UTC time, and the raw event.
fn event_line(event: &MessagingEvent) -> serde_json::Value {
    serde_json::json!({
        "category": event.category,
        "sender": event.sender.id,
        "time": event.timestamp_utc().map(|t| t.to_rfc3339()),
        "event": event,
    })
}
