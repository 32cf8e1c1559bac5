use callbridge::{
    config::{self, BridgeConfig},
    BridgeError, StreamAdapter,
};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug mode
    #[arg(short, long)]
    verbose: bool,

    /// Exit once every result arrived instead of waiting for Enter
    #[arg(long)]
    no_wait: bool,

    /// Payloads to submit, one request each
    #[arg(default_values = ["foo", "bar", "baz"])]
    payloads: Vec<String>,
}

fn write_result(payload: &str, result: bool) {
    let result = if result { "true " } else { "false" };
    println!("write_result {} {}", result, payload);
}

async fn run(cli: &Cli) -> Result<(), BridgeError> {
    let config: BridgeConfig = match &cli.config {
        Some(path) => config::from_file(path)?,
        None => BridgeConfig::default(),
    };

    info!("config loaded.");
    debug!("config: {:?}", config);

    let adapter = StreamAdapter::new(&config)?;

    let mut handles = Vec::with_capacity(cli.payloads.len());
    for payload in &cli.payloads {
        let view = adapter.request(Some(payload))?;
        let payload = payload.clone();
        handles.push(view.subscribe_with(move |result| write_result(&payload, result)));
    }

    if cli.no_wait {
        for handle in handles {
            handle
                .await
                .map_err(|e| BridgeError::Internal(format!("Subscriber task failed: {}", e)))?;
        }
    } else {
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| BridgeError::Internal(format!("Failed to read stdin: {}", e)))?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
