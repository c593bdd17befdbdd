use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use webp_batch::{config, server};

#[derive(Parser)]
#[command(name = "webp-batch")]
#[command(about = "Batch image to WebP conversion service")]
#[command(long_about = "\
Batch image to WebP conversion service

Serves POST /api/convert. Send a multipart/form-data body with one or more
`files` parts (PNG, JPEG or WebP) and an optional `quality` field (1-100,
default 80). The response carries every converted file, every failure, and a
ZIP archive of all converted files, base64-encoded.

Run 'webp-batch --print-config' for a documented config.toml.")]
#[command(version = env!("WEBP_BATCH_VERSION"))]
struct Cli {
    /// Config file (stock defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overrides server.bind
    #[arg(long)]
    bind: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Print a stock config.toml with all options documented, then exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    init_tracing(cli.log_json);

    let mut service_config = config::load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        service_config.server.bind = bind;
        service_config.validate()?;
    }

    let addr: SocketAddr = service_config.server.bind.parse()?;
    let app = server::router(&service_config)?;
    let listener = TcpListener::bind(addr).await?;
    info!(
        %addr,
        workers = config::effective_workers(&service_config.conversion),
        default_quality = service_config.conversion.default_quality,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_on(tokio::signal::ctrl_c()))
        .await?;
    Ok(())
}

/// `RUST_LOG` wins; otherwise `info`.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
