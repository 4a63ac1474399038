use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use websift_local::config::{load_env_file, Config};

mod mcp;

#[derive(Parser, Debug)]
#[command(name = "websift")]
#[command(
    about = "Web search, paginated page text and YouTube transcripts as MCP tools",
    long_about = None
)]
struct Cli {
    /// MCP transport to serve.
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,
    /// Bind address for `--transport http`.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port for `--transport http`.
    #[arg(long, env = "WEBSIFT_PORT", default_value_t = 3090)]
    port: u16,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    Stdio,
    /// Streamable HTTP at `/mcp`.
    Http,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the effective configuration and local tool availability (json; no secrets).
    Doctor(OutputArgs),
    /// Print version info.
    Version(OutputArgs),
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    // stdout belongs to the stdio transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn doctor(cfg: &Config, args: &OutputArgs) {
    let t0 = std::time::Instant::now();
    let ytdlp_path = websift_local::shellout::which(&cfg.youtube.ytdlp_bin);
    let stt_configured = cfg.stt.api_key.is_some();
    let checks = serde_json::json!([
        {
            "name": "yt_dlp",
            "ok": ytdlp_path.is_some(),
            "path": ytdlp_path.as_ref().map(|p| p.display().to_string()),
        },
        {
            "name": "stt_api_key",
            "ok": stt_configured,
        },
    ]);
    let payload = serde_json::json!({
        "schema_version": mcp::SCHEMA_VERSION,
        "kind": "doctor",
        "ok": true,
        "name": "websift",
        "version": env!("CARGO_PKG_VERSION"),
        "config": cfg,
        "configured": { "stt_api_key": stt_configured },
        "checks": checks,
        "elapsed_ms": t0.elapsed().as_millis(),
    });
    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            println!("websift {}", env!("CARGO_PKG_VERSION"));
            println!("searxng_host: {}", cfg.searxng_host);
            println!("chunk_size: {}", cfg.chunk_size);
            println!(
                "yt-dlp: {}",
                ytdlp_path
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "not found".to_string())
            );
            println!("stt_api_key: {}", if stt_configured { "set" } else { "unset" });
        }
        _ => println!("{payload}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Optional env file; never overrides the process environment.
    if let Ok(p) = std::env::var("WEBSIFT_ENV_FILE") {
        let p = p.trim();
        if !p.is_empty() {
            load_env_file(std::path::Path::new(p))
                .map_err(|e| anyhow::anyhow!("failed to read WEBSIFT_ENV_FILE {p}: {e}"))?;
        }
    }

    let cli = Cli::parse();
    let cfg = Config::from_env();

    match cli.command {
        Some(Commands::Version(args)) => {
            let v = serde_json::json!({
                "schema_version": mcp::SCHEMA_VERSION,
                "kind": "version",
                "ok": true,
                "name": "websift",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("websift {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
            return Ok(());
        }
        Some(Commands::Doctor(args)) => {
            doctor(&cfg, &args);
            return Ok(());
        }
        None => {}
    }

    init_tracing();
    tracing::info!(
        transport = ?cli.transport,
        searxng = %cfg.searxng_host,
        chunk_size = cfg.chunk_size,
        "starting websift"
    );
    let svc = mcp::WebsiftMcp::from_config(cfg)?;
    match cli.transport {
        Transport::Stdio => mcp::serve_stdio(svc).await,
        Transport::Http => mcp::serve_http(svc, &cli.host, cli.port).await,
    }
}
