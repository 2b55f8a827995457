use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "linegpt")]
#[command(about = "LINE webhook bridge to OpenAI chat completions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook server. Register the /callback URL as the webhook in
    /// the LINE developer console; tokens come from config or environment
    /// (CHANNEL_ACCESS_TOKEN, CHANNEL_SECRET, OPENAI_API_KEY).
    Serve {
        /// Config file path (default: LINEGPT_CONFIG_PATH or ~/.linegpt/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP listen port (default from PORT env, config, or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("linegpt {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut config = lib::config::load_config(config_path)?;
    config.server.port = port.unwrap_or_else(|| lib::config::resolve_port(&config));
    lib::server::run_server(config).await
}
