use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use deployhook::comms::webhook_api;
use deployhook::config::Config;
use deployhook::utils;

#[derive(Parser)]
#[command(name = "deployhook", version, about = "Webhook deployment dispatcher")]
struct AppCli {
    /// Run in daemon mode (background)
    #[arg(long)]
    daemon: bool,

    /// Config file path
    #[arg(short, long, default_value = "config.json", global = true)]
    config: String,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook HTTP server
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn run_daemon() -> Result<()> {
    use daemonize::Daemonize;
    let daemonize = Daemonize::new()
        .pid_file("deployhook.pid")
        .working_directory(".")
        .umask(0o027)
        .privileged_action(|| {
            info!("daemon started");
        });

    daemonize.start().map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init();

    let args = AppCli::parse();
    if args.daemon {
        run_daemon()?;
    }

    let port = match args.command {
        Some(Commands::Serve { port }) => port,
        None => 8080,
    };

    let config = Config::from_file(&args.config)?;
    info!("Starting webhook server on port {port}");
    webhook_api::serve(config, port).await?;

    Ok(())
}
