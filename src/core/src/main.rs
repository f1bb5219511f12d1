use clap::{Parser, Subcommand};
use log::{error, info};
use panima::configuration::config::Config;
use panima::controller::controller_handler::Controller;
use panima::data_capture::types::FilterSet;
use panima::web_interface::WebServer;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "panima")]
#[command(version = "0.1.0")]
#[command(about = "Captures page traffic and resources into a single archive")]
struct Args {
    /// TOML configuration file
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control surface (default)
    Serve,
    /// Capture once over the replay log, write the archive and exit
    Capture {
        /// Comma separated filters: js,css,html,image,video,packets,other
        #[arg(long, default_value = "")]
        filters: String,
        /// How long the capture stays active
        #[arg(long, default_value_t = 2)]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    println!(
        "
==============================================================================
                         panima network capture v0.1.0
==============================================================================
"
    );

    let args = Args::parse();

    let config = match &args.config_file {
        Some(path) => {
            info!("Importing configuration from {}", path.display());
            Config::from_file(path).unwrap_or_else(|e| {
                error!("Unable to import configuration from file: {}", e);
                std::process::exit(1);
            })
        }
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    let (controller, handle) = Controller::from_config(config.clone()).unwrap_or_else(|e| {
        error!("Unable to create a controller instance: {}, exiting...", e);
        std::process::exit(1);
    });
    let controller_task = tokio::spawn(controller.run());

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let addr = config.control_addr().unwrap_or_else(|e| {
                error!("{}", e);
                std::process::exit(1);
            });
            let server = WebServer::new(handle, config.default_filters);
            if let Err(e) = server.start(addr).await {
                error!("{}", e);
                std::process::exit(1);
            }
        }
        Command::Capture { filters, seconds } => {
            let filters = if filters.trim().is_empty() {
                config.default_filters
            } else {
                filters.parse::<FilterSet>().unwrap_or_else(|e| {
                    error!("{}", e);
                    std::process::exit(2);
                })
            };

            if let Err(e) = handle.start(filters).await {
                error!("Start failed: {}", e);
                std::process::exit(1);
            }
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            match handle.stop().await {
                Ok(report) => info!(
                    "Wrote {} ({} entries)",
                    report.path.display(),
                    report.entries
                ),
                Err(e) => {
                    error!("Stop failed: {}", e);
                    std::process::exit(1);
                }
            }
            drop(handle);
        }
    }

    if let Err(e) = controller_task.await {
        error!("Error joining at the end of execution: {:?}", e);
        std::process::exit(1);
    }
}
