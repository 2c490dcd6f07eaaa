use clap::Parser;
use colored::Colorize;

use statehouse_server::config::{Cli, ServerConfig};
use statehouse_server::error::ServerError;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match ServerConfig::from_cli(cli) {
        Ok(config) => statehouse_server::run(config).await,
        Err(e) => Err(ServerError::from(e)),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
