use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use geokeeper::cli::{Cli, Commands, ConfigCommands};
use geokeeper::config::StaticConfig;
use geokeeper::runtime::modes;
use geokeeper::system::init_logging;

/// 加载配置并初始化日志；guard 需要保持到进程结束
fn bootstrap(config_path: Option<&str>) -> Result<(StaticConfig, WorkerGuard)> {
    let config = StaticConfig::load(config_path).inspect_err(|e| {
        eprintln!("{}", e.format_colored());
    })?;
    let guard = init_logging(&config.logging)?;
    Ok((config, guard))
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Config {
            action: ConfigCommands::Generate { output },
        } => modes::cli::run_config_generate(output.as_deref()),
        Commands::Serve => {
            let (config, _guard) = bootstrap(config_path)?;
            modes::run_server(config).await
        }
        Commands::Download { names } => {
            let (config, _guard) = bootstrap(config_path)?;
            modes::cli::run_download(&config, names).await
        }
        Commands::Lookup { ip } => {
            let (config, _guard) = bootstrap(config_path)?;
            modes::cli::run_lookup(&config, ip).await
        }
    }
}
