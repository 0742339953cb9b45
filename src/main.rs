use tracing_subscriber::EnvFilter;

use modcal::storage::Config;

mod cli;
mod session;

use cli::{cli_mode_from_env, USAGE};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let config = match Config::load_or_create() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            tracing::error!("Falling back to default config: {}", e);
            Config::default()
        }
    };

    let mode = match cli_mode_from_env() {
        Ok(mode) => mode,
        Err(err) => {
            eprintln!("Error: {}", err);
            println!("{}", USAGE);
            return Ok(());
        }
    };

    if let Err(e) = cli::run(mode, &config).await {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

fn setup_logging() {
    let log_dir = Config::config_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "modcal.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    std::mem::forget(_guard);

    tracing::info!("modcal started");
}
