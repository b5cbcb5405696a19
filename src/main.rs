use dexsim::{
    config::{AppConfig, DEFAULT_CONFIG_FILE},
    session::Session,
    sink::JsonFileSink,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load(DEFAULT_CONFIG_FILE)?;
    tracing::info!(steps = config.simulation.steps, participants = config.simulation.participants, "Starting dexsim...");

    let output_path = config.output_path.clone();
    let session = Session::new(config);
    let stop = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current step.");
            stop.stop();
        }
    });

    session.run(&JsonFileSink::new(&output_path)).await?;
    println!("Metrics saved to {}", output_path.display());

    Ok(())
}
