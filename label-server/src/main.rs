use label_server::{BackgroundTasks, ServerState, print_banner, setup_environment};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (dotenv, configuration, logging)
    let config = setup_environment()?;
    if config.is_development() {
        print_banner();
    }
    tracing::info!("Label server starting...");
    tracing::info!(
        work_dir = %config.work_dir.display(),
        environment = %config.environment,
        "Configuration loaded"
    );

    // 2. State
    let shutdown = CancellationToken::new();
    let mut tasks = BackgroundTasks::with_token(shutdown.clone());
    let (state, events) = ServerState::initialize(&config, shutdown)?;
    tracing::info!("Loaded {} printers", state.registry.len());

    // 3. Background loops and scanner links
    if let Err(e) = state.start(&mut tasks, events).await {
        tracing::error!(error = %e, "Failed to initialize scanners");
    }
    tasks.log_summary();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    state.shutdown(tasks).await;

    Ok(())
}
