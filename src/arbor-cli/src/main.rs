use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    arbor_cli::logging::init();

    let app = arbor_cli::build_app()?;
    let outcome = app.run_from_env().await;
    tracing::debug!("Exiting with {:?}", outcome);
    std::process::exit(outcome.exit_code());
}
