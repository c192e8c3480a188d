use anyhow::Result;
use clap::Parser;
use nri_podresources::app;
use nri_podresources::config::Cli;
use nri_podresources::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    let _guard = logging::init(cli.log_file.as_deref())?;

    tracing::info!("Starting nri-podresources {}", &**version::VERSION);

    app::run(cli).await
}
