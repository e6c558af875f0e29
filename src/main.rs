use std::process::ExitCode;

use findoc_lib::config::{self, AppConfig};
use findoc_lib::{build_service, init_tracing, run};

fn main() -> ExitCode {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Built before the runtime: the blocking HTTP clients inside must not be
    // created or dropped on an async thread.
    let service = match build_service(&config) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(config, service.clone()));
    drop(runtime);
    drop(service);

    match result {
        Ok(()) => {
            tracing::info!("Shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
