use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::{error, info};

use argonaut::argocd::ArgoClient;
use argonaut::config::Cli;

fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("argonaut: {}", e);
            return ExitCode::from(2);
        }
    };

    let _log_guard = match argonaut::logging::init(&config.log_file, &config.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("argonaut: {}", e);
            return ExitCode::from(2);
        }
    };
    info!(server = %config.server, projects = ?config.projects, "starting");

    let client = match ArgoClient::new(config.client_options()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "cannot build API client");
            eprintln!("argonaut: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let should_quit = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&should_quit)) {
            eprintln!("argonaut: cannot install signal handler: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        argonaut::app::restore_terminal();
        default_hook(info);
    }));

    match argonaut::app::run(Arc::new(client), config.sync_options(), config.sort, should_quit) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            argonaut::app::restore_terminal();
            error!(error = %e, "terminal error");
            eprintln!("argonaut: {}", e);
            ExitCode::FAILURE
        }
    }
}
