pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{load_schedule_impl, load_settings_impl, AppState};
use infrastructure::error::InfraError;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE: &str = "agenda.log";

pub fn init_tracing(logs_dir: Option<&Path>) -> Result<(), InfraError> {
    let directive: tracing_subscriber::filter::Directive = "clinic_agenda=info"
        .parse()
        .map_err(|error| InfraError::InvalidConfig(format!("invalid log directive: {error}")))?;
    let file_layer = match logs_dir {
        Some(dir) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    Ok(())
}

pub fn run() -> Result<(), InfraError> {
    let workspace_root = std::env::current_dir()?;
    let state = AppState::new(workspace_root)?;
    init_tracing(Some(state.logs_dir()))?;

    let mut args = std::env::args().skip(1);
    let start = args.next();
    let end = args.next();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        if let Err(error) = load_settings_impl(&state).await {
            state.command_error("load_settings", &error);
        }
        let view = match load_schedule_impl(&state, start, end).await {
            Ok(view) => view,
            Err(error) => {
                state.command_error("load_schedule", &error);
                return Err(error);
            }
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        state.teardown()
    })
}
