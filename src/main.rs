use clap::Parser;
use sheet_intent::cli;
use sheet_intent::config::AppConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli_args = cli::Cli::parse();
    let config = match AppConfig::from_args(cli_args.config.clone()) {
        Ok(config) => config,
        Err(error) => emit_error_and_exit(error),
    };
    init_logging(&config.log_filter);

    match cli::run_command(cli_args.command, &config).await {
        Ok(payload) => {
            if let Err(error) = cli::output::emit_value(&payload, cli_args.compact) {
                emit_error_and_exit(error);
            }
        }
        Err(error) => emit_error_and_exit(error),
    }
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn emit_error_and_exit(error: anyhow::Error) -> ! {
    let envelope = cli::errors::envelope_for(&error);
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    if serde_json::to_writer(&mut handle, &envelope).is_err() {
        eprintln!("{{\"code\":\"COMMAND_FAILED\",\"message\":\"{}\"}}", error);
    } else {
        use std::io::Write;
        let _ = handle.write_all(b"\n");
    }
    std::process::exit(1)
}
