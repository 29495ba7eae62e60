use std::env;
use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use litepost::cli::{self, CliConfig, Command, USAGE};
use litepost::{HttpTransport, Settings, storage};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();

    let command = match cli::parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {e}\n");
            eprintln!("{USAGE}");
            return Ok(ExitCode::FAILURE);
        }
    };

    match command {
        Command::Help => {
            println!("{USAGE}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(config) => run(config).await,
        Command::Resolve(config) => resolve(config),
    }
}

async fn run(config: CliConfig) -> anyhow::Result<ExitCode> {
    let settings = init(&config)?;
    let transport = HttpTransport::new(&settings)?;

    let report = cli::run(&config, &transport, &settings).await?;
    println!("{}", cli::render_report(&report, config.output_format)?);

    if let Some(path) = &config.report_path {
        storage::save_json(path, &report)?;
        info!(path = %path.display(), "report written");
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn resolve(config: CliConfig) -> anyhow::Result<ExitCode> {
    init(&config)?;
    let request = cli::resolve_request(&config)?;
    println!("{}", cli::render_resolved(&request, config.output_format)?);
    Ok(ExitCode::SUCCESS)
}

/// Load settings and install the log subscriber. Logs go to stderr so
/// reports on stdout stay machine-readable.
fn init(config: &CliConfig) -> anyhow::Result<Settings> {
    let settings = Settings::load(config.config_path.as_deref())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        max_redirects = settings.max_redirects,
        timeout_ms = settings.timeout_ms,
        verify_ssl = settings.verify_ssl,
        "Starting litepost"
    );
    Ok(settings)
}
