use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use wse_token_fetcher::browser::chromium::ChromiumSession;
use wse_token_fetcher::config::credentials::{Credentials, ServiceAccount};
use wse_token_fetcher::config::proc_validator::validate_config;
use wse_token_fetcher::config::settings::LoggingConfig;
use wse_token_fetcher::resilience::retry::RetrySettings;
use wse_token_fetcher::sinks::store::get_store;
use wse_token_fetcher::sinks::TokenSink;
use wse_token_fetcher::strategies::StrategyKind;
use wse_token_fetcher::utils::constants::DEFAULT_CONFIG_PATH;
use wse_token_fetcher::utils::logging::{self, LogLevel};
use wse_token_fetcher::utils::config_loader;
use wse_token_fetcher::{FetchError, RunReport, TokenFetcher};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file; when not given and the default file is absent, built-in defaults apply
    #[arg(short, long, env = "CONFIG")]
    config: Option<String>,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    /// Acquire the token but do not write it
    #[arg(long)]
    dry_run: bool,
    /// Strategy order override, e.g. `--strategy url-redirect --strategy storage`
    #[arg(long = "strategy", value_enum)]
    strategies: Vec<StrategyKind>,
    /// Show the browser window
    #[arg(long)]
    headful: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(report) => {
            info!(
                method = report.method.method_tag(),
                token = %report.token_preview,
                expires_at = ?report.receipt.as_ref().map(|r| r.expires_at),
                updated_at = ?report.receipt.as_ref().map(|r| r.updated_at),
                "token fetched"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(category = err.category(), "{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(args: Args) -> Result<RunReport, FetchError> {
    // -------------------------------
    // 1. Load YAML config
    //
    // CLI overrides are applied on top and validated again
    // -------------------------------

    let explicit = args.config.is_some();
    let config_path = args.config.unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
    let mut service_config = match config_loader::run(&config_path, explicit).await {
        Ok(cfg) => cfg,
        Err(err) => {
            logging::init_logging(&logging::resolve(Some(&LoggingConfig::default()), args.log_level));
            return Err(FetchError::Config(err));
        }
    };
    logging::run(&service_config, args.log_level)
        .await
        .map_err(FetchError::Config)?;

    if !args.strategies.is_empty() {
        service_config.acquisition.strategies = args.strategies;
    }
    if args.headful {
        service_config.browser.headless = false;
    }
    validate_config(&service_config)
        .map_err(|issues| FetchError::Config(anyhow::anyhow!("config is not valid: {}", issues.join("; "))))?;

    // -------------------------------
    // 2. Read secrets
    // -------------------------------

    let login = &service_config.login;
    let credentials =
        Credentials::from_env(&login.username_env, &login.password_env).map_err(FetchError::Config)?;

    // -------------------------------
    // 3. Prepare the store before touching the browser
    // -------------------------------

    let sink: Option<Arc<dyn TokenSink>> = if args.dry_run {
        info!("dry run: the token will not be persisted");
        None
    } else {
        let account = ServiceAccount::from_env().map_err(FetchError::Persistence)?;
        let retry = RetrySettings::from_config(service_config.settings.retry.as_ref());
        let store: Arc<dyn TokenSink> = get_store(&service_config.persistence, account, &retry)
            .await
            .map_err(FetchError::Persistence)?;
        Some(store)
    };

    let fetcher = TokenFetcher::new(service_config.clone(), sink)?;

    // -------------------------------
    // 4. Launch the browser
    // -------------------------------

    let session = ChromiumSession::launch(&service_config.browser)
        .await
        .map_err(FetchError::Setup)?;

    // -------------------------------
    // 5. Log in, acquire, persist; the session is closed on every path
    // -------------------------------

    info!(strategies = ?service_config.acquisition.strategies, "fetch starting...");
    fetcher.run(session, &credentials).await
}
