use std::process::ExitCode;
use dotenv::dotenv;
use log::{error, info};
use simplelog::{ColorChoice, Config as LogConfig, TermLogger, TerminalMode};
use gradewatch::config::log_level_from_env;
use gradewatch::utils::portal::PortalFetcher;
use gradewatch::utils::wechat::WechatNotifier;
use gradewatch::{run, Config, DisabledNotifier, Notifier, SnapshotStore};

// One check per invocation; a scheduler (cron, CI) triggers the runs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Loads environment variables from a `.env` file, if present.
    dotenv().ok();

    if let Err(e) = TermLogger::init(
        log_level_from_env(),
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = Config::from_env();

    // Without a notifier the check still runs and the snapshot is still kept.
    let notifier: Box<dyn Notifier + Sync> = match WechatNotifier::from_config(config.wechat.clone()) {
        Ok(notifier) => Box::new(notifier),
        Err(e) => {
            error!("Error setting up the WeChat client: {:#}", e);
            Box::new(DisabledNotifier)
        }
    };
    let fetcher = PortalFetcher::new(config.portal.clone());
    let store = SnapshotStore::new(config.grades_file.clone());

    let outcome = run(&fetcher, &store, notifier.as_ref()).await;
    info!("Run finished: {:?}", outcome);

    ExitCode::from(outcome.exit_status(config.strict_exit))
}
