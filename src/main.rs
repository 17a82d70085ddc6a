pub mod models {
    pub mod forecast;
    pub mod nws;
    pub mod open_meteo;
}

pub mod client;
pub mod config;
pub mod db {
    pub mod connection;
    pub mod models;
}
pub mod locations;
pub mod schema;
pub mod utils;
pub mod services {
    pub mod fake_data;
    pub mod grid;
    pub mod report;
    pub mod scoring;
    pub mod store;
    pub mod tracker;
}

use crate::client::{GridProvider, WeatherClient, WeatherProvider};
use crate::config::{Config, ProviderKind, load_env_file};
use crate::services::fake_data::FakeWeather;
use crate::services::tracker::Tracker;
use crate::services::{report, store};
use chrono::NaiveDate;
use log::{error, info, warn};
use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    env_file: Option<PathBuf>,
    date: Option<NaiveDate>,
}

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

pub fn run(today_override: Option<NaiveDate>) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    let settings = cfg.tracker_settings()?;
    info!(
        "Config loaded (provider={:?}, locations={}, lead_times={:?}, tolerances=high±{}F/low±{}F/precip>{}in, lookback={}d, nws_enabled={}, max_request_retries={})",
        cfg.provider,
        settings.locations.len(),
        settings.lead_times,
        settings.tolerances.temp_high_f,
        settings.tolerances.temp_low_f,
        settings.tolerances.precip_threshold_in,
        settings.score_lookback_days,
        cfg.nws_enabled,
        cfg.max_request_retries.get()
    );

    let today = today_override
        .or(cfg.run_date)
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    info!("Processing date {}", today);

    // 2) Open DB and apply migrations
    let mut conn = db::connection::establish(&cfg.database_url)?;
    info!("Opened database {}", cfg.database_url);

    // 3) Providers
    let client;
    let fake;
    let (provider, secondary): (&dyn WeatherProvider, Option<&dyn GridProvider>) = match cfg.provider {
        ProviderKind::OpenMeteo => {
            client = WeatherClient::new(cfg.http_timeout, cfg.nws_user_agent.clone(), cfg.max_request_retries);
            (&client as &dyn WeatherProvider, cfg.nws_enabled.then_some(&client as &dyn GridProvider))
        }
        ProviderKind::Fake => {
            fake = FakeWeather::default();
            info!("Using offline synthetic weather; no network requests will be made");
            (&fake as &dyn WeatherProvider, cfg.nws_enabled.then_some(&fake as &dyn GridProvider))
        }
    };
    let mut tracker = Tracker::new(&settings, provider, secondary);

    // 4) Issue today's forecasts
    let issue = if cfg.issue_enabled {
        Some(tracker.issue_pass(&mut conn, today))
    } else {
        info!("Issue pass disabled via ISSUE_ENABLED={}", cfg.issue_enabled);
        None
    };

    // 5) Score forecasts that came due
    let appended = if cfg.score_enabled {
        !tracker.score_pass(&mut conn, today).scored.is_empty()
    } else {
        info!("Score pass disabled via SCORE_ENABLED={}", cfg.score_enabled);
        false
    };

    // 6) Report
    match store::list_scores(&mut conn) {
        Ok(scores) if !scores.is_empty() => {
            report::log_summary(&report::summarize_by_lead_time(&scores));
            if let Some(path) = cfg.results_file.as_deref() {
                if appended || !path.exists() {
                    match report::write_results(path, &scores, today) {
                        Ok(()) => info!("Wrote {} score(s) to {}", scores.len(), path.display()),
                        Err(e) => warn!("Results export failed: {}", e),
                    }
                }
            }
        }
        Ok(_) => info!("No scores recorded yet"),
        Err(e) => warn!("Loading scores for the report failed: {}", e),
    }

    if let Some(summary) = issue.filter(|s| s.all_fetches_failed()) {
        return Err(format!(
            "every forecast fetch failed ({} attempted); provider unreachable?",
            summary.attempted
        ));
    }
    Ok(())
}

fn parse_cli() -> Result<CliArgs, String> {
    let mut args = std::env::args_os();
    args.next(); // skip program name

    let mut cli = CliArgs::default();
    while let Some(arg) = args.next() {
        let arg = arg.into_string().map_err(|_| "argument contains invalid UTF-8".to_string())?;
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, String> {
            let v = match inline.clone() {
                Some(v) => v,
                None => args
                    .next()
                    .and_then(|v| v.into_string().ok())
                    .ok_or_else(|| format!("`{}` requires a value", name))?,
            };
            if v.is_empty() {
                return Err(format!("`{}` requires a value", name));
            }
            Ok(v)
        };
        match flag.as_str() {
            "--env-file" => {
                if cli.env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                cli.env_file = Some(PathBuf::from(value("--env-file")?));
            }
            "--date" => {
                if cli.date.is_some() {
                    return Err("`--date` provided more than once".to_string());
                }
                cli.date = Some(utils::parse_date(&value("--date")?, "--date")?);
            }
            "--" => break,
            other => return Err(format!("unrecognised argument: {}", other)),
        }
    }
    Ok(cli)
}

fn load_env(cli: &CliArgs) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = &cli.env_file {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        load_env_file(path)?;
        return Ok(Some(LoadedEnvFile {
            path: path.clone(),
            explicit: true,
        }));
    }

    let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
    let default_path = cwd.join(".env");
    if !default_path.is_file() {
        return Ok(None);
    }
    load_env_file(&default_path)?;
    Ok(Some(LoadedEnvFile {
        path: default_path,
        explicit: false,
    }))
}

fn main() {
    let (cli, loaded_env) = match parse_cli().and_then(|cli| load_env(&cli).map(|env| (cli, env))) {
        Ok(v) => v,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "forecast-tracker {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli.date) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
