use std::process::ExitCode;

use bser::{api::Client, ApiKey};
use tracing::{error, info, Level};

mod collector;

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();

    let Some(nickname) = std::env::args().nth(1) else {
        error!("usage: bser-demo <nickname>");
        return ExitCode::FAILURE;
    };

    let client = match setup() {
        Ok(client) => client,
        Err(err) => {
            error!(%err, "failed to create API client");
            return ExitCode::FAILURE;
        }
    };

    match collector::collect(&client, &nickname, pages()).await {
        Ok(summary) => {
            info!(
                user = summary.user_num,
                games = summary.games.len(),
                "collected recent games"
            );
            for game in summary.games {
                println!("{}", serde_json::to_string(&game).unwrap_or_default());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, nickname = %nickname, "collection failed");
            ExitCode::FAILURE
        }
    }
}

fn setup() -> Result<Client, bser::Error> {
    let key = ApiKey::from_env()?;
    Client::new(key, rpm_limit())
}

fn rpm_limit() -> u32 {
    std::env::var("BSER_RPM_LIMIT")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(60)
}

fn pages() -> usize {
    std::env::var("BSER_PAGES")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(3)
}

#[cfg(debug_assertions)]
fn setup_tracing() {
    tracing_subscriber::fmt()
        .pretty()
        .with_max_level(Level::TRACE)
        .init();
}

#[cfg(not(debug_assertions))]
fn setup_tracing() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}
