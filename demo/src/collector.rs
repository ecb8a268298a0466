use bser::{api::Client, dispatch::Priority};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, Level};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] bser::Error),
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no player named {0:?}")]
    NotFound(String),
}

#[derive(Debug)]
pub struct Summary {
    pub user_num: u64,
    /// Full results of each game, most recent first.
    pub games: Vec<Value>,
}

#[derive(Deserialize, Debug)]
struct UserResponse {
    user: Option<User>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct User {
    user_num: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GamesPage {
    #[serde(default)]
    user_games: Vec<GameEntry>,
    next: Option<u64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GameEntry {
    game_id: u64,
}

/// Look up `nickname`, then fetch up to `pages` pages of their recent games
/// and the full results of each.
///
/// The player lookup is urgent; the game fetches fan out at normal priority
/// and are paced by the client's rate limit.
#[instrument(level = Level::INFO, err(level = Level::WARN), skip(client))]
pub async fn collect(client: &Client, nickname: &str, pages: usize) -> Result<Summary, Error> {
    let response = client.user_by_nickname(nickname, Priority::Urgent).await?;
    let UserResponse { user } = serde_json::from_value(response)?;
    let user_num = user
        .ok_or_else(|| Error::NotFound(nickname.to_owned()))?
        .user_num;

    let mut ids = Vec::new();
    let mut next = None;

    for page in 0..pages {
        let response = client.user_games(user_num, next, Priority::Normal).await?;
        let GamesPage {
            user_games,
            next: following,
        } = serde_json::from_value(response)?;

        debug!(page, games = user_games.len(), "fetched game page");
        ids.extend(user_games.into_iter().map(|game| game.game_id));

        match following {
            Some(n) => next = Some(n),
            None => break,
        }
    }

    let games = join_all(
        ids.into_iter()
            .map(|id| client.game(id, Priority::Normal)),
    )
    .await
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Summary { user_num, games })
}
