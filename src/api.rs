//! [Access][Client] the Eternal Return [open API][].
//!
//! [open API]: https://developer.eternalreturn.io/

use std::fmt;

use http::header::{self, HeaderName};
use reqwest::{IntoUrl, Url};
use serde_json::Value;
use tracing::{instrument, Level};

use crate::credentials::ApiKey;
use crate::dispatch::{Dispatcher, Priority, Quota};
use crate::Error;

/// The [name][HeaderName] of the header carrying the [`ApiKey`].
pub static X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// A client for the Eternal Return [open API][].
///
/// Every request passes through a [`Dispatcher`], so no more than the
/// configured number of requests per minute are sent. Requests made with
/// [`Priority::Urgent`] are sent ahead of any normal requests still waiting.
///
/// [open API]: https://developer.eternalreturn.io/
///
/// ```no_run
/// use bser::{api::Client, dispatch::Priority, ApiKey};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(ApiKey::from_env()?, 60)?;
///
/// let user = client.user_by_nickname("Nickname", Priority::Urgent).await?;
/// println!("{user}");
///
/// Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client {
    origin: Url,
    dispatcher: Dispatcher<Url, Value, Error>,
}

impl Client {
    pub const PUBLIC_ORIGIN: &'static str = "https://open-api.bser.io";

    pub const USER_AGENT: &'static str =
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

    /// Create a [Client] for the open API, sending at most `rpm_limit`
    /// requests per minute.
    pub fn new(key: impl Into<ApiKey>, rpm_limit: u32) -> Result<Self, Error> {
        Self::with_origin(Self::PUBLIC_ORIGIN, key, Quota::per_minute(rpm_limit)?)
    }

    /// Create a [Client] which sends API requests to the given `origin`.
    ///
    /// API paths are appended to any path `origin` already has, so
    /// `http://localhost:8080/proxy` sends requests under `/proxy/v1/...`.
    pub fn with_origin(
        origin: impl IntoUrl,
        key: impl Into<ApiKey>,
        quota: Quota,
    ) -> Result<Self, Error> {
        Self::with_client(Default::default(), origin, key, quota)
    }

    /// Create a [Client] wrapping an explicit [`reqwest::Client`].
    ///
    /// Must be called within a Tokio runtime; see [`Dispatcher`].
    pub fn with_client(
        http_client: reqwest::Client,
        origin: impl IntoUrl,
        key: impl Into<ApiKey>,
        quota: Quota,
    ) -> Result<Self, Error> {
        let origin = origin.into_url()?;
        if origin.cannot_be_a_base() {
            return Err(Error::InvalidOrigin);
        }

        let fetch = Fetch {
            http: http_client,
            key: key.into(),
        };

        let dispatcher = Dispatcher::with_quota(move |url: Url| fetch.clone().get(url), quota);

        Ok(Self { origin, dispatcher })
    }

    /// Fetch a game data table, e.g. `"Character"` or `"ItemWeapon"`.
    ///
    /// Pass `"hash"` to list the available tables.
    #[instrument(level = Level::TRACE, err(level = Level::WARN), skip(self))]
    pub async fn meta_type(&self, name: &str, priority: Priority) -> Result<Value, Error> {
        self.get(Endpoint::MetaType(name), priority).await
    }

    /// Fetch the characters in this week's free rotation.
    #[instrument(level = Level::TRACE, err(level = Level::WARN), skip(self))]
    pub async fn free_characters(
        &self,
        mode: MatchingMode,
        priority: Priority,
    ) -> Result<Value, Error> {
        self.get(Endpoint::FreeCharacters(mode), priority).await
    }

    /// Fetch the location of the localization file for `language`.
    #[instrument(level = Level::TRACE, err(level = Level::WARN), skip(self))]
    pub async fn l10n(&self, language: Language, priority: Priority) -> Result<Value, Error> {
        self.get(Endpoint::L10n(language), priority).await
    }

    /// Fetch every player's results from one game.
    #[instrument(level = Level::TRACE, err(level = Level::WARN), skip(self))]
    pub async fn game(&self, game_id: u64, priority: Priority) -> Result<Value, Error> {
        self.get(Endpoint::Game(game_id), priority).await
    }

    /// Fetch the top-ranked players of a season.
    #[instrument(level = Level::TRACE, err(level = Level::WARN), skip(self))]
    pub async fn rankers(
        &self,
        season_id: u32,
        team_mode: MatchingTeamMode,
        priority: Priority,
    ) -> Result<Value, Error> {
        self.get(Endpoint::Rankers(season_id, team_mode), priority)
            .await
    }

    /// Fetch a player's rank in a season.
    #[instrument(level = Level::TRACE, err(level = Level::WARN), skip(self))]
    pub async fn user_rank(
        &self,
        user_num: u64,
        season_id: u32,
        team_mode: MatchingTeamMode,
        priority: Priority,
    ) -> Result<Value, Error> {
        self.get(Endpoint::UserRank(user_num, season_id, team_mode), priority)
            .await
    }

    /// Fetch a page of a player's recent games.
    ///
    /// Pass the `next` value of one response to fetch the following page.
    #[instrument(level = Level::TRACE, err(level = Level::WARN), skip(self))]
    pub async fn user_games(
        &self,
        user_num: u64,
        next: Option<u64>,
        priority: Priority,
    ) -> Result<Value, Error> {
        self.get(Endpoint::UserGames(user_num, next), priority)
            .await
    }

    /// Look up a player by nickname.
    #[instrument(level = Level::TRACE, err(level = Level::WARN), skip(self))]
    pub async fn user_by_nickname(
        &self,
        nickname: &str,
        priority: Priority,
    ) -> Result<Value, Error> {
        self.get(Endpoint::UserByNickname(nickname), priority)
            .await
    }

    /// Fetch a player's statistics for a season.
    #[instrument(level = Level::TRACE, err(level = Level::WARN), skip(self))]
    pub async fn user_stats(
        &self,
        user_num: u64,
        season_id: u32,
        priority: Priority,
    ) -> Result<Value, Error> {
        self.get(Endpoint::UserStats(user_num, season_id), priority)
            .await
    }

    /// Stop sending requests once those already waiting have been sent.
    pub async fn close(self) -> Result<(), Error> {
        self.dispatcher.close().await
    }

    async fn get(&self, endpoint: Endpoint<'_>, priority: Priority) -> Result<Value, Error> {
        let url = endpoint.url(&self.origin)?;

        self.dispatcher
            .enqueue(url, priority)
            .await
            .map_err(Error::from)
    }
}

/// Performs one dispatched API request.
#[derive(Clone, Debug)]
struct Fetch {
    http: reqwest::Client,
    key: ApiKey,
}

impl Fetch {
    async fn get(self, url: Url) -> Result<Value, Error> {
        self.http
            .get(url)
            .header(&X_API_KEY, self.key.as_str())
            .header(header::USER_AGENT, Client::USER_AGENT)
            .send()
            .await
            .map_err(Error::from)?
            .error_for_status()
            .map_err(Error::from)?
            .json()
            .await
            .map_err(Error::from)
    }
}

/// An open API route, with its path parameters.
#[derive(PartialEq, Eq, Clone, Debug)]
enum Endpoint<'a> {
    MetaType(&'a str),
    FreeCharacters(MatchingMode),
    L10n(Language),
    Game(u64),
    Rankers(u32, MatchingTeamMode),
    UserRank(u64, u32, MatchingTeamMode),
    UserGames(u64, Option<u64>),
    UserByNickname(&'a str),
    UserStats(u64, u32),
}

impl Endpoint<'_> {
    /// The request URL under `origin`, keeping any path prefix it has.
    ///
    /// Each path parameter is one percent-encoded segment.
    fn url(&self, origin: &Url) -> Result<Url, Error> {
        let mut url = origin.clone();
        url.set_query(None);
        url.set_fragment(None);

        {
            let mut path = url.path_segments_mut().map_err(|_| Error::InvalidOrigin)?;
            path.pop_if_empty();

            match *self {
                Self::MetaType(name) => path.extend(["v2", "data", name]),
                Self::FreeCharacters(mode) => path
                    .extend(["v1", "freeCharacters"])
                    .push(&mode.to_string()),
                Self::L10n(language) => path.extend(["v1", "l10n", language.as_str()]),
                Self::Game(id) => path.extend(["v1", "games"]).push(&id.to_string()),
                Self::Rankers(season, team) => path
                    .extend(["v1", "rank", "top"])
                    .extend([season.to_string(), team.to_string()]),
                Self::UserRank(user, season, team) => path.extend([
                    "v1".to_owned(),
                    "rank".to_owned(),
                    user.to_string(),
                    season.to_string(),
                    team.to_string(),
                ]),
                Self::UserGames(user, _) => path
                    .extend(["v1", "user", "games"])
                    .push(&user.to_string()),
                Self::UserByNickname(_) => path.extend(["v1", "user", "nickname"]),
                Self::UserStats(user, season) => path
                    .extend(["v1", "user", "stats"])
                    .extend([user.to_string(), season.to_string()]),
            };
        }

        match *self {
            Self::UserGames(_, Some(next)) => {
                url.query_pairs_mut().append_pair("next", &next.to_string());
            }
            Self::UserByNickname(nickname) => {
                url.query_pairs_mut().append_pair("query", nickname);
            }
            _ => {}
        }

        Ok(url)
    }
}

/// A [game mode][] for [`Client::free_characters`].
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MatchingMode {
    Normal = 2,
    Rank = 3,
}

impl fmt::Display for MatchingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&(*self as u8), f)
    }
}

/// The team size of a ranked queue.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MatchingTeamMode {
    Solo = 1,
    Duo = 2,
    Squad = 3,
}

impl fmt::Display for MatchingTeamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&(*self as u8), f)
    }
}

/// A language with [localization data][Client::l10n].
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Language {
    Korean,
    English,
    Japanese,
    ChineseSimplified,
    ChineseTraditional,
    French,
    Spanish,
    SpanishLatin,
    Portuguese,
    PortugueseLatin,
    Indonesian,
    German,
    Russian,
    Thai,
    Vietnamese,
}

impl Language {
    /// The languages in which all game data is translated.
    pub const FULL_SUPPORT: [Language; 5] = [
        Self::Korean,
        Self::English,
        Self::Japanese,
        Self::ChineseSimplified,
        Self::ChineseTraditional,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Korean => "Korean",
            Self::English => "English",
            Self::Japanese => "Japanese",
            Self::ChineseSimplified => "ChineseSimplified",
            Self::ChineseTraditional => "ChineseTraditional",
            Self::French => "French",
            Self::Spanish => "Spanish",
            Self::SpanishLatin => "SpanishLatin",
            Self::Portuguese => "Portuguese",
            Self::PortugueseLatin => "PortugueseLatin",
            Self::Indonesian => "Indonesian",
            Self::German => "German",
            Self::Russian => "Russian",
            Self::Thai => "Thai",
            Self::Vietnamese => "Vietnamese",
        }
    }

    /// Check if all game data is translated into this language; the rest are
    /// only partially translated.
    #[inline]
    pub const fn is_fully_supported(self) -> bool {
        matches!(
            self,
            Self::Korean
                | Self::English
                | Self::Japanese
                | Self::ChineseSimplified
                | Self::ChineseTraditional
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use reqwest::Url;
    use serde_json::json;
    use tokio::{
        io::{AsyncReadExt as _, AsyncWriteExt as _},
        net::TcpListener,
        spawn,
        task::JoinHandle,
    };

    use super::{Client, Endpoint, Language, MatchingMode, MatchingTeamMode};
    use crate::{dispatch::Priority, dispatch::Quota, Error};

    /// Answer one HTTP request on a loopback port, returning the request head.
    async fn serve(status: &'static str, body: String) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();

        let task = spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed mid-request");
                head.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();

            String::from_utf8(head).unwrap().to_lowercase()
        });

        (origin, task)
    }

    fn client(origin: Url) -> Client {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        Client::with_client(http, origin, "secret", Quota::per_minute(10).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn fetch() {
        let body = json!({ "code": 200, "message": "Success", "userGames": [] });
        let (origin, request) = serve("200 OK", body.to_string()).await;

        let client = client(origin);
        let value = client
            .user_games(1733, Some(5), Priority::Normal)
            .await
            .unwrap();
        assert_eq!(value, body);

        let head = request.await.unwrap();
        assert!(head.starts_with("get /v1/user/games/1733?next=5 http/1.1\r\n"));
        assert!(head.contains("\r\nx-api-key: secret\r\n"));
        assert!(head.contains(&format!("\r\nuser-agent: {}\r\n", Client::USER_AGENT)));
    }

    #[tokio::test]
    async fn error_status() {
        let body = json!({ "code": 429, "message": "Too Many Requests" });
        let (origin, request) = serve("429 Too Many Requests", body.to_string()).await;

        let client = client(origin);
        let result = client.game(7, Priority::Urgent).await;

        match result {
            Err(Error::Http(err)) => {
                assert_eq!(err.status(), Some(reqwest::StatusCode::TOO_MANY_REQUESTS))
            }
            other => panic!("expected an HTTP error, got {other:?}"),
        }
        request.await.unwrap();
    }

    #[tokio::test]
    async fn invalid_origin() {
        let result = Client::with_origin(
            "mailto:nobody@example.com",
            "secret",
            Quota::per_minute(1).unwrap(),
        );
        assert!(matches!(result, Err(Error::InvalidOrigin)));

        assert!(matches!(Client::new("secret", 0), Err(Error::InvalidRateLimit)));
    }

    fn url(endpoint: Endpoint<'_>) -> String {
        let origin = Url::parse("https://open-api.bser.io").unwrap();
        endpoint.url(&origin).unwrap().to_string()
    }

    #[test]
    fn paths() {
        assert_eq!(
            "https://open-api.bser.io/v2/data/Character",
            url(Endpoint::MetaType("Character"))
        );
        assert_eq!(
            "https://open-api.bser.io/v1/freeCharacters/3",
            url(Endpoint::FreeCharacters(MatchingMode::Rank))
        );
        assert_eq!(
            "https://open-api.bser.io/v1/l10n/ChineseSimplified",
            url(Endpoint::L10n(Language::ChineseSimplified))
        );
        assert_eq!(
            "https://open-api.bser.io/v1/games/31415926",
            url(Endpoint::Game(31415926))
        );
        assert_eq!(
            "https://open-api.bser.io/v1/rank/top/25/3",
            url(Endpoint::Rankers(25, MatchingTeamMode::Squad))
        );
        assert_eq!(
            "https://open-api.bser.io/v1/rank/1733/25/1",
            url(Endpoint::UserRank(1733, 25, MatchingTeamMode::Solo))
        );
        assert_eq!(
            "https://open-api.bser.io/v1/user/stats/1733/25",
            url(Endpoint::UserStats(1733, 25))
        );
    }

    #[test]
    fn queries() {
        assert_eq!(
            "https://open-api.bser.io/v1/user/games/1733",
            url(Endpoint::UserGames(1733, None))
        );
        assert_eq!(
            "https://open-api.bser.io/v1/user/games/1733?next=0",
            url(Endpoint::UserGames(1733, Some(0)))
        );
        assert_eq!(
            "https://open-api.bser.io/v1/user/nickname?query=%ED%95%9C+%EB%8F%99",
            url(Endpoint::UserByNickname("한 동"))
        );
    }

    #[test]
    fn segments_encoded() {
        assert_eq!(
            "https://open-api.bser.io/v2/data/..%2F..%2Fv1%2Fgames%2F1",
            url(Endpoint::MetaType("../../v1/games/1"))
        );
        assert_eq!(
            "https://open-api.bser.io/v2/data/Item%3Fid=1",
            url(Endpoint::MetaType("Item?id=1"))
        );
    }

    #[test]
    fn origin_path_kept() {
        for origin in ["http://localhost:8080/proxy/", "http://localhost:8080/proxy"] {
            let origin = Url::parse(origin).unwrap();
            assert_eq!(
                "http://localhost:8080/proxy/v1/games/7",
                Endpoint::Game(7).url(&origin).unwrap().to_string()
            );
        }

        let origin = Url::parse("http://localhost:8080/proxy/?stale=1#top").unwrap();
        assert_eq!(
            "http://localhost:8080/proxy/v1/user/games/1733?next=2",
            Endpoint::UserGames(1733, Some(2))
                .url(&origin)
                .unwrap()
                .to_string()
        );
    }

    #[test]
    fn languages() {
        assert!(Language::FULL_SUPPORT
            .iter()
            .all(|language| language.is_fully_supported()));
        assert!(!Language::Vietnamese.is_fully_supported());
        assert_eq!("SpanishLatin", Language::SpanishLatin.to_string());
    }
}
