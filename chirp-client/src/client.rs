use async_trait::async_trait;
use chirp_common::model::{
    ErrorBody, Id, ModelValidationError,
    auth::NewAccount,
    like::{Like, LikeInput},
    timeline::{TimelinePage, TimelineQuery},
    tweet::{CreateTweetInput, Tweet, TweetMarker, TweetText},
    user::{CreateUser, User, UserMarker},
};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server replied with {status}: {message}")]
    Server { status: u16, message: String },
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error("This action requires signing in")]
    SignedOut,
}

/// The tweet procedures the view model drives.
#[async_trait]
pub trait TweetApi: Send + Sync {
    async fn timeline(&self, query: &TimelineQuery) -> Result<TimelinePage>;

    async fn create_tweet(&self, text: &TweetText) -> Result<Tweet>;

    async fn like(&self, tweet_id: Id<TweetMarker>) -> Result<Like>;

    async fn unlike(&self, tweet_id: Id<TweetMarker>) -> Result<Like>;
}

/// HTTP client for a chirp api server.
#[derive(Clone, Debug)]
pub struct ChirpClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ChirpClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    /// Creates a user and keeps the returned token for later calls.
    pub async fn create_account(&mut self, user: &CreateUser) -> Result<NewAccount> {
        let account: NewAccount = self.post("/users", user).await?;
        self.token = Some(account.token.clone());
        Ok(account)
    }

    pub async fn user(&self, id: Id<UserMarker>) -> Result<User> {
        let request = self.http.get(self.url(&format!("/users/{id}")));
        self.send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post<I, O>(&self, path: &str, input: &I) -> Result<O>
    where
        I: Serialize + ?Sized + Sync,
        O: DeserializeOwned,
    {
        debug!(path, "Calling procedure");
        let request = self.http.post(self.url(path)).json(input);
        self.send(request).await
    }

    async fn send<O: DeserializeOwned>(&self, mut request: RequestBuilder) -> Result<O> {
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        read_reply(response).await
    }
}

async fn read_reply<O: DeserializeOwned>(response: Response) -> Result<O> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.json::<ErrorBody>().await.unwrap_or_else(|_| ErrorBody {
        status: status.as_u16(),
        message: status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_owned(),
    });

    Err(ClientError::Server {
        status: body.status,
        message: body.message,
    })
}

#[async_trait]
impl TweetApi for ChirpClient {
    async fn timeline(&self, query: &TimelineQuery) -> Result<TimelinePage> {
        self.post("/tweets/timeline", query).await
    }

    async fn create_tweet(&self, text: &TweetText) -> Result<Tweet> {
        if !self.is_signed_in() {
            return Err(ClientError::SignedOut);
        }

        let input = CreateTweetInput { text: text.clone() };
        self.post("/tweets/create", &input).await
    }

    async fn like(&self, tweet_id: Id<TweetMarker>) -> Result<Like> {
        if !self.is_signed_in() {
            return Err(ClientError::SignedOut);
        }

        self.post("/tweets/like", &LikeInput { tweet_id }).await
    }

    async fn unlike(&self, tweet_id: Id<TweetMarker>) -> Result<Like> {
        if !self.is_signed_in() {
            return Err(ClientError::SignedOut);
        }

        self.post("/tweets/unlike", &LikeInput { tweet_id }).await
    }
}
