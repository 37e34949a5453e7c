use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::RwLock;

use pulsebot_core::domain::channel::{Channel, NewChannel};
use pulsebot_core::domain::post::{Post, PostDraft};
use pulsebot_core::domain::team::Team;
use pulsebot_core::domain::user::UserProfile;
use pulsebot_core::errors::{ClientError, ErrorDetail};

/// Server metadata returned by the liveness check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: String,
}

/// Authenticated request/response surface of the chat server. One
/// implementation talks HTTP; tests substitute scripted fakes.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn ping(&self) -> Result<ServerInfo, ClientError>;
    async fn login(&self, email: &str, password: &SecretString)
        -> Result<UserProfile, ClientError>;
    async fn update_user(&self, user: &UserProfile) -> Result<UserProfile, ClientError>;
    async fn team_by_name(&self, name: &str) -> Result<Team, ClientError>;
    async fn channel_by_name(&self, team_id: &str, name: &str) -> Result<Channel, ClientError>;
    async fn create_channel(&self, draft: &NewChannel) -> Result<Channel, ClientError>;
    async fn create_post(&self, draft: &PostDraft) -> Result<Post, ClientError>;
    /// The session token captured at login, for the event-stream handshake.
    async fn auth_token(&self) -> Option<String>;
}

pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http: reqwest::Client::new(), base_url, token: RwLock::new(None) }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v4{path}", self.base_url)
    }

    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let builder = self.authorize(builder).await;
        builder.send().await.map_err(|err| ClientError::Transport(err.to_string()))
    }

    async fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ClientError::Validation(format!("response body did not parse: {err}")))
    }
}

async fn error_from_response(status: StatusCode, response: Response) -> ClientError {
    let body = response.text().await.unwrap_or_default();
    decode_error_body(status, &body)
}

/// Maps a non-success response to the error taxonomy. The server reports
/// structured detail bodies; anything else is preserved verbatim.
fn decode_error_body(status: StatusCode, body: &str) -> ClientError {
    let detail = serde_json::from_str::<ErrorDetail>(body).unwrap_or_else(|_| {
        let message = if body.trim().is_empty() { status.to_string() } else { body.to_string() };
        ErrorDetail::from_message(message, status.as_u16())
    });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth(detail),
        StatusCode::NOT_FOUND => ClientError::NotFound(detail),
        _ => ClientError::Validation(detail.to_string()),
    }
}

#[async_trait]
impl SessionClient for RestClient {
    async fn ping(&self) -> Result<ServerInfo, ClientError> {
        let response = self.send(self.http.get(self.url("/config/client?format=old"))).await?;
        let props: HashMap<String, String> = Self::expect_json(response).await?;
        let version = props.get("Version").cloned().unwrap_or_default();
        Ok(ServerInfo { version })
    }

    async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<UserProfile, ClientError> {
        let body = json!({ "login_id": email, "password": password.expose_secret() });
        let response = self.send(self.http.post(self.url("/users/login")).json(&body)).await?;

        let session_token = response
            .headers()
            .get("Token")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let user: UserProfile = Self::expect_json(response).await?;
        match session_token {
            Some(token) => *self.token.write().await = Some(token),
            None => {
                return Err(ClientError::Validation(
                    "login response did not include a session token".to_string(),
                ))
            }
        }

        Ok(user)
    }

    async fn update_user(&self, user: &UserProfile) -> Result<UserProfile, ClientError> {
        let path = format!("/users/{}", user.id);
        let response = self.send(self.http.put(self.url(&path)).json(user)).await?;
        Self::expect_json(response).await
    }

    async fn team_by_name(&self, name: &str) -> Result<Team, ClientError> {
        let path = format!("/teams/name/{name}");
        let response = self.send(self.http.get(self.url(&path))).await?;
        Self::expect_json(response).await
    }

    async fn channel_by_name(&self, team_id: &str, name: &str) -> Result<Channel, ClientError> {
        let path = format!("/teams/{team_id}/channels/name/{name}");
        let response = self.send(self.http.get(self.url(&path))).await?;
        Self::expect_json(response).await
    }

    async fn create_channel(&self, draft: &NewChannel) -> Result<Channel, ClientError> {
        let response = self.send(self.http.post(self.url("/channels")).json(draft)).await?;
        Self::expect_json(response).await
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, ClientError> {
        let response = self.send(self.http.post(self.url("/posts")).json(draft)).await?;
        Self::expect_json(response).await
    }

    async fn auth_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }
}
