//! Authenticated HTTP client for the board API.
//!
//! Every call carries the session's bearer token. A `401` triggers exactly one
//! token refresh followed by exactly one replay; a failed refresh or a second `401`
//! tears the session down and broadcasts [`ClientEvent::SessionExpired`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ContainerId, ItemId},
    protocol::{
        AccessToken, Container, Item, ListEnvelope, MoveItemRequest, TokenObtainRequest,
        TokenPair, TokenRefreshRequest, User,
    },
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use crate::{api::BoardApi, error::ClientError, session::SessionContext, ClientEvent};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_LIST_PAGES: usize = 100;

pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: SessionContext,
    refresh_gate: Mutex<()>,
    events: broadcast::Sender<ClientEvent>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: SessionContext) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, session, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        session: SessionContext,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                endpoint: base_url.to_string(),
                source,
            })?;
        let (events, _) = broadcast::channel(64);
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            session,
            refresh_gate: Mutex::new(()),
            events,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Obtains a token pair and loads the signed-in user.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let url = self.endpoint("token/")?;
        let request = TokenObtainRequest {
            email: email.trim().to_lowercase(),
            password: password.to_string(),
        };
        let response = self
            .http
            .post(url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        let tokens: TokenPair = decode(&url, ensure_success(&url, response).await?).await?;
        self.session.set_tokens(tokens.access, tokens.refresh).await;

        let user = self.current_user().await?;
        self.session.set_user(user.clone()).await;
        info!(user_id = %user.id, username = %user.username, "signed in");
        Ok(user)
    }

    pub async fn current_user(&self) -> Result<User, ClientError> {
        let url = self.endpoint("users/me/")?;
        self.get_json(url).await
    }

    pub async fn logout(&self) {
        self.session.clear().await;
        info!("signed out");
    }

    /// Exchanges the refresh token for a new access token, bypassing the interceptor.
    pub async fn refresh_access_token(&self) -> Result<String, ClientError> {
        let refresh = self
            .session
            .refresh_token()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        let url = self.endpoint("token/refresh/")?;
        let response = self
            .http
            .post(url.clone())
            .json(&TokenRefreshRequest { refresh })
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        let token: AccessToken = decode(&url, ensure_success(&url, response).await?).await?;
        self.session.set_access_token(token.access.clone()).await;
        let _ = self.events.send(ClientEvent::TokenRefreshed);
        debug!("access token refreshed");
        Ok(token.access)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|source| transport(url, source))
    }

    async fn send_authorized(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ClientError> {
        let token = self.session.access_token().await;
        let response = self.dispatch(&method, &url, body, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(endpoint = %url.path(), "access token rejected; refreshing once");
        let fresh = match self.refresh_after_rejection(token.as_deref()).await {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!(endpoint = %url.path(), error = %err, "token refresh failed");
                self.expire_session().await;
                return Err(ClientError::SessionExpired);
            }
        };

        let replay = self.dispatch(&method, &url, body, Some(&fresh)).await?;
        if replay.status() == StatusCode::UNAUTHORIZED {
            warn!(endpoint = %url.path(), "request rejected again after refresh");
            self.expire_session().await;
            return Err(ClientError::SessionExpired);
        }
        Ok(replay)
    }

    /// Concurrent rejections share one refresh: whoever finds the token already
    /// rotated replays with it instead of refreshing again.
    async fn refresh_after_rejection(&self, rejected: Option<&str>) -> Result<String, ClientError> {
        let _gate = self.refresh_gate.lock().await;
        if let Some(current) = self.session.access_token().await {
            if Some(current.as_str()) != rejected {
                return Ok(current);
            }
        }
        self.refresh_access_token().await
    }

    async fn expire_session(&self) {
        self.session.clear().await;
        let _ = self.events.send(ClientEvent::SessionExpired);
        info!("session expired; credentials discarded");
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self.send_authorized(Method::GET, url.clone(), None).await?;
        decode(&url, ensure_success(&url, response).await?).await
    }

    /// Fetches every page of a list endpoint.
    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ClientError> {
        let mut url = self.endpoint(path)?;
        let mut records = Vec::new();
        for _ in 0..MAX_LIST_PAGES {
            let envelope: ListEnvelope<T> = self.get_json(url.clone()).await?;
            let (mut page, next) = envelope.into_parts();
            records.append(&mut page);
            match next {
                Some(next) => url = self.follow_link(path, &next)?,
                None => return Ok(records),
            }
        }
        Err(ClientError::TooManyPages {
            endpoint: path.to_string(),
            limit: MAX_LIST_PAGES,
        })
    }

    /// Resolves a pagination link, which must stay on the API origin.
    fn follow_link(&self, path: &str, next: &str) -> Result<Url, ClientError> {
        let url = self.base_url.join(next)?;
        if url.origin() != self.base_url.origin() {
            warn!(endpoint = path, next, "refusing pagination link to another origin");
            return Err(ClientError::Decode {
                endpoint: path.to_string(),
                reason: "next link leaves the api origin".to_string(),
            });
        }
        Ok(url)
    }
}

#[async_trait]
impl BoardApi for ApiClient {
    async fn list_items(&self) -> Result<Vec<Item>, ClientError> {
        self.list_all("tasks/").await
    }

    async fn list_containers(&self) -> Result<Vec<Container>, ClientError> {
        self.list_all("tasks/columns/").await
    }

    async fn move_item(
        &self,
        item: ItemId,
        container: &ContainerId,
        position: u32,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("tasks/{item}/move/"))?;
        let body = serde_json::to_value(MoveItemRequest {
            column_id: Some(container.clone()),
            position,
        })
        .map_err(|err| ClientError::Decode {
            endpoint: url.path().to_string(),
            reason: err.to_string(),
        })?;
        let response = self.send_authorized(Method::POST, url.clone(), Some(&body)).await?;
        ensure_success(&url, response).await?;
        Ok(())
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn transport(url: &Url, source: reqwest::Error) -> ClientError {
    ClientError::Transport {
        endpoint: url.path().to_string(),
        source,
    }
}

async fn ensure_success(url: &Url, response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        endpoint: url.path().to_string(),
        status,
        body,
    })
}

async fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await.map_err(|source| transport(url, source))?;
    serde_json::from_slice(&bytes).map_err(|err| ClientError::Decode {
        endpoint: url.path().to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
