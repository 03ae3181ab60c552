use crate::{
    split_host_port,
    Ecs,
    MgmtError,
    Token,
};
use reqwest::{
    header::{
        HeaderMap,
        HeaderValue,
        CONTENT_TYPE,
    },
    Method,
    Response,
    StatusCode,
};
use serde::Serialize;
use std::{
    fmt,
    sync::Arc,
    time::Duration,
};
use strum::Display;

/// Requests, including logins, are attempted at most this many times.
pub const MAX_ATTEMPTS: usize = 3;
pub const AUTH_TOKEN_HEADER: &str = "X-SDS-AUTH-TOKEN";
pub const DEFAULT_PORT: u16 = 4443;

#[derive(Clone)]
pub struct ClientSettings {
    /// Used to tell clients apart in logs and errors.
    pub name: String,
    pub username: String,
    pub password: String,
    pub token_validity: Duration,
    pub request_timeout: Duration,
    pub block_duration: Duration,
    pub scheme: String,
    /// Port for node addresses that do not carry one.
    pub port: u16,
    /// Port of the node-local diagnostic endpoints.
    pub auxiliary_port: u16,
    pub accept_invalid_certs: bool,
}

impl ClientSettings {
    pub fn new(name: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            password: password.into(),
            token_validity: Duration::from_secs(60 * 60),
            request_timeout: Duration::from_secs(30),
            block_duration: Duration::from_secs(5 * 60),
            scheme: "https".to_string(),
            port: DEFAULT_PORT,
            auxiliary_port: 9101,
            accept_invalid_certs: true,
        }
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("token_validity", &self.token_validity)
            .field("request_timeout", &self.request_timeout)
            .field("block_duration", &self.block_duration)
            .field("scheme", &self.scheme)
            .field("port", &self.port)
            .field("auxiliary_port", &self.auxiliary_port)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
pub enum AuthState {
    NoToken,
    Authenticating,
    Authenticated,
    Expired,
}

enum Auth<'a> {
    Basic,
    Token(&'a str),
}

/// Authenticated client for the management API of one cluster.
///
/// Cheap to clone; clones share the token, the node blocklist and the login lock. Only one login runs at a time,
/// callers that queue up behind it reuse the token it obtained.
#[derive(Clone)]
pub struct MgmtClient {
    settings: Arc<ClientSettings>,
    upstream: Arc<Ecs>,
    token: Arc<Token>,
    login_lock: Arc<tokio::sync::Mutex<()>>,
    http: reqwest::Client,
}

impl fmt::Debug for MgmtClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MgmtClient")
            .field("settings", &self.settings)
            .field("auth_state", &self.auth_state())
            .finish_non_exhaustive()
    }
}

impl MgmtClient {
    pub fn new(settings: ClientSettings, upstream: Ecs) -> Result<Self, MgmtError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(MgmtError::Client)?;

        Ok(Self {
            token: Arc::new(Token::empty(settings.token_validity)),
            settings: Arc::new(settings),
            upstream: Arc::new(upstream),
            login_lock: Default::default(),
            http,
        })
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn upstream(&self) -> &Ecs {
        &self.upstream
    }

    pub fn auth_state(&self) -> AuthState {
        if self.login_lock.try_lock().is_err() {
            return AuthState::Authenticating;
        }
        match self.token.get() {
            (value, _) if value.is_empty() => AuthState::NoToken,
            (_, true) => AuthState::Expired,
            (_, false) => AuthState::Authenticated,
        }
    }

    pub async fn get(&self, path: &str, vdc: &str) -> Result<Response, MgmtError> {
        self.request(Method::GET, path, None, HeaderMap::new(), vdc).await
    }

    pub async fn post_json<T>(&self, path: &str, body: &T, vdc: &str) -> Result<Response, MgmtError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body)?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.request(Method::POST, path, Some(body), headers, vdc).await
    }

    /// Sends an authenticated request to a node of `vdc`, logging in first when needed.
    ///
    /// A 401 invalidates the token so the next attempt logs in again. Exhaustion of the node pool ends the retries
    /// immediately, any other failure is retried up to [`MAX_ATTEMPTS`] times and the last error is returned.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        headers: HeaderMap,
        vdc: &str,
    ) -> Result<Response, MgmtError> {
        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(&method, path, body.as_deref(), &headers, vdc).await {
                Ok(response) => return Ok(response),
                Err(MgmtError::NoNodeAvailable) => return Err(self.exhausted(last_error)),
                Err(err @ MgmtError::Exhausted { .. }) => return Err(err),
                Err(err) => {
                    if matches!(err, MgmtError::Unauthorized { .. }) {
                        self.token.force_expire();
                    }
                    debug!(client = self.name(), attempt, %method, path, "request failed: {err}");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(MgmtError::NoNodeAvailable))
    }

    /// The node pool ran dry. A failure of an earlier attempt, usually the one that blocked the last node, is kept
    /// as the cause.
    fn exhausted(&self, last_error: Option<MgmtError>) -> MgmtError {
        match last_error {
            Some(cause) => {
                warn!(client = self.name(), "no node left to try after: {cause}");
                MgmtError::Exhausted { cause: Box::new(cause) }
            }
            None => MgmtError::NoNodeAvailable,
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        path: &str,
        body: Option<&[u8]>,
        headers: &HeaderMap,
        vdc: &str,
    ) -> Result<Response, MgmtError> {
        if self.token.expired() {
            self.login().await?;
        }
        let token = self.token.value();
        self.perform(method.clone(), path, body, headers, Auth::Token(&token), vdc)
            .await
    }

    /// Obtains a fresh token unless a valid one exists by the time the login lock is held. The replaced token is
    /// logged out in the background.
    pub async fn login(&self) -> Result<(), MgmtError> {
        let _guard = self.login_lock.lock().await;
        if !self.token.expired() {
            return Ok(());
        }

        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self
                .perform(Method::GET, "/login", None, &HeaderMap::new(), Auth::Basic, "")
                .await
            {
                Ok(response) => response,
                Err(MgmtError::NoNodeAvailable) => return Err(self.exhausted(last_error)),
                Err(err) => {
                    debug!(client = self.name(), attempt, "login failed: {err}");
                    last_error = Some(err);
                    continue;
                }
            };

            let token = response
                .headers()
                .get(AUTH_TOKEN_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            if token.is_empty() {
                debug!(client = self.name(), attempt, "login returned no token");
                last_error = Some(MgmtError::MissingToken {
                    client: self.name().to_string(),
                });
                continue;
            }

            let previous = self.token.refresh(token);
            info!(client = self.name(), "logged in");
            if !previous.is_empty() {
                let client = self.clone();
                tokio::spawn(async move {
                    if let Err(err) = client.logout(&previous).await {
                        debug!(client = client.name(), "failed to log out replaced token: {err}");
                    }
                });
            }
            return Ok(());
        }

        Err(last_error.unwrap_or_else(|| MgmtError::MissingToken {
            client: self.name().to_string(),
        }))
    }

    pub async fn logout(&self, token: &str) -> Result<(), MgmtError> {
        self.perform(Method::GET, "/logout", None, &HeaderMap::new(), Auth::Token(token), "")
            .await?;
        debug!(client = self.name(), "logged out");
        Ok(())
    }

    /// Logs out a still valid token and forgets it.
    pub async fn close(&self) {
        let _guard = self.login_lock.lock().await;
        let (token, expired) = self.token.get();
        if !token.is_empty() && !expired {
            if let Err(err) = self.logout(&token).await {
                warn!(client = self.name(), "logout on close failed: {err}");
            }
        }
        self.token.clear();
    }

    /// A single request against one selected node, without retries.
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
        headers: &HeaderMap,
        auth: Auth<'_>,
        vdc: &str,
    ) -> Result<Response, MgmtError> {
        let node = self.upstream.next_available_node(vdc)?;
        let url = self.url_for(&node, path);
        trace!(client = self.name(), %method, %url, "sending request");

        let mut request = self.http.request(method.clone(), &url).headers(headers.clone());
        request = match auth {
            Auth::Basic => request.basic_auth(&self.settings.username, Some(&self.settings.password)),
            Auth::Token(token) => request.header(AUTH_TOKEN_HEADER, token),
        };
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => {
                if source.is_timeout() || source.is_connect() {
                    warn!(
                        client = self.name(),
                        node,
                        duration = ?self.settings.block_duration,
                        "blocking unreachable node"
                    );
                    self.upstream.block_node(&node, self.settings.block_duration);
                }
                return Err(MgmtError::Transport {
                    client: self.name().to_string(),
                    method,
                    url,
                    source,
                });
            }
        };

        let status = response.status();
        if (200..220).contains(&status.as_u16()) {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(MgmtError::Unauthorized {
                client: self.name().to_string(),
                method,
                url,
            });
        }
        Err(MgmtError::Status {
            client: self.name().to_string(),
            method,
            url,
            status,
        })
    }

    fn url_for(&self, address: &str, path: &str) -> String {
        let scheme = &self.settings.scheme;
        match split_host_port(address) {
            (_, Some(_)) => format!("{scheme}://{address}{path}"),
            (host, None) => format!("{scheme}://{host}:{}{path}", self.settings.port),
        }
    }

    /// Plain GET against the diagnostic port of a node. Neither authenticated nor retried.
    pub async fn get_auxiliary(&self, address: &str, path: &str) -> Result<String, MgmtError> {
        let (host, _) = split_host_port(address);
        let url = format!("http://{host}:{}{path}", self.settings.auxiliary_port);
        trace!(client = self.name(), %url, "sending diagnostic request");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| MgmtError::Transport {
                client: self.name().to_string(),
                method: Method::GET,
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(MgmtError::Status {
                client: self.name().to_string(),
                method: Method::GET,
                url,
                status,
            });
        }
        response.text().await.map_err(|source| MgmtError::Decode { url, source })
    }
}

/// Reads a JSON body, keeping the request URL for the error.
pub async fn read_json<T>(response: Response) -> Result<T, MgmtError>
where
    T: serde::de::DeserializeOwned,
{
    let url = response.url().to_string();
    response.json().await.map_err(|source| MgmtError::Decode { url, source })
}
