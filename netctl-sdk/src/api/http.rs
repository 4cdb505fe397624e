//! A wrapped HTTP client that is used for the control-plane APIs with the following features:
//! - Authenticate with an API key (HTTP basic authentication) or with OAuth2 client credentials.
//! - Cache the OAuth2 access token. A `401` response drops the cached token so the next request
//!   gets a new one. The rejected request itself is **not** sent again.
//! - Decode error responses into [`ApiError`].
//!
//! Here is an example to create a client and dispatch a request:
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use netctl_sdk::api::http::{self, Auth, Client, ClientOptions};
//! use reqwest::{Method, StatusCode};
//!
//! async fn run() -> Result<(), http::Error> {
//!     let opts = ClientOptions {
//!         base_url: "https://control.example.com".to_string(),
//!         auth: Auth::ApiKey("API_KEY".to_string()),
//!         timeout: Some(Duration::from_secs(10)),
//!     };
//!     let client = Client::new(opts)?;
//!     let req = client.new_request(Method::GET, "/api/v2/device/DEVICE_ID/routes", None)?;
//!     let (status, body) = client.send_request(req).await?;
//!     if status != StatusCode::OK {
//!         return Err(http::handle_error_response(status, &body));
//!     }
//!     Ok(())
//! }
//! ```

use std::{
    error::Error as StdError,
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use log::{debug, warn};
use reqwest::{Client as ReqwestClient, Method, Request, RequestBuilder, StatusCode, header};
use serde::Deserialize;

/// The HTTP client to request the control-plane APIs.
///
/// Cloned clients share the same connection pool and the same cached access token.
#[derive(Clone)]
pub struct Client {
    /// The underlying HTTP client instance.
    client: ReqwestClient,
    /// API base path with scheme, without the trailing slash.
    base_url: String,
    /// Credentials.
    auth: Auth,
    /// The OAuth2 access token.
    access_token: Arc<Mutex<Option<String>>>,
}

/// Options of the HTTP client [`Client`].
pub struct ClientOptions {
    /// API base path with scheme. For example `https://control.example.com`.
    pub base_url: String,
    /// Credentials.
    pub auth: Auth,
    /// Timeout of one request, from connecting until the response body has been read.
    /// `None` means no timeout.
    pub timeout: Option<Duration>,
}

/// Credentials of the client.
#[derive(Clone, Default)]
pub enum Auth {
    /// Send requests without credentials.
    #[default]
    None,
    /// API key. Sent with HTTP basic authentication as the user name with an empty password.
    ApiKey(String),
    /// OAuth2 client using the `client_credentials` grant type.
    Oauth2 {
        client_id: String,
        client_secret: String,
    },
}

/// Errors of the control-plane APIs.
#[derive(Debug)]
pub enum Error {
    /// The request could not be built, such as a malformed URL.
    Request(Box<dyn StdError + Send + Sync>),
    /// The HTTP exchange failed: connection, timeout or reading the response body.
    Transport(reqwest::Error),
    /// The token API rejected the client credentials.
    Oauth2(Oauth2Error),
    /// The API responded with an error.
    Api(ApiError),
    /// The response body does not match the expected format.
    MalformedResponse(serde_json::Error),
    /// An error of the API operation `op`.
    Context {
        op: &'static str,
        source: Box<Error>,
    },
}

/// The OAuth2 error response.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Oauth2Error {
    /// Error code.
    pub error: String,
    /// Detail message.
    pub error_description: Option<String>,
}

/// The API error response.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ApiError {
    /// HTTP status code of the response.
    #[serde(skip)]
    pub status: u16,
    /// Detail message.
    #[serde(default)]
    pub message: String,
}

/// Response from OAuth2 token API.
#[derive(Deserialize)]
struct Oauth2TokenRes {
    access_token: String,
}

const TOKEN_PATH: &'static str = "/api/v2/oauth/token";

impl Client {
    /// Create an instance.
    pub fn new(opts: ClientOptions) -> Result<Self, Error> {
        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = opts.timeout {
            builder = builder.timeout(timeout);
        }
        let client = match builder.build() {
            Err(e) => return Err(Error::Request(Box::new(e))),
            Ok(client) => client,
        };
        Ok(Client {
            client,
            base_url: opts.base_url.trim_end_matches('/').to_string(),
            auth: opts.auth,
            access_token: Arc::new(Mutex::new(None)),
        })
    }

    /// The API base path.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Build a request of an API.
    /// - `api_path` is the path (of the base path) of the API with query string.
    ///   For example `/api/v2/device/123/routes`.
    /// - `body` **MUST** be JSON format.
    pub fn new_request(
        &self,
        method: Method,
        api_path: &str,
        body: Option<Bytes>,
    ) -> Result<Request, Error> {
        let url = format!("{}{}", self.base_url, api_path);
        let mut builder = self.client.request(method, url.as_str());
        if let Some(body) = body {
            builder = builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }
        match builder.build() {
            Err(e) => Err(Error::Request(Box::new(e))),
            Ok(req) => Ok(req),
        }
    }

    /// Execute a request with credentials and read the whole response body.
    ///
    /// Any status code is returned as is. Use [`handle_error_response`] for unexpected ones.
    pub async fn send_request(&self, req: Request) -> Result<(StatusCode, Bytes), Error> {
        let builder = RequestBuilder::from_parts(self.client.clone(), req);
        let builder = match &self.auth {
            Auth::None => builder,
            Auth::ApiKey(key) => builder.basic_auth(key, Some("")),
            Auth::Oauth2 { .. } => builder.bearer_auth(self.access_token().await?),
        };
        let req = match builder.build() {
            Err(e) => return Err(Error::Request(Box::new(e))),
            Ok(req) => req,
        };
        let method = req.method().clone();
        let url = req.url().to_string();

        let resp = match self.client.execute(req).await {
            Err(e) => {
                warn!("{} {} failed: {}", method, url, e);
                return Err(Error::Transport(e));
            }
            Ok(resp) => resp,
        };
        let status = resp.status();
        let body = match resp.bytes().await {
            Err(e) => {
                warn!("{} {} read body failed: {}", method, url, e);
                return Err(Error::Transport(e));
            }
            Ok(body) => body,
        };
        debug!("{} {} {}", method, url, status.as_u16());

        if status == StatusCode::UNAUTHORIZED {
            if let Auth::Oauth2 { .. } = self.auth {
                self.access_token
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
            }
        }
        Ok((status, body))
    }

    /// Get the cached access token or request a new one.
    async fn access_token(&self) -> Result<String, Error> {
        let token = self
            .access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            None => self.auth_token().await,
            Some(token) => Ok(token),
        }
    }

    /// To authorize the client and get an access token.
    async fn auth_token(&self) -> Result<String, Error> {
        let (client_id, client_secret) = match &self.auth {
            Auth::Oauth2 {
                client_id,
                client_secret,
            } => (client_id.as_str(), client_secret.as_str()),
            _ => return Err(Error::Request("no client credentials".into())),
        };
        let url = format!("{}{}", self.base_url, TOKEN_PATH);
        let body = [("grant_type", "client_credentials")];
        let req = match self
            .client
            .request(Method::POST, url.as_str())
            .basic_auth(client_id, Some(client_secret))
            .form(&body)
            .build()
        {
            Err(e) => return Err(Error::Request(Box::new(e))),
            Ok(req) => req,
        };
        let resp = match self.client.execute(req).await {
            Err(e) => {
                warn!("POST {} failed: {}", url, e);
                return Err(Error::Transport(e));
            }
            Ok(resp) => resp,
        };
        let status = resp.status();
        let body = match resp.bytes().await {
            Err(e) => return Err(Error::Transport(e)),
            Ok(body) => body,
        };
        if status != StatusCode::OK {
            warn!("client {} is rejected with status {}", client_id, status.as_u16());
            return match serde_json::from_slice::<Oauth2Error>(&body) {
                Err(e) => Err(Error::MalformedResponse(e)),
                Ok(err) => Err(Error::Oauth2(err)),
            };
        }
        let tokens = match serde_json::from_slice::<Oauth2TokenRes>(&body) {
            Err(e) => return Err(Error::MalformedResponse(e)),
            Ok(tokens) => tokens,
        };
        debug!("client {} got a new access token", client_id);

        *self
            .access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tokens.access_token.clone());
        Ok(tokens.access_token)
    }
}

impl Error {
    /// Wrap the error with the name of the operation that produced it.
    pub fn context(self, op: &'static str) -> Self {
        Error::Context {
            op,
            source: Box::new(self),
        }
    }

    /// The innermost error without operation names.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            _ => self,
        }
    }

    /// The name of the outermost operation.
    pub fn op(&self) -> Option<&'static str> {
        match self {
            Error::Context { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// The API error response, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self.root() {
            Error::Api(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if the request has been aborted by the client timeout.
    pub fn is_timeout(&self) -> bool {
        match self.root() {
            Error::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Request(e) => write!(f, "request error: {}", e),
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Oauth2(e) => write!(f, "{}", e),
            Error::Api(e) => write!(f, "{}", e),
            Error::MalformedResponse(e) => write!(f, "malformed response: {}", e),
            Error::Context { op, source } => write!(f, "{}: {}", op, source),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Request(e) => Some(e.as_ref()),
            Error::Transport(e) => Some(e),
            Error::Oauth2(_) => None,
            Error::Api(_) => None,
            Error::MalformedResponse(e) => Some(e),
            Error::Context { source, .. } => Some(source.as_ref()),
        }
    }
}

impl fmt::Display for Oauth2Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.error_description.as_ref() {
            None => write!(f, "oauth2 error: {}", self.error),
            Some(desc) => write!(f, "oauth2 error: {} ({})", self.error, desc),
        }
    }
}

impl StdError for Oauth2Error {}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "status: {}, message: {:?}", self.status, self.message)
    }
}

impl StdError for ApiError {}

/// Decode an error response into [`Error::Api`].
///
/// The body is expected to be a JSON object like `{"message":"device not found"}`. Other fields
/// are ignored. Returns [`Error::MalformedResponse`] if the body is not such an object.
pub fn handle_error_response(status: StatusCode, body: &[u8]) -> Error {
    match serde_json::from_slice::<ApiError>(body) {
        Err(e) => Error::MalformedResponse(e),
        Ok(mut err) => {
            err.status = status.as_u16();
            Error::Api(err)
        }
    }
}
