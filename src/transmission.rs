use crate::types::{Result, RpcArguments, RpcConfig, ShowTransmissionError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

/// Lowest `rpc-version-minimum` this client speaks.
pub const RPC_VERSION_MINIMUM: i64 = 1;

pub const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";

const RPC_CONTENT_TYPE: &str = "json; charset=UTF-8";
const SESSION_CONFLICT: u16 = 409;
const DUPLICATE_TORRENT: &str = "duplicate torrent";

/// Raw outcome of one POST to the RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    pub status: u16,
    /// Value of the session header, if the server sent one.
    pub session_id: Option<String>,
    pub body: String,
}

/// Moves one serialized request to the daemon and back.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, url: &Url, session_id: &str, body: &str) -> Result<RpcResponse>;
}

pub struct HttpTransport {
    client: Client,
    username: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.call_timeout)
            .build()?;

        Ok(Self {
            client,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, url: &Url, session_id: &str, body: &str) -> Result<RpcResponse> {
        let mut request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, RPC_CONTENT_TYPE)
            .header(SESSION_ID_HEADER, session_id)
            .body(body.to_string());

        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let session_id = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        Ok(RpcResponse {
            status,
            session_id,
            body,
        })
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<&'a RpcArguments>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    result: String,
    #[serde(default)]
    arguments: RpcArguments,
}

impl ResponseBody {
    fn is_success(&self) -> bool {
        self.result == "success"
    }

    fn into_error(self, method: &str) -> ShowTransmissionError {
        ShowTransmissionError::Rpc {
            method: method.to_string(),
            result: self.result,
            arguments: self.arguments,
        }
    }
}

/// Arguments of a `session-get` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(rename = "download-dir")]
    pub download_dir: String,
    #[serde(rename = "rpc-version-minimum")]
    pub rpc_version_minimum: i64,
    #[serde(rename = "rpc-version", default)]
    pub rpc_version: Option<i64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: RpcArguments,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionResult {
    Created(RpcArguments),
    /// The daemon already had this torrent; carries whatever arguments it sent back.
    AlreadyExists(RpcArguments),
}

impl SubmissionResult {
    pub fn arguments(&self) -> &RpcArguments {
        match self {
            SubmissionResult::Created(args) | SubmissionResult::AlreadyExists(args) => args,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, SubmissionResult::Created(_))
    }
}

/// Client for the Transmission JSON RPC endpoint.
///
/// Holds the session token the daemon hands out through HTTP 409 responses and
/// renews it transparently, a bounded number of times per call.
pub struct TransmissionClient<T = HttpTransport> {
    url: Url,
    host: String,
    session_id: String,
    transport: T,
    config: RpcConfig,
}

impl TransmissionClient<HttpTransport> {
    pub fn new(url: &str, config: RpcConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(url, transport, config)
    }
}

impl<T: RpcTransport> TransmissionClient<T> {
    pub fn with_transport(url: &str, transport: T, config: RpcConfig) -> Result<Self> {
        let url = Url::parse(url)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => String::new(),
        };

        Ok(Self {
            url,
            host,
            session_id: String::new(),
            transport,
            config,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn get_session(&mut self) -> Result<SessionInfo> {
        let arguments = self.request("session-get", None).await?;
        serde_json::from_value(Value::Object(arguments))
            .map_err(|e| ShowTransmissionError::Parse(format!("Invalid session-get arguments: {}", e)))
    }

    pub async fn get_download_dir(&mut self) -> Result<String> {
        Ok(self.get_session().await?.download_dir)
    }

    /// Fails unless the daemon's minimum RPC version is exactly the one we speak.
    pub async fn check_connection(&mut self) -> Result<()> {
        let session = self.get_session().await?;
        if session.rpc_version_minimum != RPC_VERSION_MINIMUM {
            return Err(ShowTransmissionError::UnsupportedRpcVersion {
                expected: RPC_VERSION_MINIMUM,
                actual: session.rpc_version_minimum,
            });
        }
        debug!(
            rpc_version = ?session.rpc_version,
            version = ?session.version,
            "Transmission connection verified"
        );
        Ok(())
    }

    #[instrument(skip_all, fields(host = %self.host, filename = %source_uri))]
    pub async fn add_torrent(
        &mut self,
        source_uri: &str,
        download_dir: Option<&str>,
    ) -> Result<SubmissionResult> {
        let mut arguments = RpcArguments::new();
        arguments.insert("filename".to_string(), Value::String(source_uri.to_string()));
        if let Some(dir) = download_dir {
            arguments.insert("download-dir".to_string(), Value::String(dir.to_string()));
        }

        let response = self.exchange("torrent-add", Some(&arguments)).await?;

        if response.is_success() {
            if response.arguments.contains_key("torrent-duplicate") {
                warn!("Already added torrent '{}'", source_uri);
                return Ok(SubmissionResult::AlreadyExists(response.arguments));
            }
            return Ok(SubmissionResult::Created(response.arguments));
        }

        if response.result.contains(DUPLICATE_TORRENT) {
            warn!("Already added torrent '{}'", source_uri);
            return Ok(SubmissionResult::AlreadyExists(response.arguments));
        }

        Err(response.into_error("torrent-add"))
    }

    /// Performs `method` and returns the response arguments, failing on any non-success result.
    pub async fn request(
        &mut self,
        method: &str,
        arguments: Option<RpcArguments>,
    ) -> Result<RpcArguments> {
        let response = self.exchange(method, arguments.as_ref()).await?;
        if !response.is_success() {
            return Err(response.into_error(method));
        }
        Ok(response.arguments)
    }

    #[instrument(skip_all, fields(host = %self.host, method = %method))]
    async fn exchange(
        &mut self,
        method: &str,
        arguments: Option<&RpcArguments>,
    ) -> Result<ResponseBody> {
        let body = serde_json::to_string(&RequestBody { method, arguments })?;
        debug!("Request data: {}", body);

        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let response = self.send_with_deadline(method, &body).await?;

            if response.status == SESSION_CONFLICT {
                let session_id = response.session_id.ok_or_else(|| {
                    ShowTransmissionError::HttpStatus {
                        status: response.status,
                        url: self.url.to_string(),
                    }
                })?;
                debug!(attempt, "Updating session id");
                self.session_id = session_id;
                continue;
            }

            if !(200..300).contains(&response.status) {
                return Err(ShowTransmissionError::HttpStatus {
                    status: response.status,
                    url: self.url.to_string(),
                });
            }

            let parsed: ResponseBody = serde_json::from_str(&response.body).map_err(|e| {
                ShowTransmissionError::Parse(format!("Invalid {} response: {}", method, e))
            })?;
            debug!(result = %parsed.result, "Response received");
            return Ok(parsed);
        }

        Err(ShowTransmissionError::SessionRenewalFailed {
            method: method.to_string(),
            attempts: max_attempts,
        })
    }

    async fn send_with_deadline(&self, method: &str, body: &str) -> Result<RpcResponse> {
        let deadline = self.config.call_timeout;
        tokio::time::timeout(deadline, self.transport.send(&self.url, &self.session_id, body))
            .await
            .map_err(|_| ShowTransmissionError::Timeout {
                operation: method.to_string(),
                timeout: deadline,
            })?
    }
}
