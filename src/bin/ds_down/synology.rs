//! Synology Download Station Web API client module.
//!
//! Provides functions to interact with the Download Station Web API
//! for authentication and creating download tasks.
//!
//! Documentation:
//! <https://global.download.synology.com/download/Document/Software/DeveloperGuide/Package/DownloadStation/All/enu/Synology_Download_Station_Web_API.pdf>

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::error::{AuthError, Error, ServiceError, TransportError, ValidationError, is_session_error};
use crate::task::{Task, TaskId};

/// Authentication API endpoint.
const AUTH_ENDPOINT: &str = "auth.cgi";
/// Download Station task API endpoint.
const TASK_ENDPOINT: &str = "DownloadStation/task.cgi";
/// Session name for Download Station.
const SESSION_NAME: &str = "DownloadStation";

/// Authenticated Download Station session.
///
/// The session id is only sent to the NAS and never printed.
#[derive(Debug)]
pub struct Session {
    sid: SecretString,
}

impl Session {
    /// The session token.
    #[must_use]
    pub fn token(&self) -> &str {
        self.sid.expose_secret()
    }
}

/// Download Station Web API client.
#[derive(Debug)]
pub struct DownloadStationClient {
    client: Client,
    base_url: String,
}

/// Common response envelope of all Synology Web API calls.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    sid: String,
}

impl DownloadStationClient {
    /// Create a new Download Station client.
    ///
    /// # Arguments
    /// * `host` - NAS base URL (e.g., `https://nas.local:5001`)
    /// * `accept_invalid_certs` - Skip TLS certificate verification
    /// * `timeout` - Connect and total timeout for each request
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(host: &Url, accept_invalid_certs: bool, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = format!("{}/webapi", host.as_str().trim_end_matches('/'));
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(timeout)
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::Request)?;

        Ok(Self { client, base_url })
    }

    /// Authenticate with Download Station.
    ///
    /// The password is dropped as soon as the request body has been built.
    ///
    /// # Errors
    /// Returns an error if the NAS rejects the credentials or cannot be reached.
    pub async fn login(&self, username: &str, password: SecretString) -> Result<Session, Error> {
        let url = self.build_url(AUTH_ENDPOINT);
        debug!("Logging in to {url} as {username}");

        let request = self.client.post(&url).form(&[
            ("api", "SYNO.API.Auth"),
            ("version", "2"),
            ("method", "login"),
            ("account", username),
            ("passwd", password.expose_secret()),
            ("session", SESSION_NAME),
            ("format", "sid"),
        ]);
        drop(password);

        let response = request.send().await?;
        let api_response = read_response(response, "login").await?;
        if !api_response.success {
            return Err(AuthError::from_code(error_code(&api_response, "login")?).into());
        }

        let data: LoginData = api_response
            .data
            .map(serde_json::from_value::<LoginData>)
            .transpose()
            .map_err(|error| invalid_response("login", error.to_string()))?
            .filter(|data| !data.sid.is_empty())
            .ok_or_else(|| invalid_response("login", "missing session id".to_string()))?;

        info!("Logged in as {username}");
        Ok(Session {
            sid: SecretString::from(data.sid),
        })
    }

    /// Log out and end the session.
    ///
    /// # Errors
    /// Returns an error if the logout request fails.
    pub async fn logout(&self, session: Session) -> Result<(), Error> {
        let url = self.build_url(AUTH_ENDPOINT);
        debug!("Logging out from {url}");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("api", "SYNO.API.Auth"),
                ("version", "1"),
                ("method", "logout"),
                ("session", SESSION_NAME),
                ("_sid", session.token()),
            ])
            .send()
            .await?;

        let api_response = read_response(response, "logout").await?;
        if api_response.success {
            info!("Logged out");
            Ok(())
        } else {
            Err(AuthError::from_code(error_code(&api_response, "logout")?).into())
        }
    }

    /// Create a download task.
    ///
    /// URLs and magnet links are sent as the `uri` parameter,
    /// local files are uploaded as a multipart form.
    /// Returns the task id if Download Station reports one.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the session is rejected,
    /// Download Station refuses the task, or the request fails.
    pub async fn create_task(&self, session: &Session, task: &Task) -> Result<Option<TaskId>, Error> {
        let url = self.build_url(TASK_ENDPOINT);
        let params = [
            ("api", "SYNO.DownloadStation.Task"),
            ("version", "1"),
            ("method", "create"),
            ("session", SESSION_NAME),
            ("_sid", session.token()),
        ];

        let request = match task {
            Task::Magnet(uri) | Task::RemoteUrl(uri) => {
                debug!("Adding {}: {uri}", task.kind());
                let mut form: Vec<(&str, &str)> = params.to_vec();
                form.push(("uri", uri.as_str()));
                self.client.post(&url).form(&form)
            }
            Task::LocalFile(path) => {
                debug!("Uploading file: {}", path.display());
                let file_part = file_part(path).await?;
                // The file has to be the last field of the form
                let form = params
                    .into_iter()
                    .fold(Form::new(), |form, (key, value)| form.text(key.to_string(), value.to_string()))
                    .part("file", file_part);
                self.client.post(&url).multipart(form)
            }
        };

        let response = request.send().await?;
        let api_response = read_response(response, "create task").await?;
        if !api_response.success {
            let code = error_code(&api_response, "create task")?;
            return Err(if is_session_error(code) {
                AuthError::from_code(code).into()
            } else {
                ServiceError::from_code(code).into()
            });
        }

        Ok(api_response.data.as_ref().and_then(task_id))
    }

    /// Build full API url from the base url and given endpoint.
    fn build_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }
}

/// Read a local file into a multipart file part.
async fn file_part(path: &Path) -> Result<Part, Error> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ValidationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let filename = ds_down::path_to_filename_string(path);
    let mime_type = if filename.to_lowercase().ends_with(".torrent") {
        "application/x-bittorrent"
    } else {
        "application/octet-stream"
    };

    Ok(Part::bytes(bytes)
        .file_name(filename)
        .mime_str(mime_type)
        .map_err(TransportError::Request)?)
}

/// Check the HTTP status and parse the JSON envelope.
async fn read_response(response: Response, endpoint: &'static str) -> Result<ApiResponse, TransportError> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(TransportError::Status { endpoint, status });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|error| invalid_response(endpoint, error.to_string()))
}

/// Get the error code from a failed response.
fn error_code(response: &ApiResponse, endpoint: &'static str) -> Result<i64, TransportError> {
    response
        .error
        .as_ref()
        .map(|error| error.code)
        .ok_or_else(|| invalid_response(endpoint, "request failed without an error code".to_string()))
}

/// Extract a task id from response data when present.
///
/// Accepts both a single id and a list of ids.
fn task_id(data: &Value) -> Option<TaskId> {
    match data.get("task_id")? {
        Value::String(id) => Some(TaskId(id.clone())),
        Value::Array(ids) => ids.iter().find_map(Value::as_str).map(|id| TaskId(id.to_string())),
        _ => None,
    }
}

fn invalid_response(endpoint: &'static str, reason: String) -> TransportError {
    TransportError::InvalidResponse { endpoint, reason }
}

#[cfg(test)]
mod test_login {
    use super::*;

    use crate::test_server::{MockResponse, MockServer};

    fn client(server_url: &str) -> DownloadStationClient {
        let host = Url::parse(server_url).expect("valid url");
        DownloadStationClient::new(&host, false, Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn success_returns_session_token() {
        let server = MockServer::start(vec![MockResponse::json(
            r#"{"data":{"sid":"abc123"},"success":true}"#,
        )])
        .await;

        let session = client(&server.url)
            .login("admin", SecretString::from("hunter2"))
            .await
            .expect("login should succeed");
        assert_eq!(session.token(), "abc123");

        let requests = server.requests().await;
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method(), "POST");
        assert_eq!(request.path(), "/webapi/auth.cgi");

        let form = request.form();
        assert_eq!(form["api"], "SYNO.API.Auth");
        assert_eq!(form["version"], "2");
        assert_eq!(form["method"], "login");
        assert_eq!(form["account"], "admin");
        assert_eq!(form["passwd"], "hunter2");
        assert_eq!(form["session"], "DownloadStation");
        assert_eq!(form["format"], "sid");
    }

    #[tokio::test]
    async fn bad_credentials_return_auth_error_with_code() {
        let server = MockServer::start(vec![MockResponse::json(r#"{"error":{"code":400},"success":false}"#)]).await;

        let error = client(&server.url)
            .login("admin", SecretString::from("wrong"))
            .await
            .expect_err("login should fail");
        match error {
            Error::Auth(auth) => {
                assert_eq!(auth.code, 400);
                assert_eq!(auth.message, "No such account or incorrect password");
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn two_factor_code_has_own_reason() {
        let server = MockServer::start(vec![MockResponse::json(r#"{"error":{"code":403},"success":false}"#)]).await;

        let error = client(&server.url)
            .login("admin", SecretString::from("hunter2"))
            .await
            .expect_err("login should fail");
        assert!(matches!(error, Error::Auth(AuthError { code: 403, .. })));
    }

    #[tokio::test]
    async fn http_error_status_is_transport_error() {
        let server = MockServer::start(vec![MockResponse::status(502)]).await;

        let error = client(&server.url)
            .login("admin", SecretString::from("hunter2"))
            .await
            .expect_err("login should fail");
        assert!(matches!(
            error,
            Error::Transport(TransportError::Status {
                status: StatusCode::BAD_GATEWAY,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_response() {
        let server = MockServer::start(vec![MockResponse::json("<html>DSM</html>")]).await;

        let error = client(&server.url)
            .login("admin", SecretString::from("hunter2"))
            .await
            .expect_err("login should fail");
        assert!(matches!(error, Error::Transport(TransportError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn success_without_sid_is_invalid_response() {
        let server = MockServer::start(vec![MockResponse::json(r#"{"success":true}"#)]).await;

        let error = client(&server.url)
            .login("admin", SecretString::from("hunter2"))
            .await
            .expect_err("login should fail");
        assert!(matches!(error, Error::Transport(TransportError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn success_with_empty_sid_is_invalid_response() {
        let server = MockServer::start(vec![MockResponse::json(r#"{"data":{"sid":""},"success":true}"#)]).await;

        let error = client(&server.url)
            .login("admin", SecretString::from("hunter2"))
            .await
            .expect_err("login should fail");
        assert!(matches!(error, Error::Transport(TransportError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn session_debug_output_hides_sid() {
        let server = MockServer::start(vec![MockResponse::json(
            r#"{"data":{"sid":"abc123"},"success":true}"#,
        )])
        .await;

        let session = client(&server.url)
            .login("admin", SecretString::from("hunter2"))
            .await
            .expect("login should succeed");
        assert_eq!(session.token(), "abc123");
        assert!(!format!("{session:?}").contains("abc123"));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let url = MockServer::unused_url().await;
        let started = std::time::Instant::now();

        let error = client(&url)
            .login("admin", SecretString::from("hunter2"))
            .await
            .expect_err("nothing is listening");
        assert!(matches!(error, Error::Transport(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unresponsive_host_times_out() {
        let server = MockServer::start_silent().await;
        let host = Url::parse(&server.url).expect("valid url");
        let client = DownloadStationClient::new(&host, false, Duration::from_millis(300)).expect("client");
        let started = std::time::Instant::now();

        let error = client
            .login("admin", SecretString::from("hunter2"))
            .await
            .expect_err("server never answers");
        assert!(matches!(error, Error::Transport(TransportError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn host_path_prefix_is_kept() {
        let server = MockServer::start(vec![MockResponse::json(r#"{"data":{"sid":"abc123"},"success":true}"#)]).await;
        let host = Url::parse(&format!("{}/nas/", server.url)).expect("valid url");
        let client = DownloadStationClient::new(&host, false, Duration::from_secs(5)).expect("client");

        client
            .login("admin", SecretString::from("hunter2"))
            .await
            .expect("login should succeed");
        let requests = server.requests().await;
        assert_eq!(requests[0].path(), "/nas/webapi/auth.cgi");
    }
}



#[cfg(test)]
mod test_task_id {
    use super::*;

    use serde_json::json;

    #[test]
    fn single_id() {
        assert_eq!(task_id(&json!({"task_id": "dbid_1"})), Some(TaskId("dbid_1".to_string())));
    }

    #[test]
    fn first_of_list() {
        assert_eq!(
            task_id(&json!({"task_id": ["dbid_1", "dbid_2"]})),
            Some(TaskId("dbid_1".to_string()))
        );
    }

    #[test]
    fn missing_or_other_type() {
        assert_eq!(task_id(&json!({})), None);
        assert_eq!(task_id(&json!({"task_id": 5})), None);
    }
}
