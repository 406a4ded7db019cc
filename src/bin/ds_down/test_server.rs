//! Mock Download Station server for tests.
//!
//! Answers requests with canned responses in order and records the requests it received.

use std::collections::HashMap;
use std::time::Duration;

use wiremock::matchers::any;
use wiremock::{Mock, Request, ResponseTemplate};

/// Canned HTTP response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    body: String,
}

/// Request received by the mock server.
#[derive(Debug)]
pub struct RecordedRequest(Request);

/// Mock server answering each request with the next canned response.
pub struct MockServer {
    /// Base URL of the server, e.g. `http://127.0.0.1:41234`
    pub url: String,
    server: wiremock::MockServer,
}

impl MockResponse {
    /// HTTP 200 response with a JSON body.
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    /// Empty response with the given status code.
    pub const fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    fn template(&self) -> ResponseTemplate {
        ResponseTemplate::new(self.status).set_body_raw(self.body.clone(), "application/json")
    }
}

impl RecordedRequest {
    pub fn method(&self) -> &str {
        self.0.method.as_str()
    }

    pub fn path(&self) -> &str {
        self.0.url.path()
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.0.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Decode a urlencoded form body.
    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(&self.0.body).into_owned().collect()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.0.body).into_owned()
    }
}

impl MockServer {
    /// Start a server that answers with the given responses in order.
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        let server = wiremock::MockServer::start().await;
        // The first mounted mock that still has uses left answers the request
        for response in responses {
            Mock::given(any())
                .respond_with(response.template())
                .up_to_n_times(1)
                .mount(&server)
                .await;
        }
        Self {
            url: server.uri(),
            server,
        }
    }

    /// Start a server that accepts requests but does not answer within any test timeout.
    pub async fn start_silent() -> Self {
        let server = wiremock::MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(60)))
            .mount(&server)
            .await;
        Self {
            url: server.uri(),
            server,
        }
    }

    /// URL of a local port nothing is listening on.
    pub async fn unused_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local address");
        drop(listener);
        format!("http://{address}")
    }

    /// Requests received so far, in arrival order.
    pub async fn requests(self) -> Vec<RecordedRequest> {
        self.server
            .received_requests()
            .await
            .expect("request recording is enabled")
            .into_iter()
            .map(RecordedRequest)
            .collect()
    }
}
