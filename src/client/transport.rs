//! Authenticated JSON requests against the CircleCI v2 REST API.

use std::fmt;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::{AuthMethod, ProviderConfig};
use crate::error::{ApiError, ProviderError};

/// Query parameter carrying the token for [`AuthMethod::Query`].
pub const TOKEN_QUERY_PARAM: &str = "circle-token";

const JSON: &str = "application/json";

/// A request relative to the API base URL.
///
/// Path segments are percent-encoded individually, so a segment may contain
/// `/` or `.` without changing the route.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path segments below the base URL.
    pub segments: Vec<String>,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Create a request without query or body.
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    /// GET request.
    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::GET, segments)
    }

    /// POST request.
    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::POST, segments)
    }

    /// PUT request.
    pub fn put<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::PUT, segments)
    }

    /// PATCH request.
    pub fn patch<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::PATCH, segments)
    }

    /// DELETE request.
    pub fn delete<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::DELETE, segments)
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path for log and error output: segments joined by `/`, no query.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

/// HTTP client bound to one API root and token.
#[derive(Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    auth_method: AuthMethod,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

impl Transport {
    /// Build a transport from the provider configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));

        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.url.clone(),
            token: config.api_token.clone(),
            auth_method: config.auth_method,
        })
    }

    /// The API root requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL of `request`, without credentials.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::Configuration(format!(
                    "url '{}' cannot be used as an API root",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(&request.segments);

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    /// Send `request` and return the raw body of a successful response.
    ///
    /// A status of 300 or above becomes [`ProviderError::Api`]; failures to
    /// reach the server or read the body become [`ProviderError::Transport`].
    pub async fn execute(&self, request: &ApiRequest) -> Result<Vec<u8>, ProviderError> {
        let url = self.url_for(request)?;
        let path = request.path();
        let transport_error = |source: reqwest::Error| ProviderError::Transport {
            method: request.method.to_string(),
            path: path.clone(),
            source,
        };

        let mut builder = self.http.request(request.method.clone(), url);
        builder = match self.auth_method {
            AuthMethod::Basic => builder.basic_auth(&self.token, Some("")),
            AuthMethod::Query => builder.query(&[(TOKEN_QUERY_PARAM, self.token.as_str())]),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %path, "sending CircleCI API request");

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        debug!(
            method = %request.method,
            path = %path,
            status = status.as_u16(),
            bytes = body.len(),
            "received CircleCI API response"
        );

        if status.as_u16() >= 300 {
            return Err(ApiError::from_body(status.as_u16(), &body).into());
        }
        Ok(body.to_vec())
    }

    /// Send `request` and deserialize the response body.
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, ProviderError> {
        let body = self.execute(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Send `request` and ignore the response body.
    pub async fn call_empty(&self, request: &ApiRequest) -> Result<(), ProviderError> {
        self.execute(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer, auth_method: AuthMethod) -> Transport {
        let config = ProviderConfig::new("tok3n")
            .unwrap()
            .with_url(&server.uri())
            .unwrap()
            .with_auth_method(auth_method);
        Transport::new(&config).unwrap()
    }

    #[test]
    fn test_url_keeps_base_path_and_encodes_segments() {
        let config = ProviderConfig::new("t").unwrap();
        let transport = Transport::new(&config).unwrap();

        let request = ApiRequest::get(["project", "github", "acme", "web", "envvar", "API_KEY"]);
        let url = transport.url_for(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://circleci.com/api/v2/project/github/acme/web/envvar/API_KEY"
        );

        let request = ApiRequest::get(["context", "team/prod"]).with_query("page-token", "a b");
        let url = transport.url_for(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://circleci.com/api/v2/context/team%2Fprod?page-token=a+b"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ProviderConfig::new("very-secret").unwrap();
        let transport = Transport::new(&config).unwrap();
        assert!(!format!("{:?}", transport).contains("very-secret"));
    }

    #[tokio::test]
    async fn test_basic_auth_and_json_headers() {
        let server = MockServer::start().await;
        // base64("tok3n:")
        Mock::given(method("POST"))
            .and(path("/context"))
            .and(header("authorization", "Basic dG9rM246"))
            .and(header("accept", "application/json"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"name": "deploy"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "c1"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server, AuthMethod::Basic);
        let created: Value = transport
            .call(&ApiRequest::post(["context"]).with_body(json!({"name": "deploy"})))
            .await
            .unwrap();
        assert_eq!(created["id"], "c1");
    }

    #[tokio::test]
    async fn test_query_auth() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/schedule/s1"))
            .and(query_param(TOKEN_QUERY_PARAM, "tok3n"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server, AuthMethod::Query);
        transport
            .call_empty(&ApiRequest::delete(["schedule", "s1"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_status_with_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/context/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Context not found"})),
            )
            .mount(&server)
            .await;

        let transport = transport_for(&server, AuthMethod::Basic);
        let err = transport
            .call::<Value>(&ApiRequest::get(["context", "missing"]))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.message(), "Context not found");
    }

    #[tokio::test]
    async fn test_error_status_with_unparseable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let transport = transport_for(&server, AuthMethod::Basic);
        let err = transport
            .execute(&ApiRequest::get(["me"]))
            .await
            .unwrap_err();

        match err {
            ProviderError::Api(api) => {
                assert_eq!(api.status, 502);
                assert!(api.message.is_none());
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let config = ProviderConfig::new("tok3n")
            .unwrap()
            .with_url(&format!("http://{}", address))
            .unwrap();
        let transport = Transport::new(&config).unwrap();

        let err = transport
            .execute(&ApiRequest::get(["me"]))
            .await
            .unwrap_err();
        match &err {
            ProviderError::Transport { method, path, .. } => {
                assert_eq!(method, "GET");
                assert_eq!(path, "me");
            },
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_retryable());
    }
}
