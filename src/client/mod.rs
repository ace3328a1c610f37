use futures::future::join_all;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::interceptor::ScopeInterceptor;
use crate::scope::{BlockOption, DistrictOption, SchoolOption};
use crate::session::{SessionService, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// HTTP client for the dashboard backend.
///
/// Every request starts from the session's default headers and passes through
/// the [`ScopeInterceptor`] right before dispatch. Non-success statuses come
/// back as errors unchanged; nothing is retried.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: SessionService,
    interceptor: ScopeInterceptor,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: SessionService, interceptor: ScopeInterceptor) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("edudash/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url()?,
            session,
            interceptor,
        })
    }

    pub fn session(&self) -> &SessionService {
        &self.session
    }

    /// Resolve `path` against the backend. Paths that resolve to another
    /// origin (absolute or `//host` references) are rejected so the session
    /// headers never leave the backend.
    pub fn url(&self, path: &str) -> ClientResult<Url> {
        let url = self.base_url.join(path)?;
        if url.origin() != self.base_url.origin() {
            return Err(ClientError::Config(format!(
                "'{}' resolves outside the backend origin {}",
                path,
                self.base_url.origin().ascii_serialization()
            )));
        }
        Ok(url)
    }

    /// Absolute API path built from raw segments, each percent-encoded
    fn api_path(&self, segments: &[&str]) -> ClientResult<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("backend URL cannot carry a path".to_string()))?
            .clear()
            .extend(segments);
        Ok(url.path().to_string())
    }

    /// Build a request carrying the session's default headers
    pub fn request(&self, method: Method, path: &str, query: &[(&str, &str)]) -> ClientResult<Request> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let mut request = Request::new(method, url);
        for (name, value) in self.session.default_headers().iter() {
            request.headers_mut().insert(name.clone(), value.clone());
        }
        Ok(request)
    }

    /// Intercept, dispatch and check the status of `request`
    pub async fn execute(&self, request: Request) -> ClientResult<Response> {
        let request = self.interceptor.apply(request);
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!("{} {}", method, url);

        let response = self.http.execute(request).await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!("{} {} failed with {}", method, url, status);
        Err(ClientError::from_status(status, &body))
    }

    async fn execute_json(&self, request: Request) -> ClientResult<Value> {
        let response = self.execute(request).await?;
        let body = response.text().await.map_err(transport_error)?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Scoped GET: the interceptor merges the current scope into `query`
    pub async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> ClientResult<Value> {
        let request = self.request(Method::GET, path, query)?;
        self.execute_json(request).await
    }

    /// GET that bypasses scope injection, for reference data such as the
    /// district list behind a selector
    pub async fn get_unscoped(&self, path: &str, query: &[(&str, &str)]) -> ClientResult<Value> {
        let mut request = self.request(Method::GET, path, query)?;
        let (name, value) = self.interceptor.opt_out();
        request.headers_mut().insert(name, value);
        self.execute_json(request).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> ClientResult<Value> {
        let mut request = self.request(Method::POST, path, &[])?;
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *request.body_mut() = Some(serde_json::to_vec(body)?.into());
        self.execute_json(request).await
    }

    /// Fetch several endpoints concurrently; each result stands alone
    pub async fn get_many(&self, paths: &[String]) -> Vec<(String, ClientResult<Value>)> {
        let results = join_all(paths.iter().map(|path| self.get_json(path, &[]))).await;
        paths.iter().cloned().zip(results).collect()
    }

    /// Perform the login exchange, persist its result and open the session
    pub async fn authenticate(&self, email: &str, password: &str) -> ClientResult<User> {
        let mut request = self.request(Method::POST, "/api/auth/login", &[])?;
        let (name, value) = self.interceptor.opt_out();
        request.headers_mut().insert(name, value);
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = json!({ "email": email, "password": password });
        *request.body_mut() = Some(serde_json::to_vec(&body)?.into());

        let response: LoginResponse = serde_json::from_value(self.execute_json(request).await?)?;
        if !response.token_type.eq_ignore_ascii_case("bearer") {
            return Err(ClientError::Config(format!(
                "unsupported token type '{}'",
                response.token_type
            )));
        }

        self.session.persist_credentials(&response.access_token, &response.user)?;
        self.session.login(response.user.clone());
        Ok(response.user)
    }

    pub async fn whoami(&self) -> ClientResult<Value> {
        self.get_json("/api/auth/me", &[]).await
    }

    pub async fn districts(&self) -> ClientResult<Vec<DistrictOption>> {
        let value = self.get_unscoped("/api/scope/districts", &[]).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn blocks(&self, district_code: &str) -> ClientResult<Vec<BlockOption>> {
        let path = self.api_path(&["api", "scope", "districts", district_code, "blocks"])?;
        let value = self.get_unscoped(&path, &[]).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn schools(&self, block_code: &str, search: Option<&str>, limit: u32) -> ClientResult<Vec<SchoolOption>> {
        let path = self.api_path(&["api", "scope", "blocks", block_code, "schools"])?;
        let limit = limit.to_string();
        let mut query = vec![("limit", limit.as_str())];
        if let Some(q) = search {
            query.push(("q", q));
        }
        let value = self.get_unscoped(&path, &query).await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout(e.to_string())
    } else {
        ClientError::Http(e)
    }
}
