//! Per-request credential and scope injection.
//!
//! Runs synchronously right before dispatch. It reads persisted state on
//! every call and never fails outward: when anything goes wrong the request
//! is dispatched exactly as the caller built it.

use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Request;
use serde_json::Value;
use url::{Origin, Url};

use crate::auth::bearer_value;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::scope::ScopeField;
use crate::storage::{Storage, SCOPE_KEY, TOKEN_KEY};

/// Changes computed for a request; applying them cannot fail
#[derive(Debug, Default, PartialEq)]
struct Injection {
    authorization: Option<HeaderValue>,
    params: Vec<(&'static str, String)>,
}

impl Injection {
    fn is_empty(&self) -> bool {
        self.authorization.is_none() && self.params.is_empty()
    }
}

#[derive(Clone)]
pub struct ScopeInterceptor {
    storage: Arc<dyn Storage>,
    origin: Origin,
    api_prefix: String,
    skip_header: HeaderName,
    skip_value: String,
}

impl ScopeInterceptor {
    pub fn new(storage: Arc<dyn Storage>, config: &ClientConfig) -> ClientResult<Self> {
        let base = config.base_url()?;
        let skip_header = HeaderName::from_bytes(config.scope.skip_header.as_bytes()).map_err(|e| {
            ClientError::Config(format!("invalid skip header '{}': {}", config.scope.skip_header, e))
        })?;
        let prefix = config.api.api_prefix.trim_end_matches('/');
        let api_prefix = if prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{}", prefix)
        };

        Ok(Self {
            storage,
            origin: base.origin(),
            api_prefix,
            skip_header,
            skip_value: config.scope.skip_value.clone(),
        })
    }

    pub fn skip_header(&self) -> &HeaderName {
        &self.skip_header
    }

    /// Header pair that opts a request out of scope injection
    pub fn opt_out(&self) -> (HeaderName, HeaderValue) {
        let value = HeaderValue::from_str(&self.skip_value).unwrap_or_else(|_| HeaderValue::from_static("1"));
        (self.skip_header.clone(), value)
    }

    /// Attach the credential and merge the current scope into `request`.
    pub fn apply(&self, mut request: Request) -> Request {
        match self.plan(&request) {
            Ok(Some(injection)) => {
                if let Some(value) = injection.authorization {
                    request.headers_mut().insert(AUTHORIZATION, value);
                }
                if !injection.params.is_empty() {
                    let mut pairs = request.url_mut().query_pairs_mut();
                    for (key, value) in &injection.params {
                        pairs.append_pair(key, value);
                    }
                }
                request
            }
            Ok(None) => request,
            Err(e) => {
                tracing::warn!("Scope interceptor skipped {}: {}", request.url(), e);
                request
            }
        }
    }

    fn plan(&self, request: &Request) -> ClientResult<Option<Injection>> {
        if self.is_opted_out(request) {
            tracing::trace!("Scope injection opted out for {}", request.url());
            return Ok(None);
        }
        if !self.targets_api(request.url()) {
            return Ok(None);
        }

        let mut injection = Injection::default();

        if !request.headers().contains_key(AUTHORIZATION) {
            if let Some(token) = self.storage.get_item(TOKEN_KEY)?.filter(|t| !t.is_empty()) {
                injection.authorization = Some(bearer_value(&token)?);
            }
        }

        injection.params = self.scope_params(request.url())?;

        Ok((!injection.is_empty()).then_some(injection))
    }

    fn is_opted_out(&self, request: &Request) -> bool {
        request
            .headers()
            .get_all(&self.skip_header)
            .iter()
            .any(|v| v.to_str().map(|s| s.trim() == self.skip_value).unwrap_or(false))
    }

    /// Same origin as the backend and a path inside the API namespace
    fn targets_api(&self, url: &Url) -> bool {
        if url.origin() != self.origin {
            return false;
        }
        let path = url.path();
        match path.strip_prefix(self.api_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Scope pairs missing from the request's query.
    ///
    /// An absent or malformed scope yields nothing; the request still goes
    /// out, just unscoped.
    fn scope_params(&self, url: &Url) -> ClientResult<Vec<(&'static str, String)>> {
        let Some(raw) = self.storage.get_item(SCOPE_KEY)? else {
            return Ok(Vec::new());
        };
        let map = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => return Ok(Vec::new()),
            Ok(_) | Err(_) => {
                tracing::warn!("Ignoring malformed persisted scope");
                return Ok(Vec::new());
            }
        };

        let explicit: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();

        Ok(ScopeField::ALL
            .iter()
            .filter(|field| !explicit.iter().any(|k| k == field.query_param()))
            .filter_map(|field| field.extract(&map).map(|v| (field.query_param(), v)))
            .collect())
    }
}

impl std::fmt::Debug for ScopeInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeInterceptor")
            .field("origin", &self.origin.ascii_serialization())
            .field("api_prefix", &self.api_prefix)
            .field("skip_header", &self.skip_header)
            .finish()
    }
}
