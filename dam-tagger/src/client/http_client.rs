//! reqwest implementation of `DamApi`
//!
//! Every call carries the configured total and connect timeouts and passes
//! through a governor rate limiter before it is sent. The session credential
//! is read from a login response header and replayed as a request header.

use super::DamApi;
use crate::error::{AuthError, RemoteError};
use crate::models::{
    AssignmentBody, ListEnvelope, MediaPage, MediaQuery, NewTag, NewTagValue,
    RemoteTagDefinition, RemoteTagValue, SessionCredential, TagAssignment,
};
use async_trait::async_trait;
use dam_common::config::{get_user_agent, AssignmentEndpointConfig, CredentialHeaders};
use dam_common::{Credentials, DamConfig};
use governor::{Quota, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use tracing::{debug, info, warn};

/// Longest slice of an error body written to the debug log
const MAX_LOGGED_BODY: usize = 200;

#[derive(Serialize)]
struct LoginBody<'a> {
    identity: &'a str,
    secret: &'a str,
}

/// HTTP client for the DAM REST API
pub struct HttpDamClient {
    http_client: Client,
    base_url: String,
    credential_headers: CredentialHeaders,
    assignment: AssignmentEndpointConfig,
    assignment_method: Method,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpDamClient {
    /// Build a client from resolved configuration
    pub fn new(config: &DamConfig) -> Result<Self, RemoteError> {
        let http_client = Client::builder()
            .user_agent(get_user_agent())
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RemoteError::InvalidInput(format!("HTTP client setup failed: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            RemoteError::InvalidInput("requests_per_second must be greater than zero".to_string())
        })?;

        let assignment_method = Method::from_bytes(config.assignment.method.to_uppercase().as_bytes())
            .map_err(|_| {
                RemoteError::InvalidInput(format!(
                    "Unsupported assignment method '{}'",
                    config.assignment.method
                ))
            })?;

        debug!(
            base_url = %config.base_url,
            requests_per_second = config.requests_per_second,
            timeout_ms = config.request_timeout.as_millis() as u64,
            "DAM HTTP client created"
        );

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            credential_headers: config.credential_headers.clone(),
            assignment: config.assignment.clone(),
            assignment_method,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, method: Method, path: &str, credential: &SessionCredential) -> RequestBuilder {
        self.http_client
            .request(method, self.url(path))
            .header(self.credential_headers.request.as_str(), credential.expose())
    }

    /// Rate-limit, send, and classify the response status
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, RemoteError> {
        self.rate_limiter.until_ready().await;

        debug!(endpoint = %endpoint, "Calling DAM");

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::from_reqwest(endpoint, e))?;

        check_status(endpoint, response).await
    }
}

/// Map non-2xx responses onto `RemoteError`, keeping the body out of the error
async fn check_status(endpoint: &str, response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    debug!(
        endpoint = %endpoint,
        status = code,
        body = %truncate(&body, MAX_LOGGED_BODY),
        "DAM returned error status"
    );

    Err(match code {
        401 | 403 => RemoteError::Unauthorized {
            status: code,
            endpoint: endpoint.to_string(),
        },
        409 => RemoteError::Conflict {
            endpoint: endpoint.to_string(),
        },
        _ => RemoteError::Status {
            status: code,
            endpoint: endpoint.to_string(),
        },
    })
}

async fn parse_json<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, RemoteError> {
    response.json::<T>().await.map_err(|e| RemoteError::Parse {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Pull the session credential out of the login response headers
///
/// `Set-Cookie` values are reduced to their `name=value` pairs and joined the
/// way a `Cookie` request header expects; any other header is taken verbatim.
pub fn extract_credential(headers: &HeaderMap, header_name: &str) -> Option<SessionCredential> {
    let values: Vec<&str> = headers
        .get_all(header_name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let token = if header_name.eq_ignore_ascii_case("set-cookie") {
        let pairs: Vec<&str> = values
            .iter()
            .filter_map(|v| v.split(';').next())
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .collect();
        pairs.join("; ")
    } else {
        values.first().map(|v| v.trim().to_string()).unwrap_or_default()
    };

    if token.is_empty() {
        None
    } else {
        Some(SessionCredential::new(token))
    }
}

#[async_trait]
impl DamApi for HttpDamClient {
    async fn login(&self, credentials: &Credentials) -> Result<SessionCredential, AuthError> {
        self.rate_limiter.until_ready().await;

        debug!(identity = %credentials.identity, "Logging in to DAM");

        let response = self
            .http_client
            .post(self.url("/login"))
            .json(&LoginBody {
                identity: &credentials.identity,
                secret: &credentials.secret,
            })
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "Login request timed out".to_string()
                } else {
                    format!("Login request failed: {}", e)
                };
                AuthError::new(reason, None)
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AuthError::new("Credentials rejected by DAM", Some(status.as_u16())));
        }
        if !status.is_success() {
            return Err(AuthError::new(
                format!("Login failed with HTTP {}", status.as_u16()),
                Some(status.as_u16()),
            ));
        }

        match extract_credential(response.headers(), &self.credential_headers.response) {
            Some(credential) => {
                info!(identity = %credentials.identity, "DAM login succeeded");
                Ok(credential)
            }
            None => {
                warn!(
                    header = %self.credential_headers.response,
                    "DAM login response carried no session credential"
                );
                Err(AuthError::new(
                    format!(
                        "Login response carried no '{}' header",
                        self.credential_headers.response
                    ),
                    Some(status.as_u16()),
                ))
            }
        }
    }

    async fn list_tags(
        &self,
        credential: &SessionCredential,
    ) -> Result<Vec<RemoteTagDefinition>, RemoteError> {
        let endpoint = "/tags";
        let response = self
            .send(endpoint, self.authed(Method::GET, endpoint, credential))
            .await?;
        let tags: ListEnvelope<RemoteTagDefinition> = parse_json(endpoint, response).await?;
        Ok(tags.into_vec())
    }

    async fn create_tag(
        &self,
        credential: &SessionCredential,
        tag: &NewTag,
    ) -> Result<(), RemoteError> {
        let endpoint = "/tags/create";
        self.send(endpoint, self.authed(Method::POST, endpoint, credential).json(tag))
            .await?;
        Ok(())
    }

    async fn list_tag_values(
        &self,
        credential: &SessionCredential,
        tag_id: i64,
        filter: &str,
    ) -> Result<Vec<RemoteTagValue>, RemoteError> {
        let endpoint = "/tagValues";
        let request = self
            .authed(Method::GET, endpoint, credential)
            .query(&[("tagId", tag_id.to_string()), ("filter", filter.to_string())]);
        let response = self.send(endpoint, request).await?;
        let values: ListEnvelope<RemoteTagValue> = parse_json(endpoint, response).await?;
        Ok(values.into_vec())
    }

    async fn create_tag_value(
        &self,
        credential: &SessionCredential,
        value: &NewTagValue,
    ) -> Result<RemoteTagValue, RemoteError> {
        let endpoint = "/tagValues/create";
        let response = self
            .send(endpoint, self.authed(Method::POST, endpoint, credential).json(value))
            .await?;
        parse_json(endpoint, response).await
    }

    async fn search_media(
        &self,
        credential: &SessionCredential,
        query: &MediaQuery,
    ) -> Result<MediaPage, RemoteError> {
        let endpoint = "/media";
        let request = self.authed(Method::GET, endpoint, credential).query(&[
            ("query", query.text.clone()),
            ("page", query.page.to_string()),
            ("pageSize", query.page_size.to_string()),
        ]);
        let response = self.send(endpoint, request).await?;
        parse_json(endpoint, response).await
    }

    async fn assign_tags(
        &self,
        credential: &SessionCredential,
        media_id: &str,
        assignments: &[TagAssignment],
    ) -> Result<(), RemoteError> {
        let path = self.assignment.path_for(media_id);
        let body = AssignmentBody {
            assignments: assignments.iter().map(TagAssignment::pair).collect(),
        };
        self.send(
            "assignment",
            self.authed(self.assignment_method.clone(), &path, credential).json(&body),
        )
        .await?;
        Ok(())
    }
}
