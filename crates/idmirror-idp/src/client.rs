//! Asynchronous identity provider client.

use crate::models::{AccessToken, GroupPage, RemoteGroup, RemoteUser, SshKeyPage, UserPage};
use crate::Result;
use async_trait::async_trait;
use idmirror_core::client::{ClientConfig, RetryPolicy};
use idmirror_core::credentials::ServiceCredentials;
use idmirror_core::ids::{RemoteGroupId, RemoteUserId};
use idmirror_core::Error;
use reqwest::{Client, ClientBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("idmirror/", env!("CARGO_PKG_VERSION"));

/// Token scope requested on both grant types. The provider treats this as
/// the "global" service scope.
const DEFAULT_TOKEN_SCOPE: &str = "0-0-0-0-0";

/// Read access to the remote identity service, as consumed by the
/// reconciliation engine and the authentication bridge.
///
/// All collection reads are offset-paginated; `total` in the returned
/// envelopes may change between pages. The per-id lookups are existence
/// probes: an absent record surfaces as [`Error::NotFound`].
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Exchanges the service credential pair for a bearer token.
    async fn service_login(&self) -> Result<AccessToken>;

    /// Checks an end-user credential by performing a delegated login.
    ///
    /// The service credential authorizes the call; the user credential is
    /// only the payload and is never stored.
    async fn user_login(&self, login: &str, password: &SecretString) -> Result<AccessToken>;

    /// Fetches one page of the remote group collection.
    async fn list_groups(&self, token: &AccessToken, offset: u32, limit: u32) -> Result<GroupPage>;

    /// Fetches one page of the remote user collection.
    async fn list_users(&self, token: &AccessToken, offset: u32, limit: u32) -> Result<UserPage>;

    /// Looks up a single user by id.
    async fn get_user(&self, token: &AccessToken, id: &RemoteUserId) -> Result<RemoteUser>;

    /// Looks up a single group by id.
    async fn get_group(&self, token: &AccessToken, id: &RemoteGroupId) -> Result<RemoteGroup>;

    /// Fetches one page of a user's public SSH keys.
    async fn list_ssh_keys(
        &self,
        token: &AccessToken,
        id: &RemoteUserId,
        offset: u32,
        limit: u32,
    ) -> Result<SshKeyPage>;
}

/// Builder for [`IdpClient`].
#[derive(Debug, Clone)]
pub struct IdpClientBuilder {
    base_url: Url,
    credentials: ServiceCredentials,
    http_config: ClientConfig,
    retry_policy: RetryPolicy,
    scope: String,
}

impl IdpClientBuilder {
    /// Create a new builder for the provider's REST API root
    /// (e.g. `https://hub.example.com/api/rest/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, credentials: ServiceCredentials) -> Result<Self> {
        let mut raw = base_url.as_ref().to_string();
        // A trailing slash keeps Url::join from eating the last path segment.
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).map_err(|err| {
            Error::ConfigError(format!(
                "Invalid identity API base URL `{}`: {err}",
                base_url.as_ref()
            ))
        })?;

        let http_config = ClientConfig::new();
        Ok(Self {
            base_url: url,
            credentials,
            retry_policy: http_config.retry_policy,
            http_config,
            scope: DEFAULT_TOKEN_SCOPE.to_string(),
        })
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.retry_policy = config.retry_policy;
        self.http_config = config;
        self
    }

    /// Override the retry policy for collection/lookup reads.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Override the OAuth2 token scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn build(self) -> Result<IdpClient> {
        let mut builder = ClientBuilder::new()
            .timeout(self.http_config.timeout)
            .user_agent(USER_AGENT)
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .connect_timeout(Duration::from_secs(10));

        if !self.http_config.enable_compression {
            builder = builder.no_gzip();
        }

        let http = builder.build().map_err(|err| {
            Error::ConfigError(format!("Failed to build identity API HTTP client: {err}"))
        })?;

        Ok(IdpClient {
            http,
            base_url: self.base_url,
            credentials: self.credentials,
            retry_policy: self.retry_policy,
            scope: self.scope,
        })
    }
}

/// Asynchronous identity provider client backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct IdpClient {
    http: Client,
    base_url: Url,
    credentials: ServiceCredentials,
    retry_policy: RetryPolicy,
    scope: String,
}

impl IdpClient {
    /// Create a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, credentials: ServiceCredentials) -> Result<Self> {
        IdpClientBuilder::new(base_url, credentials)?.build()
    }

    /// Access the configured base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|err| {
            Error::InvalidEndpoint(format!("Invalid identity API path `{path}`: {err}"))
        })
    }

    /// POST to the token endpoint and parse the grant response.
    ///
    /// Token grants are authorization checks, so they are never retried:
    /// a rejected credential answers the caller immediately, and a failed
    /// service login simply aborts the current cycle.
    async fn request_token(&self, form: &[(&str, &str)]) -> Result<AccessToken> {
        let url = self.build_url("oauth2/token")?;
        let response = self
            .http
            .post(url)
            .basic_auth(self.credentials.id(), Some(self.credentials.secret()))
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response.json::<AccessToken>().await.map_err(|err| {
                Error::ParseError(format!("Failed to parse token response: {err}"))
            });
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status {
            StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Err(Error::ServiceUnavailable(format!(
                "identity API temporarily unavailable: {text}"
            ))),
            status if status.is_server_error() => Err(Error::ServiceUnavailable(format!(
                "identity API server error {status}: {text}"
            ))),
            // 400/401/403 all mean the grant was rejected.
            _ => Err(Error::AuthenticationFailed(format!(
                "token grant rejected ({status}): {text}"
            ))),
        }
    }

    async fn get_json<T>(
        &self,
        token: &AccessToken,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        #[allow(unused_assignments)]
        let mut last_error: Option<Error> = None;
        let mut attempt = 0;

        loop {
            let url = self.build_url(path)?;
            let request = self
                .http
                .get(url)
                .query(params)
                .header("Authorization", token.bearer())
                .header("Accept", "application/json");

            debug!(path, attempt, "identity API request");

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|err| {
                            Error::ParseError(format!(
                                "Failed to parse identity API response for `{path}`: {err}"
                            ))
                        });
                    }

                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());

                    let error = match status {
                        StatusCode::NOT_FOUND => return Err(Error::NotFound(text)),
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            return Err(Error::AuthenticationFailed(format!(
                                "identity API rejected the service token: {text}"
                            )))
                        }
                        StatusCode::TOO_MANY_REQUESTS
                        | StatusCode::BAD_GATEWAY
                        | StatusCode::SERVICE_UNAVAILABLE
                        | StatusCode::GATEWAY_TIMEOUT => Error::ServiceUnavailable(format!(
                            "identity API temporarily unavailable: {text}"
                        )),
                        status if status.is_server_error() => Error::ServiceUnavailable(format!(
                            "identity API server error {status}: {text}"
                        )),
                        _ => Error::HttpError(format!("identity API error {status}: {text}")),
                    };
                    last_error = Some(error);
                }
                Err(err) => {
                    let error = Error::from(err);
                    if error.is_transient() {
                        last_error = Some(error);
                    } else {
                        return Err(error);
                    }
                }
            }

            attempt += 1;
            if attempt > self.retry_policy.max_retries {
                break;
            }
            let delay = self.retry_policy.delay_for_attempt(attempt);
            if delay > Duration::from_millis(0) {
                debug!("Retrying identity API request after {:?}", delay);
                sleep(delay).await;
            }
        }

        if let Some(error) = last_error {
            Err(error)
        } else {
            Err(Error::ServiceUnavailable(
                "identity API request failed after retries".to_string(),
            ))
        }
    }

    fn page_params(offset: u32, limit: u32) -> Vec<(&'static str, String)> {
        vec![("$skip", offset.to_string()), ("$top", limit.to_string())]
    }
}

#[async_trait]
impl IdentityService for IdpClient {
    async fn service_login(&self) -> Result<AccessToken> {
        self.request_token(&[
            ("scope", self.scope.as_str()),
            ("grant_type", "client_credentials"),
        ])
        .await
    }

    async fn user_login(&self, login: &str, password: &SecretString) -> Result<AccessToken> {
        self.request_token(&[
            ("scope", self.scope.as_str()),
            ("grant_type", "password"),
            ("username", login),
            ("password", password.expose_secret()),
        ])
        .await
    }

    async fn list_groups(&self, token: &AccessToken, offset: u32, limit: u32) -> Result<GroupPage> {
        let mut params = Self::page_params(offset, limit);
        params.push(("fields", "total,id,name".to_string()));
        self.get_json(token, "usergroups", &params).await
    }

    async fn list_users(&self, token: &AccessToken, offset: u32, limit: u32) -> Result<UserPage> {
        self.get_json(token, "users", &Self::page_params(offset, limit))
            .await
    }

    async fn get_user(&self, token: &AccessToken, id: &RemoteUserId) -> Result<RemoteUser> {
        let path = format!("users/{id}");
        self.get_json(token, &path, &[]).await
    }

    async fn get_group(&self, token: &AccessToken, id: &RemoteGroupId) -> Result<RemoteGroup> {
        let path = format!("usergroups/{id}");
        self.get_json(token, &path, &[]).await
    }

    async fn list_ssh_keys(
        &self,
        token: &AccessToken,
        id: &RemoteUserId,
        offset: u32,
        limit: u32,
    ) -> Result<SshKeyPage> {
        let path = format!("users/{id}/sshpublickeys");
        self.get_json(token, &path, &Self::page_params(offset, limit))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> IdpClient {
        let credentials = ServiceCredentials::new("mirror-svc", "svc-secret");
        IdpClient::new(format!("{}/api/rest", server.uri()), credentials).unwrap()
    }

    fn token() -> AccessToken {
        AccessToken {
            access_token: "tok".to_string(),
        }
    }

    #[tokio::test]
    async fn service_login_uses_client_credentials_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rest/oauth2/token"))
            .and(basic_auth("mirror-svc", "svc-secret"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "svc-token"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let token = client.service_login().await.unwrap();
        assert_eq!(token.access_token, "svc-token");
    }

    #[tokio::test]
    async fn user_login_sends_user_credential_as_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rest/oauth2/token"))
            .and(basic_auth("mirror-svc", "svc-secret"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=alice"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "user-token"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let password = SecretString::from("correct-pw".to_string());
        let token = client.user_login("alice", &password).await.unwrap();
        assert_eq!(token.access_token, "user-token");
    }

    #[tokio::test]
    async fn rejected_user_login_maps_to_authentication_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/rest/oauth2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let password = SecretString::from("wrong".to_string());
        let err = client.user_login("alice", &password).await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn list_users_sends_skip_and_top() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/rest/users"))
            .and(query_param("$skip", "10"))
            .and(query_param("$top", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "skip": 10,
                "top": 10,
                "total": 12,
                "users": [
                    {"id": "u-11", "name": "Kim", "login": "kim"},
                    {"id": "u-12", "name": "Lee", "login": "lee"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let page = client.list_users(&token(), 10, 10).await.unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.users.len(), 2);
    }

    #[tokio::test]
    async fn get_user_maps_404_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/rest/users/u-gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such user"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .get_user(&token(), &RemoteUserId::new("u-gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn list_groups_requests_reduced_field_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/rest/usergroups"))
            .and(query_param("fields", "total,id,name"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "usergroups": [{"id": "g-1", "name": "devs"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let page = client.list_groups(&token(), 0, 10).await.unwrap();
        assert_eq!(page.groups[0].id.as_str(), "g-1");
    }
}
