//! Infrastructure implementation of the `RepositoryHost` port on the GitHub
//! REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::application::ports::RepositoryHost;
use crate::domain::{HostCredentials, HostedRepository, ProvisionError};

const USER_AGENT: &str = concat!("tplcheck/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    name: String,
    full_name: String,
    clone_url: String,
}

impl From<RepositoryResponse> for HostedRepository {
    fn from(r: RepositoryResponse) -> Self {
        Self {
            name: r.name,
            full_name: r.full_name,
            clone_url: r.clone_url,
        }
    }
}

/// GitHub client authenticated with the operator's login and secret.
pub struct GithubHost {
    client: reqwest::Client,
    api_url: String,
    credentials: HostCredentials,
}

impl GithubHost {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: &str, credentials: HostCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building GitHub client")?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_url))
            .header(reqwest::header::ACCEPT, ACCEPT)
            .basic_auth(&self.credentials.login, Some(self.credentials.secret()))
    }
}

impl RepositoryHost for GithubHost {
    async fn create_repository(&self, name: &str) -> Result<HostedRepository> {
        let failed = |reason: String| ProvisionError::Repository {
            name: name.to_string(),
            reason,
        };
        let response = self
            .request(reqwest::Method::POST, "/user/repos")
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("{status}: {}", body.trim())).into());
        }
        let repo: RepositoryResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("unexpected response: {e}")))?;
        Ok(repo.into())
    }

    async fn delete_repository(&self, repo: &HostedRepository) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/repos/{}", repo.full_name),
            )
            .send()
            .await
            .with_context(|| format!("deleting repository {}", repo.full_name))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::debug!(full_name = %repo.full_name, "repository already gone");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!(
                    "deleting repository {} failed: {status}: {}",
                    repo.full_name,
                    body.trim()
                )
            }
        }
    }
}
