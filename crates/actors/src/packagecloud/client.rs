//! packagecloud REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use deckhand_core::{Error, ErrorContext, Result};

use crate::settings::PackagecloudKeys;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One uploaded package version, as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub distro_version: String,
    pub created_at: DateTime<Utc>,
    pub package_html_url: String,
}

impl Package {
    /// File name, taken from the last segment of the package page URL.
    #[must_use]
    pub fn filename(&self) -> &str {
        self.package_html_url
            .rsplit('/')
            .next()
            .unwrap_or(&self.package_html_url)
    }
}

/// Read and delete access to the repositories of one account.
#[async_trait]
pub trait PackageRepository: Send + Sync {
    /// Every package version in `repo`.
    async fn packages(&self, repo: &str) -> Result<Vec<Package>>;

    /// Delete one package version from `repo`.
    async fn delete(&self, repo: &str, package: &Package) -> Result<()>;
}

/// Opens repository clients from credentials.
pub trait RepositoryProvider: Send + Sync {
    fn connect(&self, keys: &PackagecloudKeys) -> Result<Arc<dyn PackageRepository>>;
}

/// Provider backed by the packagecloud HTTP API.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpRepositories;

impl RepositoryProvider for HttpRepositories {
    fn connect(&self, keys: &PackagecloudKeys) -> Result<Arc<dyn PackageRepository>> {
        Ok(Arc::new(PackagecloudClient::new(keys.clone())?))
    }
}

/// HTTP client for the packagecloud v1 API.
#[derive(Clone)]
pub struct PackagecloudClient {
    http: reqwest::Client,
    keys: PackagecloudKeys,
}

impl PackagecloudClient {
    pub fn new(keys: PackagecloudKeys) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::backend_unavailable("packagecloud", e.to_string()))?;
        Ok(Self { http, keys })
    }

    fn url(&self, path: &str) -> String {
        format!("{}repos/{}/{path}", self.keys.endpoint, self.keys.account)
    }

    async fn send(&self, request: reqwest::RequestBuilder, operation: &str) -> Result<reqwest::Response> {
        let response = request
            .basic_auth(&self.keys.token, Some(""))
            .send()
            .await
            .operational(operation)?;
        check_status(response.status(), operation)?;
        Ok(response)
    }
}

/// Map an HTTP status to the error taxonomy.
fn check_status(status: StatusCode, operation: &str) -> Result<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Err(
            Error::unrecoverable(format!("{operation} was rejected with {status}")),
        ),
        _ => Err(Error::operational(operation, format!("server answered {status}"))),
    }
}

#[async_trait]
impl PackageRepository for PackagecloudClient {
    async fn packages(&self, repo: &str) -> Result<Vec<Package>> {
        let operation = format!("list packages in {repo}");
        let url = self.url(&format!("{repo}/packages.json"));
        debug!(%url, "Listing packages");

        let request = self.http.get(&url).query(&[("per_page", i64::MAX)]);
        let response = self.send(request, &operation).await?;
        response
            .json::<Vec<Package>>()
            .await
            .unrecoverable("unexpected package list")
    }

    async fn delete(&self, repo: &str, package: &Package) -> Result<()> {
        let operation = format!("delete {repo}/{}/{}", package.distro_version, package.filename());
        let url = self.url(&format!(
            "{repo}/{}/{}",
            package.distro_version,
            package.filename()
        ));
        debug!(%url, "Deleting package");

        self.send(self.http.delete(&url), &operation).await?;
        Ok(())
    }
}
