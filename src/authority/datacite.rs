//! DataCite MDS client
//!
//! Speaks the DataCite Metadata Store API:
//! - `/metadata/{doi}` holds the XML document (410 once deactivated)
//! - `/doi/{doi}` holds the target URL (404/204 while only reserved)

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

use super::{DoiError, DoiService};
use crate::doi::{Doi, DoiData, DoiStatus};
use crate::metadata::validate_metadata_for;

/// Longest slice of an error body carried into a [`DoiError`]
const MAX_ERROR_BODY: usize = 200;

/// Connection settings for the DataCite MDS API
#[derive(Debug, Clone)]
pub struct DataCiteConfig {
    /// Base URL, e.g. `https://mds.datacite.org`
    pub api_url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for DataCiteConfig {
    fn default() -> Self {
        Self {
            api_url: "https://mds.test.datacite.org".to_string(),
            username: String::new(),
            password: String::new(),
            timeout_ms: 30000,
        }
    }
}

/// [`DoiService`] backed by DataCite
pub struct DataCiteClient {
    config: DataCiteConfig,
    client: Client,
}

impl DataCiteClient {
    /// Create a new DataCite client
    pub fn new(config: DataCiteConfig) -> Result<Self, DoiError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| DoiError::Service(format!("Failed to build HTTP client: {}", e)))?;

        info!("DataCite client configured for {}", config.api_url);
        Ok(Self { config, client })
    }

    fn base(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn doi_url(&self, doi: &Doi) -> String {
        format!("{}/doi/{}", self.base(), encode_doi(doi))
    }

    fn metadata_url(&self, doi: &Doi) -> String {
        format!("{}/metadata/{}", self.base(), encode_doi(doi))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.config.username, Some(&self.config.password))
    }

    /// Upload (create or replace) the metadata document
    async fn post_metadata(&self, doi: &Doi, metadata: &str) -> Result<(), DoiError> {
        let response = self
            .authed(self.client.post(format!("{}/metadata", self.base())))
            .header(header::CONTENT_TYPE, "application/xml;charset=UTF-8")
            .body(metadata.to_string())
            .send()
            .await?;
        expect_success(doi, response).await?;
        debug!("Uploaded metadata for {} ({} bytes)", doi, metadata.len());
        Ok(())
    }

    /// Mint the DOI or move its target
    async fn post_target(&self, doi: &Doi, target: &str) -> Result<(), DoiError> {
        let response = self
            .authed(self.client.post(format!("{}/doi", self.base())))
            .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(format!("doi={}\nurl={}", doi, target))
            .send()
            .await?;
        expect_success(doi, response).await?;
        debug!("Set target of {} to {}", doi, target);
        Ok(())
    }

    async fn ensure_not_registered(&self, doi: &Doi) -> Result<(), DoiError> {
        match self.resolve(doi).await? {
            Some(data) if data.status == DoiStatus::Registered => Err(DoiError::Exists(doi.clone())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DoiService for DataCiteClient {
    async fn resolve(&self, doi: &Doi) -> Result<Option<DoiData>, DoiError> {
        let metadata = self
            .authed(self.client.get(self.metadata_url(doi)))
            .header(header::ACCEPT, "application/xml")
            .send()
            .await?;

        let status = match metadata.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::GONE => DoiStatus::Deleted,
            s if s.is_success() => DoiStatus::Registered,
            _ => return Err(http_error(doi, metadata).await),
        };

        let target = self
            .authed(self.client.get(self.doi_url(doi)))
            .send()
            .await?;
        match target.status() {
            StatusCode::OK => {
                let url = target.text().await?.trim().to_string();
                Ok(Some(DoiData::new(status, Some(url))))
            }
            // metadata without a minted URL is a reservation
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND if status == DoiStatus::Registered => {
                Ok(Some(DoiData::new(DoiStatus::Reserved, None)))
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(Some(DoiData::new(status, None))),
            _ => Err(http_error(doi, target).await),
        }
    }

    async fn reserve(&self, doi: &Doi, metadata: &str) -> Result<(), DoiError> {
        validate_metadata_for(doi, metadata)?;
        self.ensure_not_registered(doi).await?;
        self.post_metadata(doi, metadata).await
    }

    async fn register(&self, doi: &Doi, target: &str, metadata: &str) -> Result<(), DoiError> {
        if target.trim().is_empty() {
            return Err(DoiError::InvalidMetadata(format!(
                "a target URL is required to register {}",
                doi
            )));
        }
        validate_metadata_for(doi, metadata)?;
        self.ensure_not_registered(doi).await?;
        self.post_metadata(doi, metadata).await?;
        self.post_target(doi, target).await
    }

    async fn update_metadata(&self, doi: &Doi, metadata: &str) -> Result<(), DoiError> {
        validate_metadata_for(doi, metadata)?;
        self.post_metadata(doi, metadata).await
    }

    async fn update_target(&self, doi: &Doi, target: &str) -> Result<(), DoiError> {
        self.post_target(doi, target).await
    }

    async fn delete(&self, doi: &Doi) -> Result<bool, DoiError> {
        let current = self.resolve(doi).await?.ok_or_else(|| DoiError::Http {
            status: DoiError::NOT_FOUND,
            message: format!("{} is unknown to DataCite", doi),
        })?;

        if current.status == DoiStatus::Reserved {
            // drafts can be removed outright
            let response = self
                .authed(self.client.delete(self.doi_url(doi)))
                .send()
                .await?;
            expect_success(doi, response).await?;
            return Ok(true);
        }

        let response = self
            .authed(self.client.delete(self.metadata_url(doi)))
            .send()
            .await?;
        expect_success(doi, response).await?;
        Ok(false)
    }
}

/// Path form of a DOI with each suffix segment percent-encoded
fn encode_doi(doi: &Doi) -> String {
    let suffix: Vec<_> = doi
        .suffix()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", doi.prefix(), suffix.join("/"))
}

async fn expect_success(doi: &Doi, response: Response) -> Result<Response, DoiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(http_error(doi, response).await)
    }
}

async fn http_error(doi: &Doi, response: Response) -> DoiError {
    let status = response.status();
    if status == StatusCode::CONFLICT {
        return DoiError::Exists(doi.clone());
    }

    let body = response.text().await.unwrap_or_default();
    let message: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    DoiError::Http {
        status: status.as_u16(),
        message: if message.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            message
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_doi_keeps_separators() {
        let doi = Doi::parse("10.5072/dl.a b/c").unwrap();
        assert_eq!(encode_doi(&doi), "10.5072/dl.a%20b/c");
    }

    #[test]
    fn test_urls_ignore_trailing_slash() {
        let client = DataCiteClient::new(DataCiteConfig {
            api_url: "https://mds.test.datacite.org/".into(),
            ..Default::default()
        })
        .unwrap();
        let doi = Doi::parse("10.5072/x").unwrap();

        assert_eq!(client.doi_url(&doi), "https://mds.test.datacite.org/doi/10.5072/x");
        assert_eq!(
            client.metadata_url(&doi),
            "https://mds.test.datacite.org/metadata/10.5072/x"
        );
    }
}
