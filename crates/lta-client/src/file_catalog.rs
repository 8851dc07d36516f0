use std::time::Duration;

use lta_types::{CatalogRecord, FileRef};
use serde::Deserialize;
use url::Url;

use crate::error::RestError;
use crate::retry;

/// The File Catalog hands back at most this many files per page. The limit
/// is an external constraint and must be preserved exactly: the worker
/// pages until it sees a page shorter than this.
pub const FILE_CATALOG_LIMIT: u32 = 9000;

/// Read-only REST client for the File Catalog.
pub struct FileCatalogClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    retries: u32,
}

#[derive(Deserialize)]
struct FilesPage {
    files: Vec<FileRef>,
}

impl FileCatalogClient {
    pub fn new(base_url: Url, token: String, timeout: Duration, retries: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        FileCatalogClient {
            http,
            base_url,
            token,
            retries,
        }
    }

    fn url(&self, path_and_query: &str) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            path_and_query
        )
    }

    async fn get(&self, path_and_query: &str) -> Result<serde_json::Value, RestError> {
        let url = self.url(path_and_query);
        retry::with_retries(self.retries, path_and_query, || async {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|source| RestError::Transport {
                    url: url.clone(),
                    source,
                })?;
            let status = response.status();
            let body = response.text().await.map_err(|source| RestError::Transport {
                url: url.clone(),
                source,
            })?;
            if !status.is_success() {
                return Err(RestError::Status {
                    url: url.clone(),
                    status,
                    body,
                });
            }
            serde_json::from_str(&body).map_err(|source| RestError::Decode {
                url: url.clone(),
                source,
            })
        })
        .await
    }

    /// Runs the File Catalog's quirky paging contract to exhaustion and
    /// returns every matching file's uuid.
    ///
    /// The first request carries `keys=uuid` (a hint the catalog honors only
    /// on the initial page); later requests omit it. Paging continues while
    /// a page comes back exactly [`FILE_CATALOG_LIMIT`] long, and stops on
    /// the first short page.
    pub async fn query_all_uuids(&self, query_json: &str) -> Result<Vec<String>, RestError> {
        let mut start = 0u32;
        let mut uuids = Vec::new();

        let first_path = format!(
            "/api/files?query={query}&keys=uuid&limit={limit}&start={start}",
            query = urlencoding::encode(query_json),
            limit = FILE_CATALOG_LIMIT,
        );
        let first_page: FilesPage = decode_value(&self.url(&first_path), self.get(&first_path).await?)?;
        let mut page_len = first_page.files.len() as u32;
        uuids.extend(first_page.files.into_iter().map(|f| f.uuid));

        while page_len == FILE_CATALOG_LIMIT {
            start += page_len;
            let path = format!(
                "/api/files?query={query}&limit={limit}&start={start}",
                query = urlencoding::encode(query_json),
                limit = FILE_CATALOG_LIMIT,
            );
            let page: FilesPage = decode_value(&self.url(&path), self.get(&path).await?)?;
            page_len = page.files.len() as u32;
            uuids.extend(page.files.into_iter().map(|f| f.uuid));
        }

        Ok(uuids)
    }

    /// `GET /api/files/<uuid>`
    pub async fn get_file_record(&self, uuid: &str) -> Result<CatalogRecord, RestError> {
        let path = format!("/api/files/{uuid}");
        let value = self.get(&path).await?;
        decode_value(&self.url(&path), value)
    }
}

fn decode_value<T: serde::de::DeserializeOwned>(url: &str, value: serde_json::Value) -> Result<T, RestError> {
    serde_json::from_value(value).map_err(|source| RestError::Decode {
        url: url.to_string(),
        source,
    })
}
