use std::time::Duration;

use lta_types::{Bundle, TransferRequest};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::RestError;
use crate::retry;

/// REST client for the LTA DB, the central coordination database holding
/// `TransferRequest` and `Bundle` entities.
///
/// Mirrors `pageserver_client::mgmt_api::Client`: a thin wrapper over a
/// shared `reqwest::Client`, with bounded retry applied per call.
pub struct LtaDbClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    retries: u32,
}

#[derive(Deserialize)]
struct PopTransferRequestResponse {
    transfer_request: Option<TransferRequest>,
}

#[derive(Deserialize)]
struct PopBundleResponse {
    bundle: Option<Bundle>,
}

#[derive(Deserialize)]
struct BulkCreateResponse {
    bundles: Vec<String>,
}

impl LtaDbClient {
    pub fn new(base_url: Url, token: String, timeout: Duration, retries: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        LtaDbClient {
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

    async fn post_json(&self, path_and_query: &str, body: &serde_json::Value) -> Result<serde_json::Value, RestError> {
        let url = self.url(path_and_query);
        retry::with_retries(self.retries, path_and_query, || async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.token)
                .json(body)
                .send()
                .await
                .map_err(|source| RestError::Transport {
                    url: url.clone(),
                    source,
                })?;
            decode_or_status(&url, response).await
        })
        .await
    }

    async fn patch_json(&self, path_and_query: &str, body: &serde_json::Value) -> Result<(), RestError> {
        let url = self.url(path_and_query);
        retry::with_retries(self.retries, path_and_query, || async {
            let response = self
                .http
                .patch(&url)
                .bearer_auth(&self.token)
                .json(body)
                .send()
                .await
                .map_err(|source| RestError::Transport {
                    url: url.clone(),
                    source,
                })?;
            decode_or_status(&url, response).await
        })
        .await?;
        Ok(())
    }

    /// `POST /TransferRequests/actions/pop?source=<s>[&dest=<d>]`
    pub async fn pop_transfer_request(
        &self,
        query: &str,
        claimant: &str,
    ) -> Result<Option<TransferRequest>, RestError> {
        let path = format!("/TransferRequests/actions/pop?{query}");
        let body = json!({ "claimant": claimant });
        let value = self.post_json(&path, &body).await?;
        let parsed: PopTransferRequestResponse = decode_value(&self.url(&path), value)?;
        Ok(parsed.transfer_request)
    }

    /// `POST /Bundles/actions/pop?dest=<d>&status=<st>` or `?source=<s>&status=<st>`
    pub async fn pop_bundle(&self, query: &str, claimant: &str) -> Result<Option<Bundle>, RestError> {
        let path = format!("/Bundles/actions/pop?{query}");
        let body = json!({ "claimant": claimant });
        let value = self.post_json(&path, &body).await?;
        let parsed: PopBundleResponse = decode_value(&self.url(&path), value)?;
        Ok(parsed.bundle)
    }

    /// `POST /Bundles/actions/bulk_create`, returns the assigned uuids in
    /// the same order as the input bundles.
    pub async fn bulk_create_bundles(&self, bundles: Vec<Bundle>) -> Result<Vec<String>, RestError> {
        let path = "/Bundles/actions/bulk_create";
        let body = json!({ "bundles": bundles });
        let value = self.post_json(path, &body).await?;
        let parsed: BulkCreateResponse = decode_value(&self.url(path), value)?;
        Ok(parsed.bundles)
    }

    /// `PATCH /TransferRequests/<uuid>`
    pub async fn patch_transfer_request(&self, uuid: &str, patch: serde_json::Value) -> Result<(), RestError> {
        self.patch_json(&format!("/TransferRequests/{uuid}"), &patch).await
    }

    /// `PATCH /Bundles/<uuid>`
    pub async fn patch_bundle(&self, uuid: &str, patch: serde_json::Value) -> Result<(), RestError> {
        self.patch_json(&format!("/Bundles/{uuid}"), &patch).await
    }

    /// `POST /status/<name>`
    pub async fn post_heartbeat(&self, name: &str, status: serde_json::Value) -> Result<(), RestError> {
        self.post_json(&format!("/status/{name}"), &status).await?;
        Ok(())
    }
}

async fn decode_or_status(url: &str, response: reqwest::Response) -> Result<serde_json::Value, RestError> {
    let status = response.status();
    let body = response.text().await.map_err(|source| RestError::Transport {
        url: url.to_string(),
        source,
    })?;
    if !status.is_success() {
        return Err(RestError::Status {
            url: url.to_string(),
            status,
            body,
        });
    }
    serde_json::from_str(&body).map_err(|source| RestError::Decode {
        url: url.to_string(),
        source,
    })
}

fn decode_value<T: serde::de::DeserializeOwned>(url: &str, value: serde_json::Value) -> Result<T, RestError> {
    serde_json::from_value(value).map_err(|source| RestError::Decode {
        url: url.to_string(),
        source,
    })
}
