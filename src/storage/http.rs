// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for S3-compatible object stores (MinIO, Ceph RGW, S3 with a
//! signing proxy).
//!
//! Requests are path-style: `{endpoint}/{bucket}/{key}`. Listing uses the
//! ListObjectsV2 query API and follows continuation tokens.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::object::ObjectStoreClient;
use super::StorageError;

const BACKEND: &str = "object";

pub struct HttpObjectStore {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            StorageError::unavailable(BACKEND, format!("invalid endpoint {}: {}", endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(StorageError::unavailable(BACKEND, format!("invalid endpoint {}", endpoint)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::unavailable(BACKEND, e.to_string()))?;
        Ok(Self { client, endpoint, token })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::unavailable(BACKEND, "endpoint cannot hold a path"))?;
            segments.pop_if_empty().push(bucket);
            if !key.is_empty() {
                segments.extend(key.split('/'));
            }
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        key: &str,
    ) -> Result<reqwest::Response, StorageError> {
        let response = builder.send().await.map_err(|e| {
            let reason = if e.is_timeout() { format!("timed out: {}", e) } else { e.to_string() };
            StorageError::unavailable(BACKEND, reason)
        })?;
        classify(response.status(), key)?;
        Ok(response)
    }
}

/// Map an HTTP status to the storage error taxonomy.
fn classify(status: StatusCode, key: &str) -> Result<(), StorageError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::KeyNotFound(key.to_string()));
    }
    Err(StorageError::unavailable(BACKEND, format!("{} returned {}", key, status)))
}

/// ListObjectsV2 response body. Fields we do not use are ignored.
#[derive(Debug, Deserialize)]
struct ListBucketResult {
    #[serde(rename = "IsTruncated", default)]
    is_truncated: bool,
    #[serde(rename = "Contents", default)]
    contents: Vec<ListedObject>,
    #[serde(rename = "NextContinuationToken")]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    #[serde(rename = "Key")]
    key: String,
}

/// One ListObjectsV2 page: the keys and the token for the next page.
///
/// A truncated page without a continuation token cannot be followed, so
/// it is reported as an error instead of a short listing.
pub(crate) fn parse_list_page(body: &str) -> Result<(Vec<String>, Option<String>), StorageError> {
    let page: ListBucketResult = quick_xml::de::from_str(body)
        .map_err(|e| StorageError::unavailable(BACKEND, format!("malformed listing: {}", e)))?;

    let keys = page.contents.into_iter().map(|c| c.key).collect();
    if !page.is_truncated {
        return Ok((keys, None));
    }
    match page.next_continuation_token.filter(|t| !t.is_empty()) {
        Some(token) => Ok((keys, Some(token))),
        None => Err(StorageError::unavailable(
            BACKEND,
            "truncated listing without continuation token",
        )),
    }
}

#[async_trait]
impl ObjectStoreClient for HttpObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let url = self.object_url(bucket, key)?;
        self.send(self.request(reqwest::Method::PUT, url).body(body), key).await?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.object_url(bucket, key)?;
        let response = self.send(self.request(reqwest::Method::GET, url), key).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, format!("{}: {}", key, e)))?;
        Ok(bytes.to_vec())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let url = self.object_url(bucket, key)?;
        match self.send(self.request(reqwest::Method::HEAD, url), key).await {
            Ok(_) => Ok(true),
            Err(StorageError::KeyNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let url = self.object_url(bucket, key)?;
        match self.send(self.request(reqwest::Method::DELETE, url), key).await {
            Ok(_) | Err(StorageError::KeyNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let url = self.object_url(bucket, "")?;
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut query = vec![("list-type", "2".to_string()), ("prefix", prefix.to_string())];
            if let Some(token) = &continuation {
                query.push(("continuation-token", token.clone()));
            }
            let builder = self.request(reqwest::Method::GET, url.clone()).query(&query);
            let body = self
                .send(builder, bucket)
                .await?
                .text()
                .await
                .map_err(|e| StorageError::unavailable(BACKEND, e.to_string()))?;

            let (page, next) = parse_list_page(&body)?;
            debug!(bucket, prefix, page_len = page.len(), "Listed object page");
            keys.extend(page);
            match next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }
        Ok(keys)
    }
}
