//! Signed HTTP object store client.
//!
//! Implements the backend primitives against the native object storage
//! API: `/n/{namespace}/b/{bucket}/o/{object}` with HEAD, GET, PUT and
//! DELETE, every request signed by the resolved credential. The request
//! path uses the same percent-encoding as the public URL codec, so the
//! key written and the key addressed later are byte-identical.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use url::Url;

use crate::auth::signer::{RequestSigner, SignedBody};
use crate::backend::{BackendError, FetchedObject, ObjectBackend, ObjectMeta};
use crate::traits::{StorageError, StorageResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}

pub struct HttpBackend {
    client: reqwest::Client,
    host: String,
    signer: Arc<RequestSigner>,
}

impl HttpBackend {
    pub fn new(host: String, signer: Arc<RequestSigner>) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Config(format!("http client: {}", e)))?;
        Ok(HttpBackend { client, host, signer })
    }

    fn object_url(&self, bucket: &str, namespace: &str, key: &str) -> Result<Url, BackendError> {
        let raw = format!(
            "https://{}/n/{}/b/{}/o/{}",
            self.host,
            urlencoding::encode(namespace),
            urlencoding::encode(bucket),
            urlencoding::encode(key)
        );
        Url::parse(&raw).map_err(|e| BackendError::Transport(format!("invalid url {}: {}", raw, e)))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<(Bytes, SignedBody)>,
    ) -> Result<reqwest::Response, BackendError> {
        let headers = self.signer.sign(&method, &url, body.as_ref().map(|(_, signed)| signed))?;
        let mut request = self.client.request(method, url).headers(headers);
        if let Some((bytes, _)) = body {
            request = request.body(bytes);
        }
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }
}

async fn status_error(response: reqwest::Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(200).collect();
    BackendError::Status { status, message }
}

#[async_trait]
impl ObjectBackend for HttpBackend {
    async fn head(
        &self,
        bucket: &str,
        namespace: &str,
        key: &str,
    ) -> Result<ObjectMeta, BackendError> {
        let url = self.object_url(bucket, namespace, key)?;
        let response = self.send(Method::HEAD, url, None).await?;
        let headers = response.headers();
        Ok(ObjectMeta {
            content_length: headers
                .get(http::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok()),
            content_type: headers
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            etag: headers
                .get(http::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }

    async fn get(
        &self,
        bucket: &str,
        namespace: &str,
        key: &str,
    ) -> Result<FetchedObject, BackendError> {
        let url = self.object_url(bucket, namespace, key)?;
        let response = self.send(Method::GET, url, None).await?;
        let headers = response.headers().clone();
        let stream = response.bytes_stream().map(|chunk| chunk.map_err(BackendError::from));
        Ok(FetchedObject { headers, stream: Box::pin(stream) })
    }

    async fn put(
        &self,
        bucket: &str,
        namespace: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let url = self.object_url(bucket, namespace, key)?;
        let signed = SignedBody::from_bytes(&data, content_type);
        self.send(Method::PUT, url, Some((data, signed))).await?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, namespace: &str, key: &str) -> Result<(), BackendError> {
        let url = self.object_url(bucket, namespace, key)?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }
}
