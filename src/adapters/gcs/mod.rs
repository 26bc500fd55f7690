//! Object-store adapter speaking the Google Cloud Storage HTTP APIs:
//! streaming signed-URL downloads, resumable uploads and V4 URL signing.

mod signer;

pub use signer::UrlSigner;

use crate::ports::storage::{ObjectStore, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::TryStreamExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::debug;

const STORAGE_BASE: &str = "https://storage.googleapis.com";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

/// The two fields we need from a service-account JSON key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
}

impl ServiceAccountKey {
    pub async fn from_file(path: &str) -> Result<Self, StorageError> {
        let raw = tokio::fs::read(path).await?;
        serde_json::from_slice(&raw)
            .map_err(|e| StorageError::Sign(format!("invalid service account key: {e}")))
    }
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// GCS-backed implementation of [`ObjectStore`].
pub struct GcsStore {
    client: Client,
    bucket: String,
    signer: UrlSigner,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    token: Mutex<Option<CachedToken>>,
}

impl GcsStore {
    pub fn new(
        bucket: String,
        key: ServiceAccountKey,
        signed_url_ttl_secs: u64,
    ) -> Result<Self, StorageError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StorageError::Sign(format!("invalid private key: {e}")))?;
        let signer = UrlSigner::new(
            key.client_email.clone(),
            encoding_key.clone(),
            signed_url_ttl_secs,
        );

        Ok(Self {
            client: Client::new(),
            bucket,
            signer,
            key,
            encoding_key,
            token: Mutex::new(None),
        })
    }

    /// OAuth2 bearer token for the upload API, minted through the RS256
    /// JWT grant and cached until shortly before expiry.
    async fn bearer(&self) -> Result<String, StorageError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(token.access_token.clone());
            }
        }

        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: &self.key.client_email,
            scope: UPLOAD_SCOPE,
            aud: TOKEN_URI,
            iat: now,
            exp: now + 3600,
        };
        let assertion =
            jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
                .map_err(|e| StorageError::Sign(format!("token grant JWT: {e}")))?;

        let resp = self
            .client
            .post(TOKEN_URI)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StorageError::Transfer(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(StorageError::Sign(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| StorageError::Sign(format!("token response: {e}")))?;

        let access_token = body.access_token.clone();
        *cached = Some(CachedToken {
            access_token: body.access_token,
            expires_at: Utc::now() + Duration::seconds(body.expires_in),
        });
        Ok(access_token)
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let url = self.signer.signed_url("GET", &self.bucket, key)?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::Transfer(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !resp.status().is_success() {
            return Err(StorageError::Transfer(format!(
                "GET '{key}' returned {}",
                resp.status()
            )));
        }

        // Backpressure-aware copy; the body is never buffered whole.
        let body = resp
            .bytes_stream()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let body_reader = StreamReader::new(body);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(dest).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;
        file.flush().await?;

        debug!(key, dest = %dest.display(), "download complete");
        Ok(())
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<String, StorageError> {
        let token = self.bearer().await?;

        let init = self
            .client
            .post(format!(
                "{STORAGE_BASE}/upload/storage/v1/b/{}/o",
                self.bucket
            ))
            .query(&[("uploadType", "resumable"), ("name", key)])
            .bearer_auth(&token)
            .header(CONTENT_LENGTH, 0)
            .header("X-Upload-Content-Type", "application/octet-stream")
            .send()
            .await
            .map_err(|e| StorageError::Transfer(e.to_string()))?;

        if !init.status().is_success() {
            return Err(StorageError::SessionInit {
                key: key.to_string(),
                reason: format!("status {}", init.status()),
            });
        }
        let session = init
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StorageError::SessionInit {
                key: key.to_string(),
                reason: String::from("no session URI in response"),
            })?
            .to_string();

        let file = File::open(local).await?;
        let len = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let put = self
            .client
            .put(session)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Transfer(e.to_string()))?;

        if !put.status().is_success() {
            return Err(StorageError::Transfer(format!(
                "PUT '{key}' returned {}",
                put.status()
            )));
        }

        debug!(key, "upload complete");
        self.signer.signed_url("GET", &self.bucket, key)
    }
}
