use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::core::config::ObjectStoreConfig;
use crate::core::error::{AppError, Result};
use crate::modules::storage::MediaStore;

type HmacSha256 = Hmac<Sha256>;

/// S3/MinIO-compatible media store
///
/// Catalog images are uploaded under `<prefix>/<folder>/<file>` and exposed
/// through direct public URLs; the bucket gets an anonymous-read policy for
/// the media prefix at startup.
pub struct ObjectStoreClient {
    bucket: Box<Bucket>,
    endpoint: String,
    public_endpoint: String,
    prefix: String,
    access_key: String,
    secret_key: String,
    region_name: String,
    http_client: Client,
}

impl ObjectStoreClient {
    /// Create the client, ensure the bucket exists and set the public-read
    /// policy for the media prefix.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create storage credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Internal(format!("Failed to create storage bucket: {}", e)))?;

        // Path-style URLs (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        let http_client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let client = Self {
            bucket,
            endpoint: config.endpoint,
            public_endpoint: config.public_endpoint,
            prefix: config.prefix,
            access_key: config.access_key,
            secret_key: config.secret_key,
            region_name: config.region,
            http_client,
        };

        client.ensure_bucket_exists(region, credentials).await?;
        client.set_public_read_policy().await?;

        info!(
            "Object store initialized: endpoint={}, bucket={}, prefix={}",
            client.endpoint,
            client.bucket.name(),
            client.prefix
        );

        Ok(client)
    }

    async fn ensure_bucket_exists(&self, region: Region, credentials: Credentials) -> Result<()> {
        match Bucket::create_with_path_style(
            &self.bucket.name(),
            region,
            credentials,
            BucketConfiguration::default(),
        )
        .await
        {
            Ok(_) => {
                info!("Bucket '{}' created", self.bucket.name());
                Ok(())
            }
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                    Ok(())
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                    Ok(())
                }
            }
        }
    }

    /// Allow anonymous reads on the media prefix so returned picture URLs
    /// resolve without credentials.
    async fn set_public_read_policy(&self) -> Result<()> {
        let bucket_name = self.bucket.name();

        let policy = json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Principal": {"AWS": "*"},
                    "Action": ["s3:GetObject"],
                    "Resource": [format!("arn:aws:s3:::{}/{}/*", bucket_name, self.prefix)]
                }
            ]
        });

        match self
            .put_bucket_policy_with_sigv4(&bucket_name, &policy.to_string())
            .await
        {
            Ok(()) => {
                info!("Set public read policy for {}/{}/*", bucket_name, self.prefix);
                Ok(())
            }
            Err(e) => {
                // Startup proceeds; the policy can be set manually
                warn!(
                    "Failed to set bucket policy for '{}': {}. \
                    You may need to run: mc anonymous set download minio/{}/{}",
                    bucket_name, e, bucket_name, self.prefix
                );
                Ok(())
            }
        }
    }

    /// PUT the bucket policy, signing the request with AWS Signature v4
    async fn put_bucket_policy_with_sigv4(&self, bucket_name: &str, policy: &str) -> Result<()> {
        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let endpoint_url = Url::parse(&self.endpoint)
            .map_err(|e| AppError::Internal(format!("Invalid endpoint URL: {}", e)))?;
        let host = endpoint_url
            .host_str()
            .ok_or_else(|| AppError::Internal("Endpoint URL has no host".to_string()))?;
        let host_header = match endpoint_url.port() {
            Some(p) => format!("{}:{}", host, p),
            None => host.to_string(),
        };

        let url = format!("{}/{}?policy", self.endpoint, bucket_name);

        let payload_hash = hex::encode(Sha256::digest(policy.as_bytes()));

        let canonical_uri = format!("/{}", bucket_name);
        let canonical_querystring = "policy=";
        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            host_header, payload_hash, amz_date
        );
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";

        let canonical_request = format!(
            "PUT\n{}\n{}\n{}\n{}\n{}",
            canonical_uri, canonical_querystring, canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region_name);
        let canonical_request_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm, amz_date, credential_scope, canonical_request_hash
        );

        let signature = self.calculate_signature(&date_stamp, &string_to_sign)?;

        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.access_key, credential_scope, signed_headers, signature
        );

        let response = self
            .http_client
            .put(&url)
            .header("Host", &host_header)
            .header("x-amz-date", &amz_date)
            .header("x-amz-content-sha256", &payload_hash)
            .header("Authorization", &authorization_header)
            .header("Content-Type", "application/json")
            .body(policy.to_string())
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to send policy request: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::Internal(format!(
                "Failed to set bucket policy: {} - {}",
                status, body
            )))
        }
    }

    fn calculate_signature(&self, date_stamp: &str, string_to_sign: &str) -> Result<String> {
        let k_date = Self::hmac_sha256(
            format!("AWS4{}", self.secret_key).as_bytes(),
            date_stamp.as_bytes(),
        )?;
        let k_region = Self::hmac_sha256(&k_date, self.region_name.as_bytes())?;
        let k_service = Self::hmac_sha256(&k_region, b"s3")?;
        let k_signing = Self::hmac_sha256(&k_service, b"aws4_request")?;

        let signature = Self::hmac_sha256(&k_signing, string_to_sign.as_bytes())?;
        Ok(hex::encode(signature))
    }

    fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|e| AppError::Internal(format!("HMAC key error: {}", e)))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Object key for a catalog image
    fn object_key(&self, folder: &str, file: &str) -> String {
        format!("{}/{}/{}", self.prefix, folder, file)
    }

    /// Public URL for an object key
    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_endpoint, self.bucket.name(), key)
    }

    /// Map a URL back to the object key, if it belongs to this bucket
    fn key_from_url(&self, url: &str) -> Option<String> {
        extract_key(url, &self.public_endpoint, &self.endpoint, &self.bucket.name())
    }
}

/// Strip `<endpoint>/<bucket>/` off a URL, trying the public endpoint first
fn extract_key(url: &str, public_endpoint: &str, endpoint: &str, bucket_name: &str) -> Option<String> {
    for base in [public_endpoint, endpoint] {
        let full_prefix = format!("{}/{}/", base, bucket_name);
        if let Some(key) = url.strip_prefix(&full_prefix) {
            return Some(key.to_string());
        }
    }
    None
}

#[async_trait]
impl MediaStore for ObjectStoreClient {
    async fn store(
        &self,
        folder: &str,
        file: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let key = self.object_key(folder, file);

        self.bucket
            .put_object_with_content_type(&key, &bytes, content_type)
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("Failed to upload '{}': {}", key, e))
            })?;

        debug!("Uploaded '{}' to bucket '{}'", key, self.bucket.name());
        Ok(self.public_url(&key))
    }

    async fn remove(&self, reference: &str) -> Result<()> {
        let Some(key) = self.key_from_url(reference) else {
            debug!("Ignoring unmanaged media reference: {}", reference);
            return Ok(());
        };

        self.bucket.delete_object(&key).await.map_err(|e| {
            AppError::ExternalServiceError(format!("Failed to delete '{}': {}", key, e))
        })?;

        debug!("Deleted '{}' from bucket '{}'", key, self.bucket.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_key_from_public_and_internal_urls() {
        let key = extract_key(
            "https://cdn.example.com/storefront-media/media/categories/category_3.jpg",
            "https://cdn.example.com",
            "http://localhost:9000",
            "storefront-media",
        );
        assert_eq!(key.as_deref(), Some("media/categories/category_3.jpg"));

        let key = extract_key(
            "http://localhost:9000/storefront-media/media/products/product_9.jpg",
            "https://cdn.example.com",
            "http://localhost:9000",
            "storefront-media",
        );
        assert_eq!(key.as_deref(), Some("media/products/product_9.jpg"));
    }

    #[test]
    fn foreign_urls_have_no_key() {
        assert_eq!(
            extract_key(
                "https://other-host.example.com/storefront-media/media/a.jpg",
                "https://cdn.example.com",
                "http://localhost:9000",
                "storefront-media",
            ),
            None
        );
        assert_eq!(
            extract_key(
                "/media/categories/category_1.jpg",
                "https://cdn.example.com",
                "http://localhost:9000",
                "storefront-media",
            ),
            None
        );
    }
}
