//! S3-backed blob store for the remote state backend

use crate::context::AwsContext;
use crate::error::{AwsError, from_sdk};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use reka_cloud::BlobStore;
use tracing::debug;

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn from_context(ctx: &AwsContext, bucket: impl Into<String>) -> Self {
        Self::new(ctx.s3_client(), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> reka_cloud::Result<Option<Vec<u8>>> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return match from_sdk(e) {
                    e if e.is_not_found() => {
                        debug!(bucket = %self.bucket, key = %key, "State object does not exist");
                        Ok(None)
                    }
                    e => Err(e.into()),
                };
            }
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| AwsError::Sdk {
                code: None,
                message: format!("failed to read s3://{}/{}: {}", self.bucket, key, e),
            })?;
        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> reka_cloud::Result<()> {
        debug!(bucket = %self.bucket, key = %key, size = body.len(), "Uploading state");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
