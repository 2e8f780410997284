//! S3 bucket manager

use crate::context::AwsContext;
use crate::convert::{bucket_region, tags_from_pairs, to_chrono};
use crate::error::{AwsError, from_sdk};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use reka_cloud::{CloudError, Destroyer, Fetcher, Resource, Status, Tags};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

pub const S3_NAME: &str = "s3";
pub const S3_LONG_NAME: &str = "Simple Storage Service";

/// Lists and deletes S3 buckets. Buckets cannot be stopped.
pub struct S3Manager {
    ctx: AwsContext,
    client: Client,
    provider: String,
}

impl S3Manager {
    pub fn from_context(ctx: &AwsContext, provider: impl Into<String>) -> Self {
        Self {
            ctx: ctx.clone(),
            client: ctx.s3_client(),
            provider: provider.into(),
        }
    }

    async fn region_of(&self, bucket: &str) -> Result<String, AwsError> {
        let response = self
            .client
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(bucket_region(
            response.location_constraint().map(|c| c.as_str()),
        ))
    }

    async fn tags_of(&self, client: &Client, bucket: &str) -> Tags {
        match client.get_bucket_tagging().bucket(bucket).send().await {
            Ok(response) => tags_from_pairs(
                response
                    .tag_set()
                    .iter()
                    .map(|t| (Some(t.key()), Some(t.value()))),
            ),
            Err(e) => {
                let e = from_sdk(e);
                if !e.is_not_found() {
                    error!(bucket = %bucket, error = %e, "Failed to fetch bucket tags");
                }
                Tags::new()
            }
        }
    }

    /// Delete every object, then the bucket
    async fn delete_bucket(&self, client: &Client, bucket: &str) -> Result<(), AwsError> {
        let mut continuation_token = None;
        loop {
            let response = client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(from_sdk)?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    debug!(bucket = %bucket, key = %key, "Deleting object");
                    client
                        .delete_object()
                        .bucket(bucket)
                        .key(key)
                        .send()
                        .await
                        .map_err(from_sdk)?;
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }
}

#[async_trait]
impl Fetcher for S3Manager {
    async fn get_all(&self) -> reka_cloud::Result<Vec<Resource>> {
        debug!("Fetching S3 buckets");
        let response = self.client.list_buckets().send().await.map_err(from_sdk)?;

        let mut buckets = Vec::new();
        for bucket in response.buckets() {
            let Some(name) = bucket.name() else {
                continue;
            };
            let region = match self.region_of(name).await {
                Ok(region) => region,
                Err(e) => {
                    warn!(bucket = %name, error = %e, "Could not get bucket region, skipping");
                    continue;
                }
            };

            let client = self.ctx.s3_client_for_region(&region);
            let mut resource = Resource::new(name, &self.provider, S3_NAME)
                .with_status(Status::Running)
                .with_region(region);
            resource.tags = self.tags_of(&client, name).await;
            if let Some(created) = bucket.creation_date().and_then(to_chrono) {
                resource.creation_date = created;
            }
            buckets.push(resource);
        }

        debug!(count = buckets.len(), "Found S3 buckets");
        Ok(buckets)
    }
}

#[async_trait]
impl Destroyer for S3Manager {
    async fn destroy(&self, resources: &[Resource]) -> reka_cloud::Result<()> {
        let mut per_region: BTreeMap<&str, Vec<&Resource>> = BTreeMap::new();
        for bucket in resources {
            per_region.entry(bucket.region.as_str()).or_default().push(bucket);
        }

        let mut failed = Vec::new();
        let mut deleted = 0;
        for (region, buckets) in per_region {
            let client = if region.is_empty() {
                self.client.clone()
            } else {
                self.ctx.s3_client_for_region(region)
            };
            for bucket in buckets {
                match self.delete_bucket(&client, &bucket.uuid).await {
                    Ok(()) => deleted += 1,
                    Err(e) => {
                        error!(bucket = %bucket.uuid, error = %e, "Failed to delete bucket");
                        failed.push(format!("{}: {}", bucket.uuid, e));
                    }
                }
            }
        }

        info!(count = deleted, "Destroyed S3 buckets");
        if failed.is_empty() {
            Ok(())
        } else {
            Err(CloudError::mutation(S3_NAME, "destroy", failed.join("; ")))
        }
    }
}
