//! Shared AWS configuration context
//!
//! Loads the SDK configuration once per provider and hands out service
//! clients built from it.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_ec2::config::Credentials;
use reka_config::ProviderConfig;
use std::sync::Arc;

/// Region used when the provider block does not name one
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
}

impl AwsContext {
    /// Load configuration for `region` from the default credential chain
    pub async fn new(region: &str) -> Self {
        Self::load(region, None).await
    }

    /// Load configuration for a provider block.
    ///
    /// Static keys are used when both are set; otherwise the default
    /// chain (environment, profile, instance role) applies.
    pub async fn from_provider(provider: &ProviderConfig) -> Self {
        let region = provider.region.as_deref().unwrap_or(DEFAULT_REGION);
        Self::load(region, provider.static_credentials()).await
    }

    async fn load(region: &str, credentials: Option<(&str, &str)>) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some((access_key_id, secret_access_key)) = credentials {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "reka-config",
            ));
        }

        Self {
            config: Arc::new(loader.load().await),
            region: region.to_string(),
        }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn ec2_client(&self) -> aws_sdk_ec2::Client {
        aws_sdk_ec2::Client::new(self.sdk_config())
    }

    pub fn s3_client(&self) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(self.sdk_config())
    }

    /// S3 client pinned to another region (buckets live in their own region)
    pub fn s3_client_for_region(&self, region: &str) -> aws_sdk_s3::Client {
        let config = aws_sdk_s3::config::Builder::from(self.sdk_config())
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credentials_context() {
        let provider = ProviderConfig {
            name: "aws".to_string(),
            region: Some("eu-west-1".to_string()),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
        };
        let ctx = AwsContext::from_provider(&provider).await;
        assert_eq!(ctx.region(), "eu-west-1");
        assert_eq!(
            ctx.sdk_config().region().map(|r| r.as_ref()),
            Some("eu-west-1")
        );
    }

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_default_chain_context() {
        let ctx = AwsContext::new("us-east-2").await;
        assert_eq!(ctx.region(), "us-east-2");
    }
}
