//! AWS collaborators for reka
//!
//! - `ec2`: instances (fetch, stop/resume, destroy)
//! - `ebs`: volumes (fetch, destroy); unattached volumes are reported unused
//! - `s3`: buckets (fetch, destroy)
//! - [`S3BlobStore`]: object storage for `state-backend type="s3"`

pub mod blob;
pub mod context;
pub mod convert;
pub mod ebs;
pub mod ec2;
pub mod error;
pub mod s3;

pub use blob::S3BlobStore;
pub use context::AwsContext;
pub use ebs::EbsManager;
pub use ec2::Ec2Manager;
pub use error::{AwsError, Result};
pub use s3::S3Manager;

use reka_cloud::{Manager, Provider, RemoteBackend};
use reka_config::{ProviderConfig, StateBackendConfig, StateBackendKind};
use std::sync::Arc;
use std::time::Duration;

/// Provider name used in the config file and resource URIs
pub const PROVIDER_NAME: &str = "aws";

/// Build the AWS provider with every supported manager
#[tracing::instrument(skip_all, fields(provider = %config.name))]
pub async fn build_provider(config: &ProviderConfig, call_timeout: Duration) -> Result<Provider> {
    let ctx = AwsContext::from_provider(config).await;
    tracing::debug!(region = %ctx.region(), "AWS configuration loaded");
    Ok(provider_from_context(&ctx, &config.name, call_timeout)?)
}

/// Managers registered for an already loaded context
pub fn provider_from_context(
    ctx: &AwsContext,
    name: &str,
    call_timeout: Duration,
) -> reka_cloud::Result<Provider> {
    let ebs = Arc::new(EbsManager::from_context(ctx, name));
    let s3 = Arc::new(S3Manager::from_context(ctx, name));

    Provider::new(name)
        .with_call_timeout(call_timeout)
        .with_manager(Manager::full(
            ec2::EC2_NAME,
            ec2::EC2_LONG_NAME,
            Arc::new(Ec2Manager::from_context(ctx, name)),
        ))?
        .with_manager(Manager::new(ebs::EBS_NAME, ebs::EBS_LONG_NAME, ebs.clone()).with_destroyer(ebs))?
        .with_manager(Manager::new(s3::S3_NAME, s3::S3_LONG_NAME, s3.clone()).with_destroyer(s3))
}

/// Remote state backend for `state-backend type="s3"`
pub async fn s3_state_backend(config: &StateBackendConfig) -> Result<RemoteBackend> {
    if config.kind != StateBackendKind::S3 {
        return Err(AwsError::Cloud(reka_cloud::CloudError::InvalidConfig(format!(
            "state backend `{}` is not an S3 backend",
            config.kind
        ))));
    }
    let bucket = config.bucket.as_deref().ok_or_else(|| {
        AwsError::Cloud(reka_cloud::CloudError::InvalidConfig(
            "s3 state backend requires a bucket".to_string(),
        ))
    })?;

    let region = config.region.as_deref().unwrap_or(context::DEFAULT_REGION);
    let ctx = AwsContext::new(region).await;
    Ok(RemoteBackend::new(
        Arc::new(S3BlobStore::from_context(&ctx, bucket)),
        config.path.clone(),
    ))
}
