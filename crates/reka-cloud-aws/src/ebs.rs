//! EBS volume manager

use crate::context::AwsContext;
use crate::convert::{tags_from_pairs, to_chrono};
use crate::error::from_sdk;
use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::Volume;
use reka_cloud::{CloudError, Destroyer, Fetcher, Resource, Status};
use tracing::{debug, error, info};

pub const EBS_NAME: &str = "ebs";
pub const EBS_LONG_NAME: &str = "Elastic Block Store";

/// Map an EBS volume state to a resource status.
///
/// An `available` volume is attached to nothing, which makes it unused.
pub fn status_from_volume_state(state: &str) -> Status {
    match state {
        "available" => Status::Unused,
        "in-use" => Status::Running,
        "creating" => Status::Pending,
        "deleting" => Status::ShuttingDown,
        "deleted" => Status::Destroyed,
        _ => Status::Error,
    }
}

/// Lists and deletes EBS volumes in one region
pub struct EbsManager {
    client: Client,
    region: String,
    provider: String,
}

impl EbsManager {
    pub fn from_context(ctx: &AwsContext, provider: impl Into<String>) -> Self {
        Self {
            client: ctx.ec2_client(),
            region: ctx.region().to_string(),
            provider: provider.into(),
        }
    }

    fn to_resource(&self, volume: &Volume) -> Option<Resource> {
        let id = volume.volume_id()?;
        let status = volume
            .state()
            .map(|s| status_from_volume_state(s.as_str()))
            .unwrap_or(Status::Error);

        let mut resource = Resource::new(id, &self.provider, EBS_NAME)
            .with_status(status)
            .with_region(&self.region);
        resource.tags = tags_from_pairs(volume.tags().iter().map(|t| (t.key(), t.value())));
        if let Some(zone) = volume.availability_zone() {
            resource.zone = zone.to_string();
        }
        if let Some(created) = volume.create_time().and_then(to_chrono) {
            resource.creation_date = created;
        }
        Some(resource)
    }
}

#[async_trait]
impl Fetcher for EbsManager {
    async fn get_all(&self) -> reka_cloud::Result<Vec<Resource>> {
        debug!(region = %self.region, "Fetching EBS volumes");
        let mut volumes = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_volumes()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(from_sdk)?;

            volumes.extend(
                response
                    .volumes()
                    .iter()
                    .filter_map(|volume| self.to_resource(volume)),
            );

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(count = volumes.len(), "Found EBS volumes");
        Ok(volumes)
    }
}

#[async_trait]
impl Destroyer for EbsManager {
    async fn destroy(&self, resources: &[Resource]) -> reka_cloud::Result<()> {
        let mut failed = Vec::new();
        let mut deleted = 0;

        // attached volumes cannot be deleted
        for volume in resources.iter().filter(|r| r.is_unused()) {
            match self
                .client
                .delete_volume()
                .volume_id(&volume.uuid)
                .send()
                .await
                .map_err(from_sdk)
            {
                Ok(_) => deleted += 1,
                Err(e) => {
                    error!(volume = %volume.uuid, error = %e, "Failed to delete volume");
                    failed.push(format!("{}: {}", volume.uuid, e));
                }
            }
        }

        info!(count = deleted, "Deleted EBS volumes");
        if failed.is_empty() {
            Ok(())
        } else {
            Err(CloudError::mutation(EBS_NAME, "destroy", failed.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_volume_state() {
        assert_eq!(status_from_volume_state("available"), Status::Unused);
        assert_eq!(status_from_volume_state("in-use"), Status::Running);
        assert_eq!(status_from_volume_state("creating"), Status::Pending);
        assert_eq!(status_from_volume_state("deleting"), Status::ShuttingDown);
        assert_eq!(status_from_volume_state("deleted"), Status::Destroyed);
        assert_eq!(status_from_volume_state("error"), Status::Error);
    }

    #[test]
    fn test_available_volume_matches_unused_policy() {
        let volume = Resource::new("vol-1", "aws", EBS_NAME).with_status(status_from_volume_state("available"));
        assert!(volume.is_unused());
        let attached = Resource::new("vol-2", "aws", EBS_NAME).with_status(status_from_volume_state("in-use"));
        assert!(!attached.is_unused());
    }
}
