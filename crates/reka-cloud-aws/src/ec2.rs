//! EC2 instance manager

use crate::context::AwsContext;
use crate::convert::{tags_from_pairs, to_chrono};
use crate::error::from_sdk;
use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::Instance;
use reka_cloud::{Destroyer, Fetcher, Resource, Status, StopperResumer};
use tracing::{debug, info};

pub const EC2_NAME: &str = "ec2";
pub const EC2_LONG_NAME: &str = "Elastic Compute Cloud";

/// Map an EC2 instance state code to a resource status.
///
/// Only the low byte is meaningful; the high byte is reserved for AWS.
pub fn status_from_code(code: i32) -> Status {
    match code & 0xff {
        0 => Status::Pending,
        16 => Status::Running,
        32 => Status::ShuttingDown,
        48 => Status::Destroyed,
        64 => Status::Stopping,
        80 => Status::Stopped,
        _ => Status::Error,
    }
}

/// Stops, starts and terminates EC2 instances in one region
pub struct Ec2Manager {
    client: Client,
    region: String,
    provider: String,
}

impl Ec2Manager {
    pub fn from_context(ctx: &AwsContext, provider: impl Into<String>) -> Self {
        Self {
            client: ctx.ec2_client(),
            region: ctx.region().to_string(),
            provider: provider.into(),
        }
    }

    fn to_resource(&self, instance: &Instance) -> Option<Resource> {
        let id = instance.instance_id()?;
        let status = instance
            .state()
            .and_then(|s| s.code())
            .map(status_from_code)
            .unwrap_or(Status::Error);

        let mut resource = Resource::new(id, &self.provider, EC2_NAME)
            .with_status(status)
            .with_region(&self.region);
        resource.tags = tags_from_pairs(instance.tags().iter().map(|t| (t.key(), t.value())));
        if let Some(zone) = instance.placement().and_then(|p| p.availability_zone()) {
            resource.zone = zone.to_string();
        }
        // launch time is the closest thing EC2 reports to a creation date
        if let Some(launched) = instance.launch_time().and_then(to_chrono) {
            resource.creation_date = launched;
        }
        Some(resource)
    }

    fn ids(resources: &[Resource], keep: impl Fn(&Resource) -> bool) -> Vec<String> {
        resources
            .iter()
            .filter(|&r| keep(r))
            .map(|r| r.uuid.clone())
            .collect()
    }
}

#[async_trait]
impl Fetcher for Ec2Manager {
    async fn get_all(&self) -> reka_cloud::Result<Vec<Resource>> {
        debug!(region = %self.region, "Fetching EC2 instances");
        let mut instances = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_instances()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(from_sdk)?;

            for reservation in response.reservations() {
                instances.extend(
                    reservation
                        .instances()
                        .iter()
                        .filter_map(|instance| self.to_resource(instance)),
                );
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(count = instances.len(), "Found EC2 instances");
        Ok(instances)
    }
}

#[async_trait]
impl StopperResumer for Ec2Manager {
    async fn stop(&self, resources: &[Resource]) -> reka_cloud::Result<()> {
        let ids = Self::ids(resources, Resource::is_active);
        if ids.is_empty() {
            return Ok(());
        }

        info!(instances = ?ids, "Stopping EC2 instances");
        self.client
            .stop_instances()
            .set_instance_ids(Some(ids))
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn resume(&self, resources: &[Resource]) -> reka_cloud::Result<()> {
        let ids = Self::ids(resources, Resource::is_stopped);
        if ids.is_empty() {
            return Ok(());
        }

        info!(instances = ?ids, "Starting EC2 instances");
        self.client
            .start_instances()
            .set_instance_ids(Some(ids))
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }
}

#[async_trait]
impl Destroyer for Ec2Manager {
    async fn destroy(&self, resources: &[Resource]) -> reka_cloud::Result<()> {
        let ids = Self::ids(resources, |r| r.is_active() || r.is_stopped() || r.is_unused());
        if ids.is_empty() {
            return Ok(());
        }

        info!(instances = ?ids, "Terminating EC2 instances");
        self.client
            .terminate_instances()
            .set_instance_ids(Some(ids))
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_code() {
        assert_eq!(status_from_code(0), Status::Pending);
        assert_eq!(status_from_code(16), Status::Running);
        assert_eq!(status_from_code(32), Status::ShuttingDown);
        assert_eq!(status_from_code(48), Status::Destroyed);
        assert_eq!(status_from_code(64), Status::Stopping);
        assert_eq!(status_from_code(80), Status::Stopped);
        // high byte is ignored
        assert_eq!(status_from_code(0x0100 | 16), Status::Running);
        assert_eq!(status_from_code(7), Status::Error);
    }

    #[test]
    fn test_ids_filter() {
        let resources = vec![
            Resource::new("i-1", "aws", "ec2").with_status(Status::Running),
            Resource::new("i-2", "aws", "ec2").with_status(Status::Stopped),
            Resource::new("i-3", "aws", "ec2").with_status(Status::Destroyed),
        ];
        assert_eq!(Ec2Manager::ids(&resources, Resource::is_active), vec!["i-1"]);
        assert_eq!(Ec2Manager::ids(&resources, Resource::is_stopped), vec!["i-2"]);
    }
}
