//! Conditions carried on the resources themselves as namespaced tags
//!
//! ```text
//! reka-destruction-date   = 2024-12-31 18:00 | 10h
//! reka-active-duration    = 09:00-17:00
//! reka-destruction-policy = unused
//! ```

use super::condition::{ActiveWindow, Condition, parse_termination_date};
use crate::resource::{Resource, Tags};
use chrono::{DateTime, FixedOffset};
use tracing::warn;

/// Reserved tag key prefix
pub const TAG_NAMESPACE: &str = "reka-";

/// Condition key of a namespaced tag, if the tag is in the namespace
pub fn namespaced_key(key: &str) -> Option<String> {
    let key = key.trim().to_lowercase();
    key.strip_prefix(TAG_NAMESPACE)
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}

/// Parse one namespaced condition.
///
/// Relative destruction dates count from the resource's creation date.
/// Returns `Ok(None)` for namespaced keys that carry no condition.
pub fn parse_tag_condition(
    key: &str,
    value: &str,
    created: DateTime<FixedOffset>,
) -> Result<Option<Condition>, String> {
    match key {
        "destruction-date" | "termination-date" => {
            parse_termination_date(value, created).map(|date| Some(Condition::TerminationDate(date)))
        }
        "active-duration" => ActiveWindow::parse_range(value).map(|w| Some(Condition::ActiveDuration(w))),
        "destruction-policy" | "termination-policy" => {
            value.parse().map(|p| Some(Condition::TerminationPolicy(p)))
        }
        _ => Ok(None),
    }
}

/// Every valid condition found on the resource's tags, in tag key order.
///
/// Malformed values are logged and skipped.
pub fn tag_conditions(resource: &Resource, offset: FixedOffset) -> Vec<Condition> {
    conditions_from_tags(&resource.tags, resource.creation_date.with_timezone(&offset))
        .into_iter()
        .filter_map(|(key, parsed)| match parsed {
            Ok(condition) => condition,
            Err(reason) => {
                warn!(resource = %resource, tag = %key, %reason, "Ignoring malformed lifecycle tag");
                None
            }
        })
        .collect()
}

fn conditions_from_tags(
    tags: &Tags,
    created: DateTime<FixedOffset>,
) -> Vec<(String, Result<Option<Condition>, String>)> {
    tags.iter()
        .filter_map(|(key, value)| {
            namespaced_key(key).map(|condition_key| {
                let parsed = parse_tag_condition(&condition_key, value, created);
                (key.clone(), parsed)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone, Utc};

    #[test]
    fn test_namespaced_key() {
        assert_eq!(namespaced_key(" REKA-Active-Duration "), Some("active-duration".to_string()));
        assert_eq!(namespaced_key("reka-"), None);
        assert_eq!(namespaced_key("env"), None);
        assert_eq!(namespaced_key("rekadestroy"), None);
    }

    #[test]
    fn test_tag_conditions_skip_malformed_values() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let resource = Resource::new("i-1", "aws", "ec2")
            .with_creation_date(created)
            .with_tag("reka-active-duration", "09:00-17:00")
            .with_tag("reka-destruction-date", "whenever")
            .with_tag("reka-owner", "ops")
            .with_tag("env", "dev");

        let conditions = tag_conditions(&resource, FixedOffset::east_opt(0).unwrap());
        assert_eq!(
            conditions,
            vec![Condition::ActiveDuration(ActiveWindow::new(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            ))]
        );
    }

    #[test]
    fn test_relative_tag_date_counts_from_creation() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let resource = Resource::new("i-1", "aws", "ec2")
            .with_creation_date(created)
            .with_tag("reka-destruction-date", "10h");

        let offset = FixedOffset::east_opt(0).unwrap();
        let conditions = tag_conditions(&resource, offset);
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap().with_timezone(&offset);
        assert_eq!(conditions, vec![Condition::TerminationDate(expected)]);
    }
}
