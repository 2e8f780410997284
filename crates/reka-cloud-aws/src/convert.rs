//! Conversions from SDK shapes to resource fields

use aws_sdk_ec2::primitives::DateTime as SmithyDateTime;
use chrono::{DateTime, Utc};
use reka_cloud::Tags;

/// Collect SDK key/value tag pairs, dropping entries without a key
pub fn tags_from_pairs<'a, I>(pairs: I) -> Tags
where
    I: IntoIterator<Item = (Option<&'a str>, Option<&'a str>)>,
{
    pairs
        .into_iter()
        .filter_map(|(key, value)| {
            let key = key?.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.unwrap_or_default().to_string()))
        })
        .collect()
}

pub fn to_chrono(time: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

/// Region of a bucket from its location constraint.
///
/// An empty constraint means us-east-1 and the legacy `EU` value means eu-west-1.
pub fn bucket_region(constraint: Option<&str>) -> String {
    match constraint.map(str::trim) {
        None | Some("") => "us-east-1".to_string(),
        Some("EU") => "eu-west-1".to_string(),
        Some(region) => region.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_from_pairs() {
        let tags = tags_from_pairs(vec![
            (Some("env"), Some("dev")),
            (Some(" owner "), None),
            (None, Some("orphan")),
            (Some(""), Some("blank")),
        ]);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["env"], "dev");
        assert_eq!(tags["owner"], "");
    }

    #[test]
    fn test_to_chrono() {
        let time = SmithyDateTime::from_secs(1_714_564_800);
        let converted = to_chrono(&time).unwrap();
        assert_eq!(converted.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_bucket_region() {
        assert_eq!(bucket_region(None), "us-east-1");
        assert_eq!(bucket_region(Some("")), "us-east-1");
        assert_eq!(bucket_region(Some("EU")), "eu-west-1");
        assert_eq!(bucket_region(Some("ap-south-1")), "ap-south-1");
    }
}
