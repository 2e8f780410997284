//! Lifecycle actions and the per-pass action plan

use crate::resource::{Resources, count_resources};
use serde::{Deserialize, Serialize};

/// What to do with a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Leave the resource alone
    #[default]
    DoNothing,
    /// Stop a running resource
    Stop,
    /// Resume a stopped resource
    Resume,
    /// Destroy the resource
    Destroy,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::DoNothing => write!(f, "do-nothing"),
            Action::Stop => write!(f, "stop"),
            Action::Resume => write!(f, "resume"),
            Action::Destroy => write!(f, "destroy"),
        }
    }
}

/// Classified resources of one provider for a pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionPlan {
    pub stop: Resources,
    pub resume: Resources,
    pub destroy: Resources,
}

impl ActionPlan {
    pub fn has_changes(&self) -> bool {
        count_resources(&self.stop) + count_resources(&self.resume) + count_resources(&self.destroy)
            > 0
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            stop: count_resources(&self.stop),
            resume: count_resources(&self.resume),
            destroy: count_resources(&self.destroy),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub stop: usize,
    pub resume: usize,
    pub destroy: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to stop, {} to resume, {} to destroy",
            self.stop, self.resume, self.destroy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    #[test]
    fn test_plan_summary() {
        let mut plan = ActionPlan::default();
        assert!(!plan.has_changes());

        plan.stop.insert(
            "ec2".to_string(),
            vec![
                Resource::new("i-1", "aws", "ec2"),
                Resource::new("i-2", "aws", "ec2"),
            ],
        );
        plan.destroy
            .insert("s3".to_string(), vec![Resource::new("bucket", "aws", "s3")]);

        assert!(plan.has_changes());
        let summary = plan.summary();
        assert_eq!(
            summary,
            PlanSummary {
                stop: 2,
                resume: 0,
                destroy: 1
            }
        );
        assert_eq!(summary.to_string(), "2 to stop, 0 to resume, 1 to destroy");
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::DoNothing.to_string(), "do-nothing");
        assert_eq!(Action::Destroy.to_string(), "destroy");
    }
}
