//! Listener that tallies search events

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::common::FootstepPlannerListener;
use crate::footstep_planning::{FootstepNode, FootstepPlan, StepRejectionReason};

#[derive(Debug, Default)]
struct Counts {
    rejections: BTreeMap<StepRejectionReason, usize>,
    nodes_selected: usize,
    plans_found: usize,
}

/// Counts rejections per reason and expanded nodes.
///
/// Clones share the same counters: hand one clone to the planner and read
/// the other.
#[derive(Debug, Clone, Default)]
pub struct RejectionCounter {
    counts: Arc<Mutex<Counts>>,
}

impl RejectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_counts<T>(&self, f: impl FnOnce(&mut Counts) -> T) -> T {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut counts)
    }

    pub fn count(&self, reason: StepRejectionReason) -> usize {
        self.with_counts(|c| c.rejections.get(&reason).copied().unwrap_or(0))
    }

    pub fn total_rejections(&self) -> usize {
        self.with_counts(|c| c.rejections.values().sum())
    }

    /// Rejection counts, most frequent first
    pub fn summary(&self) -> Vec<(StepRejectionReason, usize)> {
        let mut summary: Vec<_> = self.with_counts(|c| c.rejections.iter().map(|(r, n)| (*r, *n)).collect());
        summary.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        summary
    }

    pub fn nodes_selected(&self) -> usize {
        self.with_counts(|c| c.nodes_selected)
    }

    pub fn plans_found(&self) -> usize {
        self.with_counts(|c| c.plans_found)
    }

    pub fn reset(&self) {
        self.with_counts(|c| *c = Counts::default());
    }
}

impl FootstepPlannerListener for RejectionCounter {
    fn node_selected_for_expansion(&mut self, _node: &FootstepNode) {
        self.with_counts(|c| c.nodes_selected += 1);
    }

    fn node_rejected(&mut self, _node: &FootstepNode, reason: StepRejectionReason) {
        self.with_counts(|c| *c.rejections.entry(reason).or_insert(0) += 1);
    }

    fn plan_found(&mut self, _plan: &FootstepPlan) {
        self.with_counts(|c| c.plans_found += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{pose_from_xyz_yaw, RobotSide};

    #[test]
    fn test_clones_share_counts() {
        let reader = RejectionCounter::new();
        let mut writer = reader.clone();
        let node = FootstepNode::new(RobotSide::Right, pose_from_xyz_yaw(0.3, -0.1, 0.0, 0.0));
        writer.node_rejected(&node, StepRejectionReason::NotEnoughArea);
        writer.node_rejected(&node, StepRejectionReason::NotEnoughArea);
        writer.node_rejected(&node, StepRejectionReason::StepTooFar);

        assert_eq!(reader.count(StepRejectionReason::NotEnoughArea), 2);
        assert_eq!(reader.total_rejections(), 3);
        assert_eq!(reader.summary()[0], (StepRejectionReason::NotEnoughArea, 2));

        reader.reset();
        assert_eq!(writer.total_rejections(), 0);
    }
}
