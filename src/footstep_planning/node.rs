//! Search nodes and the arena that owns them
//!
//! A node is a candidate foothold for one foot. Nodes reference their parent
//! by index into the [`NodeArena`]; once inserted they are never mutated.

use nalgebra::{Isometry3, Point2};

use crate::common::{xy_of, yaw_of, RobotSide};

pub type NodeIndex = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct FootstepNode {
    side: RobotSide,
    sole_transform: Isometry3<f64>,
    supporting_region_id: Option<usize>,
    support_fraction: f64,
    parent: Option<NodeIndex>,
    cost_from_start: f64,
    heuristic_to_goal: f64,
    depth: usize,
}

impl FootstepNode {
    pub fn new(side: RobotSide, sole_transform: Isometry3<f64>) -> Self {
        Self {
            side,
            sole_transform,
            supporting_region_id: None,
            support_fraction: 0.0,
            parent: None,
            cost_from_start: 0.0,
            heuristic_to_goal: 0.0,
            depth: 0,
        }
    }

    pub fn side(&self) -> RobotSide {
        self.side
    }

    pub fn sole_transform(&self) -> &Isometry3<f64> {
        &self.sole_transform
    }

    pub fn sole_xy(&self) -> Point2<f64> {
        Point2::from(xy_of(&self.sole_transform))
    }

    pub fn sole_z(&self) -> f64 {
        self.sole_transform.translation.vector.z
    }

    pub fn yaw(&self) -> f64 {
        yaw_of(&self.sole_transform)
    }

    pub fn supporting_region_id(&self) -> Option<usize> {
        self.supporting_region_id
    }

    /// Fraction of the sole area over the supporting region, in [0, 1]
    pub fn support_fraction(&self) -> f64 {
        self.support_fraction
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    pub fn cost_from_start(&self) -> f64 {
        self.cost_from_start
    }

    pub fn heuristic_to_goal(&self) -> f64 {
        self.heuristic_to_goal
    }

    pub fn total_cost(&self) -> f64 {
        self.cost_from_start + self.heuristic_to_goal
    }

    /// Number of steps from the root
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn set_sole_transform(&mut self, sole_transform: Isometry3<f64>) {
        self.sole_transform = sole_transform;
    }

    pub(crate) fn set_support(&mut self, region_id: Option<usize>, support_fraction: f64) {
        self.supporting_region_id = region_id;
        self.support_fraction = support_fraction;
    }

    pub(crate) fn set_parent(&mut self, parent: NodeIndex, depth: usize) {
        self.parent = Some(parent);
        self.depth = depth;
    }

    pub(crate) fn set_costs(&mut self, cost_from_start: f64, heuristic_to_goal: f64) {
        self.cost_from_start = cost_from_start;
        self.heuristic_to_goal = heuristic_to_goal;
    }

    pub fn key(&self, xy_resolution: f64, yaw_resolution: f64) -> NodeKey {
        NodeKey::new(self.side, &self.sole_transform, xy_resolution, yaw_resolution)
    }
}

/// Discretized (side, x, y, yaw) identity used by the closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    side: RobotSide,
    x: i64,
    y: i64,
    yaw: i64,
}

impl NodeKey {
    pub fn new(side: RobotSide, sole: &Isometry3<f64>, xy_resolution: f64, yaw_resolution: f64) -> Self {
        let xy = xy_of(sole);
        Self {
            side,
            x: (xy.x / xy_resolution).round() as i64,
            y: (xy.y / xy_resolution).round() as i64,
            yaw: (yaw_of(sole) / yaw_resolution).round() as i64,
        }
    }
}

/// Append-only node storage for one search
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<FootstepNode>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: FootstepNode) -> NodeIndex {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn get(&self, index: NodeIndex) -> Option<&FootstepNode> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indices from the root down to `index`
    pub fn path_to(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut path = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            match self.nodes.get(i) {
                Some(node) => {
                    path.push(i);
                    current = node.parent;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }
}
