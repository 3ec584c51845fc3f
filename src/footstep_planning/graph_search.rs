//! Best-first footstep search over planar regions
//!
//! Nodes live in a [`NodeArena`]. The frontier is ordered by `g + h`, ties
//! broken by creation order, so the same inputs always expand the same nodes
//! in the same order. A closed set keyed on the discretized (side, x, y, yaw)
//! keeps each foothold from being expanded twice.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use nalgebra::{Isometry3, Vector2};
use ordered_float::NotNan;

use crate::common::{
    pose_from_xyz_yaw, rotate_xy, xy_of, yaw_of, FootholdSnapper, FootstepPlanner,
    FootstepPlannerListener, FootstepPlanningResult, NoOpListener, RobotSide,
};
use crate::footstep_planning::cliff_avoidance::shift_away_from_cliff_bottoms;
use crate::footstep_planning::expansion::{candidate_steps, compute_ideal_step, IdealStep, StepCandidate};
use crate::footstep_planning::goal::ResolvedGoal;
use crate::footstep_planning::snapping::{foot_polygon, footprint_at};
use crate::footstep_planning::step_envelope::{check_planar_envelope, check_step_envelope, RelativeStep};
use crate::footstep_planning::wiggle::wiggle_foothold;
use crate::footstep_planning::{
    FootstepNode, FootstepPlan, FootstepPlannerGoal, FootstepPlannerParameters, NodeArena, NodeIndex,
    NodeKey, PlannedFootstep, PlannerStatistics, PlanarRegionSnapper, PlanningOutcome, PlanningResult,
    StepDelta, StepRejectionReason,
};
use crate::geometry::{PlanarRegionsList, Polygon2D};

/// Where the robot is standing when planning starts
#[derive(Debug, Clone, PartialEq)]
pub struct InitialStance {
    pub stance_side: RobotSide,
    pub stance_pose: Isometry3<f64>,
    /// Pose of the other foot. When absent it is placed `ideal_step_width`
    /// to the side of the stance foot.
    pub other_foot_pose: Option<Isometry3<f64>>,
}

impl InitialStance {
    pub fn new(stance_side: RobotSide, stance_pose: Isometry3<f64>) -> Self {
        Self {
            stance_side,
            stance_pose,
            other_foot_pose: None,
        }
    }

    pub fn with_other_foot(mut self, pose: Isometry3<f64>) -> Self {
        self.other_foot_pose = Some(pose);
        self
    }

    pub fn other_foot(&self, ideal_step_width: f64) -> Isometry3<f64> {
        self.other_foot_pose.unwrap_or_else(|| {
            let yaw = yaw_of(&self.stance_pose);
            let offset = Vector2::new(0.0, self.stance_side.opposite().negate_if_right(ideal_step_width));
            let xy = xy_of(&self.stance_pose) + rotate_xy(offset, yaw);
            pose_from_xyz_yaw(xy.x, xy.y, self.stance_pose.translation.vector.z, yaw)
        })
    }

    fn is_finite(&self) -> bool {
        [Some(&self.stance_pose), self.other_foot_pose.as_ref()]
            .into_iter()
            .flatten()
            .all(|pose| {
                let t = pose.translation.vector;
                t.x.is_finite() && t.y.is_finite() && t.z.is_finite()
            })
    }
}

/// Outcome of a single `expand_next` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStep {
    /// One node was expanded; the search can continue
    Expanded,
    /// The search is over
    Finished(PlanningResult),
}

type FrontierEntry = Reverse<(NotNan<f64>, u64, NodeIndex)>;

/// One search attempt over fixed inputs
///
/// Driven either to completion with [`FootstepGraphSearch::run`] or one node
/// at a time with [`FootstepGraphSearch::expand_next`], which is what the
/// anytime planner uses between its safe points.
pub struct FootstepGraphSearch<'a> {
    parameters: &'a FootstepPlannerParameters,
    regions: &'a PlanarRegionsList,
    snapper: &'a dyn FootholdSnapper,
    expansion_seeds: &'a [StepDelta],
    goal: ResolvedGoal,
    foot: Polygon2D,
    arena: NodeArena,
    frontier: BinaryHeap<FrontierEntry>,
    best_cost_by_key: HashMap<NodeKey, f64>,
    expanded: HashSet<NodeKey>,
    generation: u64,
    roots: [NodeIndex; 2],
    goal_node: Option<NodeIndex>,
    closest_node: Option<NodeIndex>,
    statistics: PlannerStatistics,
    started: Instant,
    finished: Option<PlanningResult>,
}

impl<'a> FootstepGraphSearch<'a> {
    /// Validate the inputs and seed the frontier with both feet of the stance.
    pub fn new(
        parameters: &'a FootstepPlannerParameters,
        regions: &'a PlanarRegionsList,
        snapper: &'a dyn FootholdSnapper,
        expansion_seeds: &'a [StepDelta],
        initial_stance: &InitialStance,
        goal: &FootstepPlannerGoal,
    ) -> Result<Self, PlanningResult> {
        if let Err(e) = goal.validate() {
            debug!("[FootstepPlanner] FAILED: {}", e);
            return Err(PlanningResult::InvalidGoal);
        }
        if let Err(e) = parameters.validate() {
            warn!("[FootstepPlanner] FAILED: {}", e);
            return Err(PlanningResult::PlannerFailed);
        }
        if regions.is_empty() {
            debug!("[FootstepPlanner] FAILED: no planar regions");
            return Err(PlanningResult::PlannerFailed);
        }
        if !initial_stance.is_finite() {
            debug!("[FootstepPlanner] FAILED: initial stance is not finite");
            return Err(PlanningResult::PlannerFailed);
        }
        let foot = foot_polygon(parameters).map_err(|e| {
            warn!("[FootstepPlanner] FAILED: {}", e);
            PlanningResult::PlannerFailed
        })?;

        let mut search = Self {
            parameters,
            regions,
            snapper,
            expansion_seeds,
            goal: ResolvedGoal::new(goal, parameters.ideal_step_width),
            foot,
            arena: NodeArena::new(),
            frontier: BinaryHeap::new(),
            best_cost_by_key: HashMap::new(),
            expanded: HashSet::new(),
            generation: 0,
            roots: [0, 1],
            goal_node: None,
            closest_node: None,
            statistics: PlannerStatistics::default(),
            started: Instant::now(),
            finished: None,
        };

        let stance_side = initial_stance.stance_side;
        let other_pose = initial_stance.other_foot(parameters.ideal_step_width);
        let stance_root = search.insert_root(stance_side, initial_stance.stance_pose);
        let other_root = search.insert_root(stance_side.opposite(), other_pose);
        search.roots = [stance_root, other_root];

        trace!(
            "[FootstepPlanner] search start: {} stance at ({:.2},{:.2}), goal {}",
            stance_side,
            initial_stance.stance_pose.translation.vector.x,
            initial_stance.stance_pose.translation.vector.y,
            goal.goal_type()
        );
        Ok(search)
    }

    fn insert_root(&mut self, side: RobotSide, pose: Isometry3<f64>) -> NodeIndex {
        let mut node = FootstepNode::new(side, pose);
        let sole_xy = node.sole_xy();
        let footprint = footprint_at(&self.foot, &sole_xy, node.yaw());
        if let Some(snap) = self.snapper.snap(self.regions, &footprint, &sole_xy) {
            node.set_support(Some(snap.region_id), snap.support_fraction);
        }
        let h = self.heuristic(side, &pose);
        node.set_costs(0.0, h);
        let key = self.key_of(&node);
        self.best_cost_by_key.insert(key, 0.0);
        let index = self.arena.insert(node);
        self.frontier.push(Reverse((NotNan::new(h).unwrap_or_default(), self.generation, index)));
        self.generation += 1;
        self.statistics.nodes_created += 1;
        index
    }

    fn heuristic(&self, side: RobotSide, sole: &Isometry3<f64>) -> f64 {
        let p = self.parameters;
        p.heuristic_weight
            * (p.cost_per_step * self.goal.remaining_distance(side, sole) / p.ideal_step_length
                + p.yaw_weight * self.goal.yaw_error(side, sole))
    }

    fn key_of(&self, node: &FootstepNode) -> NodeKey {
        node.key(self.parameters.closed_set_xy_resolution, self.parameters.closed_set_yaw_resolution)
    }

    /// Insert a node into the arena and the frontier unless an equal or
    /// cheaper node with the same key is already known.
    fn push(&mut self, node: FootstepNode) -> Option<NodeIndex> {
        let key = self.key_of(&node);
        if self.expanded.contains(&key) {
            return None;
        }
        let g = node.cost_from_start();
        if self.best_cost_by_key.get(&key).map_or(false, |&best| best <= g) {
            return None;
        }
        let f = match NotNan::new(node.total_cost()) {
            Ok(f) => f,
            Err(_) => {
                warn!("[FootstepPlanner] dropping node with NaN cost");
                return None;
            }
        };
        self.best_cost_by_key.insert(key, g);
        let index = self.arena.insert(node);
        self.frontier.push(Reverse((f, self.generation, index)));
        self.generation += 1;
        self.statistics.nodes_created += 1;
        Some(index)
    }

    /// Pose of the foot that is not `index`'s, at the time `index` was placed
    fn other_foot_pose(&self, index: NodeIndex) -> Option<Isometry3<f64>> {
        let node = self.arena.get(index)?;
        match node.parent() {
            Some(parent) => self.arena.get(parent).map(|p| *p.sole_transform()),
            None => {
                let other = if index == self.roots[0] { self.roots[1] } else { self.roots[0] };
                self.arena.get(other).map(|p| *p.sole_transform())
            }
        }
    }

    fn finish(&mut self, result: PlanningResult) -> SearchStep {
        self.finished = Some(result);
        self.statistics.planning_time = self.started.elapsed();
        SearchStep::Finished(result)
    }

    /// Pop and expand one node. Stale frontier entries are skipped without
    /// counting against the expansion budget.
    pub fn expand_next(&mut self, listener: &mut dyn FootstepPlannerListener) -> SearchStep {
        if let Some(result) = self.finished {
            return SearchStep::Finished(result);
        }
        if self.statistics.nodes_expanded >= self.parameters.maximum_number_of_nodes_to_expand {
            debug!(
                "[FootstepPlanner] FAILED: MaximumIterationsReached ({} nodes)",
                self.statistics.nodes_expanded
            );
            return self.finish(PlanningResult::MaximumIterationsReached);
        }

        loop {
            let Reverse((_, _, index)) = match self.frontier.pop() {
                Some(entry) => entry,
                None => {
                    debug!(
                        "[FootstepPlanner] FAILED: NoPath after expanding {} nodes",
                        self.statistics.nodes_expanded
                    );
                    return self.finish(PlanningResult::NoPathExists);
                }
            };
            let node = match self.arena.get(index) {
                Some(node) => node.clone(),
                None => continue,
            };
            let key = self.key_of(&node);
            if !self.expanded.insert(key) {
                continue;
            }

            listener.node_selected_for_expansion(&node);

            let other_foot = self.other_foot_pose(index);
            if self.goal.is_satisfied(node.side(), node.sole_transform(), other_foot.as_ref()) {
                self.goal_node = Some(index);
                let result = self.finish(PlanningResult::Succeeded);
                if let Some(plan) = self.plan() {
                    debug!(
                        "[FootstepPlanner] SUCCESS: {} steps, {} nodes expanded, cost={:.3}",
                        plan.number_of_steps(),
                        self.statistics.nodes_expanded,
                        node.cost_from_start()
                    );
                    listener.plan_found(&plan);
                }
                return result;
            }

            self.statistics.nodes_expanded += 1;
            let closer = self
                .closest_node
                .and_then(|i| self.arena.get(i))
                .map_or(true, |best| node.heuristic_to_goal() < best.heuristic_to_goal());
            if closer {
                self.closest_node = Some(index);
            }

            self.expand(index, &node, other_foot, listener);
            return SearchStep::Expanded;
        }
    }

    fn expand(
        &mut self,
        index: NodeIndex,
        stance: &FootstepNode,
        swing_foot_pose: Option<Isometry3<f64>>,
        listener: &mut dyn FootstepPlannerListener,
    ) {
        let swing_side = stance.side().opposite();
        let ideal = compute_ideal_step(self.parameters, stance.sole_transform(), swing_side, &self.goal);
        let candidates = candidate_steps(
            self.parameters,
            stance.sole_transform(),
            swing_side,
            &self.goal,
            &ideal,
            self.expansion_seeds,
        );

        for candidate in candidates {
            match self.evaluate_candidate(stance, swing_side, &candidate, swing_foot_pose.as_ref()) {
                Ok(mut node) => {
                    let g = stance.cost_from_start() + self.step_cost(stance, &node, &ideal);
                    let h = self.heuristic(swing_side, node.sole_transform());
                    node.set_parent(index, stance.depth() + 1);
                    node.set_costs(g, h);
                    self.push(node);
                }
                Err((node, reason)) => {
                    self.statistics.candidates_rejected += 1;
                    listener.node_rejected(&node, reason);
                }
            }
        }
    }

    fn step_cost(&self, stance: &FootstepNode, node: &FootstepNode, ideal: &IdealStep) -> f64 {
        let p = self.parameters;
        let step = RelativeStep::new(stance.sole_transform(), node.side(), node.sole_transform());
        p.cost_per_step
            + p.step_deviation_weight * (step.local_xy - ideal.local_xy).norm()
            + p.yaw_weight * step.dyaw.abs()
            + p.height_weight * step.dz.abs()
    }

    /// Planar pre-filter, snap and wiggle, cliff shift, then the full
    /// envelope on the final placement.
    fn evaluate_candidate(
        &self,
        stance: &FootstepNode,
        swing_side: RobotSide,
        candidate: &StepCandidate,
        swing_foot_pose: Option<&Isometry3<f64>>,
    ) -> Result<FootstepNode, (FootstepNode, StepRejectionReason)> {
        let p = self.parameters;
        let mut node = FootstepNode::new(
            swing_side,
            pose_from_xyz_yaw(candidate.xy.x, candidate.xy.y, stance.sole_z(), candidate.yaw),
        );

        let planar = RelativeStep::new(stance.sole_transform(), swing_side, node.sole_transform());
        if let Err(reason) = check_planar_envelope(p, &planar) {
            return Err((node, reason));
        }

        let footprint = footprint_at(&self.foot, &candidate.xy, candidate.yaw);
        let snap = match self.snapper.snap(self.regions, &footprint, &candidate.xy) {
            Some(snap) => snap,
            None => return Err((node, StepRejectionReason::CouldNotSnap)),
        };
        node.set_sole_transform(snap.sole_transform(&candidate.xy, candidate.yaw));
        node.set_support(Some(snap.region_id), snap.support_fraction);
        if snap.normal.z < p.minimum_surface_normal_z {
            return Err((node, StepRejectionReason::SurfaceNormalTooSteep));
        }

        let wiggled = match wiggle_foothold(p, self.regions, &self.foot, &snap, &candidate.xy, candidate.yaw) {
            Ok(wiggled) => wiggled,
            Err(reason) => return Err((node, reason)),
        };
        let yaw = wiggled.yaw;
        node.set_sole_transform(wiggled.snap.sole_transform(&wiggled.sole_xy, yaw));
        node.set_support(Some(wiggled.snap.region_id), wiggled.snap.support_fraction);
        if wiggled.snap.support_fraction < p.minimum_foothold_percent {
            return Err((node, StepRejectionReason::NotEnoughArea));
        }
        if let Err(reason) = check_step_envelope(p, &self.relative(stance, &node)) {
            return Err((node, reason));
        }

        if let Err(reason) = shift_away_from_cliff_bottoms(p, self.regions, &mut node) {
            return Err((node, reason));
        }
        let shifted_xy = node.sole_xy();
        if (shifted_xy - wiggled.sole_xy).norm() > 1e-9 {
            let footprint = footprint_at(&self.foot, &shifted_xy, yaw);
            match self.snapper.snap(self.regions, &footprint, &shifted_xy) {
                Some(resnap)
                    if Some(resnap.region_id) == node.supporting_region_id()
                        && resnap.support_fraction >= p.minimum_foothold_percent =>
                {
                    node.set_sole_transform(resnap.sole_transform(&shifted_xy, yaw));
                    node.set_support(Some(resnap.region_id), resnap.support_fraction);
                }
                _ => return Err((node, StepRejectionReason::TooCloseToCliff)),
            }
            if let Err(reason) = check_step_envelope(p, &self.relative(stance, &node)) {
                return Err((node, reason));
            }
        }

        if let Some(previous) = swing_foot_pose {
            let moved = (node.sole_xy().coords - xy_of(previous)).norm();
            if moved < p.step_in_place_tolerance
                && !self.goal.is_satisfied(swing_side, node.sole_transform(), Some(stance.sole_transform()))
            {
                return Err((node, StepRejectionReason::StepInPlace));
            }
        }

        Ok(node)
    }

    fn relative(&self, stance: &FootstepNode, node: &FootstepNode) -> RelativeStep {
        RelativeStep::new(stance.sole_transform(), node.side(), node.sole_transform())
    }

    /// Run until a terminal result, honouring an optional wall-clock deadline
    pub fn run(&mut self, listener: &mut dyn FootstepPlannerListener, timeout: Option<Duration>) -> PlanningResult {
        let deadline = timeout.map(|t| self.started + t);
        loop {
            if let Some(deadline) = deadline {
                if self.finished.is_none() && Instant::now() >= deadline {
                    debug!(
                        "[FootstepPlanner] FAILED: TimedOut after {} nodes",
                        self.statistics.nodes_expanded
                    );
                    self.finish(PlanningResult::TimedOut);
                }
            }
            if let SearchStep::Finished(result) = self.expand_next(listener) {
                return result;
            }
        }
    }

    pub fn result(&self) -> Option<PlanningResult> {
        self.finished
    }

    pub fn statistics(&self) -> PlannerStatistics {
        let mut statistics = self.statistics;
        if self.finished.is_none() {
            statistics.planning_time = self.started.elapsed();
        }
        statistics
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// Plan to the goal node, once one has been found
    pub fn plan(&self) -> Option<FootstepPlan> {
        self.goal_node.map(|index| self.plan_to(index))
    }

    /// Plan to the expanded node closest to the goal; `None` while that is still a root
    pub fn best_partial_plan(&self) -> Option<FootstepPlan> {
        let plan = self.plan_to(self.closest_node?);
        (!plan.is_empty()).then_some(plan)
    }

    /// Heuristic value of the node behind `best_partial_plan`
    pub fn best_partial_heuristic(&self) -> Option<f64> {
        self.closest_node
            .and_then(|index| self.arena.get(index))
            .map(|node| node.heuristic_to_goal())
    }

    /// Path from the root `index` descends from; the root becomes the plan start
    fn plan_to(&self, index: NodeIndex) -> FootstepPlan {
        let mut path = self.arena.path_to(index).into_iter().filter_map(|i| self.arena.get(i));
        let mut plan = match path.next() {
            Some(root) => FootstepPlan::starting_from(planned_footstep(root)),
            None => FootstepPlan::new(),
        };
        for node in path {
            plan.add_footstep(planned_footstep(node));
        }
        plan
    }
}

fn planned_footstep(node: &FootstepNode) -> PlannedFootstep {
    PlannedFootstep {
        side: node.side(),
        sole_transform: *node.sole_transform(),
        supporting_region_id: node.supporting_region_id(),
        support_fraction: node.support_fraction(),
    }
}

/// Plan once over the given inputs with the default snapper and no seeds.
pub fn plan(
    parameters: &FootstepPlannerParameters,
    regions: &PlanarRegionsList,
    initial_stance: &InitialStance,
    goal: &FootstepPlannerGoal,
) -> PlanningOutcome {
    run_search(parameters, regions, &PlanarRegionSnapper, &[], initial_stance, goal, &mut NoOpListener)
}

fn run_search(
    parameters: &FootstepPlannerParameters,
    regions: &PlanarRegionsList,
    snapper: &dyn FootholdSnapper,
    seeds: &[StepDelta],
    initial_stance: &InitialStance,
    goal: &FootstepPlannerGoal,
    listener: &mut dyn FootstepPlannerListener,
) -> PlanningOutcome {
    let mut search = match FootstepGraphSearch::new(parameters, regions, snapper, seeds, initial_stance, goal) {
        Ok(search) => search,
        Err(result) => return PlanningOutcome::failed(result),
    };
    let timeout = parameters.timeout_seconds.map(Duration::from_secs_f64);
    let result = search.run(listener, timeout);
    let statistics = search.statistics();
    info!(
        "[FootstepPlanner] {} in {:.1}ms: {} expanded, {} created, {} rejected",
        result,
        statistics.planning_time.as_secs_f64() * 1000.0,
        statistics.nodes_expanded,
        statistics.nodes_created,
        statistics.candidates_rejected
    );
    PlanningOutcome {
        result,
        plan: if result.is_success() { search.plan() } else { None },
        statistics,
    }
}

/// Setter-driven one-shot planner
pub struct PlanarRegionBipedalFootstepPlanner {
    parameters: FootstepPlannerParameters,
    regions: Option<Arc<PlanarRegionsList>>,
    initial_stance: Option<InitialStance>,
    goal: Option<FootstepPlannerGoal>,
    snapper: Arc<dyn FootholdSnapper>,
    expansion_seeds: Vec<StepDelta>,
    listener: Option<Box<dyn FootstepPlannerListener>>,
    last_plan: Option<FootstepPlan>,
}

impl PlanarRegionBipedalFootstepPlanner {
    pub fn new(parameters: FootstepPlannerParameters) -> Self {
        Self {
            parameters,
            regions: None,
            initial_stance: None,
            goal: None,
            snapper: Arc::new(PlanarRegionSnapper),
            expansion_seeds: Vec::new(),
            listener: None,
            last_plan: None,
        }
    }

    pub fn parameters(&self) -> &FootstepPlannerParameters {
        &self.parameters
    }

    pub fn set_snapper(&mut self, snapper: Arc<dyn FootholdSnapper>) {
        self.snapper = snapper;
    }

    pub fn set_expansion_seeds(&mut self, seeds: Vec<StepDelta>) {
        self.expansion_seeds = seeds;
    }

    /// Attach a listener; it is told about regions and goal already set
    pub fn set_listener(&mut self, mut listener: Box<dyn FootstepPlannerListener>) {
        if let Some(regions) = &self.regions {
            listener.planar_regions_set(regions);
        }
        if let Some(goal) = &self.goal {
            listener.goal_set(goal);
        }
        self.listener = Some(listener);
    }

    /// Set both feet of the starting stance explicitly
    pub fn set_initial_stance(&mut self, stance: InitialStance) {
        self.initial_stance = Some(stance);
    }
}

impl FootstepPlanner for PlanarRegionBipedalFootstepPlanner {
    fn set_parameters(&mut self, parameters: FootstepPlannerParameters) -> FootstepPlanningResult<()> {
        parameters.validate()?;
        self.parameters = parameters;
        Ok(())
    }

    fn set_planar_regions(&mut self, regions: Arc<PlanarRegionsList>) {
        if let Some(listener) = self.listener.as_mut() {
            listener.planar_regions_set(&regions);
        }
        self.regions = Some(regions);
    }

    fn set_initial_stance_foot(&mut self, stance_pose: Isometry3<f64>, side: RobotSide) {
        self.initial_stance = Some(InitialStance::new(side, stance_pose));
    }

    fn set_goal(&mut self, goal: FootstepPlannerGoal) -> FootstepPlanningResult<()> {
        goal.validate()?;
        if let Some(listener) = self.listener.as_mut() {
            listener.goal_set(&goal);
        }
        self.goal = Some(goal);
        Ok(())
    }

    fn plan(&mut self) -> PlanningOutcome {
        self.last_plan = None;
        let (regions, stance, goal) = match (&self.regions, &self.initial_stance, &self.goal) {
            (Some(regions), Some(stance), Some(goal)) => (regions.clone(), stance.clone(), goal.clone()),
            (_, _, None) => return PlanningOutcome::failed(PlanningResult::InvalidGoal),
            _ => return PlanningOutcome::failed(PlanningResult::PlannerFailed),
        };
        let mut no_op = NoOpListener;
        let listener: &mut dyn FootstepPlannerListener = match self.listener.as_mut() {
            Some(listener) => listener.as_mut(),
            None => &mut no_op,
        };
        let outcome = run_search(
            &self.parameters,
            &regions,
            self.snapper.as_ref(),
            &self.expansion_seeds,
            &stance,
            &goal,
            listener,
        );
        self.last_plan = outcome.plan.clone();
        outcome
    }

    fn get_plan(&self) -> Option<&FootstepPlan> {
        self.last_plan.as_ref()
    }
}
