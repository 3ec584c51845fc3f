//! Anytime footstep planning on a background thread
//!
//! The worker runs the same search as the one-shot planner, one expansion at
//! a time. Between expansions it checks two things: whether a stop was
//! requested, and whether any input slot was overwritten since the search
//! started. New inputs abandon the search (frontier and closed set) and start
//! a fresh one; the last published plan stays readable until a new one
//! replaces it.
//!
//! Inputs are single-slot holders: setting one twice before the worker looks
//! keeps only the latest value.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info};
use nalgebra::Isometry3;

use crate::common::{FootholdSnapper, FootstepPlanningError, FootstepPlanningResult, NoOpListener, RobotSide};
use crate::footstep_planning::{
    FootstepGraphSearch, FootstepPlan, FootstepPlannerGoal, FootstepPlannerParameters, InitialStance,
    PlanarRegionSnapper, PlannerStatistics, PlanningResult, SearchStep, StepDelta,
};
use crate::geometry::PlanarRegionsList;

/// Sleep between input polls while there is nothing to search
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnytimePlannerState {
    /// Not started, or waiting for new or complete inputs
    Idle,
    /// Searching
    Running,
    /// Worker has exited
    Stopped,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Latest-value-wins input holder with a version counter
struct InputSlot<T> {
    version: AtomicU64,
    value: Mutex<Option<T>>,
}

impl<T: Clone> InputSlot<T> {
    fn new(value: Option<T>) -> Self {
        Self {
            version: AtomicU64::new(0),
            value: Mutex::new(value),
        }
    }

    fn store(&self, value: T) {
        let mut slot = lock(&self.value);
        *slot = Some(value);
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> (u64, Option<T>) {
        let slot = lock(&self.value);
        (self.version.load(Ordering::SeqCst), slot.clone())
    }
}

type InputVersions = [u64; 4];

struct SearchInputs {
    versions: InputVersions,
    parameters: FootstepPlannerParameters,
    regions: Arc<PlanarRegionsList>,
    initial_stance: InitialStance,
    goal: FootstepPlannerGoal,
}

struct SharedState {
    parameters: InputSlot<FootstepPlannerParameters>,
    regions: InputSlot<Arc<PlanarRegionsList>>,
    initial_stance: InputSlot<InitialStance>,
    goal: InputSlot<FootstepPlannerGoal>,
    stop_requested: AtomicBool,
    state: Mutex<AnytimePlannerState>,
    best_plan: Mutex<Option<Arc<FootstepPlan>>>,
    plan_generation: AtomicU64,
    last_result: Mutex<Option<(InputVersions, PlanningResult)>>,
    last_statistics: Mutex<PlannerStatistics>,
}

impl SharedState {
    fn input_versions(&self) -> InputVersions {
        [
            self.parameters.version(),
            self.regions.version(),
            self.initial_stance.version(),
            self.goal.version(),
        ]
    }

    fn snapshot_inputs(&self) -> Option<SearchInputs> {
        let (parameters_version, parameters) = self.parameters.snapshot();
        let (regions_version, regions) = self.regions.snapshot();
        let (stance_version, initial_stance) = self.initial_stance.snapshot();
        let (goal_version, goal) = self.goal.snapshot();
        Some(SearchInputs {
            versions: [parameters_version, regions_version, stance_version, goal_version],
            parameters: parameters?,
            regions: regions?,
            initial_stance: initial_stance?,
            goal: goal?,
        })
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: AnytimePlannerState) {
        *lock(&self.state) = state;
    }

    fn publish(&self, plan: FootstepPlan) {
        *lock(&self.best_plan) = Some(Arc::new(plan));
        self.plan_generation.fetch_add(1, Ordering::SeqCst);
    }

    fn record_result(&self, versions: InputVersions, result: PlanningResult, statistics: PlannerStatistics) {
        *lock(&self.last_statistics) = statistics;
        *lock(&self.last_result) = Some((versions, result));
    }
}

enum SearchExit {
    Completed(PlanningResult),
    Restart,
    Stopped,
}

/// Background footstep planner exposing its best plan at any time
pub struct AnytimeFootstepPlanner {
    shared: Arc<SharedState>,
    snapper: Arc<dyn FootholdSnapper>,
    expansion_seeds: Arc<Vec<StepDelta>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AnytimeFootstepPlanner {
    pub fn new(parameters: FootstepPlannerParameters) -> Self {
        Self {
            shared: Arc::new(SharedState {
                parameters: InputSlot::new(Some(parameters)),
                regions: InputSlot::new(None),
                initial_stance: InputSlot::new(None),
                goal: InputSlot::new(None),
                stop_requested: AtomicBool::new(false),
                state: Mutex::new(AnytimePlannerState::Idle),
                best_plan: Mutex::new(None),
                plan_generation: AtomicU64::new(0),
                last_result: Mutex::new(None),
                last_statistics: Mutex::new(PlannerStatistics::default()),
            }),
            snapper: Arc::new(PlanarRegionSnapper),
            expansion_seeds: Arc::new(Vec::new()),
            worker: Mutex::new(None),
        }
    }

    /// Takes effect at the next `start`
    pub fn set_snapper(&mut self, snapper: Arc<dyn FootholdSnapper>) {
        self.snapper = snapper;
    }

    /// Takes effect at the next `start`
    pub fn set_expansion_seeds(&mut self, seeds: Vec<StepDelta>) {
        self.expansion_seeds = Arc::new(seeds);
    }

    /// Used from the next search on; a running search is restarted.
    pub fn set_parameters(&self, parameters: FootstepPlannerParameters) -> FootstepPlanningResult<()> {
        parameters.validate()?;
        self.shared.parameters.store(parameters);
        Ok(())
    }

    pub fn set_planar_regions(&self, regions: Arc<PlanarRegionsList>) {
        self.shared.regions.store(regions);
    }

    pub fn set_initial_stance_foot(&self, stance_pose: Isometry3<f64>, side: RobotSide) {
        self.shared.initial_stance.store(InitialStance::new(side, stance_pose));
    }

    pub fn set_initial_stance(&self, stance: InitialStance) {
        self.shared.initial_stance.store(stance);
    }

    pub fn set_goal(&self, goal: FootstepPlannerGoal) -> FootstepPlanningResult<()> {
        goal.validate()?;
        self.shared.goal.store(goal);
        Ok(())
    }

    /// Spawn the worker. Fails if a worker is already alive.
    pub fn start(&self) -> FootstepPlanningResult<()> {
        let mut worker = lock(&self.worker);
        if worker.as_ref().map_or(false, |handle| !handle.is_finished()) {
            return Err(FootstepPlanningError::PlannerState(
                "anytime planner is already running".to_string(),
            ));
        }
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }

        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.shared.set_state(AnytimePlannerState::Running);

        let shared = Arc::clone(&self.shared);
        let snapper = Arc::clone(&self.snapper);
        let seeds = Arc::clone(&self.expansion_seeds);
        let handle = thread::Builder::new()
            .name("anytime-footstep-planner".to_string())
            .spawn(move || run_worker(shared, snapper, seeds));
        match handle {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(AnytimePlannerState::Stopped);
                Err(e.into())
            }
        }
    }

    /// Ask the worker to exit at its next safe point. Does not block.
    pub fn request_stop(&self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Block until the worker has exited
    pub fn join(&self) {
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    pub fn state(&self) -> AnytimePlannerState {
        *lock(&self.shared.state)
    }

    /// Most recent complete plan, or the best partial plan of the current search
    pub fn best_plan_yet(&self) -> Option<Arc<FootstepPlan>> {
        lock(&self.shared.best_plan).clone()
    }

    /// Incremented every time `best_plan_yet` changes
    pub fn plan_generation(&self) -> u64 {
        self.shared.plan_generation.load(Ordering::SeqCst)
    }

    /// Result of the last search that ran to completion
    pub fn last_result(&self) -> Option<PlanningResult> {
        let last = *lock(&self.shared.last_result);
        last.map(|(_, result)| result)
    }

    pub fn last_statistics(&self) -> PlannerStatistics {
        *lock(&self.shared.last_statistics)
    }

    /// Wait until a search over the current inputs has completed.
    ///
    /// Returns `None` on timeout or if the worker stopped first.
    pub fn wait_for_completion(&self, timeout: Duration) -> Option<PlanningResult> {
        let deadline = Instant::now() + timeout;
        loop {
            let versions = self.shared.input_versions();
            if let Some((completed, result)) = *lock(&self.shared.last_result) {
                if completed == versions {
                    return Some(result);
                }
            }
            if self.state() == AnytimePlannerState::Stopped || Instant::now() >= deadline {
                return None;
            }
            thread::sleep(IDLE_POLL_INTERVAL);
        }
    }
}

impl Drop for AnytimeFootstepPlanner {
    fn drop(&mut self) {
        self.request_stop();
        self.join();
    }
}

fn run_worker(shared: Arc<SharedState>, snapper: Arc<dyn FootholdSnapper>, seeds: Arc<Vec<StepDelta>>) {
    info!("[AnytimePlanner] worker started");
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker_loop(&shared, snapper.as_ref(), &seeds)));
    if outcome.is_err() {
        error!("[AnytimePlanner] worker panicked, keeping last published plan");
    }
    shared.set_state(AnytimePlannerState::Stopped);
    info!("[AnytimePlanner] worker stopped");
}

fn worker_loop(shared: &SharedState, snapper: &dyn FootholdSnapper, seeds: &[StepDelta]) {
    let mut completed: Option<InputVersions> = None;
    while !shared.stop_requested() {
        if completed == Some(shared.input_versions()) {
            shared.set_state(AnytimePlannerState::Idle);
            thread::sleep(IDLE_POLL_INTERVAL);
            continue;
        }
        let inputs = match shared.snapshot_inputs() {
            Some(inputs) => inputs,
            None => {
                shared.set_state(AnytimePlannerState::Idle);
                thread::sleep(IDLE_POLL_INTERVAL);
                continue;
            }
        };

        match search(shared, snapper, seeds, &inputs) {
            SearchExit::Completed(result) => {
                completed = Some(inputs.versions);
                if inputs.parameters.exit_after_initial_solution {
                    debug!("[AnytimePlanner] exiting after initial solution ({})", result);
                    break;
                }
            }
            SearchExit::Restart => {
                debug!("[AnytimePlanner] inputs changed, restarting search");
            }
            SearchExit::Stopped => break,
        }
    }
}

fn search(
    shared: &SharedState,
    snapper: &dyn FootholdSnapper,
    seeds: &[StepDelta],
    inputs: &SearchInputs,
) -> SearchExit {
    shared.set_state(AnytimePlannerState::Running);
    let mut search = match FootstepGraphSearch::new(
        &inputs.parameters,
        &inputs.regions,
        snapper,
        seeds,
        &inputs.initial_stance,
        &inputs.goal,
    ) {
        Ok(search) => search,
        Err(result) => {
            info!("[AnytimePlanner] search rejected inputs: {}", result);
            shared.record_result(inputs.versions, result, PlannerStatistics::default());
            return SearchExit::Completed(result);
        }
    };

    let timeout = inputs.parameters.timeout_seconds.map(Duration::from_secs_f64);
    let mut listener = NoOpListener;
    let mut published_heuristic = f64::INFINITY;
    loop {
        if shared.stop_requested() {
            return SearchExit::Stopped;
        }
        if shared.input_versions() != inputs.versions {
            return SearchExit::Restart;
        }
        let step = match timeout {
            Some(timeout) if search.statistics().planning_time >= timeout => {
                SearchStep::Finished(PlanningResult::TimedOut)
            }
            _ => search.expand_next(&mut listener),
        };
        match step {
            SearchStep::Expanded => {
                if let Some(h) = search.best_partial_heuristic() {
                    if h < published_heuristic {
                        if let Some(partial) = search.best_partial_plan() {
                            shared.publish(partial);
                            published_heuristic = h;
                        }
                    }
                }
            }
            SearchStep::Finished(result) => {
                if let Some(plan) = search.plan() {
                    shared.publish(plan);
                }
                let statistics = search.statistics();
                info!(
                    "[AnytimePlanner] {} in {:.1}ms: {} expanded, {} created",
                    result,
                    statistics.planning_time.as_secs_f64() * 1000.0,
                    statistics.nodes_expanded,
                    statistics.nodes_created
                );
                shared.record_result(inputs.versions, result, statistics);
                return SearchExit::Completed(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::pose_from_xyz_yaw;
    use crate::footstep_planning::step_envelope::RelativeStep;
    use crate::footstep_planning::{environments, plan};
    use nalgebra::Point2;

    const WAIT: Duration = Duration::from_secs(60);

    fn stance() -> InitialStance {
        InitialStance::new(RobotSide::Left, pose_from_xyz_yaw(0.0, 0.1, 0.0, 0.0))
    }

    #[test]
    fn test_matches_one_shot_on_cinder_blocks() {
        let parameters = FootstepPlannerParameters::default();
        let regions = Arc::new(environments::cinder_block_field(42, 6, 4).unwrap());
        let goal = FootstepPlannerGoal::xy_region(environments::cinder_block_field_goal(6), 0.4);
        let one_shot = plan(&parameters, &regions, &stance(), &goal);

        let planner = AnytimeFootstepPlanner::new(parameters);
        planner.set_planar_regions(Arc::clone(&regions));
        planner.set_initial_stance(stance());
        planner.set_goal(goal).unwrap();
        planner.start().unwrap();

        let result = planner.wait_for_completion(WAIT);
        assert_eq!(result, Some(one_shot.result));
        if let Some(expected) = one_shot.plan {
            let anytime = planner.best_plan_yet().unwrap();
            let difference = anytime.number_of_steps() as i64 - expected.number_of_steps() as i64;
            assert!(difference.abs() <= 1);
            assert_eq!(anytime.footsteps(), expected.footsteps());
        }
        planner.request_stop();
        planner.join();
        assert_eq!(planner.state(), AnytimePlannerState::Stopped);
    }

    #[test]
    fn test_stop_is_prompt_on_large_environment() {
        let parameters = FootstepPlannerParameters {
            maximum_number_of_nodes_to_expand: usize::MAX,
            ..Default::default()
        };
        let planner = AnytimeFootstepPlanner::new(parameters);
        planner.set_planar_regions(Arc::new(environments::cinder_block_field(1, 40, 40).unwrap()));
        planner.set_initial_stance(stance());
        // Unreachable: the search keeps expanding until stopped
        planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(100.0, 0.0), 0.5))
            .unwrap();
        planner.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(planner.state(), AnytimePlannerState::Running);

        let requested = Instant::now();
        planner.request_stop();
        planner.join();
        assert!(requested.elapsed() < Duration::from_secs(1));
        assert_eq!(planner.state(), AnytimePlannerState::Stopped);
        assert!(planner.last_result().is_none());
    }

    #[test]
    fn test_goal_change_restarts_search() {
        let planner = AnytimeFootstepPlanner::new(FootstepPlannerParameters::default());
        planner.set_planar_regions(Arc::new(environments::flat_ground(-1.0, -2.0, 6.0, 2.0).unwrap()));
        planner.set_initial_stance(stance());
        planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(2.0, 0.0), 0.3))
            .unwrap();
        planner.start().unwrap();
        assert_eq!(planner.wait_for_completion(WAIT), Some(PlanningResult::Succeeded));
        let first = planner.best_plan_yet().unwrap();
        let first_generation = planner.plan_generation();
        assert!(first.last().unwrap().sole_transform.translation.vector.x < 2.5);

        planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(4.0, 0.0), 0.3))
            .unwrap();
        assert_eq!(planner.wait_for_completion(WAIT), Some(PlanningResult::Succeeded));
        let second = planner.best_plan_yet().unwrap();
        assert!(planner.plan_generation() > first_generation);
        assert!(second.last().unwrap().sole_transform.translation.vector.x > 3.6);
        // the earlier plan handed out is untouched
        assert!(first.last().unwrap().sole_transform.translation.vector.x < 2.5);
    }

    #[test]
    fn test_waits_for_missing_inputs() {
        let planner = AnytimeFootstepPlanner::new(FootstepPlannerParameters::default());
        planner.set_initial_stance(stance());
        planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(1.5, 0.0), 0.3))
            .unwrap();
        planner.start().unwrap();
        assert!(planner.wait_for_completion(Duration::from_millis(50)).is_none());
        assert!(planner.best_plan_yet().is_none());

        planner.set_planar_regions(Arc::new(environments::flat_ground(-1.0, -2.0, 3.0, 2.0).unwrap()));
        assert_eq!(planner.wait_for_completion(WAIT), Some(PlanningResult::Succeeded));
        assert!(planner.start().is_err());
    }

    #[test]
    fn test_invalid_inputs_are_reported() {
        let planner = AnytimeFootstepPlanner::new(FootstepPlannerParameters::default());
        assert!(planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(1.0, 0.0), 0.0))
            .is_err());
        assert!(planner
            .set_parameters(FootstepPlannerParameters {
                maximum_step_reach: -1.0,
                ..Default::default()
            })
            .is_err());

        planner.set_planar_regions(Arc::new(PlanarRegionsList::default()));
        planner.set_initial_stance(stance());
        planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(1.0, 0.0), 0.3))
            .unwrap();
        planner.start().unwrap();
        assert_eq!(planner.wait_for_completion(WAIT), Some(PlanningResult::PlannerFailed));
        assert!(planner.best_plan_yet().is_none());
    }

    #[test]
    fn test_exit_after_initial_solution() {
        let parameters = FootstepPlannerParameters {
            exit_after_initial_solution: true,
            ..Default::default()
        };
        let planner = AnytimeFootstepPlanner::new(parameters);
        planner.set_planar_regions(Arc::new(environments::flat_ground(-1.0, -2.0, 3.0, 2.0).unwrap()));
        planner.set_initial_stance(stance());
        planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(1.5, 0.0), 0.3))
            .unwrap();
        planner.start().unwrap();
        planner.join();
        assert_eq!(planner.state(), AnytimePlannerState::Stopped);
        assert_eq!(planner.last_result(), Some(PlanningResult::Succeeded));
        assert!(planner.best_plan_yet().is_some());
    }

    fn wait_for_partial_plan(planner: &AnytimeFootstepPlanner) -> Arc<FootstepPlan> {
        let deadline = Instant::now() + WAIT;
        loop {
            if let Some(partial) = planner.best_plan_yet() {
                return partial;
            }
            assert!(Instant::now() < deadline, "no partial plan published");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_new_goal_and_regions_mid_search() {
        let parameters = FootstepPlannerParameters {
            maximum_number_of_nodes_to_expand: usize::MAX,
            ..Default::default()
        };
        let planner = AnytimeFootstepPlanner::new(parameters);
        planner.set_planar_regions(Arc::new(environments::cinder_block_field(1, 40, 40).unwrap()));
        planner.set_initial_stance(stance());
        planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(100.0, 0.0), 0.5))
            .unwrap();
        planner.start().unwrap();

        let partial = wait_for_partial_plan(&planner);
        let partial_copy = (*partial).clone();
        let partial_generation = planner.plan_generation();
        assert_eq!(planner.state(), AnytimePlannerState::Running);
        assert!(planner.last_result().is_none());

        planner.set_planar_regions(Arc::new(environments::flat_ground(-1.0, -2.0, 3.0, 2.0).unwrap()));
        planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(2.0, 0.0), 0.3))
            .unwrap();
        assert_eq!(planner.wait_for_completion(WAIT), Some(PlanningResult::Succeeded));

        let replanned = planner.best_plan_yet().unwrap();
        assert!(planner.plan_generation() > partial_generation);
        assert!(!Arc::ptr_eq(&partial, &replanned));
        let last = replanned.last().unwrap();
        assert!((last.sole_transform.translation.vector.xy() - Point2::new(2.0, 0.0).coords).norm() <= 0.3);
        // the only region of the new environment has id 0
        assert!(replanned.footsteps().iter().all(|step| step.supporting_region_id == Some(0)));
        // the snapshot handed out before the change is untouched
        assert_eq!(*partial, partial_copy);
    }

    #[test]
    fn test_timeout_completes_search() {
        let parameters = FootstepPlannerParameters {
            maximum_number_of_nodes_to_expand: usize::MAX,
            timeout_seconds: Some(0.05),
            ..Default::default()
        };
        let planner = AnytimeFootstepPlanner::new(parameters);
        planner.set_planar_regions(Arc::new(environments::cinder_block_field(1, 40, 40).unwrap()));
        planner.set_initial_stance(stance());
        planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(100.0, 0.0), 0.5))
            .unwrap();
        planner.start().unwrap();

        assert_eq!(planner.wait_for_completion(WAIT), Some(PlanningResult::TimedOut));
        assert!(planner.last_statistics().planning_time >= Duration::from_millis(50));
        // the worker idles on the same inputs instead of searching again
        thread::sleep(Duration::from_millis(50));
        assert_eq!(planner.state(), AnytimePlannerState::Idle);
    }

    #[test]
    fn test_expansion_seeds_are_used() {
        let parameters = FootstepPlannerParameters {
            step_deviation_weight: 0.0,
            exit_after_initial_solution: true,
            ..Default::default()
        };
        let mut planner = AnytimeFootstepPlanner::new(parameters);
        planner.set_expansion_seeds(vec![StepDelta::new(-0.25, 0.2, 0.0)]);
        planner.set_planar_regions(Arc::new(environments::flat_ground(-2.0, -2.0, 2.0, 2.0).unwrap()));
        planner.set_initial_stance(stance());
        // behind the start; lattice steps never move backward from the stance foot
        planner
            .set_goal(FootstepPlannerGoal::xy_region(Point2::new(-0.8, 0.0), 0.25))
            .unwrap();
        planner.start().unwrap();
        planner.join();
        assert_eq!(planner.last_result(), Some(PlanningResult::Succeeded));

        let plan = planner.best_plan_yet().unwrap();
        let mut support = plan.start().unwrap().sole_transform;
        let mut backward = 0;
        for step in plan.footsteps() {
            if RelativeStep::new(&support, step.side, &step.sole_transform).local_xy.x < -0.1 {
                backward += 1;
            }
            support = step.sole_transform;
        }
        assert!(backward > 0);
    }
}
