//! Footstep planning demo across a random cinder-block field
//!
//! Plans once with the one-shot planner, then runs the anytime planner on the
//! same inputs and compares the two.
//!
//! Usage:
//!   cargo run --bin footstep_planner -- --seed 3 --rows 8 --plot
//!   RUST_LOG=debug cargo run --bin footstep_planner

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use rust_footstep_planning::common::pose_from_xyz_yaw;
use rust_footstep_planning::footstep_planning::environments;
use rust_footstep_planning::utils::FootstepVisualizer;
use rust_footstep_planning::{
    AnytimeFootstepPlanner, FootstepPlanner, FootstepPlannerGoal, FootstepPlannerParameters,
    PlanarRegionBipedalFootstepPlanner, RobotSide,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seed of the cinder-block heights
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Rows of cinder blocks along x
    #[arg(long, default_value = "6")]
    rows: usize,

    /// Columns of cinder blocks along y
    #[arg(long, default_value = "4")]
    cols: usize,

    /// Planner parameters YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to give the anytime planner
    #[arg(long, default_value = "10.0")]
    anytime_seconds: f64,

    /// Save the plan to footstep_plan.png
    #[arg(long)]
    plot: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let parameters = match &args.config {
        Some(path) => FootstepPlannerParameters::load(path).unwrap_or_else(|e| {
            warn!("Failed to load {}: {}, using defaults", path.display(), e);
            FootstepPlannerParameters::default()
        }),
        None => FootstepPlannerParameters::default(),
    };

    let regions = match environments::cinder_block_field(args.seed, args.rows, args.cols) {
        Ok(regions) => Arc::new(regions),
        Err(e) => {
            error!("Could not build environment: {}", e);
            std::process::exit(1);
        }
    };
    let goal_xy = environments::cinder_block_field_goal(args.rows);
    let goal = FootstepPlannerGoal::xy_region(goal_xy, 0.4);
    let stance_pose = pose_from_xyz_yaw(0.0, 0.1, 0.0, 0.0);

    let mut planner = PlanarRegionBipedalFootstepPlanner::new(parameters.clone());
    planner.set_planar_regions(Arc::clone(&regions));
    planner.set_initial_stance_foot(stance_pose, RobotSide::Left);
    if let Err(e) = planner.set_goal(goal.clone()) {
        error!("{}", e);
        std::process::exit(1);
    }
    let outcome = planner.plan();
    info!(
        "One-shot: {} with {} steps ({} nodes expanded)",
        outcome.result,
        outcome.plan.as_ref().map_or(0, |p| p.number_of_steps()),
        outcome.statistics.nodes_expanded
    );

    let anytime = AnytimeFootstepPlanner::new(parameters.clone());
    anytime.set_planar_regions(Arc::clone(&regions));
    anytime.set_initial_stance_foot(stance_pose, RobotSide::Left);
    if let Err(e) = anytime.set_goal(goal) {
        error!("{}", e);
        std::process::exit(1);
    }
    if let Err(e) = anytime.start() {
        error!("{}", e);
        std::process::exit(1);
    }
    match anytime.wait_for_completion(Duration::from_secs_f64(args.anytime_seconds)) {
        Some(result) => info!(
            "Anytime: {} with {} steps",
            result,
            anytime.best_plan_yet().map_or(0, |p| p.number_of_steps())
        ),
        None => info!(
            "Anytime: still searching, best plan so far has {} steps",
            anytime.best_plan_yet().map_or(0, |p| p.number_of_steps())
        ),
    }
    anytime.request_stop();
    anytime.join();

    if args.plot {
        let mut vis = FootstepVisualizer::new(&parameters);
        vis.set_title("Footstep plan").draw(regions.as_ref());
        if let Some(plan) = planner.get_plan() {
            vis.draw(plan);
        }
        vis.plot_start(&nalgebra::Point2::new(0.0, 0.0)).plot_goal(&goal_xy);
        match vis.save_png("footstep_plan.png", 1200, 600) {
            Ok(()) => info!("Saved footstep_plan.png"),
            Err(e) => warn!("Could not save plot: {}", e),
        }
    }
}
