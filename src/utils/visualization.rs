//! Visualization utilities for rust_footstep_planning
//!
//! Draws planar regions and footstep plans in world XY using gnuplot.
//! Series are buffered and rendered into a single axes on `show`/`save_png`.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};
use nalgebra::Point2;

use crate::common::{RobotSide, Visualizable};
use crate::footstep_planning::snapping::footprint_at;
use crate::footstep_planning::{FootstepPlan, FootstepPlannerParameters};
use crate::geometry::{PlanarRegionsList, Polygon2D};

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const GRAY: &str = "#808080";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00AA00";
    pub const BLUE: &str = "#0000FF";

    // Semantic colors
    pub const REGION: &str = GRAY;
    pub const LEFT_FOOT: &str = RED;
    pub const RIGHT_FOOT: &str = GREEN;
    pub const START: &str = BLACK;
    pub const GOAL: &str = BLUE;
}

/// Color of a footprint by side
pub fn foot_color(side: RobotSide) -> &'static str {
    match side {
        RobotSide::Left => colors::LEFT_FOOT,
        RobotSide::Right => colors::RIGHT_FOOT,
    }
}

#[derive(Debug, Clone)]
struct LineSeries {
    x: Vec<f64>,
    y: Vec<f64>,
    color: &'static str,
    line_width: f64,
    caption: Option<String>,
}

#[derive(Debug, Clone)]
struct PointSeries {
    x: Vec<f64>,
    y: Vec<f64>,
    color: &'static str,
    symbol: char,
    size: f64,
    caption: String,
}

/// Footstep plan visualizer
pub struct FootstepVisualizer {
    title: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
    aspect_ratio: Option<f64>,
    foot: Option<Polygon2D>,
    lines: Vec<LineSeries>,
    points: Vec<PointSeries>,
}

impl FootstepVisualizer {
    /// Footprints are drawn with the foot size from `parameters`
    pub fn new(parameters: &FootstepPlannerParameters) -> Self {
        Self {
            title: String::new(),
            x_range: None,
            y_range: None,
            aspect_ratio: Some(1.0),
            foot: Polygon2D::rectangle(Point2::origin(), parameters.foot_length, parameters.foot_width).ok(),
            lines: Vec::new(),
            points: Vec::new(),
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Set aspect ratio (None for auto)
    pub fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> &mut Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Number of buffered line and point series
    pub fn series_count(&self) -> usize {
        self.lines.len() + self.points.len()
    }

    /// Closed outline of a polygon
    pub fn plot_polygon(&mut self, polygon: &Polygon2D, color: &'static str, line_width: f64) -> &mut Self {
        let vertices = polygon.vertices();
        let x = vertices.iter().chain(vertices.first()).map(|p| p.x).collect();
        let y = vertices.iter().chain(vertices.first()).map(|p| p.y).collect();
        self.lines.push(LineSeries {
            x,
            y,
            color,
            line_width,
            caption: None,
        });
        self
    }

    /// Footprint outline at a sole position, colored by side
    pub fn plot_footstep(&mut self, side: RobotSide, sole_xy: &Point2<f64>, yaw: f64) -> &mut Self {
        if let Some(foot) = &self.foot {
            let footprint = footprint_at(foot, sole_xy, yaw);
            self.plot_polygon(&footprint, foot_color(side), 2.0);
        }
        self
    }

    pub fn plot_start(&mut self, point: &Point2<f64>) -> &mut Self {
        self.plot_marker(point, colors::START, "Start")
    }

    pub fn plot_goal(&mut self, point: &Point2<f64>) -> &mut Self {
        self.plot_marker(point, colors::GOAL, "Goal")
    }

    fn plot_marker(&mut self, point: &Point2<f64>, color: &'static str, caption: &str) -> &mut Self {
        self.points.push(PointSeries {
            x: vec![point.x],
            y: vec![point.y],
            color,
            symbol: 'O',
            size: 1.5,
            caption: caption.to_string(),
        });
        self
    }

    /// Polyline through the sole positions of a plan
    pub fn plot_sole_path(&mut self, plan: &FootstepPlan, caption: &str) -> &mut Self {
        let steps = plan.footsteps();
        self.lines.push(LineSeries {
            x: steps.iter().map(|s| s.sole_transform.translation.vector.x).collect(),
            y: steps.iter().map(|s| s.sole_transform.translation.vector.y).collect(),
            color: colors::BLUE,
            line_width: 1.0,
            caption: Some(caption.to_string()),
        });
        self
    }

    /// Draw anything that knows how to draw itself
    pub fn draw(&mut self, item: &dyn Visualizable) -> &mut Self {
        item.visualize(self);
        self
    }

    fn render(&self) -> Figure {
        let mut figure = Figure::new();
        let axes = figure.axes2d();
        for series in &self.lines {
            match &series.caption {
                Some(caption) => axes.lines(
                    &series.x,
                    &series.y,
                    &[Caption(caption.as_str()), Color(series.color), LineWidth(series.line_width)],
                ),
                None => axes.lines(&series.x, &series.y, &[Color(series.color), LineWidth(series.line_width)]),
            };
        }
        for series in &self.points {
            axes.points(
                &series.x,
                &series.y,
                &[
                    Caption(series.caption.as_str()),
                    Color(series.color),
                    PointSymbol(series.symbol),
                    PointSize(series.size),
                ],
            );
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label("X [m]", &[]);
        axes.set_y_label("Y [m]", &[]);
        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some(ratio) = self.aspect_ratio {
            axes.set_aspect_ratio(AutoOption::Fix(ratio));
        }
        figure
    }

    /// Finalize and show the plot
    pub fn show(&self) -> Result<(), String> {
        self.render().show().map_err(|e| e.to_string()).map(|_| ())
    }

    /// Save plot to PNG file
    pub fn save_png(&self, path: &str, width: u32, height: u32) -> Result<(), String> {
        self.render().save_to_png(path, width, height).map_err(|e| e.to_string())
    }
}

impl Visualizable for PlanarRegionsList {
    fn visualize(&self, vis: &mut FootstepVisualizer) {
        for outline in self.iter().filter_map(|region| region.outline_xy()) {
            vis.plot_polygon(outline, colors::REGION, 1.0);
        }
    }
}

impl Visualizable for FootstepPlan {
    fn visualize(&self, vis: &mut FootstepVisualizer) {
        for step in self.footsteps() {
            let t = step.sole_transform.translation.vector;
            vis.plot_footstep(step.side, &Point2::new(t.x, t.y), step.yaw());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::pose_from_xyz_yaw;
    use crate::footstep_planning::{environments, PlannedFootstep};

    #[test]
    fn test_regions_and_plan_are_buffered() {
        let parameters = FootstepPlannerParameters::default();
        let regions = environments::cinder_block_field(0, 2, 2).unwrap();
        let mut plan = FootstepPlan::new();
        for (i, side) in [RobotSide::Right, RobotSide::Left].into_iter().enumerate() {
            plan.add_footstep(PlannedFootstep {
                side,
                sole_transform: pose_from_xyz_yaw(0.3 * (i + 1) as f64, side.negate_if_right(0.1), 0.0, 0.0),
                supporting_region_id: Some(0),
                support_fraction: 1.0,
            });
        }

        let mut vis = FootstepVisualizer::new(&parameters);
        vis.set_title("test").draw(&regions).draw(&plan);
        assert_eq!(vis.series_count(), regions.len() + 2);
        vis.plot_start(&Point2::origin()).plot_sole_path(&plan, "soles");
        assert_eq!(vis.series_count(), regions.len() + 4);
    }

    #[test]
    fn test_foot_colors_differ() {
        assert_ne!(foot_color(RobotSide::Left), foot_color(RobotSide::Right));
    }
}
