//! Synthetic planar-region environments for tests and demos

use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::FootstepPlanningResult;
use crate::geometry::{PlanarRegion, PlanarRegionsList};

pub const CINDER_BLOCK_SIZE: f64 = 0.4;
pub const CINDER_BLOCK_HEIGHT_STEP: f64 = 0.05;
/// Cinder blocks start here along x; the start platform ends here
const FIELD_START_X: f64 = 0.3;

/// Single horizontal region at z = 0
pub fn flat_ground(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> FootstepPlanningResult<PlanarRegionsList> {
    Ok(PlanarRegionsList::new(vec![PlanarRegion::horizontal_rectangle(
        0, min_x, min_y, max_x, max_y, 0.0,
    )?]))
}

/// 1 m wide walkway interrupted by a 1 x 1 x 0.2 m box spanning x in [1, 2].
/// There is no ground beside or under the box.
pub fn isolated_box() -> FootstepPlanningResult<PlanarRegionsList> {
    Ok(PlanarRegionsList::new(vec![
        PlanarRegion::horizontal_rectangle(0, -1.0, -0.5, 1.0, 0.5, 0.0)?,
        PlanarRegion::horizontal_rectangle(1, 1.0, -0.5, 2.0, 0.5, 0.2)?,
        PlanarRegion::horizontal_rectangle(2, 2.0, -0.5, 4.0, 0.5, 0.0)?,
    ]))
}

/// Start platform, `rows` x `cols` abutting cinder blocks of random height,
/// then an end platform. Heights are multiples of
/// [`CINDER_BLOCK_HEIGHT_STEP`] between 0 and twice that, drawn from `seed`.
pub fn cinder_block_field(seed: u64, rows: usize, cols: usize) -> FootstepPlanningResult<PlanarRegionsList> {
    let mut rng = StdRng::seed_from_u64(seed);
    let half_width = 0.5 * CINDER_BLOCK_SIZE * cols as f64;
    let field_end_x = FIELD_START_X + CINDER_BLOCK_SIZE * rows as f64;

    let mut regions = Vec::with_capacity(rows * cols + 2);
    regions.push(PlanarRegion::horizontal_rectangle(0, -0.6, -half_width, FIELD_START_X, half_width, 0.0)?);
    for row in 0..rows {
        for col in 0..cols {
            let min_x = FIELD_START_X + CINDER_BLOCK_SIZE * row as f64;
            let min_y = -half_width + CINDER_BLOCK_SIZE * col as f64;
            let level: u32 = rng.gen_range(0..3);
            regions.push(PlanarRegion::horizontal_rectangle(
                regions.len(),
                min_x,
                min_y,
                min_x + CINDER_BLOCK_SIZE,
                min_y + CINDER_BLOCK_SIZE,
                level as f64 * CINDER_BLOCK_HEIGHT_STEP,
            )?);
        }
    }
    regions.push(PlanarRegion::horizontal_rectangle(
        regions.len(),
        field_end_x,
        -half_width,
        field_end_x + 1.0,
        half_width,
        0.0,
    )?);
    Ok(PlanarRegionsList::new(regions))
}

/// Middle of the end platform of a field with `rows` rows
pub fn cinder_block_field_goal(rows: usize) -> Point2<f64> {
    Point2::new(FIELD_START_X + CINDER_BLOCK_SIZE * rows as f64 + 0.5, 0.0)
}

/// Square stones alternating left and right of the x-axis, with gaps and no
/// ground between them, between a start and an end platform.
pub fn stepping_stones(count: usize, spacing: f64, stone_size: f64) -> FootstepPlanningResult<PlanarRegionsList> {
    let mut regions = vec![PlanarRegion::horizontal_rectangle(0, -0.6, -0.5, 0.2, 0.5, 0.0)?];
    for i in 0..count {
        let center_x = 0.2 + spacing * (i + 1) as f64;
        let center_y = if i % 2 == 0 { -0.15 } else { 0.15 };
        let half = 0.5 * stone_size;
        regions.push(PlanarRegion::horizontal_rectangle(
            regions.len(),
            center_x - half,
            center_y - half,
            center_x + half,
            center_y + half,
            0.0,
        )?);
    }
    let end_x = 0.2 + spacing * (count + 1) as f64;
    regions.push(PlanarRegion::horizontal_rectangle(regions.len(), end_x - 0.1, -0.5, end_x + 0.8, 0.5, 0.0)?);
    Ok(PlanarRegionsList::new(regions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cinder_block_field_is_seeded() {
        let a = cinder_block_field(3, 5, 4).unwrap();
        let b = cinder_block_field(3, 5, 4).unwrap();
        assert_eq!(a.len(), 5 * 4 + 2);
        let heights = |list: &PlanarRegionsList| -> Vec<f64> {
            list.iter().filter_map(|r| r.plane_z_at(0.0, 0.0)).collect()
        };
        assert_eq!(heights(&a), heights(&b));
        assert!(heights(&a).iter().all(|z| *z >= 0.0 && *z <= 2.0 * CINDER_BLOCK_HEIGHT_STEP + 1e-12));
    }

    #[test]
    fn test_region_ids_match_positions() {
        let list = stepping_stones(6, 0.3, 0.28).unwrap();
        for (i, region) in list.iter().enumerate() {
            assert_eq!(region.id(), i);
        }
        assert_eq!(list.len(), 8);
        assert!(isolated_box().unwrap().get(1).is_some());
        assert!(cinder_block_field_goal(6).x > 2.7);
    }
}
