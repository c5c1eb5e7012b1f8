use super::VoxelIndex;
use crate::math::{Point3, Vector3};

/// Iterator over the cells a ray crosses, nearest first.
///
/// Yields `(t_enter, daughters)` where `t_enter` is the ray parameter at
/// which the cell is entered (the first cell reports the grid entry point,
/// which is `0` when the origin is inside the grid).
#[derive(Debug, Clone)]
pub struct VoxelWalk<'a> {
    index: &'a VoxelIndex,
    cell: [usize; 3],
    step: [i8; 3],
    t_max: [f64; 3],
    t_delta: [f64; 3],
    t: f64,
    t_end: f64,
    done: bool,
}

impl<'a> VoxelWalk<'a> {
    #[allow(clippy::cast_precision_loss)]
    pub(super) fn new(
        index: &'a VoxelIndex,
        origin: &Point3,
        dir: &Vector3,
        max_distance: f64,
    ) -> Self {
        let mut walk = Self {
            index,
            cell: [0; 3],
            step: [0; 3],
            t_max: [f64::INFINITY; 3],
            t_delta: [f64::INFINITY; 3],
            t: 0.0,
            t_end: 0.0,
            done: true,
        };
        let Some((t0, t1)) = index.bounds.ray_intersection(origin, dir) else {
            return walk;
        };
        if t0 > max_distance {
            return walk;
        }

        let start = origin + dir * t0;
        walk.cell = index.clamped_cell(&start);
        for axis in 0..3 {
            let d = dir[axis];
            let size = index.cell_size[axis];
            let lower = index.bounds.min[axis] + walk.cell[axis] as f64 * size;
            if d > 0.0 {
                walk.step[axis] = 1;
                walk.t_max[axis] = t0 + (lower + size - start[axis]) / d;
                walk.t_delta[axis] = size / d;
            } else if d < 0.0 {
                walk.step[axis] = -1;
                walk.t_max[axis] = t0 + (lower - start[axis]) / d;
                walk.t_delta[axis] = -size / d;
            }
        }
        walk.t = t0;
        walk.t_end = t1.min(max_distance);
        walk.done = false;
        walk
    }

    fn advance(&mut self) {
        let axis = (0..3)
            .min_by(|&a, &b| self.t_max[a].total_cmp(&self.t_max[b]))
            .unwrap_or(0);
        if self.t_max[axis] > self.t_end {
            self.done = true;
            return;
        }
        let next = match self.step[axis] {
            1 if self.cell[axis] + 1 < self.index.dims[axis] => self.cell[axis] + 1,
            -1 if self.cell[axis] > 0 => self.cell[axis] - 1,
            _ => {
                self.done = true;
                return;
            }
        };
        self.cell[axis] = next;
        self.t = self.t_max[axis];
        self.t_max[axis] += self.t_delta[axis];
    }
}

impl<'a> Iterator for VoxelWalk<'a> {
    type Item = (f64, &'a [usize]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = (self.t, self.index.cell_contents(self.cell));
        self.advance();
        Some(item)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Aabb;

    #[test]
    fn diagonal_walk_is_monotonic_and_connected() {
        let extents = [
            Aabb::from_half_lengths(10.0, 10.0, 10.0),
            Aabb::new(Point3::new(5.0, 5.0, 5.0), Point3::new(9.0, 9.0, 9.0)),
        ];
        let index = VoxelIndex::build(&extents, 8, 1e-9);
        let dir = Vector3::new(1.0, 1.0, 1.0).normalize();
        let steps: Vec<f64> = index
            .walk(&Point3::new(-20.0, -20.0, -20.0), &dir, f64::INFINITY)
            .map(|(t, _)| t)
            .collect();
        assert!(steps.len() >= index.dims()[0]);
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
        assert!((steps[0] - 10.0 * 3f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn walk_from_inside_starts_at_zero() {
        let extents = [Aabb::from_half_lengths(10.0, 10.0, 10.0)];
        let index = VoxelIndex::build(&extents, 8, 1e-9);
        let (t, cell) = index
            .walk(&Point3::origin(), &-Vector3::z(), f64::INFINITY)
            .next()
            .unwrap();
        assert!(t.abs() < 1e-12);
        assert_eq!(cell, &[0]);
    }
}
