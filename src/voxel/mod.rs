//! Uniform-grid acceleration structure over a node's daughters.
//!
//! Each cell lists the daughters whose placed bounding box overlaps it, so
//! point lookups and ray walks only test the daughters registered in the
//! cells they touch.

mod walk;

pub use walk::VoxelWalk;

use crate::math::{Aabb, Point3, Vector3};

/// Upper bound on cells along one axis.
pub const MAX_CELLS_PER_AXIS: usize = 64;

/// Grid of daughter buckets in the mother's local frame.
#[derive(Debug, Clone)]
pub struct VoxelIndex {
    bounds: Aabb,
    dims: [usize; 3],
    cell_size: Vector3,
    cells: Vec<Vec<usize>>,
}

impl VoxelIndex {
    /// Buckets `extents` (daughter bounding boxes in the mother frame,
    /// indexed by daughter position) into roughly `density` cells per
    /// daughter. Each daughter is registered in every cell its extent grown
    /// by `margin` touches, so points within `margin` of a daughter find it
    /// from either side of a cell wall. The grid covers the union of the
    /// grown extents.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn build(extents: &[Aabb], density: usize, margin: f64) -> Self {
        if extents.is_empty() {
            return Self {
                bounds: Aabb::from_half_lengths(0.0, 0.0, 0.0),
                dims: [1, 1, 1],
                cell_size: Vector3::repeat(f64::EPSILON),
                cells: vec![Vec::new()],
            };
        }
        let margin = margin.max(f64::EPSILON);
        let bounds = extents
            .iter()
            .fold(Aabb::empty(), |acc, e| acc.union(e))
            .expanded(margin);

        let size = bounds.size();
        let target = (density.max(1) * extents.len()) as f64;
        let mean = (size.x * size.y * size.z).cbrt().max(size.max() * 1e-3);
        let k = target.cbrt();
        let mut dims = [1usize; 3];
        for (axis, dim) in dims.iter_mut().enumerate() {
            *dim = ((k * size[axis] / mean).ceil() as usize).clamp(1, MAX_CELLS_PER_AXIS);
        }
        let cell_size = Vector3::new(
            size.x / dims[0] as f64,
            size.y / dims[1] as f64,
            size.z / dims[2] as f64,
        );

        let mut index = Self {
            bounds,
            dims,
            cell_size,
            cells: vec![Vec::new(); dims[0] * dims[1] * dims[2]],
        };
        for (daughter, extent) in extents.iter().enumerate() {
            let grown = extent.expanded(margin);
            let lo = index.clamped_cell(&grown.min);
            let hi = index.clamped_cell(&grown.max);
            for i in lo[0]..=hi[0] {
                for j in lo[1]..=hi[1] {
                    for k in lo[2]..=hi[2] {
                        let flat = index.flat([i, j, k]);
                        index.cells[flat].push(daughter);
                    }
                }
            }
        }
        index
    }

    /// Region covered by the grid.
    #[must_use]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Number of cells along x, y and z.
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn flat(&self, cell: [usize; 3]) -> usize {
        (cell[2] * self.dims[1] + cell[1]) * self.dims[0] + cell[0]
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn axis_cell(&self, axis: usize, x: f64) -> usize {
        let rel = ((x - self.bounds.min[axis]) / self.cell_size[axis]).floor();
        if rel <= 0.0 {
            0
        } else {
            (rel as usize).min(self.dims[axis] - 1)
        }
    }

    fn clamped_cell(&self, p: &Point3) -> [usize; 3] {
        [
            self.axis_cell(0, p.x),
            self.axis_cell(1, p.y),
            self.axis_cell(2, p.z),
        ]
    }

    /// Cell containing `p`, or `None` outside the grid.
    #[must_use]
    pub fn cell_of(&self, p: &Point3) -> Option<[usize; 3]> {
        self.bounds
            .contains_point(p)
            .then(|| self.clamped_cell(p))
    }

    /// Daughters registered in the cell containing `p`.
    #[must_use]
    pub fn candidates_at(&self, p: &Point3) -> &[usize] {
        match self.cell_of(p) {
            Some(cell) => &self.cells[self.flat(cell)],
            None => &[],
        }
    }

    /// Daughters registered in `cell`.
    #[must_use]
    pub fn cell_contents(&self, cell: [usize; 3]) -> &[usize] {
        &self.cells[self.flat(cell)]
    }

    /// Bounding box of a cell.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_bounds(&self, cell: [usize; 3]) -> Aabb {
        let offset = Vector3::new(
            cell[0] as f64 * self.cell_size.x,
            cell[1] as f64 * self.cell_size.y,
            cell[2] as f64 * self.cell_size.z,
        );
        let min = self.bounds.min + offset;
        Aabb::new(min, min + self.cell_size)
    }

    /// Lower bound on the distance from `p` to any daughter not registered
    /// in its cell: the distance to the cell walls, or to the grid when `p`
    /// lies outside it.
    #[must_use]
    pub fn cell_safety(&self, p: &Point3) -> f64 {
        match self.cell_of(p) {
            Some(cell) => {
                let b = self.cell_bounds(cell);
                let lo = p - b.min;
                let hi = b.max - p;
                lo.inf(&hi).min().max(0.0)
            }
            None => self.bounds.distance_to_point(p),
        }
    }

    /// Cells crossed by `origin + t * dir` for `0 <= t <= max_distance`, in
    /// order, each with the distance at which the ray enters it.
    #[must_use]
    pub fn walk(&self, origin: &Point3, dir: &Vector3, max_distance: f64) -> VoxelWalk<'_> {
        VoxelWalk::new(self, origin, dir, max_distance)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    /// Eight unit-half-length boxes spaced 4 apart along x.
    fn row() -> VoxelIndex {
        let extents: Vec<Aabb> = (0..8)
            .map(|i| {
                let c = f64::from(i) * 4.0;
                Aabb::new(p(c - 1.0, -1.0, -1.0), p(c + 1.0, 1.0, 1.0))
            })
            .collect();
        VoxelIndex::build(&extents, 2, 1e-9)
    }

    #[test]
    fn grid_is_elongated_along_the_row() {
        let v = row();
        let [nx, ny, nz] = v.dims();
        assert!(nx > ny && nx > nz);
        assert_eq!(v.cell_count(), nx * ny * nz);
    }

    #[test]
    fn point_lookup_finds_local_daughter() {
        let v = row();
        let c = v.candidates_at(&p(12.0, 0.0, 0.0));
        assert!(c.contains(&3));
        assert!(!c.contains(&0));
        assert!(v.candidates_at(&p(100.0, 0.0, 0.0)).is_empty());
    }

    #[test]
    fn every_daughter_is_registered() {
        let v = row();
        for i in 0u32..8 {
            let centre = p(f64::from(i) * 4.0, 0.0, 0.0);
            assert!(v.candidates_at(&centre).contains(&(i as usize)));
        }
    }

    #[test]
    fn walk_visits_cells_in_order() {
        let v = row();
        let cells: Vec<(f64, Vec<usize>)> = v
            .walk(&p(-10.0, 0.0, 0.0), &Vector3::x(), f64::INFINITY)
            .map(|(t, c)| (t, c.to_vec()))
            .collect();
        assert_eq!(cells.len(), v.dims()[0]);
        assert_relative_eq!(cells[0].0, 9.0, epsilon = 1e-6);
        assert!(cells.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(cells[0].1.contains(&0));
        assert!(cells.last().unwrap().1.contains(&7));
    }

    #[test]
    fn walk_stops_at_max_distance() {
        let v = row();
        let n = v.walk(&p(-10.0, 0.0, 0.0), &Vector3::x(), 12.0).count();
        assert!(n < v.dims()[0]);
        assert_eq!(v.walk(&p(-10.0, 5.0, 0.0), &Vector3::x(), 100.0).count(), 0);
    }

    #[test]
    fn cell_safety_is_distance_to_walls() {
        let v = row();
        let q = p(0.0, 0.0, 0.0);
        let cell = v.cell_of(&q).unwrap();
        let b = v.cell_bounds(cell);
        let expect = (q - b.min).inf(&(b.max - q)).min();
        assert_relative_eq!(v.cell_safety(&q), expect);
        assert_relative_eq!(v.cell_safety(&p(0.0, 11.0, 0.0)), 10.0, epsilon = 1e-6);
    }

    #[test]
    fn daughters_touching_a_cell_wall_are_seen_from_both_sides() {
        // Two boxes meeting at x = 0, where the grid puts a cell wall.
        let margin = 1e-6;
        let extents = [
            Aabb::new(p(-2.0, -1.0, -1.0), p(0.0, 1.0, 1.0)),
            Aabb::new(p(0.0, -1.0, -1.0), p(2.0, 1.0, 1.0)),
        ];
        let v = VoxelIndex::build(&extents, 4, margin);
        assert_eq!(v.dims()[0] % 2, 0);
        let left = p(-0.5 * margin, 0.3, -0.2);
        let right = p(0.5 * margin, 0.3, -0.2);
        for q in [left, right] {
            let c = v.candidates_at(&q);
            assert!(c.contains(&0) && c.contains(&1), "{q:?} sees {c:?}");
        }
        assert!(!v.candidates_at(&p(-1.9, 0.0, 0.0)).contains(&1));
    }
}
