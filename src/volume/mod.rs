//! The placed-volume hierarchy.
//!
//! A [`GeometryBuilder`] assembles volumes in an arena and freezes them into
//! an immutable [`Geometry`], which navigators share behind an `Arc`.

mod node;

pub use node::{VolumeId, VolumeNode};

use std::fmt;
use std::sync::Arc;

use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::error::{GeometryError, NavigationError, Result};
use crate::math::{Placement, Tolerance};
use crate::solid::{Shape, Solid};
use crate::voxel::VoxelIndex;

/// Nodes with more daughters than this get a voxel index by default.
pub const DEFAULT_VOXEL_THRESHOLD: usize = 8;

/// Default number of voxel cells per daughter.
pub const DEFAULT_VOXEL_DENSITY: usize = 2;

/// A daughter whose placed extent pokes out of its mother's extent.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainmentWarning {
    pub mother: VolumeId,
    pub daughter: VolumeId,
    /// Largest distance by which the daughter's box exceeds the mother's.
    pub overshoot: f64,
}

impl fmt::Display for ContainmentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "daughter {:?} extends {} beyond mother {:?}",
            self.daughter, self.overshoot, self.mother
        )
    }
}

/// Assembles a volume hierarchy.
#[derive(Debug)]
pub struct GeometryBuilder {
    volumes: SlotMap<VolumeId, VolumeNode>,
    world: Option<VolumeId>,
    voxel_threshold: usize,
    voxel_density: usize,
}

impl Default for GeometryBuilder {
    fn default() -> Self {
        Self {
            volumes: SlotMap::with_key(),
            world: None,
            voxel_threshold: DEFAULT_VOXEL_THRESHOLD,
            voxel_density: DEFAULT_VOXEL_DENSITY,
        }
    }
}

impl GeometryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the daughter count above which a node is voxelised.
    /// `usize::MAX` disables voxelisation.
    #[must_use]
    pub fn with_voxel_threshold(mut self, threshold: usize) -> Self {
        self.voxel_threshold = threshold;
        self
    }

    /// Sets the number of voxel cells per daughter.
    #[must_use]
    pub fn with_voxel_density(mut self, density: usize) -> Self {
        self.voxel_density = density.max(1);
        self
    }

    /// Creates the world volume.
    ///
    /// # Errors
    ///
    /// Returns an error if a world has already been set.
    pub fn set_world(
        &mut self,
        name: impl Into<String>,
        solid: impl Into<Arc<Shape>>,
    ) -> Result<VolumeId> {
        if self.world.is_some() {
            return Err(GeometryError::InvalidHierarchy("world volume already set".into()).into());
        }
        let node = VolumeNode::new(name, solid.into(), Placement::identity(), None, 0);
        let id = self.volumes.insert(node);
        self.world = Some(id);
        Ok(id)
    }

    /// Places `solid` inside `mother` and returns the new volume's id.
    ///
    /// # Errors
    ///
    /// Returns an error if `mother` is unknown, or if the solid's tolerance
    /// differs from the world's.
    pub fn place(
        &mut self,
        mother: VolumeId,
        name: impl Into<String>,
        solid: impl Into<Arc<Shape>>,
        placement: Placement,
        copy_no: i32,
    ) -> Result<VolumeId> {
        let solid = solid.into();
        let world_tolerance = self
            .world
            .and_then(|w| self.volumes.get(w))
            .map(|w| w.solid.tolerance());
        if world_tolerance.is_some_and(|t| t != solid.tolerance()) {
            return Err(GeometryError::InvalidHierarchy(
                "solid tolerance differs from the world's".into(),
            )
            .into());
        }
        if !self.volumes.contains_key(mother) {
            return Err(GeometryError::InvalidHierarchy("unknown mother volume".into()).into());
        }
        let id = self
            .volumes
            .insert(VolumeNode::new(name, solid, placement, Some(mother), copy_no));
        if let Some(m) = self.volumes.get_mut(mother) {
            m.daughters.push(id);
        }
        Ok(id)
    }

    /// Freezes the hierarchy: checks daughter containment and builds the
    /// voxel indices.
    ///
    /// # Errors
    ///
    /// Returns an error if no world volume was set.
    pub fn build(mut self) -> Result<Geometry> {
        let world = self
            .world
            .ok_or_else(|| GeometryError::InvalidHierarchy("no world volume".into()))?;
        let tolerance = self.volumes[world].solid.tolerance();

        let mut warnings = Vec::new();
        let mut grids = Vec::new();
        for (id, node) in &self.volumes {
            let mother_box = node.solid.extent();
            let extents: Vec<_> = node
                .daughters
                .iter()
                .map(|&d| {
                    let daughter = &self.volumes[d];
                    (d, daughter.solid.extent().transformed(&daughter.placement))
                })
                .collect();
            for &(d, placed) in &extents {
                let overshoot = (mother_box.min - placed.min)
                    .sup(&(placed.max - mother_box.max))
                    .max();
                if overshoot > tolerance.half() {
                    warn!(
                        mother = %node.name,
                        daughter = %self.volumes[d].name,
                        overshoot,
                        "daughter extent exceeds its mother"
                    );
                    warnings.push(ContainmentWarning {
                        mother: id,
                        daughter: d,
                        overshoot,
                    });
                }
            }
            if node.daughters.len() > self.voxel_threshold {
                let boxes: Vec<_> = extents.iter().map(|&(_, b)| b).collect();
                let grid = VoxelIndex::build(&boxes, self.voxel_density, tolerance.surface());
                debug!(volume = %node.name, dims = ?grid.dims(), "built voxel index");
                grids.push((id, grid));
            }
        }
        for (id, grid) in grids {
            self.volumes[id].voxels = Some(grid);
        }

        Ok(Geometry {
            volumes: self.volumes,
            world,
            tolerance,
            warnings,
        })
    }
}

/// An immutable volume hierarchy.
#[derive(Debug)]
pub struct Geometry {
    volumes: SlotMap<VolumeId, VolumeNode>,
    world: VolumeId,
    tolerance: Tolerance,
    warnings: Vec<ContainmentWarning>,
}

impl Geometry {
    /// The root volume.
    #[must_use]
    pub fn world(&self) -> VolumeId {
        self.world
    }

    /// Tolerance shared by every solid of the hierarchy.
    #[must_use]
    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Returns the volume with the given id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id does not belong to this geometry.
    pub fn volume(&self, id: VolumeId) -> std::result::Result<&VolumeNode, NavigationError> {
        self.volumes
            .get(id)
            .ok_or_else(|| NavigationError::UnknownVolume(format!("{id:?}")))
    }

    /// Number of placed volumes, world included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Iterates over every volume.
    pub fn iter(&self) -> impl Iterator<Item = (VolumeId, &VolumeNode)> {
        self.volumes.iter()
    }

    /// Daughters found sticking out of their mothers at build time.
    #[must_use]
    pub fn containment_warnings(&self) -> &[ContainmentWarning] {
        &self.warnings
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Vector3;
    use crate::solid::Cuboid;

    fn cube(half: f64) -> Shape {
        Shape::from(Cuboid::new(half, half, half, Tolerance::default()).unwrap())
    }

    #[test]
    fn builds_two_level_tree() {
        let mut b = GeometryBuilder::new();
        let world = b.set_world("world", cube(100.0)).unwrap();
        let d = b
            .place(
                world,
                "target",
                cube(10.0),
                Placement::from_translation(Vector3::new(0.0, 0.0, 50.0)),
                0,
            )
            .unwrap();
        let geo = b.build().unwrap();
        assert_eq!(geo.len(), 2);
        assert_eq!(geo.world(), world);
        assert_eq!(geo.volume(world).unwrap().daughters, vec![d]);
        assert_eq!(geo.volume(d).unwrap().mother, Some(world));
        assert!(geo.volume(d).unwrap().voxels().is_none());
        assert!(geo.containment_warnings().is_empty());
    }

    #[test]
    fn second_world_is_rejected() {
        let mut b = GeometryBuilder::new();
        b.set_world("world", cube(1.0)).unwrap();
        assert!(b.set_world("again", cube(1.0)).is_err());
    }

    #[test]
    fn build_without_world_fails() {
        assert!(GeometryBuilder::new().build().is_err());
    }

    #[test]
    fn mismatched_tolerance_is_rejected() {
        let mut b = GeometryBuilder::new();
        let world = b.set_world("world", cube(10.0)).unwrap();
        let coarse = Cuboid::new(1.0, 1.0, 1.0, Tolerance::new(1e-6).unwrap()).unwrap();
        let r = b.place(world, "coarse", Shape::from(coarse), Placement::identity(), 0);
        assert!(r.is_err());
    }

    #[test]
    fn protruding_daughter_is_reported() {
        let mut b = GeometryBuilder::new();
        let world = b.set_world("world", cube(10.0)).unwrap();
        let d = b
            .place(
                world,
                "sticking-out",
                cube(2.0),
                Placement::from_translation(Vector3::new(9.0, 0.0, 0.0)),
                0,
            )
            .unwrap();
        let geo = b.build().unwrap();
        let w = geo.containment_warnings();
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].daughter, d);
        assert!((w[0].overshoot - 1.0).abs() < 1e-12);
    }

    #[test]
    fn crowded_node_gets_voxels() {
        let mut b = GeometryBuilder::new().with_voxel_threshold(3);
        let world = b.set_world("world", cube(100.0)).unwrap();
        let brick = Arc::new(cube(1.0));
        for i in 0..4 {
            let x = f64::from(i) * 10.0;
            b.place(
                world,
                "brick",
                Arc::clone(&brick),
                Placement::from_translation(Vector3::new(x, 0.0, 0.0)),
                i,
            )
            .unwrap();
        }
        let geo = b.build().unwrap();
        assert!(geo.volume(world).unwrap().voxels().is_some());
    }
}
