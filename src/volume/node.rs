use std::sync::Arc;

use crate::math::Placement;
use crate::solid::Shape;
use crate::voxel::VoxelIndex;

slotmap::new_key_type! {
    /// Unique identifier for a placed volume.
    pub struct VolumeId;
}

/// A solid placed inside its mother volume.
#[derive(Debug, Clone)]
pub struct VolumeNode {
    /// Name used in logs and diagnostics.
    pub name: String,
    /// Shape of the volume, shared between placements.
    pub solid: Arc<Shape>,
    /// Placement of this volume in its mother's frame.
    pub placement: Placement,
    /// Enclosing volume; `None` for the world.
    pub mother: Option<VolumeId>,
    /// Daughters in placement order.
    pub daughters: Vec<VolumeId>,
    /// Distinguishes repeated placements of the same shape.
    pub copy_no: i32,
    pub(crate) voxels: Option<VoxelIndex>,
}

impl VolumeNode {
    pub(crate) fn new(
        name: impl Into<String>,
        solid: Arc<Shape>,
        placement: Placement,
        mother: Option<VolumeId>,
        copy_no: i32,
    ) -> Self {
        Self {
            name: name.into(),
            solid,
            placement,
            mother,
            daughters: Vec::new(),
            copy_no,
            voxels: None,
        }
    }

    /// Returns `true` for the root of the hierarchy.
    #[must_use]
    pub fn is_world(&self) -> bool {
        self.mother.is_none()
    }

    /// Acceleration grid over the daughters, if the node has one.
    #[must_use]
    pub fn voxels(&self) -> Option<&VoxelIndex> {
        self.voxels.as_ref()
    }
}
