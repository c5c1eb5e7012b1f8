use super::{classify_daughter, DaughterSearch, Nearest};
use crate::error::NavigationError;
use crate::math::{Point3, Vector3};
use crate::solid::Solid;
use crate::volume::{Geometry, VolumeId, VolumeNode};
use crate::voxel::VoxelIndex;

/// Tests only the daughters registered in the voxel cells a query touches.
impl DaughterSearch for VoxelIndex {
    fn locate(
        &self,
        geometry: &Geometry,
        node: &VolumeNode,
        p: &Point3,
        dir: Option<&Vector3>,
        blocked: Option<VolumeId>,
    ) -> Result<Option<VolumeId>, NavigationError> {
        let mut surface_hit = None;
        // Cell contents are in placement order, matching the linear scan.
        for &index in self.candidates_at(p) {
            let id = node.daughters[index];
            match classify_daughter(geometry, id, p, dir, blocked)? {
                Some(true) => return Ok(Some(id)),
                Some(false) if surface_hit.is_none() => surface_hit = Some(id),
                _ => {}
            }
        }
        Ok(surface_hit)
    }

    fn step(
        &self,
        geometry: &Geometry,
        node: &VolumeNode,
        p: &Point3,
        v: &Vector3,
        limit: f64,
    ) -> Result<Option<(f64, VolumeId)>, NavigationError> {
        let mut nearest = Nearest::within(limit);
        let mut tested = vec![false; node.daughters.len()];
        for (t_enter, cell) in self.walk(p, v, limit) {
            if t_enter > nearest.bound() {
                break;
            }
            for &index in cell {
                if std::mem::replace(&mut tested[index], true) {
                    continue;
                }
                let id = node.daughters[index];
                let daughter = geometry.volume(id)?;
                let lp = daughter.placement.inverse_transform_point(p);
                let lv = daughter.placement.inverse_transform_vector(v);
                nearest.offer(daughter.solid.distance_to_entry(&lp, &lv), index, id);
            }
        }
        Ok(nearest.into_hit())
    }

    fn safety(
        &self,
        geometry: &Geometry,
        node: &VolumeNode,
        p: &Point3,
    ) -> Result<f64, NavigationError> {
        let mut safety = self.cell_safety(p);
        for &index in self.candidates_at(p) {
            let daughter = geometry.volume(node.daughters[index])?;
            let lp = daughter.placement.inverse_transform_point(p);
            safety = safety.min(daughter.solid.safety_to_entry(&lp));
        }
        Ok(safety)
    }
}
