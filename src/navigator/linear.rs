use super::{classify_daughter, DaughterSearch, Nearest};
use crate::error::NavigationError;
use crate::math::{Point3, Vector3};
use crate::solid::Solid;
use crate::volume::{Geometry, VolumeId, VolumeNode};

/// Tests every daughter of a node in placement order.
pub(super) struct LinearSearch;

impl DaughterSearch for LinearSearch {
    fn locate(
        &self,
        geometry: &Geometry,
        node: &VolumeNode,
        p: &Point3,
        dir: Option<&Vector3>,
        blocked: Option<VolumeId>,
    ) -> Result<Option<VolumeId>, NavigationError> {
        let mut surface_hit = None;
        for &id in &node.daughters {
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
        for (index, &id) in node.daughters.iter().enumerate() {
            let daughter = geometry.volume(id)?;
            let lp = daughter.placement.inverse_transform_point(p);
            if daughter.solid.safety_to_entry(&lp) > nearest.bound() {
                continue;
            }
            let lv = daughter.placement.inverse_transform_vector(v);
            nearest.offer(daughter.solid.distance_to_entry(&lp, &lv), index, id);
        }
        Ok(nearest.into_hit())
    }

    fn safety(
        &self,
        geometry: &Geometry,
        node: &VolumeNode,
        p: &Point3,
    ) -> Result<f64, NavigationError> {
        let mut safety = f64::INFINITY;
        for &id in &node.daughters {
            let daughter = geometry.volume(id)?;
            let lp = daughter.placement.inverse_transform_point(p);
            safety = safety.min(daughter.solid.safety_to_entry(&lp));
        }
        Ok(safety)
    }
}
