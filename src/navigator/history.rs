use crate::math::{Placement, Point3, Vector3};
use crate::volume::VolumeId;

/// One entry of a [`NavigationHistory`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryLevel {
    /// The volume occupied at this level.
    pub volume: VolumeId,
    /// Maps the volume's local frame to the global frame.
    pub transform: Placement,
}

/// Path from the world down to the current volume.
///
/// Level 0 is the world. Each level's transform is the composition of every
/// placement from the world down to that level. Cloning yields an
/// independent snapshot of the current location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationHistory {
    levels: Vec<HistoryLevel>,
}

impl NavigationHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A history holding only the world level.
    #[must_use]
    pub fn with_world(world: VolumeId) -> Self {
        Self {
            levels: vec![HistoryLevel {
                volume: world,
                transform: Placement::identity(),
            }],
        }
    }

    /// Descends into `volume`, placed by `placement` in the current top
    /// volume's frame.
    pub fn push(&mut self, volume: VolumeId, placement: &Placement) {
        let transform = match self.levels.last() {
            Some(top) => top.transform.compose(placement),
            None => *placement,
        };
        self.levels.push(HistoryLevel { volume, transform });
    }

    /// Ascends one level, returning the level left.
    pub fn pop(&mut self) -> Option<HistoryLevel> {
        self.levels.pop()
    }

    /// The deepest level.
    #[must_use]
    pub fn top(&self) -> Option<&HistoryLevel> {
        self.levels.last()
    }

    /// Level `index`, counting from the world.
    #[must_use]
    pub fn level(&self, index: usize) -> Option<&HistoryLevel> {
        self.levels.get(index)
    }

    #[must_use]
    pub fn levels(&self) -> &[HistoryLevel] {
        &self.levels
    }

    /// Index of the deepest level; 0 when in the world. `None` when empty.
    #[must_use]
    pub fn depth(&self) -> Option<usize> {
        self.levels.len().checked_sub(1)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// The current volume.
    #[must_use]
    pub fn volume(&self) -> Option<VolumeId> {
        self.top().map(|l| l.volume)
    }

    /// Maps a global point into the current volume's frame.
    #[must_use]
    pub fn global_to_local(&self, p: &Point3) -> Option<Point3> {
        self.top().map(|l| l.transform.inverse_transform_point(p))
    }

    /// Maps a global direction into the current volume's frame.
    #[must_use]
    pub fn global_to_local_vector(&self, v: &Vector3) -> Option<Vector3> {
        self.top().map(|l| l.transform.inverse_transform_vector(v))
    }

    /// Maps a point in the current volume's frame to the global frame.
    #[must_use]
    pub fn local_to_global(&self, p: &Point3) -> Option<Point3> {
        self.top().map(|l| l.transform.transform_point(p))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use slotmap::SlotMap;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn transforms_compose_down_the_path() {
        let mut ids: SlotMap<VolumeId, ()> = SlotMap::with_key();
        let (world, a, b) = (ids.insert(()), ids.insert(()), ids.insert(()));

        let mut h = NavigationHistory::with_world(world);
        h.push(a, &Placement::from_translation(Vector3::new(0.0, 0.0, 50.0)));
        let turn = Placement::from_axis_angle(Vector3::z(), FRAC_PI_2, Vector3::new(10.0, 0.0, 0.0))
            .unwrap();
        h.push(b, &turn);
        assert_eq!(h.depth(), Some(2));
        assert_eq!(h.volume(), Some(b));

        // Local x of `b` points along global y.
        let g = h.local_to_global(&Point3::new(1.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(g, Point3::new(10.0, 1.0, 50.0), epsilon = 1e-12);
        let back = h.global_to_local(&g).unwrap();
        assert_relative_eq!(back, Point3::new(1.0, 0.0, 0.0), epsilon = 1e-12);

        let left = h.pop().unwrap();
        assert_eq!(left.volume, b);
        assert_eq!(h.volume(), Some(a));
        assert_relative_eq!(
            h.global_to_local(&Point3::new(0.0, 0.0, 55.0)).unwrap(),
            Point3::new(0.0, 0.0, 5.0)
        );
    }

    #[test]
    fn snapshot_is_independent() {
        let mut ids: SlotMap<VolumeId, ()> = SlotMap::with_key();
        let (world, a) = (ids.insert(()), ids.insert(()));
        let mut h = NavigationHistory::with_world(world);
        let snap = h.clone();
        h.push(a, &Placement::identity());
        assert_eq!(snap.depth(), Some(0));
        assert_eq!(h.depth(), Some(1));
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.depth(), None);
    }
}
