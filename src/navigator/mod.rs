//! Point location and straight-line stepping through a volume hierarchy.
//!
//! A [`Navigator`] tracks one point as it moves through a shared
//! [`Geometry`]. Each track gets its own navigator; the geometry is read-only
//! and can be shared between any number of them.

mod config;
mod history;
mod linear;
mod voxel;

pub use config::{
    NavigatorConfig, DEFAULT_ZERO_STEP_ABANDON_THRESHOLD, DEFAULT_ZERO_STEP_WARN_THRESHOLD,
};
pub use history::{HistoryLevel, NavigationHistory};

use std::sync::Arc;

use tracing::debug;

use crate::diagnostic::{report, Diagnostic, DiagnosticHandler};
use crate::error::{NavigationError, Result};
use crate::math::{Point3, Vector3};
use crate::solid::{EInside, Solid};
use crate::volume::{Geometry, VolumeId, VolumeNode};

use linear::LinearSearch;

/// What limited a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepLimit {
    /// The step ends on the boundary of the current volume.
    Exiting,
    /// The step ends on the boundary of this daughter.
    Entering(VolumeId),
    /// No boundary lies within the requested maximum step.
    MaxStep,
}

/// Outcome of [`Navigator::compute_step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    /// Distance to travel, including any zero-step push.
    pub step: f64,
    /// Isotropic safety at the start point.
    pub safety: f64,
    pub limit: StepLimit,
}

/// Per-level daughter search used by locate, step and safety.
trait DaughterSearch {
    /// Daughter containing `p`, preferring strict containment over a
    /// surface hit.
    fn locate(
        &self,
        geometry: &Geometry,
        node: &VolumeNode,
        p: &Point3,
        dir: Option<&Vector3>,
        blocked: Option<VolumeId>,
    ) -> std::result::Result<Option<VolumeId>, NavigationError>;

    /// Nearest daughter entered along `v` no further than `limit`.
    fn step(
        &self,
        geometry: &Geometry,
        node: &VolumeNode,
        p: &Point3,
        v: &Vector3,
        limit: f64,
    ) -> std::result::Result<Option<(f64, VolumeId)>, NavigationError>;

    /// Lower bound on the distance from `p` to every daughter.
    fn safety(
        &self,
        geometry: &Geometry,
        node: &VolumeNode,
        p: &Point3,
    ) -> std::result::Result<f64, NavigationError>;
}

fn search_for(node: &VolumeNode) -> &dyn DaughterSearch {
    match node.voxels() {
        Some(grid) => grid,
        None => &LinearSearch,
    }
}

/// Whether a point in a solid's frame counts as inside it, given the
/// direction of travel. Surface points count only when not moving out.
fn contains(solid: &impl Solid, p: &Point3, dir: Option<&Vector3>) -> Option<EInside> {
    match solid.classify(p) {
        EInside::Inside => Some(EInside::Inside),
        EInside::Outside => None,
        EInside::Surface => match dir {
            Some(v) if solid.surface_normal(p).dot(v) > 0.0 => None,
            _ => Some(EInside::Surface),
        },
    }
}

/// `Some(true)` when the daughter strictly contains `p` (given in the
/// mother's frame), `Some(false)` for an accepted surface point.
fn classify_daughter(
    geometry: &Geometry,
    id: VolumeId,
    p: &Point3,
    dir: Option<&Vector3>,
    blocked: Option<VolumeId>,
) -> std::result::Result<Option<bool>, NavigationError> {
    let daughter = geometry.volume(id)?;
    let lp = daughter.placement.inverse_transform_point(p);
    let lv = dir.map(|v| daughter.placement.inverse_transform_vector(v));
    Ok(match contains(daughter.solid.as_ref(), &lp, lv.as_ref()) {
        Some(EInside::Inside) => Some(true),
        Some(_) if blocked != Some(id) => Some(false),
        _ => None,
    })
}

/// Running minimum over daughter entry distances. Ties go to the daughter
/// placed first.
struct Nearest {
    limit: f64,
    hit: Option<(f64, usize, VolumeId)>,
}

impl Nearest {
    fn within(limit: f64) -> Self {
        Self { limit, hit: None }
    }

    fn bound(&self) -> f64 {
        self.hit.map_or(self.limit, |(d, _, _)| d)
    }

    fn offer(&mut self, distance: f64, index: usize, id: VolumeId) {
        if !distance.is_finite() || distance > self.limit {
            return;
        }
        let better = match self.hit {
            Some((d, i, _)) => distance.total_cmp(&d).then(index.cmp(&i)).is_lt(),
            None => true,
        };
        if better {
            self.hit = Some((distance, index, id));
        }
    }

    fn into_hit(self) -> Option<(f64, VolumeId)> {
        self.hit.map(|(d, _, id)| (d, id))
    }
}

/// Ball around a point known to be free of boundaries.
#[derive(Debug, Clone, Copy)]
struct SafetySphere {
    origin: Point3,
    radius: f64,
}

/// Locates points and computes steps for one track.
pub struct Navigator {
    geometry: Option<Arc<Geometry>>,
    config: NavigatorConfig,
    handler: Option<DiagnosticHandler>,
    history: NavigationHistory,
    located: bool,
    local_point: Point3,
    entering: bool,
    exiting: bool,
    entering_volume: Option<VolumeId>,
    exit_normal: Option<Vector3>,
    entered_daughter: bool,
    exited_mother: bool,
    last_step: f64,
    zero_steps: u32,
    zero_step_point: Option<Point3>,
    safety: Option<SafetySphere>,
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("config", &self.config)
            .field("history", &self.history)
            .field("entering", &self.entering)
            .field("exiting", &self.exiting)
            .field("zero_steps", &self.zero_steps)
            .finish_non_exhaustive()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(NavigatorConfig::default())
    }
}

impl Navigator {
    /// Creates a navigator with no world attached.
    #[must_use]
    pub fn new(config: NavigatorConfig) -> Self {
        Self {
            geometry: None,
            config,
            handler: None,
            history: NavigationHistory::new(),
            located: false,
            local_point: Point3::origin(),
            entering: false,
            exiting: false,
            entering_volume: None,
            exit_normal: None,
            entered_daughter: false,
            exited_mother: false,
            last_step: 0.0,
            zero_steps: 0,
            zero_step_point: None,
            safety: None,
        }
    }

    /// Attaches a geometry and forgets any previous location.
    pub fn attach_world(&mut self, geometry: Arc<Geometry>) {
        self.geometry = Some(geometry);
        self.reset();
    }

    /// Routes diagnostics to `handler` instead of the log.
    pub fn set_diagnostic_handler(&mut self, handler: DiagnosticHandler) {
        self.handler = Some(handler);
    }

    #[must_use]
    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// The attached geometry.
    #[must_use]
    pub fn geometry(&self) -> Option<&Arc<Geometry>> {
        self.geometry.as_ref()
    }

    /// Forgets the current location and all step state.
    pub fn reset(&mut self) {
        self.history.clear();
        self.located = false;
        self.local_point = Point3::origin();
        self.clear_step_state();
        self.entered_daughter = false;
        self.exited_mother = false;
        self.zero_steps = 0;
        self.zero_step_point = None;
        self.safety = None;
    }

    fn clear_step_state(&mut self) {
        self.entering = false;
        self.exiting = false;
        self.entering_volume = None;
        self.exit_normal = None;
        self.last_step = 0.0;
    }

    fn attached(&self) -> std::result::Result<Arc<Geometry>, NavigationError> {
        self.geometry.clone().ok_or(NavigationError::NoWorld)
    }

    /// Finds the deepest volume containing `point`.
    ///
    /// With `relative` set and a previous location, the search starts from
    /// the current volume and uses the last step's entering or exiting
    /// outcome; otherwise it starts from the world. `direction`, when given,
    /// decides surface points: a point on a boundary belongs to the volume
    /// only if it is not moving out through it.
    ///
    /// Returns `Ok(None)` when the point lies outside the world.
    ///
    /// # Errors
    ///
    /// Returns an error if no world is attached.
    pub fn locate(
        &mut self,
        point: &Point3,
        direction: Option<&Vector3>,
        relative: bool,
    ) -> Result<Option<VolumeId>> {
        let geometry = self.attached()?;
        let relative = relative && self.located;
        let mut history = if relative {
            self.history.clone()
        } else {
            NavigationHistory::with_world(geometry.world())
        };
        let mut blocked = None;
        let mut entered = false;
        let mut exited = false;

        if relative {
            if self.exiting {
                blocked = history.pop().map(|l| l.volume);
                exited = true;
            } else if let Some(id) = self.entering_volume.filter(|_| self.entering) {
                let daughter = geometry.volume(id)?;
                history.push(id, &daughter.placement);
                entered = true;
            }
        }

        // Upward: leave every level that no longer contains the point.
        loop {
            let Some(top) = history.top().copied() else {
                debug!(?point, "point is outside the world");
                self.commit(history, false, entered, exited, Point3::origin());
                return Ok(None);
            };
            let node = geometry.volume(top.volume)?;
            let local = top.transform.inverse_transform_point(point);
            let dir = direction.map(|v| top.transform.inverse_transform_vector(v));
            if contains(node.solid.as_ref(), &local, dir.as_ref()).is_some() {
                break;
            }
            blocked = history.pop().map(|l| l.volume);
            exited = true;
        }

        // Downward: descend while a daughter contains the point.
        loop {
            let Some(top) = history.top().copied() else {
                break;
            };
            let node = geometry.volume(top.volume)?;
            let local = top.transform.inverse_transform_point(point);
            let dir = direction.map(|v| top.transform.inverse_transform_vector(v));
            let found = search_for(node).locate(&geometry, node, &local, dir.as_ref(), blocked)?;
            let Some(id) = found else {
                break;
            };
            history.push(id, &geometry.volume(id)?.placement);
            blocked = None;
            entered = true;
        }

        let volume = history.volume();
        let local = history.global_to_local(point).unwrap_or_else(Point3::origin);
        debug!(?volume, depth = ?history.depth(), "located point");
        self.commit(history, true, entered, exited, local);
        Ok(volume)
    }

    fn commit(
        &mut self,
        history: NavigationHistory,
        located: bool,
        entered: bool,
        exited: bool,
        local: Point3,
    ) {
        if history.volume() != self.history.volume() {
            self.safety = None;
        }
        self.history = history;
        self.located = located;
        self.local_point = local;
        self.entered_daughter = entered;
        self.exited_mother = exited;
        self.clear_step_state();
    }

    /// Moves the cached point without searching the hierarchy. Only valid
    /// when no boundary was crossed since the last locate.
    ///
    /// # Errors
    ///
    /// Returns an error if the navigator has no current volume.
    pub fn locate_within_volume(&mut self, point: &Point3) -> Result<()> {
        let local = self
            .history
            .global_to_local(point)
            .filter(|_| self.located)
            .ok_or(NavigationError::NotLocated)?;
        self.local_point = local;
        self.clear_step_state();
        Ok(())
    }

    /// Distance from `point` along `direction` to the next boundary, capped
    /// at `max_step`.
    ///
    /// Consecutive zero steps from the same location are counted; a zero
    /// step more than the surface tolerance away restarts the count. Past
    /// the warn threshold the step is lengthened by the push distance; at
    /// the abandon threshold the track is reported stuck.
    ///
    /// # Errors
    ///
    /// Returns an error if no world is attached, the navigator has no
    /// current volume, or the track is stuck.
    pub fn compute_step(
        &mut self,
        point: &Point3,
        direction: &Vector3,
        max_step: f64,
    ) -> Result<StepResult> {
        let geometry = self.attached()?;
        let top = *self
            .history
            .top()
            .filter(|_| self.located)
            .ok_or(NavigationError::NotLocated)?;
        let node = geometry.volume(top.volume)?;
        let local = top.transform.inverse_transform_point(point);
        let dir = top.transform.inverse_transform_vector(direction);
        let tolerance = geometry.tolerance();

        let safety = self.safety_at(&geometry, node, point, &local)?;
        let exit = node.solid.distance_to_exit(&local, &dir, true);
        let search = search_for(node);
        let mut step = exit.distance;
        let mut limit = StepLimit::Exiting;
        if let Some((distance, id)) =
            search.step(&geometry, node, &local, &dir, exit.distance.min(max_step))?
        {
            step = distance;
            limit = StepLimit::Entering(id);
        }
        if step > max_step {
            step = max_step;
            limit = StepLimit::MaxStep;
        }

        if step <= tolerance.half() {
            // A zero step somewhere else starts a fresh count.
            if self
                .zero_step_point
                .is_some_and(|last| (point - last).norm() > tolerance.surface())
            {
                self.zero_steps = 0;
            }
            self.zero_steps += 1;
            self.zero_step_point = Some(*point);
        } else {
            self.zero_steps = 0;
            self.zero_step_point = None;
        }
        if self.zero_steps >= self.config.zero_step_abandon_threshold {
            let count = self.zero_steps;
            self.zero_steps = 0;
            self.zero_step_point = None;
            report(
                self.handler.as_ref(),
                &Diagnostic::StuckTrack {
                    count,
                    point: *point,
                },
            );
            return Err(NavigationError::StuckTrack {
                steps: count,
                point: *point,
            }
            .into());
        }
        if self.zero_steps >= self.config.zero_step_warn_threshold {
            report(
                self.handler.as_ref(),
                &Diagnostic::ZeroSteps {
                    count: self.zero_steps,
                    point: *point,
                },
            );
            step += self.config.push_distance_for(tolerance);
        }

        self.local_point = local;
        self.last_step = step;
        self.entering = matches!(limit, StepLimit::Entering(_));
        self.exiting = limit == StepLimit::Exiting;
        self.entering_volume = match limit {
            StepLimit::Entering(id) => Some(id),
            _ => None,
        };
        self.exit_normal = if self.exiting {
            exit.normal.map(|n| top.transform.transform_vector(&n))
        } else {
            None
        };
        debug!(step, safety, ?limit, "computed step");
        Ok(StepResult {
            step,
            safety,
            limit,
        })
    }

    /// Lower bound on the distance from `point` to any boundary of the
    /// current volume or its daughters, capped at `max_length`.
    ///
    /// Points inside the cached safety sphere are answered from it.
    ///
    /// # Errors
    ///
    /// Returns an error if no world is attached or the navigator has no
    /// current volume.
    pub fn compute_safety(&mut self, point: &Point3, max_length: f64) -> Result<f64> {
        let geometry = self.attached()?;
        let top = *self
            .history
            .top()
            .filter(|_| self.located)
            .ok_or(NavigationError::NotLocated)?;
        let node = geometry.volume(top.volume)?;
        let local = top.transform.inverse_transform_point(point);
        Ok(self.safety_at(&geometry, node, point, &local)?.min(max_length))
    }

    fn safety_at(
        &mut self,
        geometry: &Geometry,
        node: &VolumeNode,
        point: &Point3,
        local: &Point3,
    ) -> std::result::Result<f64, NavigationError> {
        if let Some(sphere) = self.safety {
            let moved = (point - sphere.origin).norm();
            if moved < sphere.radius {
                return Ok(sphere.radius - moved);
            }
        }
        let mother = match node.solid.classify(local) {
            EInside::Inside => node.solid.safety_to_exit(local),
            _ => 0.0,
        };
        let daughters = search_for(node).safety(geometry, node, local)?;
        let radius = mother.min(daughters).max(0.0);
        self.safety = Some(SafetySphere {
            origin: *point,
            radius,
        });
        Ok(radius)
    }

    /// The current volume, if located inside the world.
    #[must_use]
    pub fn current_volume(&self) -> Option<VolumeId> {
        self.history.volume().filter(|_| self.located)
    }

    /// Whether the last locate descended into a daughter.
    #[must_use]
    pub fn entered_daughter(&self) -> bool {
        self.entered_daughter
    }

    /// Whether the last locate climbed out of a volume.
    #[must_use]
    pub fn exited_mother(&self) -> bool {
        self.exited_mother
    }

    /// Whether the last step ended on a daughter boundary.
    #[must_use]
    pub fn is_entering(&self) -> bool {
        self.entering
    }

    /// Whether the last step ended on the current volume's boundary.
    #[must_use]
    pub fn is_exiting(&self) -> bool {
        self.exiting
    }

    /// Length of the last computed step.
    #[must_use]
    pub fn last_step(&self) -> f64 {
        self.last_step
    }

    /// Outward normal, in the global frame, of the boundary the last step
    /// exits through.
    #[must_use]
    pub fn global_exit_normal(&self) -> Option<Vector3> {
        self.exit_normal
    }

    /// Depth of the current volume; 0 in the world.
    #[must_use]
    pub fn depth(&self) -> Option<usize> {
        self.history.depth()
    }

    /// Current location as a history snapshot.
    #[must_use]
    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    /// The last located or stepped point in the current volume's frame.
    #[must_use]
    pub fn local_point(&self) -> Point3 {
        self.local_point
    }

    /// Maps a global point into the current volume's frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the navigator has no current volume.
    pub fn global_to_local(&self, point: &Point3) -> Result<Point3> {
        Ok(self
            .history
            .global_to_local(point)
            .ok_or(NavigationError::NotLocated)?)
    }

    /// Maps a point in the current volume's frame to the global frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the navigator has no current volume.
    pub fn local_to_global(&self, point: &Point3) -> Result<Point3> {
        Ok(self
            .history
            .local_to_global(point)
            .ok_or(NavigationError::NotLocated)?)
    }
}
