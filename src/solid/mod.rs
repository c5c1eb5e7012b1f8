//! Solid primitives and boolean combinations.
//!
//! Every solid answers point classification, distance and normal queries in
//! its own local frame. Queries are pure functions of their arguments; the
//! only interior state is the memoized volume and surface area.

mod axial;
mod boolean;
mod cone;
mod cuboid;
mod phi;
#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod properties;
mod sphere;
mod tube;

pub use boolean::{
    BooleanOp, BooleanSolid, EntryWalk, DEFAULT_MAX_ITERATIONS, DEFAULT_VOLUME_SAMPLES,
};
pub use cone::{Cone, ConeRadii};
pub use cuboid::Cuboid;
pub use phi::{PhiFace, PhiSection};
pub use sphere::{Sphere, ThetaRange};
pub use tube::Tube;

use std::fmt;
use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::math::{Aabb, Point3, Tolerance, Vector3};

/// Position of a point relative to a solid.
///
/// Variants are ordered from most to least contained, so the combined
/// classification under several constraints is their maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EInside {
    Inside,
    Surface,
    Outside,
}

impl EInside {
    /// Classifies a signed distance to a boundary (positive outside) against
    /// the half-tolerance band.
    #[must_use]
    pub fn from_signed_distance(distance: f64, half_tolerance: f64) -> Self {
        if distance > half_tolerance {
            EInside::Outside
        } else if distance >= -half_tolerance {
            EInside::Surface
        } else {
            EInside::Inside
        }
    }

    /// Combines two constraints: a point must satisfy both to be inside.
    #[must_use]
    pub fn and(self, other: EInside) -> EInside {
        self.max(other)
    }
}

/// Result of a [`Solid::distance_to_exit`] query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitHit {
    /// Distance along the direction to the exit boundary.
    pub distance: f64,
    /// Outward normal at the exit point, when requested.
    pub normal: Option<Vector3>,
    /// `true` when the exit face is convex, so the whole solid lies behind
    /// the exit normal's plane. `false` for concave faces such as an inner
    /// bore.
    pub convex: bool,
}

impl ExitHit {
    pub(crate) fn new(distance: f64, normal: Vector3, convex: bool, want_normal: bool) -> Self {
        Self {
            distance,
            normal: want_normal.then_some(normal),
            convex,
        }
    }
}

/// Query contract shared by every solid.
///
/// Points and directions are expressed in the solid's local frame;
/// directions are unit vectors.
pub trait Solid {
    /// Classifies a point as inside, on the surface or outside.
    fn classify(&self, p: &Point3) -> EInside;

    /// Outward unit normal at a surface point.
    ///
    /// On an edge or corner this is the normalized sum of the touching face
    /// normals. For a point on no surface it is the normal of the nearest
    /// face.
    fn surface_normal(&self, p: &Point3) -> Vector3;

    /// Distance along `v` from an outside (or surface) point to the first
    /// entry into the solid, or `f64::INFINITY` if the ray never enters.
    fn distance_to_entry(&self, p: &Point3, v: &Vector3) -> f64;

    /// A lower bound on the distance from an outside point to the solid.
    fn safety_to_entry(&self, p: &Point3) -> f64;

    /// Distance along `v` from an inside (or surface) point to the exit
    /// boundary, with the exit normal when `want_normal` is set.
    fn distance_to_exit(&self, p: &Point3, v: &Vector3, want_normal: bool) -> ExitHit;

    /// A lower bound on the distance from an inside point to the boundary.
    fn safety_to_exit(&self, p: &Point3) -> f64;

    /// Bounding box in the local frame.
    fn extent(&self) -> Aabb;

    /// Cubic volume.
    fn volume(&self) -> f64;

    /// Total surface area.
    fn surface_area(&self) -> f64;

    /// The tolerance this solid was built with.
    fn tolerance(&self) -> Tolerance;

    /// Monte-Carlo estimate of the volume using `samples` points drawn
    /// uniformly from the extent. Deterministic for a given `seed`.
    fn estimate_volume(&self, samples: usize, seed: u64) -> f64 {
        let bounds = self.extent();
        if samples == 0 || bounds.is_empty() {
            return 0.0;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut hits = 0usize;
        for _ in 0..samples {
            let q = sample_in(&bounds, &mut rng);
            if self.classify(&q) != EInside::Outside {
                hits += 1;
            }
        }
        bounds.volume() * ratio(hits, samples)
    }

    /// Monte-Carlo estimate of the surface area: counts samples closer than
    /// a thin shell width to the boundary, judged by the safety distances.
    fn estimate_surface_area(&self, samples: usize, seed: u64) -> f64 {
        let bounds = self.extent();
        if samples == 0 || bounds.is_empty() {
            return 0.0;
        }
        let size = bounds.size();
        let eps = 1e-3 * size.x.min(size.y).min(size.z).max(self.tolerance().surface());
        let grown = bounds.expanded(eps);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut hits = 0usize;
        for _ in 0..samples {
            let q = sample_in(&grown, &mut rng);
            let dist = match self.classify(&q) {
                EInside::Inside => self.safety_to_exit(&q),
                EInside::Outside => self.safety_to_entry(&q),
                EInside::Surface => 0.0,
            };
            if dist < eps {
                hits += 1;
            }
        }
        grown.volume() * ratio(hits, samples) / (2.0 * eps)
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(hits: usize, samples: usize) -> f64 {
    hits as f64 / samples as f64
}

fn sample_in(bounds: &Aabb, rng: &mut StdRng) -> Point3 {
    let s = bounds.size();
    Point3::new(
        bounds.min.x + s.x * rng.random::<f64>(),
        bounds.min.y + s.y * rng.random::<f64>(),
        bounds.min.z + s.z * rng.random::<f64>(),
    )
}

/// Lazily computed volume and surface area.
#[derive(Debug, Clone, Default)]
pub(crate) struct MeasureCache {
    volume: OnceLock<f64>,
    area: OnceLock<f64>,
}

impl MeasureCache {
    pub(crate) fn volume(&self, compute: impl FnOnce() -> f64) -> f64 {
        *self.volume.get_or_init(compute)
    }

    pub(crate) fn area(&self, compute: impl FnOnce() -> f64) -> f64 {
        *self.area.get_or_init(compute)
    }
}

/// Closed set of solid kinds.
///
/// Volume nodes and boolean solids hold shapes behind `Arc<Shape>` so that a
/// single shape can be placed many times.
#[derive(Debug, Clone)]
pub enum Shape {
    Cuboid(Cuboid),
    Tube(Tube),
    Cone(Cone),
    Sphere(Sphere),
    Boolean(BooleanSolid),
}

macro_rules! dispatch {
    ($self:ident, $s:ident => $e:expr) => {
        match $self {
            Shape::Cuboid($s) => $e,
            Shape::Tube($s) => $e,
            Shape::Cone($s) => $e,
            Shape::Sphere($s) => $e,
            Shape::Boolean($s) => $e,
        }
    };
}

impl Shape {
    /// Short name of the shape kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Cuboid(_) => "box",
            Shape::Tube(_) => "tube",
            Shape::Cone(_) => "cone",
            Shape::Sphere(_) => "sphere",
            Shape::Boolean(b) => b.op().name(),
        }
    }
}

impl Solid for Shape {
    fn classify(&self, p: &Point3) -> EInside {
        dispatch!(self, s => s.classify(p))
    }

    fn surface_normal(&self, p: &Point3) -> Vector3 {
        dispatch!(self, s => s.surface_normal(p))
    }

    fn distance_to_entry(&self, p: &Point3, v: &Vector3) -> f64 {
        dispatch!(self, s => s.distance_to_entry(p, v))
    }

    fn safety_to_entry(&self, p: &Point3) -> f64 {
        dispatch!(self, s => s.safety_to_entry(p))
    }

    fn distance_to_exit(&self, p: &Point3, v: &Vector3, want_normal: bool) -> ExitHit {
        dispatch!(self, s => s.distance_to_exit(p, v, want_normal))
    }

    fn safety_to_exit(&self, p: &Point3) -> f64 {
        dispatch!(self, s => s.safety_to_exit(p))
    }

    fn extent(&self) -> Aabb {
        dispatch!(self, s => s.extent())
    }

    fn volume(&self) -> f64 {
        dispatch!(self, s => s.volume())
    }

    fn surface_area(&self) -> f64 {
        dispatch!(self, s => s.surface_area())
    }

    fn tolerance(&self) -> Tolerance {
        dispatch!(self, s => s.tolerance())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, s => fmt::Display::fmt(s, f))
    }
}

impl From<Cuboid> for Shape {
    fn from(s: Cuboid) -> Self {
        Shape::Cuboid(s)
    }
}

impl From<Tube> for Shape {
    fn from(s: Tube) -> Self {
        Shape::Tube(s)
    }
}

impl From<Cone> for Shape {
    fn from(s: Cone) -> Self {
        Shape::Cone(s)
    }
}

impl From<Sphere> for Shape {
    fn from(s: Sphere) -> Self {
        Shape::Sphere(s)
    }
}

impl From<BooleanSolid> for Shape {
    fn from(s: BooleanSolid) -> Self {
        Shape::Boolean(s)
    }
}

/// Normalizes an accumulated normal, falling back to `fallback` when the
/// sum cancels out.
pub(crate) fn normalize_or(sum: Vector3, fallback: Vector3) -> Vector3 {
    sum.try_normalize(f64::EPSILON).unwrap_or(fallback)
}
