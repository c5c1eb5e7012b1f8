use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::diagnostic::{report, Diagnostic, DiagnosticHandler};
use crate::error::{GeometryError, Result};
use crate::math::{Aabb, Placement, Point3, Tolerance, Vector3};

use super::{ratio, sample_in, EInside, ExitHit, MeasureCache, Shape, Solid};

/// Default cap on the alternating entry walk.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Default number of Monte-Carlo samples for overlap volumes.
pub const DEFAULT_VOLUME_SAMPLES: usize = 100_000;

const SAMPLING_SEED: u64 = 0x6765_6f6e;

/// Coincident surfaces count as opposed when their normals sum to less
/// than this.
const OPPOSED_NORMALS: f64 = 1e-3;

/// Coincident surfaces count as matching when their normals' dot product
/// exceeds `1 - MATCHING_NORMALS`.
const MATCHING_NORMALS: f64 = 1e-3;

/// Set operation combining two solids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOp {
    Union,
    Intersection,
    /// `A - B`.
    Subtraction,
}

impl BooleanOp {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            BooleanOp::Union => "union",
            BooleanOp::Intersection => "intersection",
            BooleanOp::Subtraction => "subtraction",
        }
    }
}

/// Outcome of an alternating entry walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryWalk {
    /// Distance to the entry point, or the distance reached when the walk
    /// did not converge.
    pub distance: f64,
    /// `false` when the iteration cap was hit.
    pub converged: bool,
}

/// One child seen from the boolean's frame.
struct Operand<'a> {
    shape: &'a Shape,
    placement: Option<&'a Placement>,
}

impl Operand<'_> {
    fn local(&self, p: &Point3) -> Point3 {
        self.placement.map_or(*p, |m| m.inverse_transform_point(p))
    }

    fn local_dir(&self, v: &Vector3) -> Vector3 {
        self.placement.map_or(*v, |m| m.inverse_transform_vector(v))
    }

    fn global_dir(&self, v: &Vector3) -> Vector3 {
        self.placement.map_or(*v, |m| m.transform_vector(v))
    }

    fn classify(&self, p: &Point3) -> EInside {
        self.shape.classify(&self.local(p))
    }

    fn normal(&self, p: &Point3) -> Vector3 {
        self.global_dir(&self.shape.surface_normal(&self.local(p)))
    }

    fn entry(&self, p: &Point3, v: &Vector3) -> f64 {
        self.shape.distance_to_entry(&self.local(p), &self.local_dir(v))
    }

    fn exit(&self, p: &Point3, v: &Vector3, want_normal: bool) -> ExitHit {
        let mut hit = self
            .shape
            .distance_to_exit(&self.local(p), &self.local_dir(v), want_normal);
        hit.normal = hit.normal.map(|n| self.global_dir(&n));
        hit
    }

    fn safety_to_entry(&self, p: &Point3) -> f64 {
        self.shape.safety_to_entry(&self.local(p))
    }

    fn safety_to_exit(&self, p: &Point3) -> f64 {
        self.shape.safety_to_exit(&self.local(p))
    }

    fn extent(&self) -> Aabb {
        let e = self.shape.extent();
        self.placement.map_or(e, |m| e.transformed(m))
    }

    /// `true` if the point is inside, or on the surface and not leaving
    /// along `v`.
    fn holds(&self, p: &Point3, v: &Vector3, half: f64) -> bool {
        match self.classify(p) {
            EInside::Inside => true,
            EInside::Surface => self.exit(p, v, false).distance > half,
            EInside::Outside => false,
        }
    }

    /// Distance along `v` until the ray is held by this operand.
    fn reach(&self, p: &Point3, v: &Vector3, half: f64) -> f64 {
        if self.holds(p, v, half) {
            0.0
        } else {
            self.entry(p, v)
        }
    }

    /// Distance to the surface used to pick the nearer child's normal.
    fn gap(&self, p: &Point3) -> f64 {
        match self.classify(p) {
            EInside::Inside => self.safety_to_exit(p),
            EInside::Surface => 0.0,
            EInside::Outside => self.safety_to_entry(p),
        }
    }
}

/// Two solids combined by a [`BooleanOp`].
///
/// The second operand may be placed in the first operand's frame.
#[derive(Clone)]
pub struct BooleanSolid {
    op: BooleanOp,
    a: Arc<Shape>,
    b: Arc<Shape>,
    b_placement: Option<Placement>,
    max_iterations: usize,
    volume_samples: usize,
    tolerance: Tolerance,
    cache: MeasureCache,
    handler: Option<DiagnosticHandler>,
}

impl fmt::Debug for BooleanSolid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BooleanSolid")
            .field("op", &self.op)
            .field("a", &self.a)
            .field("b", &self.b)
            .field("b_placement", &self.b_placement)
            .field("max_iterations", &self.max_iterations)
            .field("volume_samples", &self.volume_samples)
            .field("tolerance", &self.tolerance)
            .field("handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

impl BooleanSolid {
    /// Combines `a` and `b`, with `b` optionally placed in `a`'s frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands were built with different
    /// tolerances.
    pub fn new(
        op: BooleanOp,
        a: impl Into<Arc<Shape>>,
        b: impl Into<Arc<Shape>>,
        b_placement: Option<Placement>,
    ) -> Result<Self> {
        let (a, b) = (a.into(), b.into());
        let tolerance = a.tolerance();
        if b.tolerance() != tolerance {
            return Err(GeometryError::InvalidParameter {
                shape: op.name(),
                reason: format!(
                    "operand tolerances differ ({} vs {})",
                    tolerance.surface(),
                    b.tolerance().surface()
                ),
            }
            .into());
        }
        Ok(Self {
            op,
            a,
            b,
            b_placement,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            volume_samples: DEFAULT_VOLUME_SAMPLES,
            tolerance,
            cache: MeasureCache::default(),
            handler: None,
        })
    }

    /// # Errors
    ///
    /// See [`BooleanSolid::new`].
    pub fn union(
        a: impl Into<Arc<Shape>>,
        b: impl Into<Arc<Shape>>,
        b_placement: Option<Placement>,
    ) -> Result<Self> {
        Self::new(BooleanOp::Union, a, b, b_placement)
    }

    /// # Errors
    ///
    /// See [`BooleanSolid::new`].
    pub fn intersection(
        a: impl Into<Arc<Shape>>,
        b: impl Into<Arc<Shape>>,
        b_placement: Option<Placement>,
    ) -> Result<Self> {
        Self::new(BooleanOp::Intersection, a, b, b_placement)
    }

    /// # Errors
    ///
    /// See [`BooleanSolid::new`].
    pub fn subtraction(
        a: impl Into<Arc<Shape>>,
        b: impl Into<Arc<Shape>>,
        b_placement: Option<Placement>,
    ) -> Result<Self> {
        Self::new(BooleanOp::Subtraction, a, b, b_placement)
    }

    /// Sets the iteration cap of the entry walk (at least one).
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Sets the sample count used to estimate the overlap volume.
    #[must_use]
    pub fn with_volume_samples(mut self, samples: usize) -> Self {
        self.volume_samples = samples;
        self.cache = MeasureCache::default();
        self
    }

    /// Routes walk diagnostics to `handler` instead of the log.
    #[must_use]
    pub fn with_diagnostic_handler(mut self, handler: DiagnosticHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    #[must_use]
    pub fn op(&self) -> BooleanOp {
        self.op
    }

    #[must_use]
    pub fn first(&self) -> &Shape {
        &self.a
    }

    #[must_use]
    pub fn second(&self) -> &Shape {
        &self.b
    }

    #[must_use]
    pub fn second_placement(&self) -> Option<&Placement> {
        self.b_placement.as_ref()
    }

    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn operand_a(&self) -> Operand<'_> {
        Operand {
            shape: &self.a,
            placement: None,
        }
    }

    fn operand_b(&self) -> Operand<'_> {
        Operand {
            shape: &self.b,
            placement: self.b_placement.as_ref(),
        }
    }

    /// Walks along the ray alternating between the operands until the
    /// combination holds the ray, bounded by the iteration cap.
    #[must_use]
    pub fn walk_entry(&self, p: &Point3, v: &Vector3) -> EntryWalk {
        let half = self.tolerance.half();
        let (a, b) = (self.operand_a(), self.operand_b());

        if self.op == BooleanOp::Union {
            let distance = a.entry(p, v).min(b.entry(p, v));
            return EntryWalk {
                distance,
                converged: true,
            };
        }

        let mut t = 0.0;
        for _ in 0..self.max_iterations {
            let q = p + v * t;
            let da = a.reach(&q, v, half);
            if !da.is_finite() {
                return EntryWalk {
                    distance: f64::INFINITY,
                    converged: true,
                };
            }
            let advance = match self.op {
                BooleanOp::Intersection => {
                    let db = b.reach(&q, v, half);
                    if !db.is_finite() {
                        return EntryWalk {
                            distance: f64::INFINITY,
                            converged: true,
                        };
                    }
                    if da <= half && db <= half {
                        return EntryWalk {
                            distance: t,
                            converged: true,
                        };
                    }
                    da.max(db)
                }
                _ => {
                    if da > half {
                        da
                    } else if b.holds(&q, v, half) {
                        b.exit(&q, v, false).distance.max(self.tolerance.surface())
                    } else {
                        return EntryWalk {
                            distance: t,
                            converged: true,
                        };
                    }
                }
            };
            t += advance;
        }

        report(
            self.handler.as_ref(),
            &Diagnostic::BooleanWalkExhausted {
                operation: self.op.name(),
                iterations: self.max_iterations,
                distance: t,
            },
        );
        EntryWalk {
            distance: t,
            converged: false,
        }
    }

    /// Exit walk for a union: leave whichever operand holds the ray until
    /// neither does.
    fn union_exit(&self, p: &Point3, v: &Vector3, want_normal: bool) -> ExitHit {
        let half = self.tolerance.half();
        let (a, b) = (self.operand_a(), self.operand_b());
        let mut t = 0.0;
        let mut normal = None;
        for _ in 0..self.max_iterations {
            let q = p + v * t;
            let hit = if a.holds(&q, v, half) {
                a.exit(&q, v, true)
            } else if b.holds(&q, v, half) {
                b.exit(&q, v, true)
            } else {
                break;
            };
            t += hit.distance;
            normal = hit.normal;
        }
        let normal = normal.unwrap_or_else(|| self.surface_normal(&(p + v * t)));
        ExitHit::new(t, normal, false, want_normal)
    }

    /// Monte-Carlo estimate of the common volume inside the overlap box.
    fn overlap_volume(&self, overlap: &Aabb) -> f64 {
        if self.volume_samples == 0 {
            return 0.0;
        }
        let (a, b) = (self.operand_a(), self.operand_b());
        let mut rng = StdRng::seed_from_u64(SAMPLING_SEED);
        let mut hits = 0usize;
        for _ in 0..self.volume_samples {
            let q = sample_in(overlap, &mut rng);
            if a.classify(&q) != EInside::Outside && b.classify(&q) != EInside::Outside {
                hits += 1;
            }
        }
        overlap.volume() * ratio(hits, self.volume_samples)
    }
}

impl Solid for BooleanSolid {
    fn classify(&self, p: &Point3) -> EInside {
        let (a, b) = (self.operand_a(), self.operand_b());
        let ca = a.classify(p);
        match self.op {
            BooleanOp::Union => {
                if ca == EInside::Inside {
                    return EInside::Inside;
                }
                let cb = b.classify(p);
                match (ca, cb) {
                    (_, EInside::Inside) => EInside::Inside,
                    (EInside::Surface, EInside::Surface) => {
                        if (a.normal(p) + b.normal(p)).norm() < OPPOSED_NORMALS {
                            EInside::Inside
                        } else {
                            EInside::Surface
                        }
                    }
                    (EInside::Outside, EInside::Outside) => EInside::Outside,
                    _ => EInside::Surface,
                }
            }
            BooleanOp::Intersection => {
                if ca == EInside::Outside {
                    return ca;
                }
                ca.and(b.classify(p))
            }
            BooleanOp::Subtraction => {
                if ca == EInside::Outside {
                    return ca;
                }
                match (ca, b.classify(p)) {
                    (_, EInside::Inside) => EInside::Outside,
                    (EInside::Inside, EInside::Outside) => EInside::Inside,
                    (EInside::Surface, EInside::Surface) => {
                        if a.normal(p).dot(&b.normal(p)) > 1.0 - MATCHING_NORMALS {
                            EInside::Outside
                        } else {
                            EInside::Surface
                        }
                    }
                    _ => EInside::Surface,
                }
            }
        }
    }

    fn surface_normal(&self, p: &Point3) -> Vector3 {
        let (a, b) = (self.operand_a(), self.operand_b());
        let (ca, cb) = (a.classify(p), b.classify(p));
        let sign_b = if self.op == BooleanOp::Subtraction { -1.0 } else { 1.0 };
        let a_counts = ca == EInside::Surface
            && match self.op {
                BooleanOp::Union => cb != EInside::Inside,
                BooleanOp::Intersection => cb != EInside::Outside,
                BooleanOp::Subtraction => cb == EInside::Outside,
            };
        if a_counts {
            return a.normal(p);
        }
        let b_counts = cb == EInside::Surface
            && match self.op {
                BooleanOp::Union => ca != EInside::Inside,
                BooleanOp::Intersection | BooleanOp::Subtraction => ca != EInside::Outside,
            };
        if b_counts {
            return b.normal(p) * sign_b;
        }
        if a.gap(p) <= b.gap(p) {
            a.normal(p)
        } else {
            b.normal(p) * sign_b
        }
    }

    fn distance_to_entry(&self, p: &Point3, v: &Vector3) -> f64 {
        self.walk_entry(p, v).distance
    }

    fn safety_to_entry(&self, p: &Point3) -> f64 {
        let (a, b) = (self.operand_a(), self.operand_b());
        match self.op {
            BooleanOp::Union => a.safety_to_entry(p).min(b.safety_to_entry(p)),
            BooleanOp::Intersection => a.safety_to_entry(p).max(b.safety_to_entry(p)),
            BooleanOp::Subtraction => {
                let mut safe = a.safety_to_entry(p);
                if b.classify(p) == EInside::Inside {
                    safe = safe.max(b.safety_to_exit(p));
                }
                safe
            }
        }
    }

    fn distance_to_exit(&self, p: &Point3, v: &Vector3, want_normal: bool) -> ExitHit {
        let (a, b) = (self.operand_a(), self.operand_b());
        match self.op {
            BooleanOp::Union => self.union_exit(p, v, want_normal),
            BooleanOp::Intersection => {
                let ha = a.exit(p, v, want_normal);
                let hb = b.exit(p, v, want_normal);
                if ha.distance <= hb.distance {
                    ha
                } else {
                    hb
                }
            }
            BooleanOp::Subtraction => {
                let ha = a.exit(p, v, want_normal);
                let db = b.entry(p, v);
                if db < ha.distance {
                    let q = p + v * db;
                    debug!(distance = db, "subtraction exit through second operand");
                    ExitHit::new(db, -b.normal(&q), false, want_normal)
                } else {
                    ha
                }
            }
        }
    }

    fn safety_to_exit(&self, p: &Point3) -> f64 {
        let (a, b) = (self.operand_a(), self.operand_b());
        match self.op {
            BooleanOp::Union => {
                let (ca, cb) = (a.classify(p), b.classify(p));
                match (ca == EInside::Outside, cb == EInside::Outside) {
                    (false, false) => a.safety_to_exit(p).max(b.safety_to_exit(p)),
                    (false, true) => a.safety_to_exit(p),
                    (true, false) => b.safety_to_exit(p),
                    (true, true) => 0.0,
                }
            }
            BooleanOp::Intersection => a.safety_to_exit(p).min(b.safety_to_exit(p)),
            BooleanOp::Subtraction => a.safety_to_exit(p).min(b.safety_to_entry(p)),
        }
    }

    fn extent(&self) -> Aabb {
        let (ea, eb) = (self.operand_a().extent(), self.operand_b().extent());
        match self.op {
            BooleanOp::Union => ea.union(&eb),
            BooleanOp::Intersection => ea.intersection(&eb).unwrap_or_else(Aabb::empty),
            BooleanOp::Subtraction => ea,
        }
    }

    fn volume(&self) -> f64 {
        self.cache.volume(|| {
            let (va, vb) = (self.a.volume(), self.b.volume());
            let overlap = self
                .operand_a()
                .extent()
                .intersection(&self.operand_b().extent());
            let common = overlap.map_or(0.0, |o| self.overlap_volume(&o));
            match self.op {
                BooleanOp::Union => va + vb - common,
                BooleanOp::Intersection => common,
                BooleanOp::Subtraction => va - common,
            }
        })
    }

    fn surface_area(&self) -> f64 {
        self.cache
            .area(|| self.estimate_surface_area(self.volume_samples, SAMPLING_SEED))
    }

    fn tolerance(&self) -> Tolerance {
        self.tolerance
    }
}

impl fmt::Display for BooleanSolid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {}", self.op.name(), self.a, self.b)?;
        if let Some(m) = &self.b_placement {
            let t = m.translation();
            write!(f, " @ ({}, {}, {})", t.x, t.y, t.z)?;
        }
        write!(f, ")")
    }
}
