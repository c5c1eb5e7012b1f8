//! Seeded ray properties every solid must satisfy.

use std::f64::consts::FRAC_PI_3;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{
    BooleanSolid, Cone, ConeRadii, Cuboid, EInside, PhiSection, Shape, Solid, Sphere, ThetaRange,
    Tube,
};
use crate::math::{Aabb, Placement, Point3, Tolerance, Vector3};

fn region(solid: &Shape) -> Aabb {
    let extent = solid.extent();
    extent.expanded(0.25 * extent.size().max())
}

fn random_point(rng: &mut StdRng, b: &Aabb) -> Point3 {
    Point3::new(
        rng.random_range(b.min.x..b.max.x),
        rng.random_range(b.min.y..b.max.y),
        rng.random_range(b.min.z..b.max.z),
    )
}

fn random_direction(rng: &mut StdRng) -> Vector3 {
    loop {
        let v = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        if let Some(u) = v.try_normalize(1e-3) {
            return u;
        }
    }
}

/// Rays from outside cross no material before the reported entry, land on
/// the solid when they hit, and stay clear of it when they miss.
fn check_entries(solid: &Shape, seed: u64, rays: usize) {
    let bounds = region(solid);
    let reach = 2.0 * bounds.size().norm();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut hits = 0;
    let mut checked = 0;
    while checked < rays {
        let origin = random_point(&mut rng, &bounds);
        if solid.classify(&origin) != EInside::Outside {
            continue;
        }
        let dir = random_direction(&mut rng);
        let d = solid.distance_to_entry(&origin, &dir);
        let span = if d.is_finite() { d } else { reach };
        for k in 1..50 {
            let t = span * f64::from(k) / 50.0;
            assert_ne!(
                solid.classify(&(origin + dir * t)),
                EInside::Inside,
                "{solid}: origin {origin:?} dir {dir:?} crosses material at {t}, entry {d}"
            );
        }
        if d.is_finite() {
            assert_ne!(
                solid.classify(&(origin + dir * d)),
                EInside::Outside,
                "{solid}: origin {origin:?} dir {dir:?} entry {d} lands outside"
            );
            hits += 1;
        }
        checked += 1;
    }
    assert!(hits * 20 > rays, "{solid}: only {hits} of {rays} rays hit");
}

/// Entry points taken as surface points: moving inward from them the entry
/// distance is zero and the exit distance is positive.
fn check_surface_points(solid: &Shape, seed: u64, points: usize) {
    let bounds = region(solid);
    let half = solid.tolerance().half();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut checked = 0;
    while checked < points {
        let origin = random_point(&mut rng, &bounds);
        if solid.classify(&origin) != EInside::Outside {
            continue;
        }
        let dir = random_direction(&mut rng);
        let d = solid.distance_to_entry(&origin, &dir);
        if !d.is_finite() {
            continue;
        }
        let s = origin + dir * d;
        // Grazing hits leave slivers thinner than the tolerance.
        if solid.classify(&s) != EInside::Surface || solid.surface_normal(&s).dot(&dir) > -0.05 {
            continue;
        }
        let again = solid.distance_to_entry(&s, &dir);
        assert!(again <= half, "{solid}: entry {again} from surface point {s:?} dir {dir:?}");
        let exit = solid.distance_to_exit(&s, &dir, false);
        assert!(
            exit.distance > 0.0,
            "{solid}: zero exit from surface point {s:?} dir {dir:?}"
        );
        checked += 1;
    }
}

fn check(solid: &Shape, seed: u64) {
    check_entries(solid, seed, 1500);
    check_surface_points(solid, seed + 1, 300);
}

fn tol() -> Tolerance {
    Tolerance::default()
}

fn cube(h: f64) -> Shape {
    Cuboid::new(h, h, h, tol()).unwrap().into()
}

fn ball(r: f64) -> Shape {
    Sphere::full(0.0, r, tol()).unwrap().into()
}

#[test]
fn cuboid_rays() {
    check(&Cuboid::new(10.0, 20.0, 30.0, tol()).unwrap().into(), 100);
}

#[test]
fn tube_rays() {
    check(&Tube::full(5.0, 10.0, 15.0, tol()).unwrap().into(), 110);
    check(&Tube::full(0.0, 10.0, 15.0, tol()).unwrap().into(), 112);
    check(&Tube::new(5.0, 10.0, 15.0, 0.5, 2.0, tol()).unwrap().into(), 114);
    check(&Tube::new(2.0, 10.0, 5.0, 1.0, 4.5, tol()).unwrap().into(), 116);
}

#[test]
fn cone_rays() {
    let frustum = ConeRadii {
        rmin1: 5.0,
        rmax1: 10.0,
        rmin2: 2.0,
        rmax2: 4.0,
    };
    let pointed = ConeRadii {
        rmin1: 0.0,
        rmax1: 10.0,
        rmin2: 0.0,
        rmax2: 0.0,
    };
    check(&Cone::full(frustum, 10.0, tol()).unwrap().into(), 120);
    check(&Cone::full(pointed, 10.0, tol()).unwrap().into(), 122);
    check(&Cone::new(frustum, 10.0, 0.5, 2.0, tol()).unwrap().into(), 124);
}

#[test]
fn sphere_rays() {
    check(&ball(10.0), 130);
    check(&Sphere::full(3.0, 10.0, tol()).unwrap().into(), 132);
    let phi = PhiSection::new(0.5, 2.0).unwrap();
    let theta = ThetaRange::new(0.4, 1.5).unwrap();
    check(&Sphere::new(2.0, 9.0, phi, theta, tol()).unwrap().into(), 134);
    let phi = PhiSection::new(0.2, 4.0).unwrap();
    let theta = ThetaRange::new(0.5, 1.8).unwrap();
    check(&Sphere::new(3.0, 10.0, phi, theta, tol()).unwrap().into(), 136);
}

#[test]
fn boolean_rays() {
    let beside = Some(Placement::from_translation(Vector3::new(10.0, 0.0, 0.0)));
    check(&BooleanSolid::union(cube(10.0), ball(8.0), beside).unwrap().into(), 140);
    check(&BooleanSolid::intersection(cube(10.0), ball(13.0), None).unwrap().into(), 142);
    check(&BooleanSolid::subtraction(cube(10.0), ball(5.0), None).unwrap().into(), 144);
    let tilted =
        Placement::from_axis_angle(Vector3::z(), FRAC_PI_3, Vector3::new(10.0, 0.0, 0.0)).unwrap();
    check(
        &BooleanSolid::subtraction(cube(10.0), cube(5.0), Some(tilted)).unwrap().into(),
        146,
    );
}
