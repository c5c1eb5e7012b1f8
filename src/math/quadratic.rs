/// Solves `a * t^2 + 2 * half_b * t + c = 0`.
///
/// Returns the real roots in ascending order, or `None` when there are none.
/// A double root (or the single root of the degenerate linear case) is
/// returned twice.
///
/// The larger-magnitude root is computed as `q / a` with
/// `q = -(half_b + sign(half_b) * sqrt(disc))` and the other as `c / q`, so
/// neither root is formed by subtracting two nearly equal numbers.
#[must_use]
pub fn solve_quadratic(a: f64, half_b: f64, c: f64) -> Option<(f64, f64)> {
    let scale = a.abs().max(half_b.abs()).max(c.abs());
    if scale == 0.0 {
        return None;
    }

    if a.abs() <= scale * 1e-14 {
        // Linear: 2 * half_b * t + c = 0
        if half_b.abs() <= scale * 1e-14 {
            return None;
        }
        let t = -c / (2.0 * half_b);
        return Some((t, t));
    }

    let disc = half_b * half_b - a * c;
    if disc < 0.0 {
        return None;
    }

    let sqrt_disc = disc.sqrt();
    let q = if half_b >= 0.0 {
        -(half_b + sqrt_disc)
    } else {
        -half_b + sqrt_disc
    };

    if q == 0.0 {
        // half_b == 0 and disc == 0, hence c == 0
        return Some((0.0, 0.0));
    }

    let t1 = q / a;
    let t2 = c / q;
    if t1 <= t2 {
        Some((t1, t2))
    } else {
        Some((t2, t1))
    }
}
