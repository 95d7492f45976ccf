//! Piecewise-linear table lookup (numpy.interp semantics, clamped ends).

/// Position of `x` inside an increasing abscissa table.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bracket {
    lo: usize,
    hi: usize,
    /// Fraction of the way from `lo` to `hi`.
    t: f64,
}

fn bracket(x: f64, xp: &[f64]) -> Bracket {
    let last = xp.len() - 1;
    if x <= xp[0] {
        return Bracket { lo: 0, hi: 0, t: 0.0 };
    }
    if x >= xp[last] {
        return Bracket {
            lo: last,
            hi: last,
            t: 0.0,
        };
    }

    let hi = xp.partition_point(|&v| v < x);
    if (xp[hi] - x).abs() < f64::EPSILON * xp[hi].abs() {
        return Bracket { lo: hi, hi, t: 0.0 };
    }
    let lo = hi - 1;
    Bracket {
        lo,
        hi,
        t: (x - xp[lo]) / (xp[hi] - xp[lo]),
    }
}

#[inline]
fn lerp(b: Bracket, fp: &[f64]) -> f64 {
    fp[b.lo] + b.t * (fp[b.hi] - fp[b.lo])
}

/// Interpolates values from `(xp, fp)` at points `x`.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    x.iter().map(|&xi| interp_one(xi, xp, fp)).collect()
}

/// Interpolate a single value. `xp` must be non-empty and increasing.
pub fn interp_one(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    lerp(bracket(x, xp), fp)
}

/// Interpolate two ordinate columns sharing one abscissa with a single search.
pub fn interp_pair(x: f64, xp: &[f64], fa: &[f64], fb: &[f64]) -> (f64, f64) {
    let b = bracket(x, xp);
    (lerp(b, fa), lerp(b, fb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interp_basic() {
        let xp = vec![0.0, 1.0, 2.0];
        let fp = vec![0.0, 10.0, 20.0];

        let result = interp(&[0.5, 1.5], &xp, &fp);
        assert!((result[0] - 5.0).abs() < 1e-10);
        assert!((result[1] - 15.0).abs() < 1e-10);
    }

    #[test]
    fn test_interp_clamping() {
        let xp = vec![1.0, 2.0, 3.0];
        let fp = vec![10.0, 20.0, 30.0];

        let result = interp(&[0.0, 4.0], &xp, &fp);
        assert!((result[0] - 10.0).abs() < 1e-10);
        assert!((result[1] - 30.0).abs() < 1e-10);
    }

    #[test]
    fn test_interp_pair_shares_bracket() {
        let xp = vec![100.0, 200.0, 400.0];
        let f1 = vec![1.0, 2.0, 4.0];
        let f2 = vec![-1.0, -2.0, -4.0];
        let (a, b) = interp_pair(300.0, &xp, &f1, &f2);
        assert!((a - 3.0).abs() < 1e-12);
        assert!((b + 3.0).abs() < 1e-12);
        assert_eq!(interp_pair(200.0, &xp, &f1, &f2), (2.0, -2.0));
    }

    #[test]
    fn test_single_point_table() {
        assert_eq!(interp_one(5.0, &[1.0], &[7.0]), 7.0);
    }
}
