//! Mask-aware spatial re-binning of detector fields.

use std::ops::{AddAssign, Mul};

use ndarray::Array2;

use crate::error::{DiffractError, Result};
use crate::pixelmask::{self, MaskBits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownsampleMode {
    /// Sum of the valid sub-pixels.
    #[default]
    Integrate,
    /// Mean of the valid sub-pixels.
    Average,
}

/// Bin `field` by `factor` in both directions, dropping incomplete edge bins.
///
/// Sub-pixels whose mask shares a bit with `bad_bits` are left out of the
/// bin. A bin with fewer than `min_valid` remaining sub-pixels is flagged
/// [`pixelmask::INVALID`] in the returned mask.
pub fn downsample<T>(
    field: &Array2<T>,
    factor: usize,
    mode: DownsampleMode,
    mask: &Array2<MaskBits>,
    bad_bits: MaskBits,
    min_valid: usize,
) -> Result<(Array2<T>, Array2<MaskBits>)>
where
    T: Copy + Default + AddAssign + Mul<f64, Output = T>,
{
    if factor == 0 {
        return Err(DiffractError::InvalidGeometry(
            "downsampling factor must be at least 1".to_string(),
        ));
    }
    if field.dim() != mask.dim() {
        let (fy, fx) = field.dim();
        let (my, mx) = mask.dim();
        return Err(DiffractError::ShapeMismatch {
            channel: "mask".to_string(),
            expected: vec![fy, fx],
            found: vec![my, mx],
        });
    }
    let (ny, nx) = field.dim();
    let (by, bx) = (ny / factor, nx / factor);
    let mut out = Array2::<T>::default((by, bx));
    let mut out_mask = Array2::<MaskBits>::zeros((by, bx));

    for ((iy, ix), value) in out.indexed_iter_mut() {
        let mut sum = T::default();
        let mut n_valid = 0usize;
        for y in iy * factor..(iy + 1) * factor {
            for x in ix * factor..(ix + 1) * factor {
                if mask[[y, x]] & bad_bits == 0 {
                    sum += field[[y, x]];
                    n_valid += 1;
                }
            }
        }
        *value = match mode {
            DownsampleMode::Integrate => sum,
            DownsampleMode::Average if n_valid > 0 => sum * (1.0 / n_valid as f64),
            DownsampleMode::Average => T::default(),
        };
        if n_valid < min_valid {
            out_mask[[iy, ix]] = pixelmask::INVALID;
        }
    }
    Ok((out, out_mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn test_integrate_sums_only_valid_pixels() {
        let field = Array2::from_shape_fn((4, 4), |(y, x)| (y * 4 + x) as f64);
        let mut mask = Array2::<MaskBits>::zeros((4, 4));
        mask[[0, 0]] = pixelmask::DEAD;
        mask[[1, 1]] = pixelmask::NOISY;

        let (binned, bmask) =
            downsample(&field, 2, DownsampleMode::Integrate, &mask, pixelmask::IN_MASK, 1).unwrap();
        assert_eq!(binned.dim(), (2, 2));
        // [0, 1, 4, 5] without the dead pixel 0; NOISY is not a masking bit
        assert_eq!(binned[[0, 0]], 1.0 + 4.0 + 5.0);
        assert_eq!(binned[[1, 1]], 10.0 + 11.0 + 14.0 + 15.0);
        assert_eq!(bmask.sum(), 0);
    }

    #[test]
    fn test_bins_below_threshold_are_invalid() {
        let field = Array2::<f64>::ones((2, 4));
        let mut mask = Array2::<MaskBits>::zeros((2, 4));
        for x in 0..2 {
            mask[[0, x]] = pixelmask::SHADOWED;
            mask[[1, x]] = pixelmask::SHADOWED;
        }
        mask[[0, 2]] = pixelmask::HOT;

        let (binned, bmask) =
            downsample(&field, 2, DownsampleMode::Integrate, &mask, pixelmask::IN_MASK, 4).unwrap();
        assert_eq!(bmask[[0, 0]], pixelmask::INVALID);
        assert_eq!(bmask[[0, 1]], pixelmask::INVALID);
        assert_eq!(binned[[0, 0]], 0.0);
        assert_eq!(binned[[0, 1]], 3.0);

        let (_, bmask) =
            downsample(&field, 2, DownsampleMode::Integrate, &mask, pixelmask::IN_MASK, 3).unwrap();
        assert_eq!(bmask[[0, 1]], pixelmask::PERFECT);
    }

    #[test]
    fn test_average_complex_and_edge_drop() {
        let field = Array2::from_elem((5, 5), Complex64::new(2.0, -1.0));
        let mask = Array2::<MaskBits>::zeros((5, 5));
        let (binned, _) =
            downsample(&field, 2, DownsampleMode::Average, &mask, pixelmask::IN_MASK, 1).unwrap();
        assert_eq!(binned.dim(), (2, 2));
        assert_eq!(binned[[1, 0]], Complex64::new(2.0, -1.0));
    }

    #[test]
    fn test_zero_factor_rejected() {
        let field = Array2::<f64>::zeros((2, 2));
        let mask = Array2::<MaskBits>::zeros((2, 2));
        assert!(downsample(&field, 0, DownsampleMode::Integrate, &mask, 0, 1).is_err());
    }
}
