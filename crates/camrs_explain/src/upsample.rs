//! Resizing maps to a target spatial size.
//!
//! Works on row-major host buffers holding `n_maps` maps one after the
//! other, for any number of spatial dimensions. Linear modes resize one axis
//! at a time with half-pixel centres (`align_corners = false`), so bilinear
//! and trilinear are the two- and three-axis cases of the same routine.

use camrs_core::InterpolationMode;

/// Resize `n_maps` maps of spatial size `src` to `dst`.
///
/// # Panics
///
/// Panics if `values.len() != n_maps * src.iter().product()` or if `src` and
/// `dst` have different lengths.
pub fn resize(
    values: &[f32],
    n_maps: usize,
    src: &[usize],
    dst: &[usize],
    mode: InterpolationMode,
) -> Vec<f32> {
    assert_eq!(src.len(), dst.len(), "spatial rank mismatch");
    assert_eq!(
        values.len(),
        n_maps * src.iter().product::<usize>(),
        "buffer does not match source shape"
    );

    if src == dst {
        return values.to_vec();
    }

    let mut current = values.to_vec();
    let mut shape = src.to_vec();

    for axis in 0..shape.len() {
        if shape[axis] == dst[axis] {
            continue;
        }
        let outer = n_maps * shape[..axis].iter().product::<usize>();
        let inner: usize = shape[axis + 1..].iter().product();
        let taps: Vec<Tap> = match mode {
            InterpolationMode::Nearest => nearest_taps(shape[axis], dst[axis]),
            InterpolationMode::Bilinear | InterpolationMode::Trilinear => {
                linear_taps(shape[axis], dst[axis])
            }
        };
        current = resize_axis(&current, outer, shape[axis], inner, &taps);
        shape[axis] = dst[axis];
    }

    current
}

/// Source positions and weight of the second one for one output position.
#[derive(Debug, Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: f32,
}

fn nearest_taps(len_in: usize, len_out: usize) -> Vec<Tap> {
    (0..len_out)
        .map(|j| {
            let idx = ((j * len_in) / len_out).min(len_in - 1);
            Tap {
                lo: idx,
                hi: idx,
                frac: 0.0,
            }
        })
        .collect()
}

fn linear_taps(len_in: usize, len_out: usize) -> Vec<Tap> {
    let scale = len_in as f32 / len_out as f32;
    (0..len_out)
        .map(|j| {
            let x = ((j as f32 + 0.5) * scale - 0.5).max(0.0);
            let lo = (x.floor() as usize).min(len_in - 1);
            let hi = (lo + 1).min(len_in - 1);
            Tap {
                lo,
                hi,
                frac: x - lo as f32,
            }
        })
        .collect()
}

fn resize_axis(values: &[f32], outer: usize, len_in: usize, inner: usize, taps: &[Tap]) -> Vec<f32> {
    let len_out = taps.len();
    let mut out = vec![0.0; outer * len_out * inner];

    for o in 0..outer {
        let src = &values[o * len_in * inner..(o + 1) * len_in * inner];
        let dst = &mut out[o * len_out * inner..(o + 1) * len_out * inner];
        for (j, tap) in taps.iter().enumerate() {
            let row_lo = &src[tap.lo * inner..(tap.lo + 1) * inner];
            let row_hi = &src[tap.hi * inner..(tap.hi + 1) * inner];
            for (i, slot) in dst[j * inner..(j + 1) * inner].iter_mut().enumerate() {
                *slot = (1.0 - tap.frac) * row_lo[i] + tap.frac * row_hi[i];
            }
        }
    }

    out
}
