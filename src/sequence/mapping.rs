//! Map the shape of a monotonic reference function onto an arbitrary interval.

use super::{Result, SequenceError};

const BASE_START: f64 = 1.0;
const BASE_END: f64 = 100.0;

/// Produce `n` values between `start` and `end` following the shape of `shape`.
///
/// The shape is sampled on a fixed grid of `n` points over `[1, 100]` and then
/// rescaled affinely so the first sample lands on `start` and the last on `end`.
/// `shape` must not map the first and last grid point to the same value.
pub fn map_to_shape<F>(shape: F, start: f64, end: f64, n: usize) -> Result<Vec<f64>>
where
    F: Fn(f64) -> f64,
{
    if n < 2 {
        return Err(SequenceError::InvalidStepCount(n));
    }

    let step = (BASE_END - BASE_START) / (n - 1) as f64;
    let curve: Vec<f64> = (0..n)
        .map(|i| shape(BASE_START + step * i as f64))
        .collect();

    let first = curve[0];
    let span = curve[n - 1] - first;
    let mut mapped: Vec<f64> = curve
        .iter()
        .map(|c| start + (end - start) * (c - first) / span)
        .collect();

    // Pin the endpoints against accumulated rounding.
    mapped[0] = start;
    mapped[n - 1] = end;
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Spacing;
    use proptest::prelude::*;

    #[test]
    fn uniform_mapping_is_linear() {
        let values = map_to_shape(|x| x, 0.0, 10.0, 3).unwrap();
        assert_eq!(values, vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn rejects_fewer_than_two_points() {
        assert!(matches!(
            map_to_shape(|x| x, 0.0, 1.0, 1),
            Err(SequenceError::InvalidStepCount(1))
        ));
        assert!(map_to_shape(|x| x, 0.0, 1.0, 0).is_err());
    }

    #[test]
    fn log_spacing_crowds_the_start() {
        let values = map_to_shape(f64::ln, 0.0, 100.0, 5).unwrap();
        let first_gap = values[1] - values[0];
        let last_gap = values[4] - values[3];
        assert!(first_gap > last_gap);
    }

    #[test]
    fn descending_intervals_are_supported() {
        let values = map_to_shape(|x| x, 300.0, 2.0, 4).unwrap();
        assert_eq!(values.first(), Some(&300.0));
        assert_eq!(values.last(), Some(&2.0));
        assert!(values.windows(2).all(|w| w[1] < w[0]));
    }

    fn any_spacing() -> impl Strategy<Value = Spacing> {
        prop_oneof![
            Just(Spacing::Uniform),
            Just(Spacing::Squared),
            Just(Spacing::Sqrt),
            Just(Spacing::Reciprocal),
            Just(Spacing::Log),
        ]
    }

    proptest! {
        #[test]
        fn endpoints_and_length_hold(
            spacing in any_spacing(),
            start in -500.0f64..500.0,
            end in -500.0f64..500.0,
            n in 2usize..200,
        ) {
            let values = map_to_shape(|x| spacing.shape(x), start, end, n).unwrap();
            prop_assert_eq!(values.len(), n);
            prop_assert!((values[0] - start).abs() < 1e-9);
            prop_assert!((values[n - 1] - end).abs() < 1e-9);
        }
    }
}
