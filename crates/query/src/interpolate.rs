//! Gap filling between sparse Graphite points

use crate::types::Point;

/// Insert linearly interpolated points into gaps wider than `max_delta_ms`
///
/// Between two consecutive points further apart than the delta, synthetic
/// points are placed every `max_delta_ms` after the earlier one, stopping
/// before the later one. A non-positive delta returns the input unchanged.
pub fn interpolate(points: &[Point], max_delta_ms: i64) -> Vec<Point> {
    if max_delta_ms <= 0 || points.len() < 2 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len());
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        out.push(a);

        let gap = b.timestamp_ms - a.timestamp_ms;
        if gap <= max_delta_ms {
            continue;
        }

        let rise = b.value - a.value;
        let mut ts = a.timestamp_ms + max_delta_ms;
        while ts < b.timestamp_ms {
            let value = a.value + rise * (ts - a.timestamp_ms) as f64 / gap as f64;
            out.push(Point::new(value, ts));
            ts += max_delta_ms;
        }
    }
    if let Some(last) = points.last() {
        out.push(*last);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_gaps() {
        let points = vec![Point::new(1.0, 0), Point::new(2.0, 1000), Point::new(3.0, 2000)];
        assert_eq!(interpolate(&points, 1000), points);
    }

    #[test]
    fn test_disabled() {
        let points = vec![Point::new(18.0, 0), Point::new(42.0, 300_000)];
        assert_eq!(interpolate(&points, 0), points);
    }

    #[test]
    fn test_fills_gap_linearly() {
        let points = vec![Point::new(0.0, 0), Point::new(40.0, 4000)];
        let filled = interpolate(&points, 1000);
        assert_eq!(
            filled,
            vec![
                Point::new(0.0, 0),
                Point::new(10.0, 1000),
                Point::new(20.0, 2000),
                Point::new(30.0, 3000),
                Point::new(40.0, 4000),
            ]
        );
    }

    #[test]
    fn test_uneven_gap_stops_before_next_point() {
        let points = vec![Point::new(18.0, 0), Point::new(42.0, 300_000)];
        let filled = interpolate(&points, 120_000);
        let timestamps: Vec<i64> = filled.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(timestamps, vec![0, 120_000, 240_000, 300_000]);
        assert!((filled[1].value - 27.6).abs() < 1e-9);
    }

    #[test]
    fn test_single_and_empty() {
        assert!(interpolate(&[], 1000).is_empty());
        assert_eq!(interpolate(&[Point::new(1.0, 0)], 1000).len(), 1);
    }
}
