use alloc::{vec, vec::Vec};

use nalgebra::Vector2;
use num_traits::Float;

use crate::error::{ConfigError, Result};

/// Segments shorter than this are merged into their neighbour.
const MIN_SEGMENT: f64 = 1e-9;

/// Smallest spacing, in inches, that resampling accepts.
const MIN_SPACING: f64 = 0.01;

const MAX_SMOOTHING_PASSES: usize = 10_000;

/// How far past the closest point the lookahead search scans, in lookahead
/// radii.
const SEARCH_WINDOW: f64 = 3.0;

/// A waypoint with the direction the path should leave it in.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct HermitePoint {
    pub position: Vector2<f64>,
    pub tangent: Vector2<f64>,
}

impl HermitePoint {
    pub fn new(x: f64, y: f64, tangent_x: f64, tangent_y: f64) -> Self {
        Self {
            position: Vector2::new(x, y),
            tangent: Vector2::new(tangent_x, tangent_y),
        }
    }

    /// A waypoint heading `degrees` counter-clockwise from +x. `magnitude`
    /// controls how far the curve keeps that heading.
    pub fn from_heading(x: f64, y: f64, degrees: f64, magnitude: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(x, y, magnitude * cos, magnitude * sin)
    }
}

/// A polyline indexed by arc length, measured in inches from the start.
///
/// Past its end the path continues straight along its last segment, so a
/// follower near the end still has somewhere to look.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    points: Vec<Vector2<f64>>,
    /// Arc length at each point.
    stations: Vec<f64>,
}

impl Path {
    pub fn from_points(points: impl IntoIterator<Item = Vector2<f64>>) -> Result<Self> {
        let mut deduped: Vec<Vector2<f64>> = Vec::new();
        for point in points {
            match deduped.last() {
                Some(last) if (point - last).norm() < MIN_SEGMENT => {}
                _ => deduped.push(point),
            }
        }
        if deduped.len() < 2 {
            return Err(ConfigError::PathTooShort(deduped.len()));
        }

        let mut stations = Vec::with_capacity(deduped.len());
        let mut travelled = 0.0;
        stations.push(0.0);
        for pair in deduped.windows(2) {
            travelled += (pair[1] - pair[0]).norm();
            stations.push(travelled);
        }
        Ok(Self {
            points: deduped,
            stations,
        })
    }

    /// Samples a cubic Hermite spline through `points`, `samples` points per
    /// segment.
    pub fn from_hermite(points: &[HermitePoint], samples: usize) -> Result<Self> {
        if points.len() < 2 {
            return Err(ConfigError::PathTooShort(points.len()));
        }
        let samples = samples.max(1);

        let mut sampled = Vec::with_capacity((points.len() - 1) * samples + 1);
        for pair in points.windows(2) {
            let (start, end) = (&pair[0], &pair[1]);
            for i in 0..samples {
                let s = i as f64 / samples as f64;
                let (s2, s3) = (s * s, s * s * s);
                let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
                let h01 = -2.0 * s3 + 3.0 * s2;
                let h10 = s3 - 2.0 * s2 + s;
                let h11 = s3 - s2;
                sampled.push(
                    start.position * h00 + end.position * h01 + start.tangent * h10 + end.tangent * h11,
                );
            }
        }
        sampled.push(points[points.len() - 1].position);
        Self::from_points(sampled)
    }

    /// Fits a natural cubic spline `y(x)` through `points` and samples it at
    /// most `resolution` inches apart along x. The x coordinates must be
    /// strictly increasing or strictly decreasing.
    pub fn from_cubic(points: &[Vector2<f64>], resolution: f64) -> Result<Self> {
        if points.len() < 2 {
            return Err(ConfigError::PathTooShort(points.len()));
        }
        if !(resolution >= MIN_SPACING) {
            return Err(ConfigError::Malformed("spline resolution is too small"));
        }
        let reversed = points[0].x > points[points.len() - 1].x;
        let mut knots = points.to_vec();
        if reversed {
            knots.reverse();
        }
        if knots.windows(2).any(|pair| !(pair[1].x > pair[0].x)) {
            return Err(ConfigError::Malformed("spline x coordinates are not monotonic"));
        }

        let n = knots.len() - 1;
        let h: Vec<f64> = knots.windows(2).map(|pair| pair[1].x - pair[0].x).collect();
        let slope: Vec<f64> = knots
            .windows(2)
            .zip(&h)
            .map(|(pair, h)| (pair[1].y - pair[0].y) / h)
            .collect();

        // Second derivative at each knot, zero at both ends. The interior
        // ones solve a tridiagonal system.
        let mut m = vec![0.0; n + 1];
        let mut diag: Vec<f64> = Vec::with_capacity(n);
        let mut rhs: Vec<f64> = Vec::with_capacity(n);
        for i in 1..n {
            let mut d = 2.0 * (h[i - 1] + h[i]);
            let mut r = 6.0 * (slope[i] - slope[i - 1]);
            if i > 1 {
                let w = h[i - 1] / diag[i - 2];
                d -= w * h[i - 1];
                r -= w * rhs[i - 2];
            }
            diag.push(d);
            rhs.push(r);
        }
        for i in (1..n).rev() {
            m[i] = (rhs[i - 1] - h[i] * m[i + 1]) / diag[i - 1];
        }

        let mut sampled = Vec::new();
        for i in 0..n {
            let a = (m[i + 1] - m[i]) / (6.0 * h[i]);
            let b = m[i] / 2.0;
            let c = slope[i] - h[i] * (m[i + 1] + 2.0 * m[i]) / 6.0;
            let steps = (h[i] / resolution).ceil().max(1.0) as usize;
            for k in 0..steps {
                let t = h[i] * k as f64 / steps as f64;
                sampled.push(Vector2::new(
                    knots[i].x + t,
                    knots[i].y + t * (c + t * (b + t * a)),
                ));
            }
        }
        sampled.push(knots[n]);
        if reversed {
            sampled.reverse();
        }
        Self::from_points(sampled)
    }

    /// Re-samples the path with points at most `spacing` apart, keeping its
    /// shape.
    pub fn inject(&self, spacing: f64) -> Result<Self> {
        if !(spacing >= MIN_SPACING) {
            return Err(ConfigError::Malformed("injection spacing is too small"));
        }
        let mut points = Vec::new();
        for (pair, stations) in self.points.windows(2).zip(self.stations.windows(2)) {
            let count = ((stations[1] - stations[0]) / spacing).ceil().max(1.0) as usize;
            for i in 0..count {
                points.push(pair[0] + (pair[1] - pair[0]) * (i as f64 / count as f64));
            }
        }
        points.push(self.end());
        Self::from_points(points)
    }

    /// Pulls interior points towards their neighbours until a full pass
    /// moves them less than `tolerance` in total. The endpoints stay put.
    ///
    /// `weight_data` holds points to where they were, `weight_smooth` pulls
    /// them straight. Works best on an injected path.
    pub fn smooth(&self, weight_data: f64, weight_smooth: f64, tolerance: f64) -> Result<Self> {
        if !(tolerance > 0.0) {
            return Err(ConfigError::Malformed("smoothing tolerance must be positive"));
        }
        let original = &self.points;
        let mut smoothed = original.clone();
        for _ in 0..MAX_SMOOTHING_PASSES {
            let mut change = 0.0;
            for i in 1..smoothed.len() - 1 {
                let before = smoothed[i];
                let pull = (original[i] - before) * weight_data
                    + (smoothed[i - 1] + smoothed[i + 1] - before * 2.0) * weight_smooth;
                smoothed[i] = before + pull;
                change += pull.norm();
            }
            if change < tolerance {
                return Self::from_points(smoothed);
            }
        }
        Err(ConfigError::Malformed("path smoothing did not settle"))
    }

    pub fn points(&self) -> &[Vector2<f64>] {
        &self.points
    }

    pub fn length(&self) -> f64 {
        self.stations[self.stations.len() - 1]
    }

    pub fn start(&self) -> Vector2<f64> {
        self.points[0]
    }

    pub fn end(&self) -> Vector2<f64> {
        self.points[self.points.len() - 1]
    }

    /// Arc length left from `s` to the end.
    pub fn remaining(&self, s: f64) -> f64 {
        (self.length() - s).max(0.0)
    }

    /// Index of the segment holding arc length `s`.
    fn segment_at(&self, s: f64) -> usize {
        self.stations
            .partition_point(|&station| station <= s)
            .saturating_sub(1)
            .min(self.points.len() - 2)
    }

    fn end_direction(&self) -> Vector2<f64> {
        let n = self.points.len();
        (self.points[n - 1] - self.points[n - 2]).normalize()
    }

    /// The point at arc length `s`. Before the start this is the start;
    /// past the end it lies on the extension of the last segment.
    pub fn point_at(&self, s: f64) -> Vector2<f64> {
        if s >= self.length() {
            return self.end() + self.end_direction() * (s - self.length());
        }
        let s = s.max(0.0);
        let i = self.segment_at(s);
        let t = (s - self.stations[i]) / (self.stations[i + 1] - self.stations[i]);
        self.points[i] + (self.points[i + 1] - self.points[i]) * t
    }

    /// Arc length of the closest point to `point`, searching only at or
    /// after `from_s`.
    pub fn closest(&self, point: &Vector2<f64>, from_s: f64) -> f64 {
        let from_s = from_s.clamp(0.0, self.length());
        let mut best = (f64::INFINITY, from_s);
        for i in self.segment_at(from_s)..self.points.len() - 1 {
            let (a, b) = (self.points[i], self.points[i + 1]);
            let ab = b - a;
            let t = ((point - a).dot(&ab) / ab.norm_squared()).clamp(0.0, 1.0);
            let s = (self.stations[i] + t * (self.stations[i + 1] - self.stations[i])).max(from_s);
            let distance = (point - self.point_at(s)).norm();
            if distance < best.0 {
                best = (distance, s);
            }
        }
        best.1
    }

    /// Arc length of the furthest point, at or after `from_s`, where a
    /// circle of radius `lookahead` around `position` crosses the path.
    ///
    /// When the circle misses the path entirely this falls back to
    /// `from_s + lookahead`.
    pub fn lookahead(&self, position: &Vector2<f64>, lookahead: f64, from_s: f64) -> f64 {
        let window_end = from_s + SEARCH_WINDOW * lookahead;
        let extension_end = self.length() + 2.0 * lookahead;

        let segments = self
            .points
            .windows(2)
            .zip(self.stations.windows(2))
            .map(|(pair, stations)| (pair[0], pair[1], stations[0], stations[1]))
            .chain(core::iter::once((
                self.end(),
                self.point_at(extension_end),
                self.length(),
                extension_end,
            )));

        let mut furthest: Option<f64> = None;
        for (a, b, s0, s1) in segments {
            if s1 < from_s || s0 > window_end {
                continue;
            }
            for t in segment_circle_params(position, lookahead, &a, &b) {
                let s = s0 + t * (s1 - s0);
                if s >= from_s && furthest.map_or(true, |best| s > best) {
                    furthest = Some(s);
                }
            }
        }
        furthest.unwrap_or(from_s + lookahead)
    }
}

/// Positions along `a → b`, as fractions in [0, 1], where it crosses the
/// circle.
fn segment_circle_params(
    center: &Vector2<f64>,
    radius: f64,
    a: &Vector2<f64>,
    b: &Vector2<f64>,
) -> impl Iterator<Item = f64> {
    let d = b - a;
    let f = a - center;
    let qa = d.norm_squared();
    let qb = 2.0 * f.dot(&d);
    let qc = f.norm_squared() - radius * radius;
    let discriminant = qb * qb - 4.0 * qa * qc;

    let roots = if qa == 0.0 || discriminant < 0.0 {
        [None, None]
    } else {
        let root = discriminant.sqrt();
        let t1 = (-qb - root) / (2.0 * qa);
        let t2 = (-qb + root) / (2.0 * qa);
        [Some(t1), (t2 - t1 > f64::EPSILON).then_some(t2)]
    };
    roots
        .into_iter()
        .flatten()
        .filter(|t| (0.0..=1.0).contains(t))
}

/// Where the segment `a → b` crosses a circle, in order from `a`.
pub fn line_circle_intersections(
    center: Vector2<f64>,
    radius: f64,
    a: Vector2<f64>,
    b: Vector2<f64>,
) -> Vec<Vector2<f64>> {
    segment_circle_params(&center, radius, &a, &b)
        .map(|t| a + (b - a) * t)
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn l_path() -> Path {
        Path::from_points([
            Vector2::new(0.0, 0.0),
            Vector2::new(24.0, 0.0),
            Vector2::new(24.0, 24.0),
        ])
        .unwrap()
    }

    #[test]
    fn too_few_points() {
        assert_eq!(
            Path::from_points([Vector2::new(1.0, 1.0)]),
            Err(ConfigError::PathTooShort(1))
        );
        // Repeated points collapse.
        assert_eq!(
            Path::from_points([Vector2::new(1.0, 1.0), Vector2::new(1.0, 1.0)]),
            Err(ConfigError::PathTooShort(1))
        );
        assert_eq!(
            Path::from_hermite(&[], 10),
            Err(ConfigError::PathTooShort(0))
        );
    }

    #[test]
    fn arc_length_queries() {
        let path = l_path();
        assert_relative_eq!(path.length(), 48.0);
        assert_relative_eq!(path.point_at(30.0), Vector2::new(24.0, 6.0));
        assert_relative_eq!(path.point_at(-5.0), Vector2::new(0.0, 0.0));
        // Past the end the last segment carries on.
        assert_relative_eq!(path.point_at(50.0), Vector2::new(24.0, 26.0));
        assert_relative_eq!(path.remaining(40.0), 8.0);
        assert_relative_eq!(path.remaining(60.0), 0.0);
    }

    #[test]
    fn closest_never_goes_back() {
        let path = l_path();
        assert_relative_eq!(path.closest(&Vector2::new(10.0, 3.0), 0.0), 10.0, epsilon = 1e-9);
        assert_relative_eq!(path.closest(&Vector2::new(10.0, 3.0), 12.0), 12.0, epsilon = 1e-9);
        assert_relative_eq!(path.closest(&Vector2::new(30.0, 12.0), 0.0), 36.0, epsilon = 1e-9);
    }

    #[test]
    fn lookahead_picks_furthest_crossing() {
        let path = l_path();
        // Centred on the corner: crosses both legs, the later one wins.
        assert_relative_eq!(path.lookahead(&Vector2::new(24.0, 0.0), 6.0, 24.0), 30.0, epsilon = 1e-9);
        assert_relative_eq!(path.lookahead(&Vector2::new(5.0, 0.0), 6.0, 5.0), 11.0, epsilon = 1e-9);
        // Near the end the circle lands on the extension.
        assert_relative_eq!(path.lookahead(&Vector2::new(24.0, 22.0), 6.0, 46.0), 52.0, epsilon = 1e-9);
        // Far off the path.
        assert_relative_eq!(path.lookahead(&Vector2::new(-50.0, 50.0), 6.0, 0.0), 6.0);
    }

    #[test]
    fn hermite_hits_waypoints() {
        let path = Path::from_hermite(
            &[
                HermitePoint::from_heading(0.0, 0.0, 0.0, 30.0),
                HermitePoint::from_heading(24.0, 24.0, 90.0, 30.0),
            ],
            20,
        )
        .unwrap();
        assert_eq!(path.points().len(), 21);
        assert_relative_eq!(path.start(), Vector2::new(0.0, 0.0));
        assert_relative_eq!(path.end(), Vector2::new(24.0, 24.0));
        // Longer than the chord, shorter than the two legs.
        assert!(path.length() > 24.0 * 2.0_f64.sqrt());
        assert!(path.length() < 48.0);
        // Leaves along +x, arrives along +y.
        assert!(path.points()[1].y.abs() < path.points()[1].x);
        let n = path.points().len();
        let last = path.points()[n - 1] - path.points()[n - 2];
        assert!(last.x.abs() < last.y);
    }

    #[test]
    fn inject_keeps_shape() {
        let path = l_path().inject(5.0).unwrap();
        assert_eq!(path.points().len(), 11);
        assert_relative_eq!(path.length(), 48.0, epsilon = 1e-9);
        assert_relative_eq!(path.point_at(30.0), Vector2::new(24.0, 6.0), epsilon = 1e-9);
    }

    #[test]
    fn inject_rejects_tiny_spacing() {
        for spacing in [0.0, -1.0, 1e-9, f64::NAN] {
            assert!(matches!(l_path().inject(spacing), Err(ConfigError::Malformed(_))));
        }
    }

    #[test]
    fn smoothing_rounds_the_corner() {
        let path = l_path().inject(6.0).unwrap();
        let smoothed = path.smooth(0.1, 0.3, 1e-3).unwrap();

        assert_eq!(smoothed.points().len(), path.points().len());
        assert_relative_eq!(smoothed.start(), path.start());
        assert_relative_eq!(smoothed.end(), path.end());
        let corner = smoothed.points()[4];
        assert!(corner.x < 24.0 && corner.y > 0.0, "corner stayed at {corner:?}");
        assert!(smoothed.length() < path.length());

        assert!(matches!(path.smooth(0.1, 0.3, 0.0), Err(ConfigError::Malformed(_))));
    }

    #[test]
    fn cubic_passes_through_knots() {
        let knots = [Vector2::new(0.0, 0.0), Vector2::new(10.0, 10.0), Vector2::new(20.0, 0.0)];
        let path = Path::from_cubic(&knots, 1.0).unwrap();
        assert_eq!(path.points().len(), 21);
        assert_relative_eq!(path.points()[10], Vector2::new(10.0, 10.0), epsilon = 1e-9);
        // y(5) with the middle second derivative at -0.3.
        assert_relative_eq!(path.points()[5], Vector2::new(5.0, 6.875), epsilon = 1e-9);

        let mut backwards = knots;
        backwards.reverse();
        let reversed = Path::from_cubic(&backwards, 1.0).unwrap();
        assert_relative_eq!(reversed.start(), Vector2::new(20.0, 0.0));
        assert_relative_eq!(reversed.length(), path.length(), epsilon = 1e-9);
    }

    #[test]
    fn cubic_through_collinear_points_is_straight() {
        let path = Path::from_cubic(
            &[Vector2::new(0.0, 0.0), Vector2::new(10.0, 5.0), Vector2::new(30.0, 15.0)],
            2.0,
        )
        .unwrap();
        assert_relative_eq!(path.length(), (30.0_f64 * 30.0 + 15.0 * 15.0).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn cubic_needs_monotonic_x() {
        let knots = [Vector2::new(0.0, 0.0), Vector2::new(10.0, 10.0), Vector2::new(5.0, 0.0)];
        assert!(matches!(Path::from_cubic(&knots, 1.0), Err(ConfigError::Malformed(_))));
        assert!(matches!(
            Path::from_cubic(&knots[..2], 0.0),
            Err(ConfigError::Malformed(_))
        ));
        assert_eq!(Path::from_cubic(&knots[..1], 1.0), Err(ConfigError::PathTooShort(1)));
    }

    #[test]
    fn circle_crossings() {
        let hits = line_circle_intersections(
            Vector2::new(0.0, 0.0),
            5.0,
            Vector2::new(-10.0, 3.0),
            Vector2::new(10.0, 3.0),
        );
        assert_eq!(hits.len(), 2);
        assert_relative_eq!(hits[0], Vector2::new(-4.0, 3.0), epsilon = 1e-9);
        assert_relative_eq!(hits[1], Vector2::new(4.0, 3.0), epsilon = 1e-9);

        let vertical = line_circle_intersections(
            Vector2::new(0.0, 0.0),
            5.0,
            Vector2::new(3.0, 0.0),
            Vector2::new(3.0, 10.0),
        );
        assert_eq!(vertical.len(), 1);
        assert_relative_eq!(vertical[0], Vector2::new(3.0, 4.0), epsilon = 1e-9);

        let tangent =
            line_circle_intersections(Vector2::new(0.0, 0.0), 1.0, Vector2::new(-2.0, 1.0), Vector2::new(2.0, 1.0));
        assert_eq!(tangent.len(), 1);

        assert!(line_circle_intersections(
            Vector2::new(0.0, 0.0),
            1.0,
            Vector2::new(-2.0, 3.0),
            Vector2::new(2.0, 3.0)
        )
        .is_empty());
    }
}
