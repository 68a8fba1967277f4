//! Trend direction and sparkline projection over a numeric series.

/// Direction of a series or of a single change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trend {
    /// Last value above the first.
    Up,
    /// Last value below the first.
    Down,
    /// No change, or not enough data to tell.
    Flat,
}

impl Trend {
    /// Compares the last value of `values` against the first.
    pub fn of(values: &[f64]) -> Self {
        match (values.first(), values.last()) {
            (Some(first), Some(last)) if values.len() >= 2 => {
                if last > first {
                    Trend::Up
                } else if last < first {
                    Trend::Down
                } else {
                    Trend::Flat
                }
            }
            _ => Trend::Flat,
        }
    }
}

/// Padding kept between the polyline and the box edges.
const PADDING: f64 = 2.0;

/// # Sparkline
///
/// A series projected into a `width` x `height` box, ready to be drawn as a
/// polyline. `y` grows downwards, like screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Sparkline {
    /// Projected `(x, y)` points, one per input value.
    pub points: Vec<(f64, f64)>,
    /// Overall direction of the series.
    pub trend: Trend,
}

impl Sparkline {
    /// Projects `values` into the box. Fewer than two values yield an empty
    /// sparkline.
    pub fn project(values: &[f64], width: f64, height: f64) -> Self {
        if values.len() < 2 {
            return Self {
                points: Vec::new(),
                trend: Trend::Flat,
            };
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // A flat series still needs a non-zero range.
        let range = if max - min == 0.0 { 1.0 } else { max - min };
        let last_index = (values.len() - 1) as f64;

        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let x = (i as f64 / last_index) * (width - 2.0 * PADDING) + PADDING;
                let y = height - PADDING - ((v - min) / range) * (height - 2.0 * PADDING);
                (x, y)
            })
            .collect();

        Self {
            points,
            trend: Trend::of(values),
        }
    }

    /// SVG-style `"x,y x,y ..."` rendering of the points.
    pub fn to_polyline(&self) -> String {
        self.points
            .iter()
            .map(|(x, y)| format!("{x:.2},{y:.2}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_compares_endpoints() {
        assert_eq!(Trend::of(&[1.0, 5.0, 2.0]), Trend::Up);
        assert_eq!(Trend::of(&[3.0, 5.0, 2.0]), Trend::Down);
        assert_eq!(Trend::of(&[2.0, 5.0, 2.0]), Trend::Flat);
        assert_eq!(Trend::of(&[2.0]), Trend::Flat);
        assert_eq!(Trend::of(&[]), Trend::Flat);
    }

    #[test]
    fn projection_fits_the_box() {
        let line = Sparkline::project(&[10.0, 20.0, 15.0], 60.0, 24.0);
        assert_eq!(line.points.len(), 3);
        assert_eq!(line.points[0], (2.0, 22.0));
        assert_eq!(line.points[1], (30.0, 2.0));
        assert_eq!(line.points[2], (58.0, 12.0));
        assert_eq!(line.trend, Trend::Up);
        assert_eq!(line.to_polyline(), "2.00,22.00 30.00,2.00 58.00,12.00");
    }

    #[test]
    fn flat_and_short_series() {
        let flat = Sparkline::project(&[7.0, 7.0], 10.0, 10.0);
        assert_eq!(flat.points, vec![(2.0, 8.0), (8.0, 8.0)]);
        assert!(Sparkline::project(&[1.0], 10.0, 10.0).points.is_empty());
    }
}
