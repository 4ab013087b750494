use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RampError {
    #[error("Color ramp needs at least two control points, got {0}")]
    TooFewPoints(usize),

    #[error("Color ramp thresholds must strictly increase (point {0})")]
    NotIncreasing(usize),

    #[error("Color ramp must span [0, 1], got [{0}, {1}]")]
    DoesNotSpanUnit(f32, f32),

    #[error("Color component out of [0, 1] at point {0}")]
    ComponentOutOfRange(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampPoint {
    pub threshold: f32,
    pub rgb: [f32; 3],
}

impl From<[f32; 4]> for RampPoint {
    fn from([threshold, r, g, b]: [f32; 4]) -> Self {
        Self {
            threshold,
            rgb: [r, g, b],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorRamp {
    points: Vec<RampPoint>,
}

impl Default for ColorRamp {
    /// black → deep blue → purple → orange → yellow → white
    fn default() -> Self {
        Self {
            points: [
                [0.0, 0.0, 0.0, 0.0],
                [0.2, 0.0, 0.0, 0.5],
                [0.45, 0.6, 0.0, 0.6],
                [0.7, 1.0, 0.5, 0.0],
                [0.9, 1.0, 1.0, 0.0],
                [1.0, 1.0, 1.0, 1.0],
            ]
            .into_iter()
            .map(RampPoint::from)
            .collect(),
        }
    }
}

impl ColorRamp {
    pub fn new(points: Vec<RampPoint>) -> Result<Self, RampError> {
        if points.len() < 2 {
            return Err(RampError::TooFewPoints(points.len()));
        }
        for (i, pair) in points.windows(2).enumerate() {
            if !(pair[1].threshold > pair[0].threshold) {
                return Err(RampError::NotIncreasing(i + 1));
            }
        }
        for (i, p) in points.iter().enumerate() {
            if p.rgb.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return Err(RampError::ComponentOutOfRange(i));
            }
        }
        let first = points[0].threshold;
        let last = points[points.len() - 1].threshold;
        if first > 0.0 || last < 1.0 {
            return Err(RampError::DoesNotSpanUnit(first, last));
        }
        Ok(Self { points })
    }

    /// Interval `k` with `t[k] < value <= t[k+1]`; the first interval also
    /// takes `value == t[0]`.
    fn interval(&self, value: f32) -> usize {
        let last_interval = self.points.len() - 2;
        let mut k = 0;
        while k < last_interval && value > self.points[k + 1].threshold {
            k += 1;
        }
        k
    }

    /// Color components (0.0-1.0) for a magnitude in [0, 1].
    pub fn color(&self, value: f32) -> [f32; 3] {
        let k = self.interval(value);
        let lo = &self.points[k];
        let hi = &self.points[k + 1];
        let t = ((value - lo.threshold) / (hi.threshold - lo.threshold)).clamp(0.0, 1.0);

        let mut rgb = [0.0; 3];
        for (c, out) in rgb.iter_mut().enumerate() {
            *out = lo.rgb[c] * (1.0 - t) + hi.rgb[c] * t;
        }
        rgb
    }

    pub fn rgb8(&self, value: f32) -> [u8; 3] {
        self.color(value).map(|c| (c * 255.0).round() as u8)
    }
}

#[cfg(test)]
impl ColorRamp {
    pub(crate) fn points(&self) -> &[RampPoint] {
        &self.points
    }
}
