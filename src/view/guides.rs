use super::viewport::Viewport;

/// Overtone lines closer than this are not drawn
pub const OVERTONE_MIN_SPACING_PX: f32 = 5.0;
/// Undertone halvings stop once they get this close
pub const UNDERTONE_MIN_SPACING_PX: f32 = 2.0;
/// Normalized screen X past which a label flips sides
pub const LABEL_FLIP_THRESHOLD: f32 = 0.25;
/// Grid step doubles until lines are at least this far apart
pub const GRID_MIN_SPACING_PX: f32 = 40.0;

/// Guide positions in world X
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Guides {
    pub fundamental: f32,
    pub overtones: Vec<f32>,
    pub undertones: Vec<f32>,
}

/// Overtones at integer multiples and undertones at successive halvings
/// of the anchor frequency.
pub fn harmonic_guides(anchor_world_x: f32, viewport: &Viewport) -> Guides {
    let x_initial = anchor_world_x + 1.0;
    let px_per_unit = viewport.pixels_per_world_unit();
    let mut guides = Guides {
        fundamental: anchor_world_x,
        ..Default::default()
    };
    if x_initial <= 0.0 {
        return guides;
    }

    if x_initial * px_per_unit > OVERTONE_MIN_SPACING_PX {
        let mut k = 2.0;
        loop {
            let x = x_initial * k - 1.0;
            if x > 1.0 {
                break;
            }
            guides.overtones.push(x);
            k += 1.0;
        }
    }

    let mut x = x_initial;
    loop {
        let half = x / 2.0;
        let spacing = (x - half) * px_per_unit;
        // NaN or zero spacing also ends the halving
        if !(spacing > UNDERTONE_MIN_SPACING_PX) {
            break;
        }
        guides.undertones.push(half - 1.0);
        x = half;
    }

    guides
}

/// Bin under a world X position
pub fn bin_at(world_x: f32, outlen: usize) -> usize {
    let bin = (((world_x + 1.0) / 2.0) * outlen as f32).round();
    (bin.max(0.0) as usize).min(outlen.saturating_sub(1))
}

/// Center frequency of `bin` in Hz
pub fn bin_frequency(bin: usize, sample_rate: u32, fft_size: usize) -> f64 {
    bin as f64 * sample_rate as f64 / fft_size as f64
}

/// World X of the left edge of `bin`
pub fn bin_to_world(bin: f32, outlen: usize) -> f32 {
    2.0 * bin / outlen as f32 - 1.0
}

pub fn frequency_at(world_x: f32, sample_rate: u32, fft_size: usize) -> f64 {
    bin_frequency(bin_at(world_x, fft_size / 2), sample_rate, fft_size)
}

pub fn format_frequency(hz: f64) -> String {
    if hz >= 1000.0 {
        format!("{:.2} kHz", hz / 1000.0)
    } else {
        format!("{:.1} Hz", hz)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelSide {
    Left,
    #[default]
    Right,
}

/// Keeps a label on one side of its guide line until the marker clearly
/// crosses screen center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelPlacement {
    side: LabelSide,
}

impl LabelPlacement {
    pub fn update(&mut self, screen_x: f32) -> LabelSide {
        if screen_x > LABEL_FLIP_THRESHOLD {
            self.side = LabelSide::Left;
        } else if screen_x < -LABEL_FLIP_THRESHOLD {
            self.side = LabelSide::Right;
        }
        self.side
    }
}

/// Grid line world positions paired with their frequencies. The step
/// doubles until lines are far enough apart on screen.
pub fn grid_lines(
    step_hz: f64,
    sample_rate: u32,
    viewport: &Viewport,
) -> Vec<(f32, f64)> {
    let nyquist = sample_rate as f64 / 2.0;
    if step_hz <= 0.0 || nyquist <= 0.0 {
        return Vec::new();
    }

    let px_per_hz = 2.0 / nyquist * viewport.pixels_per_world_unit() as f64;
    let mut step = step_hz;
    while step * px_per_hz < GRID_MIN_SPACING_PX as f64 && step < nyquist {
        step *= 2.0;
    }

    let (lo, hi) = viewport.visible_world();
    let mut lines = Vec::new();
    let mut freq = step;
    while freq < nyquist {
        let x = (2.0 * freq / nyquist - 1.0) as f32;
        if x >= lo && x <= hi {
            lines.push((x, freq));
        }
        freq += step;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::viewport::{DEFAULT_PRESET_SCALE, DEFAULT_ZOOM_FACTOR};

    fn viewport(width: u32) -> Viewport {
        Viewport::new(width, 400, DEFAULT_ZOOM_FACTOR, DEFAULT_PRESET_SCALE)
    }

    #[test]
    fn test_overtones_are_integer_multiples() {
        let vp = viewport(1000);
        // x_initial = 0.25
        let guides = harmonic_guides(-0.75, &vp);
        assert_eq!(guides.overtones, vec![-0.5, -0.25, 0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(guides.overtones.iter().all(|&x| x <= 1.0));
    }

    #[test]
    fn test_overtones_stop_when_too_dense() {
        // x_initial = 0.005 -> 2.5 px apart at 1000 px width
        let vp = viewport(1000);
        let guides = harmonic_guides(-0.995, &vp);
        assert!(guides.overtones.is_empty());

        // Zooming in spreads them out again
        let mut zoomed = viewport(1000);
        for _ in 0..3 {
            zoomed.zoom_in();
        }
        assert!(!harmonic_guides(-0.995, &zoomed).overtones.is_empty());
    }

    #[test]
    fn test_undertones_halve_until_dense() {
        let vp = viewport(1000);
        // x_initial = 1.0, 500 px per world unit
        let guides = harmonic_guides(0.0, &vp);
        let expected: Vec<f32> = [0.5, 0.25, 0.125, 0.0625, 0.03125, 0.015625, 0.0078125]
            .iter()
            .map(|x| x - 1.0)
            .collect();
        assert_eq!(guides.undertones, expected);
        for pair in guides.undertones.windows(2) {
            assert!((pair[0] - pair[1]) * 500.0 > UNDERTONE_MIN_SPACING_PX);
        }
    }

    #[test]
    fn test_guides_terminate_at_max_zoom() {
        let mut vp = viewport(1000);
        for _ in 0..300 {
            vp.zoom_in();
        }
        let guides = harmonic_guides(-0.5, &vp);
        assert!(!guides.undertones.is_empty());
        assert!(guides.undertones.len() < 200);
    }

    #[test]
    fn test_anchor_at_left_edge_has_no_guides() {
        let guides = harmonic_guides(-1.0, &viewport(800));
        assert!(guides.overtones.is_empty());
        assert!(guides.undertones.is_empty());
    }

    #[test]
    fn test_frequency_readout_edges() {
        let (rate, size) = (44_100, 2048);
        let outlen = size / 2;
        assert_eq!(bin_at(-1.0, outlen), 0);
        assert_eq!(frequency_at(-1.0, rate, size), 0.0);
        assert_eq!(bin_at(1.0, outlen), outlen - 1);
        assert_eq!(
            frequency_at(1.0, rate, size),
            (outlen - 1) as f64 * rate as f64 / size as f64
        );
        assert_eq!(bin_at(-5.0, outlen), 0);
        assert_eq!(bin_at(0.0, outlen), 512);
    }

    #[test]
    fn test_bin_world_round_trip() {
        let outlen = 1024;
        for bin in [0usize, 1, 10, 511, 1023] {
            assert_eq!(bin_at(bin_to_world(bin as f32, outlen), outlen), bin);
        }
    }

    #[test]
    fn test_label_flips_once_across_center() {
        let mut label = LabelPlacement::default();
        let mut side = label.update(-0.3);
        let mut flips = 0;
        for i in 0..=60 {
            let x = -0.3 + i as f32 * 0.01;
            let next = label.update(x);
            if next != side {
                flips += 1;
                side = next;
            }
        }
        assert_eq!(flips, 1);
        assert_eq!(side, LabelSide::Left);

        // Jitter around center does not flip back
        for x in [0.2, -0.2, 0.1, -0.24] {
            assert_eq!(label.update(x), LabelSide::Left);
        }
        assert_eq!(label.update(-0.26), LabelSide::Right);
    }

    #[test]
    fn test_grid_spacing_and_visibility() {
        let vp = viewport(800);
        let lines = grid_lines(1000.0, 44_100, &vp);
        assert!(!lines.is_empty());
        for pair in lines.windows(2) {
            let px = (pair[1].0 - pair[0].0) * vp.pixels_per_world_unit();
            assert!(px >= GRID_MIN_SPACING_PX - 1e-3);
        }
        assert!(lines.iter().all(|&(x, _)| (-1.0..=1.0).contains(&x)));

        let mut zoomed = viewport(800);
        zoomed.preset_zoom();
        let (lo, hi) = zoomed.visible_world();
        assert!(grid_lines(1000.0, 44_100, &zoomed)
            .iter()
            .all(|&(x, _)| x >= lo && x <= hi));
    }

    #[test]
    fn test_format_frequency() {
        assert_eq!(format_frequency(215.33), "215.3 Hz");
        assert_eq!(format_frequency(4410.0), "4.41 kHz");
    }
}
