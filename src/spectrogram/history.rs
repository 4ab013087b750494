use super::ramp::ColorRamp;
use crate::audio::analysis::SpectrumLine;

pub const BYTES_PER_PIXEL: usize = 3;

// Row `age` sits at slot `(cursor + age) % depth`; each push moves the
// cursor back one slot.
pub struct SpectrogramHistory {
    width: usize,
    depth: usize,
    pixels: Vec<u8>,
    cursor: usize,
}

impl SpectrogramHistory {
    pub fn new(width: usize, depth: usize) -> Self {
        assert!(width > 0 && depth > 0, "history needs at least one bin and one row");
        Self {
            width,
            depth,
            pixels: vec![0; width * depth * BYTES_PER_PIXEL],
            cursor: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Arena slot holding the newest row
    pub fn newest_slot(&self) -> usize {
        self.cursor
    }

    /// Raw circular storage, `depth` rows of `width` RGB triples.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Evict the oldest row and encode `line` as the newest one.
    pub fn push_line(&mut self, line: &SpectrumLine, ramp: &ColorRamp) {
        self.cursor = (self.cursor + self.depth - 1) % self.depth;
        let stride = self.width * BYTES_PER_PIXEL;
        let start = self.cursor * stride;
        let row = &mut self.pixels[start..start + stride];

        for (i, px) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let value = line.bins().get(i).copied().unwrap_or(0.0);
            px.copy_from_slice(&ramp.rgb8(value));
        }
    }
}

#[cfg(test)]
impl SpectrogramHistory {
    /// Row by age: 0 is the newest, `depth - 1` the oldest.
    pub(crate) fn row(&self, age: usize) -> &[u8] {
        let slot = (self.cursor + age % self.depth) % self.depth;
        let stride = self.width * BYTES_PER_PIXEL;
        &self.pixels[slot * stride..(slot + 1) * stride]
    }

    /// Rows newest first
    pub(crate) fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.depth).map(move |age| self.row(age))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: usize, value: f32) -> SpectrumLine {
        SpectrumLine::from_bins(vec![value; width])
    }

    #[test]
    fn test_byte_size_is_constant() {
        let mut history = SpectrogramHistory::new(8, 4);
        let ramp = ColorRamp::default();
        assert_eq!(history.as_bytes().len(), 8 * 4 * 3);
        for i in 0..10 {
            history.push_line(&flat(8, i as f32 / 10.0), &ramp);
            assert_eq!(history.as_bytes().len(), 8 * 4 * 3);
        }
    }

    #[test]
    fn test_push_writes_ramp_colors() {
        let ramp = ColorRamp::default();
        let mut history = SpectrogramHistory::new(3, 2);
        history.push_line(&SpectrumLine::from_bins(vec![0.0, 0.5, 1.0]), &ramp);

        let row = history.row(0);
        assert_eq!(&row[0..3], &ramp.rgb8(0.0));
        assert_eq!(&row[3..6], &ramp.rgb8(0.5));
        assert_eq!(&row[6..9], &ramp.rgb8(1.0));
    }

    #[test]
    fn test_eviction_and_chronological_order() {
        let depth = 5;
        // Two-point ramp gives a distinct red byte per pushed value
        let ramp = ColorRamp::new(vec![
            [0.0, 0.0, 0.0, 0.0].into(),
            [1.0, 1.0, 1.0, 1.0].into(),
        ])
        .unwrap();
        let mut history = SpectrogramHistory::new(2, depth);
        let value = |i: usize| (i + 1) as f32 / 10.0;

        for i in 0..depth {
            history.push_line(&flat(2, value(i)), &ramp);
        }
        // Oldest row is the first push
        assert_eq!(history.row(depth - 1)[0], ramp.rgb8(value(0))[0]);

        history.push_line(&flat(2, value(depth)), &ramp);
        let reds: Vec<u8> = history.rows().map(|r| r[0]).collect();
        let expected: Vec<u8> = (1..=depth).rev().map(|i| ramp.rgb8(value(i))[0]).collect();
        assert_eq!(reds, expected);
        assert!(!reds.contains(&ramp.rgb8(value(0))[0]));
    }

    #[test]
    fn test_cursor_wraps() {
        let ramp = ColorRamp::default();
        let mut history = SpectrogramHistory::new(1, 3);
        assert_eq!(history.newest_slot(), 0);
        history.push_line(&flat(1, 0.1), &ramp);
        assert_eq!(history.newest_slot(), 2);
        history.push_line(&flat(1, 0.1), &ramp);
        history.push_line(&flat(1, 0.1), &ramp);
        assert_eq!(history.newest_slot(), 0);
        history.push_line(&flat(1, 0.1), &ramp);
        assert_eq!(history.newest_slot(), 2);
        assert_eq!(history.row(3), history.row(0));
    }

    #[test]
    fn test_short_line_pads_with_silence() {
        let ramp = ColorRamp::default();
        let mut history = SpectrogramHistory::new(4, 1);
        history.push_line(&SpectrumLine::from_bins(vec![1.0]), &ramp);
        assert_eq!(&history.row(0)[3..], &[0; 9]);
    }
}
