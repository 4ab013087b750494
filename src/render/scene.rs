use crate::view::guides::LabelSide;

/// Coordinate space of a stroke. World strokes go through the zoom/pan
/// transform along X; screen strokes are drawn as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    World,
    Screen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeKind {
    /// Consecutive points joined
    Strip,
    /// Points taken pairwise
    Segments,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub kind: StrokeKind,
    pub space: Space,
    pub color: [f32; 3],
    pub points: Vec<[f32; 2]>,
}

impl Stroke {
    pub fn strip(space: Space, color: [f32; 3], points: Vec<[f32; 2]>) -> Self {
        Self { kind: StrokeKind::Strip, space, color, points }
    }

    pub fn segments(space: Space, color: [f32; 3], points: Vec<[f32; 2]>) -> Self {
        Self { kind: StrokeKind::Segments, space, color, points }
    }

    /// Vertical line spanning `y0..y1` at `x`
    pub fn vertical(space: Space, color: [f32; 3], x: f32, y0: f32, y1: f32) -> Self {
        Self::segments(space, color, vec![[x, y0], [x, y1]])
    }

    /// Expand into independent line segments
    pub fn segment_pairs(&self) -> Vec<[[f32; 2]; 2]> {
        match self.kind {
            StrokeKind::Strip => self.points.windows(2).map(|w| [w[0], w[1]]).collect(),
            StrokeKind::Segments => self.points.chunks_exact(2).map(|c| [c[0], c[1]]).collect(),
        }
    }
}

/// Text anchored at a pixel position; `side` says which side of the anchor
/// the text extends to.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub pixel: [f32; 2],
    pub side: LabelSide,
    pub color: [u8; 4],
}

/// The scrolling history, sampled from circular storage.
pub struct SpectrogramQuad<'a> {
    pub pixels: &'a [u8],
    pub width: usize,
    pub depth: usize,
    pub newest_slot: usize,
    /// Bumped whenever `pixels` changed
    pub revision: u64,
    pub bottom: f32,
    pub top: f32,
}

pub struct Scene<'a> {
    pub spectrogram: SpectrogramQuad<'a>,
    pub scale: f32,
    pub offset: f32,
    pub strokes: Vec<Stroke>,
    pub labels: Vec<Label>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_pairs() {
        let strip = Stroke::strip(Space::Screen, [1.0; 3], vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]);
        assert_eq!(strip.segment_pairs().len(), 2);

        let segs = Stroke::segments(Space::World, [1.0; 3], vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]);
        assert_eq!(segs.segment_pairs(), vec![[[0.0, 0.0], [1.0, 0.0]]]);
    }
}
