use super::guides::LabelPlacement;

pub const DEFAULT_ZOOM_FACTOR: f32 = 1.5;
pub const DEFAULT_PRESET_SCALE: f32 = 4.0;
/// Zoom ceiling; past this a single bin is wider than any screen
pub const MAX_SCALE: f32 = 65536.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Tertiary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Idle,
    Panning {
        anchor_world: [f32; 2],
        anchor_offset: f32,
    },
    Marking {
        anchor_world: [f32; 2],
    },
    FrequencyQuery,
}

// screen = (world + offset) * scale, world = screen / scale - offset.
// Only X is zoomed.
#[derive(Debug, Clone)]
pub struct Viewport {
    scale: f32,
    offset: f32,
    force_overview: bool,
    width: u32,
    height: u32,
    zoom_factor: f32,
    preset_scale: f32,
    gesture: Gesture,
    pointer_screen: [f32; 2],
    pointer_world: [f32; 2],
    pub marker_label: LabelPlacement,
    pub query_label: LabelPlacement,
}

impl Viewport {
    pub fn new(width: u32, height: u32, zoom_factor: f32, preset_scale: f32) -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
            force_overview: false,
            width: width.max(1),
            height: height.max(1),
            zoom_factor: zoom_factor.max(1.0),
            preset_scale: preset_scale.clamp(1.0, MAX_SCALE),
            gesture: Gesture::Idle,
            pointer_screen: [0.0, 0.0],
            pointer_world: [0.0, 0.0],
            marker_label: LabelPlacement::default(),
            query_label: LabelPlacement::default(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn is_overview_forced(&self) -> bool {
        self.force_overview
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn pointer_world(&self) -> [f32; 2] {
        self.pointer_world
    }

    pub fn pointer_screen(&self) -> [f32; 2] {
        self.pointer_screen
    }

    /// Scale actually used for mapping
    pub fn effective_scale(&self) -> f32 {
        if self.force_overview {
            1.0
        } else {
            self.scale
        }
    }

    /// Offset actually used for mapping
    pub fn effective_offset(&self) -> f32 {
        if self.force_overview {
            0.0
        } else {
            self.offset
        }
    }

    /// Pixels covered by one world unit along X
    pub fn pixels_per_world_unit(&self) -> f32 {
        self.effective_scale() * self.width as f32 / 2.0
    }

    /// Pixel position to normalized screen coordinates, both axes in [-1, 1]
    /// with Y pointing up.
    pub fn normalize(&self, px: f32, py: f32) -> [f32; 2] {
        [
            2.0 * px / self.width as f32 - 1.0,
            1.0 - 2.0 * py / self.height as f32,
        ]
    }

    pub fn screen_to_world(&self, px: f32, py: f32) -> [f32; 2] {
        let [sx, sy] = self.normalize(px, py);
        [sx / self.effective_scale() - self.effective_offset(), sy]
    }

    /// World X to normalized screen X
    pub fn world_to_screen_x(&self, world_x: f32) -> f32 {
        (world_x + self.effective_offset()) * self.effective_scale()
    }

    pub fn world_to_pixel(&self, world: [f32; 2]) -> [f32; 2] {
        let sx = self.world_to_screen_x(world[0]);
        [
            (sx + 1.0) * self.width as f32 / 2.0,
            (1.0 - world[1]) * self.height as f32 / 2.0,
        ]
    }

    /// Visible world X range
    pub fn visible_world(&self) -> (f32, f32) {
        let scale = self.effective_scale();
        let offset = self.effective_offset();
        (-1.0 / scale - offset, 1.0 / scale - offset)
    }

    pub fn button_down(&mut self, button: PointerButton, px: f32, py: f32) {
        self.track_pointer(px, py);
        if self.gesture != Gesture::Idle {
            return;
        }
        self.gesture = match button {
            PointerButton::Secondary if self.force_overview => return,
            PointerButton::Secondary => Gesture::Panning {
                anchor_world: self.pointer_world,
                anchor_offset: self.offset,
            },
            PointerButton::Primary => Gesture::Marking {
                anchor_world: self.pointer_world,
            },
            PointerButton::Tertiary => Gesture::FrequencyQuery,
        };
    }

    pub fn button_up(&mut self, button: PointerButton, px: f32, py: f32) {
        match (button, self.gesture) {
            (PointerButton::Secondary, Gesture::Panning { .. }) => {
                self.drag_to(px, py);
                self.track_pointer(px, py);
            }
            (PointerButton::Primary, Gesture::Marking { .. })
            | (PointerButton::Tertiary, Gesture::FrequencyQuery) => {
                self.track_pointer(px, py);
            }
            _ => {
                self.track_pointer(px, py);
                return;
            }
        }
        self.gesture = Gesture::Idle;
    }

    pub fn pointer_moved(&mut self, px: f32, py: f32) {
        if let Gesture::Panning { .. } = self.gesture {
            self.drag_to(px, py);
        }
        self.track_pointer(px, py);
    }

    /// Apply `offset = anchor_offset + (world_x - anchor_world_x)`, with
    /// `world_x` measured against the offset at gesture start.
    fn drag_to(&mut self, px: f32, py: f32) {
        if let Gesture::Panning {
            anchor_world,
            anchor_offset,
            ..
        } = self.gesture
        {
            let [sx, _] = self.normalize(px, py);
            let world_x = sx / self.scale - anchor_offset;
            self.offset = anchor_offset + (world_x - anchor_world[0]);
        }
    }

    fn track_pointer(&mut self, px: f32, py: f32) {
        self.pointer_screen = self.normalize(px, py);
        self.pointer_world = self.screen_to_world(px, py);
    }

    pub fn zoom_in(&mut self) {
        self.scale = (self.scale * self.zoom_factor).min(MAX_SCALE);
    }

    pub fn zoom_out(&mut self) {
        self.scale = (self.scale / self.zoom_factor).max(1.0);
    }

    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.offset = 0.0;
    }

    pub fn toggle_overview(&mut self) {
        self.force_overview = !self.force_overview;
        if self.force_overview {
            if let Gesture::Panning { .. } = self.gesture {
                self.gesture = Gesture::Idle;
            }
        }
    }

    /// Shift the view towards lower frequencies by half a screen width.
    pub fn pan_left(&mut self) {
        self.offset += 1.0 / self.scale;
    }

    pub fn pan_right(&mut self) {
        self.offset -= 1.0 / self.scale;
    }

    /// Zoomed-in view with the lowest frequency at the left edge
    pub fn preset_zoom(&mut self) {
        self.scale = self.preset_scale;
        self.offset = 1.0 - 1.0 / self.scale;
    }
}

#[cfg(test)]
impl Viewport {
    pub(crate) fn scale(&self) -> f32 {
        self.scale
    }

    pub(crate) fn offset(&self) -> f32 {
        self.offset
    }
}
