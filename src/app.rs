use crate::audio::analysis::{SpectralTransform, SpectrumLine, WindowKind};
use crate::audio::capture::CaptureBuffer;
use crate::audio::stream::{CaptureResult, CaptureStream};
use crate::render::scene::{Label, Scene, Space, SpectrogramQuad, Stroke};
use crate::spectrogram::history::SpectrogramHistory;
use crate::spectrogram::ramp::ColorRamp;
use crate::view::guides::{self, LabelSide};
use crate::view::input::{Command, InputEvent};
use crate::view::viewport::{Gesture, Viewport};

/// Boundary between spectrogram (above) and spectrum panel (below)
pub const DIVIDER_Y: f32 = -0.5;

const SPECTRUM_COLOR: [f32; 3] = [0.3, 1.0, 0.4];
const WAVEFORM_COLOR: [f32; 3] = [0.4, 0.8, 1.0];
const FRAME_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
const GRID_COLOR: [f32; 3] = [0.35, 0.35, 0.35];
const FUNDAMENTAL_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
const OVERTONE_COLOR: [f32; 3] = [1.0, 0.6, 0.2];
const UNDERTONE_COLOR: [f32; 3] = [0.4, 0.6, 1.0];
const QUERY_COLOR: [f32; 3] = [1.0, 1.0, 0.0];
const TEXT_COLOR: [u8; 4] = [255, 255, 255, 230];
const GRID_TEXT_COLOR: [u8; 4] = [160, 160, 160, 200];
const LABEL_MARGIN_PX: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Spectrum,
    Waveform,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub buffer_size: usize,
    pub history: usize,
    pub window: WindowKind,
    pub scale_factor: f32,
    pub ramp: ColorRamp,
    pub width: u32,
    pub height: u32,
    pub zoom_factor: f32,
    pub preset_scale: f32,
    pub grid_step_hz: f64,
}

pub struct Visualizer<S> {
    capture: CaptureBuffer<S>,
    transform: SpectralTransform,
    spectrum: SpectrumLine,
    history: SpectrogramHistory,
    ramp: ColorRamp,
    viewport: Viewport,
    grid_step_hz: f64,
    mode: DisplayMode,
    paused: bool,
    show_grid: bool,
    quit: bool,
    revision: u64,
}

impl<S: CaptureStream> Visualizer<S> {
    pub fn new(stream: S, settings: Settings) -> Self {
        let transform =
            SpectralTransform::new(settings.buffer_size, settings.window, settings.scale_factor);
        let outlen = transform.output_len();

        Self {
            capture: CaptureBuffer::new(stream, settings.buffer_size),
            transform,
            spectrum: SpectrumLine::silent(outlen),
            history: SpectrogramHistory::new(outlen, settings.history),
            ramp: settings.ramp,
            viewport: Viewport::new(
                settings.width,
                settings.height,
                settings.zoom_factor,
                settings.preset_scale,
            ),
            grid_step_hz: settings.grid_step_hz,
            mode: DisplayMode::Spectrum,
            paused: false,
            show_grid: false,
            quit: false,
            revision: 0,
        }
    }

    pub fn history(&self) -> &SpectrogramHistory {
        &self.history
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn sample_rate(&self) -> u32 {
        self.capture.sample_rate()
    }

    /// Read what the device has and, when a buffer completed, push a new
    /// spectrum. Returns whether the history changed.
    pub fn tick(&mut self) -> CaptureResult<bool> {
        if self.paused {
            return Ok(false);
        }
        self.capture.read_non_blocking()?;
        if let Some(samples) = self.capture.take_ready() {
            self.transform.process(samples, &mut self.spectrum);
            self.history.push_line(&self.spectrum, &self.ramp);
            self.revision += 1;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::Command(command) => self.run_command(command),
            InputEvent::ButtonDown { button, x, y } => self.viewport.button_down(button, x, y),
            InputEvent::ButtonUp { button, x, y } => self.viewport.button_up(button, x, y),
            InputEvent::PointerMoved { x, y } => self.viewport.pointer_moved(x, y),
            InputEvent::Resized { width, height } => self.viewport.resize(width, height),
        }
    }

    fn run_command(&mut self, command: Command) {
        log::debug!("Command: {:?}", command);
        match command {
            Command::TogglePause => {
                self.paused = !self.paused;
                if !self.paused {
                    self.capture.request_reset();
                }
                log::info!("Capture {}", if self.paused { "paused" } else { "resumed" });
            }
            Command::ResetView => self.viewport.reset(),
            Command::ToggleOverview => self.viewport.toggle_overview(),
            Command::ZoomIn => self.viewport.zoom_in(),
            Command::ZoomOut => self.viewport.zoom_out(),
            Command::PanLeft => self.viewport.pan_left(),
            Command::PanRight => self.viewport.pan_right(),
            Command::PresetZoom => self.viewport.preset_zoom(),
            Command::ToggleGrid => self.show_grid = !self.show_grid,
            Command::ToggleWaveform => {
                self.mode = match self.mode {
                    DisplayMode::Spectrum => DisplayMode::Waveform,
                    DisplayMode::Waveform => DisplayMode::Spectrum,
                }
            }
            Command::Quit => self.quit = true,
        }
    }

    pub fn shutdown(&mut self) -> CaptureResult<()> {
        self.capture.close()
    }

    pub fn title(&self) -> String {
        let mut title = format!(
            "spectroscope - {} Hz, {} bins",
            self.sample_rate(),
            self.transform.output_len()
        );
        if self.viewport.effective_scale() > 1.0 {
            title.push_str(&format!(", zoom {:.1}x", self.viewport.effective_scale()));
        }
        title
    }

    pub fn scene(&mut self) -> Scene<'_> {
        let mut strokes = Vec::new();
        let mut labels = Vec::new();

        if self.show_grid {
            self.grid(&mut strokes, &mut labels);
        }
        strokes.push(self.lower_panel());
        strokes.push(Stroke::segments(
            Space::Screen,
            FRAME_COLOR,
            vec![[-1.0, DIVIDER_Y], [1.0, DIVIDER_Y]],
        ));
        strokes.push(Stroke::strip(
            Space::Screen,
            FRAME_COLOR,
            vec![
                [-0.999, -0.999],
                [0.999, -0.999],
                [0.999, 0.999],
                [-0.999, 0.999],
                [-0.999, -0.999],
            ],
        ));
        self.marker_overlays(&mut strokes, &mut labels);

        let mut status = Vec::new();
        if self.paused {
            status.push("PAUSED");
        }
        if self.viewport.is_overview_forced() {
            status.push("OVERVIEW");
        }
        if !status.is_empty() {
            labels.push(Label {
                text: status.join("  "),
                pixel: [LABEL_MARGIN_PX, LABEL_MARGIN_PX],
                side: LabelSide::Right,
                color: TEXT_COLOR,
            });
        }

        Scene {
            spectrogram: SpectrogramQuad {
                pixels: self.history.as_bytes(),
                width: self.history.width(),
                depth: self.history.depth(),
                newest_slot: self.history.newest_slot(),
                revision: self.revision,
                bottom: DIVIDER_Y,
                top: 1.0,
            },
            scale: self.viewport.effective_scale(),
            offset: self.viewport.effective_offset(),
            strokes,
            labels,
        }
    }

    fn lower_panel(&self) -> Stroke {
        match self.mode {
            DisplayMode::Spectrum => {
                let outlen = self.spectrum.len();
                let points = self
                    .spectrum
                    .bins()
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| [guides::bin_to_world(i as f32, outlen), v / 2.0 - 1.0])
                    .collect();
                Stroke::strip(Space::World, SPECTRUM_COLOR, points)
            }
            DisplayMode::Waveform => {
                let samples = self.capture.last_complete();
                let len = samples.len().max(1) as f32;
                let center = (DIVIDER_Y - 1.0) / 2.0;
                let amplitude = (DIVIDER_Y + 1.0) / 2.0;
                let points = samples
                    .iter()
                    .enumerate()
                    .map(|(i, &s)| {
                        [2.0 * i as f32 / len - 1.0, center + s as f32 / 32768.0 * amplitude]
                    })
                    .collect();
                Stroke::strip(Space::Screen, WAVEFORM_COLOR, points)
            }
        }
    }

    fn grid(&self, strokes: &mut Vec<Stroke>, labels: &mut Vec<Label>) {
        let lines = guides::grid_lines(self.grid_step_hz, self.sample_rate(), &self.viewport);
        let mut points = Vec::with_capacity(lines.len() * 2 + 6);
        for &(x, freq) in &lines {
            points.push([x, -1.0]);
            points.push([x, 1.0]);
            let [px, _] = self.viewport.world_to_pixel([x, 1.0]);
            labels.push(Label {
                text: guides::format_frequency(freq),
                pixel: [px + 2.0, LABEL_MARGIN_PX],
                side: LabelSide::Right,
                color: GRID_TEXT_COLOR,
            });
        }
        strokes.push(Stroke::segments(Space::World, GRID_COLOR, points));

        let mut levels = Vec::new();
        for level in [0.25f32, 0.5, 0.75] {
            let y = level / 2.0 - 1.0;
            levels.push([-1.0, y]);
            levels.push([1.0, y]);
        }
        strokes.push(Stroke::segments(Space::Screen, GRID_COLOR, levels));
    }

    fn marker_overlays(&mut self, strokes: &mut Vec<Stroke>, labels: &mut Vec<Label>) {
        let rate = self.sample_rate();
        let size = self.transform.size();

        match self.viewport.gesture() {
            Gesture::Marking { anchor_world } => {
                let found = guides::harmonic_guides(anchor_world[0], &self.viewport);
                let vertical = |xs: &[f32]| {
                    xs.iter()
                        .flat_map(|&x| [[x, -1.0], [x, 1.0]])
                        .collect::<Vec<_>>()
                };
                strokes.push(Stroke::segments(Space::World, UNDERTONE_COLOR, vertical(&found.undertones)));
                strokes.push(Stroke::segments(Space::World, OVERTONE_COLOR, vertical(&found.overtones)));
                strokes.push(Stroke::vertical(Space::World, FUNDAMENTAL_COLOR, found.fundamental, -1.0, 1.0));

                let screen_x = self.viewport.world_to_screen_x(anchor_world[0]);
                let side = self.viewport.marker_label.update(screen_x);
                labels.push(self.frequency_label(anchor_world, side, rate, size));
            }
            Gesture::FrequencyQuery => {
                let pointer = self.viewport.pointer_world();
                strokes.push(Stroke::vertical(Space::World, QUERY_COLOR, pointer[0], -1.0, 1.0));

                let screen_x = self.viewport.pointer_screen()[0];
                let side = self.viewport.query_label.update(screen_x);
                labels.push(self.frequency_label(pointer, side, rate, size));
            }
            Gesture::Idle | Gesture::Panning { .. } => {}
        }
    }

    fn frequency_label(&self, world: [f32; 2], side: LabelSide, rate: u32, size: usize) -> Label {
        let hz = guides::frequency_at(world[0], rate, size);
        let [px, py] = self.viewport.world_to_pixel(world);
        let dx = match side {
            LabelSide::Right => LABEL_MARGIN_PX,
            LabelSide::Left => -LABEL_MARGIN_PX,
        };
        Label {
            text: guides::format_frequency(hz),
            pixel: [px + dx, py],
            side,
            color: TEXT_COLOR,
        }
    }
}

#[cfg(test)]
impl<S> Visualizer<S> {
    pub(crate) fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub(crate) fn spectrum(&self) -> &SpectrumLine {
        &self.spectrum
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }
}
