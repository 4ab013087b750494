use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::app::Visualizer;
use crate::audio::stream::CaptureStream;
use crate::render::frame::FrameRenderer;
use crate::render::gpu::GpuContext;
use crate::render::text::TextOverlay;
use crate::view::input::{command_for_key, Command, InputEvent};
use crate::view::viewport::PointerButton;

pub struct WindowOptions {
    pub width: u32,
    pub height: u32,
    pub font: Option<PathBuf>,
    pub font_size: f32,
}

struct RenderState {
    window: Arc<Window>,
    gpu: GpuContext,
    renderer: FrameRenderer,
}

struct SpectroscopeApp<S> {
    visualizer: Visualizer<S>,
    options: WindowOptions,
    state: Option<RenderState>,
    cursor: [f32; 2],
    title: String,
    error: Option<anyhow::Error>,
}

/// Open the window and run until the user quits or capture fails.
pub fn run<S: CaptureStream>(visualizer: Visualizer<S>, options: WindowOptions) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = SpectroscopeApp {
        visualizer,
        options,
        state: None,
        cursor: [0.0, 0.0],
        title: String::new(),
        error: None,
    };
    event_loop.run_app(&mut app)?;

    if let Err(e) = app.visualizer.shutdown() {
        log::warn!("Failed to close capture stream: {}", e);
    }
    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn map_key(event: &KeyEvent) -> Option<Command> {
    match &event.logical_key {
        Key::Named(NamedKey::Escape) => Some(Command::Quit),
        Key::Named(NamedKey::Space) => Some(Command::TogglePause),
        Key::Named(NamedKey::ArrowLeft) => Some(Command::PanLeft),
        Key::Named(NamedKey::ArrowRight) => Some(Command::PanRight),
        Key::Character(text) => command_for_key(&text.to_lowercase()),
        _ => None,
    }
}

fn map_button(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Primary),
        MouseButton::Right => Some(PointerButton::Secondary),
        MouseButton::Middle => Some(PointerButton::Tertiary),
        _ => None,
    }
}

impl<S: CaptureStream> SpectroscopeApp<S> {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<RenderState> {
        let attrs = Window::default_attributes()
            .with_title("spectroscope")
            .with_inner_size(PhysicalSize::new(self.options.width, self.options.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Failed to create window")?,
        );

        let gpu = GpuContext::new(Arc::clone(&window))?;
        let text = TextOverlay::load(self.options.font.as_deref(), self.options.font_size);
        let history = self.visualizer.history();
        let renderer = FrameRenderer::new(&gpu, history.width(), history.depth(), text)?;

        let size = window.inner_size();
        self.visualizer.handle(InputEvent::Resized {
            width: size.width,
            height: size.height,
        });

        Ok(RenderState {
            window,
            gpu,
            renderer,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.visualizer.tick() {
            self.fail(event_loop, anyhow::Error::new(e).context("Audio capture failed"));
            return;
        }

        let Some(state) = self.state.as_mut() else {
            return;
        };

        let title = self.visualizer.title();
        if title != self.title {
            state.window.set_title(&title);
            self.title = title;
        }

        let scene = self.visualizer.scene();
        match state.renderer.render(&state.gpu, &scene) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = state.window.inner_size();
                state.gpu.resize(size.width, size.height);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory");
                event_loop.exit();
            }
            Err(e) => log::warn!("Dropped frame: {}", e),
        }
    }
}

impl<S: CaptureStream> ApplicationHandler for SpectroscopeApp<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        match &self.state {
            Some(state) if state.window.id() == window_id => {}
            _ => return,
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(state) = self.state.as_mut() {
                    state.gpu.resize(size.width, size.height);
                    state.renderer.resize(&state.gpu);
                }
                self.visualizer.handle(InputEvent::Resized {
                    width: size.width,
                    height: size.height,
                });
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                if let Some(command) = map_key(&event) {
                    self.visualizer.handle(InputEvent::Command(command));
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = [position.x as f32, position.y as f32];
                self.visualizer.handle(InputEvent::PointerMoved {
                    x: self.cursor[0],
                    y: self.cursor[1],
                });
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let Some(button) = map_button(button) else {
                    return;
                };
                let [x, y] = self.cursor;
                self.visualizer.handle(match state {
                    ElementState::Pressed => InputEvent::ButtonDown { button, x, y },
                    ElementState::Released => InputEvent::ButtonUp { button, x, y },
                });
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }

        if self.visualizer.should_quit() {
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_buttons() {
        assert_eq!(map_button(MouseButton::Left), Some(PointerButton::Primary));
        assert_eq!(map_button(MouseButton::Right), Some(PointerButton::Secondary));
        assert_eq!(map_button(MouseButton::Middle), Some(PointerButton::Tertiary));
        assert_eq!(map_button(MouseButton::Back), None);
    }
}
