use super::viewport::PointerButton;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TogglePause,
    ResetView,
    ToggleOverview,
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
    PresetZoom,
    ToggleGrid,
    ToggleWaveform,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Command(Command),
    ButtonDown { button: PointerButton, x: f32, y: f32 },
    ButtonUp { button: PointerButton, x: f32, y: f32 },
    PointerMoved { x: f32, y: f32 },
    Resized { width: u32, height: u32 },
}

/// Single-character key bindings
pub fn command_for_key(key: &str) -> Option<Command> {
    let command = match key {
        " " => Command::TogglePause,
        "r" => Command::ResetView,
        "o" => Command::ToggleOverview,
        "+" | "=" => Command::ZoomIn,
        "-" => Command::ZoomOut,
        "h" => Command::PanLeft,
        "l" => Command::PanRight,
        "p" => Command::PresetZoom,
        "g" => Command::ToggleGrid,
        "w" => Command::ToggleWaveform,
        "q" => Command::Quit,
        _ => return None,
    };
    Some(command)
}
