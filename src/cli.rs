use clap::Parser;
use std::path::PathBuf;

use crate::audio::analysis::WindowKind;
use crate::audio::device::DEVICE_ENV;
use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "spectroscope", about = "Real-time audio spectrogram viewer")]
pub struct Cli {
    /// Capture device name (default: system default input)
    #[arg(short, long, env = DEVICE_ENV)]
    pub device: Option<String>,

    /// Requested sample rate in Hz (nearest supported rate is used)
    #[arg(short = 'r', long, default_value_t = 44_100)]
    pub sample_rate: u32,

    /// FFT buffer size in frames (power of two)
    #[arg(short = 'n', long, default_value_t = 2048)]
    pub buffer_size: usize,

    /// Device period size hint in frames
    #[arg(long, default_value_t = 1024)]
    pub period_size: u32,

    /// Spectrogram history depth in rows
    #[arg(long, default_value_t = 512)]
    pub history: usize,

    /// Initial window width in pixels
    #[arg(long, default_value_t = 1024)]
    pub width: u32,

    /// Initial window height in pixels
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Analysis window
    #[arg(long, value_enum)]
    pub window: Option<WindowKind>,

    /// TTF font for frequency labels
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Config file (default: ./spectroscope.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// List capture devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Cli {
    /// Config values apply only where the command line kept its default.
    pub fn merge(&mut self, cfg: Config) {
        if self.device.is_none() { self.device = cfg.audio.device; }
        if self.sample_rate == 44_100 { self.sample_rate = cfg.audio.sample_rate; }
        if self.buffer_size == 2048 { self.buffer_size = cfg.audio.buffer_size; }
        if self.period_size == 1024 { self.period_size = cfg.audio.period_size; }
        if self.history == 512 { self.history = cfg.display.history; }
        if self.width == 1024 { self.width = cfg.display.width; }
        if self.height == 600 { self.height = cfg.display.height; }
        if self.window.is_none() { self.window = Some(cfg.spectrum.window); }
        if self.font.is_none() { self.font = cfg.display.font; }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_beats_config() {
        let mut cli = Cli::parse_from(["spectroscope", "--buffer-size", "4096", "--window", "hann"]);
        let mut cfg = Config::default();
        cfg.audio.buffer_size = 1024;
        cfg.audio.sample_rate = 48_000;
        cfg.display.history = 256;
        cli.merge(cfg);

        assert_eq!(cli.buffer_size, 4096);
        assert_eq!(cli.sample_rate, 48_000);
        assert_eq!(cli.history, 256);
        assert_eq!(cli.window, Some(WindowKind::Hann));
    }
}
