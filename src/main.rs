mod app;
mod audio;
mod cli;
mod config;
mod render;
mod spectrogram;
mod view;
mod window;

use anyhow::{bail, Context, Result};
use clap::Parser;

use app::{Settings, Visualizer};
use audio::device::{self, CaptureSpec, CpalCapture};
use audio::stream::CaptureStream;
use cli::Cli;
use config::Config;
use window::WindowOptions;

/// Smallest FFT buffer accepted on the command line
const MIN_BUFFER_SIZE: usize = 16;

fn validate_buffer_size(size: usize) -> Result<()> {
    if size < MIN_BUFFER_SIZE || !size.is_power_of_two() {
        bail!(
            "Buffer size must be a power of two of at least {} frames, got {}",
            MIN_BUFFER_SIZE,
            size
        );
    }
    Ok(())
}

fn list_devices() -> Result<()> {
    let devices = device::list_input_devices().context("Failed to enumerate capture devices")?;
    if devices.is_empty() {
        println!("No capture devices found");
        return Ok(());
    }
    println!("Capture devices:");
    for d in &devices {
        println!(
            "  {}{:<40} {} ch, {}-{} Hz",
            if d.is_default { "* " } else { "  " },
            d.name,
            d.max_channels,
            d.sample_rates.0,
            d.sample_rates.1
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();
    if cli.list_devices {
        return list_devices();
    }

    let config = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    let ramp = config
        .spectrum
        .color_ramp()
        .context("Invalid color ramp in config")?;
    let scale_factor = config.spectrum.scale_factor;
    let grid_step_hz = config.display.grid_step_hz;
    let font_size = config.display.font_size;
    let (zoom_factor, preset_scale) = (config.view.zoom_factor, config.view.preset_scale);
    cli.merge(config);

    validate_buffer_size(cli.buffer_size)?;
    if cli.history == 0 {
        bail!("History depth must be at least one row");
    }

    log::info!("spectroscope - real-time audio spectrogram");

    let capture = CpalCapture::open(&CaptureSpec {
        device: cli.device.clone(),
        sample_rate: cli.sample_rate,
        period_size: cli.period_size,
    })
    .context("Failed to open capture device")?;

    log::info!("Device: {}", capture.device_name());
    log::info!(
        "Buffer: {} frames ({} bins, {:.2} Hz/bin), history {} rows",
        cli.buffer_size,
        cli.buffer_size / 2,
        capture.sample_rate() as f64 / cli.buffer_size as f64,
        cli.history
    );

    let visualizer = Visualizer::new(
        capture,
        Settings {
            buffer_size: cli.buffer_size,
            history: cli.history,
            window: cli.window.unwrap_or_default(),
            scale_factor,
            ramp,
            width: cli.width,
            height: cli.height,
            zoom_factor,
            preset_scale,
            grid_step_hz,
        },
    );

    window::run(
        visualizer,
        WindowOptions {
            width: cli.width,
            height: cli.height,
            font: cli.font,
            font_size,
        },
    )?;

    log::info!("Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_validation() {
        assert!(validate_buffer_size(2048).is_ok());
        assert!(validate_buffer_size(16).is_ok());
        assert!(validate_buffer_size(8).is_err());
        assert!(validate_buffer_size(1000).is_err());
        assert!(validate_buffer_size(0).is_err());
    }
}
