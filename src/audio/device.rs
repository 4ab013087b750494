use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    FromSample, SampleFormat, SizedSample, Stream, StreamConfig, SupportedBufferSize,
};

use super::stream::{CaptureError, CaptureResult, CaptureStream, ReadOutcome};

/// Environment variable overriding the capture device name.
pub const DEVICE_ENV: &str = "SPECTROSCOPE_DEVICE";

#[derive(Debug, Clone)]
pub struct CaptureSpec {
    /// Device name; `None` selects the host default input
    pub device: Option<String>,
    pub sample_rate: u32,
    /// Period size hint in frames
    pub period_size: u32,
}

/// Information about an available input device
#[derive(Debug)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub max_channels: u16,
    pub sample_rates: (u32, u32),
}

#[derive(Default)]
struct CaptureFlags {
    overrun: AtomicBool,
    failure: Mutex<Option<String>>,
}

pub struct CpalCapture {
    stream: Option<Stream>,
    consumer: rtrb::Consumer<i16>,
    flags: Arc<CaptureFlags>,
    sample_rate: u32,
    device_name: String,
}

impl CpalCapture {
    /// Open the device described by `spec` and start capturing.
    pub fn open(spec: &CaptureSpec) -> CaptureResult<Self> {
        let host = cpal::default_host();
        let device = match &spec.device {
            Some(name) => find_input_device(&host, name)?,
            None => host.default_input_device().ok_or(CaptureError::NoDevices)?,
        };
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using capture device: {}", device_name);

        let (stream_config, sample_format) = negotiate_config(&device, spec)?;
        let sample_rate = stream_config.sample_rate.0;

        // One second of headroom between driver and tick thread
        let capacity = (sample_rate as usize).max(spec.period_size as usize * 4);
        let (producer, consumer) = rtrb::RingBuffer::<i16>::new(capacity);
        let flags = Arc::new(CaptureFlags::default());

        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, producer, &flags)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, producer, &flags)?,
            SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, producer, &flags)?,
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, producer, &flags)?,
            other => return Err(CaptureError::UnsupportedFormat(format!("{:?}", other))),
        };
        stream
            .play()
            .map_err(|e| CaptureError::StreamPlayError(e.to_string()))?;

        log::info!(
            "Capture started: {} Hz, {} ch -> mono, {:?}, buffer {:?}",
            sample_rate,
            stream_config.channels,
            sample_format,
            stream_config.buffer_size
        );

        Ok(Self {
            stream: Some(stream),
            consumer,
            flags,
            sample_rate,
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl CaptureStream for CpalCapture {
    fn read(&mut self, buf: &mut [i16]) -> CaptureResult<ReadOutcome> {
        if let Ok(failure) = self.flags.failure.lock() {
            if let Some(msg) = failure.as_ref() {
                return Err(CaptureError::StreamError(msg.clone()));
            }
        }
        if self.flags.overrun.load(Ordering::Acquire) {
            return Ok(ReadOutcome::Overrun);
        }

        let n = self.consumer.slots().min(buf.len());
        if n == 0 {
            return Ok(ReadOutcome::WouldBlock);
        }
        let chunk = self
            .consumer
            .read_chunk(n)
            .map_err(|e| CaptureError::StreamError(e.to_string()))?;
        let (first, second) = chunk.as_slices();
        buf[..first.len()].copy_from_slice(first);
        buf[first.len()..first.len() + second.len()].copy_from_slice(second);
        chunk.commit_all();

        Ok(ReadOutcome::Frames(n))
    }

    fn reset(&mut self) -> CaptureResult<()> {
        let pending = self.consumer.slots();
        if pending > 0 {
            if let Ok(chunk) = self.consumer.read_chunk(pending) {
                chunk.commit_all();
            }
        }
        self.flags.overrun.store(false, Ordering::Release);
        log::debug!("Capture stream reset, dropped {} frames", pending);
        Ok(())
    }

    fn close(&mut self) -> CaptureResult<()> {
        if let Some(stream) = self.stream.take() {
            stream
                .pause()
                .map_err(|e| CaptureError::StreamPlayError(e.to_string()))?;
            log::info!("Capture stream on '{}' closed", self.device_name);
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// List all input devices of the default host
pub fn list_input_devices() -> CaptureResult<Vec<InputDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok());
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::ConfigError(e.to_string()))?;

    let mut infos = Vec::new();
    for device in devices {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let configs: Vec<_> = match device.supported_input_configs() {
            Ok(configs) => configs.collect(),
            Err(e) => {
                log::debug!("Skipping '{}': {}", name, e);
                continue;
            }
        };
        let max_channels = configs.iter().map(|c| c.channels()).max().unwrap_or(0);
        let min_rate = configs.iter().map(|c| c.min_sample_rate().0).min().unwrap_or(0);
        let max_rate = configs.iter().map(|c| c.max_sample_rate().0).max().unwrap_or(0);
        infos.push(InputDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            max_channels,
            sample_rates: (min_rate, max_rate),
        });
    }
    Ok(infos)
}

fn find_input_device(host: &cpal::Host, name: &str) -> CaptureResult<cpal::Device> {
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::ConfigError(e.to_string()))?;
    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }
    Err(CaptureError::DeviceNotFound(name.to_string()))
}

/// Pick the supported configuration closest to a mono i16 stream at the
/// requested rate, then clamp rate and period size into what it supports.
fn negotiate_config(
    device: &cpal::Device,
    spec: &CaptureSpec,
) -> CaptureResult<(StreamConfig, SampleFormat)> {
    let supported: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| CaptureError::ConfigError(e.to_string()))?
        .collect();

    let best = supported
        .iter()
        .filter(|c| is_convertible(c.sample_format()))
        .min_by_key(|c| {
            let rate_miss = spec
                .sample_rate
                .clamp(c.min_sample_rate().0, c.max_sample_rate().0)
                .abs_diff(spec.sample_rate);
            let format_miss = u32::from(c.sample_format() != SampleFormat::I16);
            let channel_miss = u32::from(c.channels() != 1);
            (rate_miss, channel_miss, format_miss)
        })
        .ok_or_else(|| {
            CaptureError::ConfigError("No supported input configuration".to_string())
        })?;

    let rate = spec
        .sample_rate
        .clamp(best.min_sample_rate().0, best.max_sample_rate().0);
    if rate != spec.sample_rate {
        log::warn!(
            "Device doesn't support {} Hz, using nearest rate {} Hz",
            spec.sample_rate,
            rate
        );
    }

    let buffer_size = match best.buffer_size() {
        SupportedBufferSize::Range { min, max } => {
            cpal::BufferSize::Fixed(spec.period_size.clamp(*min, *max))
        }
        SupportedBufferSize::Unknown => cpal::BufferSize::Default,
    };

    let sample_format = best.sample_format();
    let config = StreamConfig {
        channels: best.channels(),
        sample_rate: cpal::SampleRate(rate),
        buffer_size,
    };
    Ok((config, sample_format))
}

fn is_convertible(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::I16 | SampleFormat::U16 | SampleFormat::I32 | SampleFormat::F32
    )
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: rtrb::Producer<i16>,
    flags: &Arc<CaptureFlags>,
) -> CaptureResult<Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let data_flags = Arc::clone(flags);
    let err_flags = Arc::clone(flags);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for frame in data.chunks(channels) {
                    let sum: i32 = frame.iter().map(|&s| s.to_sample::<i16>() as i32).sum();
                    let mono = (sum / frame.len() as i32) as i16;
                    if producer.push(mono).is_err() {
                        data_flags.overrun.store(true, Ordering::Release);
                    }
                }
            },
            move |err| {
                log::error!("Capture stream error: {}", err);
                if let Ok(mut failure) = err_flags.failure.lock() {
                    failure.get_or_insert_with(|| err.to_string());
                }
            },
            None,
        )
        .map_err(|e| CaptureError::StreamBuildError(e.to_string()))
}
