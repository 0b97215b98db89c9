//! Real-time output to the default device using cpal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::error::{AmbientError, Result};
use crate::player::RenderHandle;

fn device_error(reason: impl ToString) -> AmbientError {
    AmbientError::Device {
        reason: reason.to_string(),
    }
}

fn default_device() -> Result<cpal::Device> {
    let host = cpal::default_host();
    info!(host = ?host.id(), "audio host");
    host.default_output_device()
        .ok_or_else(|| device_error("no audio output device found"))
}

/// Sample rate of the default output device, so the engine can match it.
pub fn default_sample_rate() -> Result<u32> {
    let config = default_device()?
        .default_output_config()
        .map_err(device_error)?;
    Ok(config.sample_rate().0)
}

/// A running output stream; audio stops when this is dropped.
pub struct DeviceOutput {
    sample_rate: u32,
    channels: u16,
    _stream: cpal::Stream,
}

impl DeviceOutput {
    pub fn open(handle: RenderHandle) -> Result<Self> {
        let device = default_device()?;
        if let Ok(name) = device.name() {
            info!(device = %name, "audio device");
        }
        let supported = device.default_output_config().map_err(device_error)?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        if (handle.sample_rate() - sample_rate as f64).abs() > f64::EPSILON {
            return Err(device_error(format!(
                "engine runs at {} Hz but the device wants {sample_rate} Hz",
                handle.sample_rate()
            )));
        }

        let config: cpal::StreamConfig = supported.config();
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, handle),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, handle),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, handle),
            other => return Err(device_error(format!("unsupported sample format {other:?}"))),
        }?;
        stream.play().map_err(device_error)?;
        info!(sample_rate, channels, "audio stream started");

        Ok(DeviceOutput {
            sample_rate,
            channels,
            _stream: stream,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    handle: RenderHandle,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut stereo: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                stereo.resize(frames * 2, 0.0);
                handle.fill(&mut stereo);
                for (frame, pair) in data.chunks_mut(channels).zip(stereo.chunks_exact(2)) {
                    write_frame(frame, pair[0], pair[1]);
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(device_error)
}

/// Map one stereo frame onto however many channels the device has.
fn write_frame<T>(frame: &mut [T], left: f32, right: f32)
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    match frame {
        [mono] => *mono = T::from_sample((left + right) * 0.5),
        [l, r, rest @ ..] => {
            *l = T::from_sample(left);
            *r = T::from_sample(right);
            for channel in rest {
                *channel = T::from_sample(0.0);
            }
        }
        [] => {}
    }
}
