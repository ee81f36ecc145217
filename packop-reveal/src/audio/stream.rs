//! Output stream seam for the cue context
//!
//! The context only ever pauses and resumes a stream that mixes a shared
//! voice list. [`CpalBackend`] opens the real device.

use super::voice::CueVoice;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// Voices currently being mixed by a stream
pub type SharedVoices = Arc<Mutex<Vec<CueVoice>>>;

/// An open output stream
pub trait CueStream {
    fn play(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;
}

/// Opens output streams for the cue context
///
/// `open` runs on the audio thread and may take as long as the device needs.
pub trait StreamBackend: Send + Sync + 'static {
    type Stream: CueStream;

    /// Open a stream mixing `voices`, returning it with its sample rate
    fn open(&self, voices: SharedVoices) -> Result<(Self::Stream, u32)>;
}

/// cpal output device, by name or the host default
#[derive(Debug, Clone)]
pub struct CpalBackend {
    device_name: Option<String>,
    volume: f32,
}

impl CpalBackend {
    pub fn new(device_name: Option<String>, volume: f32) -> Self {
        Self {
            device_name,
            volume: volume.clamp(0.0, 1.0),
        }
    }
}

/// A cpal stream (not `Send`; stays on the audio thread)
pub struct CpalStream(Stream);

impl CueStream for CpalStream {
    fn play(&self) -> Result<()> {
        self.0
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to resume stream: {}", e)))
    }

    fn pause(&self) -> Result<()> {
        self.0
            .pause()
            .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))
    }
}

impl StreamBackend for CpalBackend {
    type Stream = CpalStream;

    fn open(&self, voices: SharedVoices) -> Result<(CpalStream, u32)> {
        let host = cpal::default_host();
        let device = select_device(&host, self.device_name.as_deref())?;

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();
        let sample_rate = config.sample_rate.0;

        debug!(
            "Cue output config: sample_rate={}, channels={}, format={:?}",
            sample_rate, config.channels, sample_format
        );

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, self.volume, voices)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, self.volume, voices)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, self.volume, voices)?,
            other => {
                return Err(Error::AudioOutput(format!("Unsupported sample format: {:?}", other)));
            }
        };

        Ok((CpalStream(stream), sample_rate))
    }
}

pub(crate) fn lock_voices(voices: &Mutex<Vec<CueVoice>>) -> MutexGuard<'_, Vec<CueVoice>> {
    voices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn select_device(host: &cpal::Host, device_name: Option<&str>) -> Result<Device> {
    if let Some(name) = device_name {
        let found = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .find(|d| d.name().ok().as_deref() == Some(name));
        match found {
            Some(device) => return Ok(device),
            None => warn!("Requested device '{}' not found, falling back to default device", name),
        }
    }

    host.default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
}

fn build_stream<T>(device: &Device, config: &StreamConfig, volume: f32, voices: SharedVoices) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut active = lock_voices(&voices);
                for frame in data.chunks_mut(channels) {
                    let mixed: f32 = active.iter_mut().filter_map(CueVoice::next_sample).sum();
                    let sample = T::from_sample((mixed * volume).clamp(-1.0, 1.0));
                    frame.iter_mut().for_each(|out| *out = sample);
                }
                active.retain(|voice| !voice.is_finished());
            },
            |err| error!("Cue stream error: {}", err),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}
