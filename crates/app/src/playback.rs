//! WAV playback through the default output device.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use lipsync_core::{AudioTransport, LipSyncError, TransportEvent, TransportFactory};

/// Plays one decoded WAV file and reports position from the samples actually
/// handed to the device, so the clock tracks what the listener hears rather
/// than wall time.
pub struct WavTransport {
    // Held for its lifetime only; dropping it stops the device callback.
    _stream: Stream,
    shared: Arc<StreamShared>,
    sample_rate: u32,
    reported_ready: bool,
    reported_ended: bool,
}

struct StreamShared {
    cursor: AtomicUsize,
    finished: AtomicBool,
    failed: AtomicBool,
}

impl WavTransport {
    /// Decodes `path` and starts playing it immediately.
    pub fn open(path: &Path) -> lipsync_core::Result<Self> {
        let (samples, sample_rate) = decode_wav(path)?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| LipSyncError::playback("no output device available"))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| LipSyncError::playback(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .or_else(|| {
                // Fallback: duplicate the mono signal into a stereo config.
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(sample_rate)
                        && c.max_sample_rate() >= SampleRate(sample_rate)
                })
            })
            .ok_or_else(|| LipSyncError::playback("no suitable output config found"))?;

        let config: StreamConfig = supported.with_sample_rate(SampleRate(sample_rate)).config();
        let channels = config.channels as usize;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels,
            samples = samples.len(),
            "audio playback initialized"
        );

        let shared = Arc::new(StreamShared {
            cursor: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        });

        let data_shared = Arc::clone(&shared);
        let error_shared = Arc::clone(&shared);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut cursor = data_shared.cursor.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = if cursor < samples.len() {
                            let sample = samples[cursor];
                            cursor += 1;
                            sample
                        } else {
                            data_shared.finished.store(true, Ordering::Relaxed);
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                    data_shared.cursor.store(cursor, Ordering::Relaxed);
                },
                move |err| {
                    tracing::error!(error = %err, "audio playback error");
                    error_shared.failed.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| LipSyncError::playback(e.to_string()))?;

        stream
            .play()
            .map_err(|e| LipSyncError::playback(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            shared,
            sample_rate,
            reported_ready: false,
            reported_ended: false,
        })
    }
}

impl AudioTransport for WavTransport {
    fn position(&self) -> f32 {
        self.shared.cursor.load(Ordering::Relaxed) as f32 / self.sample_rate as f32
    }

    fn is_playing(&self) -> bool {
        !self.shared.finished.load(Ordering::Relaxed)
            && !self.shared.failed.load(Ordering::Relaxed)
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        if self.shared.failed.load(Ordering::Relaxed) && !self.reported_ended {
            self.reported_ended = true;
            return Some(TransportEvent::Failed("output stream error".into()));
        }
        if !self.reported_ready {
            self.reported_ready = true;
            return Some(TransportEvent::Ready);
        }
        if self.shared.finished.load(Ordering::Relaxed) && !self.reported_ended {
            self.reported_ended = true;
            return Some(TransportEvent::Ended);
        }
        None
    }
}

/// Opens [`WavTransport`]s for the engine.
pub struct WavTransportFactory;

impl TransportFactory for WavTransportFactory {
    fn open(&self, audio_url: &str) -> lipsync_core::Result<Box<dyn AudioTransport>> {
        let transport = WavTransport::open(Path::new(audio_url))?;
        Ok(Box::new(transport))
    }
}

/// Reads a WAV file into mono f32 samples.
fn decode_wav(path: &Path) -> lipsync_core::Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| LipSyncError::resource(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| LipSyncError::resource(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| LipSyncError::resource(e.to_string()))?
        }
    };

    let channels = spec.channels as usize;
    let mono = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        samples
    };

    Ok((mono, spec.sample_rate))
}
