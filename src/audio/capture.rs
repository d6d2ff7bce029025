//! Microphone capture backed by CPAL.
//!
//! Delivers 16-bit PCM mono at the configured sample rate regardless of
//! what the device natively produces. The requested format (i16, target
//! rate, mono) is tried first, then f32 at the same shape, then the
//! device's native config with software downmix and resampling. The
//! device is held exclusively between `start` and `stop`.

use crate::audio::source::{AudioSource, AudioSourceConfig};
use crate::audio::wav;
use crate::error::{MeetscribeError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long to wait after `play` before concluding the stream's callback
/// never fires and the native-format fallback is needed.
const CALLBACK_CHECK: Duration = Duration::from_millis(200);

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// ALSA and JACK print warnings on stderr while CPAL enumerates backends.
/// The messages are harmless but drown out our own output.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2.
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn mute_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// List the names of available input devices, marking the host default.
pub fn list_devices() -> Result<Vec<String>> {
    mute_stderr(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let devices = host
            .input_devices()
            .map_err(|e| MeetscribeError::AudioCapture {
                message: format!("Failed to enumerate input devices: {}", e),
            })?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                if default_name.as_deref() == Some(name.as_str()) {
                    names.push(format!("{} (default)", name));
                } else {
                    names.push(name);
                }
            }
        }
        Ok(names)
    })
}

fn find_device(host: &cpal::Host, name: &str) -> Result<cpal::Device> {
    let devices = host
        .input_devices()
        .map_err(|e| MeetscribeError::AudioCapture {
            message: format!("Failed to enumerate input devices: {}", e),
        })?;

    for device in devices {
        if device.name().is_ok_and(|n| n == name) {
            return Ok(device);
        }
    }

    Err(MeetscribeError::DeviceUnavailable {
        message: format!("input device not found: {}", name),
    })
}

/// Sample formats the capture path accepts from CPAL.
trait IntoI16: cpal::SizedSample {
    fn into_i16(self) -> i16;
}

impl IntoI16 for i16 {
    fn into_i16(self) -> i16 {
        self
    }
}

impl IntoI16 for f32 {
    fn into_i16(self) -> i16 {
        (self.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    }
}

/// Shared landing zone for stream callbacks.
///
/// Every stream variant converges here: converted samples are downmixed
/// to mono, resampled to the target rate, and appended for the next
/// `read_samples` drain. The delivery counter tells `start` whether the
/// callback is actually firing.
struct CallbackSink {
    samples: Mutex<Vec<i16>>,
    deliveries: AtomicU64,
}

impl CallbackSink {
    fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            deliveries: AtomicU64::new(0),
        }
    }

    fn ingest(&self, converted: Vec<i16>, channels: usize, source_rate: u32, target_rate: u32) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
        let mono = downmix(&converted, channels);
        let resampled = if source_rate == target_rate {
            mono
        } else {
            wav::resample(&mono, source_rate, target_rate)
        };
        if let Ok(mut buf) = self.samples.lock() {
            buf.extend_from_slice(&resampled);
        }
    }

    fn delivery_count(&self) -> u64 {
        self.deliveries.load(Ordering::Relaxed)
    }

    fn drain(&self) -> Vec<i16> {
        match self.samples.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(_) => Vec::new(),
        }
    }

    fn clear(&self) {
        if let Ok(mut buf) = self.samples.lock() {
            buf.clear();
        }
    }
}

/// Average interleaved channels down to mono.
fn downmix(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

fn open_stream<T: IntoI16>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: Arc<CallbackSink>,
    source_rate: u32,
    target_rate: u32,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError> {
    let channels = config.channels as usize;
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let converted: Vec<i16> = data.iter().map(|&s| s.into_i16()).collect();
            sink.ingest(converted, channels, source_rate, target_rate);
        },
        |err| eprintln!("meetscribe: audio stream error: {}", err),
        None,
    )
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only reached through `&mut self` on
/// `CpalAudioSource`, so it is never touched from two threads at once.
struct CaptureStream(cpal::Stream);

unsafe impl Send for CaptureStream {}

/// Microphone capture implementation backed by CPAL.
pub struct CpalAudioSource {
    device: cpal::Device,
    sink: Arc<CallbackSink>,
    stream: Mutex<Option<CaptureStream>>,
    sample_rate: u32,
}

impl CpalAudioSource {
    /// Create a capture source for the named device, or the host default
    /// when `device_name` is None.
    ///
    /// # Errors
    /// Returns `DeviceUnavailable` if the device cannot be found.
    pub fn new(device_name: Option<&str>, config: AudioSourceConfig) -> Result<Self> {
        let device = mute_stderr(|| {
            let host = cpal::default_host();
            match device_name {
                Some(name) => find_device(&host, name),
                None => {
                    host.default_input_device()
                        .ok_or_else(|| MeetscribeError::DeviceUnavailable {
                            message: "no default input device".to_string(),
                        })
                }
            }
        })?;

        Ok(Self {
            device,
            sink: Arc::new(CallbackSink::new()),
            stream: Mutex::new(None),
            sample_rate: config.sample_rate,
        })
    }

    /// Open a stream in the requested shape: mono at the target rate,
    /// i16 if the device takes it, f32 otherwise.
    fn open_requested(&self) -> std::result::Result<cpal::Stream, cpal::BuildStreamError> {
        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        open_stream::<i16>(
            &self.device,
            &config,
            Arc::clone(&self.sink),
            self.sample_rate,
            self.sample_rate,
        )
        .or_else(|_| {
            open_stream::<f32>(
                &self.device,
                &config,
                Arc::clone(&self.sink),
                self.sample_rate,
                self.sample_rate,
            )
        })
    }

    /// Open a stream in the device's native config; the sink downmixes
    /// and resamples to the target rate.
    fn open_native(&self) -> Result<cpal::Stream> {
        let native = self
            .device
            .default_input_config()
            .map_err(|e| MeetscribeError::AudioCapture {
                message: format!("Failed to query default input config: {}", e),
            })?;

        let native_rate = native.sample_rate().0;
        let config: cpal::StreamConfig = native.clone().into();

        let stream = match native.sample_format() {
            cpal::SampleFormat::I16 => open_stream::<i16>(
                &self.device,
                &config,
                Arc::clone(&self.sink),
                native_rate,
                self.sample_rate,
            ),
            cpal::SampleFormat::F32 => open_stream::<f32>(
                &self.device,
                &config,
                Arc::clone(&self.sink),
                native_rate,
                self.sample_rate,
            ),
            fmt => {
                return Err(MeetscribeError::DeviceUnavailable {
                    message: format!("unsupported native sample format: {:?}", fmt),
                });
            }
        };

        stream.map_err(|e| MeetscribeError::AudioCapture {
            message: format!("Failed to open native input stream: {}", e),
        })
    }

    fn slot(&mut self) -> Result<&mut Option<CaptureStream>> {
        self.stream
            .get_mut()
            .map_err(|e| MeetscribeError::AudioCapture {
                message: format!("Failed to lock stream: {}", e),
            })
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.slot()?.is_some() {
            return Ok(());
        }

        let stream = match self.open_requested() {
            Ok(stream) => stream,
            Err(_) => self.open_native()?,
        };
        stream
            .play()
            .map_err(|e| MeetscribeError::DeviceUnavailable {
                message: format!("failed to start audio stream: {}", e),
            })?;

        // Some PipeWire-ALSA setups accept the requested config but never
        // invoke the callback. Give it a moment, then rebuild on the
        // native format.
        std::thread::sleep(CALLBACK_CHECK);

        let stream = if self.sink.delivery_count() == 0 {
            drop(stream);
            self.sink.clear();

            let native = self.open_native()?;
            native
                .play()
                .map_err(|e| MeetscribeError::DeviceUnavailable {
                    message: format!("failed to start native audio stream: {}", e),
                })?;
            native
        } else {
            stream
        };

        *self.slot()? = Some(CaptureStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.slot()?.take() {
            stream
                .0
                .pause()
                .map_err(|e| MeetscribeError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
        }
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        Ok(self.sink.drain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = vec![100i16, 200, 300, 500];
        assert_eq!(downmix(&stereo, 2), vec![150, 400]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(downmix(&samples, 1), samples);
    }

    #[test]
    fn test_into_i16_conversions() {
        assert_eq!(1234i16.into_i16(), 1234);
        assert_eq!(0.0f32.into_i16(), 0);
        assert_eq!(1.0f32.into_i16(), i16::MAX);
        // Out-of-range floats clamp instead of wrapping
        assert_eq!(2.0f32.into_i16(), i16::MAX);
        assert_eq!((-2.0f32).into_i16(), -i16::MAX);
    }

    #[test]
    fn test_sink_resamples_native_rate_to_target() {
        let sink = CallbackSink::new();
        // One second of stereo 48kHz lands as one second of mono 16kHz
        sink.ingest(vec![0i16; 96000], 2, 48000, 16000);

        assert_eq!(sink.delivery_count(), 1);
        assert_eq!(sink.drain().len(), 16000);
        // Drained samples are consumed
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_sink_passthrough_at_target_rate() {
        let sink = CallbackSink::new();
        sink.ingest(vec![7i16; 160], 1, 16000, 16000);
        assert_eq!(sink.drain(), vec![7i16; 160]);
    }

    #[test]
    fn test_create_with_invalid_device_name() {
        let source = CpalAudioSource::new(
            Some("NonExistentDevice12345"),
            AudioSourceConfig::default(),
        );
        match source {
            Err(MeetscribeError::DeviceUnavailable { message }) => {
                assert!(message.contains("NonExistentDevice12345"));
            }
            Err(MeetscribeError::AudioCapture { .. }) => {
                // Enumeration itself can fail on hosts without audio
            }
            Ok(_) => panic!("Expected device lookup to fail"),
            Err(other) => panic!("Unexpected error variant: {other:?}"),
        }
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_capture_start_read_stop() {
        let mut source =
            CpalAudioSource::new(None, AudioSourceConfig::default()).expect("create source");
        source.start().expect("start");
        std::thread::sleep(Duration::from_millis(100));
        let _ = source.read_samples().expect("read");
        source.stop().expect("stop");
    }
}
