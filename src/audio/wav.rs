//! WAV archival and sample-rate conversion.
//!
//! Sessions can optionally persist the full captured audio to a WAV file,
//! named by capture time. Resampling backs the native-format capture
//! fallback in `audio::capture`.

use crate::error::{MeetscribeError, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Write 16-bit PCM mono samples to a WAV file.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| MeetscribeError::Io(
        std::io::Error::other(format!("Failed to create WAV file: {}", e)),
    ))?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| MeetscribeError::Io(std::io::Error::other(format!(
                "Failed to write WAV sample: {}",
                e
            ))))?;
    }

    writer.finalize().map_err(|e| {
        MeetscribeError::Io(std::io::Error::other(format!(
            "Failed to finalize WAV file: {}",
            e
        )))
    })
}

/// Archive session audio under `dir` as `recording_<unix-ts>.wav`.
///
/// Returns the path of the written file.
pub fn archive_recording(dir: &Path, samples: &[i16], sample_rate: u32) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let path = dir.join(format!("recording_{}.wav", timestamp));

    write_wav(&path, samples, sample_rate)?;
    Ok(path)
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[samples.len() - 1]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resample_identity() {
        let samples = vec![1i16, 2, 3, 4];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_resample_empty() {
        assert!(resample(&[], 48000, 16000).is_empty());
    }

    #[test]
    fn test_resample_downsamples_by_ratio() {
        let samples = vec![0i16; 48000]; // 1 second at 48kHz
        let resampled = resample(&samples, 48000, 16000);
        assert_eq!(resampled.len(), 16000);
    }

    #[test]
    fn test_resample_upsamples_by_ratio() {
        let samples = vec![100i16; 8000]; // 1 second at 8kHz
        let resampled = resample(&samples, 8000, 16000);
        assert_eq!(resampled.len(), 16000);
        // Constant signal stays constant under linear interpolation
        assert!(resampled.iter().all(|&s| s == 100));
    }

    #[test]
    fn test_write_wav_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");
        let samples: Vec<i16> = (0..1600).map(|i| (i % 100) as i16).collect();

        write_wav(&path, &samples, 16000).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);

        let read_back: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read_back, samples);
    }

    #[test]
    fn test_archive_recording_creates_named_file() {
        let dir = tempdir().unwrap();
        let archive_dir = dir.path().join("archive");
        let samples = vec![42i16; 160];

        let path = archive_recording(&archive_dir, &samples, 16000).unwrap();

        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("recording_"));
        assert!(name.ends_with(".wav"));
    }
}
