//! Audio file decoding and the Whisper mel filterbank.

use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decodes any format symphonia knows into mono f32 samples.
pub fn decode_file(path: &Path) -> Result<(Vec<f32>, u32)> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::InvalidInput(format!("Could not open audio {:?}: {}", path, e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::InvalidInput(format!("Unsupported audio {:?}: {}", path, e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::InvalidInput(format!("No audio track in {:?}", path)))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::InvalidInput(format!("Unknown sample rate in {:?}", path)))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::InvalidInput(format!("Unsupported codec in {:?}: {}", path, e)))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(Error::Execution(format!("Audio read failed: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Skipping undecodable audio packet: {}", e);
                continue;
            }
            Err(e) => return Err(Error::Execution(format!("Audio decode failed: {}", e))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        for frame in buffer.samples().chunks(channels) {
            samples.push(frame.iter().sum::<f32>() / frame.len() as f32);
        }
    }

    tracing::debug!(
        "Decoded {} samples at {} Hz from {:?}",
        samples.len(),
        sample_rate,
        path
    );
    Ok((samples, sample_rate))
}

pub fn resample_linear(audio: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if audio.is_empty() || src_rate == 0 || dst_rate == 0 || src_rate == dst_rate {
        return audio.to_vec();
    }

    let ratio = dst_rate as f64 / src_rate as f64;
    let out_len = ((audio.len() as f64) * ratio).round().max(1.0) as usize;
    let last = audio.len() - 1;

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let left = (src_pos.floor() as usize).min(last);
            let right = (left + 1).min(last);
            let frac = (src_pos - left as f64) as f32;
            audio[left] * (1.0 - frac) + audio[right] * frac
        })
        .collect()
}

/// Slaney-normalized mel filterbank, row-major `[n_mels][n_fft / 2 + 1]`.
pub fn mel_filters(n_mels: usize, n_fft: usize, sample_rate: f32) -> Vec<f32> {
    let n_freqs = n_fft / 2 + 1;
    let fft_freqs: Vec<f32> = (0..n_freqs)
        .map(|i| (sample_rate / 2.0) * i as f32 / (n_freqs - 1) as f32)
        .collect();

    let mel_max = hertz_to_mel(sample_rate / 2.0);
    let filter_freqs: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hertz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut filters = vec![0f32; n_mels * n_freqs];
    for m in 0..n_mels {
        let (lower, center, upper) = (filter_freqs[m], filter_freqs[m + 1], filter_freqs[m + 2]);
        let norm = 2.0 / (upper - lower);

        for (k, &freq) in fft_freqs.iter().enumerate() {
            let down = (freq - lower) / (center - lower);
            let up = (upper - freq) / (upper - center);
            filters[m * n_freqs + k] = down.min(up).max(0.0) * norm;
        }
    }
    filters
}

fn hertz_to_mel(freq: f32) -> f32 {
    let min_log_hertz = 1000.0;
    let min_log_mel = 15.0;
    let logstep = 27.0 / 6.4f32.ln();

    if freq < min_log_hertz {
        3.0 * freq / 200.0
    } else {
        min_log_mel + (freq / min_log_hertz).ln() * logstep
    }
}

fn mel_to_hertz(mel: f32) -> f32 {
    let min_log_hertz = 1000.0;
    let min_log_mel = 15.0;
    let logstep = 6.4f32.ln() / 27.0;

    if mel < min_log_mel {
        200.0 * mel / 3.0
    } else {
        min_log_hertz * ((mel - min_log_mel) * logstep).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_halves_length() {
        let audio: Vec<f32> = (0..32_000).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = resample_linear(&audio, 32_000, 16_000);
        assert_eq!(out.len(), 16_000);
        assert!((out[10] - audio[20]).abs() < 1e-6);
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let audio = vec![0.1, -0.2, 0.3];
        assert_eq!(resample_linear(&audio, 16_000, 16_000), audio);
    }

    #[test]
    fn mel_filters_shape_and_coverage() {
        let filters = mel_filters(80, 400, 16_000.0);
        assert_eq!(filters.len(), 80 * 201);
        assert!(filters.iter().all(|w| *w >= 0.0 && w.is_finite()));

        // Every mel band picks up some energy.
        for row in filters.chunks(201) {
            assert!(row.iter().any(|w| *w > 0.0));
        }
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0f32, 440.0, 1000.0, 4000.0, 8000.0] {
            assert!((mel_to_hertz(hertz_to_mel(hz)) - hz).abs() < 0.5);
        }
    }

    #[test]
    fn decode_missing_file_is_invalid_input() {
        assert!(matches!(
            decode_file(Path::new("/no/such/clip.wav")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn decode_wav_downmixes_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_stereo_wav(&path, 8_000, &[(1000, 3000), (-2000, 0)]);

        let (samples, rate) = decode_file(&path).unwrap();
        assert_eq!(rate, 8_000);
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 2000.0 / 32768.0).abs() < 1e-3);
        assert!((samples[1] + 1000.0 / 32768.0).abs() < 1e-3);
    }

    /// Minimal 16-bit PCM WAV writer.
    fn write_stereo_wav(path: &Path, rate: u32, frames: &[(i16, i16)]) {
        let data_len = (frames.len() * 4) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * 4).to_le_bytes());
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for (l, r) in frames {
            bytes.extend_from_slice(&l.to_le_bytes());
            bytes.extend_from_slice(&r.to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }
}
