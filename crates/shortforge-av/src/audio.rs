//! PCM WAV helpers: header parsing for duration and silent track synthesis.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

/// Bytes read from the start of a file when looking for the `data` chunk.
const HEADER_SCAN_BYTES: u64 = 64 * 1024;

/// Sample rate used for synthesized silence.
pub const SILENCE_SAMPLE_RATE: u32 = 44_100;

/// Channel count used for synthesized silence.
pub const SILENCE_CHANNELS: u16 = 2;

/// Duration of a RIFF/WAVE file, given its leading bytes and total length.
///
/// Returns `None` when the header is not a WAVE header or lacks a `fmt ` chunk
/// before the `data` chunk.
pub fn parse_wav_duration(header: &[u8], file_len: u64) -> Option<Duration> {
    if header.len() < 12 || &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return None;
    }

    let mut byte_rate: Option<u32> = None;
    let mut pos: usize = 12;

    while pos + 8 <= header.len() {
        let id = &header[pos..pos + 4];
        let size = u32::from_le_bytes(header[pos + 4..pos + 8].try_into().ok()?) as u64;
        let body = pos + 8;

        match id {
            b"fmt " => {
                if body + 12 > header.len() {
                    return None;
                }
                byte_rate = Some(u32::from_le_bytes(header[body + 8..body + 12].try_into().ok()?));
            }
            b"data" => {
                let rate = byte_rate.filter(|r| *r > 0)? as f64;
                let available = file_len.saturating_sub(body as u64);
                let data_len = if size == u32::MAX as u64 {
                    available
                } else {
                    size.min(available)
                };
                return Some(Duration::from_secs_f64(data_len as f64 / rate));
            }
            _ => {}
        }

        // Chunks are padded to an even length.
        pos = body.checked_add((size + (size & 1)) as usize)?;
    }

    None
}

/// Read the duration of a WAV file on disk.
pub fn wav_duration(path: &Path) -> io::Result<Option<Duration>> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut header = Vec::new();
    file.take(HEADER_SCAN_BYTES).read_to_end(&mut header)?;
    Ok(parse_wav_duration(&header, file_len))
}

/// Write a 16-bit PCM WAV file of silence lasting at least `duration`.
pub fn write_silence_wav(path: &Path, duration: Duration) -> io::Result<()> {
    let bytes_per_frame = SILENCE_CHANNELS as u32 * 2;
    let frames = (duration.as_secs_f64() * SILENCE_SAMPLE_RATE as f64).ceil() as u64;
    let data_len = frames * bytes_per_frame as u64;
    let data_len = u32::try_from(data_len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "silence too long for WAV"))?;

    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(b"RIFF")?;
    out.write_all(&(36 + data_len).to_le_bytes())?;
    out.write_all(b"WAVE")?;

    out.write_all(b"fmt ")?;
    out.write_all(&16u32.to_le_bytes())?;
    out.write_all(&1u16.to_le_bytes())?; // PCM
    out.write_all(&SILENCE_CHANNELS.to_le_bytes())?;
    out.write_all(&SILENCE_SAMPLE_RATE.to_le_bytes())?;
    out.write_all(&(SILENCE_SAMPLE_RATE * bytes_per_frame).to_le_bytes())?;
    out.write_all(&(bytes_per_frame as u16).to_le_bytes())?;
    out.write_all(&16u16.to_le_bytes())?;

    out.write_all(b"data")?;
    out.write_all(&data_len.to_le_bytes())?;

    let zeros = [0u8; 8192];
    let mut remaining = data_len as usize;
    while remaining > 0 {
        let n = remaining.min(zeros.len());
        out.write_all(&zeros[..n])?;
        remaining -= n;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_round_trips_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        write_silence_wav(&path, Duration::from_secs(15)).unwrap();

        let duration = wav_duration(&path).unwrap().unwrap();
        assert!(duration >= Duration::from_secs(15));
        assert!(duration < Duration::from_millis(15_001));
    }

    #[test]
    fn rejects_non_wav() {
        assert_eq!(parse_wav_duration(b"ID3\x04\x00\x00\x00\x00\x00\x00\x00\x00", 12), None);
        assert_eq!(parse_wav_duration(b"RIFF", 4), None);
    }

    #[test]
    fn skips_unknown_chunks() {
        // RIFF header, fmt chunk (byte rate 1000), a LIST chunk, then data.
        let mut h = Vec::new();
        h.extend_from_slice(b"RIFF\0\0\0\0WAVE");
        h.extend_from_slice(b"fmt ");
        h.extend_from_slice(&16u32.to_le_bytes());
        h.extend_from_slice(&1u16.to_le_bytes());
        h.extend_from_slice(&1u16.to_le_bytes());
        h.extend_from_slice(&1000u32.to_le_bytes());
        h.extend_from_slice(&1000u32.to_le_bytes());
        h.extend_from_slice(&1u16.to_le_bytes());
        h.extend_from_slice(&8u16.to_le_bytes());
        h.extend_from_slice(b"LIST");
        h.extend_from_slice(&3u32.to_le_bytes());
        h.extend_from_slice(b"abc\0");
        h.extend_from_slice(b"data");
        h.extend_from_slice(&2500u32.to_le_bytes());
        let file_len = h.len() as u64 + 2500;

        let d = parse_wav_duration(&h, file_len).unwrap();
        assert_eq!(d, Duration::from_millis(2500));
    }

    #[test]
    fn truncated_data_uses_file_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_silence_wav(&path, Duration::from_secs(2)).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let half = 44 + (bytes.len() - 44) / 2;
        let d = parse_wav_duration(&bytes[..64], half as u64).unwrap();
        assert!((d.as_secs_f64() - 1.0).abs() < 0.01);
    }
}
