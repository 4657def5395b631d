//! Canonical uncompressed PCM container for session recordings.
//!
//! Input is the session's ordered raw audio chunks (little-endian 16-bit
//! samples as they arrived over the socket); output is a complete WAV file
//! with the standard 44-byte header, sized from the payload.

use std::io::Cursor;

use tracing::warn;

/// Concatenates the accumulated audio chunks and wraps them as a 16-bit PCM
/// WAV file with the session's configured sample rate and channel count.
pub fn encode_wav(
    chunks: &[Vec<u8>],
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<u8>, hound::Error> {
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    let mut pcm = Vec::with_capacity(total);
    for chunk in chunks {
        pcm.extend_from_slice(chunk);
    }

    if pcm.len() % 2 != 0 {
        // A truncated final sample cannot be represented; drop the byte.
        warn!(bytes = pcm.len(), "Odd PCM byte count, dropping trailing byte");
        pcm.pop();
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut out = Vec::new();
    {
        let cursor = Cursor::new(&mut out);
        let mut writer = hound::WavWriter::new(cursor, spec)?;
        for sample in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
        }
        writer.finalize()?;
    }

    Ok(out)
}
