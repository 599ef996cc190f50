pub mod mulaw;
pub mod resample;

pub use resample::Resampler;

/// Canonical audio frame rate: 16-bit signed little-endian PCM, mono, 16 kHz.
pub const CANONICAL_SAMPLE_RATE: u32 = 16_000;

/// Interpret a little-endian PCM16 byte buffer as samples.
pub fn bytes_to_pcm(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

/// Serialize PCM16 samples as little-endian bytes.
pub fn pcm_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_byte_roundtrip() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN, 1234];
        let bytes = pcm_to_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);
        assert_eq!(bytes_to_pcm(&bytes), samples);
    }
}
