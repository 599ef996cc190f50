const MULAW_BIAS: i16 = 0x84;
const MULAW_CLIP: i16 = 32635;

/// Decode a single mu-law byte to a 16-bit linear PCM sample (ITU-T G.711).
pub fn mulaw_to_pcm(mulaw: u8) -> i16 {
    let mulaw = !mulaw;

    let sign = (mulaw & 0x80) as i16;
    let exponent = ((mulaw >> 4) & 0x07) as i16;
    let mantissa = (mulaw & 0x0F) as i16;

    let mut sample = ((mantissa << 3) + MULAW_BIAS) << exponent;
    sample -= MULAW_BIAS;

    if sign != 0 {
        -sample
    } else {
        sample
    }
}

/// Encode a 16-bit linear PCM sample to a mu-law byte.
pub fn pcm_to_mulaw(sample: i16) -> u8 {
    let sign: u8;
    let mut sample = sample;

    if sample < 0 {
        sign = 0x80;
        sample = sample.saturating_neg();
    } else {
        sign = 0;
    }

    if sample > MULAW_CLIP {
        sample = MULAW_CLIP;
    }
    sample += MULAW_BIAS;

    let exponent = compress_table((sample >> 7) as u8);
    let mantissa = ((sample >> (exponent + 3)) & 0x0F) as u8;

    !(sign | (exponent << 4) | mantissa)
}

fn compress_table(val: u8) -> u8 {
    match val {
        0..=1 => 0,
        2..=3 => 1,
        4..=7 => 2,
        8..=15 => 3,
        16..=31 => 4,
        32..=63 => 5,
        64..=127 => 6,
        _ => 7,
    }
}

/// Decode a buffer of mu-law bytes into 16-bit PCM samples.
pub fn decode_mulaw(mulaw_data: &[u8]) -> Vec<i16> {
    mulaw_data.iter().map(|&b| mulaw_to_pcm(b)).collect()
}

/// Encode 16-bit PCM samples into mu-law bytes.
pub fn encode_mulaw(pcm_data: &[i16]) -> Vec<u8> {
    pcm_data.iter().map(|&s| pcm_to_mulaw(s)).collect()
}

/// Decode a buffer of mu-law bytes directly into little-endian PCM16 bytes,
/// the wire shape canonical frames are passed around in.
pub fn decode_mulaw_to_bytes(mulaw_data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(mulaw_data.len() * 2);
    for &b in mulaw_data {
        out.extend_from_slice(&mulaw_to_pcm(b).to_le_bytes());
    }
    out
}

/// Encode little-endian PCM16 bytes into mu-law bytes. Trailing odd byte, if
/// any, is dropped.
pub fn encode_mulaw_from_bytes(pcm_bytes: &[u8]) -> Vec<u8> {
    pcm_bytes
        .chunks_exact(2)
        .map(|c| pcm_to_mulaw(i16::from_le_bytes([c[0], c[1]])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mulaw_roundtrip() {
        for original in [-32000i16, -1000, 0, 1000, 32000] {
            let encoded = pcm_to_mulaw(original);
            let decoded = mulaw_to_pcm(encoded);
            let diff = (original as f64 - decoded as f64).abs();
            assert!(
                diff < (original.unsigned_abs() as f64 * 0.05 + 100.0),
                "original={original}, decoded={decoded}, diff={diff}"
            );
        }
    }

    #[test]
    fn silence_roundtrip_is_exact_byte() {
        // 0x7F mu-law is conventional "digital silence" on telephony wires.
        let decoded = mulaw_to_pcm(0x7F);
        assert_eq!(pcm_to_mulaw(decoded), 0x7F);
    }

    #[test]
    fn byte_buffer_roundtrip_length() {
        let mulaw = vec![0x7Fu8; 160];
        let pcm_bytes = decode_mulaw_to_bytes(&mulaw);
        assert_eq!(pcm_bytes.len(), 320);
        let back = encode_mulaw_from_bytes(&pcm_bytes);
        assert_eq!(back.len(), 160);
    }

    #[test]
    fn decode_encode_symmetry() {
        let pcm: Vec<i16> = (0..50).map(|i| i * 100).collect();
        let mulaw = encode_mulaw(&pcm);
        let decoded = decode_mulaw(&mulaw);
        assert_eq!(pcm.len(), decoded.len());
    }
}
