//! PCM16 conversion between device samples and the transport encoding.
//!
//! The remote service speaks little-endian signed 16-bit mono PCM wrapped in
//! standard base64, in both directions.

use base64::{engine::general_purpose, Engine as _};

use crate::error::SessionError;

/// Quantize floating-point samples to PCM16.
///
/// Samples are clamped to [-1, 1] first, so `1.0` lands on `i16::MAX` and
/// `-1.0` on `i16::MIN` without wrapping. NaN maps to silence.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = s.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            }
        })
        .collect()
}

/// Little-endian bytes of PCM16 samples, base64 encoded.
pub fn encode_pcm16(samples: &[i16]) -> String {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    general_purpose::STANDARD.encode(bytes)
}

/// Decode an inbound base64 PCM16 fragment into samples in [-1, 1).
pub fn decode_fragment(data: &str) -> Result<Vec<f32>, SessionError> {
    let bytes = general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| SessionError::Decode(format!("invalid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(SessionError::Decode("empty fragment".to_string()));
    }
    if bytes.len() % 2 != 0 {
        return Err(SessionError::Decode(format!(
            "odd byte length {} for 16-bit PCM",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect())
}

/// Length of `sample_count` mono samples in seconds.
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    sample_count as f64 / sample_rate as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_hits_the_extremes() {
        assert_eq!(quantize(&[1.0, -1.0, 0.0]), vec![i16::MAX, i16::MIN, 0]);
    }

    #[test]
    fn out_of_range_clamps() {
        assert_eq!(quantize(&[1.7, -3.2, f32::NAN]), vec![i16::MAX, i16::MIN, 0]);
    }

    #[test]
    fn decoded_fragment_keeps_sample_order() {
        let encoded = encode_pcm16(&[0, 16384, -16384, i16::MIN]);
        let decoded = decode_fragment(&encoded).unwrap();
        assert_eq!(decoded, vec![0.0, 0.5, -0.5, -1.0]);
    }

    #[test]
    fn malformed_fragments_are_decode_errors() {
        assert!(matches!(decode_fragment("%%%"), Err(SessionError::Decode(_))));
        assert!(matches!(decode_fragment(""), Err(SessionError::Decode(_))));
        // three bytes
        let odd = general_purpose::STANDARD.encode([1u8, 2, 3]);
        assert!(matches!(decode_fragment(&odd), Err(SessionError::Decode(_))));
    }

    #[test]
    fn duration_follows_sample_rate() {
        assert_eq!(duration_secs(12000, 24000), 0.5);
    }
}
