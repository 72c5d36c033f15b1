//! Fixed-size PCM audio blocks and their wire encoding
//!
//! A block holds exactly one device buffer's worth of mono i16 samples.
//! On the wire a block is `2 * frames` bytes, each sample little-endian,
//! with no header, sequence number or checksum. A datagram of any other
//! length is not a valid audio frame.

use crate::constants::BYTES_PER_SAMPLE;

/// One buffer of mono signed 16-bit samples.
///
/// Blocks live for a single pipeline iteration: captured, sent and
/// dropped, or received, played and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlock {
    samples: Vec<i16>,
}

impl AudioBlock {
    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// A block of `frames` zero samples, used as filler when no valid
    /// network data arrived in time.
    pub fn silence(frames: usize) -> Self {
        Self {
            samples: vec![0i16; frames],
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len()
    }

    pub fn is_silence(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }

    /// Number of bytes a block of `frames` samples occupies on the wire.
    pub fn wire_len(frames: usize) -> usize {
        frames * BYTES_PER_SAMPLE
    }

    /// Serialize to the wire format: each sample as two bytes, low byte first.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.samples.len() * BYTES_PER_SAMPLE);
        for sample in &self.samples {
            buf.extend_from_slice(&sample.to_le_bytes());
        }
        buf
    }

    /// Deserialize a received payload expected to carry exactly `frames`
    /// samples. Returns `None` for any other length; truncated or oversized
    /// datagrams are never partially decoded.
    pub fn from_wire(payload: &[u8], frames: usize) -> Option<Self> {
        if payload.len() != Self::wire_len(frames) {
            return None;
        }
        let samples = payload
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Some(Self { samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_little_endian_low_byte_first() {
        let mut samples = vec![1i16, -1, 32767, -32768, 0];
        samples.resize(320, 0);
        let block = AudioBlock::from_samples(samples.clone());

        let wire = block.to_wire();
        assert_eq!(wire.len(), 640);
        assert_eq!(&wire[..10], &[0x01, 0x00, 0xFF, 0xFF, 0xFF, 0x7F, 0x00, 0x80, 0x00, 0x00]);

        let decoded = AudioBlock::from_wire(&wire, 320).unwrap();
        assert_eq!(decoded.samples(), samples.as_slice());
    }

    #[test]
    fn rejects_short_payload() {
        // 638 bytes where 640 are expected: not a 319-sample decode
        let payload = vec![0xABu8; 638];
        assert!(AudioBlock::from_wire(&payload, 320).is_none());
    }

    #[test]
    fn rejects_oversized_payload() {
        let payload = vec![0u8; 642];
        assert!(AudioBlock::from_wire(&payload, 320).is_none());
    }

    #[test]
    fn silence_is_all_zero() {
        let block = AudioBlock::silence(320);
        assert_eq!(block.frames(), 320);
        assert!(block.is_silence());
        assert!(block.to_wire().iter().all(|&b| b == 0));
    }

    proptest! {
        #[test]
        fn wire_round_trip_preserves_samples(samples in prop::collection::vec(any::<i16>(), 1..2048)) {
            let frames = samples.len();
            let block = AudioBlock::from_samples(samples.clone());
            let decoded = AudioBlock::from_wire(&block.to_wire(), frames).unwrap();
            prop_assert_eq!(decoded.samples(), samples.as_slice());
        }
    }
}
