use crate::Core::clock::monotonic_ns;

/// Seed mixer for the per-producer payload generator.
const PAYLOAD_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Header carried at the front of every message large enough to hold it.
/// Both fields are little-endian on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub sequence: u64,
    pub send_timestamp_ns: u64,
}

impl EnvelopeHeader {
    pub const SIZE: usize = 16;

    /// Parse the header from the start of `payload`; `None` if it is too short.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let sequence = payload.get(0..8)?;
        let sent = payload.get(8..16)?;
        Some(Self {
            sequence: u64::from_le_bytes(sequence.try_into().ok()?),
            send_timestamp_ns: u64::from_le_bytes(sent.try_into().ok()?),
        })
    }

    /// Write the header into the first `SIZE` bytes of `buf`.
    ///
    /// # Panics
    /// If `buf` is shorter than `SIZE`.
    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.sequence.to_le_bytes());
        buf[8..16].copy_from_slice(&self.send_timestamp_ns.to_le_bytes());
    }
}

/// Builds the messages of one producer worker in a reusable buffer.
///
/// Each `build` stamps the next sequence number and the current monotonic
/// time (when the header fits) and optionally refreshes the rest of the
/// payload with pseudo-random bytes. The generator is seeded from the worker
/// index, so it only adds payload entropy and says nothing about run
/// reproducibility.
pub struct EnvelopeBuilder {
    buf: Vec<u8>,
    sequence: u64,
    rng: Option<fastrand::Rng>,
}

impl EnvelopeBuilder {
    pub fn new(message_size: usize, random_payload: bool, worker_index: usize) -> Self {
        Self {
            buf: vec![0u8; message_size],
            sequence: 0,
            rng: random_payload.then(|| fastrand::Rng::with_seed(worker_index as u64 ^ PAYLOAD_SEED)),
        }
    }

    /// Whether messages from this builder carry an `EnvelopeHeader`.
    pub fn carries_header(&self) -> bool {
        self.buf.len() >= EnvelopeHeader::SIZE
    }

    /// Sequence number the next `build` will use.
    pub fn next_sequence(&self) -> u64 {
        self.sequence
    }

    pub fn build(&mut self) -> &[u8] {
        let body_start = if self.carries_header() {
            let header = EnvelopeHeader {
                sequence: self.sequence,
                send_timestamp_ns: monotonic_ns(),
            };
            header.encode(&mut self.buf);
            self.sequence += 1;
            EnvelopeHeader::SIZE
        } else {
            0
        };

        if let Some(rng) = self.rng.as_mut() {
            rng.fill(&mut self.buf[body_start..]);
        }
        &self.buf
    }
}
