use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use kernel::Device;

const MAX_STREAMS: usize = 10;

/// Device handing out independent pseudo-random byte streams.
///
/// The open string is an optional decimal seed; with a seed the stream is
/// reproducible, without one it is seeded from the host. Reads fill the
/// requested size, seeks discard bytes, writes are not supported.
pub struct RandomDevice {
    streams: Vec<Option<SmallRng>>,
}

impl RandomDevice {
    pub fn new() -> Self {
        Self {
            streams: (0..MAX_STREAMS).map(|_| None).collect(),
        }
    }
}

impl Default for RandomDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for RandomDevice {
    fn open(&mut self, name: &str) -> Option<usize> {
        let slot = self.streams.iter().position(|s| s.is_none())?;
        let rng = match name.trim().parse::<u64>() {
            Ok(seed) => SmallRng::seed_from_u64(seed),
            Err(_) => SmallRng::from_entropy(),
        };
        self.streams[slot] = Some(rng);
        Some(slot)
    }

    fn close(&mut self, id: usize) {
        if let Some(slot) = self.streams.get_mut(id) {
            *slot = None;
        }
    }

    fn read(&mut self, id: usize, size: usize) -> Vec<u8> {
        match self.streams.get_mut(id).and_then(|s| s.as_mut()) {
            Some(rng) => {
                let mut buffer = vec![0u8; size];
                rng.fill_bytes(&mut buffer);
                buffer
            }
            None => Vec::new(),
        }
    }

    fn write(&mut self, _id: usize, _data: &[u8]) -> usize {
        0
    }

    fn seek(&mut self, id: usize, position: usize) {
        // Advancing the stream is the only meaning a seek can have here.
        if let Some(rng) = self.streams.get_mut(id).and_then(|s| s.as_mut()) {
            let mut discard = vec![0u8; position];
            rng.fill_bytes(&mut discard);
        }
    }
}
