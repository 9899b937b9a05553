//! Fifo source (§4.2): a ring-buffered producer/consumer handoff between a worker thread (the
//! "shoveller") pulling from an inner source and the write engine's consumer.
//!
//! Per §5 / §9, the ring's read/write cursors are touched by only one side each (producer writes
//! `write_pos`, consumer writes `read_pos`), so no lock is needed around the cursors themselves —
//! only the byte storage and the inner source need a `Mutex`, and both sides poll with a 50 ms
//! sleep rather than blocking on a condvar, matching the C original's `usleep` loop.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::SourceError;
use crate::source::{Source, SourceOps, SourceSize};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_RING_BYTES: usize = 1 << 30;

#[derive(Debug, Default, Clone, Copy)]
pub struct FifoCounters {
    pub in_counter: u64,
    pub put_counter: u64,
    pub empty_counter: u64,
    pub full_counter: u64,
}

struct Shared {
    inner: Mutex<Source>,
    ring: Mutex<Vec<u8>>,
    capacity: usize,
    chunksize: usize,
    read_pos: AtomicUsize,
    write_pos: AtomicUsize,
    end_of_input: AtomicBool,
    end_of_consumption: AtomicBool,
    input_error: Mutex<Option<String>>,
    in_counter: AtomicU64,
    put_counter: AtomicU64,
    empty_counter: AtomicU64,
    full_counter: AtomicU64,
}

impl Shared {
    fn occupied(&self) -> usize {
        self.write_pos.load(Ordering::Acquire) - self.read_pos.load(Ordering::Acquire)
    }

    fn free(&self) -> usize {
        self.capacity - self.occupied() - 1
    }
}

fn shoveller(shared: Arc<Shared>) {
    loop {
        if shared.end_of_consumption.load(Ordering::Acquire) {
            return;
        }

        let read_size = shared.chunksize;
        if shared.free() < read_size {
            shared.full_counter.fetch_add(1, Ordering::Relaxed);
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        let mut scratch = vec![0u8; read_size];
        let n = {
            let mut inner = shared.inner.lock().unwrap();
            match inner.read(&mut scratch) {
                Ok(n) => n,
                Err(e) => {
                    *shared.input_error.lock().unwrap() = Some(e.to_string());
                    return;
                }
            }
        };

        if n == 0 {
            shared.end_of_input.store(true, Ordering::Release);
            return;
        }

        {
            let mut ring = shared.ring.lock().unwrap();
            let widx = shared.write_pos.load(Ordering::Acquire) % shared.capacity;
            let first_len = n.min(shared.capacity - widx);
            ring[widx..widx + first_len].copy_from_slice(&scratch[..first_len]);
            if first_len < n {
                let rest = n - first_len;
                ring[..rest].copy_from_slice(&scratch[first_len..n]);
            }
        }

        shared.write_pos.fetch_add(n, Ordering::Release);
        shared.in_counter.fetch_add(n as u64, Ordering::Relaxed);
        shared.put_counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct FifoSource {
    shared: Arc<Shared>,
    started: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    fixed_size: Mutex<Option<u64>>,
    size_hint: SourceSize,
}

impl FifoSource {
    pub fn new(inner: Source, chunksize: usize, chunks: usize) -> Result<Self, SourceError> {
        if chunks < 2 {
            return Err(SourceError::FifoTooFewChunks(chunks));
        }
        let capacity = chunksize
            .checked_mul(chunks)
            .ok_or(SourceError::FifoRingTooLarge { requested: usize::MAX })?;
        if capacity > MAX_RING_BYTES {
            return Err(SourceError::FifoRingTooLarge { requested: capacity });
        }

        let size_hint = inner.get_size();

        Ok(Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                ring: Mutex::new(vec![0u8; capacity]),
                capacity,
                chunksize,
                read_pos: AtomicUsize::new(0),
                write_pos: AtomicUsize::new(0),
                end_of_input: AtomicBool::new(false),
                end_of_consumption: AtomicBool::new(false),
                input_error: Mutex::new(None),
                in_counter: AtomicU64::new(0),
                put_counter: AtomicU64::new(0),
                empty_counter: AtomicU64::new(0),
                full_counter: AtomicU64::new(0),
            }),
            started: AtomicBool::new(false),
            worker: Mutex::new(None),
            fixed_size: Mutex::new(None),
            size_hint,
        })
    }

    fn ensure_started(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("libburn-fifo".into())
            .spawn(move || shoveller(shared))
            .expect("spawning fifo worker thread");
        *self.worker.lock().unwrap() = Some(handle);
    }

    pub fn counters(&self) -> FifoCounters {
        FifoCounters {
            in_counter: self.shared.in_counter.load(Ordering::Relaxed),
            put_counter: self.shared.put_counter.load(Ordering::Relaxed),
            empty_counter: self.shared.empty_counter.load(Ordering::Relaxed),
            full_counter: self.shared.full_counter.load(Ordering::Relaxed),
        }
    }

    pub fn occupied_bytes(&self) -> usize {
        self.shared.occupied()
    }

    /// `burn_fifo_abort`: cooperative cancellation. We do not pthread-cancel the worker (there is
    /// no safe equivalent); setting this flag is the same mechanism the consumer-side cancel
    /// already uses, so the worker notices at its next loop boundary.
    pub fn abort(&self) {
        self.shared.end_of_consumption.store(true, Ordering::Release);
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize, SourceError> {
        self.ensure_started();

        loop {
            let occupied = self.shared.occupied();
            if occupied == 0 {
                if self.shared.end_of_input.load(Ordering::Acquire) {
                    return Ok(0);
                }
                if let Some(err) = self.shared.input_error.lock().unwrap().clone() {
                    return Err(SourceError::FifoInput(std::io::Error::other(err)));
                }
                self.shared.empty_counter.fetch_add(1, Ordering::Relaxed);
                thread::sleep(POLL_INTERVAL);
                continue;
            }

            let ring = self.shared.ring.lock().unwrap();
            let ridx = self.shared.read_pos.load(Ordering::Acquire) % self.shared.capacity;
            let contiguous = occupied.min(self.shared.capacity - ridx);
            let n = buf.len().min(contiguous);
            buf[..n].copy_from_slice(&ring[ridx..ridx + n]);
            drop(ring);

            self.shared.read_pos.fetch_add(n, Ordering::Release);
            return Ok(n);
        }
    }

    pub fn read_sub(&self, _buf: &mut [u8]) -> Result<usize, SourceError> {
        Ok(0)
    }

    pub fn get_size(&self) -> SourceSize {
        match *self.fixed_size.lock().unwrap() {
            Some(n) => SourceSize::Fixed(n),
            None => self.size_hint,
        }
    }

    pub fn set_size(&self, size: u64) -> bool {
        *self.fixed_size.lock().unwrap() = Some(size);
        true
    }

    pub fn cancel(&self) {
        self.abort();
    }
}

impl Drop for FifoSource {
    fn drop(&mut self) {
        self.shared.end_of_consumption.store(true, Ordering::Release);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::file::FileSource;
    use std::io::Write;

    fn shared_file(bytes: &[u8]) -> Source {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(bytes).unwrap();
        Source::File(Arc::new(Mutex::new(FileSource::open(tmp.path()).unwrap())))
    }

    #[test]
    fn rejects_too_few_chunks() {
        let inner = shared_file(b"x");
        assert!(matches!(
            FifoSource::new(inner, 1024, 1),
            Err(SourceError::FifoTooFewChunks(1))
        ));
    }

    #[test]
    fn rejects_oversized_ring() {
        let inner = shared_file(b"x");
        assert!(matches!(
            FifoSource::new(inner, 1 << 30, 2),
            Err(SourceError::FifoRingTooLarge { .. })
        ));
    }

    #[test]
    fn delivers_all_bytes_in_order_then_clean_eof() {
        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let inner = shared_file(&payload);
        let fifo = FifoSource::new(inner, 512, 4).unwrap();

        let mut out = Vec::new();
        let mut buf = [0u8; 777];
        loop {
            let n = fifo.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }

        assert_eq!(out, payload);
        assert_eq!(fifo.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn abort_stops_worker_and_read_does_not_hang_forever() {
        let inner = shared_file(&vec![0u8; 10_000]);
        let fifo = FifoSource::new(inner, 256, 4).unwrap();
        fifo.abort();
        drop(fifo);
    }
}
