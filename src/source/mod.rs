//! Track source pipeline (§4.2): a polymorphic byte-producer abstraction feeding sector formation.
//!
//! Modeled as the Design Notes prescribe: a tagged union (enum) behind a common operation set,
//! rather than ~25 function pointers per instance. `file`/`fd` are leaves; `fifo`/`offset` compose
//! over an inner `Source` via an owned handle.

pub mod fd;
pub mod fifo;
pub mod file;
pub mod offset;

use std::sync::Arc;
use std::sync::Mutex;

use crate::error::SourceError;

/// The size hint a source can report for its own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSize {
    /// The source knows exactly how many bytes it will produce.
    Fixed(u64),
    /// The source cannot predict its size ahead of time (e.g. a pipe); only TAO with
    /// `end_on_premature_eoi`, or an explicit `default_size`, can accommodate this.
    Unpredictable,
}

impl SourceSize {
    pub fn bytes(self) -> Option<u64> {
        match self {
            Self::Fixed(n) => Some(n),
            Self::Unpredictable => None,
        }
    }
}

/// Common operation set every source variant exposes (§4.2, §9 "Variant track-source
/// polymorphism").
pub trait SourceOps {
    /// Performs a full-buffer read: loops internally until `buf` is filled or EOF/error, per the
    /// "only the last returned buffer may be short" contract. Returns the number of bytes placed
    /// into `buf` (0 at clean EOF).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError>;

    /// Reads subchannel bytes in lock-step with `read`, if this source carries one (only `file`
    /// does, via its optional `subpath`).
    fn read_sub(&mut self, _buf: &mut [u8]) -> Result<usize, SourceError> {
        Ok(0)
    }

    fn get_size(&self) -> SourceSize;

    /// Overrides the reported size. Returns `false` if this source variant does not support a
    /// size override (not an error per se — callers fall back to `default_size`/padding).
    fn set_size(&mut self, size: u64) -> bool;

    /// Cooperative cancellation hook; sources that own a background thread (fifo) use this to
    /// stop it. No-op for the rest.
    fn cancel(&mut self) {}
}

/// The tagged union every track attaches to itself. `Arc` gives the reference-counted "ownership
/// shared" semantics §3 describes for `burn_source`, with `Mutex` for the interior mutability a
/// `&self`-based `SourceOps::read` would otherwise need (the write engine is the sole consumer of
/// a given track's source, but the handle itself may be cloned by callers before the burn
/// starts).
#[derive(Clone)]
pub enum Source {
    File(Arc<Mutex<file::FileSource>>),
    Fd(Arc<Mutex<fd::FdSource>>),
    Fifo(Arc<fifo::FifoSource>),
    Offset(Arc<Mutex<offset::OffsetSource>>),
}

impl Source {
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, SourceError> {
        match self {
            Self::File(s) => s.lock().unwrap().read(buf),
            Self::Fd(s) => s.lock().unwrap().read(buf),
            Self::Fifo(s) => s.read(buf),
            Self::Offset(s) => s.lock().unwrap().read(buf),
        }
    }

    pub fn read_sub(&self, buf: &mut [u8]) -> Result<usize, SourceError> {
        match self {
            Self::File(s) => s.lock().unwrap().read_sub(buf),
            Self::Fd(s) => s.lock().unwrap().read_sub(buf),
            Self::Fifo(s) => s.read_sub(buf),
            Self::Offset(s) => s.lock().unwrap().read_sub(buf),
        }
    }

    pub fn get_size(&self) -> SourceSize {
        match self {
            Self::File(s) => s.lock().unwrap().get_size(),
            Self::Fd(s) => s.lock().unwrap().get_size(),
            Self::Fifo(s) => s.get_size(),
            Self::Offset(s) => s.lock().unwrap().get_size(),
        }
    }

    pub fn set_size(&self, size: u64) -> bool {
        match self {
            Self::File(s) => s.lock().unwrap().set_size(size),
            Self::Fd(s) => s.lock().unwrap().set_size(size),
            Self::Fifo(s) => s.set_size(size),
            Self::Offset(s) => s.lock().unwrap().set_size(size),
        }
    }

    pub fn cancel(&self) {
        match self {
            Self::File(s) => s.lock().unwrap().cancel(),
            Self::Fd(s) => s.lock().unwrap().cancel(),
            Self::Fifo(s) => s.cancel(),
            Self::Offset(s) => s.lock().unwrap().cancel(),
        }
    }
}
