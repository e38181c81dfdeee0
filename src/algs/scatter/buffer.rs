//! Buffer descriptors for the collectives.
//!
//! A send side is a [`SendBuf`], a receive side a [`RecvBuf`]. Receive buffers
//! are either fixed-capacity slices or growable vectors the engine may extend;
//! the caller keeps ownership in both cases.

use std::num::NonZeroUsize;

use bytemuck::Pod;

use crate::comm_error::ScatterError;

/// Size in bytes of one element. Must be identical on every rank of a call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElemSize(NonZeroUsize);

impl ElemSize {
    /// Zero and sizes beyond `u32::MAX` (the wire header field) are rejected.
    pub fn new(bytes: usize) -> Result<Self, ScatterError> {
        if u32::try_from(bytes).is_err() {
            return Err(ScatterError::size_mismatch("element size", u32::MAX as usize, bytes));
        }
        NonZeroUsize::new(bytes)
            .map(Self)
            .ok_or_else(|| ScatterError::size_mismatch("element size", 1, 0))
    }

    /// Element size of `T`; zero-sized types are rejected.
    pub fn of<T: Pod>() -> Result<Self, ScatterError> {
        Self::new(std::mem::size_of::<T>())
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0.get()
    }
}

/// Element geometry of one call: bytes per element on the wire and buffer
/// units (`T`s) per element. Typed calls use one unit per element; byte
/// calls use `elem_size` units of `u8`.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Layout {
    pub elem_size: ElemSize,
    pub units: usize,
}

impl Layout {
    pub fn typed<T: Pod>() -> Result<Self, ScatterError> {
        Ok(Self {
            elem_size: ElemSize::of::<T>()?,
            units: 1,
        })
    }

    pub fn bytes(elem_size: ElemSize) -> Self {
        Self {
            elem_size,
            units: elem_size.get(),
        }
    }

    /// Buffer units covered by `count` elements, `None` on overflow.
    #[inline]
    pub fn span(&self, count: usize) -> Option<usize> {
        count.checked_mul(self.units)
    }

    /// [`Layout::span`] with overflow reported against `what`.
    #[inline]
    pub fn span_of(&self, count: usize, what: &'static str) -> Result<usize, ScatterError> {
        self.span(count).ok_or_else(|| ScatterError::too_large(what, count))
    }

    /// Whole elements held by a buffer of `len` units.
    #[inline]
    pub fn elements_in(&self, len: usize) -> usize {
        len / self.units
    }
}

/// Send side of a collective.
#[derive(Debug)]
pub enum SendBuf<'a, T> {
    /// Contiguous source data.
    Data(&'a [T]),
    /// The source data already sits in this rank's receive buffer.
    InPlace,
    /// No data on this rank.
    Empty,
}

impl<T> Default for SendBuf<'_, T> {
    fn default() -> Self {
        SendBuf::Empty
    }
}

impl<'a, T> SendBuf<'a, T> {
    /// True when send and receive sides denote the same memory.
    pub fn is_in_place(&self) -> bool {
        matches!(self, SendBuf::InPlace)
    }
}

/// Receive side of a collective.
#[derive(Debug)]
pub enum RecvBuf<'a, T> {
    /// Caller-sized storage; never resized.
    Fixed(&'a mut [T]),
    /// Storage the engine may grow before writing.
    Growable(&'a mut Vec<T>),
}

impl<'a, T: Pod> RecvBuf<'a, T> {
    pub fn len(&self) -> usize {
        match self {
            RecvBuf::Fixed(s) => s.len(),
            RecvBuf::Growable(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_resizable(&self) -> bool {
        matches!(self, RecvBuf::Growable(_))
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            RecvBuf::Fixed(s) => s,
            RecvBuf::Growable(v) => v.as_slice(),
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            RecvBuf::Fixed(s) => s,
            RecvBuf::Growable(v) => v.as_mut_slice(),
        }
    }

    /// Make at least `len` units writable. Growable buffers that are too
    /// short grow to exactly `len`; longer buffers are left alone.
    pub(crate) fn ensure_len(&mut self, len: usize) -> Result<(), ScatterError> {
        let have = self.len();
        if have >= len {
            return Ok(());
        }
        match self {
            RecvBuf::Fixed(_) => Err(ScatterError::size_mismatch("receive buffer", len, have)),
            RecvBuf::Growable(v) => {
                v.try_reserve_exact(len - have)
                    .map_err(|source| ScatterError::AllocationFailure {
                        requested: len,
                        source,
                    })?;
                v.resize(len, T::zeroed());
                log::trace!("grew receive buffer from {have} to {len} units");
                Ok(())
            }
        }
    }
}

/// Sum of `counts`, with overflow reported against `what`.
pub(crate) fn total_count(counts: &[usize], what: &'static str) -> Result<usize, ScatterError> {
    counts
        .iter()
        .try_fold(0usize, |acc, &c| acc.checked_add(c))
        .ok_or_else(|| ScatterError::too_large(what, counts.len()))
}

/// Running prefix sums of `counts`: the element offset of every block.
/// Callers check [`total_count`] first, so the sums cannot overflow.
pub(crate) fn displacements(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0usize, |acc, &c| {
            let at = *acc;
            *acc += c;
            Some(at)
        })
        .collect()
}

/// Copy `span` units starting at `src_off` to the front of `buf`. Overlap
/// between the two ranges is allowed.
pub(crate) fn move_to_front<T: Pod>(buf: &mut [T], src_off: usize, span: usize) {
    if src_off != 0 && span != 0 {
        buf.copy_within(src_off..src_off + span, 0);
    }
}

/// Copy `span` units from the front of `buf` to `dst_off`. Overlap allowed.
pub(crate) fn move_from_front<T: Pod>(buf: &mut [T], dst_off: usize, span: usize) {
    if dst_off != 0 && span != 0 {
        buf.copy_within(0..span, dst_off);
    }
}
