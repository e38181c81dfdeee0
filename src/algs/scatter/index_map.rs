//! Index maps: placement permutations for mapped collectives.
//!
//! A map does not change which rank gets which data or how much of it; it only
//! decides *where* an element is read from (send side) or written to (receive
//! side). Every map must be injective and stay inside its buffer.

use crate::comm_error::ScatterError;

/// Borrowed list of element slots. Entry `i` is the buffer slot of logical
/// element `i`.
#[derive(Copy, Clone, Debug)]
pub struct IndexMap<'a> {
    slots: &'a [usize],
}

impl<'a> IndexMap<'a> {
    pub fn new(slots: &'a [usize]) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &'a [usize] {
        self.slots
    }

    /// One past the largest slot, i.e. the smallest buffer this map fits.
    pub fn extent(&self) -> usize {
        self.slots.iter().max().map_or(0, |&m| m.saturating_add(1))
    }

    /// Check that the map has `len` entries, is injective and fits a buffer
    /// of `bound` elements.
    pub fn validate(&self, len: usize, bound: usize) -> Result<(), ScatterError> {
        if self.slots.len() != len {
            return Err(ScatterError::InvalidIndexMap(format!(
                "map has {} entries for {len} elements",
                self.slots.len()
            )));
        }
        if let Some((i, &slot)) = self.slots.iter().enumerate().find(|&(_, &slot)| slot >= bound) {
            return Err(ScatterError::InvalidIndexMap(format!(
                "entry {i} points to slot {slot}, buffer holds {bound}"
            )));
        }
        // sized by the map, not by the bound
        let mut sorted = self.slots.to_vec();
        sorted.sort_unstable();
        match sorted.windows(2).find(|w| w[0] == w[1]) {
            Some(w) => Err(ScatterError::InvalidIndexMap(format!("slot {} is used twice", w[0]))),
            None => Ok(()),
        }
    }

    /// Gather `src` elements (each `units` wide) into map order.
    pub(crate) fn pack<T: Copy>(&self, src: &[T], units: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(self.slots.len() * units);
        for &slot in self.slots {
            out.extend_from_slice(&src[slot * units..(slot + 1) * units]);
        }
        out
    }

    /// Write packed elements of `src` to their mapped slots in `dst`.
    pub(crate) fn place<T: Copy>(&self, src: &[T], dst: &mut [T], units: usize) {
        for (k, &slot) in self.slots.iter().enumerate() {
            dst[slot * units..(slot + 1) * units].copy_from_slice(&src[k * units..(k + 1) * units]);
        }
    }
}
