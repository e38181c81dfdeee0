//! Fixed, versioned, little-endian wire types for the collective paths.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

use crate::comm_error::ScatterError;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

// All multi-byte integers in these structs are **little-endian** on the wire.
// We store them pre-LE with `.to_le()` and decode with `.from_le()`.

/// Which collective produced a payload message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum WireKind {
    Scatter = 1,
    Gather = 2,
}

/// Header in front of every payload message.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireScatterHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub elem_size_le: u32,
    pub count_le: u64, // elements following the header
}

impl WireScatterHdr {
    pub const SIZE: usize = 16;

    pub fn new(kind: WireKind, elem_size: usize, count: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: (kind as u16).to_le(),
            // `ElemSize` keeps element sizes within u32
            elem_size_le: (elem_size as u32).to_le(),
            count_le: (count as u64).to_le(),
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn elem_size(&self) -> usize {
        u32::from_le(self.elem_size_le) as usize
    }
    pub fn count(&self) -> usize {
        u64::from_le(self.count_le) as usize
    }

    /// Split a received message into its header and payload, checking the
    /// version, kind and element size against the local call.
    pub fn split(msg: &[u8], kind: WireKind, elem_size: usize) -> Result<(Self, &[u8]), ScatterError> {
        if msg.len() < Self::SIZE {
            return Err(ScatterError::size_mismatch("message header", Self::SIZE, msg.len()));
        }
        let (head, payload) = msg.split_at(Self::SIZE);
        let hdr: Self = bytemuck::pod_read_unaligned(head);
        if hdr.version() != WIRE_VERSION {
            return Err(ScatterError::size_mismatch(
                "wire version",
                WIRE_VERSION as usize,
                hdr.version() as usize,
            ));
        }
        if hdr.kind() != kind as u16 {
            return Err(ScatterError::size_mismatch("message kind", kind as usize, hdr.kind() as usize));
        }
        if hdr.elem_size() != elem_size {
            return Err(ScatterError::size_mismatch("element size", elem_size, hdr.elem_size()));
        }
        let payload_bytes = hdr
            .count()
            .checked_mul(elem_size)
            .ok_or_else(|| ScatterError::too_large("payload bytes", hdr.count()))?;
        if payload.len() != payload_bytes {
            return Err(ScatterError::size_mismatch("payload bytes", payload_bytes, payload.len()));
        }
        Ok((hdr, payload))
    }
}

/// Header followed by `payload`, ready for `isend`.
pub fn encode_message(kind: WireKind, elem_size: usize, payload: &[u8]) -> Vec<u8> {
    let count = payload.len() / elem_size;
    let hdr = WireScatterHdr::new(kind, elem_size, count);
    let mut msg = Vec::with_capacity(WireScatterHdr::SIZE + payload.len());
    msg.extend_from_slice(bytemuck::bytes_of(&hdr));
    msg.extend_from_slice(payload);
    msg
}

/// An element count carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u64,
}
impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }
    pub fn decode(bytes: &[u8]) -> Result<usize, String> {
        expect_exact_len(bytes.len(), size_of::<Self>())?;
        Ok(bytemuck::pod_read_unaligned::<Self>(bytes).get())
    }
}

/// Negotiation flag: nonzero means "this rank needs its count".
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireFlag {
    pub set: u8,
    pub _pad: [u8; 3], // explicit padding
}
impl WireFlag {
    pub fn new(set: bool) -> Self {
        Self {
            set: set as u8,
            _pad: [0; 3],
        }
    }
    pub fn is_set(&self) -> bool {
        self.set != 0
    }
    pub fn decode(bytes: &[u8]) -> Result<bool, String> {
        expect_exact_len(bytes.len(), size_of::<Self>())?;
        Ok(bytemuck::pod_read_unaligned::<Self>(bytes).is_set())
    }
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireScatterHdr>(), WireScatterHdr::SIZE);
const_assert_eq!(size_of::<WireCount>(), 8);
const_assert_eq!(size_of::<WireFlag>(), 4);
