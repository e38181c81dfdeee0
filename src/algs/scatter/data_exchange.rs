//! Payload phase: move element blocks between the root and the other ranks.
//!
//! Every block travels as one message: a [`WireScatterHdr`] followed by the
//! block's bytes. Receivers check element size and count before writing.

use bytemuck::Pod;

use crate::algs::communicator::Communicator;
use crate::algs::scatter::buffer::Layout;
use crate::algs::wire::{WireKind, WireScatterHdr, cast_slice, cast_slice_mut, encode_message};
use crate::comm_error::ScatterError;

/// Root side of a scatter: send block `peer` of `src` to every other rank.
///
/// `counts` and `displs` are in elements. The bytes are copied into each
/// message before this returns, so `src` may be overwritten afterwards.
pub(crate) fn send_blocks<C: Communicator, T: Pod>(
    comm: &C,
    tag: u16,
    layout: Layout,
    src: &[T],
    counts: &[usize],
    displs: &[usize],
) -> Result<(), ScatterError> {
    let me = comm.rank();
    for peer in (0..comm.size()).filter(|&p| p != me) {
        let off = layout.span_of(displs[peer], "send buffer")?;
        let span = layout.span_of(counts[peer], "send buffer")?;
        let msg = encode_message(WireKind::Scatter, layout.elem_size.get(), cast_slice(&src[off..off + span]));
        comm.send_to(peer, tag, &msg)?;
    }
    Ok(())
}

/// Receive one block of exactly `count` elements from `peer` into `dst`.
pub(crate) fn recv_block<C: Communicator, T: Pod>(
    comm: &C,
    tag: u16,
    kind: WireKind,
    layout: Layout,
    peer: usize,
    count: usize,
    dst: &mut [T],
) -> Result<(), ScatterError> {
    let elem_size = layout.elem_size.get();
    let span = layout.span_of(count, "receive count")?;
    // one extra element so an oversized block is noticed rather than truncated
    let max_len = count
        .checked_add(1)
        .and_then(|n| n.checked_mul(elem_size))
        .and_then(|n| n.checked_add(WireScatterHdr::SIZE))
        .ok_or_else(|| ScatterError::too_large("receive count", count))?;
    let msg = comm.receive_from(peer, tag, max_len)?;
    let (hdr, payload) = WireScatterHdr::split(&msg, kind, elem_size)?;
    if hdr.count() != count {
        return Err(ScatterError::size_mismatch("receive count", count, hdr.count()));
    }
    cast_slice_mut(&mut dst[..span]).copy_from_slice(payload);
    Ok(())
}

/// Non-root side of a gather: send `src` (a whole block) to `root`.
pub(crate) fn send_to_root<C: Communicator, T: Pod>(
    comm: &C,
    tag: u16,
    layout: Layout,
    root: usize,
    src: &[T],
) -> Result<(), ScatterError> {
    let msg = encode_message(WireKind::Gather, layout.elem_size.get(), cast_slice(src));
    comm.send_to(root, tag, &msg)
}
