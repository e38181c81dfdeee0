//! Collective scatter: the root hands each rank its block of a send buffer.
//!
//! Variants:
//! - **fixed**: every rank gets `block` elements, rank `r` the range
//!   `[r*block, (r+1)*block)`;
//! - **variable**: rank `r` gets `send_counts[r]` elements starting at the
//!   prefix sum of the counts before it, with optional count negotiation;
//! - **bytes**: the same on raw bytes with an explicit element size;
//! - **mapped**: variable scatter whose send and receive sides are permuted by
//!   [`IndexMap`]s.
//!
//! Scatter is a collective. Every rank of the group must make the matching
//! call with the same root, element size and negotiation mode, or the call
//! blocks forever. Errors are local to the rank that detects them; after any
//! error the caller must abort the whole group.
//!
//! In-place operation ([`SendBuf::InPlace`]) reads the root's source data from
//! its receive buffer. All outgoing blocks are copied out before the root
//! moves its own block to the front, so overlapping ranges are safe.

pub mod buffer;
pub mod count_exchange;
pub mod data_exchange;
pub mod index_map;

use bytemuck::Pod;

use crate::algs::communicator::{CollectiveTags, Communicator};
use crate::algs::wire::WireKind;
use crate::comm_error::ScatterError;

pub use buffer::{ElemSize, RecvBuf, SendBuf};
pub use count_exchange::{Received, RecvCount};
pub use index_map::IndexMap;

use buffer::{Layout, displacements, move_to_front, total_count};
use count_exchange::negotiate_recv_count;
use data_exchange::{recv_block, send_blocks};

/// Scatter engine bound to one process group and root.
#[derive(Debug)]
pub struct Scatter<'c, C: Communicator> {
    comm: &'c C,
    root: usize,
    tags: CollectiveTags,
}

impl<'c, C: Communicator> Scatter<'c, C> {
    /// Fails with [`ScatterError::InvalidRank`] if `root` is outside the group.
    pub fn new(comm: &'c C, root: usize) -> Result<Self, ScatterError> {
        comm.check_rank(root)?;
        Ok(Self {
            comm,
            root,
            tags: CollectiveTags::default(),
        })
    }

    pub fn with_tags(mut self, tags: CollectiveTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn root(&self) -> usize {
        self.root
    }

    fn is_root(&self) -> bool {
        self.comm.rank() == self.root
    }

    /// Fixed-size scatter of `block` elements per rank. Returns `block`.
    pub fn fixed<T: Pod>(
        &self,
        send: SendBuf<'_, T>,
        block: usize,
        mut recv: RecvBuf<'_, T>,
    ) -> Result<usize, ScatterError> {
        self.fixed_with(Layout::typed::<T>()?, send, block, &mut recv)
    }

    /// Variable-size scatter. `send_counts` is read on the root only.
    pub fn variable<T: Pod>(
        &self,
        send: SendBuf<'_, T>,
        send_counts: &[usize],
        mut recv: RecvBuf<'_, T>,
        recv_count: RecvCount,
    ) -> Result<Received, ScatterError> {
        self.variable_with(Layout::typed::<T>()?, send, send_counts, &mut recv, recv_count)
    }

    /// Byte-generic fixed scatter: counts are elements of `elem_size` bytes.
    pub fn fixed_bytes(
        &self,
        send: SendBuf<'_, u8>,
        block: usize,
        mut recv: RecvBuf<'_, u8>,
        elem_size: usize,
    ) -> Result<usize, ScatterError> {
        self.fixed_with(Layout::bytes(ElemSize::new(elem_size)?), send, block, &mut recv)
    }

    /// Byte-generic variable scatter: counts are elements of `elem_size` bytes.
    pub fn variable_bytes(
        &self,
        send: SendBuf<'_, u8>,
        send_counts: &[usize],
        mut recv: RecvBuf<'_, u8>,
        recv_count: RecvCount,
        elem_size: usize,
    ) -> Result<Received, ScatterError> {
        let layout = Layout::bytes(ElemSize::new(elem_size)?);
        self.variable_with(layout, send, send_counts, &mut recv, recv_count)
    }

    /// Variable scatter with placement maps.
    ///
    /// On the root, logical send element `i` (elements ordered by destination
    /// rank) is read from slot `send_map[i]` of the send buffer. On every
    /// rank, the `k`-th received element is written to slot `recv_map[k]`.
    /// A growable receive buffer grows to fit the largest mapped slot. Either
    /// map may be `None`, meaning contiguous order.
    pub fn variable_mapped<T: Pod>(
        &self,
        send: SendBuf<'_, T>,
        send_counts: &[usize],
        send_map: Option<IndexMap<'_>>,
        recv: RecvBuf<'_, T>,
        recv_count: RecvCount,
        recv_map: Option<IndexMap<'_>>,
    ) -> Result<Received, ScatterError> {
        let layout = Layout::typed::<T>()?;
        self.mapped_with(layout, send, send_counts, send_map, recv, recv_count, recv_map)
    }

    /// Byte-generic form of [`Scatter::variable_mapped`]; maps index elements
    /// of `elem_size` bytes.
    #[allow(clippy::too_many_arguments)]
    pub fn variable_mapped_bytes(
        &self,
        send: SendBuf<'_, u8>,
        send_counts: &[usize],
        send_map: Option<IndexMap<'_>>,
        recv: RecvBuf<'_, u8>,
        recv_count: RecvCount,
        recv_map: Option<IndexMap<'_>>,
        elem_size: usize,
    ) -> Result<Received, ScatterError> {
        let layout = Layout::bytes(ElemSize::new(elem_size)?);
        self.mapped_with(layout, send, send_counts, send_map, recv, recv_count, recv_map)
    }

    fn fixed_with<T: Pod>(
        &self,
        layout: Layout,
        send: SendBuf<'_, T>,
        block: usize,
        recv: &mut RecvBuf<'_, T>,
    ) -> Result<usize, ScatterError> {
        log::debug!(
            "scatter fixed: rank {}/{} root {} block {block} elem {}B",
            self.comm.rank(),
            self.comm.size(),
            self.root,
            layout.elem_size.get()
        );
        let counts = if self.is_root() {
            vec![block; self.comm.size()]
        } else {
            Vec::new()
        };
        self.run(layout, send, &counts, block, recv)?;
        Ok(block)
    }

    fn variable_with<T: Pod>(
        &self,
        layout: Layout,
        send: SendBuf<'_, T>,
        send_counts: &[usize],
        recv: &mut RecvBuf<'_, T>,
        recv_count: RecvCount,
    ) -> Result<Received, ScatterError> {
        log::debug!(
            "scatter variable: rank {}/{} root {} elem {}B {:?}",
            self.comm.rank(),
            self.comm.size(),
            self.root,
            layout.elem_size.get(),
            recv_count
        );
        if self.is_root() {
            // reject bad root input before the group commits to the call
            self.check_root_source(layout, &send, send_counts, recv)?;
        }
        let received = negotiate_recv_count(self.comm, self.root, self.tags, send_counts, recv_count)?;
        self.run(layout, send, send_counts, received.count, recv)?;
        Ok(received)
    }

    #[allow(clippy::too_many_arguments)]
    fn mapped_with<T: Pod>(
        &self,
        layout: Layout,
        send: SendBuf<'_, T>,
        send_counts: &[usize],
        send_map: Option<IndexMap<'_>>,
        mut recv: RecvBuf<'_, T>,
        recv_count: RecvCount,
        recv_map: Option<IndexMap<'_>>,
    ) -> Result<Received, ScatterError> {
        // Pack the root's source into rank order first; in-place data is
        // snapshotted here before anything is written.
        let packed;
        let send = match (&send_map, self.is_root()) {
            (Some(map), true) => {
                let src = match send {
                    SendBuf::Data(src) => src,
                    SendBuf::InPlace => recv.as_slice(),
                    SendBuf::Empty => &[][..],
                };
                let total = total_count(send_counts, "send buffer")?;
                map.validate(total, layout.elements_in(src.len()))?;
                packed = map.pack(src, layout.units);
                SendBuf::Data(packed.as_slice())
            }
            (_, true) if send.is_in_place() => {
                packed = recv.as_slice().to_vec();
                SendBuf::Data(packed.as_slice())
            }
            _ => send,
        };

        let mut staged: Vec<T> = Vec::new();
        let received = self.variable_with(
            layout,
            send,
            send_counts,
            &mut RecvBuf::Growable(&mut staged),
            recv_count,
        )?;

        match recv_map {
            Some(map) => {
                let need = map.extent().max(layout.elements_in(recv.len()));
                map.validate(received.count, need)?;
                recv.ensure_len(layout.span_of(need, "receive buffer")?)?;
                map.place(&staged, recv.as_mut_slice(), layout.units);
            }
            None => {
                let span = layout.span_of(received.count, "receive buffer")?;
                recv.ensure_len(span)?;
                recv.as_mut_slice()[..span].copy_from_slice(&staged[..span]);
            }
        }
        Ok(received)
    }

    /// Root-side preconditions: one count per rank and enough source data.
    fn check_root_source<T: Pod>(
        &self,
        layout: Layout,
        send: &SendBuf<'_, T>,
        counts: &[usize],
        recv: &RecvBuf<'_, T>,
    ) -> Result<(), ScatterError> {
        if counts.len() != self.comm.size() {
            return Err(ScatterError::size_mismatch("count table", self.comm.size(), counts.len()));
        }
        let total = layout.span_of(total_count(counts, "send buffer")?, "send buffer")?;
        let have = match send {
            SendBuf::Data(src) => src.len(),
            SendBuf::InPlace => recv.len(),
            SendBuf::Empty => 0,
        };
        if have < total {
            return Err(ScatterError::size_mismatch("send buffer", total, have));
        }
        Ok(())
    }

    /// Data phase once every rank knows its count.
    fn run<T: Pod>(
        &self,
        layout: Layout,
        send: SendBuf<'_, T>,
        counts: &[usize],
        my_count: usize,
        recv: &mut RecvBuf<'_, T>,
    ) -> Result<(), ScatterError> {
        let tag = self.tags.data.as_u16();

        if !self.is_root() {
            recv.ensure_len(layout.span_of(my_count, "receive buffer")?)?;
            return recv_block(self.comm, tag, WireKind::Scatter, layout, self.root, my_count, recv.as_mut_slice());
        }

        self.check_root_source(layout, &send, counts, recv)?;
        let span = layout.span_of(my_count, "send buffer")?;
        let displs = displacements(counts);
        let own = layout.span_of(displs[self.root], "send buffer")?;
        match send {
            SendBuf::Data(src) => {
                send_blocks(self.comm, tag, layout, src, counts, &displs)?;
                recv.ensure_len(span)?;
                recv.as_mut_slice()[..span].copy_from_slice(&src[own..own + span]);
            }
            SendBuf::InPlace => {
                send_blocks(self.comm, tag, layout, recv.as_slice(), counts, &displs)?;
                move_to_front(recv.as_mut_slice(), own, span);
            }
            SendBuf::Empty => {
                // only reachable when every count is zero
                send_blocks(self.comm, tag, layout, &[] as &[T], counts, &displs)?;
                recv.ensure_len(span)?;
            }
        }
        Ok(())
    }
}

/// Fixed scatter over `comm` rooted at `root`. See [`Scatter::fixed`].
pub fn scatter_fixed<C: Communicator, T: Pod>(
    comm: &C,
    send: SendBuf<'_, T>,
    block: usize,
    recv: RecvBuf<'_, T>,
    root: usize,
) -> Result<usize, ScatterError> {
    Scatter::new(comm, root)?.fixed(send, block, recv)
}

/// Variable scatter over `comm` rooted at `root`. See [`Scatter::variable`].
pub fn scatter_variable<C: Communicator, T: Pod>(
    comm: &C,
    send: SendBuf<'_, T>,
    send_counts: &[usize],
    recv: RecvBuf<'_, T>,
    recv_count: RecvCount,
    root: usize,
) -> Result<Received, ScatterError> {
    Scatter::new(comm, root)?.variable(send, send_counts, recv, recv_count)
}

/// Byte-generic fixed scatter. See [`Scatter::fixed_bytes`].
pub fn scatter_fixed_bytes<C: Communicator>(
    comm: &C,
    send: SendBuf<'_, u8>,
    block: usize,
    recv: RecvBuf<'_, u8>,
    root: usize,
    elem_size: usize,
) -> Result<usize, ScatterError> {
    Scatter::new(comm, root)?.fixed_bytes(send, block, recv, elem_size)
}

/// Byte-generic variable scatter. See [`Scatter::variable_bytes`].
pub fn scatter_variable_bytes<C: Communicator>(
    comm: &C,
    send: SendBuf<'_, u8>,
    send_counts: &[usize],
    recv: RecvBuf<'_, u8>,
    recv_count: RecvCount,
    root: usize,
    elem_size: usize,
) -> Result<Received, ScatterError> {
    Scatter::new(comm, root)?.variable_bytes(send, send_counts, recv, recv_count, elem_size)
}
