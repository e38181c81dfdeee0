//! Collective gather, the mirror of [`scatter`](crate::algs::scatter).
//!
//! Every rank contributes a block; the root concatenates the blocks in rank
//! order. With [`SendBuf::InPlace`] the root's own block is read from the
//! front of its receive buffer and moved to its slot before any other block
//! lands, so the overlap is safe.

use bytemuck::Pod;

use crate::algs::communicator::{CollectiveTags, Communicator};
use crate::algs::scatter::buffer::{Layout, displacements, move_from_front, total_count};
use crate::algs::scatter::count_exchange::gather_counts;
use crate::algs::scatter::data_exchange::{recv_block, send_to_root};
use crate::algs::scatter::{ElemSize, RecvBuf, SendBuf};
use crate::algs::wire::{WireFlag, WireKind};
use crate::comm_error::ScatterError;

/// Per-rank block sizes expected by the root of a variable gather.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecvCounts<'a> {
    /// One entry per rank, known in advance.
    Known(&'a [usize]),
    /// Ask every rank for its block size first.
    Negotiate,
}

/// Gather engine bound to one process group and root.
#[derive(Debug)]
pub struct Gather<'c, C: Communicator> {
    comm: &'c C,
    root: usize,
    tags: CollectiveTags,
}

impl<'c, C: Communicator> Gather<'c, C> {
    pub fn new(comm: &'c C, root: usize) -> Result<Self, ScatterError> {
        comm.check_rank(root)?;
        Ok(Self {
            comm,
            root,
            // distinct default base so a gather never matches a scatter's messages
            tags: CollectiveTags::default_gather(),
        })
    }

    pub fn with_tags(mut self, tags: CollectiveTags) -> Self {
        self.tags = tags;
        self
    }

    fn is_root(&self) -> bool {
        self.comm.rank() == self.root
    }

    /// Fixed-size gather of `block` elements per rank. Returns the number of
    /// elements written on this rank (`size * block` on the root, else 0).
    pub fn fixed<T: Pod>(
        &self,
        send: SendBuf<'_, T>,
        block: usize,
        mut recv: RecvBuf<'_, T>,
    ) -> Result<usize, ScatterError> {
        let counts = vec![block; self.comm.size()];
        self.run(Layout::typed::<T>()?, send, block, &counts, &mut recv)
    }

    /// Variable-size gather. `recv_counts` is read on the root only; the
    /// resolved table is returned there.
    pub fn variable<T: Pod>(
        &self,
        send: SendBuf<'_, T>,
        send_count: usize,
        mut recv: RecvBuf<'_, T>,
        recv_counts: RecvCounts<'_>,
    ) -> Result<Option<Vec<usize>>, ScatterError> {
        self.variable_with(Layout::typed::<T>()?, send, send_count, &mut recv, recv_counts)
    }

    pub fn fixed_bytes(
        &self,
        send: SendBuf<'_, u8>,
        block: usize,
        mut recv: RecvBuf<'_, u8>,
        elem_size: usize,
    ) -> Result<usize, ScatterError> {
        let counts = vec![block; self.comm.size()];
        self.run(Layout::bytes(ElemSize::new(elem_size)?), send, block, &counts, &mut recv)
    }

    pub fn variable_bytes(
        &self,
        send: SendBuf<'_, u8>,
        send_count: usize,
        mut recv: RecvBuf<'_, u8>,
        recv_counts: RecvCounts<'_>,
        elem_size: usize,
    ) -> Result<Option<Vec<usize>>, ScatterError> {
        let layout = Layout::bytes(ElemSize::new(elem_size)?);
        self.variable_with(layout, send, send_count, &mut recv, recv_counts)
    }

    fn variable_with<T: Pod>(
        &self,
        layout: Layout,
        send: SendBuf<'_, T>,
        send_count: usize,
        recv: &mut RecvBuf<'_, T>,
        recv_counts: RecvCounts<'_>,
    ) -> Result<Option<Vec<usize>>, ScatterError> {
        let me = self.comm.rank();
        // the root alone decides whether counts are exchanged
        let mut flag = WireFlag::new(matches!(recv_counts, RecvCounts::Negotiate));
        self.comm
            .broadcast_from(self.root, self.tags.flags.as_u16(), bytemuck::bytes_of_mut(&mut flag))
            .map_err(|e| e.into_negotiation(me))?;

        let table = if flag.is_set() {
            gather_counts(self.comm, self.root, self.tags, send_count).map_err(|e| e.into_negotiation(me))?
        } else if let (true, RecvCounts::Known(counts)) = (self.is_root(), recv_counts) {
            Some(counts.to_vec())
        } else {
            None
        };

        let counts = table.as_deref().unwrap_or(&[]);
        self.run(layout, send, send_count, counts, recv)?;
        Ok(table)
    }

    /// Data phase. `counts` is read on the root only.
    fn run<T: Pod>(
        &self,
        layout: Layout,
        send: SendBuf<'_, T>,
        send_count: usize,
        counts: &[usize],
        recv: &mut RecvBuf<'_, T>,
    ) -> Result<usize, ScatterError> {
        log::debug!(
            "gather: rank {}/{} root {} count {send_count} elem {}B",
            self.comm.rank(),
            self.comm.size(),
            self.root,
            layout.elem_size.get()
        );
        let tag = self.tags.data.as_u16();
        let span = layout.span_of(send_count, "send buffer")?;

        if !self.is_root() {
            let src = match send {
                SendBuf::Data(src) => src,
                SendBuf::InPlace => recv.as_slice(),
                SendBuf::Empty => &[][..],
            };
            if src.len() < span {
                return Err(ScatterError::size_mismatch("send buffer", span, src.len()));
            }
            send_to_root(self.comm, tag, layout, self.root, &src[..span])?;
            return Ok(0);
        }

        if counts.len() != self.comm.size() {
            return Err(ScatterError::size_mismatch("count table", self.comm.size(), counts.len()));
        }
        if counts[self.root] != send_count {
            return Err(ScatterError::size_mismatch("root block", counts[self.root], send_count));
        }
        let total = total_count(counts, "count table")?;
        let total_span = layout.span_of(total, "receive buffer")?;
        let displs = displacements(counts);
        let own = layout.span_of(displs[self.root], "receive buffer")?;

        match send {
            SendBuf::Data(src) => {
                if src.len() < span {
                    return Err(ScatterError::size_mismatch("send buffer", span, src.len()));
                }
                recv.ensure_len(total_span)?;
                recv.as_mut_slice()[own..own + span].copy_from_slice(&src[..span]);
            }
            SendBuf::InPlace => {
                if recv.len() < span {
                    return Err(ScatterError::size_mismatch("send buffer", span, recv.len()));
                }
                recv.ensure_len(total_span)?;
                move_from_front(recv.as_mut_slice(), own, span);
            }
            SendBuf::Empty => {
                if span != 0 {
                    return Err(ScatterError::size_mismatch("send buffer", span, 0));
                }
                recv.ensure_len(total_span)?;
            }
        }

        for peer in (0..self.comm.size()).filter(|&p| p != self.root) {
            let off = layout.span_of(displs[peer], "receive buffer")?;
            recv_block(
                self.comm,
                tag,
                WireKind::Gather,
                layout,
                peer,
                counts[peer],
                &mut recv.as_mut_slice()[off..],
            )?;
        }
        Ok(total)
    }
}

/// Fixed gather over `comm` rooted at `root`. See [`Gather::fixed`].
pub fn gather_fixed<C: Communicator, T: Pod>(
    comm: &C,
    send: SendBuf<'_, T>,
    block: usize,
    recv: RecvBuf<'_, T>,
    root: usize,
) -> Result<usize, ScatterError> {
    Gather::new(comm, root)?.fixed(send, block, recv)
}

/// Variable gather over `comm` rooted at `root`. See [`Gather::variable`].
pub fn gather_variable<C: Communicator, T: Pod>(
    comm: &C,
    send: SendBuf<'_, T>,
    send_count: usize,
    recv: RecvBuf<'_, T>,
    recv_counts: RecvCounts<'_>,
    root: usize,
) -> Result<Option<Vec<usize>>, ScatterError> {
    Gather::new(comm, root)?.variable(send, send_count, recv, recv_counts)
}
