//! Thin façade over intra-process or inter-process message passing.
//!
//! A [`Communicator`] is the process group the collectives run on: it knows the
//! group size, the local rank, and how to move *contiguous byte slices* between
//! ranks. Posting is non-blocking; completion happens on `.wait()`.
//! Messages between one (source, destination, tag) triple are delivered in
//! order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::comm_error::ScatterError;

/// Largest tag every MPI implementation accepts (`MPI_TAG_UB >= 32767`).
pub const PORTABLE_TAG_MAX: u16 = 0x7FFF;

/// Message tag namespace. Arithmetic wraps at `u16::MAX`.
///
/// The in-process backends accept any `u16`; over MPI, tags above
/// [`PORTABLE_TAG_MAX`] are only valid where the job's `MPI_TAG_UB` allows them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommTag(pub u16);

impl CommTag {
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    #[inline]
    pub const fn base(self) -> u16 {
        self.0
    }
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    #[inline]
    pub const fn offset(self, by: u16) -> Self {
        Self(self.0.wrapping_add(by))
    }
    #[inline]
    pub const fn is_portable(self) -> bool {
        self.0 <= PORTABLE_TAG_MAX
    }
}

/// Tags for the phases of one collective: negotiation flags, counts, payload.
///
/// Pick bases at or below `PORTABLE_TAG_MAX - 2` when running over MPI so all
/// three phases stay portable; see [`CollectiveTags::is_portable`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveTags {
    pub flags: CommTag,
    pub counts: CommTag,
    pub data: CommTag,
}

impl CollectiveTags {
    /// Construct tags from a base, assigning deterministic offsets per phase.
    #[inline]
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            flags: base,
            counts: base.offset(1),
            data: base.offset(2),
        }
    }

    /// Default tags of a gather, placed right after the scatter defaults.
    pub const fn default_gather() -> Self {
        Self::from_base(DEFAULT_TAG_BASE.offset(3))
    }

    pub const fn is_portable(&self) -> bool {
        self.flags.is_portable() && self.counts.is_portable() && self.data.is_portable()
    }
}

const DEFAULT_TAG_BASE: CommTag = CommTag::new(0x5CA7);

impl Default for CollectiveTags {
    fn default() -> Self {
        Self::from_base(DEFAULT_TAG_BASE)
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Process-group interface consumed by the collectives.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Post a send of `buf` to `peer`. The bytes are copied before return.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive from `peer`; at most `buf.len()` bytes are delivered.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// This process's rank in `[0, size)`.
    fn rank(&self) -> usize;
    /// Number of ranks in the group.
    fn size(&self) -> usize;

    fn is_no_comm(&self) -> bool {
        false
    }

    /// Validate `rank` against this group.
    fn check_rank(&self, rank: usize) -> Result<(), ScatterError> {
        if rank < self.size() {
            Ok(())
        } else {
            Err(ScatterError::InvalidRank {
                rank,
                size: self.size(),
            })
        }
    }

    /// Blocking send.
    ///
    /// Send handles carry no failure information, so only a bad `peer` is
    /// reported here; a lost message surfaces on the receiving rank.
    fn send_to(&self, peer: usize, tag: u16, buf: &[u8]) -> Result<(), ScatterError> {
        self.check_rank(peer)?;
        log::trace!("rank {} -> {peer}: {} bytes (tag {tag:#06x})", self.rank(), buf.len());
        self.isend(peer, tag, buf).wait();
        Ok(())
    }

    /// Blocking receive of at most `max_len` bytes.
    fn receive_from(&self, peer: usize, tag: u16, max_len: usize) -> Result<Vec<u8>, ScatterError> {
        self.check_rank(peer)?;
        let mut scratch = vec![0u8; max_len];
        match self.irecv(peer, tag, &mut scratch).wait() {
            Some(data) => {
                log::trace!("rank {} <- {peer}: {} bytes (tag {tag:#06x})", self.rank(), data.len());
                Ok(data)
            }
            None => {
                log::warn!("rank {}: receive from {peer} delivered nothing", self.rank());
                Err(ScatterError::transport(peer, "receive completed without data"))
            }
        }
    }

    /// Linear broadcast of a fixed-length buffer from `root`.
    ///
    /// On `root`, `buf` is the source; elsewhere it is overwritten.
    fn broadcast_from(&self, root: usize, tag: u16, buf: &mut [u8]) -> Result<(), ScatterError> {
        self.check_rank(root)?;
        if self.rank() == root {
            for peer in (0..self.size()).filter(|&p| p != root) {
                self.send_to(peer, tag, buf)?;
            }
        } else {
            let data = self.receive_from(root, tag, buf.len())?;
            if data.len() != buf.len() {
                return Err(ScatterError::size_mismatch("broadcast payload", buf.len(), data.len()));
            }
            buf.copy_from_slice(&data);
        }
        Ok(())
    }
}

/// Compile-time no-op comm for pure serial use: one rank, no messages.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- LocalComm: intra-process, one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Mailbox {
    queues: Mutex<HashMap<Key, VecDeque<Bytes>>>,
    arrived: Condvar,
}

/// Receive handle of [`LocalComm`]; `wait` blocks until the message arrives.
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    max_len: usize,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let mut queues = self.mailbox.queues.lock();
        loop {
            if let Some(bytes) = queues.get_mut(&self.key).and_then(VecDeque::pop_front) {
                let n = bytes.len().min(self.max_len);
                return Some(bytes[..n].to_vec());
            }
            self.mailbox.arrived.wait(&mut queues);
        }
    }
}

/// In-process group member. Handles from one [`LocalComm::group`] share a
/// mailbox; separate groups never see each other's messages.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl LocalComm {
    /// One handle per rank of a fresh group of `size` ranks.
    pub fn group(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    /// Number of messages posted but not yet received, across the group.
    pub fn pending(&self) -> usize {
        self.mailbox.queues.lock().values().map(VecDeque::len).sum()
    }
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        let data = Bytes::copy_from_slice(buf);
        self.mailbox.queues.lock().entry(key).or_default().push_back(data);
        self.mailbox.arrived.notify_all();
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
            max_len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{CommTag, Communicator, ScatterError, Wait};
    use mpi::environment::Universe;
    use mpi::traits::{Communicator as _, Destination, Source};

    /// World communicator of an MPI job. Sends are blocking standard-mode
    /// sends; receives complete on `wait`.
    ///
    /// Tags above [`PORTABLE_TAG_MAX`](super::PORTABLE_TAG_MAX) are passed
    /// through but logged, since MPI may reject them.
    pub struct MpiComm {
        universe: Universe,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, ScatterError> {
            let universe = mpi::initialize()
                .ok_or_else(|| ScatterError::transport(0, "MPI was already initialized"))?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                universe,
                rank,
                size,
            })
        }
    }

    pub struct MpiRecvHandle<'a> {
        comm: &'a MpiComm,
        peer: usize,
        tag: u16,
        max_len: usize,
    }

    impl Wait for MpiRecvHandle<'_> {
        fn wait(self) -> Option<Vec<u8>> {
            let world = self.comm.universe.world();
            let (mut data, _status) = world
                .process_at_rank(self.peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(self.tag));
            data.truncate(self.max_len);
            Some(data)
        }
    }

    impl MpiComm {
        pub fn irecv_handle(&self, peer: usize, tag: u16, max_len: usize) -> MpiRecvHandle<'_> {
            MpiRecvHandle {
                comm: self,
                peer,
                tag,
                max_len,
            }
        }
    }

    impl<'c> Communicator for &'c MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecvHandle<'c>;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            if !CommTag::new(tag).is_portable() {
                log::warn!("rank {}: tag {tag:#06x} is above the portable MPI tag range", self.rank);
            }
            self.universe
                .world()
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiRecvHandle<'c> {
            let comm: &'c MpiComm = *self;
            comm.irecv_handle(peer, tag, buf.len())
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
