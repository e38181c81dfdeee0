//! Count negotiation: settle per-rank element counts before the data phase.
//!
//! Ranks that do not know how much they will receive pass
//! [`RecvCount::Negotiate`]. The exchange is:
//! 1. every non-root rank tells the root whether it needs its count,
//! 2. the root sends one [`WireCount`] to each rank that asked.
//!
//! Ranks that already know their count send their flag and go straight to the
//! data phase; the payload header still carries the count, so a wrong known
//! count is caught there. Any transport failure or malformed record in these
//! steps is reported as [`ScatterError::NegotiationFailure`].

use crate::algs::communicator::{CollectiveTags, Communicator};
use crate::algs::wire::{WireCount, WireFlag};
use crate::comm_error::ScatterError;

/// Receive-side element count of a variable collective.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecvCount {
    /// The caller knows its count.
    Known(usize),
    /// The count is taken from the root's table.
    Negotiate,
}

impl RecvCount {
    pub fn needs_negotiation(self) -> bool {
        matches!(self, RecvCount::Negotiate)
    }
}

/// Outcome of a variable collective on one rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Received {
    /// Elements written to the receive buffer.
    pub count: usize,
    /// Whether `count` was resolved through negotiation.
    pub negotiated: bool,
}

/// Step 1. On the root, returns the ranks that asked for their count; other
/// ranks send `needs` and get an empty list.
pub fn collect_requests<C: Communicator>(
    comm: &C,
    root: usize,
    tags: CollectiveTags,
    needs: bool,
) -> Result<Vec<usize>, ScatterError> {
    let me = comm.rank();
    if me != root {
        comm.send_to(root, tags.flags.as_u16(), bytemuck::bytes_of(&WireFlag::new(needs)))?;
        return Ok(Vec::new());
    }

    let flag_len = std::mem::size_of::<WireFlag>();
    let mut requests = Vec::new();
    for peer in (0..comm.size()).filter(|&p| p != root) {
        let raw = comm.receive_from(peer, tags.flags.as_u16(), flag_len)?;
        let asked = WireFlag::decode(&raw).map_err(|reason| ScatterError::NegotiationFailure {
            rank: me,
            reason: format!("flag from rank {peer}: {reason}"),
        })?;
        if asked {
            requests.push(peer);
        }
    }
    Ok(requests)
}

/// Step 2, root side: send `counts[peer]` to every requesting peer.
pub fn answer_requests<C: Communicator>(
    comm: &C,
    tags: CollectiveTags,
    counts: &[usize],
    requests: &[usize],
) -> Result<(), ScatterError> {
    for &peer in requests {
        let wire = WireCount::new(counts[peer]);
        comm.send_to(peer, tags.counts.as_u16(), bytemuck::bytes_of(&wire))?;
    }
    Ok(())
}

/// Step 2, requesting side: this rank's count from the root.
pub fn receive_count<C: Communicator>(comm: &C, root: usize, tags: CollectiveTags) -> Result<usize, ScatterError> {
    let raw = comm.receive_from(root, tags.counts.as_u16(), std::mem::size_of::<WireCount>())?;
    WireCount::decode(&raw).map_err(|reason| ScatterError::NegotiationFailure {
        rank: comm.rank(),
        reason: format!("count from root {root}: {reason}"),
    })
}

/// Mirror of the count scatter: every rank sends its count to the root,
/// which returns the full table. Non-root ranks get `None`.
pub fn gather_counts<C: Communicator>(
    comm: &C,
    root: usize,
    tags: CollectiveTags,
    mine: usize,
) -> Result<Option<Vec<usize>>, ScatterError> {
    let me = comm.rank();
    let tag = tags.counts.as_u16();
    if me != root {
        comm.send_to(root, tag, bytemuck::bytes_of(&WireCount::new(mine)))?;
        return Ok(None);
    }
    let mut table = vec![0usize; comm.size()];
    for (peer, slot) in table.iter_mut().enumerate() {
        if peer == root {
            *slot = mine;
            continue;
        }
        let raw = comm.receive_from(peer, tag, std::mem::size_of::<WireCount>())?;
        *slot = WireCount::decode(&raw).map_err(|reason| ScatterError::NegotiationFailure {
            rank: me,
            reason: format!("count from rank {peer}: {reason}"),
        })?;
    }
    Ok(Some(table))
}

/// Settle this rank's receive count for a variable scatter.
///
/// `send_counts` is only read on the root. The root resolves its own count
/// locally; a known root count that disagrees with its table is rejected
/// before any message is sent.
pub fn negotiate_recv_count<C: Communicator>(
    comm: &C,
    root: usize,
    tags: CollectiveTags,
    send_counts: &[usize],
    recv: RecvCount,
) -> Result<Received, ScatterError> {
    let me = comm.rank();
    if me == root {
        if send_counts.len() != comm.size() {
            return Err(ScatterError::size_mismatch("count table", comm.size(), send_counts.len()));
        }
        if let RecvCount::Known(n) = recv {
            if n != send_counts[root] {
                return Err(ScatterError::size_mismatch("receive count", send_counts[root], n));
            }
        }
    }

    let requests = collect_requests(comm, root, tags, recv.needs_negotiation()).map_err(|e| e.into_negotiation(me))?;

    if me == root {
        if !requests.is_empty() {
            log::debug!("root {root}: sending counts to ranks {requests:?}");
            answer_requests(comm, tags, send_counts, &requests).map_err(|e| e.into_negotiation(me))?;
        }
        return Ok(Received {
            count: send_counts[root],
            negotiated: recv.needs_negotiation(),
        });
    }

    match recv {
        RecvCount::Known(count) => Ok(Received {
            count,
            negotiated: false,
        }),
        RecvCount::Negotiate => {
            log::debug!("rank {me}: negotiating receive count with root {root}");
            let count = receive_count(comm, root, tags).map_err(|e| e.into_negotiation(me))?;
            Ok(Received {
                count,
                negotiated: true,
            })
        }
    }
}
