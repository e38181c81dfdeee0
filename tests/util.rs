#![allow(dead_code)]
use pe_scatter::algs::communicator::LocalComm;

/// Run `f` once per rank of a fresh `n`-rank [`LocalComm`] group, one thread
/// per rank, and collect the results in rank order.
pub fn run_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&LocalComm) -> R + Sync,
{
    let group = LocalComm::group(n);
    let f = &f;
    let results = std::thread::scope(|s| {
        let handles: Vec<_> = group.iter().map(|comm| s.spawn(move || f(comm))).collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    });
    assert_eq!(group[0].pending(), 0, "messages left undelivered");
    results
}

/// The canonical per-rank payload used by the fixed-size cases: element `j`
/// of rank `r`'s block is `(r + 1) * 10 + j`.
pub fn block_of(rank: usize, block: usize) -> Vec<i64> {
    (0..block).map(|j| ((rank + 1) * 10 + j) as i64).collect()
}

/// Concatenation of every rank's [`block_of`].
pub fn full_send(size: usize, block: usize) -> Vec<i64> {
    (0..size).flat_map(|r| block_of(r, block)).collect()
}
