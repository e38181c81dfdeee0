mod util;

use pe_scatter::prelude::*;
use util::run_ranks;

/// Per-destination counts used when `root` scatters to `n` ranks.
fn counts_for(root: usize, n: usize) -> Vec<usize> {
    (0..n).map(|i| (i + root * root) % n).collect()
}

fn value(root: usize, dest: usize, j: usize) -> f64 {
    ((root + 1) * 1_000_000 + (dest + 1) * 10_000 + (j + 1)) as f64
}

fn variable_send(root: usize, n: usize) -> Vec<f64> {
    counts_for(root, n)
        .iter()
        .enumerate()
        .flat_map(|(dest, &c)| (0..c).map(move |j| value(root, dest, j)))
        .collect()
}

#[test]
fn two_ranks_negotiated() {
    let got = run_ranks(2, |comm| {
        let send = [100i32, 200, 201, 202];
        let (src, counts): (SendBuf<'_, i32>, &[usize]) = if comm.rank() == 0 {
            (SendBuf::Data(&send), &[1, 3])
        } else {
            (SendBuf::Empty, &[])
        };
        let mut out = Vec::new();
        let r = scatter_variable(comm, src, counts, RecvBuf::Growable(&mut out), RecvCount::Negotiate, 0).unwrap();
        (r, out)
    });
    assert_eq!(got[0].0, Received { count: 1, negotiated: true });
    assert_eq!(got[0].1, vec![100]);
    assert_eq!(got[1].0.count, 3);
    assert_eq!(got[1].1, vec![200, 201, 202]);
}

#[test]
fn every_root_with_negotiation() {
    let n = 4;
    for root in 0..n {
        let got = run_ranks(n, |comm| {
            let send = variable_send(root, n);
            let counts = counts_for(root, n);
            let (src, counts) = if comm.rank() == root {
                (SendBuf::Data(&send[..]), &counts[..])
            } else {
                (SendBuf::Empty, &[][..])
            };
            let mut out = Vec::new();
            let r = scatter_variable(comm, src, counts, RecvBuf::Growable(&mut out), RecvCount::Negotiate, root)
                .unwrap();
            assert_eq!(r.count, out.len());
            out
        });
        let counts = counts_for(root, n);
        for (rank, out) in got.into_iter().enumerate() {
            let want: Vec<f64> = (0..counts[rank]).map(|j| value(root, rank, j)).collect();
            assert_eq!(out, want, "root {root} rank {rank}");
        }
    }
}

#[test]
fn every_rank_knows_its_count() {
    let n = 3;
    let root = 1;
    let got = run_ranks(n, |comm| {
        let send = variable_send(root, n);
        let counts = counts_for(root, n);
        let src = if comm.rank() == root { SendBuf::Data(&send[..]) } else { SendBuf::Empty };
        let mine = counts[comm.rank()];
        let mut out = vec![0.0; mine];
        let r = scatter_variable(comm, src, &counts, RecvBuf::Fixed(&mut out), RecvCount::Known(mine), root).unwrap();
        assert!(!r.negotiated);
        out
    });
    let counts = counts_for(root, n);
    for (rank, out) in got.into_iter().enumerate() {
        assert_eq!(out.len(), counts[rank]);
        assert!(out.iter().enumerate().all(|(j, &x)| x == value(root, rank, j)));
    }
}

#[test]
fn in_place_on_root() {
    let n = 3;
    for root in 0..n {
        let got = run_ranks(n, |comm| {
            let counts = counts_for(root, n);
            let mut buf = if comm.rank() == root { variable_send(root, n) } else { Vec::new() };
            let src = if comm.rank() == root { SendBuf::InPlace } else { SendBuf::Empty };
            let r = scatter_variable(comm, src, &counts, RecvBuf::Growable(&mut buf), RecvCount::Negotiate, root)
                .unwrap();
            buf.truncate(r.count);
            buf
        });
        let counts = counts_for(root, n);
        for (rank, out) in got.into_iter().enumerate() {
            let want: Vec<f64> = (0..counts[rank]).map(|j| value(root, rank, j)).collect();
            assert_eq!(out, want, "root {root} rank {rank}");
        }
    }
}

#[test]
fn known_count_disagreeing_with_root_is_a_size_mismatch() {
    let got = run_ranks(2, |comm| {
        let send = [1u64, 2, 3, 4];
        let (src, counts): (SendBuf<'_, u64>, &[usize]) = if comm.rank() == 0 {
            (SendBuf::Data(&send), &[1, 3])
        } else {
            (SendBuf::Empty, &[])
        };
        let expect = if comm.rank() == 0 { 1 } else { 2 };
        let mut out = Vec::new();
        scatter_variable(comm, src, counts, RecvBuf::Growable(&mut out), RecvCount::Known(expect), 0)
    });
    assert!(got[0].is_ok());
    assert!(matches!(
        got[1],
        Err(ScatterError::SizeMismatch { what: "receive count", expected: 2, actual: 3 })
    ));
}

#[test]
fn mixed_known_and_negotiated_receivers() {
    let got = run_ranks(3, |comm| {
        let send = [5i16, 6, 7, 8];
        let (src, counts): (SendBuf<'_, i16>, &[usize]) = if comm.rank() == 0 {
            (SendBuf::Data(&send), &[0, 1, 3])
        } else {
            (SendBuf::Empty, &[])
        };
        let want = match comm.rank() {
            1 => RecvCount::Known(1),
            _ => RecvCount::Negotiate,
        };
        let mut out = Vec::new();
        let r = scatter_variable(comm, src, counts, RecvBuf::Growable(&mut out), want, 0).unwrap();
        (r, out)
    });
    assert_eq!(got[0].1, Vec::<i16>::new());
    assert_eq!(got[1].0, Received { count: 1, negotiated: false });
    assert_eq!(got[1].1, vec![5]);
    assert_eq!(got[2].0, Received { count: 3, negotiated: true });
    assert_eq!(got[2].1, vec![6, 7, 8]);
}
