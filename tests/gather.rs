mod util;

use pe_scatter::prelude::*;
use util::{block_of, full_send, run_ranks};

#[test]
fn fixed_gather_concatenates_in_rank_order() {
    let n = 4;
    for root in 0..n {
        let got = run_ranks(n, |comm| {
            let mine = block_of(comm.rank(), 3);
            let mut out = Vec::new();
            let k = gather_fixed(comm, SendBuf::Data(&mine[..]), 3, RecvBuf::Growable(&mut out), root).unwrap();
            (k, out)
        });
        for (rank, (k, out)) in got.into_iter().enumerate() {
            if rank == root {
                assert_eq!(k, n * 3);
                assert_eq!(out, full_send(n, 3));
            } else {
                assert_eq!(k, 0);
                assert!(out.is_empty());
            }
        }
    }
}

#[test]
fn scatter_then_gather_is_identity() {
    let n = 3;
    let got = run_ranks(n, |comm| {
        let send = full_send(n, 2);
        let src = if comm.rank() == 0 { SendBuf::Data(&send[..]) } else { SendBuf::Empty };
        let mut part = Vec::new();
        scatter_fixed(comm, src, 2, RecvBuf::Growable(&mut part), 0).unwrap();

        let mut back = Vec::new();
        gather_fixed(comm, SendBuf::Data(&part[..]), 2, RecvBuf::Growable(&mut back), 0).unwrap();
        back
    });
    assert_eq!(got[0], full_send(n, 2));
}

#[test]
fn variable_gather_negotiates_on_root_request() {
    let got = run_ranks(3, |comm| {
        let mine: Vec<u16> = (0..comm.rank() * 2).map(|j| (comm.rank() * 100 + j) as u16).collect();
        let mut out = Vec::new();
        gather_variable(
            comm,
            SendBuf::Data(&mine[..]),
            mine.len(),
            RecvBuf::Growable(&mut out),
            RecvCounts::Negotiate,
            2,
        )
        .map(|table| (table, out))
        .unwrap()
    });
    let (table, out) = &got[2];
    assert_eq!(table.as_deref(), Some(&[0, 2, 4][..]));
    assert_eq!(*out, vec![100, 101, 200, 201, 202, 203]);
    assert!(got[0].0.is_none());
}

#[test]
fn variable_gather_with_known_table() {
    let got = run_ranks(2, |comm| {
        let mine = if comm.rank() == 0 { vec![1.0f32] } else { vec![2.0, 3.0, 4.0] };
        let counts: RecvCounts<'_> = if comm.rank() == 1 { RecvCounts::Known(&[1, 3]) } else { RecvCounts::Known(&[]) };
        let mut out = [0.0f32; 4];
        let table = gather_variable(comm, SendBuf::Data(&mine[..]), mine.len(), RecvBuf::Fixed(&mut out), counts, 1)
            .unwrap();
        (table, out)
    });
    assert_eq!(got[1].0, Some(vec![1, 3]));
    assert_eq!(got[1].1, [1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn in_place_gather_on_root() {
    let n = 3;
    for root in 0..n {
        let got = run_ranks(n, |comm| {
            let mine = block_of(comm.rank(), 2);
            if comm.rank() == root {
                // own block sits at the front of the receive buffer
                let mut buf = mine;
                gather_fixed(comm, SendBuf::InPlace, 2, RecvBuf::Growable(&mut buf), root).unwrap();
                buf
            } else {
                let mut unused = Vec::new();
                gather_fixed(comm, SendBuf::Data(&mine[..]), 2, RecvBuf::Growable(&mut unused), root).unwrap();
                unused
            }
        });
        assert_eq!(got[root], full_send(n, 2), "root {root}");
    }
}

#[test]
fn gather_bytes_respects_element_size() {
    let got = run_ranks(2, |comm| {
        let mine = (comm.rank() as u32 + 7).to_le_bytes();
        let mut out = Vec::new();
        Gather::new(comm, 0)
            .unwrap()
            .fixed_bytes(SendBuf::Data(&mine[..]), 1, RecvBuf::Growable(&mut out), 4)
            .unwrap();
        out
    });
    assert_eq!(got[0], [7u32.to_le_bytes(), 8u32.to_le_bytes()].concat());
}
