//! Counts whose element or byte totals do not fit in `usize` are reported as
//! `SizeMismatch`, never as a panic or a wrapped length.

use pe_scatter::prelude::*;

fn is_too_large(err: &ScatterError, want: &str) -> bool {
    matches!(err, ScatterError::SizeMismatch { what, expected: usize::MAX, .. } if *what == want)
}

#[test]
fn fixed_block_total_overflows() {
    let group = LocalComm::group(2);
    let mut out = Vec::new();
    let err = scatter_fixed(&group[0], SendBuf::Data(&[1u8, 2]), usize::MAX / 2 + 1, RecvBuf::Growable(&mut out), 0)
        .unwrap_err();
    assert!(is_too_large(&err, "send buffer"), "{err:?}");
    assert_eq!(group[0].pending(), 0);
}

#[test]
fn byte_span_overflows() {
    let mut out = Vec::new();
    let err = scatter_fixed_bytes(&NoComm, SendBuf::Data(&[0u8; 8]), usize::MAX / 4, RecvBuf::Growable(&mut out), 0, 8)
        .unwrap_err();
    assert!(is_too_large(&err, "send buffer"), "{err:?}");
}

#[test]
fn variable_table_sum_overflows() {
    let group = LocalComm::group(2);
    let mut out = Vec::new();
    let err = scatter_variable(
        &group[0],
        SendBuf::Data(&[1u64]),
        &[usize::MAX, 1],
        RecvBuf::Growable(&mut out),
        RecvCount::Negotiate,
        0,
    )
    .unwrap_err();
    assert!(is_too_large(&err, "send buffer"), "{err:?}");
    assert_eq!(group[0].pending(), 0);
}

#[test]
fn huge_known_count_on_a_receiver() {
    let group = LocalComm::group(2);
    let mut out: Vec<u32> = Vec::new();
    let err = scatter_variable(
        &group[1],
        SendBuf::Empty,
        &[],
        RecvBuf::Growable(&mut out),
        RecvCount::Known(usize::MAX / 2),
        0,
    )
    .unwrap_err();
    assert!(is_too_large(&err, "receive buffer"), "{err:?}");
    assert!(out.is_empty());
}

#[test]
fn mapped_send_total_overflows() {
    let slots = [0usize];
    let mut out: Vec<i32> = Vec::new();
    let err = Scatter::new(&NoComm, 0)
        .unwrap()
        .variable_mapped(
            SendBuf::Data(&[5i32]),
            &[usize::MAX, 1],
            Some(IndexMap::new(&slots)),
            RecvBuf::Growable(&mut out),
            RecvCount::Negotiate,
            None,
        )
        .unwrap_err();
    assert!(is_too_large(&err, "send buffer"), "{err:?}");
}

#[test]
fn recv_map_near_usize_max() {
    let run = |slot: usize| {
        let slots = [slot];
        let mut out: Vec<u32> = Vec::new();
        Scatter::new(&NoComm, 0)
            .unwrap()
            .variable_mapped(
                SendBuf::Data(&[9u32]),
                &[1],
                None,
                RecvBuf::Growable(&mut out),
                RecvCount::Negotiate,
                Some(IndexMap::new(&slots)),
            )
            .unwrap_err()
    };
    let err = run(usize::MAX - 1);
    assert!(is_too_large(&err, "receive buffer"), "{err:?}");
    assert!(matches!(run(usize::MAX), ScatterError::InvalidIndexMap(_)));
}

#[test]
fn gather_table_sum_overflows() {
    let group = LocalComm::group(2);
    let mut out = Vec::new();
    let err = gather_variable(
        &group[0],
        SendBuf::Data(&[7u8]),
        1,
        RecvBuf::Growable(&mut out),
        RecvCounts::Known(&[1, usize::MAX]),
        0,
    )
    .unwrap_err();
    assert!(is_too_large(&err, "count table"), "{err:?}");
}
