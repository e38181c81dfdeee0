#![cfg_attr(docsrs, feature(doc_cfg))]
//! # pe-scatter
//!
//! pe-scatter provides the scatter collective of a parallel environment: a
//! root rank distributes contiguous blocks of a buffer to every rank of a
//! process group, in rank order. Gather, its mirror, is included.
//!
//! ## Features
//! - Fixed and variable block sizes, with receive-count negotiation for ranks
//!   that do not know how much they will get
//! - Typed buffers (`T: bytemuck::Pod`) and raw bytes with an explicit element size
//! - In-place operation on the root and auto-sizing of growable receive buffers
//! - Index-mapped scatter for permuted send and receive layouts
//! - Pluggable transports: serial ([`NoComm`](algs::communicator::NoComm)),
//!   in-process threads ([`LocalComm`](algs::communicator::LocalComm)) and MPI
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! pe-scatter = "0.3"
//! # features = ["mpi-support"]
//! ```
//!
//! ```
//! use pe_scatter::prelude::*;
//!
//! let mut mine = Vec::new();
//! scatter_fixed(&NoComm, SendBuf::Data(&[1.0f64, 2.0]), 2, RecvBuf::Growable(&mut mine), 0)?;
//! assert_eq!(mine, vec![1.0, 2.0]);
//! # Ok::<(), ScatterError>(())
//! ```
//!
//! ## Failure model
//!
//! Every operation is a collective: all ranks of the group make the matching
//! call with the same root and element size. Errors are reported on the rank
//! that detects them; the other ranks are left waiting, so a caller that sees
//! an error must abort the group.

pub mod algs;
pub mod comm_error;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{
        CollectiveTags, CommTag, Communicator, LocalComm, NoComm, Wait,
    };
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::gather::{Gather, RecvCounts, gather_fixed, gather_variable};
    pub use crate::algs::scatter::{
        ElemSize, IndexMap, Received, RecvBuf, RecvCount, Scatter, SendBuf, scatter_fixed,
        scatter_fixed_bytes, scatter_variable, scatter_variable_bytes,
    };
    pub use crate::comm_error::ScatterError;
}
