//! Shared core for Vaultsync: the three-way merge engine, the revision
//! codec, path rules, wire types, and the device-pairing codec. Both the
//! server and the client build on this crate.

pub mod merge;
pub mod pairing;
pub mod paths;
pub mod protocol;
pub mod revision;

pub use merge::{
    compute_common_base, three_way_merge, ConflictRegion, MergeError, MergeOutcome,
};
