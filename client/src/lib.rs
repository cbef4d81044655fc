#![deny(unused_crate_dependencies)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Interactions with the `BlobstreamX` on-chain contract.

mod address;
pub mod blobstreamx;

pub use address::{validate_address, AddressError};
pub use blobstreamx::{CommitmentEvent, DataCommitmentStoredFilter};
