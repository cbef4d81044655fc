//! ABI wrappers for the `BlobstreamX` contract.

use ethers::types::U256;

#[allow(missing_docs)]
pub mod codegen {
    use ethers::prelude::abigen;

    abigen!(
        BlobstreamX,
        r#"[
            event DataCommitmentStored(uint256 proofNonce, uint64 indexed startBlock, uint64 indexed endBlock, bytes32 indexed dataCommitment)
        ]"#
    );
}

pub use codegen::DataCommitmentStoredFilter;

/// A data commitment stored by the relayer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentEvent {
    /// Nonce of the commitment proof.
    ///
    /// Non-decreasing along the stream, but gaps and repeats are possible.
    pub proof_nonce: u64,

    /// The committed data root tuple root.
    pub data_commitment: [u8; 32],

    /// First block of the committed range.
    pub start_block: u64,

    /// Last block of the committed range.
    pub end_block: u64,
}

impl CommitmentEvent {
    /// Hex representation of the commitment without the `0x` prefix.
    pub fn data_commitment_hex(&self) -> String {
        hex::encode(self.data_commitment)
    }

    /// Nonce as a metric sample.
    pub fn nonce_sample(&self) -> i64 {
        i64::try_from(self.proof_nonce).unwrap_or(i64::MAX)
    }

    /// End block as a metric sample.
    pub fn height_sample(&self) -> i64 {
        i64::try_from(self.end_block).unwrap_or(i64::MAX)
    }
}

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

impl From<DataCommitmentStoredFilter> for CommitmentEvent {
    fn from(event: DataCommitmentStoredFilter) -> Self {
        Self {
            proof_nonce: saturating_u64(event.proof_nonce),
            data_commitment: event.data_commitment,
            start_block: event.start_block,
            end_block: event.end_block,
        }
    }
}

#[cfg(test)]
mod tests {
    use ethers::{
        abi::{self, RawLog, Token},
        contract::EthEvent,
        types::H256,
        utils::keccak256,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    fn raw_log(nonce: U256, start: u64, end: u64, commitment: [u8; 32]) -> RawLog {
        RawLog {
            topics: vec![
                DataCommitmentStoredFilter::signature(),
                H256::from_low_u64_be(start),
                H256::from_low_u64_be(end),
                H256::from(commitment),
            ],
            data: abi::encode(&[Token::Uint(nonce)]),
        }
    }

    #[test]
    fn event_signature_matches_contract() {
        assert_eq!(
            DataCommitmentStoredFilter::signature(),
            H256::from(keccak256("DataCommitmentStored(uint256,uint64,uint64,bytes32)"))
        );
    }

    #[test]
    fn decodes_stored_commitment() {
        let log = raw_log(U256::from(42), 100, 200, [0xab; 32]);

        let event: CommitmentEvent = DataCommitmentStoredFilter::decode_log(&log).unwrap().into();

        assert_eq!(
            event,
            CommitmentEvent {
                proof_nonce: 42,
                data_commitment: [0xab; 32],
                start_block: 100,
                end_block: 200,
            }
        );
        assert_eq!(event.data_commitment_hex(), "ab".repeat(32));
    }

    #[test]
    fn oversized_values_saturate() {
        let log = raw_log(U256::MAX, 0, u64::MAX, [0; 32]);

        let event: CommitmentEvent = DataCommitmentStoredFilter::decode_log(&log).unwrap().into();

        assert_eq!(event.proof_nonce, u64::MAX);
        assert_eq!(event.nonce_sample(), i64::MAX);
        assert_eq!(event.height_sample(), i64::MAX);
    }
}
