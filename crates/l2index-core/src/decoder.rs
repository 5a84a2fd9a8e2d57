//! Family decoders: raw L1 logs → [`DecodedCheckpoint`].
//!
//! Dispatch is a plain match on [`ChainFamily`]; each family function checks the
//! log shape before handing it to the typed `sol!` decoder, so a malformed log
//! surfaces as a precise [`DecodeError`] instead of a generic ABI failure.

use alloy_primitives::U256;
use alloy_sol_types::{sol, SolEvent};

use crate::chain::{ChainDescriptor, ChainFamily};
use crate::error::DecodeError;
use crate::types::{DecodedCheckpoint, L2Anchor, RawLogEvent};

sol! {
    /// L2OutputOracle: a new L2 output was proposed.
    event OutputProposed(
        bytes32 indexed outputRoot,
        uint256 indexed l2OutputIndex,
        uint256 indexed l2BlockNumber,
        uint256 l1Timestamp
    );

    /// Arbitrum Outbox: a new send root was confirmed.
    event SendRootUpdated(bytes32 indexed outputRoot, bytes32 indexed l2BlockHash);
}

const OUTPUT_PROPOSED_TOPICS: usize = 4;
const OUTPUT_PROPOSED_DATA_LEN: usize = 32;
const SEND_ROOT_UPDATED_TOPICS: usize = 3;

/// Decode one raw log emitted by `descriptor.contract`.
pub fn decode(
    log: &RawLogEvent,
    descriptor: &ChainDescriptor,
) -> Result<DecodedCheckpoint, DecodeError> {
    if log.address != descriptor.contract {
        return Err(DecodeError::UnexpectedEmitter {
            expected: descriptor.contract,
            got: log.address,
        });
    }

    match descriptor.family {
        ChainFamily::OpStack => decode_output_proposed(log, descriptor),
        ChainFamily::Arbitrum => decode_send_root_updated(log, descriptor),
    }
}

fn decode_output_proposed(
    log: &RawLogEvent,
    descriptor: &ChainDescriptor,
) -> Result<DecodedCheckpoint, DecodeError> {
    check_shape::<OutputProposed>(log, OUTPUT_PROPOSED_TOPICS, OUTPUT_PROPOSED_DATA_LEN)?;

    let event = OutputProposed::decode_raw_log(log.topics.iter().copied(), &log.data, true)
        .map_err(|e| DecodeError::Abi {
            reason: e.to_string(),
        })?;

    Ok(DecodedCheckpoint {
        family: ChainFamily::OpStack,
        network: descriptor.network,
        anchor: L2Anchor::BlockNumber(to_u64("l2BlockNumber", event.l2BlockNumber)?),
        output_root: event.outputRoot,
        l2_output_index: Some(to_u64("l2OutputIndex", event.l2OutputIndex)?),
        l1_timestamp: Some(to_u64("l1Timestamp", event.l1Timestamp)?),
        l1_block_number: log.block_number,
        l1_block_hash: log.block_hash,
        l1_tx_hash: log.tx_hash,
        l1_tx_index: log.tx_index,
        log_index: log.log_index,
    })
}

fn decode_send_root_updated(
    log: &RawLogEvent,
    descriptor: &ChainDescriptor,
) -> Result<DecodedCheckpoint, DecodeError> {
    check_shape::<SendRootUpdated>(log, SEND_ROOT_UPDATED_TOPICS, 0)?;

    let event = SendRootUpdated::decode_raw_log(log.topics.iter().copied(), &log.data, true)
        .map_err(|e| DecodeError::Abi {
            reason: e.to_string(),
        })?;

    Ok(DecodedCheckpoint {
        family: ChainFamily::Arbitrum,
        network: descriptor.network,
        anchor: L2Anchor::BlockHash(event.l2BlockHash),
        output_root: event.outputRoot,
        l2_output_index: None,
        l1_timestamp: None,
        l1_block_number: log.block_number,
        l1_block_hash: log.block_hash,
        l1_tx_hash: log.tx_hash,
        l1_tx_index: log.tx_index,
        log_index: log.log_index,
    })
}

fn check_shape<E: SolEvent>(
    log: &RawLogEvent,
    topics: usize,
    data_len: usize,
) -> Result<(), DecodeError> {
    if log.topics.len() != topics {
        return Err(DecodeError::TopicCount {
            expected: topics,
            got: log.topics.len(),
        });
    }
    if log.topics[0] != E::SIGNATURE_HASH {
        return Err(DecodeError::UnexpectedSignature {
            expected: E::SIGNATURE_HASH,
            got: log.topics[0],
        });
    }
    if log.data.len() != data_len {
        return Err(DecodeError::DataLength {
            expected: data_len,
            got: log.data.len(),
        });
    }
    Ok(())
}

fn to_u64(field: &'static str, value: U256) -> Result<u64, DecodeError> {
    u64::try_from(value).map_err(|_| DecodeError::NumericOverflow { field, value })
}
