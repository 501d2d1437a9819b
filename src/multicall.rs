//! Batched contract reads through the on-chain aggregator.
//!
//! Request: `[count, (to, selector, len, args...)*]`.
//! Response: `[block_number, count, (len, words...)*]`.
//!
//! The batch is atomic. A transport failure or a revert in any read fails the
//! whole call and no partial groups are ever returned.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::errors::{DecodeError, ResolveError};
use crate::felt::{selector, Address, Felt};
use crate::rpc_manager::{BlockId, ContractReader};

const AGGREGATE_ENTRYPOINT: &str = "aggregate";

/// One contract read or invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Call {
    pub to: Address,
    pub selector: Felt,
    pub calldata: Vec<Felt>,
}

impl Call {
    pub fn new(to: Address, entrypoint: &str, calldata: Vec<Felt>) -> Self {
        Self {
            to,
            selector: selector(entrypoint),
            calldata,
        }
    }
}

pub fn encode_aggregate(calls: &[Call]) -> Vec<Felt> {
    let words = 1 + calls.iter().map(|c| 3 + c.calldata.len()).sum::<usize>();
    let mut out = Vec::with_capacity(words);
    out.push(Felt::from(calls.len() as u64));
    for call in calls {
        out.push(call.to.felt());
        out.push(call.selector);
        out.push(Felt::from(call.calldata.len() as u64));
        out.extend_from_slice(&call.calldata);
    }
    out
}

/// Result groups in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResponse {
    pub block_number: u64,
    pub results: Vec<Vec<Felt>>,
}

fn read_usize(raw: &[Felt], at: usize, what: &str) -> Result<usize, DecodeError> {
    let word = raw
        .get(at)
        .ok_or_else(|| DecodeError::MalformedAggregate(format!("missing {what} at word {at}")))?;
    word.to_u64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| DecodeError::MalformedAggregate(format!("{what} {word} out of range")))
}

pub fn decode_aggregate(raw: &[Felt], expected: usize) -> Result<AggregateResponse, DecodeError> {
    let block_number = read_usize(raw, 0, "block number")? as u64;
    let count = read_usize(raw, 1, "group count")?;
    if count != expected {
        return Err(DecodeError::GroupCount { expected, got: count });
    }

    let mut cursor = 2;
    let mut results = Vec::with_capacity(count);
    for index in 0..count {
        let len = read_usize(raw, cursor, "group length")?;
        let start = cursor + 1;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= raw.len())
            .ok_or_else(|| {
                DecodeError::MalformedAggregate(format!("group {index} declares {len} words past the end"))
            })?;
        results.push(raw[start..end].to_vec());
        cursor = end;
    }

    if cursor != raw.len() {
        return Err(DecodeError::MalformedAggregate(format!(
            "{} trailing words after {count} groups",
            raw.len() - cursor
        )));
    }

    Ok(AggregateResponse { block_number, results })
}

/// Client for the aggregator contract of one network.
#[derive(Debug, Clone)]
pub struct Multicall {
    reader: Arc<dyn ContractReader>,
    address: Address,
}

impl Multicall {
    pub fn new(reader: Arc<dyn ContractReader>, address: Address) -> Self {
        Self { reader, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn reader(&self) -> &Arc<dyn ContractReader> {
        &self.reader
    }

    pub async fn aggregate(&self, calls: &[Call], block: BlockId) -> Result<AggregateResponse, ResolveError> {
        let request = Call::new(self.address, AGGREGATE_ENTRYPOINT, encode_aggregate(calls));
        let raw = self.reader.call_contract(&request, block).await?;
        let response = decode_aggregate(&raw, calls.len())?;
        debug!(
            calls = calls.len(),
            words = raw.len(),
            block_number = response.block_number,
            "aggregate decoded"
        );
        Ok(response)
    }
}
