//! USD prices for quote tokens, read from their registry pricing pairs.

use tracing::debug;

use crate::errors::ResolveError;
use crate::memecoin::cursor::{Read, ResultCursor};
use crate::memecoin::MemecoinState;
use crate::multicall::{Call, Multicall};
use crate::numeric::{Fraction, U256};
use crate::registry::QuoteToken;
use crate::rpc_manager::BlockId;

const GET_RESERVES: Read = Read::exact("get_reserves", 5);

#[derive(Debug, Clone)]
pub struct QuotePriceFetcher {
    multicall: Multicall,
}

/// `reserve_usd / reserve_quote`, both in whole units.
pub fn price_from_reserves(quote: &QuoteToken, usd_decimals: u8, reserve_quote: U256, reserve_usd: U256) -> Option<Fraction> {
    if reserve_quote.is_zero() {
        return None;
    }
    let quote_units = Fraction::from(reserve_quote) / Fraction::decimal_scale(quote.decimals as u32);
    let usd_units = Fraction::from(reserve_usd) / Fraction::decimal_scale(usd_decimals as u32);
    Some(usd_units / quote_units)
}

impl QuotePriceFetcher {
    pub fn new(multicall: Multicall) -> Self {
        Self { multicall }
    }

    /// Exact USD price of one `token` at `block`. `None` when the token has no
    /// pricing pair or the pair is empty.
    pub async fn usd_price(&self, token: &QuoteToken, block: BlockId) -> Result<Option<Fraction>, ResolveError> {
        if token.usd_stable {
            return Ok(Some(Fraction::one()));
        }
        let Some(pair) = token.pricing_pair else {
            return Ok(None);
        };

        let call = Call::new(pair.address, GET_RESERVES.name, vec![]);
        let response = self.multicall.aggregate(&[call], block).await?;
        let mut cursor = ResultCursor::new(&response.results);
        let mut group = cursor.group(GET_RESERVES)?;
        let reserve0 = group.u256("reserve0")?;
        let reserve1 = group.u256("reserve1")?;
        let _timestamp = group.u64("block_timestamp_last")?;
        group.finish()?;
        cursor.finish()?;

        let (reserve_quote, reserve_usd) = if pair.reversed {
            (reserve1, reserve0)
        } else {
            (reserve0, reserve1)
        };
        let price = price_from_reserves(token, pair.usd_decimals, reserve_quote, reserve_usd);
        debug!(
            token = token.symbol,
            block_number = response.block_number,
            price = price.as_ref().map(|p| p.to_fixed(4)).unwrap_or_default(),
            "quote price read"
        );
        Ok(price)
    }

    /// Quote token price at the memecoin's launch block, as the classifier
    /// expects it. `None` for unlaunched coins and unknown quote tokens.
    pub async fn price_at_launch(&self, state: &MemecoinState) -> Result<Option<Fraction>, ResolveError> {
        let Some(launched) = state.launched() else {
            return Ok(None);
        };
        let Some(quote) = launched.quote_token.as_ref() else {
            return Ok(None);
        };
        self.usd_price(quote, BlockId::Number(launched.block_number)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NetworkContext;

    #[test]
    fn reserves_to_price() {
        let ctx = NetworkContext::mainnet();
        let eth = ctx.quote_token_by_symbol("ETH").unwrap();
        // 10 ETH against 30,000 USDC
        let price = price_from_reserves(
            eth,
            6,
            U256::from(10u64) * U256::exp10(18),
            U256::from(30_000u64) * U256::exp10(6),
        );
        assert_eq!(price, Some(Fraction::from(3_000u64)));
        assert_eq!(price_from_reserves(eth, 6, U256::zero(), U256::one()), None);
    }
}
