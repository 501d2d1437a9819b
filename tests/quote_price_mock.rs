use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use memecoin_resolver::errors::{DecodeError, ResolveError};
use memecoin_resolver::felt::{selector, Address, Felt};
use memecoin_resolver::memecoin::{
    Amm, BaseMemecoin, LaunchStatus, LaunchedMemecoin, Liquidity, MemecoinState, StandardAmmLiquidity,
};
use memecoin_resolver::multicall::{Call, Multicall};
use memecoin_resolver::numeric::{to_limbs, Fraction, U256};
use memecoin_resolver::quote_price::QuotePriceFetcher;
use memecoin_resolver::registry::{NetworkContext, PricingPair, QuoteToken};
use memecoin_resolver::rpc_manager::{BlockId, ContractReader, RpcErrorType, TransportError};

/// Aggregator that answers a single `get_reserves` read with fixed words.
#[derive(Debug)]
struct ReservesChain {
    reply: Result<Vec<Felt>, TransportError>,
    seen_blocks: Mutex<Vec<BlockId>>,
    calls: AtomicUsize,
}

impl ReservesChain {
    fn answering(reply: Result<Vec<Felt>, TransportError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            seen_blocks: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn with_reserves(reserve0: U256, reserve1: U256) -> Arc<Self> {
        let mut words = u256(reserve0);
        words.extend(u256(reserve1));
        words.push(Felt::from(1_709_999_000u64));
        Self::answering(Ok(words))
    }
}

#[async_trait]
impl ContractReader for ReservesChain {
    async fn call_contract(&self, call: &Call, block: BlockId) -> Result<Vec<Felt>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_blocks.lock().unwrap().push(block);
        assert_eq!(call.selector, selector("aggregate"));
        // one read: [1, pair, selector, 0]
        assert_eq!(call.calldata[0], Felt::ONE);
        assert_eq!(call.calldata[2], selector("get_reserves"));

        let words = self.reply.clone()?;
        let mut out = vec![Felt::from(650_000u64), Felt::ONE, Felt::from(words.len() as u64)];
        out.extend(words);
        Ok(out)
    }
}

fn u256(v: U256) -> Vec<Felt> {
    let (low, high) = to_limbs(v);
    vec![Felt::from(low), Felt::from(high)]
}

fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(18)
}

fn usdc(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(6)
}

fn fetcher(chain: Arc<ReservesChain>) -> QuotePriceFetcher {
    let ctx = NetworkContext::mainnet();
    QuotePriceFetcher::new(Multicall::new(chain, ctx.multicall))
}

fn eth() -> &'static QuoteToken {
    NetworkContext::mainnet().quote_token_by_symbol("ETH").unwrap()
}

#[tokio::test]
async fn prices_quote_token_from_its_pair() {
    let chain = ReservesChain::with_reserves(ether(10), usdc(31_000));
    let price = fetcher(chain.clone()).usd_price(eth(), BlockId::Latest).await.unwrap();
    assert_eq!(price, Some(Fraction::from(3_100u64)));
    assert_eq!(chain.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reversed_pair_reads_the_other_reserve() {
    let mut token = eth().clone();
    token.pricing_pair = Some(PricingPair {
        address: Address::parse("0x5a1e").unwrap(),
        reversed: true,
        usd_decimals: 6,
    });
    // the stable is token0 here
    let chain = ReservesChain::with_reserves(usdc(25_000), ether(10));
    let price = fetcher(chain).usd_price(&token, BlockId::Latest).await.unwrap();
    assert_eq!(price, Some(Fraction::from(2_500u64)));
}

#[tokio::test]
async fn stables_and_unpriced_tokens_skip_the_chain() {
    let chain = ReservesChain::with_reserves(ether(1), usdc(1));
    let prices = fetcher(chain.clone());

    let usdc_token = NetworkContext::mainnet().quote_token_by_symbol("USDC").unwrap();
    assert_eq!(prices.usd_price(usdc_token, BlockId::Latest).await.unwrap(), Some(Fraction::one()));

    let sepolia = NetworkContext::sepolia(Address::parse("0x123").unwrap());
    let sepolia_eth = sepolia.quote_token_by_symbol("ETH").unwrap();
    assert_eq!(prices.usd_price(sepolia_eth, BlockId::Latest).await.unwrap(), None);

    assert_eq!(chain.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_pair_has_no_price() {
    let chain = ReservesChain::with_reserves(U256::zero(), usdc(1_000));
    assert_eq!(fetcher(chain).usd_price(eth(), BlockId::Latest).await.unwrap(), None);
}

#[tokio::test]
async fn reserve_layout_and_transport_errors_surface() {
    let short = ReservesChain::answering(Ok(vec![Felt::ONE; 4]));
    let err = fetcher(short).usd_price(eth(), BlockId::Latest).await.unwrap_err();
    assert!(matches!(err, ResolveError::Decode(DecodeError::Arity { call: "get_reserves", .. })));

    let offline = ReservesChain::answering(Err(TransportError::new(RpcErrorType::Timeout, "mock", "no response")));
    let err = fetcher(offline).usd_price(eth(), BlockId::Latest).await.unwrap_err();
    assert!(matches!(err, ResolveError::Transport(ref t) if t.kind == RpcErrorType::Timeout));
}

#[tokio::test]
async fn launch_price_is_read_at_the_launch_block() {
    let chain = ReservesChain::with_reserves(ether(4), usdc(12_000));
    let prices = fetcher(chain.clone());
    let owner = Address::parse("0xbeef").unwrap();
    let base = BaseMemecoin {
        address: Address::parse("0xaaaa").unwrap(),
        name: "Dogs Go Moon".into(),
        symbol: "DGM".into(),
        owner,
        decimals: 18,
        total_supply: ether(21_000_000),
    };

    let unlaunched = MemecoinState {
        base: base.clone(),
        launch: LaunchStatus::NotLaunched,
    };
    assert_eq!(prices.price_at_launch(&unlaunched).await.unwrap(), None);

    let launched = MemecoinState {
        base,
        launch: LaunchStatus::Launched(LaunchedMemecoin {
            team_allocation: U256::zero(),
            block_number: 640_000,
            liquidity: Liquidity::StandardAmm(StandardAmmLiquidity {
                amm: Amm::JediSwap,
                lock_manager: Address::parse("0x10c4").unwrap(),
                lock_position: Address::parse("0x10c5").unwrap(),
                pair: Address::parse("0x9a12").unwrap(),
                quote_token: eth().address,
                quote_amount: ether(5),
                unlock_time: 1_900_000_000,
                owner,
            }),
            quote_token: Some(eth().clone()),
        }),
    };
    assert_eq!(prices.price_at_launch(&launched).await.unwrap(), Some(Fraction::from(3_000u64)));
    assert_eq!(*chain.seen_blocks.lock().unwrap(), vec![BlockId::Number(640_000)]);
}
