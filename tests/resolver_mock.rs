use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use memecoin_resolver::errors::DecodeError;
use memecoin_resolver::felt::{selector, Address, Felt};
use memecoin_resolver::memecoin::{
    Liquidity, MemecoinResolver, Resolution, LIQUIDITY_LOCK_FOREVER_TIMESTAMP,
};
use memecoin_resolver::multicall::Call;
use memecoin_resolver::numeric::{to_limbs, Fraction, U256};
use memecoin_resolver::registry::NetworkContext;
use memecoin_resolver::rpc_manager::{BlockId, ContractReader, RpcErrorType, TransportError};
use memecoin_resolver::security::{classify, Safety};

type Key = (Felt, Felt, Vec<Felt>);

/// In-memory chain answering direct reads and aggregator batches.
#[derive(Debug)]
struct MockChain {
    multicall: Address,
    block_number: u64,
    reads: Mutex<HashMap<Key, Vec<Felt>>>,
    offline: bool,
    delay: Option<Duration>,
    aggregate_calls: AtomicUsize,
    direct_calls: AtomicUsize,
}

impl MockChain {
    fn new(ctx: &NetworkContext) -> Self {
        Self {
            multicall: ctx.multicall,
            block_number: 650_123,
            reads: Mutex::new(HashMap::new()),
            offline: false,
            delay: None,
            aggregate_calls: AtomicUsize::new(0),
            direct_calls: AtomicUsize::new(0),
        }
    }

    fn set(&self, to: Address, entrypoint: &str, args: Vec<Felt>, result: Vec<Felt>) {
        self.reads
            .lock()
            .unwrap()
            .insert((to.felt(), selector(entrypoint), args), result);
    }

    fn lookup(&self, to: Felt, sel: Felt, args: &[Felt]) -> Result<Vec<Felt>, TransportError> {
        self.reads
            .lock()
            .unwrap()
            .get(&(to, sel, args.to_vec()))
            .cloned()
            .ok_or_else(|| TransportError::new(RpcErrorType::ContractError, "mock", "entrypoint not found"))
    }

    fn calls(&self) -> (usize, usize) {
        (
            self.aggregate_calls.load(Ordering::SeqCst),
            self.direct_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl ContractReader for MockChain {
    async fn call_contract(&self, call: &Call, _block: BlockId) -> Result<Vec<Felt>, TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline {
            return Err(TransportError::new(RpcErrorType::Timeout, "mock", "no response"));
        }

        if call.to != self.multicall || call.selector != selector("aggregate") {
            self.direct_calls.fetch_add(1, Ordering::SeqCst);
            return self.lookup(call.to.felt(), call.selector, &call.calldata);
        }

        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        let words = &call.calldata;
        let count = words[0].to_u64().unwrap() as usize;
        let mut out = vec![Felt::from(self.block_number), Felt::from(count as u64)];
        let mut at = 1;
        for _ in 0..count {
            let len = words[at + 2].to_u64().unwrap() as usize;
            // any revert fails the whole batch
            let result = self.lookup(words[at], words[at + 1], &words[at + 3..at + 3 + len])?;
            out.push(Felt::from(result.len() as u64));
            out.extend(result);
            at += 3 + len;
        }
        Ok(out)
    }
}

fn addr(hex: &str) -> Address {
    Address::parse(hex).unwrap()
}

fn word(v: u64) -> Felt {
    Felt::from(v)
}

fn u256(v: U256) -> Vec<Felt> {
    let (low, high) = to_limbs(v);
    vec![Felt::from(low), Felt::from(high)]
}

fn tokens(whole: u64) -> U256 {
    U256::from(whole) * U256::exp10(18)
}

fn eth(ctx: &NetworkContext) -> Address {
    ctx.quote_token_by_symbol("ETH").unwrap().address
}

const OWNER: &str = "0xbeef";
const LOCK_MANAGER: &str = "0x10c4";
const LOCK_POSITION: &str = "0x10c5";
const EKUBO_LAUNCHER: &str = "0xe1b0";

/// Identity reads shared by every memecoin fixture, not launched.
fn seed_memecoin(chain: &MockChain, ctx: &NetworkContext, memecoin: Address, team: U256) {
    let target = memecoin.felt();
    chain.set(ctx.factory, "is_memecoin", vec![target], vec![word(1)]);
    chain.set(memecoin, "name", vec![], vec![Felt::from_short_string("Dogs Go Moon").unwrap()]);
    chain.set(memecoin, "symbol", vec![], vec![Felt::from_short_string("DGM").unwrap()]);
    chain.set(memecoin, "is_launched", vec![], vec![word(0)]);
    chain.set(memecoin, "total_supply", vec![], u256(tokens(21_000_000)));
    chain.set(memecoin, "get_team_allocation", vec![], u256(team));
    chain.set(memecoin, "owner", vec![], vec![addr(OWNER).felt()]);
    chain.set(ctx.factory, "locked_liquidity", vec![target], vec![word(1)]);
    chain.set(memecoin, "launched_at_block_number", vec![], vec![word(0)]);
    chain.set(memecoin, "launched_with_liquidity_parameters", vec![], vec![word(1)]);
}

fn seed_jediswap_launch(chain: &MockChain, ctx: &NetworkContext, memecoin: Address, team: U256, lock_owner: Address) {
    seed_memecoin(chain, ctx, memecoin, team);
    let target = memecoin.felt();
    chain.set(memecoin, "is_launched", vec![], vec![word(1)]);
    chain.set(
        ctx.factory,
        "locked_liquidity",
        vec![target],
        vec![word(0), addr(LOCK_MANAGER).felt(), word(0), addr(LOCK_POSITION).felt()],
    );
    chain.set(memecoin, "launched_at_block_number", vec![], vec![word(640_000)]);

    let mut params = vec![word(0), word(1), eth(ctx).felt()];
    params.extend(u256(tokens(5)));
    params.push(addr(OWNER).felt());
    chain.set(memecoin, "launched_with_liquidity_parameters", vec![], params);

    let mut lock = vec![addr("0x9a12").felt(), lock_owner.felt(), word(LIQUIDITY_LOCK_FOREVER_TIMESTAMP)];
    lock.extend(u256(U256::from(1_000u64)));
    chain.set(addr(LOCK_MANAGER), "get_lock_details", vec![addr(LOCK_POSITION).felt()], lock);
}

fn seed_ekubo_launch(chain: &MockChain, ctx: &NetworkContext, memecoin: Address, starting_tick_mag: u64) {
    seed_memecoin(chain, ctx, memecoin, U256::zero());
    let target = memecoin.felt();
    chain.set(memecoin, "is_launched", vec![], vec![word(1)]);
    chain.set(
        ctx.factory,
        "locked_liquidity",
        vec![target],
        vec![word(0), addr(EKUBO_LAUNCHER).felt(), word(2), word(77)],
    );
    chain.set(memecoin, "launched_at_block_number", vec![], vec![word(640_000)]);

    let fee = Felt::from((1u128 << 127) / 50);
    let mut params = vec![word(0), word(0), addr(OWNER).felt(), memecoin.felt(), eth(ctx).felt()];
    params.extend(u256(tokens(21_000_000)));
    params.extend([fee, word(5982), word(starting_tick_mag), word(1), word(88_719_042)]);
    chain.set(memecoin, "launched_with_liquidity_parameters", vec![], params);

    let position = vec![
        addr(OWNER).felt(),
        eth(ctx).felt(),
        eth(ctx).felt(),
        memecoin.felt(),
        fee,
        word(5982),
        Felt::ZERO,
        word(starting_tick_mag),
        word(1),
        word(88_719_042),
        word(0),
    ];
    chain.set(addr(EKUBO_LAUNCHER), "liquidity_position_details", vec![word(77)], position);
}

fn resolver(chain: Arc<MockChain>, ctx: &NetworkContext) -> MemecoinResolver {
    MemecoinResolver::new(ctx.clone(), chain)
}

#[tokio::test]
async fn unrecognized_address_skips_phase_two() {
    let ctx = NetworkContext::mainnet();
    let chain = Arc::new(MockChain::new(&ctx));
    let unknown = addr("0x5555");
    // a token exposing every read, but not issued by the factory
    seed_jediswap_launch(&chain, &ctx, unknown, tokens(1), addr(OWNER));
    chain.set(ctx.factory, "is_memecoin", vec![unknown.felt()], vec![word(0)]);

    let outcome = resolver(chain.clone(), &ctx).resolve(unknown).await.unwrap();
    assert_eq!(outcome, Resolution::NotAMemecoin);
    assert_eq!(chain.calls(), (1, 0));
}

#[tokio::test]
async fn reverted_batch_checks_registration() {
    let ctx = NetworkContext::mainnet();
    let chain = Arc::new(MockChain::new(&ctx));
    let plain_account = addr("0x6666");
    chain.set(ctx.factory, "is_memecoin", vec![plain_account.felt()], vec![word(0)]);

    let outcome = resolver(chain.clone(), &ctx).resolve(plain_account).await.unwrap();
    assert_eq!(outcome, Resolution::NotAMemecoin);
    assert_eq!(chain.calls(), (1, 1));

    // a registered memecoin that still reverts is a transient state
    let registered = addr("0x7777");
    chain.set(ctx.factory, "is_memecoin", vec![registered.felt()], vec![word(1)]);
    let outcome = resolver(chain.clone(), &ctx).resolve(registered).await.unwrap();
    assert!(matches!(outcome, Resolution::TransientError { .. }));
}

#[tokio::test]
async fn transport_failure_is_transient() {
    let ctx = NetworkContext::mainnet();
    let mut chain = MockChain::new(&ctx);
    chain.offline = true;
    let outcome = resolver(Arc::new(chain), &ctx).resolve(addr("0x1234")).await.unwrap();
    match outcome {
        Resolution::TransientError { reason } => assert!(reason.contains("timeout")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn not_launched_memecoin() {
    let ctx = NetworkContext::mainnet();
    let chain = Arc::new(MockChain::new(&ctx));
    let memecoin = addr("0x2fd23d9182193775423497fc0c472e156c57c69e4089a1967fb288a2d84e914");
    seed_memecoin(&chain, &ctx, memecoin, U256::zero());

    let outcome = resolver(chain.clone(), &ctx).resolve(memecoin).await.unwrap();
    let state = outcome.memecoin().unwrap();
    assert!(!state.is_launched());
    assert_eq!(state.base.symbol, "DGM");
    assert_eq!(state.base.owner, addr(OWNER));
    assert_eq!(chain.calls(), (1, 0));
}

#[tokio::test]
async fn launched_with_heavy_team_allocation() {
    let ctx = NetworkContext::mainnet();
    let chain = Arc::new(MockChain::new(&ctx));
    let memecoin = addr("0xaaaa");
    seed_jediswap_launch(&chain, &ctx, memecoin, tokens(4_000_000), addr(OWNER));

    let outcome = resolver(chain.clone(), &ctx).resolve(memecoin).await.unwrap();
    let state = outcome.memecoin().unwrap();
    let team = state.team_allocation_percent().unwrap();
    assert_eq!(team.as_fraction(), &Fraction::from_ratio(4, 21));
    assert_eq!(team.to_string(), "19.05%");
    assert_eq!(chain.calls(), (1, 1));

    let launched = state.launched().unwrap();
    assert_eq!(launched.block_number, 640_000);
    assert!(launched.liquidity.is_locked_forever());

    let assessment = classify(state, Some(&Fraction::from(3_000u64)), 1_700_000_000);
    assert_eq!(assessment.team_allocation, Safety::Dangerous);
    assert_eq!(assessment.liquidity_lock, Safety::Safe);
    assert_eq!(assessment.aggregate, Safety::Dangerous);
}

#[tokio::test]
async fn concentrated_liquidity_reference_market_cap() {
    let ctx = NetworkContext::mainnet();
    let chain = Arc::new(MockChain::new(&ctx));
    let memecoin = addr("0xbbbb");
    seed_ekubo_launch(&chain, &ctx, memecoin, 16_354_788);

    let outcome = resolver(chain, &ctx).resolve(memecoin).await.unwrap();
    let state = outcome.memecoin().unwrap();
    match &state.launched().unwrap().liquidity {
        Liquidity::ConcentratedLiquidity(l) => {
            assert_eq!(l.starting_tick, -16_354_788);
            assert_eq!(l.position_id, 77);
            assert_eq!(l.unlock_time, LIQUIDITY_LOCK_FOREVER_TIMESTAMP);
            assert_eq!(l.bounds.lower, -16_354_788);
            assert_eq!(l.bounds.upper, 88_719_042);
        }
        other => panic!("unexpected {other:?}"),
    }

    let price = Fraction::from(3_000u64);
    let mcap = state.starting_market_cap(Some(&price)).unwrap();
    assert_eq!(mcap.to_fixed(0), "4972");
    let assessment = classify(state, Some(&price), 1_700_000_000);
    assert_eq!(assessment.starting_market_cap, Safety::Dangerous);
}

#[tokio::test]
async fn unmaterialised_lock_is_indexing() {
    let ctx = NetworkContext::mainnet();
    let chain = Arc::new(MockChain::new(&ctx));
    let memecoin = addr("0xcccc");
    seed_jediswap_launch(&chain, &ctx, memecoin, tokens(1), Address::ZERO);

    let outcome = resolver(chain, &ctx).resolve(memecoin).await.unwrap();
    assert_eq!(outcome, Resolution::Indexing);
}

#[tokio::test]
async fn layout_mismatch_is_an_error() {
    let ctx = NetworkContext::mainnet();
    let chain = Arc::new(MockChain::new(&ctx));
    let memecoin = addr("0xdddd");
    seed_memecoin(&chain, &ctx, memecoin, U256::zero());
    chain.set(memecoin, "total_supply", vec![], vec![word(1)]);

    let err = resolver(chain, &ctx).resolve(memecoin).await.unwrap_err();
    assert!(matches!(err, DecodeError::Arity { call: "total_supply", .. }));
}

#[tokio::test]
async fn resolution_is_deterministic() {
    let ctx = NetworkContext::mainnet();
    let chain = Arc::new(MockChain::new(&ctx));
    let memecoin = addr("0xeeee");
    seed_jediswap_launch(&chain, &ctx, memecoin, tokens(100_000), addr(OWNER));

    let resolver = resolver(chain, &ctx);
    let first = resolver.resolve(memecoin).await.unwrap();
    let second = resolver.resolve(memecoin).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn concurrent_resolutions_share_one_flight() {
    let ctx = NetworkContext::mainnet();
    let mut chain = MockChain::new(&ctx);
    chain.delay = Some(Duration::from_millis(20));
    let chain = Arc::new(chain);
    let memecoin = addr("0xf00d");
    seed_memecoin(&chain, &ctx, memecoin, U256::zero());

    let resolver = resolver(chain.clone(), &ctx);
    let outcomes = futures::future::join_all((0..8).map(|_| resolver.resolve_shared(memecoin))).await;
    assert!(outcomes.iter().all(|o| o.as_ref().unwrap().memecoin().is_some()));
    assert_eq!(chain.calls(), (1, 0));

    // cached until invalidated
    resolver.resolve_shared(memecoin).await.unwrap();
    assert_eq!(chain.calls(), (1, 0));
    resolver.invalidate(&memecoin).await;
    resolver.resolve_shared(memecoin).await.unwrap();
    assert_eq!(chain.calls(), (2, 0));
}

#[tokio::test]
async fn transient_outcomes_are_not_cached() {
    let ctx = NetworkContext::mainnet();
    let mut chain = MockChain::new(&ctx);
    chain.offline = true;
    let chain = Arc::new(chain);
    let resolver = resolver(chain.clone(), &ctx);

    for _ in 0..2 {
        let outcome = resolver.resolve_shared(addr("0x1234")).await.unwrap();
        assert!(!outcome.is_definitive());
    }
    assert_eq!(chain.calls(), (0, 0));
}

#[tokio::test]
async fn resolve_many_keeps_input_order() {
    let ctx = NetworkContext::mainnet();
    let chain = Arc::new(MockChain::new(&ctx));
    let memecoin = addr("0xabcd");
    let stranger = addr("0xdcba");
    seed_memecoin(&chain, &ctx, memecoin, U256::zero());
    chain.set(ctx.factory, "is_memecoin", vec![stranger.felt()], vec![word(0)]);

    let results = resolver(chain, &ctx).resolve_many(&[stranger, memecoin]).await;
    assert_eq!(results[0].0, stranger);
    assert_eq!(results[0].1, Ok(Resolution::NotAMemecoin));
    assert_eq!(results[1].0, memecoin);
    assert!(results[1].1.as_ref().unwrap().memecoin().is_some());
}
