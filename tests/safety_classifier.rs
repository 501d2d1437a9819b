use memecoin_resolver::felt::Address;
use memecoin_resolver::memecoin::{
    Amm, BaseMemecoin, LaunchStatus, LaunchedMemecoin, Liquidity, MemecoinState, Resolution,
    StandardAmmLiquidity, LIQUIDITY_LOCK_FOREVER_TIMESTAMP,
};
use memecoin_resolver::numeric::{Fraction, U256};
use memecoin_resolver::registry::NetworkContext;
use memecoin_resolver::security::{classify, classify_resolution, Safety};

const NOW: u64 = 1_710_000_000;
const DAY: u64 = 86_400;

fn addr(hex: &str) -> Address {
    Address::parse(hex).unwrap()
}

fn tokens(whole: u64) -> U256 {
    U256::from(whole) * U256::exp10(18)
}

fn launched(team: U256, quote_eth: u64, unlock_time: u64, quote: Address) -> MemecoinState {
    let ctx = NetworkContext::mainnet();
    MemecoinState {
        base: BaseMemecoin {
            address: addr("0xaaaa"),
            name: "Dogs Go Moon".into(),
            symbol: "DGM".into(),
            owner: addr("0xbeef"),
            decimals: 18,
            total_supply: tokens(21_000_000),
        },
        launch: LaunchStatus::Launched(LaunchedMemecoin {
            team_allocation: team,
            block_number: 640_000,
            liquidity: Liquidity::StandardAmm(StandardAmmLiquidity {
                amm: Amm::JediSwap,
                lock_manager: addr("0x10c4"),
                lock_position: addr("0x10c5"),
                pair: addr("0x9a12"),
                quote_token: quote,
                quote_amount: tokens(quote_eth),
                unlock_time,
                owner: addr("0xbeef"),
            }),
            quote_token: ctx.quote_token(&quote).cloned(),
        }),
    }
}

fn eth() -> Address {
    NetworkContext::mainnet().quote_token_by_symbol("ETH").unwrap().address
}

#[test]
fn healthy_launch_is_safe() {
    let state = launched(tokens(100_000), 5, LIQUIDITY_LOCK_FOREVER_TIMESTAMP, eth());
    let assessment = classify(&state, Some(&Fraction::from(3_000u64)), NOW);
    assert_eq!(assessment.team_allocation, Safety::Safe);
    assert_eq!(assessment.liquidity_lock, Safety::Safe);
    assert_eq!(assessment.quote_token, Safety::Safe);
    assert_eq!(assessment.starting_market_cap, Safety::Safe);
    assert_eq!(assessment.aggregate, Safety::Safe);
    assert!(assessment.flagged().is_empty());
}

#[test]
fn lock_tiers_follow_remaining_time() {
    let price = Fraction::from(3_000u64);
    let tier = |unlock: u64| classify(&launched(U256::zero(), 5, unlock, eth()), Some(&price), NOW).liquidity_lock;

    assert_eq!(tier(NOW + 100 * 365 * DAY), Safety::Safe);
    assert_eq!(tier(NOW + 90 * DAY), Safety::Correct);
    assert_eq!(tier(NOW + 90 * DAY - 1), Safety::Dangerous);
    assert_eq!(tier(NOW - 1), Safety::Dangerous);
}

#[test]
fn unknown_quote_token_is_dangerous() {
    let state = launched(U256::zero(), 5, LIQUIDITY_LOCK_FOREVER_TIMESTAMP, addr("0x7070"));
    let assessment = classify(&state, Some(&Fraction::from(3_000u64)), NOW);
    assert_eq!(assessment.quote_token, Safety::Dangerous);
    // no price can be attached to an unknown quote
    assert_eq!(assessment.starting_market_cap, Safety::Dangerous);
    assert_eq!(assessment.aggregate, Safety::Dangerous);
}

#[test]
fn unresolved_states_are_unknown() {
    for resolution in [
        Resolution::NotAMemecoin,
        Resolution::Indexing,
        Resolution::TransientError { reason: "timeout".into() },
    ] {
        let assessment = classify_resolution(&resolution, None, NOW);
        assert_eq!(assessment.aggregate, Safety::Unknown);
    }

    let mut state = launched(U256::zero(), 5, LIQUIDITY_LOCK_FOREVER_TIMESTAMP, eth());
    state.launch = LaunchStatus::NotLaunched;
    assert_eq!(classify(&state, None, NOW).team_allocation, Safety::Unknown);
}

#[test]
fn more_team_allocation_never_improves_safety() {
    let price = Fraction::from(3_000u64);
    let severities: Vec<u8> = [0u64, 100_000, 210_000, 1_000_000, 2_100_000, 4_000_000, 10_000_000]
        .iter()
        .map(|team| {
            let state = launched(tokens(*team), 2, NOW + 200 * DAY, eth());
            classify(&state, Some(&price), NOW).aggregate.severity().unwrap()
        })
        .collect();
    assert!(severities.windows(2).all(|w| w[0] <= w[1]), "{severities:?}");
}

#[test]
fn classification_is_deterministic() {
    let state = launched(tokens(1_500_000), 3, NOW + 120 * DAY, eth());
    let price = Fraction::from(2_500u64);
    let first = classify(&state, Some(&price), NOW);
    for _ in 0..10 {
        assert_eq!(classify(&state, Some(&price), NOW), first);
    }
}
