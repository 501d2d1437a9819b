//! Per-network contract addresses and the quote-token table.
//!
//! Nothing in the crate reads an ambient "current chain": every resolver,
//! builder and price call receives a [`NetworkContext`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::felt::{Address, Felt};

pub const MAINNET_FACTORY: &str = "0x01a46467a9246f45c8c340f1f155266a26a71c07bd55d36e8d1c7d0d438a2dbc";
pub const MULTICALL: &str = "0x01a33330996310a1e3fa1df5b16c1e07f0491fdd20c441126e02613b948f0225";

const ETH: &str = "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7";
const STRK: &str = "0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d";
const USDC: &str = "0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8";
const ETH_USDC_PAIR: &str = "0x04d0390b777b424e43839cd1e744799f3de6c176c7e32c1812a41dbd9c19db6a";
const STRK_USDC_PAIR: &str = "0x05726725e9507c3586cc0516449e2c74d9b201ab2747752bb0251aaa263c9a26";

const USDC_DECIMALS: u8 = 6;

fn known(address: &str) -> Address {
    Address::parse(address).expect("invalid registry address literal")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Sepolia,
}

impl Network {
    pub fn chain_id(&self) -> Felt {
        match self {
            Network::Mainnet => Felt::from_short_string("SN_MAIN"),
            Network::Sepolia => Felt::from_short_string("SN_SEPOLIA"),
        }
        .unwrap_or_default()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Sepolia => "sepolia",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "sn_main" => Ok(Network::Mainnet),
            "sepolia" | "sn_sepolia" => Ok(Network::Sepolia),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// AMM pair used to price a quote token in USD.
///
/// The quote token is `token0` unless `reversed` is set; the other side is a
/// dollar stable with `usd_decimals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PricingPair {
    pub address: Address,
    pub reversed: bool,
    pub usd_decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QuoteToken {
    pub address: Address,
    pub symbol: &'static str,
    pub name: &'static str,
    pub decimals: u8,
    /// Dollar stables price at exactly 1.
    pub usd_stable: bool,
    pub pricing_pair: Option<PricingPair>,
}

static QUOTE_TOKENS: Lazy<HashMap<Network, Vec<QuoteToken>>> = Lazy::new(|| {
    let ether = |pair: Option<PricingPair>| QuoteToken {
        address: known(ETH),
        symbol: "ETH",
        name: "Ether",
        decimals: 18,
        usd_stable: false,
        pricing_pair: pair,
    };
    let stark = |pair: Option<PricingPair>| QuoteToken {
        address: known(STRK),
        symbol: "STRK",
        name: "Starknet Token",
        decimals: 18,
        usd_stable: false,
        pricing_pair: pair,
    };
    let usdc_pair = |address: &str| PricingPair {
        address: known(address),
        reversed: false,
        usd_decimals: USDC_DECIMALS,
    };

    let mainnet = vec![
        ether(Some(usdc_pair(ETH_USDC_PAIR))),
        stark(Some(usdc_pair(STRK_USDC_PAIR))),
        QuoteToken {
            address: known(USDC),
            symbol: "USDC",
            name: "USD Coin",
            decimals: USDC_DECIMALS,
            usd_stable: true,
            pricing_pair: None,
        },
    ];
    let sepolia = vec![ether(None), stark(None)];

    HashMap::from([(Network::Mainnet, mainnet), (Network::Sepolia, sepolia)])
});

pub fn quote_tokens(network: Network) -> &'static [QuoteToken] {
    QUOTE_TOKENS.get(&network).map(Vec::as_slice).unwrap_or_default()
}

/// Explicit network selection threaded into every chain-facing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    pub network: Network,
    pub factory: Address,
    pub multicall: Address,
}

impl NetworkContext {
    pub fn new(network: Network, factory: Address, multicall: Address) -> Self {
        Self {
            network,
            factory,
            multicall,
        }
    }

    pub fn mainnet() -> Self {
        Self::new(Network::Mainnet, known(MAINNET_FACTORY), known(MULTICALL))
    }

    /// Sepolia has no canonical factory deployment, so it must be supplied.
    pub fn sepolia(factory: Address) -> Self {
        Self::new(Network::Sepolia, factory, known(MULTICALL))
    }

    pub fn default_factory(network: Network) -> Option<Address> {
        match network {
            Network::Mainnet => Some(known(MAINNET_FACTORY)),
            Network::Sepolia => None,
        }
    }

    pub fn default_multicall(_network: Network) -> Address {
        known(MULTICALL)
    }

    pub fn quote_token(&self, address: &Address) -> Option<&'static QuoteToken> {
        quote_tokens(self.network).iter().find(|t| t.address == *address)
    }

    pub fn quote_token_by_symbol(&self, symbol: &str) -> Option<&'static QuoteToken> {
        quote_tokens(self.network)
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }
}
