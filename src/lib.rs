pub mod config;
pub mod errors;
pub mod felt;
pub mod memecoin;
pub mod multicall;
pub mod numeric;
pub mod quote_price;
pub mod registry;
pub mod rpc_manager;
pub mod security;
pub mod structured_logging;
pub mod tick_math;
pub mod tx_builder;
