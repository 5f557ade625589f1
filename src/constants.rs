use alloy::primitives::{address, Address};

// Balance-fraction denominator (10_000 = 100% of the held balance)
pub const BPS_BASE: u32 = 10_000;

// Quote defaults
pub const DEFAULT_SLIPPAGE_BPS: u32 = 100; // 1%
pub const DEFAULT_QUOTE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SWAPER_TIMEOUT_MS: u64 = 5_000;

// Flash loan venues
pub const AAVE_V3_FLASHLOAN_FEE_BPS: u32 = 5; // 0.05%
pub const BALANCER_V2_FLASHLOAN_FEE_BPS: u32 = 0;

// aToken share math may leave up to this many wei behind on full withdrawals
pub const AAVE_WITHDRAWAL_ROUNDING_WEI: u64 = 3;

// Router-level logic identifiers
pub const FLASH_LOAN_RID: &str = "utility:flash-loan-aggregator";
pub const SEND_TOKEN_RID: &str = "utility:send-token";
pub const PULL_TOKEN_RID: &str = "permit2:pull-token";

// Protocol ids
pub const AAVE_V3: &str = "aave-v3";
pub const RADIANT_V2: &str = "radiant-v2";
pub const MORPHO_BLUE: &str = "morphoblue";

// Chains
pub const CHAIN_MAINNET: u64 = 1;
pub const CHAIN_AVALANCHE: u64 = 43_114;

pub const NATIVE_TOKEN_ADDRESS: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

// Common token addresses (mainnet)
pub const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const USDT: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
pub const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
pub const WBTC: Address = address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599");
pub const GHO: Address = address!("40D16FC0246aD3160Ccc09B8D0D3A2cD28aE6C2f");

/// Tokens Aave refuses to flash-borrow for leverage loops.
///
/// Matched by symbol: GHO has a different address on every chain.
pub fn is_leverage_blocked(symbol: &str) -> bool {
    symbol == "GHO"
}
