use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::constants::*;
use crate::types::Token;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    #[serde(default)]
    pub flash_loans: Vec<FlashLoanVenueConfig>,
    #[serde(default)]
    pub swapers: Vec<SwaperConfig>,
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub chain_id: u64,
    /// Bound for one concurrent quote/fact group
    #[serde(default = "default_quote_timeout_ms")]
    pub quote_timeout_ms: u64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
}

impl EngineConfig {
    pub fn quote_timeout(&self) -> Duration {
        Duration::from_millis(self.quote_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: CHAIN_MAINNET,
            quote_timeout_ms: DEFAULT_QUOTE_TIMEOUT_MS,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashLoanVenueConfig {
    pub id: String,
    pub fee_bps: u32,
    /// None lends every asset
    #[serde(default)]
    pub assets: Option<Vec<Address>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwaperConfig {
    pub id: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub exact_out: bool,
    #[serde(default = "default_swaper_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// `aave-v3`, `radiant-v2` or `morphoblue`
    pub protocol: String,
    pub market_id: String,
    pub chain_id: u64,
    pub reserves: Vec<ReserveConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveConfig {
    pub token: Token,
    /// aToken / rToken for tokenized markets
    #[serde(default)]
    pub protocol_token: Option<Token>,
    #[serde(default = "default_enabled")]
    pub supply: bool,
    #[serde(default = "default_enabled")]
    pub borrow: bool,
    #[serde(default)]
    pub supply_cap: Decimal,
    #[serde(default)]
    pub total_supply: Decimal,
    #[serde(default)]
    pub borrow_cap: Decimal,
    #[serde(default)]
    pub total_borrow: Decimal,
}

fn default_quote_timeout_ms() -> u64 {
    DEFAULT_QUOTE_TIMEOUT_MS
}

fn default_slippage_bps() -> u32 {
    DEFAULT_SLIPPAGE_BPS
}

fn default_swaper_timeout_ms() -> u64 {
    DEFAULT_SWAPER_TIMEOUT_MS
}

fn default_enabled() -> bool {
    true
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: Config = toml::from_str(&content)?;

        if let Ok(api_key) = std::env::var("XCRACK_SWAPER_API_KEY") {
            for swaper in config.swapers.iter_mut() {
                swaper.api_key = Some(api_key.clone());
            }
        }

        Ok(config)
    }

    pub async fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn enabled_swapers(&self) -> impl Iterator<Item = &SwaperConfig> {
        self.swapers.iter().filter(|swaper| swaper.enabled)
    }

    pub fn market(&self, protocol: &str, market_id: &str) -> Option<&MarketConfig> {
        self.markets
            .iter()
            .find(|market| market.protocol == protocol && market.market_id == market_id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.quote_timeout_ms == 0 {
            return Err(anyhow!("engine.quote_timeout_ms must be positive"));
        }
        if self.engine.slippage_bps >= BPS_BASE {
            return Err(anyhow!("engine.slippage_bps must be below {}", BPS_BASE));
        }

        if self.flash_loans.is_empty() {
            return Err(anyhow!("At least one flash loan venue must be configured"));
        }
        for venue in &self.flash_loans {
            if venue.fee_bps >= BPS_BASE {
                return Err(anyhow!("Flash loan venue {} fee must be below {} bps", venue.id, BPS_BASE));
            }
        }

        for swaper in &self.swapers {
            if swaper.enabled && swaper.base_url.is_empty() {
                return Err(anyhow!("Swaper {} base_url cannot be empty", swaper.id));
            }
        }

        let mut markets = HashSet::new();
        for market in &self.markets {
            if !matches!(market.protocol.as_str(), AAVE_V3 | RADIANT_V2 | MORPHO_BLUE) {
                return Err(anyhow!("Unknown lending protocol: {}", market.protocol));
            }
            if market.chain_id != self.engine.chain_id {
                return Err(anyhow!(
                    "Market {}:{} is on chain {}, engine runs on chain {}",
                    market.protocol, market.market_id, market.chain_id, self.engine.chain_id
                ));
            }
            if !markets.insert((&market.protocol, &market.market_id)) {
                return Err(anyhow!("Duplicate market {}:{}", market.protocol, market.market_id));
            }

            let mut tokens = HashSet::new();
            for reserve in &market.reserves {
                if reserve.token.chain_id != market.chain_id {
                    return Err(anyhow!("Reserve {} is on the wrong chain", reserve.token.symbol));
                }
                if !tokens.insert(&reserve.token) {
                    return Err(anyhow!("Duplicate reserve {} in {}", reserve.token.symbol, market.market_id));
                }
                if reserve.supply_cap.is_sign_negative() || reserve.borrow_cap.is_sign_negative() {
                    return Err(anyhow!("Reserve {} caps cannot be negative", reserve.token.symbol));
                }
            }
        }

        Ok(())
    }
}

pub(crate) fn mainnet_token(address: Address, decimals: u32, symbol: &str, name: &str) -> Token {
    Token::new(CHAIN_MAINNET, address, decimals, symbol, name)
}

pub(crate) fn aave_reserve(token: Token, a_token: Address, supply_cap: Decimal, borrow_cap: Decimal) -> ReserveConfig {
    let protocol_token = Token::new(
        token.chain_id,
        a_token,
        token.decimals,
        &format!("aEth{}", token.symbol),
        &format!("Aave Ethereum {}", token.symbol),
    );
    ReserveConfig {
        token,
        protocol_token: Some(protocol_token),
        supply: true,
        borrow: true,
        supply_cap,
        total_supply: Decimal::ZERO,
        borrow_cap,
        total_borrow: Decimal::ZERO,
    }
}

impl Default for Config {
    fn default() -> Self {
        let weth = mainnet_token(WETH, 18, "WETH", "Wrapped Ether");
        let usdc = mainnet_token(USDC, 6, "USDC", "USD Coin");
        let usdt = mainnet_token(USDT, 6, "USDT", "Tether USD");
        let dai = mainnet_token(DAI, 18, "DAI", "Dai Stablecoin");
        let wbtc = mainnet_token(WBTC, 8, "WBTC", "Wrapped BTC");

        Self {
            engine: EngineConfig::default(),
            flash_loans: vec![
                FlashLoanVenueConfig {
                    id: "balancer-v2".to_string(),
                    fee_bps: BALANCER_V2_FLASHLOAN_FEE_BPS,
                    assets: Some(vec![WETH, USDC, DAI, WBTC]),
                },
                FlashLoanVenueConfig {
                    id: AAVE_V3.to_string(),
                    fee_bps: AAVE_V3_FLASHLOAN_FEE_BPS,
                    assets: None,
                },
            ],
            swapers: vec![SwaperConfig {
                id: "paraswap-v5".to_string(),
                base_url: "https://api.protocolink.com".to_string(),
                api_key: None,
                exact_out: true,
                timeout_ms: DEFAULT_SWAPER_TIMEOUT_MS,
                enabled: true,
            }],
            markets: vec![MarketConfig {
                protocol: AAVE_V3.to_string(),
                market_id: "mainnet".to_string(),
                chain_id: CHAIN_MAINNET,
                reserves: vec![
                    aave_reserve(weth, alloy::primitives::address!("4d5F47FA6A74757f35C14fD3a6Ef8E3C9BC514E8"), dec!(1800000), dec!(1400000)),
                    aave_reserve(usdc, alloy::primitives::address!("98C23E9d8f34FEFb1B7BD6a91B7FF122F4e16F5c"), dec!(1760000000), dec!(1580000000)),
                    aave_reserve(usdt, alloy::primitives::address!("23878914EFE38d27C4D67Ab83ed1b93A74D4086a"), dec!(1300000000), dec!(1200000000)),
                    aave_reserve(dai, alloy::primitives::address!("018008bfb33d285247A21d44E50697654f754e63"), dec!(338000000), dec!(271000000)),
                    aave_reserve(wbtc, alloy::primitives::address!("5Ee5bf7ae06D1Be5997A1A72006FE6C607eC6DE8"), dec!(43000), dec!(28000)),
                ],
            }],
        }
    }
}
