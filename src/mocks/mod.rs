//! Test fixtures: mainnet tokens, market configs, portfolios and offline
//! collaborators for the transition engine.

use alloy::primitives::{address, Address};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{aave_reserve, mainnet_token, EngineConfig, MarketConfig, ReserveConfig};
use crate::constants::*;
use crate::engine::TransitionEngine;
use crate::flashloan::{ConfiguredFlashLoanVenue, FlashLoanAggregator, FlashLoanProvider};
use crate::portfolio::{BorrowPosition, Portfolio, SupplyPosition};
use crate::protocols::ProtocolRegistry;
use crate::swapers::{StaticRateSwaper, SwapQuotation, Swaper, SwaperError};
use crate::types::{Token, TokenAmount};

pub const ACCOUNT: Address = address!("a11ce00000000000000000000000000000000001");

pub const MORPHO_MARKET_ID: &str = "0xc54d7acf14de29e0e5527cabd7a576506870346a78a11a6762e2cca66322ec41";

pub fn weth() -> Token {
    mainnet_token(WETH, 18, "WETH", "Wrapped Ether")
}

pub fn usdc() -> Token {
    mainnet_token(USDC, 6, "USDC", "USD Coin")
}

pub fn usdt() -> Token {
    mainnet_token(USDT, 6, "USDT", "Tether USD")
}

pub fn dai() -> Token {
    mainnet_token(DAI, 18, "DAI", "Dai Stablecoin")
}

pub fn wbtc() -> Token {
    mainnet_token(WBTC, 8, "WBTC", "Wrapped BTC")
}

pub fn gho() -> Token {
    mainnet_token(GHO, 18, "GHO", "Gho Token")
}

fn capped(mut reserve: ReserveConfig, totals: [Decimal; 4]) -> ReserveConfig {
    let [supply_cap, total_supply, borrow_cap, total_borrow] = totals;
    reserve.supply_cap = supply_cap;
    reserve.total_supply = total_supply;
    reserve.borrow_cap = borrow_cap;
    reserve.total_borrow = total_borrow;
    reserve
}

fn radiant_reserve(token: Token, r_token: Address) -> ReserveConfig {
    let protocol_token = Token::new(
        token.chain_id,
        r_token,
        token.decimals,
        &format!("r{}", token.symbol),
        &format!("Radiant interest bearing {}", token.symbol),
    );
    ReserveConfig {
        token,
        protocol_token: Some(protocol_token),
        supply: true,
        borrow: true,
        supply_cap: Decimal::ZERO,
        total_supply: Decimal::ZERO,
        borrow_cap: Decimal::ZERO,
        total_borrow: Decimal::ZERO,
    }
}

fn morpho_reserve(token: Token, supply: bool, borrow: bool) -> ReserveConfig {
    ReserveConfig {
        token,
        protocol_token: None,
        supply,
        borrow,
        supply_cap: Decimal::ZERO,
        total_supply: Decimal::ZERO,
        borrow_cap: Decimal::ZERO,
        total_borrow: Decimal::ZERO,
    }
}

/// Aave v3, Radiant v2 and one Morpho Blue market on mainnet.
///
/// Aave caps: WETH 900/1000 supplied, 100/500 borrowed; WBTC 99.9/100
/// supplied; DAI 500/1000 borrowed; USDC and USDT uncapped.
pub fn market_configs() -> Vec<MarketConfig> {
    vec![
        MarketConfig {
            protocol: AAVE_V3.to_string(),
            market_id: "mainnet".to_string(),
            chain_id: CHAIN_MAINNET,
            reserves: vec![
                capped(
                    aave_reserve(weth(), address!("4d5F47FA6A74757f35C14fD3a6Ef8E3C9BC514E8"), dec!(0), dec!(0)),
                    [dec!(1000), dec!(900), dec!(500), dec!(100)],
                ),
                aave_reserve(usdc(), address!("98C23E9d8f34FEFb1B7BD6a91B7FF122F4e16F5c"), dec!(0), dec!(0)),
                aave_reserve(usdt(), address!("23878914EFE38d27C4D67Ab83ed1b93A74D4086a"), dec!(0), dec!(0)),
                capped(
                    aave_reserve(dai(), address!("018008bfb33d285247A21d44E50697654f754e63"), dec!(0), dec!(0)),
                    [dec!(0), dec!(0), dec!(1000), dec!(500)],
                ),
                capped(
                    aave_reserve(wbtc(), address!("5Ee5bf7ae06D1Be5997A1A72006FE6C607eC6DE8"), dec!(0), dec!(0)),
                    [dec!(100), dec!(99.9), dec!(0), dec!(0)],
                ),
            ],
        },
        MarketConfig {
            protocol: RADIANT_V2.to_string(),
            market_id: "mainnet".to_string(),
            chain_id: CHAIN_MAINNET,
            reserves: vec![
                radiant_reserve(weth(), address!("d10c315293872851184F484E9431dAf4dE6AA992")),
                radiant_reserve(usdc(), address!("9E85DF2B42b2aE5e666D7263ED81a744a534BF1f")),
            ],
        },
        MarketConfig {
            protocol: MORPHO_BLUE.to_string(),
            market_id: MORPHO_MARKET_ID.to_string(),
            chain_id: CHAIN_MAINNET,
            reserves: vec![morpho_reserve(weth(), true, false), morpho_reserve(usdc(), false, true)],
        },
    ]
}

fn supply(token: Token, price: Decimal, balance: Decimal, supply_cap: Decimal, total_supply: Decimal) -> SupplyPosition {
    SupplyPosition {
        token,
        price,
        balance,
        apy: dec!(0.02),
        usage_as_collateral_enabled: true,
        ltv: dec!(0.8),
        liquidation_threshold: dec!(0.85),
        supply_cap,
        total_supply,
    }
}

fn borrow(token: Token, price: Decimal, balances: Vec<Decimal>, borrow_cap: Decimal, total_borrow: Decimal) -> BorrowPosition {
    let apys = vec![dec!(0.05); balances.len()];
    BorrowPosition {
        token,
        price,
        balances,
        apys,
        borrow_cap,
        total_borrow,
    }
}

/// 2 WETH, 10000 USDC and 0.5 WBTC supplied; 1000 USDC borrowed.
pub fn aave_portfolio() -> Portfolio {
    Portfolio {
        chain_id: CHAIN_MAINNET,
        protocol_id: AAVE_V3.to_string(),
        market_id: "mainnet".to_string(),
        supplies: vec![
            supply(weth(), dec!(2000), dec!(2), dec!(1000), dec!(900)),
            supply(usdc(), dec!(1), dec!(10000), dec!(0), dec!(5000000)),
            supply(wbtc(), dec!(30000), dec!(0.5), dec!(100), dec!(99.9)),
            supply(dai(), dec!(1), dec!(0), dec!(0), dec!(2000000)),
        ],
        borrows: vec![
            borrow(weth(), dec!(2000), vec![dec!(0), dec!(0)], dec!(500), dec!(100)),
            borrow(usdc(), dec!(1), vec![dec!(1000), dec!(0)], dec!(0), dec!(3000000)),
            borrow(dai(), dec!(1), vec![dec!(0), dec!(0)], dec!(1000), dec!(500)),
        ],
    }
}

/// USDC debt split across both rate modes.
pub fn mixed_rate_portfolio() -> Portfolio {
    let mut portfolio = aave_portfolio();
    if let Some(position) = portfolio.borrows.iter_mut().find(|position| position.token == usdc()) {
        position.balances = vec![dec!(1000), dec!(1000)];
    }
    portfolio
}

/// 2 WETH supplied, nothing borrowed.
pub fn scenario_portfolio() -> Portfolio {
    let mut portfolio = aave_portfolio();
    for position in portfolio.supplies.iter_mut().filter(|position| position.token != weth()) {
        position.balance = Decimal::ZERO;
    }
    for position in portfolio.borrows.iter_mut() {
        position.balances = vec![Decimal::ZERO, Decimal::ZERO];
    }
    portfolio
}

pub fn empty_portfolio() -> Portfolio {
    let mut portfolio = scenario_portfolio();
    for position in portfolio.supplies.iter_mut() {
        position.balance = Decimal::ZERO;
    }
    portfolio
}

/// 2 WETH supplied, 1000 USDC borrowed on Radiant.
pub fn radiant_portfolio() -> Portfolio {
    Portfolio {
        chain_id: CHAIN_MAINNET,
        protocol_id: RADIANT_V2.to_string(),
        market_id: "mainnet".to_string(),
        supplies: vec![
            supply(weth(), dec!(2000), dec!(2), dec!(0), dec!(0)),
            supply(usdc(), dec!(1), dec!(0), dec!(0), dec!(0)),
        ],
        borrows: vec![
            borrow(weth(), dec!(2000), vec![dec!(0), dec!(0)], dec!(0), dec!(0)),
            borrow(usdc(), dec!(1), vec![dec!(1000), dec!(0)], dec!(0), dec!(0)),
        ],
    }
}

pub fn morpho_portfolio() -> Portfolio {
    Portfolio {
        chain_id: CHAIN_MAINNET,
        protocol_id: MORPHO_BLUE.to_string(),
        market_id: MORPHO_MARKET_ID.to_string(),
        supplies: vec![supply(weth(), dec!(2000), dec!(1), dec!(0), dec!(0))],
        borrows: vec![borrow(usdc(), dec!(1), vec![dec!(500)], dec!(0), dec!(0))],
    }
}

/// Balancer lends USDC and DAI for free, Aave lends everything at 5 bps.
pub fn flash_loan_aggregator() -> FlashLoanAggregator {
    let venues: Vec<Arc<dyn FlashLoanProvider>> = vec![
        Arc::new(ConfiguredFlashLoanVenue::new("balancer-v2", BALANCER_V2_FLASHLOAN_FEE_BPS, Some(vec![USDC, DAI]))),
        Arc::new(ConfiguredFlashLoanVenue::new(AAVE_V3, AAVE_V3_FLASHLOAN_FEE_BPS, None)),
    ];
    FlashLoanAggregator::new(venues)
}

/// Oracle-priced swaper with a 30 bps fee. GHO is not priced.
pub fn static_swaper() -> StaticRateSwaper {
    StaticRateSwaper::new("static", CHAIN_MAINNET, 30)
        .with_price(weth(), dec!(2000))
        .with_price(usdc(), dec!(1))
        .with_price(usdt(), dec!(1))
        .with_price(dai(), dec!(1))
        .with_price(wbtc(), dec!(30000))
}

fn settings() -> EngineConfig {
    EngineConfig {
        chain_id: CHAIN_MAINNET,
        quote_timeout_ms: 1_000,
        slippage_bps: DEFAULT_SLIPPAGE_BPS,
    }
}

pub fn engine_with_swaper(swaper: Arc<dyn Swaper>) -> TransitionEngine {
    let protocols = ProtocolRegistry::from_markets(CHAIN_MAINNET, &market_configs()).unwrap();
    TransitionEngine::new(settings(), protocols, vec![swaper], flash_loan_aggregator())
}

pub fn engine() -> TransitionEngine {
    engine_with_swaper(Arc::new(static_swaper()))
}

/// Never answers a quote.
pub struct HangingSwaper;

#[async_trait]
impl Swaper for HangingSwaper {
    fn id(&self) -> &str {
        "hanging"
    }

    fn chain_id(&self) -> u64 {
        CHAIN_MAINNET
    }

    fn can_custom_token(&self) -> bool {
        true
    }

    fn supports_exact_out(&self) -> bool {
        true
    }

    async fn tokens(&self) -> Result<Vec<Token>, SwaperError> {
        Ok(Vec::new())
    }

    async fn quote_exact_in(&self, _: &TokenAmount, _: &Token, _: u32) -> Result<SwapQuotation, SwaperError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(SwaperError::Timeout)
    }

    async fn quote_exact_out(&self, _: &Token, _: &TokenAmount, _: u32) -> Result<SwapQuotation, SwaperError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(SwaperError::Timeout)
    }
}

/// Fails every quote the same way.
pub struct FailingSwaper {
    no_route: bool,
}

impl FailingSwaper {
    pub fn no_route() -> Self {
        Self { no_route: true }
    }

    pub fn network() -> Self {
        Self { no_route: false }
    }

    fn error(&self, token_in: &Token, token_out: &Token) -> SwaperError {
        if self.no_route {
            SwaperError::no_route(token_in, token_out)
        } else {
            SwaperError::Network("connection reset by peer".to_string())
        }
    }
}

#[async_trait]
impl Swaper for FailingSwaper {
    fn id(&self) -> &str {
        "failing"
    }

    fn chain_id(&self) -> u64 {
        CHAIN_MAINNET
    }

    fn can_custom_token(&self) -> bool {
        true
    }

    fn supports_exact_out(&self) -> bool {
        true
    }

    async fn tokens(&self) -> Result<Vec<Token>, SwaperError> {
        Ok(Vec::new())
    }

    async fn quote_exact_in(&self, input: &TokenAmount, token_out: &Token, _: u32) -> Result<SwapQuotation, SwaperError> {
        Err(self.error(&input.token, token_out))
    }

    async fn quote_exact_out(&self, token_in: &Token, output: &TokenAmount, _: u32) -> Result<SwapQuotation, SwaperError> {
        Err(self.error(token_in, &output.token))
    }
}
