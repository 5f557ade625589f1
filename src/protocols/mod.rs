//! 렌딩 프로토콜 어댑터
//!
//! Market facts (token eligibility, caps, tokenization) plus the
//! supply/withdraw/borrow/repay logic builders for each venue.

pub mod aave_v3;
pub mod morphoblue;
pub mod radiant_v2;
mod reserve;

pub use aave_v3::AaveV3Protocol;
pub use morphoblue::MorphoBlueProtocol;
pub use radiant_v2::RadiantV2Protocol;
pub use reserve::{MarketBooks, ReserveBook};

use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::MarketConfig;
use crate::constants::{AAVE_V3, MORPHO_BLUE, RADIANT_V2};
use crate::logic::Logic;
use crate::portfolio::InterestRateMode;
use crate::types::{AmountError, Token, TokenAmount};

/// 프로토콜 에러
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown market {market} for {protocol}")]
    UnknownMarket { protocol: String, market: String },

    #[error("{token} is not a reserve of {market}")]
    UnknownReserve { market: String, token: String },

    #[error("Invalid market {market}: {message}")]
    InvalidMarket { market: String, message: String },

    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// 리저브 캡과 현재 총량 (cap 0 = unlimited)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveCaps {
    pub supply_cap: Decimal,
    pub total_supply: Decimal,
    pub borrow_cap: Decimal,
    pub total_borrow: Decimal,
}

impl ReserveCaps {
    pub fn supply_exceeded(&self, delta: Decimal) -> bool {
        !self.supply_cap.is_zero() && self.total_supply + delta > self.supply_cap
    }

    pub fn borrow_exceeded(&self, delta: Decimal) -> bool {
        !self.borrow_cap.is_zero() && self.total_borrow + delta > self.borrow_cap
    }

    /// Supply side as seen by a portfolio snapshot. An all-zero snapshot
    /// carries nothing and keeps the book values.
    pub fn with_supply_snapshot(self, supply_cap: Decimal, total_supply: Decimal) -> Self {
        if supply_cap.is_zero() && total_supply.is_zero() {
            return self;
        }
        Self { supply_cap, total_supply, ..self }
    }

    pub fn with_borrow_snapshot(self, borrow_cap: Decimal, total_borrow: Decimal) -> Self {
        if borrow_cap.is_zero() && total_borrow.is_zero() {
            return self;
        }
        Self { borrow_cap, total_borrow, ..self }
    }
}

/// 렌딩 프로토콜 트레이트
#[async_trait]
pub trait LendingProtocol: Send + Sync {
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn chain_id(&self) -> u64;

    fn market_ids(&self) -> Vec<String>;

    async fn is_token_for_supply(&self, market_id: &str, token: &Token) -> Result<bool, ProtocolError>;

    async fn is_token_for_borrow(&self, market_id: &str, token: &Token) -> Result<bool, ProtocolError>;

    async fn caps(&self, market_id: &str, token: &Token) -> Result<ReserveCaps, ProtocolError>;

    /// Whether supplying mints a transferable receipt token to the account
    fn is_asset_tokenized(&self, market_id: &str, token: &Token) -> bool;

    fn to_protocol_token(&self, market_id: &str, token: &Token) -> Option<Token>;

    fn can_collateral_swap(&self, _market_id: &str) -> bool {
        true
    }

    fn can_debt_swap(&self, _market_id: &str) -> bool {
        true
    }

    /// `token` is the asset flash-borrowed and re-borrowed by the loop
    fn can_leverage(&self, _market_id: &str, _token: &Token) -> bool {
        true
    }

    fn can_deleverage(&self, _market_id: &str) -> bool {
        true
    }

    /// Wei the receipt token may fall short of on a full withdrawal
    fn withdrawal_rounding_wei(&self) -> u64 {
        0
    }

    fn new_supply_logic(&self, market_id: &str, input: &TokenAmount) -> Result<Logic, ProtocolError>;

    fn new_withdraw_logic(&self, market_id: &str, output: &TokenAmount) -> Result<Logic, ProtocolError>;

    fn new_borrow_logic(&self, market_id: &str, output: &TokenAmount) -> Result<Logic, ProtocolError>;

    fn new_repay_logic(
        &self,
        market_id: &str,
        borrower: Address,
        input: &TokenAmount,
        interest_rate_mode: InterestRateMode,
    ) -> Result<Logic, ProtocolError>;
}

/// 프로토콜 레지스트리 (protocol id -> implementation)
#[derive(Default, Clone)]
pub struct ProtocolRegistry {
    protocols: HashMap<String, Arc<dyn LendingProtocol>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups configured markets by protocol and builds one adapter each.
    pub fn from_markets(chain_id: u64, markets: &[MarketConfig]) -> Result<Self, ProtocolError> {
        info!("🏦 Initializing lending protocols for chain {}", chain_id);

        let mut grouped: HashMap<&str, Vec<MarketConfig>> = HashMap::new();
        for market in markets.iter().filter(|market| market.chain_id == chain_id) {
            grouped.entry(market.protocol.as_str()).or_default().push(market.clone());
        }

        let mut registry = Self::new();
        for (protocol, markets) in grouped {
            let adapter: Arc<dyn LendingProtocol> = match protocol {
                AAVE_V3 => Arc::new(AaveV3Protocol::new(chain_id, &markets)),
                RADIANT_V2 => Arc::new(RadiantV2Protocol::new(chain_id, &markets)),
                MORPHO_BLUE => Arc::new(MorphoBlueProtocol::new(chain_id, &markets)?),
                other => return Err(ProtocolError::UnsupportedProtocol(other.to_string())),
            };
            registry.register(adapter);
        }

        info!("✅ {} lending protocols ready", registry.protocols.len());
        Ok(registry)
    }

    pub fn register(&mut self, protocol: Arc<dyn LendingProtocol>) {
        debug!("Registered protocol: {} ({} markets)", protocol.id(), protocol.market_ids().len());
        self.protocols.insert(protocol.id().to_string(), protocol);
    }

    pub fn get(&self, protocol_id: &str) -> Option<Arc<dyn LendingProtocol>> {
        self.protocols.get(protocol_id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.protocols.keys().cloned().collect();
        ids.sort();
        ids
    }
}
