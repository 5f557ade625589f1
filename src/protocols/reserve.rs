use std::collections::HashMap;

use super::{ProtocolError, ReserveCaps};
use crate::config::{MarketConfig, ReserveConfig};
use crate::logic::{Action, Logic, LogicParams};
use crate::portfolio::InterestRateMode;
use crate::types::Token;

/// 마켓 하나의 리저브 테이블
#[derive(Debug, Clone)]
pub struct ReserveBook {
    market_id: String,
    reserves: HashMap<Token, ReserveConfig>,
}

impl ReserveBook {
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            market_id: config.market_id.clone(),
            reserves: config
                .reserves
                .iter()
                .map(|reserve| (reserve.token.clone(), reserve.clone()))
                .collect(),
        }
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    pub fn reserve(&self, token: &Token) -> Option<&ReserveConfig> {
        self.reserves.get(token)
    }

    pub fn reserves(&self) -> impl Iterator<Item = &ReserveConfig> {
        self.reserves.values()
    }

    pub fn can_supply(&self, token: &Token) -> bool {
        self.reserve(token).is_some_and(|reserve| reserve.supply)
    }

    pub fn can_borrow(&self, token: &Token) -> bool {
        self.reserve(token).is_some_and(|reserve| reserve.borrow)
    }

    pub fn protocol_token(&self, token: &Token) -> Option<Token> {
        self.reserve(token).and_then(|reserve| reserve.protocol_token.clone())
    }

    pub fn caps(&self, token: &Token) -> Result<ReserveCaps, ProtocolError> {
        let reserve = self.reserve(token).ok_or_else(|| ProtocolError::UnknownReserve {
            market: self.market_id.clone(),
            token: token.symbol.clone(),
        })?;
        Ok(ReserveCaps {
            supply_cap: reserve.supply_cap,
            total_supply: reserve.total_supply,
            borrow_cap: reserve.borrow_cap,
            total_borrow: reserve.total_borrow,
        })
    }

    pub fn require_protocol_token(&self, token: &Token) -> Result<Token, ProtocolError> {
        self.protocol_token(token).ok_or_else(|| ProtocolError::UnknownReserve {
            market: self.market_id.clone(),
            token: token.symbol.clone(),
        })
    }
}

/// Reserve books of every configured market of one protocol
#[derive(Debug, Clone)]
pub struct MarketBooks {
    protocol: &'static str,
    books: HashMap<String, ReserveBook>,
}

impl MarketBooks {
    pub fn new(protocol: &'static str, markets: &[MarketConfig]) -> Self {
        Self {
            protocol,
            books: markets
                .iter()
                .filter(|market| market.protocol == protocol)
                .map(|market| (market.market_id.clone(), ReserveBook::from_config(market)))
                .collect(),
        }
    }

    pub fn book(&self, market_id: &str) -> Result<&ReserveBook, ProtocolError> {
        self.books.get(market_id).ok_or_else(|| ProtocolError::UnknownMarket {
            protocol: self.protocol.to_string(),
            market: market_id.to_string(),
        })
    }

    pub fn books(&self) -> impl Iterator<Item = &ReserveBook> {
        self.books.values()
    }

    pub fn market_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.books.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// `<protocol>:<action>` logic skeleton carrying the market id.
    pub fn logic(&self, action_name: &str, action: Action, market_id: &str) -> Logic {
        Logic::new(format!("{}:{}", self.protocol, action_name), action).with_params(LogicParams::Lending {
            market_id: market_id.to_string(),
            interest_rate_mode: None,
            borrower: None,
        })
    }

    pub fn rate_mode_logic(
        &self,
        action_name: &str,
        action: Action,
        market_id: &str,
        interest_rate_mode: InterestRateMode,
        borrower: Option<alloy::primitives::Address>,
    ) -> Logic {
        Logic::new(format!("{}:{}", self.protocol, action_name), action).with_params(LogicParams::Lending {
            market_id: market_id.to_string(),
            interest_rate_mode: Some(interest_rate_mode),
            borrower,
        })
    }
}
