use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::types::Token;

/// 포트폴리오 구성 에러
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PortfolioError {
    #[error("Duplicate supply position for {0}")]
    DuplicateSupply(String),

    #[error("Duplicate borrow position for {0}")]
    DuplicateBorrow(String),

    #[error("Token {token} belongs to chain {token_chain}, portfolio is on chain {chain}")]
    ChainMismatch { token: String, token_chain: u64, chain: u64 },
}

/// 이자율 모드 (borrow balances are stored in this order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestRateMode {
    Variable,
    Stable,
}

impl InterestRateMode {
    pub fn from_index(index: usize) -> Self {
        if index == 0 { Self::Variable } else { Self::Stable }
    }

    /// Aave pool encoding
    pub fn code(&self) -> u8 {
        match self {
            Self::Stable => 1,
            Self::Variable => 2,
        }
    }
}

/// 예치(담보) 포지션
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyPosition {
    pub token: Token,
    pub price: Decimal,
    pub balance: Decimal,
    pub apy: Decimal,
    pub usage_as_collateral_enabled: bool,
    pub ltv: Decimal,
    pub liquidation_threshold: Decimal,
    /// 0 means uncapped
    pub supply_cap: Decimal,
    pub total_supply: Decimal,
}

impl SupplyPosition {
    pub fn value_usd(&self) -> Decimal {
        self.balance * self.price
    }
}

/// 차입 포지션
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowPosition {
    pub token: Token,
    pub price: Decimal,
    /// Per interest-rate mode, variable first
    pub balances: Vec<Decimal>,
    pub apys: Vec<Decimal>,
    /// 0 means uncapped
    pub borrow_cap: Decimal,
    pub total_borrow: Decimal,
}

impl BorrowPosition {
    pub fn balance(&self) -> Decimal {
        self.balances.iter().copied().sum()
    }

    pub fn value_usd(&self) -> Decimal {
        self.balance() * self.price
    }

    /// (mode, balance) for every non-zero rate-mode bucket
    pub fn outstanding(&self) -> Vec<(InterestRateMode, Decimal)> {
        self.balances
            .iter()
            .enumerate()
            .filter(|(_, balance)| !balance.is_zero())
            .map(|(index, balance)| (InterestRateMode::from_index(index), *balance))
            .collect()
    }

    fn interest_usd(&self) -> Decimal {
        self.balances
            .iter()
            .zip(self.apys.iter())
            .map(|(balance, apy)| *balance * self.price * *apy)
            .sum()
    }
}

/// 단일 마켓의 계정 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub chain_id: u64,
    pub protocol_id: String,
    pub market_id: String,
    pub supplies: Vec<SupplyPosition>,
    pub borrows: Vec<BorrowPosition>,
}

impl Portfolio {
    pub fn new(
        chain_id: u64,
        protocol_id: &str,
        market_id: &str,
        supplies: Vec<SupplyPosition>,
        borrows: Vec<BorrowPosition>,
    ) -> Result<Self, PortfolioError> {
        let portfolio = Self {
            chain_id,
            protocol_id: protocol_id.to_string(),
            market_id: market_id.to_string(),
            supplies,
            borrows,
        };
        portfolio.validate()?;
        Ok(portfolio)
    }

    /// One position per token and side, all on the portfolio chain.
    pub fn validate(&self) -> Result<(), PortfolioError> {
        let mut seen = HashSet::new();
        for supply in &self.supplies {
            self.check_chain(&supply.token)?;
            if !seen.insert(&supply.token) {
                return Err(PortfolioError::DuplicateSupply(supply.token.symbol.clone()));
            }
        }
        seen.clear();
        for borrow in &self.borrows {
            self.check_chain(&borrow.token)?;
            if !seen.insert(&borrow.token) {
                return Err(PortfolioError::DuplicateBorrow(borrow.token.symbol.clone()));
            }
        }
        Ok(())
    }

    fn check_chain(&self, token: &Token) -> Result<(), PortfolioError> {
        if token.chain_id != self.chain_id {
            return Err(PortfolioError::ChainMismatch {
                token: token.symbol.clone(),
                token_chain: token.chain_id,
                chain: self.chain_id,
            });
        }
        Ok(())
    }

    pub fn find_supply(&self, token: &Token) -> Option<&SupplyPosition> {
        self.supplies.iter().find(|position| &position.token == token)
    }

    pub fn find_borrow(&self, token: &Token) -> Option<&BorrowPosition> {
        self.borrows.iter().find(|position| &position.token == token)
    }

    pub fn supply_balance(&self, token: &Token) -> Decimal {
        self.find_supply(token).map(|position| position.balance).unwrap_or_default()
    }

    pub fn borrow_balance(&self, token: &Token) -> Decimal {
        self.find_borrow(token).map(|position| position.balance()).unwrap_or_default()
    }

    pub fn has_positions(&self) -> bool {
        self.supplies.iter().any(|position| !position.balance.is_zero())
            || self.borrows.iter().any(|position| !position.balance().is_zero())
    }

    // ---- simulation ----

    pub fn supply(&mut self, token: &Token, amount: Decimal) -> &mut Self {
        match self.supplies.iter_mut().find(|position| &position.token == token) {
            Some(position) => {
                position.balance += amount;
                position.total_supply += amount;
            }
            None => debug!("supply ignored: {} is not a supply reserve of {}", token, self.market_id),
        }
        self
    }

    /// Clamps at the held balance.
    pub fn withdraw(&mut self, token: &Token, amount: Decimal) -> &mut Self {
        match self.supplies.iter_mut().find(|position| &position.token == token) {
            Some(position) => {
                let delta = amount.min(position.balance);
                position.balance -= delta;
                position.total_supply = (position.total_supply - delta).max(Decimal::ZERO);
            }
            None => debug!("withdraw ignored: {} is not a supply reserve of {}", token, self.market_id),
        }
        self
    }

    /// New debt always accrues at the variable rate.
    pub fn borrow(&mut self, token: &Token, amount: Decimal) -> &mut Self {
        match self.borrows.iter_mut().find(|position| &position.token == token) {
            Some(position) => {
                if position.balances.is_empty() {
                    position.balances.push(Decimal::ZERO);
                }
                position.balances[0] += amount;
                position.total_borrow += amount;
            }
            None => debug!("borrow ignored: {} is not a borrow reserve of {}", token, self.market_id),
        }
        self
    }

    /// Drains rate-mode buckets in order and clamps at the total debt.
    pub fn repay(&mut self, token: &Token, amount: Decimal) -> &mut Self {
        match self.borrows.iter_mut().find(|position| &position.token == token) {
            Some(position) => {
                let mut remaining = amount;
                let mut repaid = Decimal::ZERO;
                for balance in position.balances.iter_mut() {
                    let delta = remaining.min(*balance);
                    *balance -= delta;
                    remaining -= delta;
                    repaid += delta;
                }
                position.total_borrow = (position.total_borrow - repaid).max(Decimal::ZERO);
            }
            None => debug!("repay ignored: {} is not a borrow reserve of {}", token, self.market_id),
        }
        self
    }

    // ---- aggregates ----

    pub fn total_supply_usd(&self) -> Decimal {
        self.supplies.iter().map(SupplyPosition::value_usd).sum()
    }

    pub fn total_borrow_usd(&self) -> Decimal {
        self.borrows.iter().map(BorrowPosition::value_usd).sum()
    }

    pub fn borrowing_capacity_usd(&self) -> Decimal {
        self.supplies
            .iter()
            .filter(|position| position.usage_as_collateral_enabled)
            .map(|position| position.value_usd() * position.ltv)
            .sum()
    }

    pub fn liquidation_limit_usd(&self) -> Decimal {
        self.supplies
            .iter()
            .filter(|position| position.usage_as_collateral_enabled)
            .map(|position| position.value_usd() * position.liquidation_threshold)
            .sum()
    }

    pub fn available_borrowing_usd(&self) -> Decimal {
        (self.borrowing_capacity_usd() - self.total_borrow_usd()).max(Decimal::ZERO)
    }

    /// Debt over borrowing capacity, `None` without capacity.
    pub fn utilization(&self) -> Option<Decimal> {
        let capacity = self.borrowing_capacity_usd();
        if capacity.is_zero() {
            return None;
        }
        Some(self.total_borrow_usd() / capacity)
    }

    /// Liquidation limit over debt; below 1 the account is liquidatable.
    pub fn health_rate(&self) -> Option<Decimal> {
        let debt = self.total_borrow_usd();
        if debt.is_zero() {
            return None;
        }
        Some(self.liquidation_limit_usd() / debt)
    }

    pub fn net_worth_usd(&self) -> Decimal {
        self.total_supply_usd() - self.total_borrow_usd()
    }

    pub fn net_apy(&self) -> Option<Decimal> {
        let net_worth = self.net_worth_usd();
        if net_worth <= Decimal::ZERO {
            return None;
        }
        let earned: Decimal = self.supplies.iter().map(|position| position.value_usd() * position.apy).sum();
        let paid: Decimal = self.borrows.iter().map(BorrowPosition::interest_usd).sum();
        Some((earned - paid) / net_worth)
    }
}
