use alloy::primitives::{Address, U256};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::constants::NATIVE_TOKEN_ADDRESS;

// rust_decimal keeps at most 28 fractional digits
const MAX_DECIMALS: u32 = 28;

/// 수량 관련 에러
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Negative amount {amount} for {symbol}")]
    Negative { symbol: String, amount: Decimal },

    #[error("Amount {amount} exceeds {decimals} decimals of {symbol}")]
    Precision { symbol: String, amount: Decimal, decimals: u32 },

    #[error("Token mismatch: {expected} != {actual}")]
    TokenMismatch { expected: String, actual: String },

    #[error("Amount overflow for {0}")]
    Overflow(String),

    #[error("Invalid amount string: {0}")]
    Parse(String),
}

/// ERC20 (또는 네이티브) 토큰
///
/// Identity is `(chain_id, address)`; symbol and name are display only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    pub decimals: u32,
    pub symbol: String,
    pub name: String,
}

impl Token {
    pub fn new(chain_id: u64, address: Address, decimals: u32, symbol: &str, name: &str) -> Self {
        Self {
            chain_id,
            address,
            decimals,
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_native(&self) -> bool {
        self.address == NATIVE_TOKEN_ADDRESS
    }

    /// 최소 단위 (1 wei)
    pub fn unit(&self) -> Decimal {
        Decimal::new(1, self.decimals.min(MAX_DECIMALS))
    }

    pub fn round_down(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.decimals.min(MAX_DECIMALS), RoundingStrategy::ToZero)
    }

    pub fn round_up(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.decimals.min(MAX_DECIMALS), RoundingStrategy::AwayFromZero)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.address.hash(state);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// 토큰 + 수량
///
/// The amount is always non-negative and never carries more fractional
/// digits than the token has decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: Token,
    pub amount: Decimal,
}

impl TokenAmount {
    pub fn new(token: Token, amount: Decimal) -> Result<Self, AmountError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(AmountError::Negative { symbol: token.symbol.clone(), amount });
        }
        let normalized = amount.normalize();
        if normalized.scale() > token.decimals {
            return Err(AmountError::Precision {
                symbol: token.symbol.clone(),
                amount,
                decimals: token.decimals,
            });
        }
        Ok(Self { token, amount: normalized })
    }

    pub fn zero(token: Token) -> Self {
        Self { token, amount: Decimal::ZERO }
    }

    pub fn parse(token: Token, amount: &str) -> Result<Self, AmountError> {
        let value = Decimal::from_str(amount).map_err(|e| AmountError::Parse(format!("{}: {}", amount, e)))?;
        Self::new(token, value)
    }

    pub fn from_wei(token: Token, wei: U256) -> Result<Self, AmountError> {
        if token.decimals > MAX_DECIMALS {
            return Err(AmountError::Overflow(token.symbol.clone()));
        }
        let raw = u128::try_from(wei)
            .ok()
            .and_then(|wei| i128::try_from(wei).ok())
            .ok_or_else(|| AmountError::Overflow(token.symbol.clone()))?;
        let amount = Decimal::try_from_i128_with_scale(raw, token.decimals)
            .map_err(|_| AmountError::Overflow(token.symbol.clone()))?;
        Self::new(token, amount)
    }

    pub fn to_wei(&self) -> U256 {
        let normalized = self.amount.normalize();
        let mantissa = U256::from(normalized.mantissa().unsigned_abs());
        let shift = self.token.decimals.saturating_sub(normalized.scale());
        mantissa * U256::from(10u8).pow(U256::from(shift))
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn add(&self, amount: Decimal) -> Result<Self, AmountError> {
        let sum = self
            .amount
            .checked_add(amount)
            .ok_or_else(|| AmountError::Overflow(self.token.symbol.clone()))?;
        Self::new(self.token.clone(), sum)
    }

    pub fn sub(&self, amount: Decimal) -> Result<Self, AmountError> {
        Self::new(self.token.clone(), self.amount - amount)
    }

    pub fn saturating_sub(&self, amount: Decimal) -> Self {
        let left = (self.amount - amount).max(Decimal::ZERO);
        Self { token: self.token.clone(), amount: left.normalize() }
    }

    pub fn plus(&self, other: &TokenAmount) -> Result<Self, AmountError> {
        self.ensure_same_token(other)?;
        self.add(other.amount)
    }

    pub fn add_wei(&self, wei: u64) -> Result<Self, AmountError> {
        self.add(self.token.unit() * Decimal::from(wei))
    }

    pub fn sub_wei(&self, wei: u64) -> Self {
        self.saturating_sub(self.token.unit() * Decimal::from(wei))
    }

    pub fn ensure_same_token(&self, other: &TokenAmount) -> Result<(), AmountError> {
        if self.token != other.token {
            return Err(AmountError::TokenMismatch {
                expected: self.token.symbol.clone(),
                actual: other.token.symbol.clone(),
            });
        }
        Ok(())
    }

    /// Same-token comparison; `None` across tokens.
    pub fn compare(&self, other: &TokenAmount) -> Option<Ordering> {
        (self.token == other.token).then(|| self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.token.symbol)
    }
}
