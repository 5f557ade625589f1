use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::flashloan::FlashLoanError;
use crate::portfolio::PortfolioError;
use crate::protocols::ProtocolError;
use crate::swapers::SwaperError;
use crate::types::AmountError;

/// 비즈니스 제약 위반 코드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InsufficientAmount,
    SupplyCapExceeded,
    BorrowCapExceeded,
    CollateralAmountExceeded,
    DebtAmountExceeded,
    UnsupportedToken,
    NoRoute,
}

/// Blocking constraint violation tagged with the offending parameter.
///
/// Returned inside a `TransitionOutput`, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionError {
    pub name: String,
    pub code: ErrorCode,
}

impl TransitionError {
    pub fn new(name: &str, code: ErrorCode) -> Self {
        Self { name: name.to_string(), code }
    }

    pub fn insufficient(name: &str) -> Self {
        Self::new(name, ErrorCode::InsufficientAmount)
    }

    pub fn supply_cap(name: &str) -> Self {
        Self::new(name, ErrorCode::SupplyCapExceeded)
    }

    pub fn borrow_cap(name: &str) -> Self {
        Self::new(name, ErrorCode::BorrowCapExceeded)
    }

    pub fn collateral_exceeded(name: &str) -> Self {
        Self::new(name, ErrorCode::CollateralAmountExceeded)
    }

    pub fn debt_exceeded(name: &str) -> Self {
        Self::new(name, ErrorCode::DebtAmountExceeded)
    }

    pub fn unsupported(name: &str) -> Self {
        Self::new(name, ErrorCode::UnsupportedToken)
    }

    pub fn no_route(name: &str) -> Self {
        Self::new(name, ErrorCode::NoRoute)
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} on {}", self.code, self.name)
    }
}

/// 기술적 실패 (collaborator or programming errors)
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("Portfolio is on chain {actual}, engine runs on chain {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("{transition} is not available on {protocol}:{market}")]
    Unsupported {
        transition: &'static str,
        protocol: String,
        market: String,
    },

    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Quote group timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Swaper(#[from] SwaperError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    FlashLoan(#[from] FlashLoanError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Portfolio(#[from] PortfolioError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_format() {
        let error = TransitionError::insufficient("srcAmount");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_AMOUNT");
        assert_eq!(json["name"], "srcAmount");

        let code: ErrorCode = serde_json::from_str("\"SUPPLY_CAP_EXCEEDED\"").unwrap();
        assert_eq!(code, ErrorCode::SupplyCapExceeded);
    }
}
