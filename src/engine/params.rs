use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::portfolio::Portfolio;
use crate::types::Token;

/// Open a leveraged position targeting a total collateral amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenByCollateralParams {
    pub account: Address,
    pub portfolio: Portfolio,
    #[serde(default)]
    pub zap_token: Option<Token>,
    #[serde(default)]
    pub zap_amount: Decimal,
    pub collateral_token: Token,
    /// Target total collateral after the transition
    pub collateral_amount: Decimal,
    pub debt_token: Token,
}

/// Open a leveraged position targeting a total debt amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenByDebtParams {
    pub account: Address,
    pub portfolio: Portfolio,
    #[serde(default)]
    pub zap_token: Option<Token>,
    #[serde(default)]
    pub zap_amount: Decimal,
    pub collateral_token: Token,
    pub debt_token: Token,
    /// Target total debt after the transition
    pub debt_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseParams {
    pub account: Address,
    pub portfolio: Portfolio,
    pub withdrawal_token: Token,
}

/// Shared shape of the swap, leverage and zap transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionParams {
    pub account: Address,
    pub portfolio: Portfolio,
    pub src_token: Token,
    pub src_amount: Decimal,
    pub dest_token: Token,
}

/// 트랜지션 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransitionRequest {
    OpenByCollateral(OpenByCollateralParams),
    OpenByDebt(OpenByDebtParams),
    Close(CloseParams),
    CollateralSwap(TransitionParams),
    DebtSwap(TransitionParams),
    LeverageByCollateral(TransitionParams),
    LeverageByDebt(TransitionParams),
    Deleverage(TransitionParams),
    ZapSupply(TransitionParams),
    ZapWithdraw(TransitionParams),
    ZapBorrow(TransitionParams),
    ZapRepay(TransitionParams),
}

impl TransitionRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OpenByCollateral(_) => "open-by-collateral",
            Self::OpenByDebt(_) => "open-by-debt",
            Self::Close(_) => "close",
            Self::CollateralSwap(_) => "collateral-swap",
            Self::DebtSwap(_) => "debt-swap",
            Self::LeverageByCollateral(_) => "leverage-by-collateral",
            Self::LeverageByDebt(_) => "leverage-by-debt",
            Self::Deleverage(_) => "deleverage",
            Self::ZapSupply(_) => "zap-supply",
            Self::ZapWithdraw(_) => "zap-withdraw",
            Self::ZapBorrow(_) => "zap-borrow",
            Self::ZapRepay(_) => "zap-repay",
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        match self {
            Self::OpenByCollateral(params) => &params.portfolio,
            Self::OpenByDebt(params) => &params.portfolio,
            Self::Close(params) => &params.portfolio,
            Self::CollateralSwap(params)
            | Self::DebtSwap(params)
            | Self::LeverageByCollateral(params)
            | Self::LeverageByDebt(params)
            | Self::Deleverage(params)
            | Self::ZapSupply(params)
            | Self::ZapWithdraw(params)
            | Self::ZapBorrow(params)
            | Self::ZapRepay(params) => &params.portfolio,
        }
    }
}
