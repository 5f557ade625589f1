use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::BPS_BASE;
use crate::portfolio::InterestRateMode;
use crate::types::{Token, TokenAmount};

/// 실행 시점 금액 결정 방식
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LogicAmount {
    /// Pre-quoted absolute amount
    Fixed { amount: TokenAmount },
    /// Share of whatever balance prior steps left behind; `quoted` is the
    /// expected amount at quote time.
    #[serde(rename_all = "camelCase")]
    FractionOfBalance { balance_bps: u32, quoted: TokenAmount },
}

impl LogicAmount {
    pub fn fixed(amount: TokenAmount) -> Self {
        Self::Fixed { amount }
    }

    pub fn full_balance(quoted: TokenAmount) -> Self {
        Self::FractionOfBalance { balance_bps: BPS_BASE, quoted }
    }

    pub fn quoted(&self) -> &TokenAmount {
        match self {
            Self::Fixed { amount } => amount,
            Self::FractionOfBalance { quoted, .. } => quoted,
        }
    }

    pub fn token(&self) -> &Token {
        &self.quoted().token
    }

    pub fn balance_bps(&self) -> Option<u32> {
        match self {
            Self::Fixed { .. } => None,
            Self::FractionOfBalance { balance_bps, .. } => Some(*balance_bps),
        }
    }

    pub fn is_balance_relative(&self) -> bool {
        matches!(self, Self::FractionOfBalance { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Supply,
    Withdraw,
    Borrow,
    Repay,
    SwapToken,
    SendToken,
    PullToken,
    FlashLoan,
}

/// 로직별 부가 파라미터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LogicParams {
    None,
    #[serde(rename_all = "camelCase")]
    Lending {
        market_id: String,
        interest_rate_mode: Option<InterestRateMode>,
        borrower: Option<Address>,
    },
    #[serde(rename_all = "camelCase")]
    Swap {
        slippage_bps: u32,
        exact_in: bool,
        payload: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    FlashLoan { id: Uuid, venue: String, is_loan: bool },
}

/// 라우터에서 실행될 단일 원자 연산 디스크립터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Logic {
    pub rid: String,
    pub action: Action,
    pub input: Option<LogicAmount>,
    pub output: Option<TokenAmount>,
    pub recipient: Option<Address>,
    pub params: LogicParams,
}

impl Logic {
    pub fn new(rid: impl Into<String>, action: Action) -> Self {
        Self {
            rid: rid.into(),
            action,
            input: None,
            output: None,
            recipient: None,
            params: LogicParams::None,
        }
    }

    pub fn with_input(mut self, input: LogicAmount) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: TokenAmount) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn with_params(mut self, params: LogicParams) -> Self {
        self.params = params;
        self
    }

    /// Re-tags the input so it consumes a share of the held balance.
    pub fn with_balance_bps(mut self, balance_bps: u32) -> Self {
        if let Some(input) = self.input.take() {
            self.input = Some(LogicAmount::FractionOfBalance {
                balance_bps,
                quoted: input.quoted().clone(),
            });
        }
        self
    }

    pub fn consuming_full_balance(self) -> Self {
        self.with_balance_bps(BPS_BASE)
    }

    pub fn balance_bps(&self) -> Option<u32> {
        self.input.as_ref().and_then(LogicAmount::balance_bps)
    }

    pub fn is_swap(&self) -> bool {
        self.action == Action::SwapToken
    }

    pub fn flash_loan_id(&self) -> Option<Uuid> {
        match &self.params {
            LogicParams::FlashLoan { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Router-side transfer of the protocol token back to the account.
pub fn send_token_logic(amount: TokenAmount, recipient: Address) -> Logic {
    Logic::new(crate::constants::SEND_TOKEN_RID, Action::SendToken)
        .with_input(LogicAmount::full_balance(amount))
        .with_recipient(recipient)
}

/// Permit2 pull of a fixed amount from the account into the router.
pub fn pull_token_logic(amount: TokenAmount) -> Logic {
    Logic::new(crate::constants::PULL_TOKEN_RID, Action::PullToken).with_input(LogicAmount::fixed(amount))
}
