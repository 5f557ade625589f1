//! 스왑 견적 제공자
//!
//! A swaper quotes a token-to-token conversion in either direction and
//! turns the quotation into a `swap-token` logic.

pub mod http;
pub mod static_rate;

pub use http::HttpSwaper;
pub use static_rate::StaticRateSwaper;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::BPS_BASE;
use crate::logic::{Action, Logic, LogicAmount, LogicParams};
use crate::types::{AmountError, Token, TokenAmount};

// Re-quote rounds when emulating exact-out on an exact-in only venue
const EXACT_OUT_ROUNDS: usize = 3;

/// 스왑 에러
#[derive(Debug, thiserror::Error)]
pub enum SwaperError {
    #[error("No route: {token_in} -> {token_out}")]
    NoRoute { token_in: String, token_out: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Quote timed out")]
    Timeout,

    #[error(transparent)]
    Amount(#[from] AmountError),
}

impl SwaperError {
    pub fn no_route(token_in: &Token, token_out: &Token) -> Self {
        Self::NoRoute {
            token_in: token_in.symbol.clone(),
            token_out: token_out.symbol.clone(),
        }
    }

    /// Business-level "cannot swap" as opposed to a transport failure
    pub fn is_no_route(&self) -> bool {
        matches!(self, Self::NoRoute { .. })
    }
}

/// 스왑 견적
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuotation {
    pub swaper: String,
    pub input: TokenAmount,
    pub output: TokenAmount,
    pub slippage_bps: u32,
    pub exact_in: bool,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub quoted_at: DateTime<Utc>,
}

/// 스왑 제공자 트레이트
#[async_trait]
pub trait Swaper: Send + Sync {
    fn id(&self) -> &str;

    fn chain_id(&self) -> u64;

    /// Routes arbitrary ERC20s, not only the listed ones
    fn can_custom_token(&self) -> bool {
        false
    }

    fn supports_exact_out(&self) -> bool;

    async fn tokens(&self) -> Result<Vec<Token>, SwaperError>;

    async fn quote_exact_in(
        &self,
        input: &TokenAmount,
        token_out: &Token,
        slippage_bps: u32,
    ) -> Result<SwapQuotation, SwaperError>;

    /// Input needed to receive exactly `output`.
    async fn quote_exact_out(
        &self,
        token_in: &Token,
        output: &TokenAmount,
        slippage_bps: u32,
    ) -> Result<SwapQuotation, SwaperError> {
        emulate_exact_out(self, token_in, output, slippage_bps).await
    }

    fn new_swap_token_logic(&self, quotation: &SwapQuotation) -> Logic {
        Logic::new(format!("{}:swap-token", self.id()), Action::SwapToken)
            .with_input(LogicAmount::fixed(quotation.input.clone()))
            .with_output(quotation.output.clone())
            .with_params(LogicParams::Swap {
                slippage_bps: quotation.slippage_bps,
                exact_in: quotation.exact_in,
                payload: quotation.payload.clone(),
            })
    }
}

pub async fn supports_pair<S: Swaper + ?Sized>(
    swaper: &S,
    token_in: &Token,
    token_out: &Token,
) -> Result<bool, SwaperError> {
    if swaper.chain_id() != token_in.chain_id || swaper.chain_id() != token_out.chain_id {
        return Ok(false);
    }
    if swaper.can_custom_token() {
        return Ok(true);
    }
    let tokens = swaper.tokens().await?;
    Ok(tokens.contains(token_in) && tokens.contains(token_out))
}

/// Exact-out on top of exact-in quotes: probe the rate with one whole
/// `token_in`, size the input with a slippage buffer, then re-quote until
/// the forward output covers the target.
pub async fn emulate_exact_out<S: Swaper + ?Sized>(
    swaper: &S,
    token_in: &Token,
    output: &TokenAmount,
    slippage_bps: u32,
) -> Result<SwapQuotation, SwaperError> {
    let buffer = Decimal::ONE + Decimal::from(slippage_bps) / Decimal::from(BPS_BASE);
    let probe = swaper
        .quote_exact_in(&TokenAmount::new(token_in.clone(), Decimal::ONE)?, &output.token, slippage_bps)
        .await?;
    if probe.output.is_zero() {
        return Err(SwaperError::no_route(token_in, &output.token));
    }

    let mut input_amount = token_in.round_up(output.amount / probe.output.amount * buffer);
    for round in 0..EXACT_OUT_ROUNDS {
        let input = TokenAmount::new(token_in.clone(), input_amount)?;
        let quotation = swaper.quote_exact_in(&input, &output.token, slippage_bps).await?;
        debug!(
            "{} exact-out round {}: {} -> {} (target {})",
            swaper.id(), round, quotation.input, quotation.output, output
        );
        if quotation.output.amount >= output.amount {
            return Ok(SwapQuotation { output: output.clone(), ..quotation });
        }
        if quotation.output.is_zero() {
            break;
        }
        input_amount = token_in.round_up(input_amount * output.amount / quotation.output.amount * buffer);
    }

    Err(SwaperError::no_route(token_in, &output.token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{self, usdc, weth};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_emulated_exact_out_covers_target() {
        let swaper = mocks::static_swaper().with_exact_out(false);
        let target = TokenAmount::new(usdc(), dec!(3000)).unwrap();

        let quotation = swaper.quote_exact_out(&weth(), &target, 100).await.unwrap();
        assert_eq!(quotation.output, target);
        assert!(quotation.exact_in);
        // 3000 USDC at 2000 + 30 bps fee needs a bit more than 1.5 WETH
        assert!(quotation.input.amount > dec!(1.5));
        assert!(quotation.input.amount < dec!(1.6));
    }

    #[tokio::test]
    async fn test_supports_pair() {
        let swaper = mocks::static_swaper();
        assert!(supports_pair(&swaper, &weth(), &usdc()).await.unwrap());
        assert!(!supports_pair(&swaper, &weth(), &mocks::gho()).await.unwrap());
    }

    #[test]
    fn test_swap_logic_shape() {
        let swaper = mocks::static_swaper();
        let quotation = SwapQuotation {
            swaper: "static".to_string(),
            input: TokenAmount::new(weth(), dec!(1)).unwrap(),
            output: TokenAmount::new(usdc(), dec!(1990)).unwrap(),
            slippage_bps: 100,
            exact_in: true,
            payload: serde_json::Value::Null,
            quoted_at: Utc::now(),
        };
        let logic = swaper.new_swap_token_logic(&quotation);
        assert_eq!(logic.rid, format!("{}:swap-token", swaper.id()));
        assert!(logic.is_swap());
        assert_eq!(logic.balance_bps(), None);
    }
}
