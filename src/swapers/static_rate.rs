use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::{emulate_exact_out, SwapQuotation, Swaper, SwaperError};
use crate::constants::BPS_BASE;
use crate::types::{Token, TokenAmount};

/// Oracle-priced swaper for offline planning
///
/// Converts through USD prices and charges a flat fee. Pairs without a
/// price report no route.
#[derive(Debug, Clone)]
pub struct StaticRateSwaper {
    id: String,
    chain_id: u64,
    fee_bps: u32,
    exact_out: bool,
    prices: HashMap<Token, Decimal>,
}

impl StaticRateSwaper {
    pub fn new(id: &str, chain_id: u64, fee_bps: u32) -> Self {
        Self {
            id: id.to_string(),
            chain_id,
            fee_bps,
            exact_out: true,
            prices: HashMap::new(),
        }
    }

    pub fn with_price(mut self, token: Token, price: Decimal) -> Self {
        self.prices.insert(token, price);
        self
    }

    pub fn with_exact_out(mut self, exact_out: bool) -> Self {
        self.exact_out = exact_out;
        self
    }

    fn fee_factor(&self) -> Decimal {
        Decimal::ONE - Decimal::from(self.fee_bps) / Decimal::from(BPS_BASE)
    }

    /// Units of `token_out` per unit of `token_in`, fee excluded
    fn rate(&self, token_in: &Token, token_out: &Token) -> Result<Decimal, SwaperError> {
        match (self.prices.get(token_in), self.prices.get(token_out)) {
            (Some(price_in), Some(price_out)) if !price_out.is_zero() && !price_in.is_zero() => {
                Ok(*price_in / *price_out)
            }
            _ => Err(SwaperError::no_route(token_in, token_out)),
        }
    }
}

#[async_trait]
impl Swaper for StaticRateSwaper {
    fn id(&self) -> &str {
        &self.id
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn supports_exact_out(&self) -> bool {
        self.exact_out
    }

    async fn tokens(&self) -> Result<Vec<Token>, SwaperError> {
        Ok(self.prices.keys().cloned().collect())
    }

    async fn quote_exact_in(
        &self,
        input: &TokenAmount,
        token_out: &Token,
        slippage_bps: u32,
    ) -> Result<SwapQuotation, SwaperError> {
        let rate = self.rate(&input.token, token_out)?;
        let amount = token_out.round_down(input.amount * rate * self.fee_factor());
        Ok(SwapQuotation {
            swaper: self.id.clone(),
            input: input.clone(),
            output: TokenAmount::new(token_out.clone(), amount)?,
            slippage_bps,
            exact_in: true,
            payload: serde_json::Value::Null,
            quoted_at: Utc::now(),
        })
    }

    async fn quote_exact_out(
        &self,
        token_in: &Token,
        output: &TokenAmount,
        slippage_bps: u32,
    ) -> Result<SwapQuotation, SwaperError> {
        if !self.exact_out {
            return emulate_exact_out(self, token_in, output, slippage_bps).await;
        }
        let rate = self.rate(token_in, &output.token)?;
        let amount = token_in.round_up(output.amount / rate / self.fee_factor());
        Ok(SwapQuotation {
            swaper: self.id.clone(),
            input: TokenAmount::new(token_in.clone(), amount)?,
            output: output.clone(),
            slippage_bps,
            exact_in: false,
            payload: serde_json::Value::Null,
            quoted_at: Utc::now(),
        })
    }
}
