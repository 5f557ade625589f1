use alloy::primitives::Address;
use async_trait::async_trait;
use tracing::info;

use super::{LendingProtocol, MarketBooks, ProtocolError, ReserveCaps};
use crate::config::MarketConfig;
use crate::constants::RADIANT_V2;
use crate::logic::{Action, Logic, LogicAmount};
use crate::portfolio::InterestRateMode;
use crate::types::{Token, TokenAmount};

/// Radiant v2 (Aave v2 fork, rTokens, `deposit` naming)
pub struct RadiantV2Protocol {
    chain_id: u64,
    markets: MarketBooks,
}

impl RadiantV2Protocol {
    pub fn new(chain_id: u64, markets: &[MarketConfig]) -> Self {
        let markets = MarketBooks::new(RADIANT_V2, markets);
        info!("🏦 Radiant v2 adapter with markets {:?}", markets.market_ids());
        Self { chain_id, markets }
    }
}

#[async_trait]
impl LendingProtocol for RadiantV2Protocol {
    fn id(&self) -> &str {
        RADIANT_V2
    }

    fn display_name(&self) -> &str {
        "Radiant V2"
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn market_ids(&self) -> Vec<String> {
        self.markets.market_ids()
    }

    async fn is_token_for_supply(&self, market_id: &str, token: &Token) -> Result<bool, ProtocolError> {
        Ok(self.markets.book(market_id)?.can_supply(token))
    }

    async fn is_token_for_borrow(&self, market_id: &str, token: &Token) -> Result<bool, ProtocolError> {
        Ok(self.markets.book(market_id)?.can_borrow(token))
    }

    async fn caps(&self, market_id: &str, token: &Token) -> Result<ReserveCaps, ProtocolError> {
        self.markets.book(market_id)?.caps(token)
    }

    fn is_asset_tokenized(&self, market_id: &str, token: &Token) -> bool {
        self.to_protocol_token(market_id, token).is_some()
    }

    fn to_protocol_token(&self, market_id: &str, token: &Token) -> Option<Token> {
        self.markets.book(market_id).ok()?.protocol_token(token)
    }

    fn new_supply_logic(&self, market_id: &str, input: &TokenAmount) -> Result<Logic, ProtocolError> {
        let r_token = self.markets.book(market_id)?.require_protocol_token(&input.token)?;
        Ok(self
            .markets
            .logic("deposit", Action::Supply, market_id)
            .with_input(LogicAmount::fixed(input.clone()))
            .with_output(TokenAmount::new(r_token, input.amount)?))
    }

    fn new_withdraw_logic(&self, market_id: &str, output: &TokenAmount) -> Result<Logic, ProtocolError> {
        let r_token = self.markets.book(market_id)?.require_protocol_token(&output.token)?;
        Ok(self
            .markets
            .logic("withdraw", Action::Withdraw, market_id)
            .with_input(LogicAmount::fixed(TokenAmount::new(r_token, output.amount)?))
            .with_output(output.clone()))
    }

    fn new_borrow_logic(&self, market_id: &str, output: &TokenAmount) -> Result<Logic, ProtocolError> {
        self.markets.book(market_id)?;
        Ok(self
            .markets
            .rate_mode_logic("borrow", Action::Borrow, market_id, InterestRateMode::Variable, None)
            .with_output(output.clone()))
    }

    fn new_repay_logic(
        &self,
        market_id: &str,
        borrower: Address,
        input: &TokenAmount,
        interest_rate_mode: InterestRateMode,
    ) -> Result<Logic, ProtocolError> {
        self.markets.book(market_id)?;
        Ok(self
            .markets
            .rate_mode_logic("repay", Action::Repay, market_id, interest_rate_mode, Some(borrower))
            .with_input(LogicAmount::fixed(input.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{self, weth};
    use rust_decimal_macros::dec;

    #[test]
    fn test_deposit_naming() {
        let radiant = RadiantV2Protocol::new(1, &mocks::market_configs());
        let amount = TokenAmount::new(weth(), dec!(2)).unwrap();

        let deposit = radiant.new_supply_logic("mainnet", &amount).unwrap();
        assert_eq!(deposit.rid, "radiant-v2:deposit");
        assert_eq!(deposit.output.unwrap().token.symbol, "rWETH");
        assert_eq!(radiant.withdrawal_rounding_wei(), 0);
        assert!(radiant.is_asset_tokenized("mainnet", &weth()));
    }
}
