use alloy::primitives::Address;
use async_trait::async_trait;
use tracing::info;

use super::{LendingProtocol, MarketBooks, ProtocolError, ReserveCaps};
use crate::config::MarketConfig;
use crate::constants::MORPHO_BLUE;
use crate::logic::{Action, Logic, LogicAmount};
use crate::portfolio::InterestRateMode;
use crate::types::{Token, TokenAmount};

/// Morpho Blue isolated market
///
/// Each market pairs exactly one collateral asset with one loan asset.
/// Collateral is held by the market itself, nothing is minted to the
/// account, so collateral never needs to be pulled or sent back.
pub struct MorphoBlueProtocol {
    chain_id: u64,
    markets: MarketBooks,
}

impl MorphoBlueProtocol {
    pub fn new(chain_id: u64, markets: &[MarketConfig]) -> Result<Self, ProtocolError> {
        let markets = MarketBooks::new(MORPHO_BLUE, markets);
        for book in markets.books() {
            let collaterals = book.reserves().filter(|reserve| reserve.supply).count();
            let loans = book.reserves().filter(|reserve| reserve.borrow).count();
            if collaterals != 1 || loans != 1 {
                return Err(ProtocolError::InvalidMarket {
                    market: book.market_id().to_string(),
                    message: format!("expected one collateral and one loan asset, got {} and {}", collaterals, loans),
                });
            }
        }
        info!("🏦 Morpho Blue adapter with markets {:?}", markets.market_ids());
        Ok(Self { chain_id, markets })
    }
}

#[async_trait]
impl LendingProtocol for MorphoBlueProtocol {
    fn id(&self) -> &str {
        MORPHO_BLUE
    }

    fn display_name(&self) -> &str {
        "Morpho Blue"
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

    fn is_asset_tokenized(&self, _market_id: &str, _token: &Token) -> bool {
        false
    }

    fn to_protocol_token(&self, _market_id: &str, _token: &Token) -> Option<Token> {
        None
    }

    // single collateral per market
    fn can_collateral_swap(&self, _market_id: &str) -> bool {
        false
    }

    // single loan asset per market
    fn can_debt_swap(&self, _market_id: &str) -> bool {
        false
    }

    fn new_supply_logic(&self, market_id: &str, input: &TokenAmount) -> Result<Logic, ProtocolError> {
        self.markets.book(market_id)?;
        Ok(self
            .markets
            .logic("supply-collateral", Action::Supply, market_id)
            .with_input(LogicAmount::fixed(input.clone())))
    }

    fn new_withdraw_logic(&self, market_id: &str, output: &TokenAmount) -> Result<Logic, ProtocolError> {
        self.markets.book(market_id)?;
        Ok(self
            .markets
            .logic("withdraw-collateral", Action::Withdraw, market_id)
            .with_output(output.clone()))
    }

    fn new_borrow_logic(&self, market_id: &str, output: &TokenAmount) -> Result<Logic, ProtocolError> {
        self.markets.book(market_id)?;
        Ok(self
            .markets
            .logic("borrow", Action::Borrow, market_id)
            .with_output(output.clone()))
    }

    fn new_repay_logic(
        &self,
        market_id: &str,
        borrower: Address,
        input: &TokenAmount,
        _interest_rate_mode: InterestRateMode,
    ) -> Result<Logic, ProtocolError> {
        self.markets.book(market_id)?;
        Ok(self
            .markets
            .logic("repay", Action::Repay, market_id)
            .with_input(LogicAmount::fixed(input.clone()))
            .with_recipient(borrower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{self, usdc, weth};
    use rust_decimal_macros::dec;

    fn morpho() -> MorphoBlueProtocol {
        MorphoBlueProtocol::new(1, &mocks::market_configs()).unwrap()
    }

    #[tokio::test]
    async fn test_isolated_market_facts() {
        let morpho = morpho();
        let market = mocks::MORPHO_MARKET_ID;
        assert!(morpho.is_token_for_supply(market, &weth()).await.unwrap());
        assert!(!morpho.is_token_for_borrow(market, &weth()).await.unwrap());
        assert!(morpho.is_token_for_borrow(market, &usdc()).await.unwrap());
        assert!(!morpho.is_token_for_supply(market, &usdc()).await.unwrap());
        assert!(!morpho.is_asset_tokenized(market, &weth()));
        assert!(!morpho.can_collateral_swap(market));
    }

    #[test]
    fn test_collateral_logic_naming() {
        let morpho = morpho();
        let amount = TokenAmount::new(weth(), dec!(1)).unwrap();

        let supply = morpho.new_supply_logic(mocks::MORPHO_MARKET_ID, &amount).unwrap();
        assert_eq!(supply.rid, "morphoblue:supply-collateral");
        assert!(supply.output.is_none());

        let withdraw = morpho.new_withdraw_logic(mocks::MORPHO_MARKET_ID, &amount).unwrap();
        assert_eq!(withdraw.rid, "morphoblue:withdraw-collateral");
        assert!(withdraw.input.is_none());
    }

    #[test]
    fn test_market_shape_is_validated() {
        let mut markets = mocks::market_configs();
        for market in markets.iter_mut().filter(|m| m.protocol == MORPHO_BLUE) {
            for reserve in market.reserves.iter_mut() {
                reserve.supply = true;
            }
        }
        assert!(matches!(
            MorphoBlueProtocol::new(1, &markets),
            Err(ProtocolError::InvalidMarket { .. })
        ));
    }
}
