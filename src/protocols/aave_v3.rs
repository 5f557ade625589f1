use alloy::primitives::Address;
use async_trait::async_trait;
use tracing::info;

use super::{LendingProtocol, MarketBooks, ProtocolError, ReserveCaps};
use crate::config::MarketConfig;
use crate::constants::{is_leverage_blocked, AAVE_V3, AAVE_WITHDRAWAL_ROUNDING_WEI, CHAIN_AVALANCHE};
use crate::logic::{Action, Logic, LogicAmount};
use crate::portfolio::InterestRateMode;
use crate::types::{Token, TokenAmount};

/// Aave v3 pool
///
/// Supplying mints aTokens 1:1 to the supplier, so every reserve is
/// tokenized and collateral movements go through the aToken.
pub struct AaveV3Protocol {
    chain_id: u64,
    markets: MarketBooks,
}

impl AaveV3Protocol {
    pub fn new(chain_id: u64, markets: &[MarketConfig]) -> Self {
        let markets = MarketBooks::new(AAVE_V3, markets);
        info!("🏦 Aave v3 adapter with markets {:?}", markets.market_ids());
        Self { chain_id, markets }
    }
}

#[async_trait]
impl LendingProtocol for AaveV3Protocol {
    fn id(&self) -> &str {
        AAVE_V3
    }

    fn display_name(&self) -> &str {
        "Aave V3"
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

    // Avalanche pools lack the paraswap adapters needed for in-place swaps
    fn can_collateral_swap(&self, _market_id: &str) -> bool {
        self.chain_id != CHAIN_AVALANCHE
    }

    fn can_debt_swap(&self, _market_id: &str) -> bool {
        self.chain_id != CHAIN_AVALANCHE
    }

    fn can_leverage(&self, _market_id: &str, token: &Token) -> bool {
        self.chain_id != CHAIN_AVALANCHE && !is_leverage_blocked(&token.symbol)
    }

    fn can_deleverage(&self, _market_id: &str) -> bool {
        self.chain_id != CHAIN_AVALANCHE
    }

    fn withdrawal_rounding_wei(&self) -> u64 {
        AAVE_WITHDRAWAL_ROUNDING_WEI
    }

    fn new_supply_logic(&self, market_id: &str, input: &TokenAmount) -> Result<Logic, ProtocolError> {
        let a_token = self.markets.book(market_id)?.require_protocol_token(&input.token)?;
        Ok(self
            .markets
            .logic("supply", Action::Supply, market_id)
            .with_input(LogicAmount::fixed(input.clone()))
            .with_output(TokenAmount::new(a_token, input.amount)?))
    }

    fn new_withdraw_logic(&self, market_id: &str, output: &TokenAmount) -> Result<Logic, ProtocolError> {
        let a_token = self.markets.book(market_id)?.require_protocol_token(&output.token)?;
        Ok(self
            .markets
            .logic("withdraw", Action::Withdraw, market_id)
            .with_input(LogicAmount::fixed(TokenAmount::new(a_token, output.amount)?))
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
    use crate::logic::LogicParams;
    use crate::mocks::{self, gho, usdc, weth};
    use rust_decimal_macros::dec;

    fn aave() -> AaveV3Protocol {
        AaveV3Protocol::new(1, &mocks::market_configs())
    }

    #[tokio::test]
    async fn test_market_facts() {
        let aave = aave();
        assert!(aave.is_token_for_supply("mainnet", &weth()).await.unwrap());
        assert!(aave.is_token_for_borrow("mainnet", &usdc()).await.unwrap());
        assert!(aave.is_asset_tokenized("mainnet", &weth()));
        assert_eq!(aave.to_protocol_token("mainnet", &weth()).unwrap().symbol, "aEthWETH");

        let caps = aave.caps("mainnet", &weth()).await.unwrap();
        assert_eq!(caps.supply_cap, dec!(1000));

        assert!(matches!(
            aave.is_token_for_supply("arbitrum", &weth()).await,
            Err(ProtocolError::UnknownMarket { .. })
        ));
    }

    #[test]
    fn test_gho_cannot_be_leveraged() {
        let aave = aave();
        assert!(!aave.can_leverage("mainnet", &gho()));
        assert!(aave.can_leverage("mainnet", &usdc()));
        assert!(aave.can_collateral_swap("mainnet"));
        assert!(!AaveV3Protocol::new(CHAIN_AVALANCHE, &[]).can_collateral_swap("mainnet"));
    }

    #[test]
    fn test_avalanche_pool_cannot_leverage() {
        let avalanche = AaveV3Protocol::new(CHAIN_AVALANCHE, &[]);
        let usdc_e = Token::new(CHAIN_AVALANCHE, Address::repeat_byte(0xb9), 6, "USDC", "USD Coin");
        assert!(!avalanche.can_leverage("avalanche", &usdc_e));
        assert!(!avalanche.can_deleverage("avalanche"));
        assert!(!avalanche.can_debt_swap("avalanche"));
        assert!(aave().can_deleverage("mainnet"));
    }

    #[test]
    fn test_gho_blocked_on_any_chain() {
        let arbitrum_gho = Token::new(42_161, Address::repeat_byte(0x7d), 18, "GHO", "Gho Token");
        assert!(!AaveV3Protocol::new(42_161, &[]).can_leverage("arbitrum", &arbitrum_gho));
        assert!(is_leverage_blocked("GHO"));
        assert!(!is_leverage_blocked("USDC"));
    }

    #[test]
    fn test_supply_and_withdraw_logics_use_atoken() {
        let aave = aave();
        let amount = TokenAmount::new(weth(), dec!(1)).unwrap();

        let supply = aave.new_supply_logic("mainnet", &amount).unwrap();
        assert_eq!(supply.rid, "aave-v3:supply");
        assert_eq!(supply.output.as_ref().unwrap().token.symbol, "aEthWETH");

        let withdraw = aave.new_withdraw_logic("mainnet", &amount).unwrap();
        assert_eq!(withdraw.rid, "aave-v3:withdraw");
        assert_eq!(withdraw.input.as_ref().unwrap().token().symbol, "aEthWETH");
        assert_eq!(withdraw.output.as_ref(), Some(&amount));
    }

    #[test]
    fn test_repay_logic_carries_borrower_and_mode() {
        let aave = aave();
        let account = Address::repeat_byte(0x11);
        let amount = TokenAmount::new(usdc(), dec!(100)).unwrap();
        let repay = aave
            .new_repay_logic("mainnet", account, &amount, InterestRateMode::Stable)
            .unwrap();

        assert_eq!(repay.rid, "aave-v3:repay");
        assert_eq!(
            repay.params,
            LogicParams::Lending {
                market_id: "mainnet".to_string(),
                interest_rate_mode: Some(InterestRateMode::Stable),
                borrower: Some(account),
            }
        );
    }
}
