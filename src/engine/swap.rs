use rust_decimal::Decimal;

use super::{EngineError, Route, Side, TransitionEngine, TransitionError, TransitionOutput, TransitionParams};
use crate::types::TokenAmount;

impl TransitionEngine {
    /// Replace `src` collateral with `dest` collateral in place.
    ///
    /// A flash loan of `src` funds the swap and is repaid by withdrawing
    /// the old collateral, so the loan is sized to fit the withdrawal.
    pub async fn collateral_swap(&self, params: &TransitionParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.src_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let market = self.market(portfolio, params.account)?;
        market.ensure(|protocol, id| protocol.can_collateral_swap(id), "collateral-swap")?;

        let Some(position) = portfolio.find_supply(&params.src_token) else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        };
        if portfolio.find_supply(&params.dest_token).is_none() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("destToken")));
        }
        if params.src_amount > position.balance {
            let mut after = portfolio.clone();
            after.withdraw(&params.src_token, params.src_amount);
            return Ok(TransitionOutput::blocked(after, Decimal::ZERO, TransitionError::insufficient("srcAmount")));
        }
        if params.src_token == params.dest_token {
            return Ok(TransitionOutput::planned(portfolio.clone(), params.src_amount, Vec::new()));
        }

        let src = TokenAmount::new(params.src_token.clone(), params.src_amount)?;
        let repay_budget = market.withdrawn_swap_input(&src);
        let (src_facts, dest_facts, flash) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.src_token, Side::Supply),
                    self.reserve_facts(&market, portfolio, &params.dest_token, Side::Supply),
                    self.quote_flash_repay(&repay_budget),
                )
            })
            .await?;

        if src_facts.is_none() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        }
        let Some(dest_caps) = dest_facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("destToken")));
        };

        // withdrawal dust covers no loan
        if flash.loan.is_zero() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::insufficient("srcAmount")));
        }

        let route = self.timed(self.route_exact_in(&flash.loan, &params.dest_token)).await?;
        let Route::Swap(leg) = route else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("destToken")));
        };
        let dest = leg.output().clone();
        if dest.is_zero() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::insufficient("srcAmount")));
        }

        let mut after = portfolio.clone();
        after.withdraw(&src.token, src.amount).supply(&dest.token, dest.amount);
        if dest_caps.supply_exceeded(dest.amount) {
            return Ok(TransitionOutput::blocked(after, dest.amount, TransitionError::supply_cap("destAmount")));
        }

        let mut inner = vec![leg.logic().consuming_full_balance()];
        inner.extend(market.supply_logics(&dest, true)?);
        inner.extend(market.withdraw_logics(&src)?);

        Ok(TransitionOutput::planned(after, dest.amount, flash.wrap(inner)))
    }

    /// Move `src` debt into `dest` debt.
    ///
    /// `dest_amount` is the new debt, i.e. the flash loan repayment.
    pub async fn debt_swap(&self, params: &TransitionParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.src_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let market = self.market(portfolio, params.account)?;
        market.ensure(|protocol, id| protocol.can_debt_swap(id), "debt-swap")?;

        let Some(position) = portfolio.find_borrow(&params.src_token) else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        };
        if portfolio.find_borrow(&params.dest_token).is_none() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("destToken")));
        }
        if params.src_amount > position.balance() {
            let mut after = portfolio.clone();
            after.repay(&params.src_token, params.src_amount);
            return Ok(TransitionOutput::blocked(after, Decimal::ZERO, TransitionError::insufficient("srcAmount")));
        }
        if params.src_token == params.dest_token {
            return Ok(TransitionOutput::planned(portfolio.clone(), params.src_amount, Vec::new()));
        }

        let src = TokenAmount::new(params.src_token.clone(), params.src_amount)?;
        let (src_facts, dest_facts, route) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.src_token, Side::Borrow),
                    self.reserve_facts(&market, portfolio, &params.dest_token, Side::Borrow),
                    self.route_exact_out(&params.dest_token, &src),
                )
            })
            .await?;

        if src_facts.is_none() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        }
        let Some(dest_caps) = dest_facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("destToken")));
        };
        let Route::Swap(leg) = route else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("destToken")));
        };

        let flash = self.timed(self.quote_flash_loan(leg.input())).await?;
        let new_debt = flash.repay.clone();

        let mut after = portfolio.clone();
        after.repay(&src.token, src.amount).borrow(&new_debt.token, new_debt.amount);
        if dest_caps.borrow_exceeded(new_debt.amount) {
            return Ok(TransitionOutput::blocked(
                after,
                new_debt.amount,
                TransitionError::borrow_cap("destAmount"),
            ));
        }

        let mut inner = vec![leg.logic().consuming_full_balance()];
        inner.extend(market.repay_logics(position, &src, true)?);
        inner.push(market.borrow_logic(&new_debt)?);

        Ok(TransitionOutput::planned(after, new_debt.amount, flash.wrap(inner)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::params;
    use super::*;
    use crate::logic::Action;
    use crate::mocks::{self, dai, usdc, wbtc, weth};
    use rust_decimal_macros::dec;

    fn actions(output: &TransitionOutput) -> Vec<Action> {
        output.logics.iter().map(|logic| logic.action).collect()
    }

    #[tokio::test]
    async fn test_collateral_swap_sequence() {
        let engine = mocks::engine();
        let output = engine.collateral_swap(&params(weth(), dec!(1), usdc())).await.unwrap();

        assert!(output.is_ok());
        assert_eq!(
            actions(&output),
            vec![
                Action::FlashLoan,
                Action::SwapToken,
                Action::Supply,
                Action::SendToken,
                Action::PullToken,
                Action::Withdraw,
                Action::FlashLoan,
            ]
        );

        // the loan plus fee fits inside the withdrawn collateral
        let repay = output.logics[6].input.as_ref().unwrap().quoted();
        assert!(repay.amount <= dec!(1));
        assert_eq!(output.after_portfolio.supply_balance(&weth()), dec!(1));
        assert_eq!(output.after_portfolio.supply_balance(&usdc()), dec!(10000) + output.dest_amount);
        assert!(output.dest_amount > dec!(1990) && output.dest_amount < dec!(1994));
    }

    #[tokio::test]
    async fn test_collateral_swap_same_token_is_noop() {
        let engine = mocks::engine();
        let output = engine.collateral_swap(&params(weth(), dec!(1), weth())).await.unwrap();
        assert!(output.is_ok());
        assert!(output.logics.is_empty());
        assert_eq!(output.dest_amount, dec!(1));
        assert_eq!(output.after_portfolio, mocks::aave_portfolio());
    }

    #[tokio::test]
    async fn test_collateral_swap_guards() {
        let engine = mocks::engine();

        let output = engine.collateral_swap(&params(usdc(), dec!(10000.000001), weth())).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::insufficient("srcAmount")));
        assert_eq!(output.dest_amount, Decimal::ZERO);

        let output = engine.collateral_swap(&params(weth(), dec!(1), mocks::usdt())).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::unsupported("destToken")));

        // 10000 USDC buys about 0.33 WBTC, the market has 0.1 left
        let output = engine.collateral_swap(&params(usdc(), dec!(10000), wbtc())).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::supply_cap("destAmount")));
        assert!(output.logics.is_empty());
        assert!(output.dest_amount > dec!(0.33));
        assert_eq!(output.after_portfolio.supply_balance(&usdc()), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_collateral_swap_unavailable_on_morpho() {
        let engine = mocks::engine();
        let mut request = params(weth(), dec!(1), usdc());
        request.portfolio = mocks::morpho_portfolio();
        let err = engine.collateral_swap(&request).await.unwrap_err();
        assert!(matches!(err, EngineError::Unsupported { transition: "collateral-swap", .. }));
    }

    #[tokio::test]
    async fn test_debt_swap_sequence() {
        let engine = mocks::engine();
        let output = engine.debt_swap(&params(usdc(), dec!(500), weth())).await.unwrap();

        assert!(output.is_ok());
        assert_eq!(
            actions(&output),
            vec![
                Action::FlashLoan,
                Action::SwapToken,
                Action::Repay,
                Action::Borrow,
                Action::FlashLoan,
            ]
        );
        let repay = output.logics[4].input.as_ref().unwrap().quoted();
        assert_eq!(output.dest_amount, repay.amount);
        assert_eq!(output.logics[3].output.as_ref(), Some(repay));
        assert_eq!(output.after_portfolio.borrow_balance(&usdc()), dec!(500));
        assert_eq!(output.after_portfolio.borrow_balance(&weth()), output.dest_amount);
        // exact-out of 500 USDC at 2000 plus fees
        assert!(output.dest_amount > dec!(0.25) && output.dest_amount < dec!(0.26));
    }

    #[tokio::test]
    async fn test_debt_swap_borrow_cap() {
        let engine = mocks::engine();
        // DAI borrow market has 500 left
        let output = engine.debt_swap(&params(usdc(), dec!(1000), dai())).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::borrow_cap("destAmount")));
        assert!(output.logics.is_empty());
        assert!(output.dest_amount > dec!(1000));
        assert_eq!(output.after_portfolio.borrow_balance(&dai()), output.dest_amount);
    }

    #[tokio::test]
    async fn test_debt_swap_above_balance_is_insufficient() {
        let engine = mocks::engine();
        // one USDC wei above the 1000 owed
        let output = engine.debt_swap(&params(usdc(), dec!(1000.000001), weth())).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::insufficient("srcAmount")));
        assert_eq!(output.dest_amount, Decimal::ZERO);
        assert!(output.logics.is_empty());
        assert_eq!(output.after_portfolio.borrow_balance(&usdc()), Decimal::ZERO);

        assert!(engine.debt_swap(&params(usdc(), dec!(1000), weth())).await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_collateral_swap_of_rounding_dust_is_insufficient() {
        let engine = mocks::engine();
        let output = engine
            .collateral_swap(&params(weth(), dec!(0.000000000000000002), usdc()))
            .await
            .unwrap();
        assert_eq!(output.error, Some(TransitionError::insufficient("srcAmount")));
        assert!(output.logics.is_empty());
        assert_eq!(output.dest_amount, Decimal::ZERO);
        assert_eq!(output.after_portfolio, mocks::aave_portfolio());
    }
}
