//! Single-sided transitions: one lending action, optionally paired with a
//! swap on the wallet side.

use rust_decimal::Decimal;

use super::{EngineError, Route, Side, TransitionEngine, TransitionError, TransitionOutput, TransitionParams};
use crate::types::TokenAmount;

impl TransitionEngine {
    /// Swap `src` from the wallet into `dest` and supply it.
    pub async fn zap_supply(&self, params: &TransitionParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.src_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let market = self.market(portfolio, params.account)?;
        let src = TokenAmount::new(params.src_token.clone(), params.src_amount)?;

        let (facts, route) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.dest_token, Side::Supply),
                    self.route_exact_in(&src, &params.dest_token),
                )
            })
            .await?;

        let Some(caps) = facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("destToken")));
        };
        let (dest, swap) = match route {
            Route::Direct => (src, None),
            Route::Swap(leg) => (leg.output().clone(), Some(leg)),
            Route::NoRoute => return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("destToken"))),
        };

        let mut after = portfolio.clone();
        after.supply(&dest.token, dest.amount);
        if caps.supply_exceeded(dest.amount) {
            return Ok(TransitionOutput::blocked(after, dest.amount, TransitionError::supply_cap("destAmount")));
        }

        let mut logics = Vec::new();
        if let Some(leg) = &swap {
            logics.push(leg.logic());
        }
        logics.extend(market.supply_logics(&dest, swap.is_some())?);

        Ok(TransitionOutput::planned(after, dest.amount, logics))
    }

    /// Withdraw `src` collateral and swap it into `dest` for the wallet.
    pub async fn zap_withdraw(&self, params: &TransitionParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.src_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let market = self.market(portfolio, params.account)?;

        let Some(position) = portfolio.find_supply(&params.src_token) else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        };
        if params.src_amount > position.balance {
            let mut after = portfolio.clone();
            after.withdraw(&params.src_token, params.src_amount);
            return Ok(TransitionOutput::blocked(after, Decimal::ZERO, TransitionError::insufficient("srcAmount")));
        }

        let src = TokenAmount::new(params.src_token.clone(), params.src_amount)?;
        let swap_input = market.withdrawn_swap_input(&src);
        if swap_input.is_zero() && params.src_token != params.dest_token {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::insufficient("srcAmount")));
        }
        let (facts, route) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.src_token, Side::Supply),
                    self.route_exact_in(&swap_input, &params.dest_token),
                )
            })
            .await?;

        if facts.is_none() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        }

        let mut logics = market.withdraw_logics(&src)?;
        let dest_amount = match route {
            Route::Direct => src.amount,
            Route::Swap(leg) if leg.output().is_zero() => {
                return Ok(TransitionOutput::rejected(portfolio, TransitionError::insufficient("srcAmount")))
            }
            Route::Swap(leg) => {
                logics.push(leg.logic().consuming_full_balance());
                leg.output().amount
            }
            Route::NoRoute => return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("destToken"))),
        };

        let mut after = portfolio.clone();
        after.withdraw(&src.token, src.amount);
        Ok(TransitionOutput::planned(after, dest_amount, logics))
    }

    /// Borrow `src` and swap it into `dest` for the wallet.
    pub async fn zap_borrow(&self, params: &TransitionParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.src_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let market = self.market(portfolio, params.account)?;
        let src = TokenAmount::new(params.src_token.clone(), params.src_amount)?;

        let (facts, route) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.src_token, Side::Borrow),
                    self.route_exact_in(&src, &params.dest_token),
                )
            })
            .await?;

        let Some(caps) = facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        };

        let mut after = portfolio.clone();
        after.borrow(&src.token, src.amount);
        if caps.borrow_exceeded(src.amount) {
            return Ok(TransitionOutput::blocked(after, Decimal::ZERO, TransitionError::borrow_cap("srcAmount")));
        }

        let mut logics = vec![market.borrow_logic(&src)?];
        let dest_amount = match route {
            Route::Direct => src.amount,
            Route::Swap(leg) if leg.output().is_zero() => {
                return Ok(TransitionOutput::rejected(portfolio, TransitionError::insufficient("srcAmount")))
            }
            Route::Swap(leg) => {
                logics.push(leg.logic().consuming_full_balance());
                leg.output().amount
            }
            Route::NoRoute => return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("destToken"))),
        };

        Ok(TransitionOutput::planned(after, dest_amount, logics))
    }

    /// Repay `src` debt with `dest` from the wallet. `dest_amount` is the
    /// wallet-side spend.
    pub async fn zap_repay(&self, params: &TransitionParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.src_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let market = self.market(portfolio, params.account)?;

        let Some(position) = portfolio.find_borrow(&params.src_token) else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        };
        if params.src_amount > position.balance() {
            let mut after = portfolio.clone();
            after.repay(&params.src_token, params.src_amount);
            return Ok(TransitionOutput::blocked(after, Decimal::ZERO, TransitionError::insufficient("srcAmount")));
        }

        let src = TokenAmount::new(params.src_token.clone(), params.src_amount)?;
        let (facts, route) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.src_token, Side::Borrow),
                    self.route_exact_out(&params.dest_token, &src),
                )
            })
            .await?;

        if facts.is_none() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        }

        let mut logics = Vec::new();
        let (dest_amount, swapped) = match route {
            Route::Direct => (src.amount, false),
            Route::Swap(leg) => {
                logics.push(leg.logic());
                (leg.input().amount, true)
            }
            Route::NoRoute => return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("destToken"))),
        };
        logics.extend(market.repay_logics(position, &src, swapped)?);

        let mut after = portfolio.clone();
        after.repay(&src.token, src.amount);
        Ok(TransitionOutput::planned(after, dest_amount, logics))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::params;
    use super::*;
    use crate::logic::Action;
    use crate::mocks::{self, dai, usdc, wbtc, weth};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_zap_supply_swaps_then_supplies_balance() {
        let engine = mocks::engine();
        let output = engine.zap_supply(&params(usdc(), dec!(2000), weth())).await.unwrap();

        assert!(output.is_ok());
        let actions: Vec<Action> = output.logics.iter().map(|logic| logic.action).collect();
        assert_eq!(actions, vec![Action::SwapToken, Action::Supply, Action::SendToken]);
        assert_eq!(output.logics[1].balance_bps(), Some(crate::constants::BPS_BASE));
        // 2000 USDC at 2000 minus 30 bps
        assert_eq!(output.dest_amount, dec!(0.997));
        assert_eq!(output.after_portfolio.supply_balance(&weth()), dec!(2.997));
    }

    #[tokio::test]
    async fn test_zap_supply_cap() {
        let engine = mocks::engine();
        // WBTC market sits 0.1 below its cap
        let output = engine.zap_supply(&params(wbtc(), dec!(0.10000001), wbtc())).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::supply_cap("destAmount")));
        assert!(output.logics.is_empty());
        assert_eq!(output.dest_amount, dec!(0.10000001));
        assert_eq!(output.after_portfolio.supply_balance(&wbtc()), dec!(0.60000001));

        let output = engine.zap_supply(&params(wbtc(), dec!(0.1), wbtc())).await.unwrap();
        assert!(output.is_ok());
    }

    #[tokio::test]
    async fn test_caps_follow_portfolio_snapshot() {
        let engine = mocks::engine();
        let mut request = params(weth(), dec!(10.000000000000000001), weth());
        for position in request.portfolio.supplies.iter_mut().filter(|position| position.token == weth()) {
            position.supply_cap = dec!(50);
            position.total_supply = dec!(40);
        }
        let output = engine.zap_supply(&request).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::supply_cap("destAmount")));
        assert!(output.logics.is_empty());

        request.src_amount = dec!(10);
        assert!(engine.zap_supply(&request).await.unwrap().is_ok());

        let mut request = params(weth(), dec!(5.000000000000000001), weth());
        for position in request.portfolio.borrows.iter_mut().filter(|position| position.token == weth()) {
            position.borrow_cap = dec!(50);
            position.total_borrow = dec!(45);
        }
        let output = engine.zap_borrow(&request).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::borrow_cap("srcAmount")));
    }

    #[tokio::test]
    async fn test_zap_supply_unsupported_token() {
        let engine = mocks::engine();
        let output = engine.zap_supply(&params(usdc(), dec!(10), mocks::usdt())).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::unsupported("destToken")));
        assert_eq!(output.after_portfolio, mocks::aave_portfolio());
    }

    #[tokio::test]
    async fn test_zap_withdraw_insufficient() {
        let engine = mocks::engine();
        let output = engine
            .zap_withdraw(&params(weth(), dec!(2.000000000000000001), usdc()))
            .await
            .unwrap();
        assert_eq!(output.error, Some(TransitionError::insufficient("srcAmount")));
        assert_eq!(output.dest_amount, Decimal::ZERO);
        assert!(output.logics.is_empty());
        assert_eq!(output.after_portfolio.supply_balance(&weth()), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_zap_withdraw_pulls_atoken_then_swaps() {
        let engine = mocks::engine();
        let output = engine.zap_withdraw(&params(weth(), dec!(1), usdc())).await.unwrap();

        let actions: Vec<Action> = output.logics.iter().map(|logic| logic.action).collect();
        assert_eq!(actions, vec![Action::PullToken, Action::Withdraw, Action::SwapToken]);
        assert!(output.logics[2].input.as_ref().unwrap().is_balance_relative());
        // swap input is short of the aToken rounding dust
        assert!(output.logics[2].input.as_ref().unwrap().quoted().amount < dec!(1));
        assert!(output.dest_amount > dec!(1993) && output.dest_amount < dec!(1994));
    }

    #[tokio::test]
    async fn test_zap_borrow_cap_reports_zero_dest() {
        let engine = mocks::engine();
        // WETH borrow cap 500 with 100 outstanding
        let output = engine.zap_borrow(&params(weth(), dec!(400.000000000000000001), usdc())).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::borrow_cap("srcAmount")));
        assert_eq!(output.dest_amount, Decimal::ZERO);
        assert!(output.logics.is_empty());
    }

    #[tokio::test]
    async fn test_zap_borrow_then_swap() {
        let engine = mocks::engine();
        let output = engine.zap_borrow(&params(usdc(), dec!(1000), dai())).await.unwrap();
        assert_eq!(output.logics[0].action, Action::Borrow);
        assert_eq!(output.logics[1].balance_bps(), Some(crate::constants::BPS_BASE));
        assert_eq!(output.dest_amount, dec!(997));
        assert_eq!(output.after_portfolio.borrow_balance(&usdc()), dec!(2000));
    }

    #[tokio::test]
    async fn test_zap_repay_exact_out() {
        let engine = mocks::engine();
        let output = engine.zap_repay(&params(usdc(), dec!(500), dai())).await.unwrap();

        assert!(output.is_ok());
        assert_eq!(output.logics[0].action, Action::SwapToken);
        let repay = &output.logics[1];
        assert_eq!(repay.action, Action::Repay);
        assert_eq!(repay.balance_bps(), Some(crate::constants::BPS_BASE));
        assert!(output.dest_amount > dec!(500));
        assert_eq!(output.after_portfolio.borrow_balance(&usdc()), dec!(500));
    }

    #[tokio::test]
    async fn test_zap_repay_splits_rate_modes() {
        let engine = mocks::engine();
        let mut request = params(usdc(), dec!(1500), usdc());
        request.portfolio = mocks::mixed_rate_portfolio();

        let output = engine.zap_repay(&request).await.unwrap();
        assert!(output.is_ok());
        assert_eq!(output.logics.len(), 2);
        assert_eq!(output.logics[0].input.as_ref().unwrap().quoted().amount, dec!(1000));
        assert_eq!(output.logics[1].input.as_ref().unwrap().quoted().amount, dec!(500));
        assert_eq!(output.after_portfolio.borrow_balance(&usdc()), dec!(500));
    }

    #[tokio::test]
    async fn test_zap_repay_insufficient() {
        let engine = mocks::engine();
        let output = engine.zap_repay(&params(usdc(), dec!(1000.000001), usdc())).await.unwrap();
        assert_eq!(output.error, Some(TransitionError::insufficient("srcAmount")));
        assert_eq!(output.dest_amount, Decimal::ZERO);
        assert_eq!(output.after_portfolio.borrow_balance(&usdc()), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_zap_withdraw_dust_is_insufficient() {
        let engine = mocks::engine();
        // swallowed by the aToken rounding
        let output = engine
            .zap_withdraw(&params(weth(), dec!(0.000000000000000003), usdc()))
            .await
            .unwrap();
        assert_eq!(output.error, Some(TransitionError::insufficient("srcAmount")));
        assert!(output.logics.is_empty());

        // swaps into less than one USDC unit
        let output = engine
            .zap_withdraw(&params(weth(), dec!(0.0000000001), usdc()))
            .await
            .unwrap();
        assert_eq!(output.error, Some(TransitionError::insufficient("srcAmount")));
        assert_eq!(output.after_portfolio, mocks::aave_portfolio());
    }
}
