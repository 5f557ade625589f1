//! Flash-loan loops that grow or shrink both sides of a position.

use rust_decimal::Decimal;

use super::{EngineError, Route, Side, TransitionEngine, TransitionError, TransitionOutput, TransitionParams};
use crate::types::TokenAmount;

impl TransitionEngine {
    /// Add `src_amount` of collateral, paid for with new `dest` debt.
    ///
    /// Flash-borrows the debt token, swaps it into exactly `src_amount`,
    /// supplies, then borrows the loan repayment. `dest_amount` is the
    /// added debt.
    pub async fn leverage_by_collateral(&self, params: &TransitionParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.src_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let market = self.market(portfolio, params.account)?;
        if !market.protocol.can_leverage(&market.id, &params.dest_token) {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("destToken")));
        }

        let src = TokenAmount::new(params.src_token.clone(), params.src_amount)?;
        let (src_facts, dest_facts, route) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.src_token, Side::Supply),
                    self.reserve_facts(&market, portfolio, &params.dest_token, Side::Borrow),
                    self.route_exact_out(&params.dest_token, &src),
                )
            })
            .await?;

        let Some(src_caps) = src_facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        };
        let Some(dest_caps) = dest_facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("destToken")));
        };
        let (loan, swap) = match route {
            Route::Direct => (src.clone(), None),
            Route::Swap(leg) => (leg.input().clone(), Some(leg)),
            Route::NoRoute => return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("destToken"))),
        };

        let flash = self.timed(self.quote_flash_loan(&loan)).await?;
        let debt = flash.repay.clone();

        let mut after = portfolio.clone();
        after.supply(&src.token, src.amount).borrow(&debt.token, debt.amount);
        if src_caps.supply_exceeded(src.amount) {
            return Ok(TransitionOutput::blocked(after, debt.amount, TransitionError::supply_cap("srcAmount")));
        }
        if dest_caps.borrow_exceeded(debt.amount) {
            return Ok(TransitionOutput::blocked(after, debt.amount, TransitionError::borrow_cap("destAmount")));
        }

        let mut inner = Vec::new();
        if let Some(leg) = &swap {
            inner.push(leg.logic().consuming_full_balance());
        }
        inner.extend(market.supply_logics(&src, swap.is_some())?);
        inner.push(market.borrow_logic(&debt)?);

        Ok(TransitionOutput::planned(after, debt.amount, flash.wrap(inner)))
    }

    /// Add `src_amount` of debt and turn it into `dest` collateral.
    ///
    /// The flash loan is sized so that the new borrow repays it.
    pub async fn leverage_by_debt(&self, params: &TransitionParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.src_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let market = self.market(portfolio, params.account)?;
        if !market.protocol.can_leverage(&market.id, &params.src_token) {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        }

        let src = TokenAmount::new(params.src_token.clone(), params.src_amount)?;
        let (src_facts, dest_facts, flash) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.src_token, Side::Borrow),
                    self.reserve_facts(&market, portfolio, &params.dest_token, Side::Supply),
                    self.quote_flash_repay(&src),
                )
            })
            .await?;

        let Some(src_caps) = src_facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        };
        let Some(dest_caps) = dest_facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("destToken")));
        };

        let route = self.timed(self.route_exact_in(&flash.loan, &params.dest_token)).await?;
        let (collateral, swap) = match route {
            Route::Direct => (flash.loan.clone(), None),
            Route::Swap(leg) => (leg.output().clone(), Some(leg)),
            Route::NoRoute => return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("destToken"))),
        };

        let mut after = portfolio.clone();
        after.supply(&collateral.token, collateral.amount).borrow(&src.token, src.amount);
        if src_caps.borrow_exceeded(src.amount) {
            return Ok(TransitionOutput::blocked(
                after,
                collateral.amount,
                TransitionError::borrow_cap("srcAmount"),
            ));
        }
        if dest_caps.supply_exceeded(collateral.amount) {
            return Ok(TransitionOutput::blocked(
                after,
                collateral.amount,
                TransitionError::supply_cap("destAmount"),
            ));
        }

        let mut inner = Vec::new();
        if let Some(leg) = &swap {
            inner.push(leg.logic().consuming_full_balance());
        }
        inner.extend(market.supply_logics(&collateral, swap.is_some())?);
        inner.push(market.borrow_logic(&src)?);

        Ok(TransitionOutput::planned(after, collateral.amount, flash.wrap(inner)))
    }

    /// Repay `src_amount` of debt by unwinding `dest` collateral.
    ///
    /// `dest_amount` is the collateral withdrawn to settle the flash loan.
    pub async fn deleverage(&self, params: &TransitionParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.src_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let market = self.market(portfolio, params.account)?;
        market.ensure(|protocol, id| protocol.can_deleverage(id), "deleverage")?;

        let Some(position) = portfolio.find_borrow(&params.src_token) else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        };
        if params.src_amount > position.balance() {
            let mut after = portfolio.clone();
            after.repay(&params.src_token, params.src_amount);
            return Ok(TransitionOutput::blocked(after, Decimal::ZERO, TransitionError::insufficient("srcAmount")));
        }
        let Some(collateral) = portfolio.find_supply(&params.dest_token) else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("destToken")));
        };

        let src = TokenAmount::new(params.src_token.clone(), params.src_amount)?;
        let (src_facts, dest_facts, route) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.src_token, Side::Borrow),
                    self.reserve_facts(&market, portfolio, &params.dest_token, Side::Supply),
                    self.route_exact_out(&params.dest_token, &src),
                )
            })
            .await?;

        if src_facts.is_none() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("srcToken")));
        }
        if dest_facts.is_none() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("destToken")));
        }
        let (loan, swap) = match route {
            Route::Direct => (src.clone(), None),
            Route::Swap(leg) => (leg.input().clone(), Some(leg)),
            Route::NoRoute => return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("destToken"))),
        };

        let flash = self.timed(self.quote_flash_loan(&loan)).await?;
        let withdrawal = flash.repay.clone();

        let mut after = portfolio.clone();
        after.repay(&src.token, src.amount).withdraw(&withdrawal.token, withdrawal.amount);
        // The simulation clamps; the report keeps the full requirement.
        if withdrawal.amount > collateral.balance {
            return Ok(TransitionOutput::blocked(
                after,
                withdrawal.amount,
                TransitionError::insufficient("destAmount"),
            ));
        }

        let mut inner = Vec::new();
        if let Some(leg) = &swap {
            inner.push(leg.logic().consuming_full_balance());
        }
        inner.extend(market.repay_logics(position, &src, swap.is_some())?);
        inner.extend(market.withdraw_logics(&withdrawal)?);

        Ok(TransitionOutput::planned(after, withdrawal.amount, flash.wrap(inner)))
    }
}
