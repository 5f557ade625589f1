use futures::future::try_join_all;
use rust_decimal::Decimal;
use tracing::debug;

use super::{CloseParams, EngineError, Route, TransitionEngine, TransitionError, TransitionOutput};
use crate::portfolio::BorrowPosition;
use crate::types::TokenAmount;

impl TransitionEngine {
    /// Unwind the whole position into `withdrawal_token`.
    ///
    /// A flash loan of the withdrawal token repays every debt (swapping
    /// where the debt is in another token), then every collateral is
    /// withdrawn and swapped back. `dest_amount` is what is left for the
    /// account after the loan is repaid.
    pub async fn close(&self, params: &CloseParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if !portfolio.has_positions() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let market = self.market(portfolio, params.account)?;
        let withdrawal_token = &params.withdrawal_token;

        let debts: Vec<(&BorrowPosition, TokenAmount)> = portfolio
            .borrows
            .iter()
            .filter(|position| !position.balance().is_zero())
            .map(|position| Ok((position, TokenAmount::new(position.token.clone(), position.balance())?)))
            .collect::<Result<_, EngineError>>()?;
        let collaterals: Vec<TokenAmount> = portfolio
            .supplies
            .iter()
            .filter(|position| !position.balance.is_zero())
            .map(|position| TokenAmount::new(position.token.clone(), position.balance))
            .collect::<Result<_, _>>()?;
        let swap_inputs: Vec<TokenAmount> = collaterals
            .iter()
            .map(|amount| market.withdrawn_swap_input(amount))
            .collect();
        // collateral too small to survive the withdrawal rounding
        if swap_inputs.iter().any(|input| input.is_zero() && &input.token != withdrawal_token) {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::insufficient("destAmount")));
        }

        let (debt_routes, collateral_routes) = self
            .timed(async {
                tokio::try_join!(
                    try_join_all(debts.iter().map(|(_, debt)| self.route_exact_out(withdrawal_token, debt))),
                    try_join_all(swap_inputs.iter().map(|input| self.route_exact_in(input, withdrawal_token))),
                )
            })
            .await?;

        if debt_routes.iter().chain(collateral_routes.iter()).any(|route| matches!(route, Route::NoRoute)) {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("withdrawalToken")));
        }
        if collateral_routes.iter().any(|route| matches!(route, Route::Swap(leg) if leg.output().is_zero())) {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::insufficient("destAmount")));
        }

        let mut inner = Vec::new();
        let mut required = Decimal::ZERO;
        for ((position, debt), route) in debts.iter().zip(debt_routes.iter()) {
            let swapped = match route {
                Route::Swap(leg) => {
                    required += leg.input().amount;
                    inner.push(leg.logic());
                    true
                }
                _ => {
                    required += debt.amount;
                    false
                }
            };
            inner.extend(market.repay_logics(position, debt, swapped)?);
        }

        let mut proceeds = Decimal::ZERO;
        for (collateral, route) in collaterals.iter().zip(collateral_routes.iter()) {
            inner.extend(market.withdraw_logics(collateral)?);
            match route {
                Route::Swap(leg) => {
                    proceeds += leg.output().amount;
                    inner.push(leg.logic().consuming_full_balance());
                }
                _ => proceeds += collateral.amount,
            }
        }

        let flash = if debts.is_empty() {
            None
        } else {
            let loan = TokenAmount::new(withdrawal_token.clone(), required)?;
            Some(self.timed(self.quote_flash_loan(&loan)).await?)
        };
        let repaid = flash.as_ref().map(|flash| flash.repay.amount).unwrap_or_default();
        debug!("close: proceeds {} {}, flash repayment {}", proceeds, withdrawal_token, repaid);

        let mut after = portfolio.clone();
        for (_, debt) in &debts {
            after.repay(&debt.token, debt.amount);
        }
        for collateral in &collaterals {
            after.withdraw(&collateral.token, collateral.amount);
        }

        let dest_amount = proceeds - repaid;
        if dest_amount <= Decimal::ZERO {
            return Ok(TransitionOutput::blocked(after, Decimal::ZERO, TransitionError::insufficient("destAmount")));
        }

        let logics = match &flash {
            Some(flash) => flash.wrap(inner),
            None => inner,
        };
        Ok(TransitionOutput::planned(after, dest_amount, logics))
    }
}
