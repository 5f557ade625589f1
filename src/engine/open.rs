//! Open (or top up) a leveraged position from a wallet deposit.

use rust_decimal::Decimal;

use super::{
    EngineError, OpenByCollateralParams, OpenByDebtParams, Route, Side, SwapLeg, TransitionEngine,
    TransitionError, TransitionOutput,
};
use crate::logic::Logic;
use crate::types::{Token, TokenAmount};

/// Wallet deposit converted into collateral
struct Zap {
    collateral: Decimal,
    swap: Option<SwapLeg>,
}

impl TransitionEngine {
    async fn route_zap(&self, zap: Option<&TokenAmount>, collateral: &Token) -> Result<Option<Route>, EngineError> {
        match zap {
            Some(input) => Ok(Some(self.route_exact_in(input, collateral).await?)),
            None => Ok(None),
        }
    }

    /// Open by target total collateral.
    ///
    /// Leverage covers whatever the existing collateral and the zap do
    /// not. `dest_amount` is the added debt.
    pub async fn open_by_collateral(&self, params: &OpenByCollateralParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.collateral_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let zap = zap_input(params.zap_token.as_ref(), params.zap_amount)?;
        let market = self.market(portfolio, params.account)?;
        if portfolio.find_supply(&params.collateral_token).is_none() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("collateralToken")));
        }
        if portfolio.find_borrow(&params.debt_token).is_none()
            || !market.protocol.can_leverage(&market.id, &params.debt_token)
        {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("debtToken")));
        }

        let (collateral_facts, debt_facts, zap_route) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.collateral_token, Side::Supply),
                    self.reserve_facts(&market, portfolio, &params.debt_token, Side::Borrow),
                    self.route_zap(zap.as_ref(), &params.collateral_token),
                )
            })
            .await?;

        let Some(collateral_caps) = collateral_facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("collateralToken")));
        };
        let Some(debt_caps) = debt_facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("debtToken")));
        };
        let Some(zap) = settle_zap(zap.as_ref(), zap_route) else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("zapToken")));
        };

        let initial = portfolio.supply_balance(&params.collateral_token);
        let leverage = params.collateral_amount - initial - zap.collateral;
        if leverage <= Decimal::ZERO {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::collateral_exceeded("collateralAmount")));
        }
        let leverage = TokenAmount::new(params.collateral_token.clone(), leverage)?;

        let route = self.timed(self.route_exact_out(&params.debt_token, &leverage)).await?;
        let (loan, swap) = match route {
            Route::Direct => (leverage.clone(), None),
            Route::Swap(leg) => (leg.input().clone(), Some(leg)),
            Route::NoRoute => return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("debtToken"))),
        };
        let flash = self.timed(self.quote_flash_loan(&loan)).await?;
        let debt = flash.repay.clone();
        let supplied = leverage.add(zap.collateral)?;

        let mut after = portfolio.clone();
        after.supply(&supplied.token, supplied.amount).borrow(&debt.token, debt.amount);
        if collateral_caps.supply_exceeded(supplied.amount) {
            return Ok(TransitionOutput::blocked(
                after,
                debt.amount,
                TransitionError::supply_cap("collateralAmount"),
            ));
        }
        if debt_caps.borrow_exceeded(debt.amount) {
            return Ok(TransitionOutput::blocked(after, debt.amount, TransitionError::borrow_cap("destAmount")));
        }

        let chained = zap.swap.is_some() || swap.is_some();
        let mut inner = Vec::new();
        if let Some(leg) = &swap {
            inner.push(leg.logic().consuming_full_balance());
        }
        inner.extend(market.supply_logics(&supplied, chained)?);
        inner.push(market.borrow_logic(&debt)?);

        let mut logics: Vec<Logic> = zap.swap.iter().map(SwapLeg::logic).collect();
        logics.extend(flash.wrap(inner));
        Ok(TransitionOutput::planned(after, debt.amount, logics))
    }

    /// Open by target total debt.
    ///
    /// The added debt repays a flash loan whose proceeds become
    /// collateral. `dest_amount` is the total collateral supplied.
    pub async fn open_by_debt(&self, params: &OpenByDebtParams) -> Result<TransitionOutput, EngineError> {
        let portfolio = &params.portfolio;
        if params.debt_amount.is_zero() {
            return Ok(TransitionOutput::unchanged(portfolio));
        }
        let zap = zap_input(params.zap_token.as_ref(), params.zap_amount)?;
        let market = self.market(portfolio, params.account)?;
        if portfolio.find_supply(&params.collateral_token).is_none() {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("collateralToken")));
        }
        if portfolio.find_borrow(&params.debt_token).is_none()
            || !market.protocol.can_leverage(&market.id, &params.debt_token)
        {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("debtToken")));
        }

        let initial = portfolio.borrow_balance(&params.debt_token);
        if params.debt_amount <= initial {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::debt_exceeded("debtAmount")));
        }
        let added = TokenAmount::new(params.debt_token.clone(), params.debt_amount - initial)?;

        let (collateral_facts, debt_facts, zap_route, flash) = self
            .timed(async {
                tokio::try_join!(
                    self.reserve_facts(&market, portfolio, &params.collateral_token, Side::Supply),
                    self.reserve_facts(&market, portfolio, &params.debt_token, Side::Borrow),
                    self.route_zap(zap.as_ref(), &params.collateral_token),
                    self.quote_flash_repay(&added),
                )
            })
            .await?;

        let Some(collateral_caps) = collateral_facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("collateralToken")));
        };
        let Some(debt_caps) = debt_facts else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::unsupported("debtToken")));
        };
        let Some(zap) = settle_zap(zap.as_ref(), zap_route) else {
            return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("zapToken")));
        };

        let route = self.timed(self.route_exact_in(&flash.loan, &params.collateral_token)).await?;
        let (leveraged, swap) = match route {
            Route::Direct => (flash.loan.amount, None),
            Route::Swap(leg) => (leg.output().amount, Some(leg)),
            Route::NoRoute => return Ok(TransitionOutput::rejected(portfolio, TransitionError::no_route("collateralToken"))),
        };
        let supplied = TokenAmount::new(params.collateral_token.clone(), leveraged + zap.collateral)?;

        let mut after = portfolio.clone();
        after.supply(&supplied.token, supplied.amount).borrow(&added.token, added.amount);
        if collateral_caps.supply_exceeded(supplied.amount) {
            return Ok(TransitionOutput::blocked(
                after,
                supplied.amount,
                TransitionError::supply_cap("destAmount"),
            ));
        }
        if debt_caps.borrow_exceeded(added.amount) {
            return Ok(TransitionOutput::blocked(
                after,
                supplied.amount,
                TransitionError::borrow_cap("debtAmount"),
            ));
        }

        let chained = zap.swap.is_some() || swap.is_some();
        let mut inner = Vec::new();
        if let Some(leg) = &swap {
            inner.push(leg.logic().consuming_full_balance());
        }
        inner.extend(market.supply_logics(&supplied, chained)?);
        inner.push(market.borrow_logic(&added)?);

        let mut logics: Vec<Logic> = zap.swap.iter().map(SwapLeg::logic).collect();
        logics.extend(flash.wrap(inner));
        Ok(TransitionOutput::planned(after, supplied.amount, logics))
    }
}

fn zap_input(token: Option<&Token>, amount: Decimal) -> Result<Option<TokenAmount>, EngineError> {
    if amount.is_zero() {
        return Ok(None);
    }
    let token = token.ok_or(EngineError::MissingParameter("zapToken"))?;
    Ok(Some(TokenAmount::new(token.clone(), amount)?))
}

/// `None` when a zap was requested but no swaper can route it.
fn settle_zap(input: Option<&TokenAmount>, route: Option<Route>) -> Option<Zap> {
    match (input, route) {
        (Some(input), Some(Route::Direct)) => Some(Zap {
            collateral: input.amount,
            swap: None,
        }),
        (_, Some(Route::Swap(leg))) => Some(Zap {
            collateral: leg.output().amount,
            swap: Some(leg),
        }),
        (_, Some(Route::NoRoute)) => None,
        _ => Some(Zap {
            collateral: Decimal::ZERO,
            swap: None,
        }),
    }
}
