//! Position transition engine
//!
//! Turns a transition request plus a portfolio snapshot into a quoted
//! destination amount, an ordered logic sequence and the predicted
//! portfolio. Planners never mutate the caller's portfolio and report
//! business constraint violations inside the output instead of failing.

mod close;
mod error;
mod leverage;
mod market;
mod open;
mod params;
mod swap;
mod zap;

pub use error::{EngineError, ErrorCode, TransitionError};
pub use params::{CloseParams, OpenByCollateralParams, OpenByDebtParams, TransitionParams, TransitionRequest};

use alloy::primitives::Address;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{Config, EngineConfig};
use crate::flashloan::{ConfiguredFlashLoanVenue, FlashLoanAggregator, FlashLoanProvider, FlashLoanQuotation};
use crate::logic::Logic;
use crate::portfolio::Portfolio;
use crate::protocols::{ProtocolRegistry, ReserveCaps};
use crate::swapers::{supports_pair, HttpSwaper, SwapQuotation, Swaper, SwaperError};
use crate::types::{Token, TokenAmount};
use market::Market;

/// 트랜지션 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutput {
    pub dest_amount: Decimal,
    pub after_portfolio: Portfolio,
    pub logics: Vec<Logic>,
    pub error: Option<TransitionError>,
}

impl TransitionOutput {
    pub fn unchanged(portfolio: &Portfolio) -> Self {
        Self {
            dest_amount: Decimal::ZERO,
            after_portfolio: portfolio.clone(),
            logics: Vec::new(),
            error: None,
        }
    }

    /// Error present: the logic list is always empty.
    pub fn blocked(after_portfolio: Portfolio, dest_amount: Decimal, error: TransitionError) -> Self {
        warn!("⛔ transition blocked: {}", error);
        Self {
            dest_amount,
            after_portfolio,
            logics: Vec::new(),
            error: Some(error),
        }
    }

    /// Blocked before anything was simulated.
    pub fn rejected(portfolio: &Portfolio, error: TransitionError) -> Self {
        Self::blocked(portfolio.clone(), Decimal::ZERO, error)
    }

    pub fn planned(after_portfolio: Portfolio, dest_amount: Decimal, logics: Vec<Logic>) -> Self {
        Self {
            dest_amount,
            after_portfolio,
            logics,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A chosen swaper with its quotation
#[derive(Clone)]
pub(crate) struct SwapLeg {
    pub swaper: Arc<dyn Swaper>,
    pub quotation: SwapQuotation,
}

impl SwapLeg {
    pub fn logic(&self) -> Logic {
        self.swaper.new_swap_token_logic(&self.quotation)
    }

    pub fn input(&self) -> &TokenAmount {
        &self.quotation.input
    }

    pub fn output(&self) -> &TokenAmount {
        &self.quotation.output
    }
}

/// How one token turns into another inside a sequence
pub(crate) enum Route {
    /// Same token, no swap
    Direct,
    Swap(SwapLeg),
    NoRoute,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Side {
    Supply,
    Borrow,
}

/// 포지션 트랜지션 엔진
pub struct TransitionEngine {
    settings: EngineConfig,
    protocols: ProtocolRegistry,
    swapers: Vec<Arc<dyn Swaper>>,
    flash_loans: FlashLoanAggregator,
}

impl TransitionEngine {
    pub fn new(
        settings: EngineConfig,
        protocols: ProtocolRegistry,
        swapers: Vec<Arc<dyn Swaper>>,
        flash_loans: FlashLoanAggregator,
    ) -> Self {
        info!(
            "🚀 Transition engine on chain {}: protocols {:?}, {} swapers, flash loans via {:?}",
            settings.chain_id,
            protocols.ids(),
            swapers.len(),
            flash_loans.venues()
        );
        Self {
            settings,
            protocols,
            swapers,
            flash_loans,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let chain_id = config.engine.chain_id;
        let protocols = ProtocolRegistry::from_markets(chain_id, &config.markets)?;
        let swapers: Vec<Arc<dyn Swaper>> = config
            .enabled_swapers()
            .map(|swaper| Arc::new(HttpSwaper::new(swaper.clone(), chain_id)) as Arc<dyn Swaper>)
            .collect();
        let venues: Vec<Arc<dyn FlashLoanProvider>> = config
            .flash_loans
            .iter()
            .map(|venue| Arc::new(ConfiguredFlashLoanVenue::from_config(venue)) as Arc<dyn FlashLoanProvider>)
            .collect();
        Ok(Self::new(config.engine.clone(), protocols, swapers, FlashLoanAggregator::new(venues)))
    }

    /// Replaces the swaper set (e.g. offline pricing).
    pub fn with_swapers(mut self, swapers: Vec<Arc<dyn Swaper>>) -> Self {
        self.swapers = swapers;
        self
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    pub async fn transition(&self, request: &TransitionRequest) -> Result<TransitionOutput, EngineError> {
        let portfolio = request.portfolio();
        info!(
            "📐 Planning {} on {}:{}",
            request.kind(),
            portfolio.protocol_id,
            portfolio.market_id
        );

        let output = match request {
            TransitionRequest::OpenByCollateral(params) => self.open_by_collateral(params).await?,
            TransitionRequest::OpenByDebt(params) => self.open_by_debt(params).await?,
            TransitionRequest::Close(params) => self.close(params).await?,
            TransitionRequest::CollateralSwap(params) => self.collateral_swap(params).await?,
            TransitionRequest::DebtSwap(params) => self.debt_swap(params).await?,
            TransitionRequest::LeverageByCollateral(params) => self.leverage_by_collateral(params).await?,
            TransitionRequest::LeverageByDebt(params) => self.leverage_by_debt(params).await?,
            TransitionRequest::Deleverage(params) => self.deleverage(params).await?,
            TransitionRequest::ZapSupply(params) => self.zap_supply(params).await?,
            TransitionRequest::ZapWithdraw(params) => self.zap_withdraw(params).await?,
            TransitionRequest::ZapBorrow(params) => self.zap_borrow(params).await?,
            TransitionRequest::ZapRepay(params) => self.zap_repay(params).await?,
        };

        if output.is_ok() {
            info!(
                "✅ {} planned: {} logics, dest amount {}",
                request.kind(),
                output.logics.len(),
                output.dest_amount
            );
        }
        Ok(output)
    }

    // ---- shared planner plumbing ----

    pub(crate) fn market(&self, portfolio: &Portfolio, account: Address) -> Result<Market, EngineError> {
        if portfolio.chain_id != self.settings.chain_id {
            return Err(EngineError::ChainMismatch {
                expected: self.settings.chain_id,
                actual: portfolio.chain_id,
            });
        }
        // deserialized snapshots skip Portfolio::new
        portfolio.validate()?;
        let protocol = self
            .protocols
            .get(&portfolio.protocol_id)
            .ok_or_else(|| EngineError::UnknownProtocol(portfolio.protocol_id.clone()))?;
        Ok(Market {
            protocol,
            id: portfolio.market_id.clone(),
            account,
        })
    }

    /// Bounds one concurrent group of quote/fact requests.
    pub(crate) async fn timed<T, F>(&self, group: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let limit = self.settings.quote_timeout();
        tokio::time::timeout(limit, group)
            .await
            .map_err(|_| EngineError::Timeout(limit))?
    }

    /// Caps of `token` when the account holds a position on `side` and the
    /// market accepts the token there, `None` otherwise. Cap and market
    /// total come from the portfolio position, the market book fills in
    /// when the position carries neither.
    pub(crate) async fn reserve_facts(
        &self,
        market: &Market,
        portfolio: &Portfolio,
        token: &Token,
        side: Side,
    ) -> Result<Option<ReserveCaps>, EngineError> {
        let snapshot = match side {
            Side::Supply => portfolio
                .find_supply(token)
                .map(|position| (position.supply_cap, position.total_supply)),
            Side::Borrow => portfolio
                .find_borrow(token)
                .map(|position| (position.borrow_cap, position.total_borrow)),
        };
        let supported = match side {
            Side::Supply => market.protocol.is_token_for_supply(&market.id, token).await?,
            Side::Borrow => market.protocol.is_token_for_borrow(&market.id, token).await?,
        };
        let Some((cap, total)) = snapshot.filter(|_| supported) else {
            debug!("{} is not a {:?} token of {}", token, side, market.id);
            return Ok(None);
        };

        let book = market.protocol.caps(&market.id, token).await?;
        Ok(Some(match side {
            Side::Supply => book.with_supply_snapshot(cap, total),
            Side::Borrow => book.with_borrow_snapshot(cap, total),
        }))
    }

    pub(crate) async fn quote_flash_loan(&self, loan: &TokenAmount) -> Result<FlashLoanQuotation, EngineError> {
        Ok(self.flash_loans.quote_loan(loan).await?)
    }

    /// Largest flash loan repayable out of `budget`.
    pub(crate) async fn quote_flash_repay(&self, budget: &TokenAmount) -> Result<FlashLoanQuotation, EngineError> {
        Ok(self.flash_loans.quote_for_repay(budget).await?)
    }

    pub(crate) async fn route_exact_in(&self, input: &TokenAmount, token_out: &Token) -> Result<Route, EngineError> {
        if &input.token == token_out {
            return Ok(Route::Direct);
        }
        let slippage = self.settings.slippage_bps;
        let tasks = self.swapers.iter().map(|swaper| async move {
            let result = match supports_pair(swaper.as_ref(), &input.token, token_out).await {
                Ok(true) => Some(swaper.quote_exact_in(input, token_out, slippage).await),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            };
            (swaper.clone(), result)
        });
        let quotes = join_all(tasks).await;
        pick_route(quotes, |candidate, best| candidate.output.amount > best.output.amount)
    }

    pub(crate) async fn route_exact_out(&self, token_in: &Token, output: &TokenAmount) -> Result<Route, EngineError> {
        if token_in == &output.token {
            return Ok(Route::Direct);
        }
        let slippage = self.settings.slippage_bps;
        let tasks = self.swapers.iter().map(|swaper| async move {
            let result = match supports_pair(swaper.as_ref(), token_in, &output.token).await {
                Ok(true) => Some(swaper.quote_exact_out(token_in, output, slippage).await),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            };
            (swaper.clone(), result)
        });
        let quotes = join_all(tasks).await;
        pick_route(quotes, |candidate, best| candidate.input.amount < best.input.amount)
    }
}

/// Best quotation wins; transport failures only surface when no swaper
/// produced a quote at all.
fn pick_route<F>(
    quotes: Vec<(Arc<dyn Swaper>, Option<Result<SwapQuotation, SwaperError>>)>,
    better: F,
) -> Result<Route, EngineError>
where
    F: Fn(&SwapQuotation, &SwapQuotation) -> bool,
{
    let mut best: Option<SwapLeg> = None;
    let mut failure: Option<SwaperError> = None;

    for (swaper, result) in quotes {
        match result {
            None => {}
            Some(Ok(quotation)) => {
                debug!("{} quoted {} -> {}", swaper.id(), quotation.input, quotation.output);
                let replace = best.as_ref().map_or(true, |leg| better(&quotation, &leg.quotation));
                if replace {
                    best = Some(SwapLeg { swaper, quotation });
                }
            }
            Some(Err(e)) if e.is_no_route() => debug!("{}: {}", swaper.id(), e),
            Some(Err(e)) => {
                warn!("Quote failed for {}: {}", swaper.id(), e);
                failure = Some(e);
            }
        }
    }

    match (best, failure) {
        (Some(leg), _) => Ok(Route::Swap(leg)),
        (None, Some(e)) => Err(e.into()),
        (None, None) => Ok(Route::NoRoute),
    }
}
