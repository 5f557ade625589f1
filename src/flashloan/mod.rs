//! Flash loan 집계기
//!
//! Picks the cheapest venue able to lend an asset and wraps an inner logic
//! sequence as `[draw, ...inner, repay]`.

mod venue;

pub use venue::ConfiguredFlashLoanVenue;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::{BPS_BASE, FLASH_LOAN_RID};
use crate::logic::{Action, Logic, LogicAmount, LogicParams};
use crate::types::{AmountError, Token, TokenAmount};

#[derive(Debug, thiserror::Error)]
pub enum FlashLoanError {
    #[error("No flash loan venue lends {0}")]
    NoVenue(String),

    #[error("Flash loan venue {venue} unavailable: {message}")]
    Venue { venue: String, message: String },

    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// 플래시론 수수료 제공자
#[async_trait]
pub trait FlashLoanProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Fee rate applied to the drawn amount, `None` when the asset is not lent.
    async fn fee_rate(&self, token: &Token) -> Result<Option<Decimal>, FlashLoanError>;
}

/// Priced loan: `repay = loan + fee`, fee rounded up to token precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashLoanQuotation {
    pub id: Uuid,
    pub venue: String,
    pub fee_rate: Decimal,
    pub loan: TokenAmount,
    pub repay: TokenAmount,
}

impl FlashLoanQuotation {
    pub fn new(venue: &str, fee_rate: Decimal, loan: TokenAmount) -> Result<Self, AmountError> {
        let repay = loan.add(fee_for(&loan, fee_rate))?;
        Ok(Self {
            id: Uuid::new_v4(),
            venue: venue.to_string(),
            fee_rate,
            loan,
            repay,
        })
    }

    pub fn fee(&self) -> Decimal {
        self.repay.amount - self.loan.amount
    }

    pub fn token(&self) -> &Token {
        &self.loan.token
    }

    /// Draw and repay logics sharing one pair id.
    pub fn logic_pair(&self) -> (Logic, Logic) {
        let draw = Logic::new(FLASH_LOAN_RID, Action::FlashLoan)
            .with_output(self.loan.clone())
            .with_params(LogicParams::FlashLoan {
                id: self.id,
                venue: self.venue.clone(),
                is_loan: true,
            });
        let repay = Logic::new(FLASH_LOAN_RID, Action::FlashLoan)
            .with_input(LogicAmount::FractionOfBalance {
                balance_bps: BPS_BASE,
                quoted: self.repay.clone(),
            })
            .with_params(LogicParams::FlashLoan {
                id: self.id,
                venue: self.venue.clone(),
                is_loan: false,
            });
        (draw, repay)
    }

    pub fn wrap(&self, inner: Vec<Logic>) -> Vec<Logic> {
        let (draw, repay) = self.logic_pair();
        let mut logics = Vec::with_capacity(inner.len() + 2);
        logics.push(draw);
        logics.extend(inner);
        logics.push(repay);
        logics
    }
}

pub fn fee_for(loan: &TokenAmount, fee_rate: Decimal) -> Decimal {
    loan.token.round_up(loan.amount * fee_rate)
}

/// 플래시론 집계기
pub struct FlashLoanAggregator {
    providers: Vec<Arc<dyn FlashLoanProvider>>,
}

impl FlashLoanAggregator {
    pub fn new(providers: Vec<Arc<dyn FlashLoanProvider>>) -> Self {
        info!("⚡ Flash loan aggregator with {} venues", providers.len());
        Self { providers }
    }

    pub fn venues(&self) -> Vec<String> {
        self.providers.iter().map(|provider| provider.id().to_string()).collect()
    }

    /// Cheapest (venue, rate) lending `token`; venue errors are skipped.
    pub async fn best_venue(&self, token: &Token) -> Result<(String, Decimal), FlashLoanError> {
        let tasks = self.providers.iter().map(|provider| async move {
            match provider.fee_rate(token).await {
                Ok(Some(rate)) => Some((provider.id().to_string(), rate)),
                Ok(None) => None,
                Err(e) => {
                    warn!("Flash loan fee lookup failed for {}: {}", provider.id(), e);
                    None
                }
            }
        });

        let mut best: Option<(String, Decimal)> = None;
        for (venue, rate) in futures::future::join_all(tasks).await.into_iter().flatten() {
            match &best {
                Some((_, best_rate)) if *best_rate <= rate => {}
                _ => best = Some((venue, rate)),
            }
        }
        best.ok_or_else(|| FlashLoanError::NoVenue(token.symbol.clone()))
    }

    /// Quote drawing exactly `loan`.
    pub async fn quote_loan(&self, loan: &TokenAmount) -> Result<FlashLoanQuotation, FlashLoanError> {
        let (venue, rate) = self.best_venue(&loan.token).await?;
        let quotation = FlashLoanQuotation::new(&venue, rate, loan.clone())?;
        debug!("flash loan {} via {} (fee {})", quotation.loan, venue, quotation.fee());
        Ok(quotation)
    }

    /// Largest loan whose repayment fits inside `repay_target`.
    pub async fn quote_for_repay(&self, repay_target: &TokenAmount) -> Result<FlashLoanQuotation, FlashLoanError> {
        let (venue, rate) = self.best_venue(&repay_target.token).await?;
        let token = &repay_target.token;
        let mut loan = TokenAmount::new(
            token.clone(),
            token.round_down(repay_target.amount / (Decimal::ONE + rate)),
        )?;
        while !loan.is_zero() && loan.amount + fee_for(&loan, rate) > repay_target.amount {
            loan = loan.sub_wei(1);
        }
        let quotation = FlashLoanQuotation::new(&venue, rate, loan)?;
        debug!("flash loan {} via {} to repay {}", quotation.loan, venue, quotation.repay);
        Ok(quotation)
    }
}
