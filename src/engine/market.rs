use alloy::primitives::Address;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::EngineError;
use crate::logic::{send_token_logic, pull_token_logic, Logic};
use crate::portfolio::{BorrowPosition, InterestRateMode};
use crate::protocols::LendingProtocol;
use crate::types::{Token, TokenAmount};

/// One account acting on one market of one protocol
pub(crate) struct Market {
    pub protocol: Arc<dyn LendingProtocol>,
    pub id: String,
    pub account: Address,
}

impl Market {
    pub fn tokenized(&self, token: &Token) -> bool {
        self.protocol.is_asset_tokenized(&self.id, token)
    }

    pub fn ensure<F>(&self, allowed: F, transition: &'static str) -> Result<(), EngineError>
    where
        F: Fn(&dyn LendingProtocol, &str) -> bool,
    {
        if allowed(self.protocol.as_ref(), &self.id) {
            return Ok(());
        }
        Err(EngineError::Unsupported {
            transition,
            protocol: self.protocol.id().to_string(),
            market: self.id.clone(),
        })
    }

    /// Swap input for collateral leaving a tokenized market, short of the
    /// receipt-token rounding dust.
    pub fn withdrawn_swap_input(&self, amount: &TokenAmount) -> TokenAmount {
        if self.tokenized(&amount.token) {
            amount.sub_wei(self.protocol.withdrawal_rounding_wei())
        } else {
            amount.clone()
        }
    }

    pub fn supply_logic(&self, amount: &TokenAmount, chained: bool) -> Result<Logic, EngineError> {
        let logic = self.protocol.new_supply_logic(&self.id, amount)?;
        Ok(if chained { logic.consuming_full_balance() } else { logic })
    }

    /// Receipt tokens minted to the router go back to the account.
    pub fn send_back_logic(&self, supplied: &TokenAmount) -> Result<Option<Logic>, EngineError> {
        match self.protocol.to_protocol_token(&self.id, &supplied.token) {
            Some(protocol_token) => {
                let amount = TokenAmount::new(protocol_token, supplied.amount)?;
                Ok(Some(send_token_logic(amount, self.account)))
            }
            None => Ok(None),
        }
    }

    /// Supply, then hand any receipt token back to the account.
    pub fn supply_logics(&self, amount: &TokenAmount, chained: bool) -> Result<Vec<Logic>, EngineError> {
        let mut logics = vec![self.supply_logic(amount, chained)?];
        logics.extend(self.send_back_logic(amount)?);
        Ok(logics)
    }

    /// Tokenized: pull the receipt token, withdraw what was pulled.
    pub fn withdraw_logics(&self, amount: &TokenAmount) -> Result<Vec<Logic>, EngineError> {
        let withdraw = self.protocol.new_withdraw_logic(&self.id, amount)?;
        match self.protocol.to_protocol_token(&self.id, &amount.token) {
            Some(protocol_token) => {
                let pulled = TokenAmount::new(protocol_token, amount.amount)?;
                Ok(vec![pull_token_logic(pulled), withdraw.consuming_full_balance()])
            }
            None => Ok(vec![withdraw]),
        }
    }

    pub fn borrow_logic(&self, amount: &TokenAmount) -> Result<Logic, EngineError> {
        Ok(self.protocol.new_borrow_logic(&self.id, amount)?)
    }

    /// One repay per rate-mode bucket, drained in portfolio order. When
    /// `chained`, the last repay takes the whole held balance.
    pub fn repay_logics(
        &self,
        position: &BorrowPosition,
        amount: &TokenAmount,
        chained: bool,
    ) -> Result<Vec<Logic>, EngineError> {
        let mut pieces: Vec<(InterestRateMode, Decimal)> = Vec::new();
        let mut remaining = amount.amount;
        for (mode, balance) in position.outstanding() {
            if remaining.is_zero() {
                break;
            }
            let piece = remaining.min(balance);
            pieces.push((mode, piece));
            remaining -= piece;
        }
        match pieces.last_mut() {
            Some((_, last)) => *last += remaining,
            None => pieces.push((InterestRateMode::Variable, remaining)),
        }

        let last = pieces.len() - 1;
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, (mode, piece))| {
                let input = TokenAmount::new(amount.token.clone(), piece)?;
                let logic = self.protocol.new_repay_logic(&self.id, self.account, &input, mode)?;
                Ok(if chained && index == last { logic.consuming_full_balance() } else { logic })
            })
            .collect()
    }
}
