use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashSet;

use super::{FlashLoanError, FlashLoanProvider};
use crate::config::FlashLoanVenueConfig;
use crate::constants::BPS_BASE;
use crate::types::Token;

/// Fixed-fee venue described in config
#[derive(Debug, Clone)]
pub struct ConfiguredFlashLoanVenue {
    id: String,
    fee_rate: Decimal,
    assets: Option<HashSet<Address>>,
}

impl ConfiguredFlashLoanVenue {
    pub fn new(id: &str, fee_bps: u32, assets: Option<Vec<Address>>) -> Self {
        Self {
            id: id.to_string(),
            fee_rate: Decimal::from(fee_bps) / Decimal::from(BPS_BASE),
            assets: assets.map(|list| list.into_iter().collect()),
        }
    }

    pub fn from_config(config: &FlashLoanVenueConfig) -> Self {
        Self::new(&config.id, config.fee_bps, config.assets.clone())
    }
}

#[async_trait]
impl FlashLoanProvider for ConfiguredFlashLoanVenue {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fee_rate(&self, token: &Token) -> Result<Option<Decimal>, FlashLoanError> {
        let lends = self
            .assets
            .as_ref()
            .map_or(true, |assets| assets.contains(&token.address));
        Ok(lends.then_some(self.fee_rate))
    }
}
