//! Assigns guest order lines to the account that later signs in with the
//! same identification document.

use common::UserId;
use serde::Serialize;
use store::Store;

use crate::{Result, validation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdoptionReport {
    pub claimed_count: u64,
}

#[derive(Clone)]
pub struct AdoptionService<S: Store> {
    store: S,
}

impl<S: Store> AdoptionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Claims every unowned line carrying `document` for `user_id`.
    ///
    /// Lines already owned by anyone are left alone, so repeating the call
    /// claims nothing new.
    #[tracing::instrument(skip(self, document))]
    pub async fn adopt(&self, document: &str, user_id: UserId) -> Result<AdoptionReport> {
        let document = validation::non_blank("document", document)?;
        validation::positive_id("user_id", user_id.as_i64())?;

        let claimed_count = self
            .store
            .claim_unowned_order_lines(&document, user_id)
            .await?;

        metrics::counter!("order_lines_adopted_total").increment(claimed_count);
        tracing::info!(claimed_count, "Guest order lines adopted");

        Ok(AdoptionReport { claimed_count })
    }
}
