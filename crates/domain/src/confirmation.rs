//! Checkout: turns a user's pending cart lines into confirmed order lines.

use common::{OrderLineId, UserId};
use serde::Serialize;
use store::{Confirmation, OrderLine, Store};

use crate::{DomainError, Result, validation};

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationReport {
    /// Lines moved from pending to confirmed by this call.
    pub confirmed: Vec<OrderLine>,
    /// Requested lines that were already confirmed; left untouched.
    pub already_confirmed: Vec<OrderLineId>,
}

#[derive(Clone)]
pub struct ConfirmationService<S: Store> {
    store: S,
}

impl<S: Store> ConfirmationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Confirms the given lines, or every pending line of the user when
    /// `ids` is `None`.
    ///
    /// All-or-nothing: if any line is missing, belongs to someone else or is
    /// in a state other than pending/confirmed, nothing is written and
    /// `NotConfirmable` names the offending ids.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(
        &self,
        user_id: UserId,
        ids: Option<Vec<OrderLineId>>,
    ) -> Result<ConfirmationReport> {
        validation::positive_id("user_id", user_id.as_i64())?;

        let ids = match ids {
            Some(ids) => {
                if ids.is_empty() {
                    return Err(DomainError::validation("order_line_ids", "must not be empty"));
                }
                for id in &ids {
                    validation::positive_id("order_line_ids", id.as_i64())?;
                }
                ids
            }
            None => {
                let pending: Vec<OrderLineId> = self
                    .store
                    .list_order_lines_for_user(user_id)
                    .await?
                    .into_iter()
                    .filter(|line| line.state.is_pending())
                    .map(|line| line.id)
                    .collect();
                if pending.is_empty() {
                    return Err(DomainError::validation(
                        "order_line_ids",
                        "no pending order lines",
                    ));
                }
                pending
            }
        };

        match self.store.confirm_order_lines(user_id, &ids).await? {
            Confirmation::Confirmed {
                confirmed,
                already_confirmed,
            } => {
                metrics::counter!("order_lines_confirmed_total").increment(confirmed.len() as u64);
                tracing::info!(
                    confirmed = confirmed.len(),
                    already_confirmed = already_confirmed.len(),
                    "Checkout completed"
                );
                Ok(ConfirmationReport {
                    confirmed,
                    already_confirmed,
                })
            }
            Confirmation::Rejected(ids) => {
                tracing::warn!(?ids, "Checkout refused");
                Err(DomainError::NotConfirmable { ids })
            }
        }
    }
}
