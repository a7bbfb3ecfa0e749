//! Order line rows (`detallepedido`).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{OrderLineState, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderLineId, ProductId};

/// One product entry in a customer's cart or completed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Units taken from the product's stock when the line entered the cart.
    /// Zero for lines written directly; later quantity edits leave it alone.
    pub reserved_quantity: i64,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    /// `None` (or the legacy `0`) means the line is unclaimed.
    pub user_id: Option<UserId>,
    pub seller_id: Option<UserId>,
    pub paid_at: Option<DateTime<Utc>>,
    pub state: OrderLineState,
    pub customer_name: Option<String>,
    pub customer_address: Option<String>,
    pub customer_phone: Option<String>,
    /// Identification document used to adopt guest lines.
    pub document: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    /// Returns true while no account owns the line.
    pub fn is_unclaimed(&self) -> bool {
        self.user_id.is_none_or(|u| u.is_unset())
    }
}

/// Fields of an order line to insert. Validation happens in the domain layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub unit_price: Decimal,
    /// Explicit subtotal; `quantity * unit_price` when `None`.
    pub subtotal: Option<Decimal>,
    pub user_id: Option<UserId>,
    pub seller_id: Option<UserId>,
    pub paid_at: Option<DateTime<Utc>>,
    pub state: OrderLineState,
    pub customer_name: Option<String>,
    pub customer_address: Option<String>,
    pub customer_phone: Option<String>,
    pub document: Option<String>,
}

impl NewOrderLine {
    pub fn new(product_id: ProductId, quantity: i64, unit_price: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
            ..Self::default()
        }
    }

    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    /// The subtotal that will be stored.
    pub fn effective_subtotal(&self) -> Decimal {
        self.subtotal
            .unwrap_or_else(|| Decimal::from(self.quantity) * self.unit_price)
    }
}

/// Partial update of an order line.
///
/// Outer `None` leaves a field untouched; for nullable columns `Some(None)`
/// clears it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderLinePatch {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i64>,
    pub unit_price: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub user_id: Option<Option<UserId>>,
    pub seller_id: Option<Option<UserId>>,
    pub paid_at: Option<Option<DateTime<Utc>>>,
    pub state: Option<OrderLineState>,
    pub customer_name: Option<Option<String>>,
    pub customer_address: Option<Option<String>>,
    pub customer_phone: Option<Option<String>>,
    pub document: Option<Option<String>>,
}

impl OrderLinePatch {
    /// Returns true when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns true when the stored subtotal must be recomputed.
    pub fn recomputes_subtotal(&self) -> bool {
        self.subtotal.is_none() && (self.quantity.is_some() || self.unit_price.is_some())
    }

    /// Applies the patch to an in-memory row.
    pub fn apply_to(self, line: &mut OrderLine) {
        let recompute = self.recomputes_subtotal();

        if let Some(v) = self.product_id {
            line.product_id = v;
        }
        if let Some(v) = self.quantity {
            line.quantity = v;
        }
        if let Some(v) = self.unit_price {
            line.unit_price = v;
        }
        if let Some(v) = self.subtotal {
            line.subtotal = v;
        } else if recompute {
            line.subtotal = Decimal::from(line.quantity) * line.unit_price;
        }
        if let Some(v) = self.user_id {
            line.user_id = v;
        }
        if let Some(v) = self.seller_id {
            line.seller_id = v;
        }
        if let Some(v) = self.paid_at {
            line.paid_at = v;
        }
        if let Some(v) = self.state {
            line.state = v;
        }
        if let Some(v) = self.customer_name {
            line.customer_name = v;
        }
        if let Some(v) = self.customer_address {
            line.customer_address = v;
        }
        if let Some(v) = self.customer_phone {
            line.customer_phone = v;
        }
        if let Some(v) = self.document {
            line.document = v;
        }
    }
}

/// Outcome of confirming a set of lines for one user.
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// Every requested line was pending or already confirmed; pending ones
    /// are now confirmed.
    Confirmed {
        confirmed: Vec<OrderLine>,
        already_confirmed: Vec<OrderLineId>,
    },
    /// Nothing was written. These ids are missing, owned by someone else or
    /// in a state that cannot be confirmed.
    Rejected(Vec<OrderLineId>),
}

/// How each requested line will be treated by a confirmation.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ConfirmationPlan {
    pub to_confirm: Vec<OrderLineId>,
    pub already_confirmed: Vec<OrderLineId>,
    pub rejected: Vec<OrderLineId>,
}

/// Sorts the requested ids into confirm / no-op / reject buckets given the
/// current `(id, owner, state)` of the lines that exist.
pub(crate) fn plan_confirmation(
    requested: &[OrderLineId],
    current: &[(OrderLineId, Option<UserId>, OrderLineState)],
    user_id: UserId,
) -> ConfirmationPlan {
    let mut plan = ConfirmationPlan::default();
    let unique: BTreeSet<OrderLineId> = requested.iter().copied().collect();

    for id in unique {
        match current.iter().find(|(row_id, _, _)| *row_id == id) {
            Some((_, Some(owner), state)) if *owner == user_id => match state {
                OrderLineState::Pending => plan.to_confirm.push(id),
                OrderLineState::Confirmed => plan.already_confirmed.push(id),
                OrderLineState::Other(_) => plan.rejected.push(id),
            },
            _ => plan.rejected.push(id),
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_line() -> OrderLine {
        OrderLine {
            id: OrderLineId::new(1),
            product_id: ProductId::new(10),
            quantity: 2,
            reserved_quantity: 0,
            unit_price: Decimal::from(1500),
            subtotal: Decimal::from(3000),
            user_id: None,
            seller_id: None,
            paid_at: None,
            state: OrderLineState::Pending,
            customer_name: Some("Ana".to_string()),
            customer_address: None,
            customer_phone: None,
            document: Some("12345678".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn effective_subtotal_defaults_to_quantity_times_price() {
        let new = NewOrderLine::new(ProductId::new(1), 3, Decimal::from(1000));
        assert_eq!(new.effective_subtotal(), Decimal::from(3000));

        let overridden = NewOrderLine {
            subtotal: Some(Decimal::from(2500)),
            ..new
        };
        assert_eq!(overridden.effective_subtotal(), Decimal::from(2500));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(OrderLinePatch::default().is_empty());
        let patch = OrderLinePatch {
            seller_id: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn quantity_change_recomputes_subtotal() {
        let mut line = sample_line();
        OrderLinePatch {
            quantity: Some(4),
            ..Default::default()
        }
        .apply_to(&mut line);
        assert_eq!(line.subtotal, Decimal::from(6000));
    }

    #[test]
    fn quantity_change_keeps_the_reservation() {
        let mut line = sample_line();
        line.reserved_quantity = 2;
        OrderLinePatch {
            quantity: Some(5),
            ..Default::default()
        }
        .apply_to(&mut line);
        assert_eq!(line.quantity, 5);
        assert_eq!(line.reserved_quantity, 2);
    }

    #[test]
    fn explicit_subtotal_wins_over_recompute() {
        let mut line = sample_line();
        OrderLinePatch {
            quantity: Some(4),
            subtotal: Some(Decimal::from(5000)),
            ..Default::default()
        }
        .apply_to(&mut line);
        assert_eq!(line.quantity, 4);
        assert_eq!(line.subtotal, Decimal::from(5000));
    }

    #[test]
    fn patch_can_clear_nullable_fields() {
        let mut line = sample_line();
        line.seller_id = Some(UserId::new(3));
        OrderLinePatch {
            seller_id: Some(None),
            customer_name: Some(None),
            ..Default::default()
        }
        .apply_to(&mut line);
        assert_eq!(line.seller_id, None);
        assert_eq!(line.customer_name, None);
        assert_eq!(line.document.as_deref(), Some("12345678"));
    }

    #[test]
    fn unset_user_counts_as_unclaimed() {
        let mut line = sample_line();
        assert!(line.is_unclaimed());
        line.user_id = Some(UserId::new(0));
        assert!(line.is_unclaimed());
        line.user_id = Some(UserId::new(7));
        assert!(!line.is_unclaimed());
    }

    #[test]
    fn plan_sorts_lines_into_buckets() {
        let user = UserId::new(7);
        let other = UserId::new(8);
        let current = vec![
            (OrderLineId::new(1), Some(user), OrderLineState::Pending),
            (OrderLineId::new(2), Some(user), OrderLineState::Confirmed),
            (OrderLineId::new(3), Some(other), OrderLineState::Pending),
            (OrderLineId::new(4), Some(user), OrderLineState::from("despachado")),
            (OrderLineId::new(5), None, OrderLineState::Pending),
        ];
        let requested: Vec<_> = (1..=6).map(OrderLineId::new).collect();

        let plan = plan_confirmation(&requested, &current, user);
        assert_eq!(plan.to_confirm, vec![OrderLineId::new(1)]);
        assert_eq!(plan.already_confirmed, vec![OrderLineId::new(2)]);
        assert_eq!(
            plan.rejected,
            vec![
                OrderLineId::new(3),
                OrderLineId::new(4),
                OrderLineId::new(5),
                OrderLineId::new(6)
            ]
        );
    }

    #[test]
    fn plan_ignores_duplicate_ids() {
        let user = UserId::new(7);
        let current = vec![(OrderLineId::new(1), Some(user), OrderLineState::Pending)];
        let requested = vec![OrderLineId::new(1), OrderLineId::new(1)];

        let plan = plan_confirmation(&requested, &current, user);
        assert_eq!(plan.to_confirm, vec![OrderLineId::new(1)]);
    }
}
