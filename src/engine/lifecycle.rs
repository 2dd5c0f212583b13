//! Status transition engine.
//!
//! Every status change of an order goes through [`transition`] (staff edges)
//! or through the assignment service (rider edges). Both check the edge with
//! [`OrderStatus::can_transition_to`] while holding the order's entry guard,
//! so two writers racing on one order cannot both apply a step.

use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::assignment;
use crate::engine::queue::enqueue_for_dispatch;
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::event::{OrderEvent, OrderEventKind};
use crate::models::order::{LineItem, Order, OrderStatus, PaymentMethod, StatusChange};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    /// Required when staff or an admin places an order for someone else.
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub payment_method: PaymentMethod,
    pub delivery_address: String,
    #[serde(default)]
    pub delivery_instructions: Option<String>,
}

/// Which orders to return. Empty `statuses` means every status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub statuses: Vec<OrderStatus>,
    pub customer_id: Option<Uuid>,
    pub rider_id: Option<Uuid>,
}

impl OrderFilter {
    /// Customers only ever see their own orders and riders only the ones
    /// bound to them, whatever they asked for.
    pub fn scoped_to(mut self, actor: &Actor) -> Self {
        match actor.role {
            Role::Customer => self.customer_id = Some(actor.id),
            Role::Rider => self.rider_id = Some(actor.id),
            Role::Staff | Role::Admin => {}
        }
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&order.status))
            && self.customer_id.is_none_or(|id| order.customer_id == id)
            && self.rider_id.is_none_or(|id| order.rider_id == Some(id))
    }
}

pub(crate) fn order_not_found(order_id: Uuid) -> AppError {
    AppError::NotFound(format!("order {order_id} not found"))
}

pub(crate) fn order_event(kind: OrderEventKind, order: &Order) -> OrderEvent {
    OrderEvent {
        kind,
        order_id: order.id,
        status: order.status,
        customer_id: order.customer_id,
        rider_id: order.rider_id,
        at: order.updated_at,
    }
}

pub fn create_order(state: &AppState, actor: Actor, request: NewOrder) -> Result<Order, AppError> {
    let customer_id = match actor.role {
        Role::Customer => match request.customer_id {
            Some(id) if id != actor.id => {
                return Err(AppError::Forbidden(
                    "customers can only order for themselves".to_string(),
                ));
            }
            _ => actor.id,
        },
        Role::Staff | Role::Admin => request.customer_id.ok_or_else(|| {
            AppError::BadRequest("customer_id is required when ordering for a customer".to_string())
        })?,
        Role::Rider => {
            return Err(AppError::Forbidden("riders cannot place orders".to_string()));
        }
    };

    if request.items.is_empty() {
        return Err(AppError::BadRequest("order must contain at least one item".to_string()));
    }
    for item in &request.items {
        if item.name.trim().is_empty() {
            return Err(AppError::BadRequest("item name cannot be empty".to_string()));
        }
        if item.quantity == 0 {
            return Err(AppError::BadRequest(format!("quantity of {} must be > 0", item.name)));
        }
        if item.unit_price.is_sign_negative() {
            return Err(AppError::BadRequest(format!("price of {} cannot be negative", item.name)));
        }
    }
    if request.delivery_address.trim().is_empty() {
        return Err(AppError::BadRequest("delivery address cannot be empty".to_string()));
    }

    let total_amount = request
        .items
        .iter()
        .map(LineItem::subtotal)
        .fold(Decimal::ZERO, |acc, subtotal| acc + subtotal);
    let now = Utc::now();

    let order = Order {
        id: Uuid::new_v4(),
        customer_id,
        items: request.items,
        total_amount,
        payment_method: request.payment_method,
        delivery_address: request.delivery_address.trim().to_string(),
        delivery_instructions: request
            .delivery_instructions
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
        status: OrderStatus::Pending,
        rider_id: None,
        history: vec![StatusChange {
            status: OrderStatus::Pending,
            actor_id: actor.id,
            at: now,
        }],
        created_at: now,
        updated_at: now,
        completed_at: None,
    };

    state.orders.insert(order.id, order.clone());
    state.publish(order_event(OrderEventKind::Created, &order));

    info!(
        order_id = %order.id,
        customer_id = %order.customer_id,
        total = %order.total_amount,
        items = order.item_count(),
        "order placed"
    );

    Ok(order)
}

pub fn get_order(state: &AppState, order_id: Uuid, actor: &Actor) -> Result<Order, AppError> {
    let order = state
        .orders
        .get(&order_id)
        .ok_or_else(|| order_not_found(order_id))?
        .clone();

    let visible = match actor.role {
        Role::Customer => order.customer_id == actor.id,
        Role::Rider => order.rider_id == Some(actor.id),
        Role::Staff | Role::Admin => true,
    };
    if !visible {
        return Err(AppError::Forbidden(format!(
            "order {order_id} is not visible to {} {}",
            actor.role, actor.id
        )));
    }

    Ok(order)
}

/// Orders matching `filter`, oldest first. One entry per order id.
pub fn list_orders(state: &AppState, filter: &OrderFilter) -> Vec<Order> {
    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| filter.matches(entry.value()))
        .map(|entry| entry.value().clone())
        .collect();
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    orders
}

/// Checks that `actor` may walk the edge `from -> to`. The edge itself must
/// already be known to be legal.
pub fn authorize_edge(
    from: OrderStatus,
    to: OrderStatus,
    bound_rider: Option<Uuid>,
    actor: &Actor,
) -> Result<(), AppError> {
    match to {
        OrderStatus::Preparing | OrderStatus::Ready => {
            actor.require_staff(&format!("move an order from {from} to {to}"))
        }
        OrderStatus::Assigned => Err(AppError::Forbidden(
            "orders are moved to assigned only by rider assignment".to_string(),
        )),
        OrderStatus::OnTheWay | OrderStatus::Delivered => {
            if actor.role == Role::Rider && bound_rider == Some(actor.id) {
                Ok(())
            } else {
                Err(AppError::Forbidden(format!(
                    "only the assigned rider may move an order from {from} to {to}"
                )))
            }
        }
        OrderStatus::Pending => Err(AppError::InvalidTransition { from, to }),
    }
}

/// Applies `requested` if it is the immediate successor of the order's
/// current status and `actor` may walk that edge.
pub fn transition(
    state: &AppState,
    order_id: Uuid,
    requested: OrderStatus,
    actor: Actor,
) -> Result<Order, AppError> {
    let (from, bound_rider) = {
        let order = state.orders.get(&order_id).ok_or_else(|| order_not_found(order_id))?;
        (order.status, order.rider_id)
    };

    if !from.can_transition_to(requested) {
        debug!(order_id = %order_id, from = %from, to = %requested, "rejected transition");
        return Err(AppError::InvalidTransition {
            from,
            to: requested,
        });
    }
    authorize_edge(from, requested, bound_rider, &actor)?;

    match requested {
        OrderStatus::OnTheWay => assignment::accept(state, order_id, actor.id),
        OrderStatus::Delivered => assignment::complete(state, order_id, actor.id),
        _ => apply_kitchen_step(state, order_id, requested, actor),
    }
}

fn apply_kitchen_step(
    state: &AppState,
    order_id: Uuid,
    requested: OrderStatus,
    actor: Actor,
) -> Result<Order, AppError> {
    let started = Instant::now();

    let updated = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| order_not_found(order_id))?;

        // Another writer may have moved the order since the edge was checked.
        if !order.status.can_transition_to(requested) {
            return Err(AppError::InvalidTransition {
                from: order.status,
                to: requested,
            });
        }

        order.advance(requested, actor.id, Utc::now());
        order.clone()
    };

    state
        .metrics
        .order_transitions_total
        .with_label_values(&[requested.as_label()])
        .inc();
    state.metrics.observe_operation("transition", started);
    state.publish(order_event(OrderEventKind::StatusChanged, &updated));

    info!(
        order_id = %updated.id,
        status = %updated.status,
        actor_id = %actor.id,
        role = %actor.role,
        "order status changed"
    );

    if requested == OrderStatus::Ready && state.settings.auto_assign {
        if let Err(err) = enqueue_for_dispatch(state, updated.id) {
            warn!(order_id = %updated.id, error = %err, "could not queue order for auto-dispatch");
        }
    }

    Ok(updated)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{create_order, get_order, list_orders, transition, NewOrder, OrderFilter};
    use crate::config::Settings;
    use crate::error::AppError;
    use crate::models::actor::{Actor, Role};
    use crate::models::order::{LineItem, Order, OrderStatus, PaymentMethod};
    use crate::state::AppState;

    pub(crate) fn state_with(settings: Settings) -> AppState {
        let (state, _rx) = AppState::new(settings, 64, 64);
        state
    }

    pub(crate) fn staff() -> Actor {
        Actor::new(Uuid::from_u128(0x5747), Role::Staff)
    }

    pub(crate) fn customer() -> Actor {
        Actor::new(Uuid::from_u128(0xC057), Role::Customer)
    }

    pub(crate) fn new_order(price: &str) -> NewOrder {
        NewOrder {
            customer_id: None,
            items: vec![
                LineItem {
                    name: "Chicken Adobo".to_string(),
                    quantity: 1,
                    unit_price: Decimal::from_str(price).unwrap(),
                },
                LineItem {
                    name: "Garlic Rice".to_string(),
                    quantity: 2,
                    unit_price: Decimal::ZERO,
                },
            ],
            payment_method: PaymentMethod::Cash,
            delivery_address: "12 Mabini St".to_string(),
            delivery_instructions: Some("  ".to_string()),
        }
    }

    pub(crate) fn place(state: &AppState, price: &str) -> Order {
        create_order(state, customer(), new_order(price)).unwrap()
    }

    pub(crate) fn place_ready(state: &AppState, price: &str) -> Order {
        let order = place(state, price);
        transition(state, order.id, OrderStatus::Preparing, staff()).unwrap();
        transition(state, order.id, OrderStatus::Ready, staff()).unwrap()
    }

    #[test]
    fn placed_order_starts_pending_with_computed_total() {
        let state = state_with(Settings::default());
        let order = place(&state, "150.25");

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.customer_id, customer().id);
        assert_eq!(order.total_amount, Decimal::from_str("150.25").unwrap());
        assert_eq!(order.delivery_instructions, None);
        assert_eq!(order.history.len(), 1);
    }

    #[test]
    fn staff_moves_pending_to_preparing() {
        let state = state_with(Settings::default());
        let order = place(&state, "10");

        let updated = transition(&state, order.id, OrderStatus::Preparing, staff()).unwrap();
        assert_eq!(updated.status, OrderStatus::Preparing);
        assert!(updated.updated_at >= order.updated_at);
        assert_eq!(updated.history.last().unwrap().actor_id, staff().id);
    }

    #[test]
    fn skipping_preparing_is_an_invalid_transition() {
        let state = state_with(Settings::default());
        let order = place(&state, "10");

        let err = transition(&state, order.id, OrderStatus::Ready, staff()).unwrap_err();
        assert_eq!(
            err,
            AppError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Ready
            }
        );
    }

    #[test]
    fn going_backward_is_an_invalid_transition() {
        let state = state_with(Settings::default());
        let order = place_ready(&state, "10");

        let err = transition(&state, order.id, OrderStatus::Preparing, staff()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn customer_cannot_drive_the_kitchen() {
        let state = state_with(Settings::default());
        let order = place(&state, "10");

        let err = transition(&state, order.id, OrderStatus::Preparing, customer()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn ready_to_assigned_is_reserved_for_assignment() {
        let state = state_with(Settings::default());
        let order = place_ready(&state, "10");

        let err = transition(&state, order.id, OrderStatus::Assigned, staff()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn unknown_order_is_not_found() {
        let state = state_with(Settings::default());
        let err = transition(&state, Uuid::new_v4(), OrderStatus::Preparing, staff()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn riders_cannot_place_orders() {
        let state = state_with(Settings::default());
        let rider = Actor::new(Uuid::new_v4(), Role::Rider);
        let err = create_order(&state, rider, new_order("1")).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn empty_orders_are_rejected() {
        let state = state_with(Settings::default());
        let mut request = new_order("1");
        request.items.clear();
        let err = create_order(&state, customer(), request).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn customers_only_see_their_own_orders() {
        let state = state_with(Settings::default());
        let mine = place(&state, "10");
        let stranger = Actor::new(Uuid::new_v4(), Role::Customer);

        assert!(get_order(&state, mine.id, &customer()).is_ok());
        assert!(matches!(
            get_order(&state, mine.id, &stranger),
            Err(AppError::Forbidden(_))
        ));

        let scoped = OrderFilter::default().scoped_to(&stranger);
        assert!(list_orders(&state, &scoped).is_empty());
    }

    #[test]
    fn status_set_filter_returns_each_order_once() {
        let state = state_with(Settings::default());
        let pending = place(&state, "10");
        let ready = place_ready(&state, "20");
        place(&state, "30");

        let filter = OrderFilter {
            statuses: vec![OrderStatus::Ready, OrderStatus::Ready, OrderStatus::Pending],
            ..OrderFilter::default()
        };
        let orders = list_orders(&state, &filter);
        assert_eq!(orders.len(), 3);
        assert!(orders.iter().any(|order| order.id == pending.id));
        assert!(orders.iter().any(|order| order.id == ready.id));

        let only_ready = OrderFilter {
            statuses: vec![OrderStatus::Ready],
            ..OrderFilter::default()
        };
        assert_eq!(list_orders(&state, &only_ready).len(), 1);
    }
}
