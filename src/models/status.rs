use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::auth::Role;

/// Order lifecycle statuses. Stored as strings in the database.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Assigned,
    PickedUp,
    OnTheWay,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Statuses that count against a courier's active load.
    pub fn is_active_load(self) -> bool {
        matches!(self, Self::Assigned | Self::PickedUp | Self::OnTheWay)
    }

    pub const ACTIVE_LOAD: [OrderStatus; 3] = [Self::Assigned, Self::PickedUp, Self::OnTheWay];
}

/// The actor requesting an order status change, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderActor {
    /// The customer who owns the order.
    Owner,
    /// The courier the order is assigned to.
    AssignedCourier,
    /// Staff holding the order-management permission.
    Manager,
}

impl OrderActor {
    pub fn role(self) -> Role {
        match self {
            Self::Owner => Role::Customer,
            Self::AssignedCourier => Role::Courier,
            Self::Manager => Role::Admin,
        }
    }
}

/// Role-gated transition table for orders.
///
/// Customers may only cancel their own order while it is still active.
/// Couriers walk their assigned order through picked_up, on_the_way and
/// delivered. Managers may force `assigned` or `cancelled`.
pub fn order_transition_allowed(actor: OrderActor, from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    if from.is_terminal() {
        return false;
    }

    match actor {
        OrderActor::Owner => to == Cancelled,
        OrderActor::AssignedCourier => matches!(
            (from, to),
            (Assigned, PickedUp) | (PickedUp, OnTheWay) | (OnTheWay, Delivered)
        ),
        OrderActor::Manager => matches!(to, Assigned | Cancelled),
    }
}

/// Pick task statuses: `new -> in_progress -> {done, cancelled}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PickTaskStatus {
    New,
    InProgress,
    Done,
    Cancelled,
}

impl PickTaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    pub const ACTIVE: [PickTaskStatus; 2] = [Self::New, Self::InProgress];
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CourierStatus {
    Offline,
    Available,
    Busy,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Submitted,
    Approved,
    Rejected,
}

/// Stock movement kinds recorded by the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Receive,
    Writeoff,
    Reserve,
    Release,
    Pick,
}
