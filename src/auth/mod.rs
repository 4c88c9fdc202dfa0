//! Authorization layer for the workflow engine.
//!
//! Authentication (token issuance, session handling) happens upstream;
//! operations here receive an already-identified [`Actor`] and consult an
//! [`Authorizer`] for a yes/no capability decision before doing any work.

pub mod permissions;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use permissions::consts;

pub use permissions::{Actions, Resources};

/// Role a caller acts under. Roles map to capability sets; ownership
/// rules (e.g. a reseller confirming only their own quotation) live in
/// the services, layered on top of the capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Role {
    Consumer,
    Reseller,
    Biller,
    Rider,
    Staff,
    Admin,
}

/// An authenticated caller, as handed over by the upstream gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Staff and Admin act with back-office privileges.
    pub fn is_privileged(&self) -> bool {
        matches!(self.role, Role::Staff | Role::Admin)
    }
}

/// Decides whether an actor holds a capability. Implementations may go
/// to an external policy service; the default consults a static
/// role-to-capability table.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, actor: &Actor, capability: &str) -> Result<(), ServiceError>;
}

lazy_static! {
    static ref ROLE_CAPABILITIES: HashMap<Role, HashSet<&'static str>> = {
        let mut map = HashMap::new();

        let stakeholder: HashSet<&'static str> = [
            consts::QUOTATIONS_READ,
            consts::QUOTATIONS_CREATE,
            consts::QUOTATIONS_UPDATE,
            consts::QUOTATIONS_CONFIRM,
            consts::QUOTATIONS_REJECT,
            consts::ORDERS_READ,
            consts::FULFILLMENTS_READ,
        ]
        .into_iter()
        .collect();

        map.insert(Role::Consumer, stakeholder.clone());
        map.insert(Role::Reseller, stakeholder);

        map.insert(
            Role::Biller,
            [
                consts::QUOTATIONS_READ,
                consts::QUOTATIONS_CREATE,
                consts::QUOTATIONS_UPDATE,
                consts::QUOTATIONS_CONFIRM,
                consts::QUOTATIONS_REJECT,
                consts::ORDERS_READ,
                consts::FULFILLMENTS_READ,
                consts::FULFILLMENTS_ASSIGN,
            ]
            .into_iter()
            .collect(),
        );

        map.insert(
            Role::Rider,
            [
                consts::FULFILLMENTS_READ,
                consts::FULFILLMENTS_BID,
                consts::COVERAGE_READ,
                consts::COVERAGE_UPDATE,
            ]
            .into_iter()
            .collect(),
        );

        let staff: HashSet<&'static str> = [
            consts::QUOTATIONS_READ,
            consts::QUOTATIONS_CREATE,
            consts::QUOTATIONS_UPDATE,
            consts::QUOTATIONS_REJECT,
            consts::QUOTATIONS_APPROVE,
            consts::ORDERS_READ,
            consts::ORDERS_OVERRIDE,
            consts::FULFILLMENTS_READ,
            consts::FULFILLMENTS_UPDATE,
            consts::FULFILLMENTS_ASSIGN,
            consts::COVERAGE_READ,
            consts::COVERAGE_UPDATE,
        ]
        .into_iter()
        .collect();

        map.insert(Role::Staff, staff.clone());
        map.insert(Role::Admin, staff);

        map
    };
}

/// Capability check backed by the static role table.
#[derive(Debug, Clone, Default)]
pub struct RoleAuthorizer;

impl RoleAuthorizer {
    pub fn new() -> Self {
        Self
    }

    pub fn has_capability(role: Role, capability: &str) -> bool {
        ROLE_CAPABILITIES
            .get(&role)
            .map(|caps| caps.contains(capability))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Authorizer for RoleAuthorizer {
    async fn authorize(&self, actor: &Actor, capability: &str) -> Result<(), ServiceError> {
        if Self::has_capability(actor.role, capability) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "{} role lacks capability {}",
                actor.role, capability
            )))
        }
    }
}
