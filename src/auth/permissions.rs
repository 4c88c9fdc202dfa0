/*!
 * # Permissions Module
 *
 * Capability definitions for the workflow surface. Capabilities are
 * plain `resource:action` strings checked through the `Authorizer`
 * before any workflow operation runs.
 */

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const UPDATE: &'static str = "update";
    pub const CONFIRM: &'static str = "confirm";
    pub const REJECT: &'static str = "reject";
    pub const APPROVE: &'static str = "approve";
    pub const OVERRIDE: &'static str = "override";
    pub const BID: &'static str = "bid";
    pub const ASSIGN: &'static str = "assign";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const QUOTATIONS: &'static str = "quotations";
    pub const ORDERS: &'static str = "orders";
    pub const FULFILLMENTS: &'static str = "fulfillments";
    pub const COVERAGE: &'static str = "coverage";
}

/// Common capability string constants for compile-time safety
pub mod consts {
    // Quotations
    pub const QUOTATIONS_READ: &str = "quotations:read";
    pub const QUOTATIONS_CREATE: &str = "quotations:create";
    pub const QUOTATIONS_UPDATE: &str = "quotations:update";
    pub const QUOTATIONS_CONFIRM: &str = "quotations:confirm";
    pub const QUOTATIONS_REJECT: &str = "quotations:reject";
    pub const QUOTATIONS_APPROVE: &str = "quotations:approve";

    // Sale orders
    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_OVERRIDE: &str = "orders:override";

    // Fulfillments
    pub const FULFILLMENTS_READ: &str = "fulfillments:read";
    pub const FULFILLMENTS_UPDATE: &str = "fulfillments:update";
    pub const FULFILLMENTS_BID: &str = "fulfillments:bid";
    pub const FULFILLMENTS_ASSIGN: &str = "fulfillments:assign";

    // Rider coverage
    pub const COVERAGE_READ: &str = "coverage:read";
    pub const COVERAGE_UPDATE: &str = "coverage:update";
}

/// Format a capability string
pub fn format_permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}
