//! Database entities for the order-to-fulfillment workflow engine.
//!
//! One module per table. Status columns are typed enums backed by short
//! strings so rows stay readable in the store.

pub mod fulfillment;
pub mod fulfillment_rider_interest;
pub mod order_override;
pub mod payment;
pub mod quotation;
pub mod quotation_item;
pub mod reseller_profile;
pub mod rider;
pub mod rider_coverage_area;
pub mod sale_order;
pub mod store;

pub use fulfillment::{FulfillmentStatus, FulfillmentType};
pub use fulfillment_rider_interest::RiderInterestStatus;
pub use order_override::OverrideKind;
pub use payment::PaymentStatus;
pub use quotation::{QuotationStatus, SaleType};
pub use sale_order::{OrderPhase, SaleOrderStatus};
