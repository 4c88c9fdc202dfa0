//! Workflow services. Each module owns one workflow concern; handlers
//! compose them through [`crate::handlers::AppServices`].

pub mod credit;
pub mod fulfillments;
pub mod overrides;
pub mod quotations;
pub mod rider_coverage;
pub mod rider_interest;
pub mod routing;
pub mod sale_workflow;
