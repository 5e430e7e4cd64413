//! ImmortalDB CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the ImmortalDB controller.

pub mod immortal_db;

pub use immortal_db::*;
