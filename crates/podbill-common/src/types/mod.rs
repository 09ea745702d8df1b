//! Core data types shared across PodBill crates

pub mod account;
pub mod payment;
pub mod plan;
pub mod session;
pub mod usage;
