//! billing-core: usage-billing calculation and settlement core.
//!
//! Turns a raw usage event ("user X consumed Y units of product Z") into a
//! priced, quota-checked, settled billing record. Durable storage, the wire
//! transport and the pricing/subscription/balance lookups are collaborator
//! traits (see [`clients`]) injected at construction; this crate owns only
//! the decision logic in between.

pub mod clients;
pub mod config;
pub mod models;
pub mod services;
pub mod startup;
