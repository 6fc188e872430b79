// SPDX-License-Identifier: Apache-2.0
//! mod
//!
//! Layer: Application
//! Purpose:
//! - command surface, receiving state machine, polling policies
//! - `Wcferry` engine and the façade-facing `BridgeService`

pub mod client;
pub mod listeners;
pub mod polling;
pub mod service;
pub mod subscription;
pub mod wcferry;

#[cfg(test)]
pub(crate) mod testing;

pub use client::CommandClient;
pub use service::BridgeService;
pub use wcferry::{Subscription, Wcferry};
