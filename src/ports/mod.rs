// SPDX-License-Identifier: Apache-2.0
//! mod
//!
//! Layer: Ports
//! Purpose:
//! - outbound contracts the application layer depends on

pub mod resource;
pub mod transport;
