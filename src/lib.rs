// SPDX-License-Identifier: Apache-2.0
//! wcf_bridge
//!
//! Client engine for the WeChatFerry automation host: SP/TCP transport,
//! protobuf command surface, message receiving and the polling operations
//! built on top of it, plus a JSONL façade server.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod ports;

pub use app::{BridgeService, CommandClient, Subscription, Wcferry};
pub use config::{SocketOptions, WcfOptions};
pub use domain::message::Message;
pub use error::{Error, Result};
pub use ports::resource::Locator;
