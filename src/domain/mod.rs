// SPDX-License-Identifier: Apache-2.0
//! mod
//!
//! Layer: Domain
//! Purpose:
//! - host wire schema and codec, pushed-message view, contact views
//! - JSONL bridge protocol

pub mod codec;
pub mod contacts;
pub mod message;
pub mod protocol;
pub mod wire;
