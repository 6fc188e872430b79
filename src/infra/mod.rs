// SPDX-License-Identifier: Apache-2.0
//! mod
//!
//! Layer: Infrastructure
//! Purpose:
//! - SP/TCP host transport, resource staging, JSONL façade server
//!
//! Notes:
//! - Standard file header. Keep stable to avoid churn.

pub mod file_ref;
pub mod sp_frame;
pub mod transport_sp;
pub mod transport_tcp;
