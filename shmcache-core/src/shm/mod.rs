// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared memory storage layer.
//!
//! A named POSIX shared memory region holding one length-prefixed frame,
//! plus the cross-process lock that serializes access to it.

mod frame;
mod lock;
mod region;

pub use frame::{FrameCodec, HEADER_LEN};
pub use lock::RegionLock;
pub use region::SharedRegion;
