// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery and runtime limits for the tailer.

use std::time::Duration;

/// Total number of delivery attempts per batch: the first try plus one retry.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 2;

/// Fixed pause between the failed first attempt and the retry.
pub const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Content type announced for the newline-joined JSON records.
pub const PAYLOAD_CONTENT_TYPE: &str = "application/json";

/// Capacity of the control channel of each tail service.
pub(crate) const TAIL_COMMAND_CHANNEL_SIZE: usize = 16;
