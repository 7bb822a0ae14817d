// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tails append-only log files and forwards newly completed lines to an HTTP
//! collector, surviving file rotation and transient delivery failures.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod agent;
pub mod config;
pub mod constants;
pub mod errors;
pub mod inode;
pub mod reader;
pub mod tail;
pub mod uploader;
pub mod watcher;
