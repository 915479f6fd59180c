// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors raised while parsing core analytics types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
	#[error("unknown event type: {0}")]
	UnknownEventType(String),

	#[error("unknown client type: {0}")]
	UnknownClientType(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
