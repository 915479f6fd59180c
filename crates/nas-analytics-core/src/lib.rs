// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for NAS product analytics.
//!
//! These types are shared between the SDK and anything that reads its wire
//! or storage format:
//!
//! - [`Event`]: one tracked occurrence, exactly as it is queued, persisted
//!   and delivered
//! - [`EventType`] and [`ClientType`]: closed tag sets carried on every event
//! - [`DeviceId`] and [`SessionId`]: identifiers stamped onto events
//! - [`BatchPayload`]: the JSON body POSTed to the ingestion endpoint

pub mod error;
pub mod event;
pub mod ids;

pub use error::{CoreError, Result};
pub use event::{BatchPayload, ClientType, Event, EventContext, EventType};
pub use ids::{DeviceId, SessionId, DEVICE_ID_PREFIX, SESSION_ID_PREFIX};
