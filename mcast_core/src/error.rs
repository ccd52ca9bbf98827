// IP multicast controller
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Module containing all error types

use crate::graph::GraphError;
use crate::membership::MembershipError;
use crate::streamer::StreamerError;
use crate::traffic::TrafficError;
use thiserror::Error;

/// Top-level error type, aggregating every component error.
///
/// None of these are fatal to a running [`crate::controller::Controller`]: it logs and continues
/// on all of them. The `Result` surface here exists for direct callers of the individual
/// components, and for tests.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Error propagated from the topology graph builder
    #[error("Graph Error: {0}")]
    GraphError(#[from] GraphError),
    /// Error propagated from the IGMP membership state machine
    #[error("Membership Error: {0}")]
    MembershipError(#[from] MembershipError),
    /// Error propagated from the streamer/active-group state machine
    #[error("Streamer Error: {0}")]
    StreamerError(#[from] StreamerError),
    /// Error propagated from the flow-rule reconciliation orchestrator
    #[error("Traffic Error: {0}")]
    TrafficError(#[from] TrafficError),
}
