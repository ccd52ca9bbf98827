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

//! Module defining the notifications exchanged between the four state engines.

use crate::types::{GroupKey, Ipv4Addr};
use std::collections::VecDeque;

/// Whether an incomplete-group drop rule should be installed or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFlag {
    /// Install a drop rule at the streamer: no receivers are known yet.
    Block,
    /// Remove a previously installed drop rule: receivers now exist.
    Unblock,
}

/// A notification raised by one of the four state engines and consumed by
/// [`crate::traffic::TrafficManager`] (and, for the two `PassiveGroup*` variants, by
/// [`crate::streamer::StreamerTracker`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The topology graph was mutated by a link-up or link-down event.
    TopologyChanged,
    /// The passive group record for `group` was created or updated.
    PassiveGroupChanged(Ipv4Addr),
    /// The passive group record for `group` no longer has any members.
    PassiveGroupDeleted(Ipv4Addr),
    /// The active group `key` was created or its member set changed.
    ActiveGroupChanged(GroupKey),
    /// The active group `key` no longer exists.
    ActiveGroupDeleted(GroupKey),
    /// The incomplete group `key` transitioned; `flag` says whether to block or unblock it.
    IncompleteGroupChanged(GroupKey, BlockFlag),
}

/// FIFO queue of notifications still awaiting dispatch. Draining this queue to completion before
/// returning control to the caller is what gives the controller its serialisation guarantee.
pub type NotificationQueue = VecDeque<Notification>;
