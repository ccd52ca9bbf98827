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

//! # Streamer / active-group state machine
//!
//! Detects which switch injects traffic for a `(group, source)` pair and joins that with
//! membership to form active groups. Groups whose streamer is known but have no eligible members
//! yet are kept separately as incomplete groups, which the traffic manager blocks at the edge.

use crate::event::{BlockFlag, Notification, NotificationQueue};
use crate::membership::MembershipTracker;
use crate::types::{Dpid, GroupKey, Ipv4Addr, Port};
use log::*;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised by the streamer tracker. The streamer tracker never actually fails at runtime —
/// every data packet and every membership notification is always handleable — but the type exists
/// so its API shape matches its sibling components and can grow error variants without breaking
/// callers.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum StreamerError {}

/// An active `(group, source)` pair: a streamer has been observed, and membership yields a
/// non-empty, filter-compatible receiver set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveGroup {
    /// Switch at which source traffic enters the network.
    pub streamer: Dpid,
    /// `switch -> ports` of the current eligible receivers.
    pub members: HashMap<Dpid, HashSet<Port>>,
}

/// An incomplete `(group, source)` pair: a streamer has been observed but no eligible members
/// exist yet. The traffic manager installs a drop rule at `streamer` while this persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteGroup {
    /// Switch at which source traffic enters the network.
    pub streamer: Dpid,
}

/// Tracks active and incomplete groups by correlating observed streamers with membership.
#[derive(Debug, Default)]
pub struct StreamerTracker {
    active: HashMap<GroupKey, ActiveGroup>,
    incomplete: HashMap<GroupKey, IncompleteGroup>,
    known_group_addrs: HashSet<Ipv4Addr>,
}

impl StreamerTracker {
    /// Creates a tracker with no active or incomplete groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current active groups.
    pub fn active_groups(&self) -> &HashMap<GroupKey, ActiveGroup> {
        &self.active
    }

    /// Returns the active group for `key`, if any.
    pub fn active_group(&self, key: GroupKey) -> Option<&ActiveGroup> {
        self.active.get(&key)
    }

    /// Returns the incomplete group for `key`, if any. Used by the traffic manager to learn the
    /// streamer a `BLOCK` notification refers to.
    pub fn incomplete_group(&self, key: GroupKey) -> Option<&IncompleteGroup> {
        self.incomplete.get(&key)
    }

    /// Handles a multicast data packet `(dst=group, src=source)` arriving at switch `ingress`.
    ///
    /// If `group` already has known membership, the `(group, source)` pair becomes (or stays)
    /// active with the current valid-member set. Otherwise the pair becomes incomplete and a
    /// `BLOCK` notification instructs the traffic manager to drop the flow at the streamer.
    pub fn handle_data_packet(
        &mut self,
        group: Ipv4Addr,
        source: Ipv4Addr,
        ingress: Dpid,
        membership: &MembershipTracker,
        queue: &mut NotificationQueue,
    ) {
        let key = GroupKey::new(group, source);
        if self.known_group_addrs.contains(&group) {
            let members = membership.valid_members(group, source);
            info!("streamer {} detected for {}", ingress, key);
            self.active.insert(key, ActiveGroup { streamer: ingress, members });
            queue.push_back(Notification::ActiveGroupChanged(key));
        } else {
            info!("incomplete group blocked: streamer {} for {}", ingress, key);
            self.incomplete.insert(key, IncompleteGroup { streamer: ingress });
            queue.push_back(Notification::IncompleteGroupChanged(key, BlockFlag::Block));
        }
    }

    /// Handles `PassiveGroupChanged(group)`: re-joins membership into every active and incomplete
    /// entry keyed on `group`, unblocking any incomplete entry that now has eligible members.
    pub fn handle_passive_group_changed(
        &mut self,
        group: Ipv4Addr,
        membership: &MembershipTracker,
        queue: &mut NotificationQueue,
    ) {
        self.known_group_addrs.insert(group);

        let active_keys: Vec<GroupKey> =
            self.active.keys().copied().filter(|k| k.group == group).collect();
        for key in active_keys {
            let members = membership.valid_members(key.group, key.source);
            let changed = self.active.get(&key).map(|g| g.members != members).unwrap_or(true);
            if changed {
                let streamer = self.active[&key].streamer;
                self.active.insert(key, ActiveGroup { streamer, members });
                queue.push_back(Notification::ActiveGroupChanged(key));
            }
        }

        let incomplete_keys: Vec<GroupKey> =
            self.incomplete.keys().copied().filter(|k| k.group == group).collect();
        for key in incomplete_keys {
            let entry = self.incomplete.remove(&key).expect("key came from incomplete.keys()");
            let members = membership.valid_members(key.group, key.source);
            self.active.insert(key, ActiveGroup { streamer: entry.streamer, members });
            // UNBLOCK must precede the route install, so the drop rule is lifted before the
            // traffic manager starts installing forwarding rules for this key.
            queue.push_back(Notification::IncompleteGroupChanged(key, BlockFlag::Unblock));
            queue.push_back(Notification::ActiveGroupChanged(key));
        }
    }

    /// Handles `PassiveGroupDeleted(group)`: removes every active entry keyed on `group`.
    pub fn handle_passive_group_deleted(&mut self, group: Ipv4Addr, queue: &mut NotificationQueue) {
        self.known_group_addrs.remove(&group);

        let active_keys: Vec<GroupKey> =
            self.active.keys().copied().filter(|k| k.group == group).collect();
        for key in active_keys {
            self.active.remove(&key);
            queue.push_back(Notification::ActiveGroupDeleted(key));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::membership::{GroupRecord, RecordType};
    use maplit::hashset;

    fn d(n: u64) -> Dpid {
        Dpid(n)
    }
    fn p(n: u16) -> Port {
        Port(n)
    }
    fn ip(a: u8, b: u8, c: u8, e: u8) -> Ipv4Addr {
        Ipv4Addr::new(a, b, c, e)
    }

    #[test]
    fn data_packet_with_no_membership_is_incomplete() {
        let mut s = StreamerTracker::new();
        let m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        let g = ip(226, 0, 0, 2);
        let src = ip(10, 0, 0, 1);
        s.handle_data_packet(g, src, d(9), &m, &mut q);
        assert_eq!(
            q.pop_front(),
            Some(Notification::IncompleteGroupChanged(GroupKey::new(g, src), BlockFlag::Block))
        );
        assert!(s.active_groups().is_empty());
    }

    #[test]
    fn data_packet_with_membership_becomes_active() {
        let mut s = StreamerTracker::new();
        let mut m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        let g = ip(226, 0, 0, 1);
        let src = ip(10, 0, 0, 1);
        m.apply_v2_report(g, d(10), p(3), &mut q);
        q.clear();
        s.handle_passive_group_changed(g, &m, &mut q);
        q.clear();
        s.handle_data_packet(g, src, d(9), &m, &mut q);
        let key = GroupKey::new(g, src);
        assert_eq!(q.pop_front(), Some(Notification::ActiveGroupChanged(key)));
        assert_eq!(s.active_group(key).unwrap().members.get(&d(10)), Some(&hashset![p(3)]));
    }

    #[test]
    fn passive_group_changed_unblocks_incomplete_group_in_order() {
        let mut s = StreamerTracker::new();
        let mut m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        let g = ip(226, 0, 0, 3);
        let src = ip(10, 0, 0, 1);
        let key = GroupKey::new(g, src);

        s.handle_data_packet(g, src, d(9), &m, &mut q);
        q.clear();

        m.apply_v3_report(
            d(11),
            p(1),
            &[GroupRecord::new(RecordType::ModeIsInclude, g, hashset![src])],
            &mut q,
        );
        q.clear();

        s.handle_passive_group_changed(g, &m, &mut q);
        assert_eq!(
            q.pop_front(),
            Some(Notification::IncompleteGroupChanged(key, BlockFlag::Unblock))
        );
        assert_eq!(q.pop_front(), Some(Notification::ActiveGroupChanged(key)));
        assert!(s.active_group(key).is_some());
    }

    #[test]
    fn passive_group_deleted_removes_active_entries() {
        let mut s = StreamerTracker::new();
        let mut m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        let g = ip(226, 0, 0, 1);
        let src = ip(10, 0, 0, 1);
        m.apply_v2_report(g, d(10), p(3), &mut q);
        q.clear();
        s.handle_passive_group_changed(g, &m, &mut q);
        q.clear();
        s.handle_data_packet(g, src, d(9), &m, &mut q);
        q.clear();

        s.handle_passive_group_deleted(g, &mut q);
        assert_eq!(q.pop_front(), Some(Notification::ActiveGroupDeleted(GroupKey::new(g, src))));
        assert!(s.active_groups().is_empty());
    }
}
