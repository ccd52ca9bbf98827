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

//! # IGMP membership state machine
//!
//! Interprets parsed IGMPv2/v3 records into the passive-group record defined by the data model,
//! and answers the valid-members-for-`(group, source)` query that joins membership with source
//! identity.

use crate::event::{Notification, NotificationQueue};
use crate::types::{Dpid, FilterMode, Ipv4Addr, Port};
use log::*;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised while applying IGMP state transitions. A delete against a non-existent
/// membership (§7(b)) is not a protocol violation — a duplicate or late-arriving leave is
/// expected — so `delete_state` logs and ignores it rather than surfacing an error; this enum is
/// presently empty but kept so its API shape matches its sibling components.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum MembershipError {}

/// The six IGMPv3 group-record kinds named by RFC 3376, as interpreted by a membership report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// `MODE_IS_INCLUDE`
    ModeIsInclude,
    /// `MODE_IS_EXCLUDE`
    ModeIsExclude,
    /// `CHANGE_TO_INCLUDE_MODE`
    ChangeToInclude,
    /// `CHANGE_TO_EXCLUDE_MODE`
    ChangeToExclude,
    /// `ALLOW_NEW_SOURCES`
    AllowNewSources,
    /// `BLOCK_OLD_SOURCES`
    BlockOldSources,
}

/// A single group record inside an IGMPv3 membership report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Which of the six record kinds this is.
    pub kind: RecordType,
    /// The multicast group address this record talks about.
    pub group: Ipv4Addr,
    /// The source list carried by the record.
    pub sources: HashSet<Ipv4Addr>,
}

impl GroupRecord {
    /// Builds a new group record.
    pub fn new(kind: RecordType, group: Ipv4Addr, sources: HashSet<Ipv4Addr>) -> Self {
        GroupRecord { kind, group, sources }
    }
}

/// A parsed IGMP message, independent of its wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgmpMessage {
    /// IGMPv2 Membership Report for `group`.
    V2Report(Ipv4Addr),
    /// IGMPv2 Leave Group for `group`.
    V2Leave(Ipv4Addr),
    /// IGMPv3 Membership Report carrying one or more group records.
    V3Report(Vec<GroupRecord>),
}

/// Member state of one `(group, switch, port)` triple: the current filter mode and source set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberState {
    /// `INCLUDE` or `EXCLUDE`.
    pub mode: FilterMode,
    /// The listed source set (meaning depends on `mode`).
    pub sources: HashSet<Ipv4Addr>,
}

/// IGMP membership state machine. Maintains, per group address, the aggregated
/// `switch -> set<port>` view plus the per-`(switch, port)` member state.
#[derive(Debug, Default)]
pub struct MembershipTracker {
    /// `group -> switch -> ports with a membership record for that group`.
    groups: HashMap<Ipv4Addr, HashMap<Dpid, HashSet<Port>>>,
    /// `(group, switch, port) -> member state`.
    member_states: HashMap<(Ipv4Addr, Dpid, Port), MemberState>,
}

impl MembershipTracker {
    /// Creates an empty membership tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles an IGMPv2 Membership Report: `(group, switch, port) := {EXCLUDE, ∅}`.
    pub fn apply_v2_report(
        &mut self,
        group: Ipv4Addr,
        switch: Dpid,
        port: Port,
        queue: &mut NotificationQueue,
    ) {
        self.set_state(group, switch, port, FilterMode::Exclude, HashSet::new(), queue);
    }

    /// Handles an IGMPv2 Leave Group: removes `(group, switch, port)` if present.
    pub fn apply_v2_leave(
        &mut self,
        group: Ipv4Addr,
        switch: Dpid,
        port: Port,
        queue: &mut NotificationQueue,
    ) {
        self.delete_state(group, switch, port, queue);
    }

    /// Handles an IGMPv3 Membership Report: applies every contained [`GroupRecord`] in order,
    /// last-writer-wins for records that address the same `(group, port)`.
    pub fn apply_v3_report(
        &mut self,
        switch: Dpid,
        port: Port,
        records: &[GroupRecord],
        queue: &mut NotificationQueue,
    ) {
        for record in records {
            self.apply_record(switch, port, record, queue);
        }
    }

    fn apply_record(
        &mut self,
        switch: Dpid,
        port: Port,
        record: &GroupRecord,
        queue: &mut NotificationQueue,
    ) {
        let group = record.group;
        match record.kind {
            RecordType::ModeIsInclude | RecordType::ChangeToInclude => {
                self.set_state(group, switch, port, FilterMode::Include, record.sources.clone(), queue);
            }
            RecordType::ModeIsExclude | RecordType::ChangeToExclude => {
                self.set_state(group, switch, port, FilterMode::Exclude, record.sources.clone(), queue);
            }
            RecordType::AllowNewSources => {
                let current = self.member_states.get(&(group, switch, port));
                let (mode, sources) = match current {
                    Some(MemberState { mode: FilterMode::Exclude, sources }) => {
                        (FilterMode::Exclude, sources.difference(&record.sources).copied().collect())
                    }
                    Some(MemberState { mode: FilterMode::Include, sources }) => {
                        (FilterMode::Include, sources.union(&record.sources).copied().collect())
                    }
                    None => (FilterMode::Include, record.sources.clone()),
                };
                self.set_state(group, switch, port, mode, sources, queue);
            }
            RecordType::BlockOldSources => {
                let current = self.member_states.get(&(group, switch, port));
                let (mode, sources) = match current {
                    Some(MemberState { mode: FilterMode::Exclude, sources }) => {
                        (FilterMode::Exclude, sources.union(&record.sources).copied().collect())
                    }
                    Some(MemberState { mode: FilterMode::Include, sources }) => {
                        (FilterMode::Include, sources.difference(&record.sources).copied().collect())
                    }
                    None => (FilterMode::Include, HashSet::new()),
                };
                self.set_state(group, switch, port, mode, sources, queue);
            }
        }
    }

    /// Sets `(group, switch, port)` to `{mode, sources}`. An empty `INCLUDE` source set deletes
    /// the membership instead, per the report-handling rules.
    fn set_state(
        &mut self,
        group: Ipv4Addr,
        switch: Dpid,
        port: Port,
        mode: FilterMode,
        sources: HashSet<Ipv4Addr>,
        queue: &mut NotificationQueue,
    ) {
        if mode == FilterMode::Include && sources.is_empty() {
            self.delete_state(group, switch, port, queue);
            return;
        }

        self.groups.entry(group).or_insert_with(HashMap::new).entry(switch).or_insert_with(HashSet::new).insert(port);
        self.member_states.insert((group, switch, port), MemberState { mode, sources });
        debug!("membership updated: group={} switch={} port={}", group, switch, port);
        queue.push_back(Notification::PassiveGroupChanged(group));
    }

    fn delete_state(&mut self, group: Ipv4Addr, switch: Dpid, port: Port, queue: &mut NotificationQueue) {
        let existed = self.member_states.remove(&(group, switch, port)).is_some();
        if !existed {
            debug!("ignoring delete of non-existent membership group={} switch={} port={}", group, switch, port);
            return;
        }

        let mut group_now_empty = false;
        if let Some(switches) = self.groups.get_mut(&group) {
            if let Some(ports) = switches.get_mut(&switch) {
                ports.remove(&port);
                if ports.is_empty() {
                    switches.remove(&switch);
                }
            }
            if switches.is_empty() {
                group_now_empty = true;
            }
        }

        if group_now_empty {
            self.groups.remove(&group);
            queue.push_back(Notification::PassiveGroupDeleted(group));
        } else {
            queue.push_back(Notification::PassiveGroupChanged(group));
        }
    }

    /// Returns true if any membership currently exists for `group`.
    pub fn has_group(&self, group: Ipv4Addr) -> bool {
        self.groups.contains_key(&group)
    }

    /// Returns the aggregated `switch -> ports` view for `group`, or an empty map if unknown.
    pub fn passive_members(&self, group: Ipv4Addr) -> HashMap<Dpid, HashSet<Port>> {
        self.groups.get(&group).cloned().unwrap_or_default()
    }

    /// The join point between membership and source identity: returns every `(switch, port)`
    /// whose member state is compatible with receiving traffic from `source` for `group` — either
    /// `{INCLUDE, X}` with `source ∈ X`, or `{EXCLUDE, X}` with `source ∉ X`.
    pub fn valid_members(&self, group: Ipv4Addr, source: Ipv4Addr) -> HashMap<Dpid, HashSet<Port>> {
        let mut result: HashMap<Dpid, HashSet<Port>> = HashMap::new();
        let switches = match self.groups.get(&group) {
            Some(s) => s,
            None => return result,
        };
        for (&switch, ports) in switches {
            for &port in ports {
                let state = match self.member_states.get(&(group, switch, port)) {
                    Some(s) => s,
                    None => continue,
                };
                let eligible = match state.mode {
                    FilterMode::Include => state.sources.contains(&source),
                    FilterMode::Exclude => !state.sources.contains(&source),
                };
                if eligible {
                    result.entry(switch).or_insert_with(HashSet::new).insert(port);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
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
    fn v2_report_then_query_returns_member() {
        let mut m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        let g = ip(226, 0, 0, 1);
        m.apply_v2_report(g, d(10), p(3), &mut q);
        assert_eq!(q.pop_front(), Some(Notification::PassiveGroupChanged(g)));
        let valid = m.valid_members(g, ip(10, 0, 0, 1));
        assert_eq!(valid.get(&d(10)), Some(&hashset![p(3)]));
    }

    #[test]
    fn v2_leave_removes_and_deletes_group() {
        let mut m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        let g = ip(226, 0, 0, 1);
        m.apply_v2_report(g, d(10), p(3), &mut q);
        q.clear();
        m.apply_v2_leave(g, d(10), p(3), &mut q);
        assert_eq!(q.pop_front(), Some(Notification::PassiveGroupDeleted(g)));
        assert!(!m.has_group(g));
    }

    #[test]
    fn leave_on_unknown_member_is_ignored_not_fatal() {
        let mut m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        m.apply_v2_leave(ip(226, 0, 0, 1), d(10), p(3), &mut q);
        assert!(q.is_empty());
    }

    #[test]
    fn include_mode_filters_by_source() {
        let mut m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        let g = ip(226, 0, 0, 3);
        let s1 = ip(10, 0, 0, 1);
        let s2 = ip(10, 0, 0, 2);
        m.apply_v3_report(
            d(11),
            p(1),
            &[GroupRecord::new(RecordType::ModeIsInclude, g, hashset![s1])],
            &mut q,
        );
        assert_eq!(m.valid_members(g, s1).get(&d(11)), Some(&hashset![p(1)]));
        assert!(m.valid_members(g, s2).is_empty());
    }

    #[test]
    fn allow_new_sources_extends_include_set() {
        let mut m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        let g = ip(226, 0, 0, 3);
        let s1 = ip(10, 0, 0, 1);
        let s2 = ip(10, 0, 0, 2);
        m.apply_v3_report(
            d(11),
            p(1),
            &[GroupRecord::new(RecordType::ModeIsInclude, g, hashset![s1])],
            &mut q,
        );
        m.apply_v3_report(
            d(11),
            p(1),
            &[GroupRecord::new(RecordType::AllowNewSources, g, hashset![s2])],
            &mut q,
        );
        assert_eq!(m.valid_members(g, s2).get(&d(11)), Some(&hashset![p(1)]));
        assert_eq!(m.valid_members(g, s1).get(&d(11)), Some(&hashset![p(1)]));
    }

    #[test]
    fn block_old_sources_on_exclude_grows_exclude_set() {
        let mut m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        let g = ip(226, 0, 0, 1);
        let s1 = ip(10, 0, 0, 1);
        m.apply_v2_report(g, d(9), p(1), &mut q);
        m.apply_v3_report(
            d(9),
            p(1),
            &[GroupRecord::new(RecordType::BlockOldSources, g, hashset![s1])],
            &mut q,
        );
        assert!(m.valid_members(g, s1).is_empty());
    }

    #[test]
    fn last_writer_wins_within_a_single_report() {
        let mut m = MembershipTracker::new();
        let mut q = NotificationQueue::new();
        let g = ip(226, 0, 0, 1);
        let s1 = ip(10, 0, 0, 1);
        m.apply_v3_report(
            d(9),
            p(1),
            &[
                GroupRecord::new(RecordType::ModeIsInclude, g, hashset![s1]),
                GroupRecord::new(RecordType::ModeIsExclude, g, HashSet::new()),
            ],
            &mut q,
        );
        // last record wins: EXCLUDE {} means "receive everything"
        assert_eq!(m.valid_members(g, s1).get(&d(9)), Some(&hashset![p(1)]));
    }
}
