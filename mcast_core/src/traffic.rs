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

//! # Flow-rule reconciliation
//!
//! Turns [`Notification`]s into OpenFlow flow-mods and keeps a shadow of what has actually been
//! installed on each switch, so recomputing a route twice in a row never re-sends rules that are
//! already in place.

use crate::event::{BlockFlag, Notification};
use crate::graph::GraphBuilder;
use crate::streamer::StreamerTracker;
use crate::types::{Dpid, GroupKey, Ipv4Addr, Port};
use log::*;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// `ethertype` value for IPv4, as matched by every installed flow rule.
pub const ETH_TYPE_IPV4: u16 = 0x0800;

/// Priority every multicast-forwarding and drop rule is installed with. Chosen to be the highest
/// possible value so these rules always take precedence over any coarser default-route entry a
/// switch might otherwise carry.
pub const FLOW_PRIORITY: u16 = 0xFFFF;

/// Error surfaced by a [`SwitchDriver`] when it cannot apply a flow-mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchError(pub String);

impl std::fmt::Display for SwitchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SwitchError {}

/// Errors raised while reconciling flow rules.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum TrafficError {
    /// The switch driver rejected a flow-mod.
    #[error("switch driver rejected flow-mod for dpid {0}: {1}")]
    DriverRejected(Dpid, String),
}

/// The match fields of an installed multicast flow rule: IPv4, a specific source, a specific
/// multicast destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMatch {
    /// Always [`ETH_TYPE_IPV4`].
    pub eth_type: u16,
    /// Source address to match (`nw_src`).
    pub nw_src: Ipv4Addr,
    /// Destination multicast group to match (`nw_dst`).
    pub nw_dst: Ipv4Addr,
}

/// What a flow-mod asks the switch to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowCommand {
    /// Install a forwarding rule that floods the packet out `out_ports`.
    Install {
        /// Output ports, in the order they should be listed in the action list.
        out_ports: Vec<Port>,
    },
    /// Install a rule with an empty action list: matching traffic is dropped.
    Drop,
    /// Remove whatever rule currently matches `m` on this switch.
    Delete,
}

/// A single flow-mod destined for one switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    /// Match fields.
    pub m: FlowMatch,
    /// Requested command.
    pub command: FlowCommand,
    /// Installed priority; always [`FLOW_PRIORITY`] for rules this manager installs.
    pub priority: u16,
}

/// Abstraction over the southbound channel to a switch. Implemented by the runtime crate that
/// actually speaks OpenFlow to hardware or to a software switch; a logging or in-memory recording
/// implementation is enough for tests.
pub trait SwitchDriver {
    /// Applies `flow_mod` on `dpid`.
    fn send_flow_mod(&self, dpid: Dpid, flow_mod: &FlowMod) -> Result<(), SwitchError>;
}

/// Flow-rule reconciliation orchestrator.
///
/// Maintains a "shadow" of what has actually been installed so that reacting twice to the same
/// state never re-sends a rule that is already in place, and a route that shrinks only triggers a
/// delete for the ports that disappeared plus an install for the switches whose port list changed
/// — never a needless churn of switches whose route did not change at all.
#[derive(Debug, Default)]
pub struct TrafficManager {
    /// `key -> switch -> installed output ports`, the routes currently believed installed.
    installed_routes: HashMap<GroupKey, HashMap<Dpid, Vec<Port>>>,
    /// `key -> streamer dpid`, the drop rules currently believed installed for incomplete groups.
    installed_drops: HashMap<GroupKey, Dpid>,
}

impl TrafficManager {
    /// Creates a manager with no installed state.
    pub fn new() -> Self {
        Self::default()
    }

    fn flow_match(key: GroupKey) -> FlowMatch {
        FlowMatch { eth_type: ETH_TYPE_IPV4, nw_src: key.source, nw_dst: key.group }
    }

    fn send(
        &self,
        driver: &dyn SwitchDriver,
        dpid: Dpid,
        flow_mod: FlowMod,
    ) -> Result<(), TrafficError> {
        driver
            .send_flow_mod(dpid, &flow_mod)
            .map_err(|e| TrafficError::DriverRejected(dpid, e.0))
    }

    /// Computes the desired route for `key` from the current topology and streamer state, and
    /// reconciles it against the installed shadow: deletes switches whose route disappeared,
    /// deletes-then-installs switches whose route changed, leaves unchanged switches alone.
    fn reconcile_group(
        &mut self,
        key: GroupKey,
        graph: &GraphBuilder,
        streamer: &StreamerTracker,
        driver: &dyn SwitchDriver,
    ) -> Result<(), TrafficError> {
        let active = match streamer.active_group(key) {
            Some(a) => a,
            None => return self.withdraw_group(key, driver),
        };

        let receivers: HashSet<Dpid> = active.members.keys().copied().collect();
        let tree = graph.min_cost_tree(active.streamer, &receivers);
        let desired = graph.construct_routes(&tree, active.streamer, &active.members);

        let previous = self.installed_routes.remove(&key).unwrap_or_default();
        // Tracks what is actually believed installed as each send completes, so that a failure
        // partway through reconciliation leaves the shadow reflecting reality instead of being
        // wiped outright — a switch whose rule was never touched this round must stay recorded.
        let mut shadow = previous.clone();
        let m = Self::flow_match(key);

        for (&dpid, prev_ports) in &previous {
            if desired.get(&dpid) != Some(prev_ports) {
                if let Err(e) =
                    self.send(driver, dpid, FlowMod { m: m.clone(), command: FlowCommand::Delete, priority: FLOW_PRIORITY })
                {
                    self.installed_routes.insert(key, shadow);
                    return Err(e);
                }
                shadow.remove(&dpid);
            }
        }
        for (&dpid, ports) in &desired {
            if previous.get(&dpid) != Some(ports) {
                if let Err(e) = self.send(
                    driver,
                    dpid,
                    FlowMod {
                        m: m.clone(),
                        command: FlowCommand::Install { out_ports: ports.clone() },
                        priority: FLOW_PRIORITY,
                    },
                ) {
                    self.installed_routes.insert(key, shadow);
                    return Err(e);
                }
                shadow.insert(dpid, ports.clone());
            }
        }

        info!("reconciled route for {}: {} switch(es)", key, shadow.len());
        self.installed_routes.insert(key, shadow);
        Ok(())
    }

    /// Removes every installed route for `key`, sending a delete flow-mod to each switch that
    /// currently carries one. Does not fail if a switch is already gone from the topology — the
    /// flow table disappears with it, so the delete is simply dropped on the floor.
    fn withdraw_group(&mut self, key: GroupKey, driver: &dyn SwitchDriver) -> Result<(), TrafficError> {
        if let Some(previous) = self.installed_routes.remove(&key) {
            let m = Self::flow_match(key);
            for dpid in previous.keys() {
                // A delete for a switch that link-down already dropped from the topology is not
                // an error: the switch's flow table no longer exists either way.
                let _ = self.send(driver, *dpid, FlowMod { m: m.clone(), command: FlowCommand::Delete, priority: FLOW_PRIORITY });
            }
        }
        Ok(())
    }

    fn install_drop(&mut self, key: GroupKey, dpid: Dpid, driver: &dyn SwitchDriver) -> Result<(), TrafficError> {
        if self.installed_drops.get(&key) == Some(&dpid) {
            return Ok(());
        }
        let m = Self::flow_match(key);
        self.send(driver, dpid, FlowMod { m, command: FlowCommand::Drop, priority: FLOW_PRIORITY })?;
        self.installed_drops.insert(key, dpid);
        Ok(())
    }

    fn remove_drop(&mut self, key: GroupKey, driver: &dyn SwitchDriver) -> Result<(), TrafficError> {
        if let Some(dpid) = self.installed_drops.remove(&key) {
            let m = Self::flow_match(key);
            let _ = self.send(driver, dpid, FlowMod { m, command: FlowCommand::Delete, priority: FLOW_PRIORITY });
        }
        Ok(())
    }

    /// Reacts to a single notification, issuing whatever flow-mods the change requires.
    pub fn handle_notification(
        &mut self,
        notification: &Notification,
        graph: &GraphBuilder,
        streamer: &StreamerTracker,
        driver: &dyn SwitchDriver,
    ) -> Result<(), TrafficError> {
        match notification {
            Notification::TopologyChanged => {
                let keys: Vec<GroupKey> = streamer.active_groups().keys().copied().collect();
                for key in keys {
                    self.reconcile_group(key, graph, streamer, driver)?;
                }
                Ok(())
            }
            Notification::ActiveGroupChanged(key) => self.reconcile_group(*key, graph, streamer, driver),
            Notification::ActiveGroupDeleted(key) => self.withdraw_group(*key, driver),
            Notification::IncompleteGroupChanged(key, BlockFlag::Block) => {
                match streamer.incomplete_group(*key) {
                    Some(incomplete) => self.install_drop(*key, incomplete.streamer, driver),
                    None => Ok(()),
                }
            }
            Notification::IncompleteGroupChanged(key, BlockFlag::Unblock) => {
                self.remove_drop(*key, driver)
            }
            Notification::PassiveGroupChanged(_) | Notification::PassiveGroupDeleted(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::NotificationQueue;
    use crate::membership::MembershipTracker;
    use crate::types::Port;
    use maplit::hashset;
    use std::cell::RefCell;

    fn d(n: u64) -> Dpid {
        Dpid(n)
    }
    fn p(n: u16) -> Port {
        Port(n)
    }
    fn ip(a: u8, b: u8, c: u8, e: u8) -> Ipv4Addr {
        Ipv4Addr::new(a, b, c, e)
    }

    #[derive(Default)]
    struct RecordingDriver {
        sent: RefCell<Vec<(Dpid, FlowMod)>>,
    }

    impl SwitchDriver for RecordingDriver {
        fn send_flow_mod(&self, dpid: Dpid, flow_mod: &FlowMod) -> Result<(), SwitchError> {
            self.sent.borrow_mut().push((dpid, flow_mod.clone()));
            Ok(())
        }
    }

    // 1 -- 2 -- 3, host on 3 at port 50.
    fn line_topology() -> GraphBuilder {
        let mut g = GraphBuilder::new();
        let mut q = NotificationQueue::new();
        g.handle_link_up(d(1), p(1), d(2), p(1), None, &mut q);
        g.handle_link_up(d(2), p(2), d(3), p(1), None, &mut q);
        g
    }

    #[test]
    fn active_group_changed_installs_route_along_tree_and_host_ports() {
        let graph = line_topology();
        let mut membership = MembershipTracker::new();
        let mut streamer = StreamerTracker::new();
        let mut tm = TrafficManager::new();
        let driver = RecordingDriver::default();
        let mut q = NotificationQueue::new();

        let g = ip(226, 0, 0, 1);
        let src = ip(10, 0, 0, 9);
        let key = GroupKey::new(g, src);

        membership.apply_v2_report(g, d(3), p(50), &mut q);
        q.clear();
        streamer.handle_passive_group_changed(g, &membership, &mut q);
        q.clear();
        streamer.handle_data_packet(g, src, d(1), &membership, &mut q);

        tm.handle_notification(&Notification::ActiveGroupChanged(key), &graph, &streamer, &driver).unwrap();

        let sent = driver.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, d(1));
        assert_eq!(sent[0].1.command, FlowCommand::Install { out_ports: vec![p(1)] });
        assert_eq!(sent[1].0, d(2));
        assert_eq!(sent[1].1.command, FlowCommand::Install { out_ports: vec![p(2)] });
    }

    #[test]
    fn reconciling_twice_with_no_change_sends_nothing_again() {
        let graph = line_topology();
        let mut membership = MembershipTracker::new();
        let mut streamer = StreamerTracker::new();
        let mut tm = TrafficManager::new();
        let driver = RecordingDriver::default();
        let mut q = NotificationQueue::new();

        let g = ip(226, 0, 0, 1);
        let src = ip(10, 0, 0, 9);
        let key = GroupKey::new(g, src);

        membership.apply_v2_report(g, d(3), p(50), &mut q);
        q.clear();
        streamer.handle_passive_group_changed(g, &membership, &mut q);
        q.clear();
        streamer.handle_data_packet(g, src, d(1), &membership, &mut q);

        tm.handle_notification(&Notification::ActiveGroupChanged(key), &graph, &streamer, &driver).unwrap();
        let first_count = driver.sent.borrow().len();
        tm.handle_notification(&Notification::ActiveGroupChanged(key), &graph, &streamer, &driver).unwrap();
        assert_eq!(driver.sent.borrow().len(), first_count);
    }

    #[test]
    fn incomplete_group_block_then_unblock_installs_and_removes_drop() {
        let graph = line_topology();
        let membership = MembershipTracker::new();
        let mut streamer = StreamerTracker::new();
        let mut tm = TrafficManager::new();
        let driver = RecordingDriver::default();
        let mut q = NotificationQueue::new();

        let g = ip(226, 0, 0, 2);
        let src = ip(10, 0, 0, 9);
        let key = GroupKey::new(g, src);

        streamer.handle_data_packet(g, src, d(1), &membership, &mut q);
        let notif = q.pop_front().unwrap();
        tm.handle_notification(&notif, &graph, &streamer, &driver).unwrap();
        assert_eq!(driver.sent.borrow().last().unwrap().1.command, FlowCommand::Drop);

        tm.handle_notification(
            &Notification::IncompleteGroupChanged(key, BlockFlag::Unblock),
            &graph,
            &streamer,
            &driver,
        )
        .unwrap();
        assert_eq!(driver.sent.borrow().last().unwrap().1.command, FlowCommand::Delete);
    }

    #[test]
    fn active_group_deleted_sends_delete_for_every_installed_switch() {
        let graph = line_topology();
        let mut membership = MembershipTracker::new();
        let mut streamer = StreamerTracker::new();
        let mut tm = TrafficManager::new();
        let driver = RecordingDriver::default();
        let mut q = NotificationQueue::new();

        let g = ip(226, 0, 0, 1);
        let src = ip(10, 0, 0, 9);
        let key = GroupKey::new(g, src);

        membership.apply_v2_report(g, d(3), p(50), &mut q);
        q.clear();
        streamer.handle_passive_group_changed(g, &membership, &mut q);
        q.clear();
        streamer.handle_data_packet(g, src, d(1), &membership, &mut q);
        tm.handle_notification(&Notification::ActiveGroupChanged(key), &graph, &streamer, &driver).unwrap();
        let before = driver.sent.borrow().len();

        tm.handle_notification(&Notification::ActiveGroupDeleted(key), &graph, &streamer, &driver).unwrap();
        let sent = driver.sent.borrow();
        assert!(sent.len() > before);
        assert!(sent[before..].iter().all(|(_, fm)| fm.command == FlowCommand::Delete));
    }
}
