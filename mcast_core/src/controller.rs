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

//! # Controller
//!
//! Owns the four state engines and wires their notifications together. Every public method
//! injects one external event, then drains the resulting notification queue to a fixed point
//! before returning, so callers always observe a fully reconciled state.

use crate::error::Error;
use crate::event::{Notification, NotificationQueue};
use crate::graph::GraphBuilder;
use crate::membership::{IgmpMessage, MembershipTracker};
use crate::streamer::StreamerTracker;
use crate::traffic::{SwitchDriver, TrafficManager};
use crate::types::{Dpid, Ipv4Addr, LinkCost, Port};
use log::*;

/// Top-level orchestrator. Generic over the southbound [`SwitchDriver`] so the demo binary can
/// plug in whatever driver talks to its switches, while tests can plug in an in-memory recorder.
pub struct Controller<D: SwitchDriver> {
    graph: GraphBuilder,
    membership: MembershipTracker,
    streamer: StreamerTracker,
    traffic: TrafficManager,
    driver: D,
}

impl<D: SwitchDriver> Controller<D> {
    /// Creates a controller with empty topology, membership, and group state, forwarding flow-mods
    /// to `driver`.
    pub fn new(driver: D) -> Self {
        Self {
            graph: GraphBuilder::new(),
            membership: MembershipTracker::new(),
            streamer: StreamerTracker::new(),
            traffic: TrafficManager::new(),
            driver,
        }
    }

    /// Exposes the current topology graph, e.g. for a management UI or diagnostics.
    pub fn graph(&self) -> &GraphBuilder {
        &self.graph
    }

    /// Exposes the current active groups, e.g. for a management UI or diagnostics.
    pub fn streamer(&self) -> &StreamerTracker {
        &self.streamer
    }

    /// Exposes the switch driver, mainly so tests can inspect what was sent to it.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Handles a link-discovery "link up" event and reconciles flow rules to a fixed point.
    pub fn handle_link_up(
        &mut self,
        dpid_a: Dpid,
        port_a: Port,
        dpid_b: Dpid,
        port_b: Port,
        cost: Option<LinkCost>,
    ) -> Result<(), Error> {
        let mut queue = NotificationQueue::new();
        self.graph.handle_link_up(dpid_a, port_a, dpid_b, port_b, cost, &mut queue);
        self.drain(queue)
    }

    /// Handles a link-discovery "link down" event and reconciles flow rules to a fixed point.
    pub fn handle_link_down(&mut self, dpid_a: Dpid, dpid_b: Dpid) -> Result<(), Error> {
        let mut queue = NotificationQueue::new();
        self.graph.handle_link_down(dpid_a, dpid_b, &mut queue)?;
        self.drain(queue)
    }

    /// Handles an IGMP message received on `(switch, port)` and reconciles to a fixed point.
    pub fn handle_igmp(&mut self, switch: Dpid, port: Port, message: IgmpMessage) -> Result<(), Error> {
        let mut queue = NotificationQueue::new();
        match message {
            IgmpMessage::V2Report(group) => self.membership.apply_v2_report(group, switch, port, &mut queue),
            IgmpMessage::V2Leave(group) => self.membership.apply_v2_leave(group, switch, port, &mut queue),
            IgmpMessage::V3Report(records) => {
                self.membership.apply_v3_report(switch, port, &records, &mut queue)
            }
        }
        self.drain(queue)
    }

    /// Handles a multicast data packet `(dst=group, src=source)` arriving at `ingress`, and
    /// reconciles to a fixed point.
    pub fn handle_data_packet(&mut self, group: Ipv4Addr, source: Ipv4Addr, ingress: Dpid) -> Result<(), Error> {
        let mut queue = NotificationQueue::new();
        self.streamer.handle_data_packet(group, source, ingress, &self.membership, &mut queue);
        self.drain(queue)
    }

    /// Drains `queue` to a fixed point, dispatching each notification to whichever component
    /// reacts to it and appending any notification it raises in turn.
    ///
    /// `PassiveGroupChanged`/`PassiveGroupDeleted` are consumed by the streamer tracker, which may
    /// enqueue `ActiveGroup*`/`IncompleteGroupChanged` notifications of its own; every other
    /// notification is handed to the traffic manager to reconcile flow rules. A component error is
    /// logged and the corresponding `Result::Err` is still returned so callers and tests can act
    /// on it, but draining continues for the remaining queued notifications — a failure at one
    /// switch must not leave the rest of the reconciliation undone.
    fn drain(&mut self, mut queue: NotificationQueue) -> Result<(), Error> {
        let mut first_error: Option<Error> = None;
        while let Some(notification) = queue.pop_front() {
            debug!("dispatching notification: {:?}", notification);
            let result: Result<(), Error> = match &notification {
                Notification::PassiveGroupChanged(group) => {
                    self.streamer.handle_passive_group_changed(*group, &self.membership, &mut queue);
                    Ok(())
                }
                Notification::PassiveGroupDeleted(group) => {
                    self.streamer.handle_passive_group_deleted(*group, &mut queue);
                    Ok(())
                }
                _ => self
                    .traffic
                    .handle_notification(&notification, &self.graph, &self.streamer, &self.driver)
                    .map_err(Error::from),
            };
            if let Err(e) = result {
                warn!("reconciliation error while handling {:?}: {}", notification, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::membership::{GroupRecord, RecordType};
    use crate::traffic::{FlowCommand, FlowMod, SwitchError};
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

    // s1 -- s2 -- s3, h1 attached to s3:50.
    fn wired(ctrl: &mut Controller<RecordingDriver>) {
        ctrl.handle_link_up(d(1), p(1), d(2), p(1), None).unwrap();
        ctrl.handle_link_up(d(2), p(2), d(3), p(1), None).unwrap();
    }

    #[test]
    fn igmp_report_then_data_packet_installs_route() {
        let mut ctrl = Controller::new(RecordingDriver::default());
        wired(&mut ctrl);

        let g = ip(226, 0, 0, 1);
        let src = ip(10, 0, 0, 9);
        ctrl.handle_igmp(d(3), p(50), IgmpMessage::V2Report(g)).unwrap();
        ctrl.handle_data_packet(g, src, d(1)).unwrap();

        let sent = ctrl.driver.sent.borrow();
        assert!(sent.iter().any(|(dpid, fm)| *dpid == d(1) && fm.command == FlowCommand::Install { out_ports: vec![p(1)] }));
        assert!(sent.iter().any(|(dpid, fm)| *dpid == d(3) && fm.command == FlowCommand::Install { out_ports: vec![p(50)] }));
    }

    #[test]
    fn data_packet_before_membership_is_blocked_then_unblocked() {
        let mut ctrl = Controller::new(RecordingDriver::default());
        wired(&mut ctrl);

        let g = ip(226, 0, 0, 2);
        let src = ip(10, 0, 0, 9);
        ctrl.handle_data_packet(g, src, d(1)).unwrap();
        assert!(ctrl.driver.sent.borrow().iter().any(|(dpid, fm)| *dpid == d(1) && fm.command == FlowCommand::Drop));

        ctrl.handle_igmp(
            d(3),
            p(50),
            IgmpMessage::V3Report(vec![GroupRecord::new(RecordType::ModeIsInclude, g, hashset![src])]),
        )
        .unwrap();

        let sent = ctrl.driver.sent.borrow();
        assert!(sent.iter().any(|(dpid, fm)| *dpid == d(1) && fm.command == FlowCommand::Delete));
        assert!(sent.iter().any(|(dpid, fm)| *dpid == d(1) && fm.command == FlowCommand::Install { out_ports: vec![p(1)] }));
    }

    #[test]
    fn link_down_on_unknown_link_is_an_error() {
        let mut ctrl = Controller::new(RecordingDriver::default());
        assert!(ctrl.handle_link_down(d(1), d(2)).is_err());
    }
}
