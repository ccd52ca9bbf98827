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

//! Shared 5-switch, 8-host test topology used by the end-to-end scenario tests.
//!
//! ```text
//!                   h3
//!                   /
//!    h1 -       --s10--     -- h4
//!        \     /      \   /
//!         \   /        \ /
//!    h2 -- s9          s11--- h5
//!           \
//!            \
//!             s12 ----s13
//!             /       / \
//!            h6      h7  h8
//! ```
//!
//! Switch DPIDs are s9..s13; host addresses are 10.0.0.1..10.0.0.8 for h1..h8. Ports are
//! allocated per switch in link-declaration order, starting at 1.

use crate::event::NotificationQueue;
use crate::graph::GraphBuilder;
use crate::traffic::{FlowMod, SwitchDriver, SwitchError};
use crate::types::{Dpid, Ipv4Addr, Port};
use std::cell::RefCell;
use std::collections::HashMap;

pub const S9: Dpid = Dpid(9);
pub const S10: Dpid = Dpid(10);
pub const S11: Dpid = Dpid(11);
pub const S12: Dpid = Dpid(12);
pub const S13: Dpid = Dpid(13);

/// Returns `10.0.0.n` for host `hn`.
pub fn host_ip(n: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, n)
}

/// `(switch, port)` each host is wired to.
pub fn host_attachment(n: u8) -> (Dpid, Port) {
    match n {
        1 => (S9, Port(1)),
        2 => (S9, Port(2)),
        3 => (S10, Port(2)),
        4 => (S11, Port(2)),
        5 => (S11, Port(3)),
        6 => (S12, Port(2)),
        7 => (S13, Port(2)),
        8 => (S13, Port(3)),
        other => panic!("no such host: h{}", other),
    }
}

/// Builds the switch/link topology, wired up in the same order the links are declared below.
pub fn topology() -> GraphBuilder {
    let mut g = GraphBuilder::new();
    let mut q = NotificationQueue::new();
    g.handle_link_up(S9, Port(3), S10, Port(1), None, &mut q);
    g.handle_link_up(S9, Port(4), S12, Port(1), None, &mut q);
    g.handle_link_up(S10, Port(3), S11, Port(1), None, &mut q);
    g.handle_link_up(S12, Port(3), S13, Port(1), None, &mut q);
    g
}

/// Builds a `switch -> host ports` map for a set of host numbers, as
/// [`GraphBuilder::construct_routes`] expects it.
pub fn members(hosts: &[u8]) -> HashMap<Dpid, std::collections::HashSet<Port>> {
    let mut out: HashMap<Dpid, std::collections::HashSet<Port>> = HashMap::new();
    for &h in hosts {
        let (dpid, port) = host_attachment(h);
        out.entry(dpid).or_default().insert(port);
    }
    out
}

/// An in-memory [`SwitchDriver`] that records every flow-mod it is asked to install, for
/// assertions in scenario tests. Never fails.
#[derive(Default)]
pub struct RecordingDriver {
    pub sent: RefCell<Vec<(Dpid, FlowMod)>>,
}

impl SwitchDriver for RecordingDriver {
    fn send_flow_mod(&self, dpid: Dpid, flow_mod: &FlowMod) -> Result<(), SwitchError> {
        self.sent.borrow_mut().push((dpid, flow_mod.clone()));
        Ok(())
    }
}

impl RecordingDriver {
    /// Returns the most recently sent flow-mod for `dpid`, if any.
    pub fn last_for(&self, dpid: Dpid) -> Option<FlowMod> {
        self.sent.borrow().iter().rev().find(|(d, _)| *d == dpid).map(|(_, fm)| fm.clone())
    }
}
