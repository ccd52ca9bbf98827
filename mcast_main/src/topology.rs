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

//! The eight-host, five-switch demonstration topology used by every scenario this binary can run.
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
//! Switch ports are allocated in link-declaration order: each switch's host-facing ports are
//! numbered first, then its switch-facing ports, in the order those links are wired up below.

use mcast_core::types::{Dpid, Ipv4Addr, Port};

/// Switch DPIDs, `s9`..`s13`.
pub const S9: Dpid = Dpid(9);
pub const S10: Dpid = Dpid(10);
pub const S11: Dpid = Dpid(11);
pub const S12: Dpid = Dpid(12);
pub const S13: Dpid = Dpid(13);

/// Returns `10.0.0.n`, the address of host `hn`.
pub fn host_ip(n: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, n)
}

/// Returns `00:00:00:00:00:0n`, the MAC address of host `hn`.
pub fn host_mac(n: u8) -> [u8; 6] {
    [0, 0, 0, 0, 0, n]
}

/// Returns the `(switch, port)` host `hn` is wired to.
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
        other => panic!("topology has no host h{}", other),
    }
}

/// Wires up the four inter-switch links of the demonstration topology on `ctrl`, in
/// link-declaration order.
pub fn wire_links<D: mcast_core::traffic::SwitchDriver>(ctrl: &mut mcast_core::controller::Controller<D>) {
    ctrl.handle_link_up(S9, Port(3), S10, Port(1), None).expect("s9-s10 link up");
    ctrl.handle_link_up(S9, Port(4), S12, Port(1), None).expect("s9-s12 link up");
    ctrl.handle_link_up(S10, Port(3), S11, Port(1), None).expect("s10-s11 link up");
    ctrl.handle_link_up(S12, Port(3), S13, Port(1), None).expect("s12-s13 link up");
}
