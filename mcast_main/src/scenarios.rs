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

//! The six worked end-to-end scenarios, run against a live [`Controller`] over the demonstration
//! topology, each driven entirely through raw frames decoded by [`mcast_switch::wire`].

use crate::driver::LoggingDriver;
use crate::{frames, topology};
use log::*;
use mcast_core::controller::Controller;
use mcast_core::membership::RecordType;
use mcast_core::types::Ipv4Addr;
use mcast_switch::wire::{decode_igmp, decode_ipv4_frame, IGMP_PROTOCOL};

fn new_controller() -> Controller<LoggingDriver> {
    let mut ctrl = Controller::new(LoggingDriver);
    topology::wire_links(&mut ctrl);
    ctrl
}

/// Feeds a raw frame arriving at `(switch, port)` through the wire decoder and into `ctrl`,
/// exactly the way a packet-in event from a switch driver would.
fn packet_in(ctrl: &mut Controller<LoggingDriver>, switch: mcast_core::types::Dpid, port: mcast_core::types::Port, frame: &[u8]) {
    let packet = match decode_ipv4_frame(frame) {
        Ok(p) => p,
        Err(e) => {
            warn!("dropping undecodable frame at {}:{}: {}", switch, port, e);
            return;
        }
    };
    if packet.protocol == IGMP_PROTOCOL {
        match decode_igmp(&packet) {
            Ok(msg) => {
                ctrl.handle_igmp(switch, port, msg).ok();
            }
            Err(e) => warn!("dropping undecodable igmp message at {}:{}: {}", switch, port, e),
        }
    } else if packet.dst.is_multicast() {
        ctrl.handle_data_packet(packet.dst, packet.src, switch).ok();
    }
}

/// Scenario 1: a single receiver joins via IGMPv2, then the streamer starts sending.
pub fn scenario_1() {
    info!("=== scenario 1: single IGMPv2 receiver ===");
    let mut ctrl = new_controller();
    let group = Ipv4Addr::new(226, 0, 0, 1);

    let (h3_switch, h3_port) = topology::host_attachment(3);
    packet_in(&mut ctrl, h3_switch, h3_port, &frames::igmpv2_report(topology::host_mac(3), topology::host_ip(3), group));

    let (h1_switch, h1_port) = topology::host_attachment(1);
    packet_in(&mut ctrl, h1_switch, h1_port, &frames::multicast_data(topology::host_mac(1), topology::host_ip(1), group));
}

/// Scenario 2: continuing from (1), a second receiver on a different branch joins.
pub fn scenario_2() {
    info!("=== scenario 2: second receiver on a different branch ===");
    let mut ctrl = new_controller();
    let group = Ipv4Addr::new(226, 0, 0, 1);

    let (h3_switch, h3_port) = topology::host_attachment(3);
    packet_in(&mut ctrl, h3_switch, h3_port, &frames::igmpv2_report(topology::host_mac(3), topology::host_ip(3), group));
    let (h1_switch, h1_port) = topology::host_attachment(1);
    packet_in(&mut ctrl, h1_switch, h1_port, &frames::multicast_data(topology::host_mac(1), topology::host_ip(1), group));

    let (h5_switch, h5_port) = topology::host_attachment(5);
    packet_in(&mut ctrl, h5_switch, h5_port, &frames::igmpv2_report(topology::host_mac(5), topology::host_ip(5), group));
}

/// Scenario 3: continuing from (2), the link between s10 and s11 goes down.
pub fn scenario_3() {
    info!("=== scenario 3: link failure drops an unreachable receiver ===");
    let mut ctrl = new_controller();
    let group = Ipv4Addr::new(226, 0, 0, 1);

    let (h3_switch, h3_port) = topology::host_attachment(3);
    packet_in(&mut ctrl, h3_switch, h3_port, &frames::igmpv2_report(topology::host_mac(3), topology::host_ip(3), group));
    let (h1_switch, h1_port) = topology::host_attachment(1);
    packet_in(&mut ctrl, h1_switch, h1_port, &frames::multicast_data(topology::host_mac(1), topology::host_ip(1), group));
    let (h5_switch, h5_port) = topology::host_attachment(5);
    packet_in(&mut ctrl, h5_switch, h5_port, &frames::igmpv2_report(topology::host_mac(5), topology::host_ip(5), group));

    info!("link s10 <-> s11 goes down");
    ctrl.handle_link_down(topology::S10, topology::S11).expect("link was up");
}

/// Scenario 4: a streamer with no receivers is blocked, then unblocked once a receiver reports.
pub fn scenario_4() {
    info!("=== scenario 4: incomplete group blocked then unblocked ===");
    let mut ctrl = new_controller();
    let group = Ipv4Addr::new(226, 0, 0, 2);

    let (h1_switch, h1_port) = topology::host_attachment(1);
    packet_in(&mut ctrl, h1_switch, h1_port, &frames::multicast_data(topology::host_mac(1), topology::host_ip(1), group));

    let (h7_switch, h7_port) = topology::host_attachment(7);
    packet_in(&mut ctrl, h7_switch, h7_port, &frames::igmpv2_report(topology::host_mac(7), topology::host_ip(7), group));
}

/// Scenario 5: IGMPv3 INCLUDE filtering keeps two streamers to the same group isolated.
pub fn scenario_5() {
    info!("=== scenario 5: IGMPv3 INCLUDE mode isolates per-source active groups ===");
    let mut ctrl = new_controller();
    let group = Ipv4Addr::new(226, 0, 0, 3);

    let (h4_switch, h4_port) = topology::host_attachment(4);
    packet_in(
        &mut ctrl,
        h4_switch,
        h4_port,
        &frames::igmpv3_report(topology::host_mac(4), topology::host_ip(4), RecordType::ModeIsInclude, group, &[topology::host_ip(1)]),
    );

    let (h1_switch, h1_port) = topology::host_attachment(1);
    packet_in(&mut ctrl, h1_switch, h1_port, &frames::multicast_data(topology::host_mac(1), topology::host_ip(1), group));

    let (h2_switch, h2_port) = topology::host_attachment(2);
    packet_in(&mut ctrl, h2_switch, h2_port, &frames::multicast_data(topology::host_mac(2), topology::host_ip(2), group));
}

/// Scenario 6: continuing from (5), `ALLOW_NEW_SOURCES` transitions the second streamer from
/// incomplete to active, with UNBLOCK observed strictly before the forwarding rule.
pub fn scenario_6() {
    info!("=== scenario 6: ALLOW_NEW_SOURCES unblocks an incomplete group ===");
    let mut ctrl = new_controller();
    let group = Ipv4Addr::new(226, 0, 0, 3);

    let (h4_switch, h4_port) = topology::host_attachment(4);
    packet_in(
        &mut ctrl,
        h4_switch,
        h4_port,
        &frames::igmpv3_report(topology::host_mac(4), topology::host_ip(4), RecordType::ModeIsInclude, group, &[topology::host_ip(1)]),
    );
    let (h1_switch, h1_port) = topology::host_attachment(1);
    packet_in(&mut ctrl, h1_switch, h1_port, &frames::multicast_data(topology::host_mac(1), topology::host_ip(1), group));
    let (h2_switch, h2_port) = topology::host_attachment(2);
    packet_in(&mut ctrl, h2_switch, h2_port, &frames::multicast_data(topology::host_mac(2), topology::host_ip(2), group));

    info!("h4 sends ALLOW_NEW_SOURCES {{10.0.0.2}}");
    packet_in(
        &mut ctrl,
        h4_switch,
        h4_port,
        &frames::igmpv3_report(topology::host_mac(4), topology::host_ip(4), RecordType::AllowNewSources, group, &[topology::host_ip(2)]),
    );
}

/// Runs every scenario in order, 1 through 6.
pub fn run_all() {
    scenario_1();
    scenario_2();
    scenario_3();
    scenario_4();
    scenario_5();
    scenario_6();
}
