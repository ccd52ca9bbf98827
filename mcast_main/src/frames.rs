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

//! Builds synthetic raw Ethernet frames so this demonstration binary can exercise the real
//! [`mcast_switch::wire`] decoder, rather than constructing [`IgmpMessage`](mcast_core::membership::IgmpMessage)
//! values by hand. A real deployment would receive these bytes from a switch's packet-in channel;
//! here they stand in for that channel.

use mcast_core::membership::RecordType;
use mcast_core::types::Ipv4Addr;
use mcast_switch::wire::{ETHERTYPE_IPV4, IGMP_PROTOCOL};

fn ipv4_frame(src_mac: [u8; 6], dst_mac: [u8; 6], protocol: u8, src: Ipv4Addr, dst: Ipv4Addr, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend(&dst_mac);
    frame.extend(&src_mac);
    frame.extend(&ETHERTYPE_IPV4.to_be_bytes());
    let total_len = 20 + body.len();
    let mut ip = vec![0u8; 20];
    ip[0] = 0x45;
    ip[2] = (total_len >> 8) as u8;
    ip[3] = total_len as u8;
    ip[8] = 1; // ttl
    ip[9] = protocol;
    ip[12..16].copy_from_slice(&octets(src));
    ip[16..20].copy_from_slice(&octets(dst));
    frame.extend(ip);
    frame.extend(body);
    frame
}

fn octets(addr: Ipv4Addr) -> [u8; 4] {
    addr.0.to_be_bytes()
}

fn record_type_byte(kind: RecordType) -> u8 {
    match kind {
        RecordType::ModeIsInclude => 1,
        RecordType::ModeIsExclude => 2,
        RecordType::ChangeToInclude => 3,
        RecordType::ChangeToExclude => 4,
        RecordType::AllowNewSources => 5,
        RecordType::BlockOldSources => 6,
    }
}

/// Builds the raw bytes of an IGMPv2 Membership Report for `group`, as if sent by `reporter_mac`.
pub fn igmpv2_report(reporter_mac: [u8; 6], reporter_ip: Ipv4Addr, group: Ipv4Addr) -> Vec<u8> {
    ipv4_frame(reporter_mac, [0x01, 0x00, 0x5e, 0, 0, 1], IGMP_PROTOCOL, reporter_ip, group, &[0x16])
}

/// Builds the raw bytes of an IGMPv2 Leave Group for `group`, as if sent by `reporter_mac`.
pub fn igmpv2_leave(reporter_mac: [u8; 6], reporter_ip: Ipv4Addr, group: Ipv4Addr) -> Vec<u8> {
    ipv4_frame(reporter_mac, [0x01, 0x00, 0x5e, 0, 0, 2], IGMP_PROTOCOL, reporter_ip, group, &[0x17])
}

/// Builds the raw bytes of an IGMPv3 Membership Report carrying one group record of `kind` for
/// `group`, listing `sources`, as if sent by `reporter_mac`.
pub fn igmpv3_report(
    reporter_mac: [u8; 6],
    reporter_ip: Ipv4Addr,
    kind: RecordType,
    group: Ipv4Addr,
    sources: &[Ipv4Addr],
) -> Vec<u8> {
    let mut body = vec![0x22, 0, 0, 0, 0, 0, 0, 1];
    body.push(record_type_byte(kind));
    body.push(0); // aux data len
    body.push(0);
    body.push(sources.len() as u8);
    body.extend(&octets(group));
    for s in sources {
        body.extend(&octets(*s));
    }
    ipv4_frame(reporter_mac, [0x01, 0x00, 0x5e, 0, 0, 22], IGMP_PROTOCOL, reporter_ip, group, &body)
}

/// Builds the raw bytes of a UDP multicast data packet from `source_mac`/`source_ip` to `group`,
/// the kind of frame a streamer injects into the network.
pub fn multicast_data(source_mac: [u8; 6], source_ip: Ipv4Addr, group: Ipv4Addr) -> Vec<u8> {
    const UDP_PROTOCOL: u8 = 17;
    ipv4_frame(source_mac, [0x01, 0x00, 0x5e, 0, 0, 99], UDP_PROTOCOL, source_ip, group, &[0u8; 8])
}
