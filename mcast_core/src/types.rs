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

//! Module containing all primitive type definitions shared by the four state engines.

use std::fmt;

/// Datapath identifier, unique per switch. Opaque to this crate; assigned by link discovery.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct Dpid(pub u64);

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for Dpid {
    fn from(raw: u64) -> Self {
        Dpid(raw)
    }
}

/// Switch-local port number. Only meaningful together with the `Dpid` of the switch it belongs to.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct Port(pub u16);

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Port {
    fn from(raw: u16) -> Self {
        Port(raw)
    }
}

/// A 32-bit IPv4 address. This crate only ever stores and compares addresses; it never performs
/// name resolution or subnetting beyond the multicast-range check below.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct Ipv4Addr(pub u32);

impl Ipv4Addr {
    /// Builds an address from four octets, in the usual dotted-quad order.
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Addr(((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | (d as u32))
    }

    /// Returns true if this address lies in 224.0.0.0/4 (the multicast range).
    pub fn is_multicast(&self) -> bool {
        (self.0 >> 28) == 0b1110
    }
}

impl fmt::Display for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            (self.0 >> 24) & 0xff,
            (self.0 >> 16) & 0xff,
            (self.0 >> 8) & 0xff,
            self.0 & 0xff
        )
    }
}

/// A `(group, source)` pair, the key of every active and incomplete group.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct GroupKey {
    /// Multicast group address.
    pub group: Ipv4Addr,
    /// Source address the receivers are filtering on.
    pub source: Ipv4Addr,
}

impl GroupKey {
    /// Builds a new group key.
    pub fn new(group: Ipv4Addr, source: Ipv4Addr) -> Self {
        GroupKey { group, source }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(group={}, source={})", self.group, self.source)
    }
}

/// Link cost used by [`crate::graph::GraphBuilder`]. Plain `u32`; fractional weights are never
/// needed.
pub type LinkCost = u32;

/// Default link cost assigned to a link when discovery does not carry an explicit one.
pub const DEFAULT_LINK_COST: LinkCost = 1;

/// IGMPv3 filter mode of a single `(group, switch, port)` membership record.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum FilterMode {
    /// Receive only from the listed sources.
    Include,
    /// Receive from all sources except the listed ones.
    Exclude,
}
