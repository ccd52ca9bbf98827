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

#![deny(missing_docs)]

//! # IP multicast controller core
//!
//! Four cooperating state engines realize IP multicast distribution across a set of OpenFlow
//! switches:
//!
//! - **[`graph`]**: maintains the discovered switch/link topology and computes minimum-cost trees
//!   over it.
//! - **[`membership`]**: interprets IGMPv2/v3 reports into a per-group, per-`(switch, port)` view
//!   of who wants to receive what.
//! - **[`streamer`]**: correlates observed data-plane traffic with membership to decide which
//!   `(group, source)` pairs are active, and which are incomplete (a streamer seen, no eligible
//!   receivers yet).
//! - **[`traffic`]**: turns the other three engines' state into OpenFlow flow-mods, and keeps a
//!   shadow of what is actually installed so repeated reconciliation never re-sends an unchanged
//!   rule.
//!
//! [`controller::Controller`] owns all four and is the entry point external event sources (link
//! discovery, the IGMP snooping agent, the data-plane packet-in channel) drive.
//!
//! ## Usage
//!
//! ```
//! use mcast_core::controller::Controller;
//! use mcast_core::membership::IgmpMessage;
//! use mcast_core::traffic::{FlowMod, SwitchDriver, SwitchError};
//! use mcast_core::types::{Dpid, Ipv4Addr, Port};
//!
//! struct LoggingDriver;
//! impl SwitchDriver for LoggingDriver {
//!     fn send_flow_mod(&self, dpid: Dpid, flow_mod: &FlowMod) -> Result<(), SwitchError> {
//!         println!("{}: {:?}", dpid, flow_mod);
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), mcast_core::Error> {
//! let mut controller = Controller::new(LoggingDriver);
//! controller.handle_link_up(Dpid(1), Port(1), Dpid(2), Port(1), None)?;
//! controller.handle_igmp(Dpid(2), Port(2), IgmpMessage::V2Report(Ipv4Addr::new(226, 0, 0, 1)))?;
//! controller.handle_data_packet(Ipv4Addr::new(226, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 1), Dpid(1))?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
mod error;
pub mod event;
pub mod graph;
pub mod membership;
pub mod streamer;
mod test;
pub mod traffic;
pub mod types;

pub use error::Error;
