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

//! A [`SwitchDriver`] that only logs, since the OpenFlow transport is out of scope for this
//! binary: a real deployment swaps this for whatever speaks OpenFlow to its switches.

use log::*;
use mcast_core::traffic::{FlowCommand, FlowMod, SwitchDriver, SwitchError};
use mcast_core::types::Dpid;

/// Logs every flow-mod it receives at `info` level and always reports success.
#[derive(Debug, Default)]
pub struct LoggingDriver;

impl SwitchDriver for LoggingDriver {
    fn send_flow_mod(&self, dpid: Dpid, flow_mod: &FlowMod) -> Result<(), SwitchError> {
        match &flow_mod.command {
            FlowCommand::Install { out_ports } => info!(
                "switch {}: install priority={} match=(dst={}, src={}) actions=output{:?}",
                dpid, flow_mod.priority, flow_mod.m.nw_dst, flow_mod.m.nw_src, out_ports
            ),
            FlowCommand::Drop => info!(
                "switch {}: install priority={} match=(dst={}, src={}) actions=drop",
                dpid, flow_mod.priority, flow_mod.m.nw_dst, flow_mod.m.nw_src
            ),
            FlowCommand::Delete => info!(
                "switch {}: delete priority={} match=(dst={}, src={})",
                dpid, flow_mod.priority, flow_mod.m.nw_dst, flow_mod.m.nw_src
            ),
        }
        Ok(())
    }
}
