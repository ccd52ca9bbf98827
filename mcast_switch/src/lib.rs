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

//! # Switch-facing support for the multicast controller
//!
//! `mcast_core` models link events, IGMP reports and data packets as plain structured values; it
//! never touches a byte buffer. This crate is the adjunct that produces those values from what a
//! switch's packet-in channel actually hands over: raw Ethernet frames. See [`wire`].

#![deny(missing_docs)]

pub mod wire;
