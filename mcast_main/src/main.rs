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

//! Demonstration binary for the IP multicast controller core.
//!
//! Wires up the five-switch, eight-host topology described by the crate's test harness, then
//! drives one or all of the worked end-to-end scenarios through it, logging every flow-mod the
//! traffic manager issues to a [`driver::LoggingDriver`]. Verbosity is controlled by `RUST_LOG`,
//! the only configuration this binary reads from the environment.

mod driver;
mod frames;
mod scenarios;
mod topology;

use clap::Parser;

/// Runs one or more of the worked multicast-distribution scenarios against an in-process
/// controller, logging the flow-mods it would install on real switches.
#[derive(Parser, Debug)]
#[clap(name = "mcast_main", author = "Tibor Schneider")]
struct Cli {
    /// Which scenario to run (1-6). Omit to run all six in order.
    #[clap(short = 's', long)]
    scenario: Option<u8>,
}

fn main() {
    pretty_env_logger::init();
    let args = Cli::parse();

    match args.scenario {
        None => scenarios::run_all(),
        Some(1) => scenarios::scenario_1(),
        Some(2) => scenarios::scenario_2(),
        Some(3) => scenarios::scenario_3(),
        Some(4) => scenarios::scenario_4(),
        Some(5) => scenarios::scenario_5(),
        Some(6) => scenarios::scenario_6(),
        Some(other) => eprintln!("no such scenario: {} (expected 1-6)", other),
    }
}
