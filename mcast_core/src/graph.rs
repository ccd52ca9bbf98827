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

//! # Topology graph builder
//!
//! Maintains the switch/link graph discovered by the link-discovery collaborator, and computes
//! the minimum-cost spanning sub-tree rooted at a streamer that reaches a requested set of
//! receiver switches.

use crate::event::{Notification, NotificationQueue};
use crate::types::{Dpid, LinkCost, Port, DEFAULT_LINK_COST};
use log::*;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised while mutating or querying the topology graph.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum GraphError {
    /// `handle_link_down` was called for a link that is not currently in the graph.
    #[error("link {0} -> {1} does not exist, cannot remove it")]
    LinkNotFound(Dpid, Dpid),
}

/// The minimum-cost spanning sub-tree computed by [`GraphBuilder::min_cost_tree`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanningTree {
    /// Directed edges of the tree, in the order they were added by the Prim-style expansion.
    pub edges: Vec<(Dpid, Dpid)>,
    /// Receivers (and possibly the root) that were actually reached by the tree.
    pub reached: HashSet<Dpid>,
    /// Requested receivers that could not be reached from the root in the current topology.
    pub unreachable: HashSet<Dpid>,
}

/// Maintains the discovered switch/link topology and computes minimum-cost trees over it.
///
/// The graph is represented exactly as described by the data model: a node set, an adjacency
/// list, and two maps keyed by ordered `(Dpid, Dpid)` pairs for cost and for the local/peer port
/// pair of each directed edge.
#[derive(Debug, Default, Clone)]
pub struct GraphBuilder {
    nodes: HashSet<Dpid>,
    adjacency: HashMap<Dpid, Vec<Dpid>>,
    costs: HashMap<(Dpid, Dpid), LinkCost>,
    ports: HashMap<(Dpid, Dpid), (Port, Port)>,
}

impl GraphBuilder {
    /// Creates an empty topology graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `dpid` is currently known to the topology.
    pub fn has_node(&self, dpid: Dpid) -> bool {
        self.nodes.contains(&dpid)
    }

    /// Returns the local port of `from` facing `to`, if such a directed edge exists.
    pub fn local_port(&self, from: Dpid, to: Dpid) -> Option<Port> {
        self.ports.get(&(from, to)).map(|(local, _)| *local)
    }

    fn add_node(&mut self, dpid: Dpid) {
        self.nodes.insert(dpid);
    }

    fn del_node_if_isolated(&mut self, dpid: Dpid) {
        let still_referenced = self.adjacency.values().any(|neighbours| neighbours.contains(&dpid))
            || self.adjacency.get(&dpid).map(|n| !n.is_empty()).unwrap_or(false);
        if !still_referenced {
            self.nodes.remove(&dpid);
            self.adjacency.remove(&dpid);
        }
    }

    fn add_edge(&mut self, from: Dpid, from_port: Port, to: Dpid, to_port: Port, cost: LinkCost) {
        let neighbours = self.adjacency.entry(from).or_insert_with(Vec::new);
        if !neighbours.contains(&to) {
            neighbours.push(to);
        }
        self.costs.insert((from, to), cost);
        self.ports.insert((from, to), (from_port, to_port));
    }

    fn del_edge(&mut self, from: Dpid, to: Dpid) -> bool {
        let removed = if let Some(neighbours) = self.adjacency.get_mut(&from) {
            if let Some(idx) = neighbours.iter().position(|&n| n == to) {
                neighbours.remove(idx);
                if neighbours.is_empty() {
                    self.adjacency.remove(&from);
                }
                true
            } else {
                false
            }
        } else {
            false
        };
        self.costs.remove(&(from, to));
        self.ports.remove(&(from, to));
        removed
    }

    /// Handles a link-up event for the directed pair `(dpid_a, port_a) -> (dpid_b, port_b)` and
    /// its reverse. `cost` defaults to [`DEFAULT_LINK_COST`] when discovery does not supply one.
    ///
    /// Emits exactly one [`Notification::TopologyChanged`].
    pub fn handle_link_up(
        &mut self,
        dpid_a: Dpid,
        port_a: Port,
        dpid_b: Dpid,
        port_b: Port,
        cost: Option<LinkCost>,
        queue: &mut NotificationQueue,
    ) {
        let cost = cost.unwrap_or(DEFAULT_LINK_COST);
        info!("link up: {}:{} <-> {}:{}", dpid_a, port_a, dpid_b, port_b);
        self.add_node(dpid_a);
        self.add_node(dpid_b);
        self.add_edge(dpid_a, port_a, dpid_b, port_b, cost);
        self.add_edge(dpid_b, port_b, dpid_a, port_a, cost);
        queue.push_back(Notification::TopologyChanged);
    }

    /// Handles a link-down event for the directed pair `(dpid_a, port_a) -> (dpid_b, port_b)` and
    /// its reverse. Removes either endpoint from the node set if no edge references it anymore.
    ///
    /// Emits exactly one [`Notification::TopologyChanged`].
    pub fn handle_link_down(
        &mut self,
        dpid_a: Dpid,
        dpid_b: Dpid,
        queue: &mut NotificationQueue,
    ) -> Result<(), GraphError> {
        info!("link down: {} <-> {}", dpid_a, dpid_b);
        let a_to_b = self.del_edge(dpid_a, dpid_b);
        let b_to_a = self.del_edge(dpid_b, dpid_a);
        if !a_to_b && !b_to_a {
            return Err(GraphError::LinkNotFound(dpid_a, dpid_b));
        }
        self.del_node_if_isolated(dpid_a);
        self.del_node_if_isolated(dpid_b);
        queue.push_back(Notification::TopologyChanged);
        Ok(())
    }

    /// Computes the minimum-cost spanning sub-tree rooted at `root` that reaches every DPID in
    /// `requested` that is presently known to the topology and reachable from `root`.
    ///
    /// Ties in edge selection break by the order nodes were first added to `visited`, then by
    /// ascending numeric `Dpid` of the candidate — a concrete, deterministic pick of the
    /// under-specified tie-break rule, so repeated recomputation over identical input never
    /// reorders the installed rules.
    pub fn min_cost_tree(&self, root: Dpid, requested: &HashSet<Dpid>) -> SpanningTree {
        let targets: HashSet<Dpid> =
            requested.iter().copied().filter(|d| self.nodes.contains(d)).collect();

        let mut visited: Vec<Dpid> = Vec::new();
        let mut visited_set: HashSet<Dpid> = HashSet::new();
        let mut reached: HashSet<Dpid> = HashSet::new();
        let mut predecessor: HashMap<Dpid, (Dpid, Dpid)> = HashMap::new();

        if self.nodes.contains(&root) {
            visited.push(root);
            visited_set.insert(root);
        }
        if targets.contains(&root) {
            reached.insert(root);
        }

        while reached.len() < targets.len() {
            let mut best: Option<(Dpid, Dpid, LinkCost)> = None;
            for &u in &visited {
                let mut candidates: Vec<Dpid> = self
                    .nodes
                    .iter()
                    .copied()
                    .filter(|v| !visited_set.contains(v) && self.costs.contains_key(&(u, *v)))
                    .collect();
                candidates.sort();
                for v in candidates {
                    let cost = self.costs[&(u, v)];
                    let replace = match best {
                        None => true,
                        Some((_, _, best_cost)) => cost < best_cost,
                    };
                    if replace {
                        best = Some((u, v, cost));
                    }
                }
            }

            match best {
                Some((u, v, _)) => {
                    predecessor.insert(v, (u, v));
                    visited.push(v);
                    visited_set.insert(v);
                    if targets.contains(&v) {
                        reached.insert(v);
                    }
                }
                None => break,
            }
        }

        let unreachable: HashSet<Dpid> = requested.difference(&reached).copied().collect();
        if !unreachable.is_empty() {
            warn!("receivers unreachable from streamer {}: {:?}", root, unreachable);
        }

        // Retain only the edges that lie on a root-to-receiver path, walking `predecessor`
        // backwards from every reached (non-root) receiver.
        let mut result_edges: Vec<(Dpid, Dpid)> = Vec::new();
        let mut seen: HashSet<(Dpid, Dpid)> = HashSet::new();
        let mut ordered_receivers: Vec<Dpid> = reached.iter().copied().filter(|r| *r != root).collect();
        ordered_receivers.sort();
        for receiver in ordered_receivers {
            let mut edge = match predecessor.get(&receiver) {
                Some(e) => *e,
                None => continue,
            };
            let mut path_edges = Vec::new();
            loop {
                path_edges.push(edge);
                if edge.0 == root {
                    break;
                }
                edge = match predecessor.get(&edge.0) {
                    Some(e) => *e,
                    None => break,
                };
            }
            for e in path_edges.into_iter().rev() {
                if seen.insert(e) {
                    result_edges.push(e);
                }
            }
        }

        SpanningTree { edges: result_edges, reached, unreachable }
    }

    /// Translates a spanning tree plus a per-switch set of host-facing member ports into the
    /// final `switch -> ordered output-port list` route.
    ///
    /// Host ports are only attached to switches that the tree actually reached (or the root
    /// itself): a member switch the tree could not reach must not appear in the installed route,
    /// per the reachability invariant. Tree-outgoing ports are always listed before host ports.
    pub fn construct_routes(
        &self,
        tree: &SpanningTree,
        root: Dpid,
        members: &HashMap<Dpid, HashSet<Port>>,
    ) -> HashMap<Dpid, Vec<Port>> {
        let mut route: HashMap<Dpid, Vec<Port>> = HashMap::new();

        for &(u, v) in &tree.edges {
            if let Some(local) = self.local_port(u, v) {
                let ports = route.entry(u).or_insert_with(Vec::new);
                if !ports.contains(&local) {
                    ports.push(local);
                }
            }
        }

        let mut eligible: Vec<Dpid> = tree.reached.iter().copied().collect();
        if !eligible.contains(&root) {
            eligible.push(root);
        }
        eligible.sort();

        for switch in eligible {
            if let Some(host_ports) = members.get(&switch) {
                let mut sorted_ports: Vec<Port> = host_ports.iter().copied().collect();
                sorted_ports.sort();
                let ports = route.entry(switch).or_insert_with(Vec::new);
                for p in sorted_ports {
                    if !ports.contains(&p) {
                        ports.push(p);
                    }
                }
            }
        }

        route.retain(|_, ports| !ports.is_empty());
        route
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use maplit::{hashmap, hashset};

    fn d(n: u64) -> Dpid {
        Dpid(n)
    }
    fn p(n: u16) -> Port {
        Port(n)
    }

    fn line_topology() -> GraphBuilder {
        // 1 -- 2 -- 3 -- 4
        let mut g = GraphBuilder::new();
        let mut q = NotificationQueue::new();
        g.handle_link_up(d(1), p(1), d(2), p(1), None, &mut q);
        g.handle_link_up(d(2), p(2), d(3), p(1), None, &mut q);
        g.handle_link_up(d(3), p(2), d(4), p(1), None, &mut q);
        g
    }

    #[test]
    fn link_up_adds_nodes_and_emits_notification() {
        let mut g = GraphBuilder::new();
        let mut q = NotificationQueue::new();
        g.handle_link_up(d(1), p(1), d(2), p(1), None, &mut q);
        assert!(g.has_node(d(1)));
        assert!(g.has_node(d(2)));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_front(), Some(Notification::TopologyChanged));
    }

    #[test]
    fn link_down_removes_isolated_node() {
        let mut g = GraphBuilder::new();
        let mut q = NotificationQueue::new();
        g.handle_link_up(d(1), p(1), d(2), p(1), None, &mut q);
        q.clear();
        g.handle_link_down(d(1), d(2), &mut q).unwrap();
        assert!(!g.has_node(d(1)));
        assert!(!g.has_node(d(2)));
        assert_eq!(q.pop_front(), Some(Notification::TopologyChanged));
    }

    #[test]
    fn link_down_missing_link_is_an_error() {
        let mut g = GraphBuilder::new();
        let mut q = NotificationQueue::new();
        assert_eq!(g.handle_link_down(d(1), d(2), &mut q), Err(GraphError::LinkNotFound(d(1), d(2))));
    }

    #[test]
    fn min_cost_tree_reaches_linear_receivers() {
        let g = line_topology();
        let tree = g.min_cost_tree(d(1), &hashset![d(3)]);
        assert_eq!(tree.edges, vec![(d(1), d(2)), (d(2), d(3))]);
        assert!(tree.unreachable.is_empty());
    }

    #[test]
    fn min_cost_tree_reports_unreachable_receivers() {
        let g = line_topology();
        let tree = g.min_cost_tree(d(1), &hashset![d(3), d(99)]);
        assert_eq!(tree.unreachable, hashset![d(99)]);
        assert_eq!(tree.edges, vec![(d(1), d(2)), (d(2), d(3))]);
    }

    #[test]
    fn construct_routes_orders_tree_ports_before_host_ports() {
        let g = line_topology();
        let tree = g.min_cost_tree(d(1), &hashset![d(3)]);
        let members = hashmap! { d(3) => hashset![p(50)] };
        let route = g.construct_routes(&tree, d(1), &members);
        assert_eq!(route.get(&d(1)), Some(&vec![p(1)]));
        assert_eq!(route.get(&d(2)), Some(&vec![p(2)]));
        assert_eq!(route.get(&d(3)), Some(&vec![p(50)]));
    }

    #[test]
    fn construct_routes_excludes_unreachable_member_switches() {
        let g = line_topology();
        let tree = g.min_cost_tree(d(1), &hashset![d(3)]);
        // d(99) is a member but was never reached by the tree and must not appear.
        let members = hashmap! { d(3) => hashset![p(50)], d(99) => hashset![p(1)] };
        let route = g.construct_routes(&tree, d(1), &members);
        assert!(!route.contains_key(&d(99)));
    }
}
