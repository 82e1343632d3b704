//! Solution representation and manipulation for the Ring-Star Problem.
//!
//! A solution is a ring (cyclic order of hubs, closing edge implicit) plus an
//! assignment vector telling which hub serves every node. Hubs serve themselves.

use crate::instance::Instance;
use serde::{Deserialize, Serialize};

/// Represents a solution to the Ring-Star Problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Hubs in ring order; the ring closes from the last hub back to the first
    pub ring: Vec<usize>,
    /// `assignment[v]` is the hub serving node `v`
    pub assignment: Vec<usize>,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of iterations (if applicable)
    pub iterations: Option<usize>,
    /// Seed the randomized steps ran with (if any)
    pub seed: Option<u64>,
}

impl Solution {
    /// Create a solution from an explicit ring and assignment
    pub fn new(ring: Vec<usize>, assignment: Vec<usize>, algorithm: &str) -> Self {
        Solution {
            ring,
            assignment,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: None,
            seed: None,
        }
    }

    /// Create a solution from a ring, assigning every other node to its nearest hub
    pub fn from_ring(instance: &Instance, ring: Vec<usize>, algorithm: &str) -> Self {
        let assignment = nearest_assignment(instance, &ring);
        Self::new(ring, assignment, algorithm)
    }

    pub fn is_hub(&self, node: usize) -> bool {
        self.ring.contains(&node)
    }

    /// Non-hub nodes in ascending order
    pub fn non_hubs(&self) -> Vec<usize> {
        (0..self.assignment.len()).filter(|v| !self.is_hub(*v)).collect()
    }

    /// Get the position of a hub in the ring
    pub fn position(&self, hub: usize) -> Option<usize> {
        self.ring.iter().position(|&h| h == hub)
    }

    /// Reassign every node to its nearest hub
    pub fn reassign_nearest(&mut self, instance: &Instance) {
        self.assignment = nearest_assignment(instance, &self.ring);
    }

    /// Ring length change of reversing `ring[i+1..=j]`
    pub fn two_opt_delta(&self, instance: &Instance, i: usize, j: usize) -> f64 {
        let p = self.ring.len();
        if i >= j || j >= p || p < 4 {
            return 0.0;
        }

        let a = self.ring[i];
        let b = self.ring[i + 1];
        let c = self.ring[j];
        let d = self.ring[(j + 1) % p];
        instance.distance(a, c) + instance.distance(b, d)
            - instance.distance(a, b) - instance.distance(c, d)
    }

    /// Apply a 2-opt move (reverse segment between i+1 and j)
    pub fn apply_two_opt(&mut self, i: usize, j: usize) {
        self.ring[i + 1..=j].reverse();
    }

    /// Rotate and orient the ring so it starts at its smallest hub and
    /// continues towards the smaller of that hub's two neighbours.
    pub fn canonicalize(&mut self) {
        if self.ring.is_empty() {
            return;
        }
        let start = self
            .ring
            .iter()
            .enumerate()
            .min_by_key(|&(_, &h)| h)
            .map(|(pos, _)| pos)
            .unwrap_or(0);
        self.ring.rotate_left(start);
        let p = self.ring.len();
        if p > 2 && self.ring[p - 1] < self.ring[1] {
            self.ring[1..].reverse();
        }
    }
}

/// Assign every node to its nearest hub; hubs serve themselves.
pub fn nearest_assignment(instance: &Instance, ring: &[usize]) -> Vec<usize> {
    let mut is_hub = vec![false; instance.dimension];
    for &h in ring {
        if h < instance.dimension {
            is_hub[h] = true;
        }
    }
    (0..instance.dimension)
        .map(|v| {
            if is_hub[v] {
                v
            } else {
                instance.nearest_of(v, ring).unwrap_or(v)
            }
        })
        .collect()
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Hubs: {}", self.ring.len())?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Iterations: {}", iter)?;
        }
        if let Some(seed) = self.seed {
            writeln!(f, "  Seed: {}", seed)?;
        }
        writeln!(f, "  Ring: {:?}", self.ring)
    }
}

/// Represents a move in local search
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Move {
    /// Reverse the ring segment between positions i+1 and j
    TwoOpt(usize, usize),
    /// Replace the hub at ring position `pos` by `node`, which enters the ring at
    /// position `insert` of the ring with that hub removed (`None` keeps `pos`)
    HubSwap { pos: usize, node: usize, insert: Option<usize> },
}

impl Move {
    /// Apply the move to the ring. The caller is responsible for reassigning nodes.
    pub fn apply(&self, solution: &mut Solution) {
        match *self {
            Move::TwoOpt(i, j) => solution.apply_two_opt(i, j),
            Move::HubSwap { pos, node, insert: None } => solution.ring[pos] = node,
            Move::HubSwap { pos, node, insert: Some(at) } => {
                solution.ring.remove(pos);
                solution.ring.insert(at, node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Instance {
        Instance::from_coords("sq", &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (5.0, 5.0)]).unwrap()
    }

    #[test]
    fn test_from_ring_assigns_nearest() {
        let inst = square();
        let sol = Solution::from_ring(&inst, vec![0, 1, 2, 3], "test");
        assert_eq!(sol.assignment, vec![0, 1, 2, 3, 0]);
        assert_eq!(sol.non_hubs(), vec![4]);
        assert!(sol.is_hub(2));
        assert!(!sol.is_hub(4));
    }

    #[test]
    fn test_position() {
        let inst = square();
        let sol = Solution::from_ring(&inst, vec![2, 0, 3, 1], "test");
        assert_eq!(sol.position(2), Some(0));
        assert_eq!(sol.position(1), Some(3));
        assert_eq!(sol.position(4), None);
    }

    #[test]
    fn test_two_opt_delta_matches_full_recompute() {
        let inst = square();
        // crossing ring: 0 -> 2 -> 1 -> 3
        let mut sol = Solution::from_ring(&inst, vec![0, 2, 1, 3], "test");
        let before = inst.ring_length(&sol.ring);
        let delta = sol.two_opt_delta(&inst, 0, 2);
        assert!(delta < 0.0);
        sol.apply_two_opt(0, 2);
        let after = inst.ring_length(&sol.ring);
        assert!((after - before - delta).abs() < 1e-9);
        assert!((after - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_canonicalize() {
        let inst = square();
        let mut sol = Solution::from_ring(&inst, vec![2, 1, 0, 3], "test");
        sol.canonicalize();
        assert_eq!(sol.ring, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_hub_swap_move() {
        let inst = square();
        let mut sol = Solution::from_ring(&inst, vec![0, 1, 2, 3], "test");
        Move::HubSwap { pos: 2, node: 4, insert: None }.apply(&mut sol);
        assert_eq!(sol.ring, vec![0, 1, 4, 3]);
        Move::HubSwap { pos: 0, node: 2, insert: Some(2) }.apply(&mut sol);
        assert_eq!(sol.ring, vec![1, 4, 2, 3]);
    }
}
