//! Construction heuristics: hub selection followed by ring building.

use crate::instance::Instance;
use crate::params::Parameters;
use crate::solution::Solution;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub trait ConstructionHeuristic {
    fn construct(&self, instance: &Instance, params: &Parameters) -> Solution;
    fn name(&self) -> &str;
}

/// Rule used to pick the initial hub set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubSelection {
    /// Start at the depot (or medoid), repeatedly add the node farthest from the chosen set
    FarthestPoint,
    /// Node nearest to the centre of each cell of a grid over the bounding box
    Grid,
    /// Seeded uniform sample
    Random,
}

impl HubSelection {
    pub fn name(&self) -> &'static str {
        match self {
            HubSelection::FarthestPoint => "FarthestPoint",
            HubSelection::Grid => "Grid",
            HubSelection::Random => "Random",
        }
    }
}

/// Rule used to order the selected hubs into a ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingConstruction {
    #[default]
    NearestNeighbor,
    CheapestInsertion,
}

/// Farthest-point selection starting from `seeds` (or the medoid when empty).
fn extend_farthest(instance: &Instance, mut chosen: Vec<usize>, target: usize) -> Vec<usize> {
    let n = instance.dimension;
    if chosen.is_empty() {
        chosen.push(instance.medoid());
    }

    let mut is_chosen = vec![false; n];
    let mut min_dist = vec![f64::INFINITY; n];
    for &c in &chosen {
        is_chosen[c] = true;
        for v in 0..n {
            min_dist[v] = min_dist[v].min(instance.distance(v, c));
        }
    }

    while chosen.len() < target.min(n) {
        // max_by_key keeps the last maximum, so scan in reverse to prefer the lowest index
        let Some(next) = (0..n)
            .rev()
            .filter(|&v| !is_chosen[v])
            .max_by_key(|&v| OrderedFloat(min_dist[v]))
        else {
            break;
        };
        chosen.push(next);
        is_chosen[next] = true;
        for v in 0..n {
            min_dist[v] = min_dist[v].min(instance.distance(v, next));
        }
    }
    chosen
}

pub fn select_farthest_point(instance: &Instance, params: &Parameters) -> Vec<usize> {
    let seeds = params.depot.into_iter().collect();
    extend_farthest(instance, seeds, params.hubs)
}

/// Overlay a grid of ⌈√P⌉ columns on the bounding box and take the unchosen node
/// nearest each cell centre. Cells that yield nothing new are topped up by
/// farthest-point selection.
pub fn select_grid(instance: &Instance, params: &Parameters) -> Vec<usize> {
    let k = params.hubs;
    let n = instance.dimension;
    let cols = (k as f64).sqrt().ceil().max(1.0) as usize;
    let rows = (k + cols - 1) / cols;
    let (min_x, max_x, min_y, max_y) = instance.bounds();
    let cell_w = (max_x - min_x) / cols as f64;
    let cell_h = (max_y - min_y) / rows as f64;

    let mut chosen: Vec<usize> = params.depot.into_iter().collect();
    'cells: for r in 0..rows {
        for c in 0..cols {
            if chosen.len() >= k {
                break 'cells;
            }
            let cx = min_x + (c as f64 + 0.5) * cell_w;
            let cy = min_y + (r as f64 + 0.5) * cell_h;
            let nearest = (0..n)
                .filter(|v| !chosen.contains(v))
                .min_by_key(|&v| {
                    let node = &instance.nodes[v];
                    OrderedFloat((node.x - cx).powi(2) + (node.y - cy).powi(2))
                });
            if let Some(v) = nearest {
                chosen.push(v);
            }
        }
    }

    extend_farthest(instance, chosen, k)
}

pub fn select_random(instance: &Instance, params: &Parameters, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut chosen: Vec<usize> = params.depot.into_iter().collect();
    let pool: Vec<usize> = (0..instance.dimension).filter(|v| Some(*v) != params.depot).collect();
    let needed = params.hubs.saturating_sub(chosen.len());
    chosen.extend(pool.choose_multiple(rng, needed).copied());
    chosen
}

/// Ring starting at `hubs[0]`, always moving to the nearest unvisited hub
pub fn nearest_neighbor_ring(instance: &Instance, hubs: &[usize]) -> Vec<usize> {
    let Some(&first) = hubs.first() else {
        return Vec::new();
    };
    let mut remaining: Vec<usize> = hubs[1..].to_vec();
    let mut ring = vec![first];
    let mut current = first;

    while !remaining.is_empty() {
        let idx = (0..remaining.len())
            .min_by_key(|&i| (OrderedFloat(instance.distance(current, remaining[i])), remaining[i]))
            .unwrap_or(0);
        current = remaining.swap_remove(idx);
        ring.push(current);
    }
    ring
}

/// Position in `ring` at which inserting `node` adds the least length, and that increase.
pub fn cheapest_insertion_position(instance: &Instance, ring: &[usize], node: usize) -> (usize, f64) {
    let p = ring.len();
    if p == 0 {
        return (0, 0.0);
    }
    (0..p)
        .map(|k| {
            let a = ring[k];
            let b = ring[(k + 1) % p];
            let delta = instance.distance(a, node) + instance.distance(node, b) - instance.distance(a, b);
            (k + 1, delta)
        })
        .min_by_key(|&(_, delta)| OrderedFloat(delta))
        .unwrap_or((p, 0.0))
}

/// Ring built from `hubs[0]` and the hub farthest from it, inserting the
/// remaining hubs one at a time where they are cheapest
pub fn cheapest_insertion_ring(instance: &Instance, hubs: &[usize]) -> Vec<usize> {
    let Some(&first) = hubs.first() else {
        return Vec::new();
    };
    let mut remaining: Vec<usize> = hubs[1..].to_vec();
    let mut ring = vec![first];

    if let Some(idx) = (0..remaining.len()).max_by_key(|&i| OrderedFloat(instance.distance(first, remaining[i]))) {
        ring.push(remaining.swap_remove(idx));
    }

    while !remaining.is_empty() {
        let (idx, (pos, _)) = remaining
            .iter()
            .enumerate()
            .map(|(i, &h)| (i, cheapest_insertion_position(instance, &ring, h)))
            .min_by_key(|&(i, (_, delta))| (OrderedFloat(delta), remaining[i]))
            .unwrap_or((0, (ring.len(), 0.0)));
        let hub = remaining.swap_remove(idx);
        ring.insert(pos, hub);
    }
    ring
}

pub fn build_ring(instance: &Instance, hubs: &[usize], rule: RingConstruction) -> Vec<usize> {
    match rule {
        RingConstruction::NearestNeighbor => nearest_neighbor_ring(instance, hubs),
        RingConstruction::CheapestInsertion => cheapest_insertion_ring(instance, hubs),
    }
}

/// Select hubs, order them into a ring and assign the rest to their nearest hub
pub struct RingStarConstruction {
    pub selection: HubSelection,
    pub ring: RingConstruction,
    /// Seed for the random selection rule
    pub seed: u64,
    name: String,
}

impl RingStarConstruction {
    pub fn new(selection: HubSelection, ring: RingConstruction, seed: u64) -> Self {
        let name = match ring {
            RingConstruction::NearestNeighbor => format!("{}-NN", selection.name()),
            RingConstruction::CheapestInsertion => format!("{}-CI", selection.name()),
        };
        RingStarConstruction { selection, ring, seed, name }
    }

    pub fn select_hubs(&self, instance: &Instance, params: &Parameters) -> Vec<usize> {
        match self.selection {
            HubSelection::FarthestPoint => select_farthest_point(instance, params),
            HubSelection::Grid => select_grid(instance, params),
            HubSelection::Random => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                select_random(instance, params, &mut rng)
            }
        }
    }
}

impl Default for RingStarConstruction {
    fn default() -> Self {
        Self::new(HubSelection::FarthestPoint, RingConstruction::NearestNeighbor, 42)
    }
}

impl ConstructionHeuristic for RingStarConstruction {
    fn construct(&self, instance: &Instance, params: &Parameters) -> Solution {
        let start = std::time::Instant::now();
        let hubs = self.select_hubs(instance, params);
        let ring = build_ring(instance, &hubs, self.ring);
        let mut solution = Solution::from_ring(instance, ring, self.name());
        solution.computation_time = start.elapsed().as_secs_f64();
        solution
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Instance {
        Instance::from_coords("sq", &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (5.0, 5.0)]).unwrap()
    }

    fn grid9() -> Instance {
        let coords: Vec<(f64, f64)> = (0..9).map(|i| ((i % 3) as f64 * 10.0, (i / 3) as f64 * 10.0)).collect();
        Instance::from_coords("grid9", &coords).unwrap()
    }

    #[test]
    fn test_farthest_point_spreads_out() {
        let inst = square();
        let hubs = select_farthest_point(&inst, &Parameters::new(4, 0.5));
        // medoid is the centre; the corners follow
        assert_eq!(hubs[0], 4);
        let mut rest = hubs[1..].to_vec();
        rest.sort_unstable();
        assert_eq!(rest, vec![0, 1, 2]);
    }

    #[test]
    fn test_farthest_point_starts_at_depot() {
        let inst = square();
        let hubs = select_farthest_point(&inst, &Parameters::new(2, 0.5).with_depot(1));
        assert_eq!(hubs, vec![1, 3]);
    }

    #[test]
    fn test_grid_selection() {
        let inst = grid9();
        let hubs = select_grid(&inst, &Parameters::new(4, 0.5));
        assert_eq!(hubs.len(), 4);
        let mut sorted = hubs.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);

        let with_depot = select_grid(&inst, &Parameters::new(4, 0.5).with_depot(4));
        assert_eq!(with_depot[0], 4);
        assert_eq!(with_depot.len(), 4);
    }

    #[test]
    fn test_random_selection_is_seeded() {
        let inst = grid9();
        let params = Parameters::new(5, 0.5).with_depot(8);
        let a = select_random(&inst, &params, &mut ChaCha8Rng::seed_from_u64(7));
        let b = select_random(&inst, &params, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a[0], 8);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn test_ring_builders_keep_hubs() {
        let inst = grid9();
        let hubs = vec![0, 2, 8, 6, 4];
        for rule in [RingConstruction::NearestNeighbor, RingConstruction::CheapestInsertion] {
            let mut ring = build_ring(&inst, &hubs, rule);
            assert_eq!(ring[0], 0);
            ring.sort_unstable();
            assert_eq!(ring, vec![0, 2, 4, 6, 8]);
        }
    }

    #[test]
    fn test_cheapest_insertion_on_square() {
        let inst = square();
        let ring = cheapest_insertion_ring(&inst, &[0, 1, 2, 3]);
        assert!((inst.ring_length(&ring) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_construct_is_feasible() {
        let inst = grid9();
        let params = Parameters::new(4, 0.5);
        for selection in [HubSelection::FarthestPoint, HubSelection::Grid, HubSelection::Random] {
            let sol = RingStarConstruction::new(selection, RingConstruction::NearestNeighbor, 3).construct(&inst, &params);
            assert!(crate::evaluation::evaluate(&inst, &params, &sol).is_ok());
        }
    }
}
