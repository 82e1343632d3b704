//! Module for parsing and representing Ring-Star instances.
//!
//! This module handles the TSPLIB coordinate files the instances are distributed in.
//! Only the header lines and the `NODE_COORD_SECTION` are read; every other section is skipped.

use crate::distance::{DistanceMatrix, Metric};
use crate::error::{RspError, RspResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use serde::{Deserialize, Serialize};

/// Represents a node in the instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier as written in the file (1-indexed in TSPLIB)
    pub id: usize,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Node {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Node { id, x, y }
    }

    #[inline]
    pub fn coords(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// A complete Ring-Star instance: nodes plus their distance matrix.
///
/// Nodes are addressed by their position in `nodes` everywhere in the crate;
/// `Node::id` is only kept for reporting.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Name of the instance
    pub name: String,
    /// Comment/description
    pub comment: String,
    /// Number of nodes
    pub dimension: usize,
    /// List of all nodes
    pub nodes: Vec<Node>,
    /// Metric the distance matrix was built with
    pub metric: Metric,
    /// `EDGE_WEIGHT_TYPE` declared in the file, if any
    pub edge_weight_type: Option<String>,
    distance_matrix: DistanceMatrix,
}

impl Instance {
    /// Build an instance from nodes already in memory.
    pub fn new(name: &str, nodes: Vec<Node>, metric: Metric) -> RspResult<Self> {
        let mut seen = std::collections::HashSet::with_capacity(nodes.len());
        if let Some(dup) = nodes.iter().find(|n| !seen.insert(n.id)) {
            return Err(RspError::invalid_instance(format!("duplicate node id {}", dup.id)));
        }

        let points: Vec<(f64, f64)> = nodes.iter().map(Node::coords).collect();
        let distance_matrix = DistanceMatrix::from_points(&points, metric)?;

        Ok(Instance {
            name: name.to_string(),
            comment: String::new(),
            dimension: nodes.len(),
            nodes,
            metric,
            edge_weight_type: None,
            distance_matrix,
        })
    }

    /// Build an instance from bare coordinates, numbering nodes from 1.
    pub fn from_coords(name: &str, coords: &[(f64, f64)]) -> RspResult<Self> {
        let nodes = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Node::new(i + 1, x, y))
            .collect();
        Self::new(name, nodes, Metric::Euclidean)
    }

    /// Parse an instance from a TSPLIB file using plain Euclidean distances
    pub fn from_file<P: AsRef<Path>>(path: P) -> RspResult<Self> {
        Self::from_file_with_metric(path, Metric::Euclidean)
    }

    pub fn from_file_with_metric<P: AsRef<Path>>(path: P, metric: Metric) -> RspResult<Self> {
        let file = File::open(&path)?;
        let mut instance = Self::from_reader(BufReader::new(file), metric)?;
        if instance.name.is_empty() {
            instance.name = path
                .as_ref()
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(instance)
    }

    /// Parse a TSPLIB file with the metric its `EDGE_WEIGHT_TYPE` declares,
    /// falling back to plain Euclidean for missing or unsupported types.
    pub fn from_file_with_declared_metric<P: AsRef<Path>>(path: P) -> RspResult<Self> {
        let instance = Self::from_file(path)?;
        match instance.declared_metric() {
            Some(metric) => instance.with_metric(metric),
            None => {
                log::debug!(
                    "{}: no supported EDGE_WEIGHT_TYPE ({:?}), using Euclidean distances",
                    instance.name,
                    instance.edge_weight_type
                );
                Ok(instance)
            }
        }
    }

    /// Metric matching the file's `EDGE_WEIGHT_TYPE`, if it names a supported one
    pub fn declared_metric(&self) -> Option<Metric> {
        self.edge_weight_type.as_deref().and_then(Metric::from_tsplib)
    }

    /// Rebuild the distance matrix under another metric
    pub fn with_metric(mut self, metric: Metric) -> RspResult<Self> {
        if metric != self.metric {
            let points: Vec<(f64, f64)> = self.nodes.iter().map(Node::coords).collect();
            self.distance_matrix = DistanceMatrix::from_points(&points, metric)?;
            self.metric = metric;
        }
        Ok(self)
    }

    /// Load with a fixed metric, or with the declared one when `metric` is `None`
    pub fn load<P: AsRef<Path>>(path: P, metric: Option<Metric>) -> RspResult<Self> {
        match metric {
            Some(metric) => Self::from_file_with_metric(path, metric),
            None => Self::from_file_with_declared_metric(path),
        }
    }

    /// Parse TSPLIB content from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R, metric: Metric) -> RspResult<Self> {
        let mut name = String::new();
        let mut comment = String::new();
        let mut dimension: Option<usize> = None;
        let mut edge_weight_type = None;
        let mut nodes: Vec<Node> = Vec::new();
        let mut in_coords = false;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }
            if line == "EOF" {
                break;
            }

            if let Some((key, value)) = line.split_once(':') {
                let value = value.trim();
                match key.trim() {
                    "NAME" => name = value.to_string(),
                    "COMMENT" => comment = value.to_string(),
                    "DIMENSION" => {
                        let d = value
                            .parse()
                            .map_err(|_| RspError::invalid_instance(format!("invalid dimension '{}'", value)))?;
                        dimension = Some(d);
                    }
                    "EDGE_WEIGHT_TYPE" => edge_weight_type = Some(value.to_string()),
                    "NODE_COORD_SECTION" => in_coords = true,
                    _ => in_coords = false,
                }
                continue;
            }

            if line.ends_with("_SECTION") {
                in_coords = line == "NODE_COORD_SECTION";
                continue;
            }

            if in_coords {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 3 {
                    return Err(RspError::invalid_instance(format!("malformed coordinate line '{}'", line)));
                }
                let id: usize = parts[0].parse()
                    .map_err(|_| RspError::invalid_instance(format!("invalid node id '{}'", parts[0])))?;
                let x: f64 = parts[1].parse()
                    .map_err(|_| RspError::invalid_instance(format!("invalid x coordinate '{}'", parts[1])))?;
                let y: f64 = parts[2].parse()
                    .map_err(|_| RspError::invalid_instance(format!("invalid y coordinate '{}'", parts[2])))?;
                nodes.push(Node::new(id, x, y));
            }
        }

        if let Some(d) = dimension {
            if d != nodes.len() {
                return Err(RspError::invalid_instance(format!(
                    "DIMENSION is {} but {} coordinates were read",
                    d,
                    nodes.len()
                )));
            }
        }

        let mut instance = Self::new(&name, nodes, metric)?;
        instance.comment = comment;
        instance.edge_weight_type = edge_weight_type;
        Ok(instance)
    }

    /// Get the distance between two nodes
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distance_matrix.get(i, j)
    }

    pub fn distance_matrix(&self) -> &DistanceMatrix {
        &self.distance_matrix
    }

    /// Length of the closed cycle through `ring` (closing edge included).
    pub fn ring_length(&self, ring: &[usize]) -> f64 {
        if ring.len() < 2 {
            return 0.0;
        }

        let mut length = 0.0;
        for i in 0..ring.len() - 1 {
            length += self.distance(ring[i], ring[i + 1]);
        }

        length += self.distance(ring[ring.len() - 1], ring[0]);

        length
    }

    /// Closest member of `hubs` to `node`, ties broken by the lower index.
    pub fn nearest_of(&self, node: usize, hubs: &[usize]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for &h in hubs {
            let d = self.distance(node, h);
            match best {
                Some((bh, bd)) if d > bd || (d == bd && h > bh) => {}
                _ => best = Some((h, d)),
            }
        }
        best.map(|(h, _)| h)
    }

    /// Node minimizing the total distance to every other node.
    pub fn medoid(&self) -> usize {
        (0..self.dimension)
            .map(|i| (i, self.distance_matrix.row(i).iter().sum::<f64>()))
            .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
            .0
    }

    /// Bounding box as (min_x, max_x, min_y, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.nodes.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(min_x, max_x, min_y, max_y), n| (min_x.min(n.x), max_x.max(n.x), min_y.min(n.y), max_y.max(n.y)),
        )
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let mut distances: Vec<f64> = Vec::new();
        for i in 0..self.dimension {
            for j in i+1..self.dimension {
                distances.push(self.distance(i, j));
            }
        }
        let avg_distance = distances.iter().sum::<f64>() / distances.len() as f64;
        let max_distance = self.distance_matrix.max();

        let avg_nearest_distance = (0..self.dimension)
            .map(|i| {
                (0..self.dimension)
                    .filter(|&j| j != i)
                    .map(|j| self.distance(i, j))
                    .fold(f64::INFINITY, f64::min)
            })
            .sum::<f64>() / self.dimension as f64;

        let (min_x, max_x, min_y, max_y) = self.bounds();

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.dimension,
            metric: self.metric,
            width: max_x - min_x,
            height: max_y - min_y,
            avg_distance,
            max_distance,
            avg_nearest_distance,
        }
    }
}

/// Statistics about an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub width: f64,
    pub height: f64,
    pub avg_distance: f64,
    pub max_distance: f64,
    pub avg_nearest_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Nodes: {}", self.dimension)?;
        writeln!(f, "  Metric: {:?}", self.metric)?;
        writeln!(f, "  Extent: {:.2} x {:.2}", self.width, self.height)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)?;
        writeln!(f, "  Avg nearest-neighbour distance: {:.2}", self.avg_nearest_distance)
    }
}
