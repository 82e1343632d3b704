//! Pairwise distance computation.

use crate::error::{RspError, RspResult};
use serde::{Deserialize, Serialize};

/// Distance function between two coordinate pairs
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Plain floating point Euclidean distance
    #[default]
    Euclidean,
    /// TSPLIB EUC_2D: Euclidean distance rounded to the nearest integer
    RoundedEuclidean,
    /// L1 distance
    Manhattan,
}

impl Metric {
    #[inline]
    pub fn between(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        let dx = a.0 - b.0;
        let dy = a.1 - b.1;
        match self {
            Metric::Euclidean => (dx * dx + dy * dy).sqrt(),
            Metric::RoundedEuclidean => (dx * dx + dy * dy).sqrt().round(),
            Metric::Manhattan => dx.abs() + dy.abs(),
        }
    }

    /// Map a TSPLIB `EDGE_WEIGHT_TYPE` value to a metric.
    pub fn from_tsplib(edge_weight_type: &str) -> Option<Self> {
        match edge_weight_type.trim() {
            "EUC_2D" => Some(Metric::RoundedEuclidean),
            "MAN_2D" => Some(Metric::Manhattan),
            _ => None,
        }
    }
}

/// Square, symmetric distance table with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    size: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// Compute all pairwise distances.
    ///
    /// Fails when fewer than two points are given or a coordinate is NaN or infinite.
    pub fn from_points(points: &[(f64, f64)], metric: Metric) -> RspResult<Self> {
        let n = points.len();
        if n < 2 {
            return Err(RspError::invalid_instance(format!(
                "at least 2 nodes are required, got {}",
                n
            )));
        }
        if let Some(pos) = points.iter().position(|&(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(RspError::invalid_instance(format!(
                "node at position {} has non-finite coordinates",
                pos
            )));
        }

        let mut data = vec![0.0; n * n];
        for i in 0..n {
            for j in i + 1..n {
                let d = metric.between(points[i], points[j]);
                data[i * n + j] = d;
                data[j * n + i] = d;
            }
        }

        Ok(DistanceMatrix { size: n, data })
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.size + j]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.size..(i + 1) * self.size]
    }

    /// Largest entry of the table.
    pub fn max(&self) -> f64 {
        self.data.iter().cloned().fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_calculation() {
        let matrix = DistanceMatrix::from_points(&[(0.0, 0.0), (3.0, 4.0)], Metric::Euclidean).unwrap();

        assert!((matrix.get(0, 1) - 5.0).abs() < 1e-10);
        assert!((matrix.get(1, 0) - 5.0).abs() < 1e-10);
        assert_eq!(matrix.get(0, 0), 0.0);
    }

    #[test]
    fn test_metrics() {
        let a = (0.0, 0.0);
        let b = (1.0, 1.0);
        assert!((Metric::Euclidean.between(a, b) - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(Metric::RoundedEuclidean.between(a, b), 1.0);
        assert_eq!(Metric::Manhattan.between(a, b), 2.0);
    }

    #[test]
    fn test_rejects_small_and_non_finite() {
        assert!(matches!(
            DistanceMatrix::from_points(&[(0.0, 0.0)], Metric::Euclidean),
            Err(RspError::InvalidInstance(_))
        ));
        assert!(matches!(
            DistanceMatrix::from_points(&[(0.0, 0.0), (f64::NAN, 1.0)], Metric::Euclidean),
            Err(RspError::InvalidInstance(_))
        ));
        assert!(matches!(
            DistanceMatrix::from_points(&[(0.0, f64::INFINITY), (1.0, 1.0)], Metric::Euclidean),
            Err(RspError::InvalidInstance(_))
        ));
    }

    #[test]
    fn test_symmetric_zero_diagonal() {
        let pts = [(0.0, 0.0), (2.0, 7.5), (-3.0, 1.0), (4.0, -2.0)];
        let m = DistanceMatrix::from_points(&pts, Metric::Euclidean).unwrap();
        for i in 0..4 {
            assert_eq!(m.get(i, i), 0.0);
            for j in 0..4 {
                assert_eq!(m.get(i, j), m.get(j, i));
                assert!(m.get(i, j) >= 0.0);
            }
        }
        assert_eq!(m.row(1).len(), 4);
    }
}
