//! Run parameters: hub count, trade-off coefficient and optional depot.

use crate::error::{RspError, RspResult};
use crate::instance::Instance;
use serde::{Deserialize, Serialize};

/// Parameters of one Ring-Star run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Number of hubs on the ring (P)
    pub hubs: usize,
    /// Weight of the ring length; the star cost is weighted by `1 - alpha`
    pub alpha: f64,
    /// Node index that must always be a hub
    pub depot: Option<usize>,
}

impl Parameters {
    pub fn new(hubs: usize, alpha: f64) -> Self {
        Parameters { hubs, alpha, depot: None }
    }

    pub fn with_depot(mut self, depot: usize) -> Self {
        self.depot = Some(depot);
        self
    }

    /// Hub count derived from a fraction of the node count, clamped to `[2, n]`.
    pub fn hubs_from_ratio(dimension: usize, ratio: f64) -> usize {
        let p = (dimension as f64 * ratio).round() as usize;
        p.clamp(2, dimension.max(2))
    }

    /// Check the parameters against an instance.
    pub fn validate(&self, instance: &Instance) -> RspResult<()> {
        let n = instance.dimension;
        if self.hubs < 2 || self.hubs > n {
            return Err(RspError::invalid_instance(format!(
                "hub count {} out of range [2, {}]",
                self.hubs, n
            )));
        }
        if !self.alpha.is_finite() || !(0.0..=1.0).contains(&self.alpha) {
            return Err(RspError::invalid_instance(format!(
                "alpha {} out of range [0, 1]",
                self.alpha
            )));
        }
        if let Some(depot) = self.depot {
            if depot >= n {
                return Err(RspError::invalid_instance(format!(
                    "depot index {} out of range for {} nodes",
                    depot, n
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Instance {
        Instance::from_coords("sq", &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (5.0, 5.0)]).unwrap()
    }

    #[test]
    fn test_validate_ranges() {
        let inst = square();
        assert!(Parameters::new(2, 0.0).validate(&inst).is_ok());
        assert!(Parameters::new(5, 1.0).validate(&inst).is_ok());
        assert!(Parameters::new(1, 0.5).validate(&inst).is_err());
        assert!(Parameters::new(6, 0.5).validate(&inst).is_err());
        assert!(Parameters::new(3, 1.5).validate(&inst).is_err());
        assert!(Parameters::new(3, f64::NAN).validate(&inst).is_err());
        assert!(Parameters::new(3, 0.5).with_depot(5).validate(&inst).is_err());
        assert!(Parameters::new(3, 0.5).with_depot(4).validate(&inst).is_ok());
    }

    #[test]
    fn test_hubs_from_ratio() {
        assert_eq!(Parameters::hubs_from_ratio(10, 0.25), 3);
        assert_eq!(Parameters::hubs_from_ratio(10, 0.0), 2);
        assert_eq!(Parameters::hubs_from_ratio(10, 2.0), 10);
    }
}
