use cellpolar_concepts::{DivisionDecider, DivisionInfo};

use serde::{Deserialize, Serialize};

/// Allows division in every step.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AlwaysDivide;

impl DivisionDecider for AlwaysDivide {
    fn decide(&mut self, _: &DivisionInfo, _: u64) -> bool {
        true
    }
}

/// Never allows cells to divide.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NeverDivide;

impl DivisionDecider for NeverDivide {
    fn decide(&mut self, _: &DivisionInfo, _: u64) -> bool {
        false
    }
}

/// Allows division whenever $\lfloor rt\rfloor$ passes an integer.
///
/// After `start_time` the decider fires on average `rate` times per unit of time.
/// Once the aggregate has reached `max_cells` cells, no further divisions are allowed.
///
/// | Struct Field | Description |
/// | --- | --- |
/// | `start_time` | No divisions before this time |
/// | `rate` | Number of division steps per unit time |
/// | `max_cells` | Upper limit for the number of cells |
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RateDivisionDecider {
    /// No divisions before this time
    pub start_time: f64,
    /// Number of division steps per unit time
    pub rate: f64,
    /// Upper limit for the number of cells
    pub max_cells: usize,
}

impl DivisionDecider for RateDivisionDecider {
    fn decide(&mut self, info: &DivisionInfo, tstep: u64) -> bool {
        let t = info.time(tstep);
        if t < self.start_time || info.n_cells + 1 > self.max_cells {
            return false;
        }
        (self.rate * t).trunc() > (self.rate * (t - info.dt)).trunc()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn info(n_cells: usize) -> DivisionInfo {
        DivisionInfo {
            n_cells,
            dt: 0.1,
            total_beta: 1.0,
        }
    }

    #[test]
    fn rate_decider_fires_once_per_unit_time() {
        let mut decider = RateDivisionDecider {
            start_time: 0.0,
            rate: 1.0,
            max_cells: 100,
        };
        let fired: Vec<u64> = (1..=50)
            .filter(|tstep| decider.decide(&info(10), *tstep))
            .collect();
        assert_eq!(fired, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn rate_decider_respects_start_and_limit() {
        let mut decider = RateDivisionDecider {
            start_time: 2.5,
            rate: 1.0,
            max_cells: 20,
        };
        assert!(!decider.decide(&info(10), 20));
        assert!(decider.decide(&info(10), 30));
        assert!(decider.decide(&info(19), 30));
        assert!(!decider.decide(&info(20), 30));
    }

    #[test]
    fn constant_deciders() {
        assert!(AlwaysDivide.decide(&info(1), 1));
        assert!(!NeverDivide.decide(&info(1), 1));
    }

    #[test]
    fn serialize_rate_decider() {
        let decider = RateDivisionDecider {
            start_time: 1.0,
            rate: 0.5,
            max_cells: 1000,
        };
        let serialized = serde_json::to_string(&decider).unwrap();
        let deserialized: RateDivisionDecider = serde_json::from_str(&serialized).unwrap();
        assert_eq!(decider, deserialized);
    }
}
