use cellpolar_concepts::SetupError;
use serde::{Deserialize, Serialize};

/// General parameters of a [Simulation](crate::Simulation).
///
/// | Struct Field | Default | Description |
/// | --- | --- | --- |
/// | `dt` | `0.1` | Time increment of one step |
/// | `eta` | `0.0` | Strength of the noise |
/// | `init_k` | `100` | Initial number of candidate neighbors |
/// | `beta_decay` | `1.0` | Factor applied to the division rate of dividing cells |
/// | `do_nothing_threshold` | `1e-5` | No division if $\sum_i\beta_i$ is smaller |
/// | `divide_single` | `false` | Divide exactly one cell per division step |
/// | `yield_every` | `1` | Number of steps between two snapshots |
/// | `rng_seed` | `0` | Seed of the random number generator |
/// | `show_progressbar` | `false` | Display a progress bar in [run](crate::Simulation::run) |
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SimulationSettings {
    /// Time increment of one step
    pub dt: f64,
    /// Strength $\eta$ of the noise
    pub eta: f64,
    /// Initial number of candidate neighbors
    pub init_k: usize,
    /// Factor applied to the division rate of dividing cells
    pub beta_decay: f64,
    /// No division if $\sum_i\beta_i$ is smaller
    pub do_nothing_threshold: f64,
    /// Divide exactly one cell per division step
    pub divide_single: bool,
    /// Number of steps between two snapshots
    pub yield_every: u64,
    /// Seed of the random number generator
    pub rng_seed: u64,
    /// Display a progress bar in [run](crate::Simulation::run)
    pub show_progressbar: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            dt: 0.1,
            eta: 0.0,
            init_k: 100,
            beta_decay: 1.0,
            do_nothing_threshold: 1e-5,
            divide_single: false,
            yield_every: 1,
            rng_seed: 0,
            show_progressbar: false,
        }
    }
}

impl SimulationSettings {
    /// Checks that all values can be used to run a simulation.
    pub fn validate(&self) -> Result<(), SetupError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SetupError(format!(
                "Time increment dt={} needs to be positive",
                self.dt
            )));
        }
        if !(self.eta.is_finite() && self.eta >= 0.0) {
            return Err(SetupError(format!(
                "Noise strength eta={} needs to be non-negative",
                self.eta
            )));
        }
        if self.init_k == 0 {
            return Err(SetupError(
                "Initial number of neighbors init_k needs to be at least 1".to_owned(),
            ));
        }
        if !(self.beta_decay.is_finite() && self.beta_decay >= 0.0) {
            return Err(SetupError(format!(
                "Decay of division rates beta_decay={} needs to be non-negative",
                self.beta_decay
            )));
        }
        if self.yield_every == 0 {
            return Err(SetupError(
                "Snapshots need to be taken at least every step yield_every >= 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SimulationSettings::default().validate().is_ok());
    }

    #[test]
    fn invalid_values() {
        let settings = SimulationSettings {
            dt: 0.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        let settings = SimulationSettings {
            eta: -1.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        let settings = SimulationSettings {
            yield_every: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        let settings = SimulationSettings {
            init_k: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn deserialize_settings() {
        let settings: SimulationSettings = serde_json::from_str(
            r#"{"dt":0.05,"eta":0.1,"init_k":20,"beta_decay":0.5,"do_nothing_threshold":0.0,
            "divide_single":true,"yield_every":10,"rng_seed":3,"show_progressbar":false}"#,
        )
        .unwrap();
        assert_eq!(settings.init_k, 20);
        assert!(settings.divide_single);
        assert!(settings.validate().is_ok());
    }
}
