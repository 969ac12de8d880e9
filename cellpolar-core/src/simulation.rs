use cellpolar_concepts::*;
use nalgebra::Vector3;
use ndarray::Array3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::cell_state::{CellState, Lambdas};
use crate::division::{divide, DivisionOutcome};
use crate::errors::SimulationError;
use crate::integrator::{gradient_step, StepReport};
use crate::morphogen::{self, WntSettings, WntSignalling};
use crate::neighbours::{find_potential_neighbours, find_true_neighbours, NeighborIndex};
use crate::progress;
use crate::reaction_diffusion::{ReactionDiffusion, ReactionDiffusionSettings};
use crate::settings::SimulationSettings;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Invoked after every gradient step with
/// `(time, positions, polarity, planar cell polarity, lambda)`.
pub type StepCallback = Box<
    dyn FnMut(f64, &[Vector3<f64>], &[Vector3<f64>], &[Vector3<f64>], &Lambdas) + Send,
>;

/// State of the aggregate which is emitted every `yield_every` steps.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Snapshot {
    /// Number of steps taken so far
    pub iteration: u64,
    /// Simulated time
    pub time: f64,
    /// Positions $x_i$
    pub positions: Vec<Vector3<f64>>,
    /// Apical-basal polarities $p_i$
    pub polarity: Vec<Vector3<f64>>,
    /// Planar cell polarities $q_i$
    pub pcp: Vec<Vector3<f64>>,
    /// Potential weights $\lambda_i$
    pub lambda: Vec<Vec<f64>>,
    /// Division rates $\beta_i$
    pub beta: Vec<f64>,
    /// Morphogen levels $w_i$
    pub wnt: Option<Vec<f64>>,
    /// Receptor levels $R_i$
    pub receptor: Option<Vec<f64>>,
    /// Ligand concentration on the extracellular grid
    pub ligand: Option<Array3<f64>>,
}

/// Advances a growing aggregate of polarized cells in time.
///
/// Every step consists of
/// 1. division of cells if the [DivisionDecider] allows it
/// 2. adaptation of the number of candidate neighbors and their recalculation if needed
/// 3. reaction-diffusion of ligand and receptor (if enabled)
/// 4. estimation of the morphogen gradients (if enabled)
/// 5. a stochastic gradient step of positions and polarities
/// 6. update of morphogen levels and division rates.
///
/// The simulation is an [Iterator] which yields a [Snapshot] every `yield_every` steps.
/// After an error was returned, it yields [None].
/// Without a decider, cells are allowed to divide in every step.
///
/// ```
/// use cellpolar_core::*;
/// use cellpolar_concepts::*;
/// use nalgebra::Vector3;
///
/// struct Spring;
///
/// impl Potential for Spring {
///     fn eval<S: Scalar>(&self, ctx: &PairContext<S>) -> S {
///         (ctx.distance - 1.0) * (ctx.distance - 1.0)
///     }
/// }
///
/// let cells = CellState::new(
///     vec![Vector3::zeros(), Vector3::new(0.5, 0.0, 0.0)],
///     vec![Vector3::z(); 2],
///     vec![Vector3::y(); 2],
///     Lambda::Shared(vec![]),
///     vec![0.0; 2],
/// )?;
/// let mut sim = Simulation::new(cells, SimulationSettings::default(), Spring)?;
/// let snapshot = sim.next().unwrap()?;
/// assert_eq!(snapshot.iteration, 1);
/// let d = (snapshot.positions[1] - snapshot.positions[0]).norm();
/// assert!(d > 0.5);
/// # Ok::<(), SimulationError>(())
/// ```
pub struct Simulation<P> {
    cells: CellState,
    settings: SimulationSettings,
    potential: P,
    neighbours: NeighborIndex,
    decider: Option<Box<dyn DivisionDecider + Send>>,
    callback: Option<StepCallback>,
    wnt: Option<WntSignalling>,
    reaction_diffusion: Option<ReactionDiffusion>,
    rng: ChaCha8Rng,
    tstep: u64,
    last_report: Option<StepReport>,
    failed: bool,
}

impl<P> Simulation<P>
where
    P: Potential + Sync,
{
    /// Checks the settings and constructs a new simulation.
    pub fn new(
        cells: CellState,
        settings: SimulationSettings,
        potential: P,
    ) -> Result<Self, SetupError> {
        settings.validate()?;
        Ok(Self {
            neighbours: NeighborIndex::new(settings.init_k),
            rng: ChaCha8Rng::seed_from_u64(settings.rng_seed),
            cells,
            settings,
            potential,
            decider: None,
            callback: None,
            wnt: None,
            reaction_diffusion: None,
            tstep: 0,
            last_report: None,
            failed: false,
        })
    }

    /// Decides in which steps cells may divide.
    pub fn with_decider<D>(mut self, decider: D) -> Self
    where
        D: DivisionDecider + Send + 'static,
    {
        self.decider = Some(Box::new(decider));
        self
    }

    /// Registers a [StepCallback].
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(f64, &[Vector3<f64>], &[Vector3<f64>], &[Vector3<f64>], &Lambdas)
            + Send
            + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Enables morphogen signalling starting with $w=1$ at the source cells.
    pub fn with_wnt(mut self, settings: WntSettings) -> Result<Self, SetupError> {
        self.wnt = Some(WntSignalling::attach(settings, &mut self.cells)?);
        Ok(self)
    }

    /// Enables the ligand-receptor dynamics on an extracellular grid.
    ///
    /// Morphogen signalling with default settings is enabled if it was not enabled before.
    /// Initial receptor levels are drawn uniformly from $[0, 2R_0)$.
    pub fn with_reaction_diffusion(
        mut self,
        settings: ReactionDiffusionSettings,
    ) -> Result<Self, SetupError> {
        if self.wnt.is_none() {
            self = self.with_wnt(WntSettings::default())?;
        }
        let receptor = (0..self.cells.len())
            .map(|_| 2.0 * self.rng.gen::<f64>() * settings.receptor_init)
            .collect();
        self.cells.enable_receptor(receptor)?;
        self.reaction_diffusion = Some(ReactionDiffusion::new(settings)?);
        Ok(self)
    }

    /// Current state of all cells
    pub fn cells(&self) -> &CellState {
        &self.cells
    }

    /// General parameters
    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Pairwise potential
    pub fn potential(&self) -> &P {
        &self.potential
    }

    /// Number of steps taken so far
    pub fn tstep(&self) -> u64 {
        self.tstep
    }

    /// Simulated time
    pub fn time(&self) -> f64 {
        self.tstep as f64 * self.settings.dt
    }

    /// Candidate neighbors and their adaptive parameters
    pub fn neighbour_index(&self) -> &NeighborIndex {
        &self.neighbours
    }

    /// Morphogen signalling if enabled
    pub fn wnt(&self) -> Option<&WntSignalling> {
        self.wnt.as_ref()
    }

    /// Extracellular grid if enabled
    pub fn reaction_diffusion(&self) -> Option<&ReactionDiffusion> {
        self.reaction_diffusion.as_ref()
    }

    /// Result of the most recent gradient step
    pub fn last_report(&self) -> Option<&StepReport> {
        self.last_report.as_ref()
    }

    fn division_step(&mut self) -> Result<DivisionOutcome, SimulationError> {
        let info = DivisionInfo {
            n_cells: self.cells.len(),
            dt: self.settings.dt,
            total_beta: self.cells.beta().iter().sum(),
        };
        let allowed = self
            .decider
            .as_mut()
            .map_or(true, |decider| decider.decide(&info, self.tstep));
        if !allowed {
            return Ok(DivisionOutcome::default());
        }
        let outcome = divide(&mut self.cells, &self.settings, &mut self.rng)?;
        if let Some(wnt) = &self.wnt {
            wnt.replenish(&mut self.cells);
        }
        Ok(outcome)
    }

    fn update_morphogen(&mut self) {
        let Some(wnt_settings) = self.wnt.as_ref().map(|w| w.settings()) else {
            return;
        };
        let rd_settings = self.reaction_diffusion.as_ref().map(|rd| rd.settings());
        let cells = &mut self.cells;
        let (Some(wnt), beta) = (cells.wnt.as_mut(), &mut cells.beta) else {
            return;
        };
        match (rd_settings, cells.receptor.as_ref()) {
            (Some(rd), Some(receptor)) if rd.wnt_from_receptor => {
                for (w, r) in wnt.iter_mut().zip(receptor) {
                    *w = rd.hill(*r);
                }
            }
            _ => morphogen::decay(wnt, self.settings.dt, wnt_settings.decay),
        }
        if let Some(exponent) = rd_settings.and_then(|rd| rd.beta_from_wnt) {
            morphogen::beta_from_wnt(wnt, beta, exponent);
        }
    }

    /// Advances the simulation by a single step.
    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    pub fn step(&mut self) -> Result<(), SimulationError> {
        self.tstep += 1;
        let tstep = self.tstep;
        let dt = self.settings.dt;

        let outcome = self.division_step()?;
        self.neighbours.update_k(tstep, self.cells.len());
        self.neighbours
            .refresh_if_needed(&self.cells.positions, !outcome.is_empty(), tstep);

        self.cells.normalize_orientations(&[], &[]);
        let neighbours = self.neighbours.true_neighbours(&self.cells.positions)?;

        if let Some(rd) = self.reaction_diffusion.as_mut() {
            let receptor = self.cells.receptor.as_mut().ok_or(IndexError(
                "Receptor levels are missing while reaction-diffusion is enabled".to_owned(),
            ))?;
            rd.reaction_diffusion_dynamics(&self.cells.positions, receptor, Some(&neighbours), dt)?;
        }
        if let Some(wnt) = self.wnt.as_mut() {
            wnt.update_gradients(&self.cells, &neighbours);
        }

        let gradients = self.wnt.as_ref().map(|w| w.gradients());
        let report = gradient_step(
            &mut self.cells,
            &neighbours,
            gradients,
            &self.potential,
            dt,
            self.settings.eta,
            &mut self.rng,
        )?;
        if let Some(callback) = self.callback.as_mut() {
            callback(
                tstep as f64 * dt,
                &self.cells.positions,
                &self.cells.polarity,
                &self.cells.pcp,
                &self.cells.lambda,
            );
        }
        self.last_report = Some(report);
        self.update_morphogen();
        Ok(())
    }

    /// Smooths the morphogen levels over the current true neighbors.
    pub fn gradient_averaging(&mut self) -> Result<(), SimulationError> {
        let wnt_settings = self.wnt.as_ref().map(|w| w.settings()).ok_or(SetupError(
            "Morphogen signalling needs to be enabled for gradient averaging".to_owned(),
        ))?;
        // Leaves the adaptive neighbor state untouched
        let positions = &self.cells.positions;
        let neighbours = match self
            .neighbours
            .candidates()
            .filter(|c| c.n_cells() == positions.len())
        {
            Some(candidates) => find_true_neighbours(positions, candidates)?,
            None => find_true_neighbours(
                positions,
                &find_potential_neighbours(positions, self.neighbours.k()),
            )?,
        };
        if let Some(wnt) = self.cells.wnt.as_mut() {
            morphogen::gradient_averaging(wnt, &neighbours, &wnt_settings.source_cells);
        }
        Ok(())
    }

    /// Current state as a [Snapshot]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            iteration: self.tstep,
            time: self.time(),
            positions: self.cells.positions.clone(),
            polarity: self.cells.polarity.clone(),
            pcp: self.cells.pcp.clone(),
            lambda: self.cells.lambda.to_rows(),
            beta: self.cells.beta.clone(),
            wnt: self.cells.wnt.clone(),
            receptor: self.cells.receptor.clone(),
            ligand: self
                .reaction_diffusion
                .as_ref()
                .map(|rd| rd.ligand().clone()),
        }
    }

    /// Collects up to `n_snapshots` snapshots.
    ///
    /// Stops early once more than `max_cells` cells are present.
    /// Displays a progress bar if `show_progressbar` is set.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub fn run(
        &mut self,
        n_snapshots: usize,
        max_cells: usize,
    ) -> Result<Vec<Snapshot>, SimulationError> {
        let mut bar = if self.settings.show_progressbar {
            Some(progress::initialize_bar(n_snapshots)?)
        } else {
            None
        };
        let mut snapshots = Vec::with_capacity(n_snapshots);
        while snapshots.len() < n_snapshots {
            let snapshot = match self.next() {
                Some(snapshot) => snapshot?,
                None => break,
            };
            let n_cells = snapshot.positions.len();
            snapshots.push(snapshot);
            if let Some(bar) = bar.as_mut() {
                progress::update_bar(bar, n_cells)?;
            }
            if n_cells > max_cells {
                #[cfg(feature = "tracing")]
                tracing::info!(n_cells, max_cells, "reached maximum number of cells");
                break;
            }
        }
        Ok(snapshots)
    }
}

impl<P> Iterator for Simulation<P>
where
    P: Potential + Sync,
{
    type Item = Result<Snapshot, SimulationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Err(error) = self.step() {
                self.failed = true;
                return Some(Err(error));
            }
            if self.tstep % self.settings.yield_every == 0 {
                return Some(Ok(self.snapshot()));
            }
        }
    }
}

impl<P> std::iter::FusedIterator for Simulation<P> where P: Potential + Sync {}
