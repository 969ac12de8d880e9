use cellpolar::prelude::*;

fn single_cell() -> Result<CellState, SetupError> {
    CellState::new(
        vec![Vector3::zeros()],
        vec![Vector3::z()],
        vec![Vector3::y()],
        Lambda::Shared(vec![]),
        vec![0.0],
    )
}

fn ligand_masses(
    rd_settings: ReactionDiffusionSettings,
    n_steps: usize,
) -> Result<Vec<f64>, Box<dyn std::error::Error>> {
    let settings = SimulationSettings {
        dt: 0.1,
        ..Default::default()
    };
    let mut sim = Simulation::new(single_cell()?, settings, ExponentialRepulsion::default())?
        .with_decider(NeverDivide)
        .with_reaction_diffusion(rd_settings)?;
    let mut masses = vec![sim.reaction_diffusion().ok_or("grid missing")?.total_mass()];
    for snapshot in sim.by_ref().take(n_steps) {
        let snapshot = snapshot?;
        let ligand = snapshot.ligand.ok_or("ligand missing from snapshot")?;
        assert_eq!(ligand.dim(), (20, 20, 20));
        masses.push(ligand.sum());
    }
    Ok(masses)
}

#[test]
fn ligand_accumulates_without_decay() -> Result<(), Box<dyn std::error::Error>> {
    let masses = ligand_masses(
        ReactionDiffusionSettings {
            grid_n: 20,
            grid_dx: 1.0,
            diffusion_ratio: 1.0,
            ligand_decay: false,
            ..Default::default()
        },
        100,
    )?;
    assert_eq!(masses.len(), 101);
    assert_eq!(masses[0], 0.0);
    assert!(masses.windows(2).all(|w| w[1] > w[0]));
    Ok(())
}

#[test]
fn ligand_saturates_with_decay() -> Result<(), Box<dyn std::error::Error>> {
    let b = 1.0;
    let masses = ligand_masses(
        ReactionDiffusionSettings {
            grid_n: 20,
            grid_dx: 1.0,
            diffusion_ratio: 1.0,
            gamma: 1.0,
            b,
            ..Default::default()
        },
        100,
    )?;
    let upper = b * 20f64.powi(3);
    assert!(masses.iter().all(|m| *m <= upper + 1e-9));
    let first_change = masses[1] - masses[0];
    let last_change = (masses[100] - masses[99]).abs();
    assert!(first_change > 0.0);
    assert!(last_change < 1e-3 * first_change);
    Ok(())
}

#[test]
fn cell_outside_grid() -> Result<(), Box<dyn std::error::Error>> {
    let cells = CellState::new(
        vec![Vector3::new(11.0, 0.0, 0.0)],
        vec![Vector3::z()],
        vec![Vector3::y()],
        Lambda::Shared(vec![]),
        vec![0.0],
    )?;
    let mut sim = Simulation::new(cells, SimulationSettings::default(), ExponentialRepulsion::default())?
        .with_reaction_diffusion(ReactionDiffusionSettings {
            grid_n: 20,
            grid_dx: 1.0,
            ..Default::default()
        })?;
    match sim.next() {
        Some(Err(SimulationError::BoundaryError(_))) => (),
        other => return Err(format!("expected boundary error, got {other:?}").into()),
    }
    assert!(sim.next().is_none());
    Ok(())
}
