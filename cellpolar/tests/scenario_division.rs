use cellpolar::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_cells(n: usize, beta: f64, seed: u64) -> Result<CellState, SetupError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let positions = (0..n)
        .map(|_| Vector3::from_fn(|_, _| rng.gen_range(-1.0..1.0)))
        .collect();
    CellState::new(
        positions,
        vec![Vector3::z(); n],
        vec![Vector3::x(); n],
        Lambda::Shared(vec![0.0, 0.5, 0.4, 0.1]),
        vec![beta; n],
    )
}

#[test]
fn always_dividing_aggregate_grows() -> Result<(), Box<dyn std::error::Error>> {
    let settings = SimulationSettings {
        dt: 0.1,
        eta: 0.01,
        init_k: 10,
        rng_seed: 5,
        ..Default::default()
    };
    let sim = Simulation::new(random_cells(8, 0.5, 4)?, settings, PolarPotential::default())?
        .with_decider(AlwaysDivide);
    let mut counts = vec![8];
    for snapshot in sim.take(50) {
        let snapshot = snapshot?;
        assert_eq!(snapshot.polarity.len(), snapshot.positions.len());
        assert_eq!(snapshot.lambda.len(), snapshot.positions.len());
        assert_eq!(snapshot.beta.len(), snapshot.positions.len());
        counts.push(snapshot.positions.len());
    }
    assert!(counts.windows(2).all(|w| w[0] <= w[1]));
    assert!(counts.last() > counts.first());
    Ok(())
}

#[test]
fn daughters_are_placed_at_unit_distance() -> Result<(), Box<dyn std::error::Error>> {
    let mut cells = random_cells(8, 0.5, 6)?;
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let settings = SimulationSettings::default();
    let mut n_divisions = 0;
    for _ in 0..50 {
        let n_before = cells.len();
        let before = cells.positions().to_vec();
        let outcome = divide(&mut cells, &settings, &mut rng)?;
        assert_eq!(cells.len(), n_before + outcome.len());
        for (parent, daughter) in outcome.pairs.iter() {
            assert_eq!(cells.polarity()[parent.0], cells.polarity()[daughter.0]);
            let parent_pos = cells.positions()[parent.0];
            let daughter_pos = cells.positions()[daughter.0];
            approx::assert_abs_diff_eq!((daughter_pos - parent_pos).norm(), 1.0, epsilon = 1e-12);
            approx::assert_abs_diff_eq!(
                (daughter_pos + parent_pos) / 2.0,
                before[parent.0],
                epsilon = 1e-12
            );
        }
        n_divisions += outcome.len();
    }
    assert!(n_divisions > 0);
    assert!(cells.is_consistent());
    Ok(())
}

#[test]
fn rate_decider_divides_one_cell_per_unit_time() -> Result<(), Box<dyn std::error::Error>> {
    let settings = SimulationSettings {
        dt: 0.1,
        divide_single: true,
        init_k: 10,
        ..Default::default()
    };
    let decider = RateDivisionDecider {
        start_time: 0.0,
        rate: 1.0,
        max_cells: 100,
    };
    let mut sim = Simulation::new(random_cells(4, 0.3, 8)?, settings, PolarPotential::default())?
        .with_decider(decider);
    let snapshots = sim.run(50, 100)?;
    let counts: Vec<_> = snapshots.iter().map(|s| s.positions.len()).collect();
    assert_eq!(counts[8], 4);
    assert_eq!(counts[9], 5);
    assert_eq!(counts[19], 6);
    assert_eq!(counts[49], 9);
    Ok(())
}

#[test]
fn closure_decider_and_small_rates() -> Result<(), Box<dyn std::error::Error>> {
    let settings = SimulationSettings {
        do_nothing_threshold: 1.0,
        ..Default::default()
    };
    let mut sim = Simulation::new(random_cells(5, 0.1, 9)?, settings, PolarPotential::default())?
        .with_decider(|_: &DivisionInfo, tstep: u64| tstep % 2 == 0);
    let snapshots = sim.run(20, 100)?;
    // Sum of all division rates is below the threshold
    assert!(snapshots.iter().all(|s| s.positions.len() == 5));
    Ok(())
}
