use approx::assert_relative_eq;
use mna_engine::components::{Capacitor, Resistor, VoltageSource};
use mna_engine::simulation::sweep::{run_parallel, sweep_operating_points, sweep_transients};
use mna_engine::simulation::{BiasingConfig, TimeConfig};
use mna_engine::{Circuit, EngineError, Result};

fn divider(r2: f64) -> Result<Circuit> {
    Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 5.0)?)?
        .with(Resistor::new("R1", "in", "out", 1e3)?)?
        .with(Resistor::new("R2", "out", "0", r2)?)
}

#[test]
fn test_operating_point_sweep_keeps_order() {
    let values: Vec<f64> = (1..=16).map(|i| i as f64 * 250.0).collect();
    let results = sweep_operating_points(&values, &BiasingConfig::default(), |&r2| divider(r2));

    assert_eq!(results.len(), values.len());
    for (r2, result) in values.iter().zip(results) {
        let op = result.unwrap();
        assert_relative_eq!(op.voltage("out").unwrap(), 5.0 * r2 / (1e3 + r2), max_relative = 1e-9);
    }
}

#[test]
fn test_failing_point_does_not_affect_others() {
    let values = [1e3, -1.0, 2e3];
    let results = sweep_operating_points(&values, &BiasingConfig::default(), |&r2| divider(r2));

    assert_relative_eq!(results[0].as_ref().unwrap().voltage("out").unwrap(), 2.5, max_relative = 1e-9);
    assert!(matches!(results[1], Err(EngineError::InvalidParameter { .. })));
    assert_relative_eq!(
        results[2].as_ref().unwrap().voltage("out").unwrap(),
        10.0 / 3.0,
        max_relative = 1e-9
    );
}

#[test]
fn test_run_parallel_returns_input_order() {
    let points: Vec<usize> = (0..64).collect();
    let results = run_parallel(&points, |&i| Ok(i * i));
    let squares: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(squares, points.iter().map(|i| i * i).collect::<Vec<_>>());
}

#[test]
fn test_transient_sweep_over_capacitance() {
    let capacitances = [1e-6, 2e-6];
    let time = TimeConfig::new(1e-5, 2e-3)
        .with_max_step(1e-5)
        .with_initial_conditions(vec![("out".to_string(), 0.0)])
        .with_breakpoint(1e-3);
    let results = sweep_transients(&capacitances, &BiasingConfig::default(), &time, |&c| {
        Circuit::new()
            .with(VoltageSource::new("V1", "in", "0", 1.0)?)?
            .with(Resistor::new("R1", "in", "out", 1e3)?)?
            .with(Capacitor::new("C1", "out", "0", c)?)
    });

    for (c, result) in capacitances.iter().zip(results) {
        let result = result.unwrap();
        let expected = 1.0 - (-1e-3 / (1e3 * c)).exp();
        assert_relative_eq!(result.value_at("out", 1e-3).unwrap(), expected, epsilon = 2e-3);
    }
}
