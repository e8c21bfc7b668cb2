use approx::{assert_abs_diff_eq, assert_relative_eq};
use mna_engine::components::{
    Capacitor, CurrentSource, Diode, DiodeParams, Inductor, Resistor, VoltageSource,
};
use mna_engine::simulation::{operating_point, BiasingConfig, InitMode, Simulation};
use mna_engine::{Circuit, EngineError, THERMAL_VOLTAGE};

fn divider() -> Circuit {
    Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 5.0).unwrap())
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Resistor::new("R2", "out", "0", 1e3).unwrap())
        .unwrap()
}

#[test]
fn test_divider_operating_point() {
    let op = operating_point(divider(), BiasingConfig::default()).unwrap();
    assert_abs_diff_eq!(op.voltage("out").unwrap(), 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(op.voltage("in").unwrap(), 5.0, epsilon = 1e-12);
    // Source current flows from + through the source to -
    assert_relative_eq!(op.current("V1").unwrap(), -2.5e-3, epsilon = 1e-15);
}

#[test]
fn test_linear_circuit_converges_in_two_iterations() {
    let mut sim = Simulation::new(divider(), BiasingConfig::default()).unwrap();
    sim.state_mut().init = InitMode::None;
    assert!(sim.iterate(100, None).unwrap());
    assert!(sim.statistics().iterations <= 2);
    assert_relative_eq!(sim.value("out").unwrap(), 2.5, epsilon = 1e-12);
}

#[test]
fn test_small_signal_mode_is_rejected() {
    let mut sim = Simulation::new(divider(), BiasingConfig::default()).unwrap();
    sim.state_mut().init = InitMode::SmallSignal;
    assert!(matches!(
        sim.iterate(100, None),
        Err(EngineError::InvalidInitMode { .. })
    ));
}

#[test]
fn test_current_source_into_resistor() {
    let circuit = Circuit::new()
        .with(CurrentSource::new("I1", "0", "a", 1e-3).unwrap())
        .unwrap()
        .with(Resistor::new("R1", "a", "0", 1e3).unwrap())
        .unwrap();
    let op = operating_point(circuit, BiasingConfig::default()).unwrap();
    assert_relative_eq!(op.voltage("a").unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn test_inductor_is_short_in_dc() {
    let circuit = Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 5.0).unwrap())
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Inductor::new("L1", "out", "0", 1e-3).unwrap())
        .unwrap();
    let op = operating_point(circuit, BiasingConfig::default()).unwrap();
    assert_abs_diff_eq!(op.voltage("out").unwrap(), 0.0, epsilon = 1e-12);
    assert_relative_eq!(op.current("L1").unwrap(), 5e-3, epsilon = 1e-12);
}

#[test]
fn test_diode_clamp() {
    let circuit = Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 5.0).unwrap())
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Diode::new("D1", "out", "0", DiodeParams::default()).unwrap())
        .unwrap();
    let op = operating_point(circuit, BiasingConfig::default()).unwrap();

    let v = op.voltage("out").unwrap();
    assert!(v > 0.6 && v < 0.8, "clamped at {}", v);

    // Resistor current matches the junction current
    let params = DiodeParams::default();
    let i_resistor = (5.0 - v) / 1e3;
    let i_diode = params.is * ((v / (params.n * THERMAL_VOLTAGE)).exp() - 1.0);
    assert_relative_eq!(i_resistor, i_diode, max_relative = 1e-2);
}

#[test]
fn test_nodeset_does_not_move_solution() {
    let config = BiasingConfig::new().with_nodeset("out", 1.0);
    let op = operating_point(divider(), config).unwrap();
    assert_relative_eq!(op.voltage("out").unwrap(), 2.5, epsilon = 1e-9);
}

#[test]
fn test_unknown_nodeset_node() {
    let config = BiasingConfig::new().with_nodeset("nowhere", 1.0);
    assert!(matches!(
        Simulation::new(divider(), config),
        Err(EngineError::UnknownNode { .. })
    ));
}

#[test]
fn test_floating_node_fails_to_converge() {
    // "x" only connects to a capacitor, which is open in DC
    let circuit = divider()
        .with(Capacitor::new("C1", "out", "x", 1e-6).unwrap())
        .unwrap();
    let err = operating_point(circuit, BiasingConfig::default()).unwrap_err();
    assert!(matches!(err, EngineError::ConvergenceFailure { .. }));
}

#[test]
fn test_duplicate_component_name() {
    let result = divider().with(Resistor::new("R1", "a", "0", 1.0).unwrap());
    assert!(matches!(result, Err(EngineError::InvalidConfig { .. })));
}

fn diode_clamp() -> Circuit {
    Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 5.0).unwrap())
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Diode::new("D1", "out", "0", DiodeParams::default()).unwrap())
        .unwrap()
}

#[test]
fn test_iteration_limit_reports_no_convergence() {
    let mut sim = Simulation::new(diode_clamp(), BiasingConfig::default()).unwrap();
    sim.state_mut().init = InitMode::Junction;
    assert!(!sim.iterate(2, None).unwrap());
    assert_eq!(sim.statistics().iterations, 3);
}

#[test]
fn test_junction_start_settles_in_float() {
    let mut sim = Simulation::new(diode_clamp(), BiasingConfig::default()).unwrap();
    sim.state_mut().init = InitMode::Junction;
    assert!(sim.iterate(100, None).unwrap());
    assert_eq!(sim.state().init, InitMode::Float);
    // Entering in Junction and leaving it both force a full reorder
    assert!(sim.statistics().reorders >= 2);
    let v = sim.value("out").unwrap();
    assert!(v > 0.6 && v < 0.8, "clamped at {}", v);
}

#[test]
fn test_nodeset_forces_extra_float_iteration() {
    let mut plain = Simulation::new(divider(), BiasingConfig::default()).unwrap();
    plain.operating_point().unwrap();
    assert_eq!(plain.statistics().iterations, 3);

    // A nodeset at the true solution leaves every iterate unchanged, so the
    // only extra iteration comes from the pass carried from Fix into Float
    let config = BiasingConfig::new().with_nodeset("out", 2.5);
    let mut held = Simulation::new(divider(), config).unwrap();
    held.operating_point().unwrap();
    assert_eq!(held.statistics().iterations, 4);
    assert_relative_eq!(held.value("out").unwrap(), 2.5, epsilon = 1e-9);
}
