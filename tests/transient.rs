use approx::assert_abs_diff_eq;
use mna_engine::components::{
    Capacitor, Diode, DiodeParams, Inductor, Pulse, Resistor, VoltageSource, Waveform,
};
use mna_engine::integration::MethodKind;
use mna_engine::simulation::{BiasingConfig, TimeConfig, Transient, TransientResult};
use mna_engine::{Circuit, EngineError};

const RC: f64 = 1e-3;
const SAMPLES: [f64; 4] = [1e-3, 2e-3, 3e-3, 4e-3];

fn rc_circuit(source: VoltageSource) -> Circuit {
    Circuit::new()
        .with(source)
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Capacitor::new("C1", "out", "0", 1e-6).unwrap())
        .unwrap()
}

fn with_samples(mut config: TimeConfig) -> TimeConfig {
    for t in SAMPLES {
        config = config.with_breakpoint(t);
    }
    config
}

/// Value of `name` at a time point the run landed on exactly.
fn sample(result: &TransientResult, name: &str, time: f64) -> f64 {
    let index = result
        .times()
        .iter()
        .position(|&t| (t - time).abs() < 1e-12)
        .unwrap_or_else(|| panic!("no time point at {}", time));
    result.solution(index)[result.variables().index(name).unwrap()]
}

fn charging(t: f64) -> f64 {
    1.0 - (-t / RC).exp()
}

/// Every sampled point agrees with the analytic charging curve within `rel_tol`.
fn assert_follows_charging(result: &TransientResult) {
    let rel_tol = BiasingConfig::default().rel_tol;
    for t in SAMPLES {
        let v = sample(result, "out", t);
        let exact = charging(t);
        let error = ((v - exact) / exact).abs();
        assert!(error <= rel_tol, "relative error {:e} at t = {:e}", error, t);
    }
}

#[test]
fn test_rc_charging_from_initial_conditions() {
    let source = VoltageSource::new("V1", "in", "0", 1.0).unwrap();
    let config = with_samples(
        TimeConfig::new(1e-5, 5e-3)
            .with_max_step(1e-5)
            .with_initial_conditions(vec![("out".to_string(), 0.0)]),
    );
    let result = Transient::new(rc_circuit(source), BiasingConfig::default(), config)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(result.times()[0], 0.0);
    assert_eq!(result.solution(0)[result.variables().index("out").unwrap()], 0.0);
    assert_follows_charging(&result);
    assert_abs_diff_eq!(*result.times().last().unwrap(), 5e-3, epsilon = 1e-15);
}

#[test]
fn test_rc_step_response() {
    let step = Waveform::Pulse(Pulse::step(0.0, 1.0, 0.0, 1e-9));
    let source = VoltageSource::new("V1", "in", "0", 0.0)
        .unwrap()
        .with_waveform(step)
        .unwrap();
    let config = with_samples(TimeConfig::new(1e-5, 5e-3));
    let result = Transient::new(rc_circuit(source), BiasingConfig::default(), config)
        .unwrap()
        .run()
        .unwrap();

    // Operating point before the step
    assert_abs_diff_eq!(result.solution(0)[result.variables().index("out").unwrap()], 0.0);
    // The end of the rising edge is a breakpoint
    assert!(result.times().iter().any(|&t| (t - 1e-9).abs() < 1e-15));
    assert_follows_charging(&result);
    assert!(result.times().windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn test_gear_rc_charging() {
    let source = VoltageSource::new("V1", "in", "0", 1.0).unwrap();
    let config = with_samples(
        TimeConfig::new(1e-5, 5e-3)
            .with_max_step(1e-5)
            .with_method(MethodKind::Gear, 3)
            .with_initial_conditions(vec![("out".to_string(), 0.0)]),
    );
    let result = Transient::new(rc_circuit(source), BiasingConfig::default(), config)
        .unwrap()
        .run()
        .unwrap();
    assert_follows_charging(&result);
}

#[test]
fn test_rl_current_rise() {
    let circuit = Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 1.0).unwrap())
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Inductor::new("L1", "out", "0", 1.0).unwrap())
        .unwrap();
    let config = with_samples(
        TimeConfig::new(1e-5, 5e-3)
            .with_max_step(1e-5)
            .with_initial_conditions(Vec::new()),
    );
    let result = Transient::new(circuit, BiasingConfig::default(), config)
        .unwrap()
        .run()
        .unwrap();
    for t in SAMPLES {
        assert_abs_diff_eq!(sample(&result, "L1#branch", t), 1e-3 * charging(t), epsilon = 2e-6);
    }
}

#[test]
fn test_diode_rectifier_follows_pwl_source() {
    let pwl = Waveform::Pwl(vec![(0.0, 0.0), (1e-3, 5.0), (2e-3, -5.0), (3e-3, 0.0)]);
    let circuit = Circuit::new()
        .with(
            VoltageSource::new("V1", "in", "0", 0.0)
                .unwrap()
                .with_waveform(pwl)
                .unwrap(),
        )
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Diode::new("D1", "out", "0", DiodeParams::default()).unwrap())
        .unwrap();
    let result = Transient::new(circuit, BiasingConfig::default(), TimeConfig::new(1e-5, 3e-3))
        .unwrap()
        .run()
        .unwrap();

    let out = result.waveform("out").unwrap();
    let max = out.iter().copied().fold(f64::MIN, f64::max);
    let min = out.iter().copied().fold(f64::MAX, f64::min);
    assert!(max > 0.6 && max < 0.85, "forward clamp at {}", max);
    assert_abs_diff_eq!(min, -5.0, epsilon = 1e-3);
    // Corners of the source are hit exactly
    for corner in [1e-3, 2e-3] {
        assert!(result.times().iter().any(|&t| (t - corner).abs() < 1e-12));
    }
}

#[test]
fn test_unknown_initial_condition_node() {
    let source = VoltageSource::new("V1", "in", "0", 1.0).unwrap();
    let config = TimeConfig::new(1e-5, 5e-3)
        .with_initial_conditions(vec![("missing".to_string(), 0.0)]);
    assert!(matches!(
        Transient::new(rc_circuit(source), BiasingConfig::default(), config),
        Err(EngineError::UnknownNode { .. })
    ));
}

#[test]
fn test_invalid_time_config() {
    let source = VoltageSource::new("V1", "in", "0", 1.0).unwrap();
    let config = TimeConfig::new(1e-5, 5e-3).with_method(MethodKind::Trapezoidal, 4);
    assert!(matches!(
        Transient::new(rc_circuit(source), BiasingConfig::default(), config),
        Err(EngineError::InvalidConfig { .. })
    ));
}
