use std::f64::consts::PI;

use approx::assert_relative_eq;
use mna_engine::components::{Capacitor, Diode, DiodeParams, Inductor, Resistor, VoltageSource};
use mna_engine::simulation::{AcAnalysis, BiasingConfig, FrequencyConfig};
use mna_engine::{Circuit, EngineError};

fn lowpass() -> Circuit {
    Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 0.0).unwrap().with_ac(1.0, 0.0))
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Capacitor::new("C1", "out", "0", 1e-6).unwrap())
        .unwrap()
}

#[test]
fn test_rc_lowpass_response() {
    let config = FrequencyConfig::decade(10, 1.0, 1e5);
    let result = AcAnalysis::new(lowpass(), BiasingConfig::default(), config)
        .unwrap()
        .run()
        .unwrap();

    let out = result.phasor("out").unwrap();
    let phase = result.phase_deg("out").unwrap();
    assert_eq!(out.len(), 51);
    for ((&f, v), p) in result.frequencies().iter().zip(&out).zip(&phase) {
        let wrc = 2.0 * PI * f * 1e-3;
        assert_relative_eq!(v.norm(), 1.0 / (1.0 + wrc * wrc).sqrt(), max_relative = 1e-9);
        assert_relative_eq!(*p, -wrc.atan().to_degrees(), epsilon = 1e-6);
    }
}

#[test]
fn test_corner_frequency_is_minus_three_db() {
    let corner = 1.0 / (2.0 * PI * 1e-3);
    let config = FrequencyConfig::list(vec![corner]);
    let result = AcAnalysis::new(lowpass(), BiasingConfig::default(), config)
        .unwrap()
        .run()
        .unwrap();
    assert_relative_eq!(
        result.magnitude_db("out").unwrap()[0],
        -10.0 * 2f64.log10(),
        epsilon = 1e-9
    );
    assert_relative_eq!(result.phase_deg("out").unwrap()[0], -45.0, epsilon = 1e-9);
}

#[test]
fn test_source_phase_carries_through() {
    let circuit = Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 0.0).unwrap().with_ac(2.0, 90.0))
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Resistor::new("R2", "out", "0", 1e3).unwrap())
        .unwrap();
    let result = AcAnalysis::new(circuit, BiasingConfig::default(), FrequencyConfig::list(vec![1e3]))
        .unwrap()
        .run()
        .unwrap();
    let out = result.phasor("out").unwrap()[0];
    assert_relative_eq!(out.re, 0.0, epsilon = 1e-12);
    assert_relative_eq!(out.im, 1.0, epsilon = 1e-12);
}

#[test]
fn test_series_rl_current() {
    let circuit = Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 0.0).unwrap().with_ac(1.0, 0.0))
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Inductor::new("L1", "out", "0", 1.0).unwrap())
        .unwrap();
    let f = 1e3 / (2.0 * PI);
    let result = AcAnalysis::new(circuit, BiasingConfig::default(), FrequencyConfig::list(vec![f]))
        .unwrap()
        .run()
        .unwrap();
    // wL = R, so |I| = 1 / (R * sqrt(2))
    let current = result.phasor("L1#branch").unwrap()[0];
    assert_relative_eq!(current.norm(), 1e-3 / 2f64.sqrt(), max_relative = 1e-9);
}

#[test]
fn test_diode_small_signal_divider() {
    let circuit = Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 5.0).unwrap().with_ac(1.0, 0.0))
        .unwrap()
        .with(Resistor::new("R1", "in", "out", 1e3).unwrap())
        .unwrap()
        .with(Diode::new("D1", "out", "0", DiodeParams::default()).unwrap())
        .unwrap();
    let mut analysis =
        AcAnalysis::new(circuit, BiasingConfig::default(), FrequencyConfig::list(vec![1e3])).unwrap();
    let result = analysis.run().unwrap();

    let v_op = analysis.simulation().value("out").unwrap();
    let reference = Diode::new("D", "a", "0", DiodeParams::default()).unwrap();
    let (_, gd) = reference.evaluate(v_op, BiasingConfig::default().gmin);
    let expected = (1.0 / gd) / (1e3 + 1.0 / gd);
    assert_relative_eq!(result.phasor("out").unwrap()[0].norm(), expected, max_relative = 1e-2);
}

#[test]
fn test_empty_frequency_list() {
    assert!(matches!(
        AcAnalysis::new(lowpass(), BiasingConfig::default(), FrequencyConfig::list(Vec::new())),
        Err(EngineError::InvalidConfig { .. })
    ));
}
