//! mna - run the built-in demo circuits through the engine.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug mna rc --method gear --max-order 3
//! ```

use clap::{Parser, ValueEnum};
use mna_engine::{
    components::{Capacitor, Diode, DiodeParams, Pulse, Resistor, VoltageSource, Waveform},
    error::Result,
    integration::MethodKind,
    simulation::{operating_point, AcAnalysis, BiasingConfig, FrequencyConfig, TimeConfig, Transient},
    Circuit,
};

/// Demo circuits
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Demo {
    /// 5 V over two 1 kΩ resistors (operating point)
    Divider,
    /// 1 kΩ / 1 µF charging from a 1 V step (transient)
    Rc,
    /// 5 V through 1 kΩ into a diode (operating point)
    Diode,
    /// 1 kΩ / 1 µF low-pass (AC sweep)
    Lowpass,
}

/// Sparse MNA circuit simulation engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Circuit to simulate
    #[arg(value_enum)]
    demo: Demo,

    /// Integration method for transient runs
    #[arg(short, long, value_enum, default_value_t = MethodKind::Trapezoidal)]
    method: MethodKind,

    /// Maximum integration order
    #[arg(long, default_value_t = 2)]
    max_order: usize,

    /// Relative tolerance
    #[arg(long, default_value_t = 1e-3)]
    reltol: f64,

    /// Absolute current tolerance
    #[arg(long, default_value_t = 1e-12)]
    abstol: f64,

    /// Final time of transient runs (seconds)
    #[arg(long, default_value_t = 5e-3)]
    stop: f64,

    /// Output step of transient runs (seconds)
    #[arg(long, default_value_t = 1e-4)]
    step: f64,
}

fn divider() -> Result<Circuit> {
    Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 5.0)?)?
        .with(Resistor::new("R1", "in", "out", 1e3)?)?
        .with(Resistor::new("R2", "out", "0", 1e3)?)
}

fn rc() -> Result<Circuit> {
    let step = Waveform::Pulse(Pulse::step(0.0, 1.0, 0.0, 1e-9));
    Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 0.0)?.with_waveform(step)?)?
        .with(Resistor::new("R1", "in", "out", 1e3)?)?
        .with(Capacitor::new("C1", "out", "0", 1e-6)?)
}

fn diode() -> Result<Circuit> {
    Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 5.0)?)?
        .with(Resistor::new("R1", "in", "out", 1e3)?)?
        .with(Diode::new("D1", "out", "0", DiodeParams::default())?)
}

fn lowpass() -> Result<Circuit> {
    Circuit::new()
        .with(VoltageSource::new("V1", "in", "0", 0.0)?.with_ac(1.0, 0.0))?
        .with(Resistor::new("R1", "in", "out", 1e3)?)?
        .with(Capacitor::new("C1", "out", "0", 1e-6)?)
}

fn main() -> Result<()> {
    // Engine logs go to stderr, e.g. RUST_LOG=debug
    env_logger::init();
    let args = Args::parse();

    let biasing = BiasingConfig::new()
        .with_rel_tol(args.reltol)
        .with_abs_tol(args.abstol);

    match args.demo {
        Demo::Divider | Demo::Diode => {
            let circuit = match args.demo {
                Demo::Divider => divider()?,
                _ => diode()?,
            };
            let op = operating_point(circuit, biasing)?;
            for (index, variable) in op.variables.iter().skip(1) {
                println!("{:<16} {:>14.6e}", variable.to_string(), op.solution[index]);
            }
            println!("iterations: {}", op.iterations);
        }
        Demo::Rc => {
            let time = TimeConfig::new(args.step, args.stop).with_method(args.method, args.max_order);
            let result = Transient::new(rc()?, biasing, time)?.run()?;
            let out = result.waveform("out")?;
            println!("{:>14} {:>14}", "time", "V(out)");
            for (t, v) in result.times().iter().zip(out) {
                println!("{:>14.6e} {:>14.6e}", t, v);
            }
            let stats = result.statistics();
            println!(
                "accepted: {}, rejected: {}, iterations: {}",
                stats.accepted, stats.rejected, stats.iterations
            );
        }
        Demo::Lowpass => {
            let frequencies = FrequencyConfig::decade(10, 1.0, 1e5);
            let result = AcAnalysis::new(lowpass()?, biasing, frequencies)?.run()?;
            let magnitude = result.magnitude_db("out")?;
            let phase = result.phase_deg("out")?;
            println!("{:>14} {:>10} {:>10}", "frequency", "dB", "deg");
            for ((f, m), p) in result.frequencies().iter().zip(magnitude).zip(phase) {
                println!("{:>14.6e} {:>10.3} {:>10.2}", f, m, p);
            }
        }
    }

    Ok(())
}
