use super::{current_limits, extremes, gate_pulse, include_model, voltage_limits, Context, Report};
use crate::{
    circuit::{Circuit, SinusoidalSource, GND},
    error::Result,
    format::format_output,
    library::SpiceLibrary,
    plot::Figure,
    simulation::AnalysisKind,
};
use tracing::info;

pub const SCR: &str = "EC103D1";
pub const DIODE: &str = "1N4148";
/// Periods of the source shown.
pub const PERIODS: f64 = 20.0;

pub fn source() -> SinusoidalSource {
    SinusoidalSource::new(10.0, 50.0)
}

/// RL load with flyback diode, then the same with a 10 mF filter capacitor.
pub fn circuits(library: &SpiceLibrary, alpha: f64) -> Result<Vec<Circuit>> {
    let source = source();
    let mut circuit = Circuit::new("SCR half wave rectifier");
    circuit.sinusoidal_voltage("input", "source", GND, source.clone())?;
    circuit.pulse_voltage("trigger", "gate", "output", gate_pulse(source.period(), alpha, false, 1.0))?;
    include_model(&mut circuit, library, SCR)?;
    circuit.circuit("SCR", &["source", "gate", "output"], SCR)?;
    include_model(&mut circuit, library, DIODE)?;
    circuit.circuit("Dm", &[GND, "output"], DIODE)?;
    circuit.resistor("load", "output", "RL_middle", 10.0)?;
    circuit.inductor("1", "RL_middle", GND, 100e-3)?;

    let mut filtered = circuit.clone();
    filtered.capacitor("1", "output", GND, 10e-3)?;
    Ok(vec![circuit, filtered])
}

pub fn run(ctx: &mut Context, alpha: f64) -> Result<Report> {
    let source = source();
    let period = source.period();
    let circuits = circuits(&ctx.library, alpha)?;
    let variants = [
        ("Half-Wave Rectification", "SCR-half-wave-rectifier-RL"),
        ("Half-Wave Rectification with filtering", "SCR-half-wave-rectifier-RL-filtered"),
    ];
    let mut report = Report::default();

    for (circuit, (title, file_name)) in circuits.iter().zip(variants) {
        info!("circuit netlist:\n{}", circuit);
        let mut simulator = ctx.simulator(circuit);
        simulator.save_currents = true;
        let analysis = simulator.transient(period / 200.0, period * PERIODS)?;
        let (voltages, currents) = format_output(&analysis, AnalysisKind::Transient)?;
        let time = voltages.waveform("time")?;
        let load_current = currents.waveform("l1")?;

        let mut figure = Figure::new(2, 1);
        let (min, max) = voltage_limits(source.amplitude);
        let axes = figure
            .ax(0)
            .set_title(&format!("{} - Voltage", title))
            .set_xlabel("Time [s]")
            .set_ylabel("Voltage [V]")
            .grid()
            .set_ylim(min, max);
        for node in ["source", "gate", "output"] {
            axes.plot(node, time.iter().copied(), voltages.waveform(node)?.iter().copied());
        }
        let (min, max) = current_limits(load_current);
        figure
            .ax(1)
            .set_title(&format!("{} - Current", title))
            .set_xlabel("Time [s]")
            .set_ylabel("Current [A]")
            .grid()
            .set_ylim(min, max)
            .plot("l1", time.iter().copied(), load_current.iter().copied());

        let (min_current, max_current) = extremes(load_current);
        report.measure(&format!("{}: max load current", title), max_current, "A");
        report.measure(&format!("{}: min load current", title), min_current, "A");
        ctx.save_figure(&figure, &format!("{}.svg", file_name), &mut report)?;
        ctx.save_csv(
            &format!("{}.csv", file_name),
            AnalysisKind::Transient,
            &voltages,
            &currents,
            &mut report,
        )?;
    }
    Ok(report)
}
