use super::{extremes, gate_pulse, include_model, voltage_limits, Context, Report};
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

pub fn source() -> SinusoidalSource {
    SinusoidalSource::new(10.0, 50.0)
}

/// Unfiltered rectifier followed by the variant with a 1 mF filter capacitor.
pub fn circuits(library: &SpiceLibrary, alpha: f64) -> Result<Vec<Circuit>> {
    let source = source();
    let mut circuit = Circuit::new("SCR half wave rectifier");
    circuit.sinusoidal_voltage("input", "source", GND, source.clone())?;
    circuit.pulse_voltage("trigger", "gate", "output", gate_pulse(source.period(), alpha, false, 1.0))?;
    include_model(&mut circuit, library, SCR)?;
    circuit.circuit("SCR", &["source", "gate", "output"], SCR)?;
    circuit.resistor("load", "output", GND, 100.0)?;

    let mut filtered = circuit.clone();
    filtered.capacitor("1", "output", GND, 1e-3)?;
    Ok(vec![circuit, filtered])
}

pub fn run(ctx: &mut Context, alpha: f64) -> Result<Report> {
    let source = source();
    let period = source.period();
    let circuits = circuits(&ctx.library, alpha)?;
    let titles = ["Half-Wave Rectification", "Half-Wave Rectification with filtering"];
    let mut figure = Figure::new(1, 2);
    let mut report = Report::default();

    for (index, (circuit, title)) in circuits.iter().zip(titles).enumerate() {
        info!("circuit netlist:\n{}", circuit);
        let analysis = ctx.simulator(circuit).transient(period / 200.0, period * 2.0)?;
        let (voltages, currents) = format_output(&analysis, AnalysisKind::Transient)?;
        let time = voltages.waveform("time")?;
        let output = voltages.waveform("output")?;
        let (min, max) = voltage_limits(source.amplitude);
        let axes = figure
            .ax(index)
            .set_title(title)
            .set_xlabel("Time [s]")
            .set_ylabel("Voltage [V]")
            .grid()
            .set_ylim(min, max);
        for node in ["source", "gate"] {
            axes.plot(node, time.iter().copied(), voltages.waveform(node)?.iter().copied());
        }
        axes.plot("output", time.iter().copied(), output.iter().copied());

        let (_, peak) = extremes(output);
        report.measure(&format!("{}: peak output", title), peak, "V");
        ctx.save_csv(
            &format!("SCR-half-wave-rectifier-{}.csv", index + 1),
            AnalysisKind::Transient,
            &voltages,
            &currents,
            &mut report,
        )?;
    }
    ctx.save_figure(&figure, "SCR-half-wave-rectifier.svg", &mut report)?;
    Ok(report)
}
