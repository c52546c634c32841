use super::{Context, Report};
use crate::{
    circuit::{Circuit, GND},
    error::Result,
    format::format_output,
    simulation::AnalysisKind,
};
use tracing::info;

pub fn circuit() -> Result<Circuit> {
    let mut circuit = Circuit::new("Voltage divider");
    circuit.voltage("in", "input", GND, 10.0)?;
    circuit.resistor("1", "input", "out", 8e3)?;
    circuit.resistor("2", "out", GND, 2e3)?;
    Ok(circuit)
}

pub fn run(ctx: &mut Context) -> Result<Report> {
    let circuit = circuit()?;
    info!("circuit netlist:\n{}", circuit);
    let analysis = ctx.simulator(&circuit).operating_point()?;
    let (voltages, currents) = format_output(&analysis, AnalysisKind::OperatingPoint)?;

    let mut report = Report::default();
    report.measure("V(out)", voltages.scalar("out")?, "V");
    ctx.save_csv(
        "voltage-divider.csv",
        AnalysisKind::OperatingPoint,
        &voltages,
        &currents,
        &mut report,
    )?;
    Ok(report)
}
