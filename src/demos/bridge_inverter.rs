use super::{current_limits, extremes, gate_pulse, include_model, voltage_limits, Context, Report};
use crate::{
    circuit::{Circuit, GND},
    error::Result,
    format::format_output,
    library::SpiceLibrary,
    plot::Figure,
    simulation::AnalysisKind,
};
use ndarray::Array1;
use tracing::info;

pub const TRANSISTOR: &str = "2n2222a";
pub const DIODE: &str = "1N4148";
pub const SUPPLY: f64 = 24.0;
pub const FREQUENCY: f64 = 50.0;
/// Gate drive amplitude of the base pulses.
pub const DRIVE: f64 = 5.0;
pub const PERIODS: f64 = 6.0;

/// Bridge legs: transistor reference, collector, emitter and whether the leg
/// conducts in the second half period. Legs 1 and 3 drive the load from A to
/// B, legs 2 and 4 from B to A.
const LEGS: [(&str, &str, &str, bool); 4] = [
    ("1", "supply", "A", false),
    ("2", "supply", "B", true),
    ("3", "B", GND, false),
    ("4", "A", GND, true),
];

/// Resistive load first, then the RL load.
pub fn circuits(library: &SpiceLibrary, alpha: f64) -> Result<Vec<Circuit>> {
    let period = 1.0 / FREQUENCY;
    let mut circuit = Circuit::new("One phase bridge inverter");
    circuit.voltage("supply", "supply", GND, SUPPLY)?;
    include_model(&mut circuit, library, TRANSISTOR)?;
    include_model(&mut circuit, library, DIODE)?;
    for (reference, collector, emitter, second_half) in LEGS {
        let gate = format!("gate{}", reference);
        let base = format!("base{}", reference);
        circuit.pulse_voltage(
            &format!("trigger{}", reference),
            &gate,
            emitter,
            gate_pulse(period, alpha, second_half, DRIVE),
        )?;
        circuit.resistor(&format!("b{}", reference), &gate, &base, 470.0)?;
        circuit.bjt(reference, collector, &base, emitter, TRANSISTOR)?;
        //freewheeling path for inductive loads
        circuit.circuit(&format!("D{}", reference), &[emitter, collector], DIODE)?;
    }
    circuit.resistor("load", "A", "B", 100.0)?;

    let mut inductive = circuit.clone();
    inductive.detach("Rload")?;
    inductive.resistor("_load", "A", "RL", 100.0)?;
    inductive.inductor("_load", "RL", "B", 100e-3)?;
    Ok(vec![circuit, inductive])
}

pub fn run(ctx: &mut Context, alpha: f64) -> Result<Report> {
    let period = 1.0 / FREQUENCY;
    let circuits = circuits(&ctx.library, alpha)?;
    let variants = [
        ("One phase bridge inverter with resistive load", "rload", "bridge-inverter"),
        ("One phase bridge inverter with RL load", "l_load", "bridge-inverter-RL"),
    ];
    let mut report = Report::default();

    for (circuit, (title, branch, file_name)) in circuits.iter().zip(variants) {
        info!("circuit netlist:\n{}", circuit);
        let mut simulator = ctx.simulator(circuit);
        simulator.save_currents = true;
        let analysis = simulator.transient(period / 5000.0, period * PERIODS)?;
        let (voltages, currents) = format_output(&analysis, AnalysisKind::Transient)?;
        let time = voltages.waveform("time")?;
        let output: Array1<f64> = voltages.waveform("a")? - voltages.waveform("b")?;
        let load_current = currents.waveform(branch)?;

        let mut figure = Figure::new(2, 1);
        let (min, max) = voltage_limits(SUPPLY);
        let axes = figure
            .ax(0)
            .set_title(title)
            .set_xlabel("Time [s]")
            .set_ylabel("Voltage [V]")
            .grid()
            .set_ylim(min, max)
            .plot("output", time.iter().copied(), output.iter().copied());
        //low side gates are referenced to ground
        for node in ["gate3", "gate4"] {
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
            .plot("Load current", time.iter().copied(), load_current.iter().copied());

        let (min_output, max_output) = extremes(&output);
        let (min_current, max_current) = extremes(load_current);
        report.measure(&format!("{}: max output", title), max_output, "V");
        report.measure(&format!("{}: min output", title), min_output, "V");
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

#[cfg(test)]
mod tests {
    use super::{circuits, run};
    use crate::demos::tests::{context, library, real, synthetic};

    #[test]
    fn bridge_netlist() {
        let (_dir, library) = library();
        let circuits = circuits(&library, 0.3).unwrap();
        let netlist = circuits[0].netlist(false);
        for line in [
            "Vsupply supply 0 DC 24",
            "Vtrigger1 gate1 A PULSE(0 5 3m 1m 1m 7m 20m)",
            "Rb1 gate1 base1 470",
            "Q1 supply base1 A 2n2222a",
            "XD1 A supply 1N4148",
            "Vtrigger2 gate2 B PULSE(0 5 13m 1m 1m 7m 20m)",
            "Q3 B base3 0 2n2222a",
            "Vtrigger4 gate4 0 PULSE(0 5 13m 1m 1m 7m 20m)",
            "XD4 0 A 1N4148",
            "Rload A B 100",
        ] {
            assert!(netlist.contains(&line.to_string()), "{}", line);
        }
        let inductive = circuits[1].netlist(false);
        assert!(!inductive.contains(&String::from("Rload A B 100")));
        assert!(inductive.contains(&String::from("R_load A RL 100")));
        assert!(inductive.contains(&String::from("L_load RL B 100m")));
    }

    #[test]
    fn output_and_current() {
        let dir = tempfile::tempdir().unwrap();
        let backend = synthetic(|netlist, _| {
            let time: Vec<f64> = (0..200).map(|i| i as f64 * 6e-4).collect();
            let square: Vec<f64> = time
                .iter()
                .map(|t| if (t / 0.01).floor() as i64 % 2 == 0 { 23.0 } else { -23.0 })
                .collect();
            let current = if netlist.iter().any(|l| l.starts_with("L_load")) {
                "l_load#branch"
            } else {
                "@rload[i]"
            };
            vec![
                real("time", time.iter().copied()),
                real("a", square.iter().map(|v| v.max(0.0))),
                real("b", square.iter().map(|v| (-v).max(0.0))),
                real("gate3", time.iter().map(|_| 0.0)),
                real("gate4", time.iter().map(|_| 0.0)),
                real(current, square.iter().map(|v| v / 100.0)),
                real("@q1[ib]", time.iter().map(|_| 1e-3)),
            ]
        });
        let mut ctx = context(backend, dir.path().join("results"));
        ctx.csv = false;
        let report = run(&mut ctx, 0.3).unwrap();
        let title = "One phase bridge inverter with RL load";
        assert_eq!(Some(23.0), report.get(&format!("{}: max output", title)));
        assert_eq!(Some(-23.0), report.get(&format!("{}: min output", title)));
        assert_eq!(Some(0.23), report.get(&format!("{}: max load current", title)));
        assert_eq!(2, report.files.len());
    }
}
