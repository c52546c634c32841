use super::{current_limits, extremes, gate_pulse, include_model, voltage_limits, Context, Report};
use crate::{
    circuit::{Circuit, SinusoidalSource, GND},
    error::Result,
    format::{format_output, Outputs},
    library::SpiceLibrary,
    plot::{Axes, Figure},
    simulation::AnalysisKind,
};
use ndarray::Array1;
use tracing::info;

pub const SCR: &str = "EC103D1";
pub const PERIODS: f64 = 6.0;

pub fn source() -> SinusoidalSource {
    SinusoidalSource::new(220.0, 50.0)
}

/// Resistive load, the same filtered with 1 mF, then an RL load.
pub fn circuits(library: &SpiceLibrary, alpha: f64) -> Result<Vec<Circuit>> {
    let source = source();
    let period = source.period();
    let mut circuit = Circuit::new("Full converter with SCR");
    circuit.sinusoidal_voltage("input", "A", "B", source)?;
    circuit.pulse_voltage("trigger1", "gate1", "output", gate_pulse(period, alpha, false, 1.0))?;
    circuit.pulse_voltage("trigger2", "gate2", "B", gate_pulse(period, alpha, false, 1.0))?;
    circuit.pulse_voltage("trigger3", "gate3", "output", gate_pulse(period, alpha, true, 1.0))?;
    circuit.pulse_voltage("trigger4", "gate4", "A", gate_pulse(period, alpha, true, 1.0))?;

    include_model(&mut circuit, library, SCR)?;
    circuit.circuit("t1", &["A", "gate1", "output"], SCR)?;
    circuit.circuit("t2", &[GND, "gate2", "B"], SCR)?;
    circuit.circuit("t3", &["B", "gate3", "output"], SCR)?;
    circuit.circuit("t4", &[GND, "gate4", "A"], SCR)?;
    circuit.resistor("load", "output", GND, 100.0)?;

    let mut filtered = circuit.clone();
    filtered.capacitor("1", "output", GND, 1e-3)?;

    let mut inductive = filtered.clone();
    inductive.detach("C1")?;
    inductive.detach("Rload")?;
    inductive.resistor("_load", "output", "RL", 0.5)?;
    inductive.inductor("_load", "RL", GND, 10e-3)?;
    Ok(vec![circuit, filtered, inductive])
}

/// Input, gate and output voltages into `axes`.
fn plot_voltages(axes: &mut Axes, title: &str, voltages: &Outputs) -> Result<()> {
    let time = voltages.waveform("time")?;
    let input: Array1<f64> = voltages.waveform("a")? - voltages.waveform("b")?;
    let (min, max) = voltage_limits(source().amplitude);
    axes.set_title(title)
        .set_xlabel("Time [s]")
        .set_ylabel("Voltage [V]")
        .grid()
        .set_ylim(min, max)
        .plot("input", time.iter().copied(), input.iter().copied());
    for node in ["gate1", "gate2", "output"] {
        axes.plot(node, time.iter().copied(), voltages.waveform(node)?.iter().copied());
    }
    Ok(())
}

pub fn run(ctx: &mut Context, alpha: f64) -> Result<Report> {
    let period = source().period();
    let circuits = circuits(&ctx.library, alpha)?;
    let variants = [
        ("Full converter with resistive load", period / 5000.0),
        ("Full converter with resistive load -- Filtered", period / 200.0),
        ("Full converter with RL load", period / 5000.0),
    ];
    let mut figure1 = Figure::new(2, 1);
    let mut figure2 = Figure::new(2, 1);
    let mut report = Report::default();

    for (index, (circuit, (title, step))) in circuits.iter().zip(variants).enumerate() {
        info!("circuit netlist:\n{}", circuit);
        let analysis = ctx.simulator(circuit).transient(step, period * PERIODS)?;
        let (voltages, currents) = format_output(&analysis, AnalysisKind::Transient)?;
        let axes = if index < 2 { figure1.ax(index) } else { figure2.ax(0) };
        plot_voltages(axes, title, &voltages)?;

        let (_, peak) = extremes(voltages.waveform("output")?);
        report.measure(&format!("{}: peak output", title), peak, "V");
        if index == 2 {
            let time = voltages.waveform("time")?;
            let load_current = currents.waveform("l_load")?;
            let (min, max) = current_limits(load_current);
            figure2
                .ax(1)
                .set_title("Full converter with RL load - Current")
                .set_xlabel("Time [s]")
                .set_ylabel("Current [A]")
                .grid()
                .set_ylim(min, max)
                .plot("Load current", time.iter().copied(), load_current.iter().copied());
            let (min_current, max_current) = extremes(load_current);
            report.measure("max load current", max_current, "A");
            report.measure("min load current", min_current, "A");
        }
        ctx.save_csv(
            &format!("full-converter-{}.csv", index + 1),
            AnalysisKind::Transient,
            &voltages,
            &currents,
            &mut report,
        )?;
    }
    ctx.save_figure(&figure1, "full-converter.svg", &mut report)?;
    ctx.save_figure(&figure2, "full-converter-RL.svg", &mut report)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{circuits, run};
    use crate::{
        demos::tests::{context, library, real, synthetic},
        simulation::Request,
    };

    #[test]
    fn bridge_netlist() {
        let (_dir, library) = library();
        let circuits = circuits(&library, 0.3).unwrap();
        assert_eq!(3, circuits.len());
        let netlist = circuits[0].netlist(false);
        for line in [
            "Vinput A B DC 0 AC 1 SIN(0 220 50 0 0)",
            "Vtrigger1 gate1 output PULSE(0 1 3m 1m 1m 7m 20m)",
            "Vtrigger2 gate2 B PULSE(0 1 3m 1m 1m 7m 20m)",
            "Vtrigger3 gate3 output PULSE(0 1 13m 1m 1m 7m 20m)",
            "Vtrigger4 gate4 A PULSE(0 1 13m 1m 1m 7m 20m)",
            "Xt1 A gate1 output EC103D1",
            "Xt2 0 gate2 B EC103D1",
            "Xt3 B gate3 output EC103D1",
            "Xt4 0 gate4 A EC103D1",
            "Rload output 0 100",
        ] {
            assert!(netlist.contains(&line.to_string()), "{}", line);
        }
    }

    #[test]
    fn rl_variant_replaces_load() {
        let (_dir, library) = library();
        let circuits = circuits(&library, 0.3).unwrap();
        let elements: Vec<&str> = circuits[2].elements().collect();
        assert!(!elements.contains(&"C1"));
        assert!(!elements.contains(&"Rload"));
        assert_eq!(&["R_load", "L_load"], &elements[elements.len() - 2..]);
        assert!(circuits[1].elements().any(|e| e == "C1"));
    }

    #[test]
    fn three_simulations() {
        let dir = tempfile::tempdir().unwrap();
        let backend = synthetic(|netlist, request| {
            let step = match request {
                Request::Transient(tran) => tran.step_time,
                other => panic!("unexpected {:?}", other),
            };
            let time: Vec<f64> = (0..50).map(|i| i as f64 * 1e-3).collect();
            let mut vectors = vec![
                real("time", time.iter().copied()),
                real("a", time.iter().map(|_| 110.0)),
                real("b", time.iter().map(|_| -110.0)),
                real("gate1", time.iter().map(|_| 0.0)),
                real("gate2", time.iter().map(|_| 0.0)),
                real("output", time.iter().map(move |t| step * 1e4 + t)),
            ];
            if netlist.iter().any(|l| l.starts_with("L_load")) {
                vectors.push(real("l_load#branch", time.iter().map(|t| 10.0 * t)));
            }
            vectors
        });
        let mut ctx = context(backend, dir.path().join("results"));
        let report = run(&mut ctx, 0.3).unwrap();
        assert_eq!(Some(0.0), report.get("min load current"));
        assert!((report.get("max load current").unwrap() - 0.49).abs() < 1e-12);
        //three csv files and two figures
        assert_eq!(5, report.files.len());
    }
}
