use super::{Context, Report};
use crate::{
    circuit::{Circuit, SinusoidalSource, GND},
    error::Result,
    format::format_output,
    plot::Figure,
    simulation::{AnalysisKind, Variation},
};
use std::f64::consts::FRAC_1_SQRT_2;
use tracing::info;

pub fn circuit() -> Result<Circuit> {
    let mut circuit = Circuit::new("RC low-pass filter");
    circuit.sinusoidal_voltage("input", "A", GND, SinusoidalSource::new(10.0, 500.0))?;
    circuit.resistor("1", "A", "output", 100.0)?;
    circuit.capacitor("1", "output", GND, 10e-9)?;
    Ok(circuit)
}

pub fn run(ctx: &mut Context) -> Result<Report> {
    let circuit = circuit()?;
    info!("circuit netlist:\n{}", circuit);
    let analysis = ctx.simulator(&circuit).ac(20e3, 20e6, 10, Variation::Dec)?;
    let (voltages, currents) = format_output(&analysis, AnalysisKind::Ac)?;

    let frequency = voltages.waveform("frequency")?;
    let magnitude = voltages.magnitude("output")?;
    let phase = voltages.phase("output")?.mapv(f64::to_degrees);

    let mut figure = Figure::new(2, 1);
    figure
        .ax(0)
        .set_title("Magnitude")
        .set_xlabel("Frequency [Hz]")
        .set_ylabel("Voltage [V]")
        .grid()
        .set_xscale_log()
        .set_ylim(-0.1, 1.1)
        .plot("output", frequency.iter().copied(), magnitude.iter().copied());
    figure
        .ax(1)
        .set_title("Phase")
        .set_xlabel("Frequency [Hz]")
        .set_ylabel("Phase [°]")
        .grid()
        .set_xscale_log()
        .set_ylim(-190.0, 190.0)
        .plot("output", frequency.iter().copied(), phase.iter().copied());

    let mut report = Report::default();
    //first sweep point at or below -3 dB
    if let Some(index) = magnitude.iter().position(|m| *m <= FRAC_1_SQRT_2) {
        report.measure("-3 dB frequency", frequency[index], "Hz");
    }
    ctx.save_figure(&figure, "RC-lowpass.svg", &mut report)?;
    ctx.save_csv("RC-lowpass.csv", AnalysisKind::Ac, &voltages, &currents, &mut report)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{circuit, run};
    use crate::{
        demos::tests::{context, synthetic},
        simulation::{RawVector, Request, Variation},
    };
    use num_complex::Complex64;

    #[test]
    fn netlist() {
        assert_eq!(
            vec![
                ".title RC low-pass filter",
                "Vinput A 0 DC 0 AC 1 SIN(0 10 500 0 0)",
                "R1 A output 100",
                "C1 output 0 10n",
            ],
            circuit().unwrap().netlist(false)
        );
    }

    #[test]
    fn sweep_and_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        //first order low-pass with the same corner as the circuit
        let corner = 1.0 / (2.0 * std::f64::consts::PI * 100.0 * 10e-9);
        let backend = synthetic(move |_, request| {
            assert_eq!(
                &Request::Ac {
                    start_frequency: 20e3,
                    stop_frequency: 20e6,
                    number_of_points: 10,
                    variation: Variation::Dec,
                },
                request
            );
            let frequencies: Vec<f64> = (0..=30).map(|i| 20e3 * 10f64.powf(i as f64 / 10.0)).collect();
            vec![
                RawVector {
                    name: "frequency".to_string(),
                    data: frequencies.iter().map(|f| Complex64::new(*f, 0.0)).collect(),
                },
                RawVector {
                    name: "output".to_string(),
                    data: frequencies
                        .iter()
                        .map(|f| Complex64::new(1.0, 0.0) / Complex64::new(1.0, f / corner))
                        .collect(),
                },
            ]
        });
        let results = dir.path().join("results");
        let mut ctx = context(backend, results.clone());
        let report = run(&mut ctx).unwrap();
        let cutoff = report.get("-3 dB frequency").unwrap();
        assert!(cutoff >= corner && cutoff < corner * 1.3, "{}", cutoff);
        assert!(results.join("RC-lowpass.svg").is_file());
        assert!(results.join("RC-lowpass.csv").is_file());
    }
}
