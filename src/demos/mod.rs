//! The demonstration circuits.
//!
//! Every demo builds its circuits without touching the simulator, so the
//! netlists can be printed and tested on their own, and runs them through the
//! [`Backend`] of a [`Context`].

mod bridge_inverter;
mod full_converter;
mod rc_lowpass;
mod scr_half_wave;
mod scr_half_wave_rl;
mod voltage_divider;

use crate::{
    circuit::{Circuit, PulseSource},
    error::{Error, Result},
    format::Outputs,
    library::SpiceLibrary,
    output::{output_file_name, write_ac_csv, write_operating_point_csv, write_transient_csv},
    plot::Figure,
    simulation::{AnalysisKind, Backend, Simulator},
};
use ndarray::Array1;
use std::{fmt, fs::File, io::BufWriter, path::PathBuf, str::FromStr};
use tracing::info;

/// Rise and fall time of the gate pulses.
pub const GATE_EDGE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    VoltageDivider,
    RcLowpass,
    ScrHalfWave,
    ScrHalfWaveRl,
    FullConverter,
    BridgeInverter,
}

impl Demo {
    pub const ALL: [Demo; 6] = [
        Demo::VoltageDivider,
        Demo::RcLowpass,
        Demo::ScrHalfWave,
        Demo::ScrHalfWaveRl,
        Demo::FullConverter,
        Demo::BridgeInverter,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Demo::VoltageDivider => "voltage-divider",
            Demo::RcLowpass => "rc-lowpass",
            Demo::ScrHalfWave => "scr-half-wave",
            Demo::ScrHalfWaveRl => "scr-half-wave-rl",
            Demo::FullConverter => "full-converter",
            Demo::BridgeInverter => "bridge-inverter",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Demo::VoltageDivider => "resistive voltage divider, operating point",
            Demo::RcLowpass => "RC low-pass filter, AC sweep",
            Demo::ScrHalfWave => "SCR half-wave rectifier with resistive load",
            Demo::ScrHalfWaveRl => "SCR half-wave rectifier with RL load and flyback diode",
            Demo::FullConverter => "SCR full converter with R, filtered and RL loads",
            Demo::BridgeInverter => "one phase bridge inverter with R and RL loads",
        }
    }

    /// Trigger angle used when none is given.
    pub fn default_alpha(&self) -> f64 {
        match self {
            Demo::FullConverter | Demo::BridgeInverter => 0.3,
            _ => 0.5,
        }
    }

    /// Whether the demo is gate triggered and takes a trigger angle.
    pub fn triggered(&self) -> bool {
        !matches!(self, Demo::VoltageDivider | Demo::RcLowpass)
    }

    /// The trigger angle to use, validated only for triggered demos.
    fn alpha(&self, alpha: Option<f64>) -> Result<f64> {
        let alpha = alpha.unwrap_or_else(|| self.default_alpha());
        if self.triggered() {
            check_alpha(alpha)
        } else {
            Ok(alpha)
        }
    }

    /// Every circuit variant the demo simulates, in order.
    pub fn circuits(&self, library: &SpiceLibrary, alpha: Option<f64>) -> Result<Vec<Circuit>> {
        let alpha = self.alpha(alpha)?;
        match self {
            Demo::VoltageDivider => Ok(vec![voltage_divider::circuit()?]),
            Demo::RcLowpass => Ok(vec![rc_lowpass::circuit()?]),
            Demo::ScrHalfWave => scr_half_wave::circuits(library, alpha),
            Demo::ScrHalfWaveRl => scr_half_wave_rl::circuits(library, alpha),
            Demo::FullConverter => full_converter::circuits(library, alpha),
            Demo::BridgeInverter => bridge_inverter::circuits(library, alpha),
        }
    }

    pub fn run(&self, ctx: &mut Context) -> Result<Report> {
        let alpha = self.alpha(ctx.alpha)?;
        if self.triggered() {
            info!(demo = self.name(), alpha, "run demo");
        } else {
            info!(demo = self.name(), "run demo");
        }
        match self {
            Demo::VoltageDivider => voltage_divider::run(ctx),
            Demo::RcLowpass => rc_lowpass::run(ctx),
            Demo::ScrHalfWave => scr_half_wave::run(ctx, alpha),
            Demo::ScrHalfWaveRl => scr_half_wave_rl::run(ctx, alpha),
            Demo::FullConverter => full_converter::run(ctx, alpha),
            Demo::BridgeInverter => bridge_inverter::run(ctx, alpha),
        }
    }
}

impl fmt::Display for Demo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Demo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Demo::ALL
            .iter()
            .find(|demo| demo.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Error::UnknownDemo(s.to_string()))
    }
}

fn check_alpha(alpha: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&alpha) {
        Ok(alpha)
    } else {
        Err(Error::InvalidValue(format!("trigger angle {} outside [0, 1]", alpha)))
    }
}

/// Gate pulse firing at trigger angle `alpha` of the positive half wave, or
/// of the negative one when `second_half` is set.
pub fn gate_pulse(period: f64, alpha: f64, second_half: bool, pulsed_value: f64) -> PulseSource {
    let half = period / 2.0;
    PulseSource {
        initial_value: 0.0,
        pulsed_value,
        delay_time: half * alpha + if second_half { half } else { 0.0 },
        rise_time: GATE_EDGE,
        fall_time: GATE_EDGE,
        pulse_width: half * (1.0 - alpha),
        period,
    }
}

/// Add the library file defining `model` to the circuit.
fn include_model(circuit: &mut Circuit, library: &SpiceLibrary, model: &str) -> Result<()> {
    circuit.include(library.get(model)?);
    Ok(())
}

/// Y-limits of a voltage plot.
pub fn voltage_limits(amplitude: f64) -> (f64, f64) {
    (-1.1 * amplitude.abs(), 1.1 * amplitude.abs())
}

/// Y-limits of a current plot: 1.1 times the extremes, `(-1, 1)` around
/// constant or missing data.
pub fn current_limits(values: &Array1<f64>) -> (f64, f64) {
    let (min, max) = extremes(values);
    if !min.is_finite() || !max.is_finite() {
        return (-1.0, 1.0);
    }
    let (low, high) = (1.1 * min, 1.1 * max);
    if low < high {
        (low, high)
    } else {
        (low - 1.0, high + 1.0)
    }
}

/// Minimum and maximum of a waveform, NaN samples skipped.
pub fn extremes(values: &Array1<f64>) -> (f64, f64) {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| (min.min(*v), max.max(*v)))
}

/// A named value reported by a demo.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub label: String,
    pub value: f64,
    pub unit: &'static str,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.label, self.value, self.unit)
    }
}

/// What a demo run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub measurements: Vec<Measurement>,
    pub files: Vec<PathBuf>,
}

impl Report {
    pub fn measure(&mut self, label: &str, value: f64, unit: &'static str) {
        info!(label, value, unit, "measurement");
        self.measurements.push(Measurement {
            label: label.to_string(),
            value,
            unit,
        });
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.measurements.iter().find(|m| m.label == label).map(|m| m.value)
    }
}

/// Everything a demo needs to run.
pub struct Context {
    pub library: SpiceLibrary,
    pub results: PathBuf,
    pub backend: Box<dyn Backend>,
    pub alpha: Option<f64>,
    pub csv: bool,
}

impl Context {
    pub fn simulator<'a>(&'a mut self, circuit: &'a Circuit) -> Simulator<'a> {
        Simulator::new(circuit, self.backend.as_mut())
    }

    /// Save the figure below the results directory.
    pub fn save_figure(&self, figure: &Figure, file_name: &str, report: &mut Report) -> Result<()> {
        let path = output_file_name(&self.results, file_name)?;
        figure.save(&path)?;
        info!(path = %path.display(), "figure written");
        report.files.push(path);
        Ok(())
    }

    /// Export the outputs as CSV when requested.
    pub fn save_csv(
        &self,
        file_name: &str,
        mode: AnalysisKind,
        voltages: &Outputs,
        currents: &Outputs,
        report: &mut Report,
    ) -> Result<()> {
        if !self.csv {
            return Ok(());
        }
        let path = output_file_name(&self.results, file_name)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        match mode {
            AnalysisKind::OperatingPoint => write_operating_point_csv(voltages, currents, &mut writer)?,
            AnalysisKind::Transient => write_transient_csv(voltages, currents, &mut writer)?,
            AnalysisKind::Ac => write_ac_csv(voltages, currents, &mut writer)?,
        }
        info!(path = %path.display(), "csv written");
        report.files.push(path);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::simulation::{RawVector, Request};
    use num_complex::Complex64;
    use std::fs;

    /// A library holding stand-ins for the models the demos include.
    pub fn library() -> (tempfile::TempDir, SpiceLibrary) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("EC103D1.lib"),
            ".SUBCKT EC103D1 A G K\nRGK G K 1k\n.ENDS\n",
        )
        .unwrap();
        fs::write(dir.path().join("1N4148.lib"), ".SUBCKT 1N4148 1 2\nD1 1 2 DX\n.model DX D\n.ENDS\n").unwrap();
        fs::write(dir.path().join("2N2222A.mod"), ".model 2n2222a NPN(BF=200)\n").unwrap();
        let library = SpiceLibrary::new(dir.path()).unwrap();
        (dir, library)
    }

    /// Answers every request with vectors computed from the request.
    pub struct Synthetic<F: FnMut(&[String], &Request) -> Vec<RawVector>> {
        pub respond: F,
        pub requests: Vec<Request>,
    }

    impl<F: FnMut(&[String], &Request) -> Vec<RawVector>> Backend for Synthetic<F> {
        fn run(&mut self, netlist: &[String], request: &Request) -> Result<Vec<RawVector>> {
            self.requests.push(request.clone());
            Ok((self.respond)(netlist, request))
        }
    }

    pub fn synthetic<F: FnMut(&[String], &Request) -> Vec<RawVector>>(respond: F) -> Synthetic<F> {
        Synthetic {
            respond,
            requests: Vec::new(),
        }
    }

    pub fn real(name: &str, values: impl IntoIterator<Item = f64>) -> RawVector {
        RawVector {
            name: name.to_string(),
            data: values.into_iter().map(|v| Complex64::new(v, 0.0)).collect(),
        }
    }

    pub fn context<B: Backend + 'static>(backend: B, results: PathBuf) -> Context {
        let (_dir, library) = library();
        Context {
            library,
            results,
            backend: Box::new(backend),
            alpha: None,
            csv: true,
        }
    }

    #[test]
    fn demo_names() {
        for demo in Demo::ALL {
            assert_eq!(demo, demo.name().parse::<Demo>().unwrap());
        }
        assert!(matches!("buck".parse::<Demo>(), Err(Error::UnknownDemo(_))));
    }

    #[test]
    fn gate_timing() {
        let first = gate_pulse(0.02, 0.5, false, 1.0);
        assert!((first.delay_time - 0.005).abs() < 1e-12);
        assert!((first.pulse_width - 0.005).abs() < 1e-12);
        assert_eq!(GATE_EDGE, first.rise_time);
        assert_eq!(0.02, first.period);
        let second = gate_pulse(0.02, 0.3, true, 1.0);
        assert!((second.delay_time - 0.013).abs() < 1e-12);
        assert!((second.pulse_width - 0.007).abs() < 1e-12);
    }

    #[test]
    fn alpha_range() {
        let (_dir, library) = library();
        assert!(Demo::ScrHalfWave.circuits(&library, Some(1.5)).is_err());
        assert!(Demo::ScrHalfWave.circuits(&library, Some(0.0)).is_ok());
        //the untriggered demos ignore the angle
        assert!(Demo::VoltageDivider.circuits(&library, Some(2.0)).is_ok());
        assert!(Demo::RcLowpass.circuits(&library, Some(-1.0)).is_ok());
    }

    #[test]
    fn run_ignores_unused_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let backend = synthetic(|_, _| vec![real("v(input)", [10.0]), real("v(out)", [2.0])]);
        let mut ctx = context(backend, dir.path().to_path_buf());
        ctx.alpha = Some(2.0);
        assert_eq!(Some(2.0), Demo::VoltageDivider.run(&mut ctx).unwrap().get("V(out)"));
        assert!(matches!(Demo::ScrHalfWave.run(&mut ctx), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn limits() {
        assert_eq!((-11.0, 11.0), voltage_limits(10.0));
        let (low, high) = current_limits(&Array1::from(vec![-1.0, 0.5, 2.0]));
        assert!((low + 1.1).abs() < 1e-12 && (high - 2.2).abs() < 1e-12);
        assert_eq!((-1.0, 1.0), current_limits(&Array1::zeros(3)));
        assert_eq!((-1.0, 1.0), current_limits(&Array1::from(Vec::<f64>::new())));
        assert_eq!((-1.0, 1.0), current_limits(&Array1::from(vec![f64::NAN, f64::NAN])));
    }

    #[test]
    fn plot_missing_current() {
        let dir = tempfile::tempdir().unwrap();
        let empty = Array1::<f64>::zeros(0);
        let (min, max) = current_limits(&empty);
        let mut figure = Figure::new(1, 1);
        figure
            .ax(0)
            .set_ylim(min, max)
            .plot("Load current", empty.iter().copied(), empty.iter().copied());
        figure.save(dir.path().join("current.svg")).unwrap();
        assert!(dir.path().join("current.svg").is_file());
    }

    #[test]
    fn every_demo_builds() {
        let (_dir, library) = library();
        for demo in Demo::ALL {
            let circuits = demo.circuits(&library, None).unwrap();
            assert!(!circuits.is_empty(), "{}", demo);
            for circuit in circuits {
                assert!(circuit.netlist(true).last().unwrap() == ".end");
            }
        }
    }

    #[test]
    fn missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let library = SpiceLibrary::new(dir.path()).unwrap();
        assert!(matches!(
            Demo::FullConverter.circuits(&library, None),
            Err(Error::SpiceModelNotFound(_))
        ));
    }
}
