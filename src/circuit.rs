use crate::{
    error::{Error, Result},
    units::format_si,
};
use std::{
    fmt,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

/// Name of the ground node.
pub const GND: &str = "0";

/// Sinusoidal voltage source parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SinusoidalSource {
    pub dc_offset: f64,
    pub offset: f64,
    pub amplitude: f64,
    pub frequency: f64,
    pub delay: f64,
    pub damping_factor: f64,
    pub ac_magnitude: f64,
}

impl Default for SinusoidalSource {
    fn default() -> Self {
        Self {
            dc_offset: 0.0,
            offset: 0.0,
            amplitude: 1.0,
            frequency: 50.0,
            delay: 0.0,
            damping_factor: 0.0,
            ac_magnitude: 1.0,
        }
    }
}

impl SinusoidalSource {
    pub fn new(amplitude: f64, frequency: f64) -> Self {
        Self {
            amplitude,
            frequency,
            ..Default::default()
        }
    }

    pub fn period(&self) -> f64 {
        1.0 / self.frequency
    }
}

impl fmt::Display for SinusoidalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DC {} AC {} SIN({} {} {} {} {})",
            format_si(self.dc_offset),
            format_si(self.ac_magnitude),
            format_si(self.offset),
            format_si(self.amplitude),
            format_si(self.frequency),
            format_si(self.delay),
            format_si(self.damping_factor),
        )
    }
}

/// Pulse voltage source parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseSource {
    pub initial_value: f64,
    pub pulsed_value: f64,
    pub delay_time: f64,
    pub rise_time: f64,
    pub fall_time: f64,
    pub pulse_width: f64,
    pub period: f64,
}

impl fmt::Display for PulseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PULSE({} {} {} {} {} {} {})",
            format_si(self.initial_value),
            format_si(self.pulsed_value),
            format_si(self.delay_time),
            format_si(self.rise_time),
            format_si(self.fall_time),
            format_si(self.pulse_width),
            format_si(self.period),
        )
    }
}

/// Waveform of a voltage source.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Dc(f64),
    Sinusoidal(SinusoidalSource),
    Pulse(PulseSource),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Dc(value) => write!(f, "DC {}", format_si(*value)),
            Source::Sinusoidal(source) => source.fmt(f),
            Source::Pulse(source) => source.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CircuitItem {
    R(String, String, String, String),
    C(String, String, String, String),
    L(String, String, String, String),
    D(String, String, String, String),
    Q(String, String, String, String, String),
    X(String, Vec<String>, String),
    V(String, String, String, Source),
}

impl CircuitItem {
    fn name(&self) -> &str {
        match self {
            CircuitItem::R(name, ..)
            | CircuitItem::C(name, ..)
            | CircuitItem::L(name, ..)
            | CircuitItem::D(name, ..)
            | CircuitItem::Q(name, ..)
            | CircuitItem::X(name, ..)
            | CircuitItem::V(name, ..) => name,
        }
    }
}

impl fmt::Display for CircuitItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitItem::R(name, n0, n1, value)
            | CircuitItem::C(name, n0, n1, value)
            | CircuitItem::L(name, n0, n1, value)
            | CircuitItem::D(name, n0, n1, value) => write!(f, "{} {} {} {}", name, n0, n1, value),
            CircuitItem::Q(name, c, b, e, model) => write!(f, "{} {} {} {} {}", name, c, b, e, model),
            CircuitItem::X(name, nodes, model) => write!(f, "{} {} {}", name, nodes.join(" "), model),
            CircuitItem::V(name, n0, n1, source) => write!(f, "{} {} {} {}", name, n0, n1, source),
        }
    }
}

/// Full element name: the element letter followed by the reference,
/// unless the reference already starts with that letter.
fn element_name(letter: char, reference: &str) -> String {
    if reference.starts_with(letter) {
        reference.to_string()
    } else {
        format!("{}{}", letter, reference)
    }
}

/// A netlist under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    title: String,
    includes: Vec<PathBuf>,
    items: Vec<CircuitItem>,
    subcircuits: Vec<(String, Vec<String>, Circuit)>,
}

impl Circuit {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            includes: Vec::new(),
            items: Vec::new(),
            subcircuits: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Full names of the elements in insertion order.
    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(CircuitItem::name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.name().eq_ignore_ascii_case(name))
    }

    fn push(&mut self, item: CircuitItem) -> Result<&mut Self> {
        if self.contains(item.name()) {
            return Err(Error::DuplicateElement(item.name().to_string()));
        }
        self.items.push(item);
        Ok(self)
    }

    pub fn include<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        let path = path.as_ref().to_path_buf();
        if !self.includes.contains(&path) {
            self.includes.push(path);
        }
        self
    }

    pub fn resistor(&mut self, reference: &str, n0: &str, n1: &str, value: f64) -> Result<&mut Self> {
        self.push(CircuitItem::R(
            element_name('R', reference),
            n0.to_string(),
            n1.to_string(),
            format_si(value),
        ))
    }

    pub fn capacitor(&mut self, reference: &str, n0: &str, n1: &str, value: f64) -> Result<&mut Self> {
        self.push(CircuitItem::C(
            element_name('C', reference),
            n0.to_string(),
            n1.to_string(),
            format_si(value),
        ))
    }

    pub fn inductor(&mut self, reference: &str, n0: &str, n1: &str, value: f64) -> Result<&mut Self> {
        self.push(CircuitItem::L(
            element_name('L', reference),
            n0.to_string(),
            n1.to_string(),
            format_si(value),
        ))
    }

    pub fn diode(&mut self, reference: &str, anode: &str, cathode: &str, model: &str) -> Result<&mut Self> {
        self.push(CircuitItem::D(
            element_name('D', reference),
            anode.to_string(),
            cathode.to_string(),
            model.to_string(),
        ))
    }

    pub fn bjt(
        &mut self,
        reference: &str,
        collector: &str,
        base: &str,
        emitter: &str,
        model: &str,
    ) -> Result<&mut Self> {
        self.push(CircuitItem::Q(
            element_name('Q', reference),
            collector.to_string(),
            base.to_string(),
            emitter.to_string(),
            model.to_string(),
        ))
    }

    /// Instantiate the sub-circuit `model` with its pins wired to `nodes`.
    pub fn circuit(&mut self, reference: &str, nodes: &[&str], model: &str) -> Result<&mut Self> {
        self.push(CircuitItem::X(
            element_name('X', reference),
            nodes.iter().map(|n| n.to_string()).collect(),
            model.to_string(),
        ))
    }

    /// Define a local `.subckt` block.
    pub fn subcircuit(&mut self, name: &str, pins: &[&str], circuit: Circuit) -> &mut Self {
        let pins = pins.iter().map(|p| p.to_string()).collect();
        if let Some(existing) = self.subcircuits.iter_mut().find(|(n, ..)| n == name) {
            *existing = (name.to_string(), pins, circuit);
        } else {
            self.subcircuits.push((name.to_string(), pins, circuit));
        }
        self
    }

    pub fn voltage(&mut self, reference: &str, n0: &str, n1: &str, value: f64) -> Result<&mut Self> {
        self.push(CircuitItem::V(
            element_name('V', reference),
            n0.to_string(),
            n1.to_string(),
            Source::Dc(value),
        ))
    }

    pub fn sinusoidal_voltage(
        &mut self,
        reference: &str,
        n0: &str,
        n1: &str,
        source: SinusoidalSource,
    ) -> Result<&mut Self> {
        self.push(CircuitItem::V(
            element_name('V', reference),
            n0.to_string(),
            n1.to_string(),
            Source::Sinusoidal(source),
        ))
    }

    pub fn pulse_voltage(&mut self, reference: &str, n0: &str, n1: &str, source: PulseSource) -> Result<&mut Self> {
        self.push(CircuitItem::V(
            element_name('V', reference),
            n0.to_string(),
            n1.to_string(),
            Source::Pulse(source),
        ))
    }

    /// Remove the element with the full name `name`, e.g. `Rload`.
    pub fn detach(&mut self, name: &str) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::UnknownCircuitElement(name.to_string()))?;
        self.items.remove(index);
        Ok(())
    }

    /// Change the value of a resistor, capacitor, inductor or DC source.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::UnknownCircuitElement(name.to_string()))?;
        match &mut self.items[index] {
            CircuitItem::R(_, _, _, v) | CircuitItem::C(_, _, _, v) | CircuitItem::L(_, _, _, v) => {
                *v = format_si(value);
                Ok(())
            }
            CircuitItem::V(_, _, _, source) if matches!(source, Source::Dc(_)) => {
                *source = Source::Dc(value);
                Ok(())
            }
            _ => Err(Error::InvalidValue(format!("{} has no scalar value", name))),
        }
    }

    /// The netlist lines, terminated with `.end` when `close` is set.
    pub fn netlist(&self, close: bool) -> Vec<String> {
        let mut res = vec![format!(".title {}", self.title)];
        res.extend(self.body());
        if close {
            res.push(String::from(".end"));
        }
        res
    }

    fn body(&self) -> Vec<String> {
        let mut res = Vec::new();
        for include in &self.includes {
            res.push(format!(".include {}", include.display()));
        }
        for (name, pins, circuit) in &self.subcircuits {
            res.push(format!(".subckt {} {}", name, pins.join(" ")));
            res.extend(circuit.body());
            res.push(format!(".ends {}", name));
        }
        for item in &self.items {
            res.push(item.to_string());
        }
        res
    }

    pub fn save<P: AsRef<Path>>(&self, path: Option<P>) -> Result<()> {
        let mut out: Box<dyn Write> = if let Some(path) = path {
            Box::new(File::create(path)?)
        } else {
            Box::new(std::io::stdout())
        };
        for line in self.netlist(true) {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;
        Ok(())
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.netlist(false) {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
