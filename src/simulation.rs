//! Run a [`Circuit`] through ngspice.
//!
//! The [`Simulator`] renders the netlist together with the simulator options
//! and hands it to a [`Backend`]. Two backends exist: [`SharedNgspice`] drives
//! the ngspice shared library, [`BatchNgspice`] runs the `ngspice` executable
//! in batch mode and reads the rawfile it writes.

use crate::{
    circuit::Circuit,
    error::{Error, Result},
    rawfile,
    units::format_si,
};
use elektron_ngspice::{Callbacks, ComplexSlice, NgSpice};
use lazy_static::lazy_static;
use ndarray::Array1;
use num_complex::Complex64;
use regex::Regex;
use std::{
    collections::BTreeMap,
    fmt,
    io::{Read, Write},
    path::PathBuf,
    process::{Command, Stdio},
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

lazy_static! {
    pub static ref RE_BRANCH: Regex = Regex::new(r"^(.+)#branch$").unwrap();
    pub static ref RE_CURRENT: Regex = Regex::new(r"^i\((.+)\)$").unwrap();
    pub static ref RE_DEVICE_CURRENT: Regex = Regex::new(r"^@([^\[]+)\[i\]$").unwrap();
    pub static ref RE_VOLTAGE: Regex = Regex::new(r"^v\((.+)\)$").unwrap();
}

/// The kind of analysis that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    OperatingPoint,
    Transient,
    Ac,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisKind::OperatingPoint => write!(f, "operating_point"),
            AnalysisKind::Transient => write!(f, "transient"),
            AnalysisKind::Ac => write!(f, "ac"),
        }
    }
}

/// Frequency spacing of an AC sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variation {
    Dec,
    Oct,
    Lin,
}

impl fmt::Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variation::Dec => write!(f, "dec"),
            Variation::Oct => write!(f, "oct"),
            Variation::Lin => write!(f, "lin"),
        }
    }
}

/// Transient analysis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Transient {
    pub step_time: f64,
    pub end_time: f64,
    pub start_time: Option<f64>,
    pub max_time: Option<f64>,
    pub use_initial_condition: bool,
}

impl Transient {
    pub fn new(step_time: f64, end_time: f64) -> Self {
        Self {
            step_time,
            end_time,
            start_time: None,
            max_time: None,
            use_initial_condition: false,
        }
    }
}

/// An analysis request, rendered as the ngspice command without the leading dot.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    OperatingPoint,
    Transient(Transient),
    Ac {
        start_frequency: f64,
        stop_frequency: f64,
        number_of_points: u32,
        variation: Variation,
    },
}

impl Request {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            Request::OperatingPoint => AnalysisKind::OperatingPoint,
            Request::Transient(_) => AnalysisKind::Transient,
            Request::Ac { .. } => AnalysisKind::Ac,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::OperatingPoint => write!(f, "op"),
            Request::Transient(tran) => {
                write!(f, "tran {} {}", format_si(tran.step_time), format_si(tran.end_time))?;
                if tran.start_time.is_some() || tran.max_time.is_some() {
                    write!(f, " {}", format_si(tran.start_time.unwrap_or(0.0)))?;
                }
                if let Some(max_time) = tran.max_time {
                    write!(f, " {}", format_si(max_time))?;
                }
                if tran.use_initial_condition {
                    write!(f, " uic")?;
                }
                Ok(())
            }
            Request::Ac {
                start_frequency,
                stop_frequency,
                number_of_points,
                variation,
            } => write!(
                f,
                "ac {} {} {} {}",
                variation,
                number_of_points,
                format_si(*start_frequency),
                format_si(*stop_frequency)
            ),
        }
    }
}

/// A named result vector as the engine reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVector {
    pub name: String,
    pub data: Array1<Complex64>,
}

/// Executes a netlist and returns the vectors of the resulting plot.
pub trait Backend {
    /// `netlist` is the closed netlist, `request` the analysis to run on it.
    fn run(&mut self, netlist: &[String], request: &Request) -> Result<Vec<RawVector>>;
}

/// What a result vector holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorKind {
    Sweep,
    Node(String),
    Branch(String),
    /// Device internals other than currents, e.g. `@q1[ib]`.
    Other,
}

/// Classify a vector by its engine name.
pub fn classify(name: &str) -> VectorKind {
    let name = name.to_lowercase();
    if name == "time" || name == "frequency" {
        VectorKind::Sweep
    } else if let Some(cap) = RE_BRANCH.captures(&name) {
        VectorKind::Branch(cap[1].to_string())
    } else if let Some(cap) = RE_CURRENT.captures(&name) {
        VectorKind::Branch(cap[1].to_string())
    } else if let Some(cap) = RE_DEVICE_CURRENT.captures(&name) {
        VectorKind::Branch(cap[1].to_string())
    } else if name.starts_with('@') {
        VectorKind::Other
    } else if let Some(cap) = RE_VOLTAGE.captures(&name) {
        VectorKind::Node(cap[1].to_string())
    } else {
        VectorKind::Node(name)
    }
}

/// Result of one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub kind: AnalysisKind,
    pub nodes: BTreeMap<String, Array1<Complex64>>,
    pub branches: BTreeMap<String, Array1<Complex64>>,
    /// Time or frequency, absent for the operating point.
    pub sweep: Option<Array1<f64>>,
}

impl Analysis {
    pub fn from_vectors(kind: AnalysisKind, vectors: Vec<RawVector>) -> Self {
        let mut analysis = Self {
            kind,
            nodes: BTreeMap::new(),
            branches: BTreeMap::new(),
            sweep: None,
        };
        for vector in vectors {
            match classify(&vector.name) {
                VectorKind::Sweep => {
                    analysis.sweep = Some(vector.data.mapv(|c| c.re));
                }
                VectorKind::Node(name) => {
                    analysis.nodes.insert(name, vector.data);
                }
                VectorKind::Branch(name) => {
                    analysis.branches.insert(name, vector.data);
                }
                VectorKind::Other => {
                    debug!(name = %vector.name, "skip device vector");
                }
            }
        }
        analysis
    }

    pub fn node(&self, name: &str) -> Result<&Array1<Complex64>> {
        self.nodes
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::MissingVector(name.to_string()))
    }

    pub fn branch(&self, name: &str) -> Result<&Array1<Complex64>> {
        self.branches
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::MissingVector(name.to_string()))
    }
}

/// Simulates a circuit with the given backend.
pub struct Simulator<'a> {
    circuit: &'a Circuit,
    backend: &'a mut dyn Backend,
    pub temperature: f64,
    pub nominal_temperature: f64,
    pub save_currents: bool,
}

impl<'a> Simulator<'a> {
    pub fn new(circuit: &'a Circuit, backend: &'a mut dyn Backend) -> Self {
        Self {
            circuit,
            backend,
            temperature: 25.0,
            nominal_temperature: 25.0,
            save_currents: false,
        }
    }

    /// The closed netlist handed to the backend.
    pub fn netlist(&self) -> Vec<String> {
        let mut res = self.circuit.netlist(false);
        res.push(format!(
            ".options TEMP={} TNOM={}",
            format_si(self.temperature),
            format_si(self.nominal_temperature)
        ));
        if self.save_currents {
            res.push(String::from(".options savecurrents"));
        }
        res.push(String::from(".end"));
        res
    }

    pub fn operating_point(&mut self) -> Result<Analysis> {
        self.run(Request::OperatingPoint)
    }

    pub fn transient(&mut self, step_time: f64, end_time: f64) -> Result<Analysis> {
        self.run(Request::Transient(Transient::new(step_time, end_time)))
    }

    pub fn transient_with(&mut self, transient: Transient) -> Result<Analysis> {
        self.run(Request::Transient(transient))
    }

    pub fn ac(
        &mut self,
        start_frequency: f64,
        stop_frequency: f64,
        number_of_points: u32,
        variation: Variation,
    ) -> Result<Analysis> {
        self.run(Request::Ac {
            start_frequency,
            stop_frequency,
            number_of_points,
            variation,
        })
    }

    pub fn run(&mut self, request: Request) -> Result<Analysis> {
        let netlist = self.netlist();
        info!(circuit = %self.circuit.title(), command = %request, "simulate");
        let vectors = self.backend.run(&netlist, &request)?;
        let analysis = Analysis::from_vectors(request.kind(), vectors);
        debug!(
            nodes = analysis.nodes.len(),
            branches = analysis.branches.len(),
            "analysis done"
        );
        Ok(analysis)
    }
}

/// Collects the console output of the shared library.
pub struct Cb {
    strs: Vec<String>,
    status: i32,
    unload: bool,
    quit: bool,
}

impl Cb {
    pub fn new() -> Self {
        Self {
            strs: Vec::new(),
            status: 0,
            unload: false,
            quit: false,
        }
    }
}

impl Default for Cb {
    fn default() -> Self {
        Self::new()
    }
}

impl Callbacks for Cb {
    fn send_char(&mut self, s: &str) {
        if let Some(line) = s.strip_prefix("stderr ") {
            warn!(target: "ngspice", "{}", line);
        } else {
            debug!(target: "ngspice", "{}", s.strip_prefix("stdout ").unwrap_or(s));
        }
        self.strs.push(s.to_string())
    }
    fn controlled_exit(&mut self, status: i32, unload: bool, quit: bool) {
        self.status = status;
        self.unload = unload;
        self.quit = quit;
    }
}

fn ngspice_error<E: fmt::Debug>(err: E) -> Error {
    Error::Ngspice(format!("{:?}", err))
}

/// Backend on top of the ngspice shared library.
#[derive(Debug, Default)]
pub struct SharedNgspice {
    buffer: Vec<String>,
}

impl SharedNgspice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Console output of the last run.
    pub fn buffer(&self) -> &[String] {
        &self.buffer
    }
}

impl Backend for SharedNgspice {
    fn run(&mut self, netlist: &[String], request: &Request) -> Result<Vec<RawVector>> {
        let mut c = Cb::new();
        let vectors = {
            let ngspice = NgSpice::new(&mut c).map_err(ngspice_error)?;
            ngspice.circuit(netlist.to_vec()).map_err(ngspice_error)?;
            ngspice.command(request.to_string().as_str()).map_err(ngspice_error)?;
            let plot = ngspice.current_plot().map_err(ngspice_error)?;
            let names = ngspice.all_vecs(plot.as_str()).map_err(ngspice_error)?;
            let mut vectors = Vec::with_capacity(names.len());
            for name in names {
                let info = ngspice.vector_info(name.as_str()).map_err(ngspice_error)?;
                let data: Array1<Complex64> = match info.data {
                    ComplexSlice::Real(list) => list.iter().map(|v| Complex64::new(*v, 0.0)).collect(),
                    ComplexSlice::Complex(list) => list
                        .iter()
                        .map(|c| Complex64::new(c.cx_real, c.cx_imag))
                        .collect(),
                };
                vectors.push(RawVector {
                    name: info.name.to_lowercase(),
                    data,
                });
            }
            vectors
        };
        debug!(status = c.status, unload = c.unload, quit = c.quit, "ngspice returned");
        self.buffer = c.strs;
        if c.status != 0 {
            return Err(Error::Ngspice(format!("ngspice exited with status {}", c.status)));
        }
        if vectors.is_empty() {
            return Err(Error::Ngspice(format!("no vectors produced by '{}'", request)));
        }
        Ok(vectors)
    }
}

/// Backend running the `ngspice` executable in batch mode.
#[derive(Debug, Clone)]
pub struct BatchNgspice {
    pub executable: PathBuf,
    pub timeout: Duration,
}

impl Default for BatchNgspice {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("ngspice"),
            timeout: Duration::from_secs(60),
        }
    }
}

impl BatchNgspice {
    pub fn new<P: Into<PathBuf>>(executable: P, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    /// Whether the executable answers `--version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.executable)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// The netlist with the analysis card placed before `.end`.
    pub fn deck(netlist: &[String], request: &Request) -> Vec<String> {
        let mut deck: Vec<String> = netlist
            .iter()
            .filter(|line| !line.trim().eq_ignore_ascii_case(".end"))
            .cloned()
            .collect();
        deck.push(format!(".{}", request));
        deck.push(String::from(".end"));
        deck
    }

    fn wait(&self, mut child: std::process::Child) -> Result<std::process::ExitStatus> {
        let start = Instant::now();
        loop {
            match child.try_wait()? {
                Some(status) => return Ok(status),
                None if start.elapsed() > self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::NgspiceTimeout(self.timeout.as_secs()));
                }
                None => std::thread::sleep(Duration::from_millis(50)),
            }
        }
    }
}

impl Backend for BatchNgspice {
    fn run(&mut self, netlist: &[String], request: &Request) -> Result<Vec<RawVector>> {
        let mut input = tempfile::Builder::new().suffix(".cir").tempfile()?;
        for line in Self::deck(netlist, request) {
            writeln!(input, "{}", line)?;
        }
        input.flush()?;
        let raw = tempfile::Builder::new().suffix(".raw").tempfile()?;

        //stdout and stderr go to files so a chatty run can not fill the pipes
        let stdout = tempfile::tempfile()?;
        let stderr = tempfile::tempfile()?;
        let child = Command::new(&self.executable)
            .arg("-b")
            .arg("-r")
            .arg(raw.path())
            .arg(input.path())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()
            .map_err(|e| Error::NgspiceNotFound(format!("{}: {}", self.executable.display(), e)))?;
        let status = self.wait(child)?;

        let log = read_back(stdout)? + &read_back(stderr)?;
        for line in log.lines() {
            debug!(target: "ngspice", "{}", line);
        }
        if !status.success() {
            return Err(Error::Ngspice(format!("ngspice exited with {}\n{}", status, log)));
        }

        let data = std::fs::read(raw.path())?;
        if data.is_empty() {
            return Err(Error::Rawfile("ngspice produced an empty rawfile".to_string()));
        }
        let plot = rawfile::parse_last(&data)?;
        debug!(plot = %plot.plotname, points = plot.points(), "rawfile read");
        Ok(plot
            .variables
            .into_iter()
            .zip(plot.data)
            .map(|(variable, data)| RawVector {
                name: variable.name,
                data,
            })
            .collect())
    }
}

fn read_back(mut file: std::fs::File) -> Result<String> {
    use std::io::Seek;
    let mut content = String::new();
    file.rewind()?;
    file.read_to_string(&mut content)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::GND;

    /// Replays canned vectors and records what it was asked to run.
    struct Replay {
        vectors: Vec<RawVector>,
        netlist: Vec<String>,
        request: Option<Request>,
    }

    impl Backend for Replay {
        fn run(&mut self, netlist: &[String], request: &Request) -> Result<Vec<RawVector>> {
            self.netlist = netlist.to_vec();
            self.request = Some(request.clone());
            Ok(self.vectors.clone())
        }
    }

    fn real(name: &str, values: &[f64]) -> RawVector {
        RawVector {
            name: name.to_string(),
            data: values.iter().map(|v| Complex64::new(*v, 0.0)).collect(),
        }
    }

    #[test]
    fn collect_console_output() {
        let mut c = Cb::default();
        c.send_char("stdout Circuit: voltage divider");
        c.send_char("stderr Warning: no DC path to ground");
        c.controlled_exit(1, false, true);
        assert_eq!(2, c.strs.len());
        assert_eq!(1, c.status);
        assert!(c.quit && !c.unload);
    }

    #[test]
    fn classify_vectors() {
        assert_eq!(VectorKind::Sweep, classify("time"));
        assert_eq!(VectorKind::Sweep, classify("frequency"));
        assert_eq!(VectorKind::Branch("l_load".into()), classify("l_load#branch"));
        assert_eq!(VectorKind::Branch("vin".into()), classify("I(Vin)"));
        assert_eq!(VectorKind::Branch("rload".into()), classify("@rload[i]"));
        assert_eq!(VectorKind::Other, classify("@q1[ib]"));
        assert_eq!(VectorKind::Node("out".into()), classify("V(out)"));
        assert_eq!(VectorKind::Node("gate1".into()), classify("gate1"));
    }

    #[test]
    fn render_requests() {
        assert_eq!("op", Request::OperatingPoint.to_string());
        assert_eq!(
            "tran 100u 40m",
            Request::Transient(Transient::new(100e-6, 40e-3)).to_string()
        );
        assert_eq!(
            "tran 100u 40m 0 1m uic",
            Request::Transient(Transient {
                max_time: Some(1e-3),
                use_initial_condition: true,
                ..Transient::new(100e-6, 40e-3)
            })
            .to_string()
        );
        assert_eq!(
            "ac dec 10 20k 20Meg",
            Request::Ac {
                start_frequency: 20e3,
                stop_frequency: 20e6,
                number_of_points: 10,
                variation: Variation::Dec,
            }
            .to_string()
        );
    }

    #[test]
    fn simulator_netlist() {
        let mut circuit = Circuit::new("divider");
        circuit.resistor("1", "in", GND, 1e3).unwrap();
        let mut backend = Replay {
            vectors: vec![],
            netlist: vec![],
            request: None,
        };
        let mut simulator = Simulator::new(&circuit, &mut backend);
        simulator.temperature = 27.0;
        simulator.save_currents = true;
        assert_eq!(
            vec![
                ".title divider",
                "R1 in 0 1k",
                ".options TEMP=27 TNOM=25",
                ".options savecurrents",
                ".end",
            ],
            simulator.netlist()
        );
    }

    #[test]
    fn transient_analysis() {
        let circuit = Circuit::new("tran");
        let mut backend = Replay {
            vectors: vec![
                real("time", &[0.0, 1e-3, 2e-3]),
                real("output", &[0.0, 1.0, 2.0]),
                real("l1#branch", &[0.0, 0.1, 0.2]),
                real("@q1[ib]", &[0.0, 0.0, 0.0]),
            ],
            netlist: vec![],
            request: None,
        };
        let analysis = Simulator::new(&circuit, &mut backend)
            .transient(1e-3, 2e-3)
            .unwrap();
        assert_eq!(AnalysisKind::Transient, analysis.kind);
        assert_eq!(vec![0.0, 1e-3, 2e-3], analysis.sweep.clone().unwrap().to_vec());
        assert_eq!(2.0, analysis.node("OUTPUT").unwrap()[2].re);
        assert_eq!(0.1, analysis.branch("l1").unwrap()[1].re);
        assert!(analysis.branch("q1").is_err());
        assert_eq!(
            Some(Request::Transient(Transient::new(1e-3, 2e-3))),
            backend.request
        );
        assert_eq!(".end", backend.netlist.last().unwrap());
    }

    #[test]
    fn batch_deck() {
        let deck = BatchNgspice::deck(
            &[".title x".to_string(), "R1 a 0 1k".to_string(), ".end".to_string()],
            &Request::OperatingPoint,
        );
        assert_eq!(vec![".title x", "R1 a 0 1k", ".op", ".end"], deck);
    }

    #[test]
    fn batch_missing_executable() {
        let mut backend = BatchNgspice::new("/does/not/exist/ngspice", Duration::from_secs(1));
        assert!(!backend.is_available());
        assert!(matches!(
            backend.run(&[".title x".to_string(), ".end".to_string()], &Request::OperatingPoint),
            Err(Error::NgspiceNotFound(_))
        ));
    }
}
