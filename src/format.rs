//! Reshape an [`Analysis`] into plain name to value mappings.

use crate::{
    error::{Error, Result},
    simulation::{Analysis, AnalysisKind},
};
use ndarray::Array1;
use num_complex::Complex64;
use std::collections::BTreeMap;

/// The value of one node or branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Scalar(f64),
    Waveform(Array1<f64>),
    /// Magnitude and phase in radians.
    Phasor {
        magnitude: Array1<f64>,
        phase: Array1<f64>,
    },
}

/// Signals by lower case node or branch name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outputs(BTreeMap<String, Signal>);

impl Outputs {
    pub fn get(&self, name: &str) -> Result<&Signal> {
        self.0
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::MissingVector(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Signal)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn scalar(&self, name: &str) -> Result<f64> {
        match self.get(name)? {
            Signal::Scalar(value) => Ok(*value),
            _ => Err(Error::MissingVector(format!("{} (scalar)", name))),
        }
    }

    pub fn waveform(&self, name: &str) -> Result<&Array1<f64>> {
        match self.get(name)? {
            Signal::Waveform(values) => Ok(values),
            _ => Err(Error::MissingVector(format!("{} (waveform)", name))),
        }
    }

    pub fn magnitude(&self, name: &str) -> Result<&Array1<f64>> {
        match self.get(name)? {
            Signal::Phasor { magnitude, .. } => Ok(magnitude),
            _ => Err(Error::MissingVector(format!("{} (magnitude)", name))),
        }
    }

    pub fn phase(&self, name: &str) -> Result<&Array1<f64>> {
        match self.get(name)? {
            Signal::Phasor { phase, .. } => Ok(phase),
            _ => Err(Error::MissingVector(format!("{} (phase)", name))),
        }
    }

    fn insert(&mut self, name: &str, signal: Signal) {
        self.0.insert(name.to_string(), signal);
    }
}

fn signal(data: &Array1<Complex64>, mode: AnalysisKind) -> Signal {
    match mode {
        AnalysisKind::OperatingPoint => Signal::Scalar(data.first().map(|c| c.re).unwrap_or(f64::NAN)),
        AnalysisKind::Transient => Signal::Waveform(data.mapv(|c| c.re)),
        AnalysisKind::Ac => Signal::Phasor {
            magnitude: data.mapv(|c| c.norm()),
            phase: data.mapv(|c| c.arg()),
        },
    }
}

/// Split `analysis` into node voltages and branch currents.
///
/// Transient results also carry `time` in both maps, AC results `frequency`.
pub fn format_output(analysis: &Analysis, mode: AnalysisKind) -> Result<(Outputs, Outputs)> {
    if analysis.kind != mode {
        return Err(Error::AnalysisMismatch {
            expected: mode.to_string(),
            actual: analysis.kind.to_string(),
        });
    }
    let mut voltages = Outputs::default();
    let mut currents = Outputs::default();
    for (name, data) in &analysis.nodes {
        voltages.insert(name, signal(data, mode));
    }
    for (name, data) in &analysis.branches {
        currents.insert(name, signal(data, mode));
    }
    let sweep = match mode {
        AnalysisKind::OperatingPoint => None,
        AnalysisKind::Transient => Some("time"),
        AnalysisKind::Ac => Some("frequency"),
    };
    if let Some(key) = sweep {
        let values = analysis
            .sweep
            .clone()
            .ok_or_else(|| Error::MissingVector(key.to_string()))?;
        voltages.insert(key, Signal::Waveform(values.clone()));
        currents.insert(key, Signal::Waveform(values));
    }
    Ok((voltages, currents))
}
