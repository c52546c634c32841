//! Result files: location and CSV export.

use crate::{
    error::{Error, Result},
    format::{Outputs, Signal},
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Path of `file_name` inside `results_dir`, creating the directory when missing.
pub fn output_file_name<P: AsRef<Path>>(results_dir: P, file_name: &str) -> Result<PathBuf> {
    let dir = results_dir.as_ref();
    if !dir.is_dir() {
        debug!(path = %dir.display(), "create results directory");
        fs::create_dir_all(dir)?;
    }
    Ok(dir.join(file_name))
}

/// Write operating point results as `Variable,Value` rows.
pub fn write_operating_point_csv<W: Write>(voltages: &Outputs, currents: &Outputs, writer: &mut W) -> Result<()> {
    writeln!(writer, "Variable,Value")?;
    for (name, signal) in voltages.iter() {
        if let Signal::Scalar(value) = signal {
            writeln!(writer, "V({}),{}", name, value)?;
        }
    }
    for (name, signal) in currents.iter() {
        if let Signal::Scalar(value) = signal {
            writeln!(writer, "I({}),{}", name, value)?;
        }
    }
    Ok(())
}

/// Write transient results, one row per time point.
pub fn write_transient_csv<W: Write>(voltages: &Outputs, currents: &Outputs, writer: &mut W) -> Result<()> {
    let time = voltages.waveform("time")?;
    let mut columns = Vec::new();
    write!(writer, "time")?;
    for (prefix, outputs) in [("V", voltages), ("I", currents)] {
        for (name, signal) in outputs.iter().filter(|(name, _)| *name != "time") {
            if let Signal::Waveform(values) = signal {
                check_len(name, values.len(), time.len())?;
                write!(writer, ",{}({})", prefix, name)?;
                columns.push(values);
            }
        }
    }
    writeln!(writer)?;
    for (index, t) in time.iter().enumerate() {
        write!(writer, "{}", t)?;
        for column in &columns {
            write!(writer, ",{}", column[index])?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write AC results as magnitude and phase in degrees per frequency point.
pub fn write_ac_csv<W: Write>(voltages: &Outputs, currents: &Outputs, writer: &mut W) -> Result<()> {
    let frequency = voltages.waveform("frequency")?;
    let mut columns = Vec::new();
    write!(writer, "frequency")?;
    for (prefix, outputs) in [("V", voltages), ("I", currents)] {
        for (name, signal) in outputs.iter() {
            if let Signal::Phasor { magnitude, phase } = signal {
                check_len(name, magnitude.len(), frequency.len())?;
                write!(writer, ",{p}({n})_mag,{p}({n})_phase_deg", p = prefix, n = name)?;
                columns.push((magnitude, phase));
            }
        }
    }
    writeln!(writer)?;
    for (index, f) in frequency.iter().enumerate() {
        write!(writer, "{}", f)?;
        for (magnitude, phase) in &columns {
            write!(writer, ",{},{}", magnitude[index], phase[index].to_degrees())?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn check_len(name: &str, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(Error::InvalidValue(format!(
            "{} has {} points, expected {}",
            name, len, expected
        )));
    }
    Ok(())
}
