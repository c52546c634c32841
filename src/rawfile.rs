//! Reader for the ngspice rawfile format.
//!
//! A rawfile holds one or more plots back to back. Every plot starts with a
//! textual header (`Title:`, `Plotname:`, `Flags:`, `No. Variables:`,
//! `No. Points:`, `Variables:`) followed by either an ASCII `Values:` block or
//! a `Binary:` block of little-endian doubles, two per value for complex plots.

use crate::error::{Error, Result};
use ndarray::Array1;
use num_complex::Complex64;

/// A column of the plot.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// `time`, `frequency`, `voltage` or `current`.
    pub kind: String,
}

/// One analysis result.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub title: String,
    pub plotname: String,
    pub flags: String,
    pub variables: Vec<Variable>,
    /// One vector per variable, `No. Points` samples each.
    pub data: Vec<Array1<Complex64>>,
}

impl Plot {
    pub fn is_complex(&self) -> bool {
        self.flags.to_lowercase().contains("complex")
    }

    pub fn points(&self) -> usize {
        self.data.first().map(|d| d.len()).unwrap_or(0)
    }

    pub fn vector(&self, name: &str) -> Option<&Array1<Complex64>> {
        self.variables
            .iter()
            .position(|v| v.name.eq_ignore_ascii_case(name))
            .map(|index| &self.data[index])
    }
}

#[derive(Debug, Default)]
struct Header {
    title: String,
    plotname: String,
    flags: String,
    num_variables: Option<usize>,
    num_points: Option<usize>,
    variables: Vec<Variable>,
}

/// Parse every plot in `data`.
pub fn parse(data: &[u8]) -> Result<Vec<Plot>> {
    let mut plots = Vec::new();
    let mut pos = 0;
    loop {
        while pos < data.len() && data[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= data.len() {
            break;
        }
        let (header, binary) = parse_header(data, &mut pos)?;
        let num_variables = header
            .num_variables
            .ok_or_else(|| Error::Rawfile("missing No. Variables".to_string()))?;
        let num_points = header
            .num_points
            .ok_or_else(|| Error::Rawfile("missing No. Points".to_string()))?;
        if header.variables.len() != num_variables {
            return Err(Error::Rawfile(format!(
                "expected {} variables, found {}",
                num_variables,
                header.variables.len()
            )));
        }
        let complex = header.flags.to_lowercase().contains("complex");
        let total = num_variables.checked_mul(num_points).ok_or_else(|| {
            Error::Rawfile(format!("{} variables x {} points overflows", num_variables, num_points))
        })?;
        let values = if binary {
            parse_binary(data, &mut pos, total, complex)?
        } else {
            parse_ascii(data, &mut pos, num_variables, total, complex)?
        };
        let data = (0..num_variables)
            .map(|var| {
                (0..num_points)
                    .map(|point| values[point * num_variables + var])
                    .collect::<Array1<Complex64>>()
            })
            .collect();
        plots.push(Plot {
            title: header.title,
            plotname: header.plotname,
            flags: header.flags,
            variables: header.variables,
            data,
        });
    }
    if plots.is_empty() {
        return Err(Error::Rawfile("no plot found".to_string()));
    }
    Ok(plots)
}

/// Parse `data` and return the last plot.
pub fn parse_last(data: &[u8]) -> Result<Plot> {
    parse(data)?
        .pop()
        .ok_or_else(|| Error::Rawfile("no plot found".to_string()))
}

fn read_line<'a>(data: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    if *pos >= data.len() {
        return None;
    }
    let start = *pos;
    let end = data[start..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|offset| start + offset)
        .unwrap_or(data.len());
    *pos = (end + 1).min(data.len());
    Some(&data[start..end])
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Rawfile(format!("invalid {}: {}", key, value.trim())))
}

/// Read header lines up to the data marker. Returns the header and whether
/// the data block is binary.
fn parse_header(data: &[u8], pos: &mut usize) -> Result<(Header, bool)> {
    let mut header = Header::default();
    let mut in_variables = false;
    while let Some(line) = read_line(data, pos) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Title:") {
            header.title = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("Plotname:") {
            header.plotname = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("Flags:") {
            header.flags = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("No. Variables:") {
            header.num_variables = Some(parse_count("No. Variables", value)?);
        } else if let Some(value) = line.strip_prefix("No. Points:") {
            header.num_points = Some(parse_count("No. Points", value)?);
        } else if line.starts_with("Variables:") {
            in_variables = true;
        } else if line.starts_with("Values:") {
            return Ok((header, false));
        } else if line.starts_with("Binary:") {
            return Ok((header, true));
        } else if in_variables && !line.is_empty() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return Err(Error::Rawfile(format!("invalid variable line: {}", line)));
            }
            parse_count("variable index", parts[0])?;
            header.variables.push(Variable {
                name: parts[1].to_lowercase(),
                kind: parts[2].to_string(),
            });
        }
        //other header lines (Date:, Command:, Option:) are ignored
    }
    Err(Error::Rawfile("missing Values: or Binary: marker".to_string()))
}

/// Read `total` values, one per variable and point.
fn parse_binary(data: &[u8], pos: &mut usize, total: usize, complex: bool) -> Result<Vec<Complex64>> {
    let width = if complex { 16 } else { 8 };
    let len = total
        .checked_mul(width)
        .ok_or_else(|| Error::Rawfile(format!("binary block of {} values overflows", total)))?;
    let block = pos
        .checked_add(len)
        .and_then(|end| data.get(*pos..end))
        .ok_or_else(|| Error::Rawfile(format!("binary block truncated, expected {} bytes", len)))?;
    *pos += len;
    Ok(block
        .chunks_exact(width)
        .map(|chunk| {
            let re = read_f64(&chunk[..8]);
            let im = if complex { read_f64(&chunk[8..16]) } else { 0.0 };
            Complex64::new(re, im)
        })
        .collect())
}

fn read_f64(bytes: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    f64::from_le_bytes(buf)
}

fn parse_ascii(
    data: &[u8],
    pos: &mut usize,
    num_variables: usize,
    total: usize,
    complex: bool,
) -> Result<Vec<Complex64>> {
    //a value takes at least two bytes, the header count is not trusted
    let mut values = Vec::with_capacity(total.min(data.len().saturating_sub(*pos) / 2));
    //every point starts with its index, followed by one value per variable
    let per_point = num_variables + 1;
    let mut token = 0usize;
    while values.len() < total {
        let line = read_line(data, pos).ok_or_else(|| {
            Error::Rawfile(format!(
                "values truncated, expected {} values, found {}",
                total,
                values.len()
            ))
        })?;
        let line = String::from_utf8_lossy(line);
        for word in line.split_whitespace() {
            if token % per_point == 0 {
                parse_count("point index", word)?;
            } else {
                values.push(parse_value(word, complex)?);
            }
            token += 1;
        }
    }
    Ok(values)
}

fn parse_value(word: &str, complex: bool) -> Result<Complex64> {
    let number = |text: &str| {
        text.trim()
            .parse::<f64>()
            .map_err(|_| Error::Rawfile(format!("invalid value: {}", word)))
    };
    match word.split_once(',') {
        Some((re, im)) if complex => Ok(Complex64::new(number(re)?, number(im)?)),
        Some(_) => Err(Error::Rawfile(format!("complex value in real plot: {}", word))),
        None => Ok(Complex64::new(number(word)?, 0.0)),
    }
}
