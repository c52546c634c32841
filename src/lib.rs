//! Demonstration circuits simulated with ngspice.
//!
//! Circuits are described with [`Circuit`], simulated by a [`Simulator`] on
//! one of the ngspice [`Backend`]s and reshaped with [`format_output`] before
//! they are plotted.
pub mod circuit;
pub mod config;
pub mod demos;
pub mod error;
pub mod format;
pub mod library;
pub mod output;
pub mod plot;
pub mod rawfile;
pub mod simulation;
pub mod units;

pub use self::{
    circuit::{Circuit, PulseSource, SinusoidalSource, GND},
    config::{BackendKind, Config},
    demos::{Context, Demo, Report},
    error::{Error, Result},
    format::{format_output, Outputs, Signal},
    library::SpiceLibrary,
    output::output_file_name,
    simulation::{
        Analysis, AnalysisKind, Backend, BatchNgspice, SharedNgspice, Simulator, Transient, Variation,
    },
};
