use elektron_circuits::{
    format_output, rawfile,
    simulation::RawVector,
    Analysis, AnalysisKind, BatchNgspice, Circuit, Context, Demo, Error, SharedNgspice, Simulator,
    SpiceLibrary, GND,
};
use std::path::PathBuf;

fn libraries() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("libraries")
}

fn divider() -> Circuit {
    let mut circuit = Circuit::new("Voltage divider");
    circuit.voltage("in", "input", GND, 10.0).unwrap();
    circuit.resistor("1", "input", "out", 8e3).unwrap();
    circuit.resistor("2", "out", GND, 2e3).unwrap();
    circuit
}

#[test]
fn shipped_models() {
    let library = SpiceLibrary::new(libraries()).unwrap();
    assert!(library.get("EC103D1").unwrap().ends_with("thyristor/EC103D1.lib"));
    assert!(library.get("1n4148").unwrap().ends_with("diode/1N4148.lib"));
    assert!(library.get("2N2222A").unwrap().ends_with("bjt/2n2222a.mod"));
    assert!(matches!(library.get("BC547"), Err(Error::SpiceModelNotFound(_))));
}

#[test]
fn demo_netlists() {
    let library = SpiceLibrary::new(libraries()).unwrap();
    for demo in Demo::ALL {
        for circuit in demo.circuits(&library, None).unwrap() {
            let netlist = circuit.netlist(true);
            assert!(netlist[0].starts_with(".title "), "{}", demo);
            assert_eq!(".end", netlist.last().unwrap());
        }
    }
    let scr = Demo::ScrHalfWave.circuits(&library, Some(0.25)).unwrap();
    let netlist = scr[0].to_string();
    assert!(netlist.contains(".include "));
    assert!(netlist.contains("EC103D1.lib"));
    assert!(netlist.contains("XSCR source gate output EC103D1"));
    assert!(netlist.contains("Vtrigger gate output PULSE(0 1 2.5m 1m 1m 7.5m 20m)"));
}

#[test]
fn rawfile_to_outputs() {
    let raw = "Title: Voltage divider\n\
               Date: Thu Jan  1 00:00:00  2026\n\
               Plotname: Operating Point\n\
               Flags: real\n\
               No. Variables: 3\n\
               No. Points: 1\n\
               Variables:\n\
               \t0\tv(input)\tvoltage\n\
               \t1\tv(out)\tvoltage\n\
               \t2\ti(vin)\tcurrent\n\
               Values:\n\
               0\t1.000000000000000e+01\n\
               \t2.000000000000000e+00\n\
               \t-1.000000000000000e-03\n";
    let plot = rawfile::parse_last(raw.as_bytes()).unwrap();
    let vectors = plot
        .variables
        .iter()
        .zip(plot.data)
        .map(|(variable, data)| RawVector {
            name: variable.name.clone(),
            data,
        })
        .collect();
    let analysis = Analysis::from_vectors(AnalysisKind::OperatingPoint, vectors);
    let (voltages, currents) = format_output(&analysis, AnalysisKind::OperatingPoint).unwrap();
    assert_eq!(2.0, voltages.scalar("out").unwrap());
    assert_eq!(-0.001, currents.scalar("vin").unwrap());
    assert!(matches!(
        format_output(&analysis, AnalysisKind::Transient),
        Err(Error::AnalysisMismatch { .. })
    ));
}

#[test]
#[ignore = "needs the ngspice executable"]
fn batch_voltage_divider() {
    let mut backend = BatchNgspice::default();
    assert!(backend.is_available());
    let circuit = divider();
    let analysis = Simulator::new(&circuit, &mut backend).operating_point().unwrap();
    let (voltages, _) = format_output(&analysis, AnalysisKind::OperatingPoint).unwrap();
    assert!((voltages.scalar("out").unwrap() - 2.0).abs() < 1e-6);
}

#[test]
#[ignore = "needs the ngspice shared library"]
fn shared_voltage_divider() {
    let mut backend = SharedNgspice::new();
    let circuit = divider();
    let analysis = Simulator::new(&circuit, &mut backend).operating_point().unwrap();
    let (voltages, currents) = format_output(&analysis, AnalysisKind::OperatingPoint).unwrap();
    assert!((voltages.scalar("out").unwrap() - 2.0).abs() < 1e-6);
    assert!((currents.scalar("vin").unwrap() + 1e-3).abs() < 1e-9);
    assert!(!backend.buffer().is_empty());
}

#[test]
#[ignore = "needs the ngspice executable"]
fn batch_rc_lowpass() {
    let results = tempfile::tempdir().unwrap();
    let mut ctx = Context {
        library: SpiceLibrary::new(libraries()).unwrap(),
        results: results.path().to_path_buf(),
        backend: Box::new(BatchNgspice::default()),
        alpha: None,
        csv: true,
    };
    let report = Demo::RcLowpass.run(&mut ctx).unwrap();
    //1 / (2 pi 100 10n) ~ 159 kHz, sampled at ten points per decade
    let cutoff = report.get("-3 dB frequency").unwrap();
    assert!(cutoff > 1e5 && cutoff < 2.6e5, "{}", cutoff);
    assert!(results.path().join("RC-lowpass.svg").is_file());
    assert!(results.path().join("RC-lowpass.csv").is_file());
}
