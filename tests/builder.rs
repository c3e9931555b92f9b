//! Reference beamlines built with the machine builder

use flubl::fluka::{Beam, BeamPipe, Defaults, Particle, Randomiz, Start};
use flubl::Machine;

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::{Matrix3, Vector3};
use rstest::{fixture, rstest};

/// Fresh output directory per test
#[fixture]
fn output_dir(#[default("builder")] name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("flubl_tests").join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(machine: &Machine, dir: &Path, name: &str) -> (String, serde_json::Value) {
    let base = dir.join(name);
    machine.write(base.to_str().unwrap()).unwrap();
    let inp = fs::read_to_string(base.with_extension("inp")).unwrap();
    let json = fs::read_to_string(base.with_extension("json")).unwrap();
    (inp, serde_json::from_str(&json).unwrap())
}

fn count(inp: &str, keyword: &str) -> usize {
    inp.lines().filter(|l| l.starts_with(keyword)).count()
}

#[rstest]
fn single_drift(#[with("single_drift")] output_dir: PathBuf) {
    let mut beam = Beam::new(1.0, 0.0, Particle::Electron);
    beam.add_beam_position(0.0, 0.0, -0.1, 0.0, 0.0);

    let mut machine = Machine::new(true);
    machine
        .add_defaults(Defaults::EmCascade)
        .add_beam(beam)
        .add_drift("d1", 1.0, BeamPipe::new("G4_STAINLESS-STEEL", 30.0, 5.0))
        .add_randomiz(Randomiz::default())
        .add_start(Start::new(1000));

    let (inp, json) = write(&machine, &output_dir, "single_drift");

    let keywords: Vec<&str> = inp
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .collect();
    let position = |k: &str| keywords.iter().position(|w| *w == k).unwrap();
    assert_eq!(keywords[0], "TITLE");
    assert!(position("DEFAULTS") < position("BEAM"));
    assert!(position("BEAM") < position("BEAMPOS"));
    assert!(position("BEAMPOS") < position("GEOBEGIN"));
    assert!(position("GEOEND") < position("ASSIGNMA"));
    assert!(position("RANDOMIZ") < position("START"));
    assert_eq!(*keywords.last().unwrap(), "STOP");

    // black hole, world, container, vacuum, and pipe
    assert_eq!(count(&inp, "ASSIGNMA"), 5);
    assert!(inp.contains("BLKHOLE 5 | +BLKBODY -WORLDBDY"));
    assert!(inp.contains("STAINLES"));
    assert_eq!(count(&inp, "RCC "), 2);
    assert_eq!(count(&inp, "PLA "), 2);

    assert_eq!(json["elements"][0]["name"], "d1");
    assert_eq!(json["elements"][0]["type"], "drift");
    assert_eq!(json["elements"][0]["s_end"], 1.0);
}

#[rstest]
fn drift_bend_with_samplers(#[with("drift_bend")] output_dir: PathBuf) {
    let mut machine = Machine::new(true);
    machine
        .add_drift("d1", 1.0, BeamPipe::default())
        .add_sampler_plane("s1", 1e-6, 1.0)
        .add_sbend("sb1", 1.0, PI / 8.0)
        .add_sampler_plane("s2", 1e-6, 1.0)
        .add_drift("d2", 1.0, BeamPipe::default());

    assert_eq!(machine.sampler_names(), &["S0000001", "S0000002"]);
    let (inp, json) = write(&machine, &output_dir, "drift_bend");

    assert!(inp.lines().any(|l| l.starts_with("S0000001 5 | +B")));
    assert!(inp.lines().any(|l| l.starts_with("S0000002 5 | +B")));
    assert_eq!(json["samplers"].as_array().unwrap().len(), 2);
    assert_eq!(json["elements"][2]["type"], "sbend");

    // the second drift points along the bent trajectory
    let end = machine.end_of_line();
    assert!(end.position.x < 0.0);
    let direction = end.rotation * Vector3::z();
    assert!((direction.x + (PI / 8.0).sin()).abs() < 1e-9);
}

#[rstest]
fn straight_cells(#[with("straight_cells")] output_dir: PathBuf) {
    let mut machine = Machine::new(true);
    for i in 0..5 {
        machine
            .add_drift(&format!("d{i}"), 1.0, BeamPipe::default())
            .add_sampler_plane(&format!("s{i}"), 1e-6, 1.0);
    }

    let (inp, json) = write(&machine, &output_dir, "straight_cells");
    assert_eq!(machine.sampler_names().len(), 5);
    assert!(inp.contains("S0000005 5 | +B"));
    assert_eq!(json["elements"].as_array().unwrap().len(), 10);
    assert!((machine.length() - 5.000005).abs() < 1e-9);
}

#[rstest]
fn ring(#[with("ring")] output_dir: PathBuf) {
    let mut machine = Machine::new(false);
    for i in 0..5 {
        machine
            .add_drift(&format!("d{i}a"), 1.0, BeamPipe::default())
            .add_sbend(&format!("sb{i}"), 1.0, 2.0 * PI / 5.0)
            .add_drift(&format!("d{i}b"), 1.0, BeamPipe::default())
            .add_quadrupole(&format!("q{i}"), 0.5, 0.2)
            .add_sampler_plane(&format!("s{i}"), 1e-6, 1.0);
    }

    // full turn returns to the start
    let end = machine.end_of_line();
    assert!(end.position.norm() < 1e-6);
    assert!((end.rotation - Matrix3::identity()).abs().max() < 1e-9);

    let (inp, json) = write(&machine, &output_dir, "ring");
    assert_eq!(count(&inp, "$start_transform"), 25);
    assert_eq!(count(&inp, "$end_transform"), 25);
    assert!(count(&inp, "ROT-DEFI") >= 25);
    assert_eq!(json["samplers"].as_array().unwrap().len(), 5);
    assert_eq!(json["bake_transforms"], false);
}

#[rstest]
fn invalid_machine_writes_nothing(#[with("invalid")] output_dir: PathBuf) {
    let mut machine = Machine::new(true);
    machine
        .add_drift("d1", 1.0, BeamPipe::default())
        .add_drift("d1", 1.0, BeamPipe::default());

    let base = output_dir.join("invalid");
    let err = machine.write(base.to_str().unwrap()).unwrap_err();
    assert!(format!("{err:#}").contains("Duplicate element name \"d1\""));
    assert!(!base.with_extension("inp").exists());
    assert!(!base.with_extension("json").exists());
}
