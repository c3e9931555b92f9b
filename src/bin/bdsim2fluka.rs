//! Command line tool to convert BDSIM beamlines into FLUKA input files
//!
//! Reads the model data dumped from a BDSIM run along with the GDML geometry
//! of the same beamline, and writes a FLUKA input with every element placed
//! where BDSIM put it.
//!
//! # Usage
//!
//! ```text
//! Usage: bdsim2fluka <model> <gdml> [options]
//! ```
//!
//! Help is printed with the `-h` flag, and `--help` will show examples, default
//! values, and any important behaviour.
//!
//! ## Options
//!
//! By default a plane sampler is placed after every element, and all bodies
//! are written in global coordinates.
//!
//! ```bash
//! # Output files named 'fluka.inp' and 'fluka.json'
//! bdsim2fluka model.json beamline.gdml
//! ```
//!
//! ### Change the output file names
//!
//! ```bash
//! # Output files named 'myfile.inp' and 'myfile.json'
//! bdsim2fluka model.json beamline.gdml --output myfile
//! ```
//!
//! ### Sampler options
//!
//! Samplers can be turned off entirely, or their size, thickness, and
//! material changed. The material must exist in the GDML file.
//!
//! ```bash
//! # No samplers
//! bdsim2fluka model.json beamline.gdml --no-samplers
//!
//! # 50 cm wide samplers, 1 um thick
//! bdsim2fluka model.json beamline.gdml --size 0.5 --thickness 1e-6
//! ```
//!
//! ### Local coordinates
//!
//! Elements can be written in their own frames inside FLUKA transforms with
//! ROT-DEFI cards, rather than as global coordinates.
//!
//! ```bash
//! bdsim2fluka model.json beamline.gdml --local
//! ```

// crate modules
use flubl::convert::{BdsimConverter, ConverterOptions};
use flubl::utils::f;

// external crates
use anyhow::Result;
use clap::{arg, Parser};
use log::*;

#[doc(hidden)]
fn main() -> Result<()> {
    // set up the command line interface and match arguments
    let cli: Cli = Cli::parse();

    // set up logging (+2 to make 'Info' the default)
    let verbosity = cli.verbose as usize + 2;
    logging_init(verbosity, cli.quiet);

    let options = ConverterOptions {
        add_samplers: !cli.no_samplers,
        sampler_thickness: cli.thickness,
        sampler_size: cli.size,
        sampler_material: cli.material.clone(),
        bake_transforms: !cli.local,
    };
    debug!("{options:?}");

    let mut converter = BdsimConverter::new(&cli.model, &cli.gdml, options)?;
    if cli.quiet {
        converter.disable_progress();
    }

    let machine = converter.to_fluka()?;
    machine.write(&cli.output)?;

    if !cli.quiet {
        print_summary(&converter);
    }

    Ok(())
}

/// Convert BDSIM beamlines into FLUKA input files
///
/// Reads the BDSIM model data (JSON dump of the Model tree) and the GDML
/// geometry of the same beamline. Every element is placed at its BDSIM
/// position, with its container replaced by a box and the daughters clipped
/// to fit.
///
/// Examples
/// --------
///
///  Typical use
///     $ bdsim2fluka model.json beamline.gdml
///
///  Change file names to "myfile"
///     $ bdsim2fluka model.json beamline.gdml --output myfile
///
///  Without samplers
///     $ bdsim2fluka model.json beamline.gdml --no-samplers
///
///  Wider samplers made of vacuum
///     $ bdsim2fluka model.json beamline.gdml --size 2.0 --material G4_Galactic
///
///  Bodies in local frames with ROT-DEFI transforms
///     $ bdsim2fluka model.json beamline.gdml --local
///
/// Notes
/// -----
///
/// The sampler material is looked up by name in the GDML materials and the
/// first match is used.
#[doc(hidden)]
#[derive(Parser)]
#[command(
    verbatim_doc_comment,
    arg_required_else_help(true),
    before_help(banner()),
    after_help(
        "Typical use: bdsim2fluka model.json beamline.gdml\n\nNOTE: --help shows more detail and examples"
    ),
    term_width(70),
    hide_possible_values(true),
    override_usage("bdsim2fluka <model> <gdml> [options]")
)]
struct Cli {
    // * Positional
    /// Path to BDSIM model data (JSON)
    #[arg(name = "model")]
    model: String,

    /// Path to GDML geometry
    #[arg(name = "gdml")]
    gdml: String,

    /// Name of output files (excl. extension)
    ///
    /// Defaults to `fluka`, and will automatically write both the `.inp`
    /// and `.json` files.
    #[arg(help_heading("Output options"))]
    #[arg(short, long)]
    #[arg(value_name = "path")]
    #[arg(default_value = "fluka")]
    output: String,

    /// Write bodies in local frames with transforms
    ///
    /// Every element gets a ROT-DEFI transform and its bodies are written
    /// inside $start_transform/$end_transform directives.
    #[arg(help_heading("Output options"))]
    #[arg(long)]
    local: bool,

    /// Do not add a sampler after each element
    #[arg(help_heading("Sampler options"))]
    #[arg(long)]
    no_samplers: bool,

    /// Sampler thickness in metres
    #[arg(help_heading("Sampler options"))]
    #[arg(long)]
    #[arg(value_name = "m")]
    #[arg(default_value = "1e-6")]
    thickness: f64,

    /// Sampler full width in metres
    #[arg(help_heading("Sampler options"))]
    #[arg(long)]
    #[arg(value_name = "m")]
    #[arg(default_value = "1.0")]
    size: f64,

    /// Sampler material name
    #[arg(help_heading("Sampler options"))]
    #[arg(long)]
    #[arg(value_name = "name")]
    #[arg(default_value = "G4_AIR")]
    material: String,

    // * Flags
    /// Verbose logging (-v, -vv)
    ///
    /// If specified, the default log level of INFO is increased to DEBUG (-v)
    /// or TRACE (-vv). Errors and Warnings are always logged unless in quiet
    /// (-q) mode.
    #[arg(short, long)]
    #[arg(action = clap::ArgAction::Count)]
    verbose: u8,

    /// Supress all log output (overrules --verbose)
    #[arg(short, long)]
    quiet: bool,
}

/// Sets up logging at runtime to allow for multiple verbosity levels
#[doc(hidden)]
fn logging_init(verbosity: usize, quiet: bool) {
    let result = stderrlog::new()
        .modules(vec![module_path!(), "flubl"])
        .quiet(quiet)
        .verbosity(verbosity)
        .show_level(false)
        .color(stderrlog::ColorChoice::Never)
        .timestamp(stderrlog::Timestamp::Off)
        .init();

    if let Err(e) = result {
        eprintln!("Failed to initialise logging: {e}");
    }
}

/// Creates a banner for the command line
#[doc(hidden)]
fn banner() -> String {
    let mut s = f!("{:-<1$}\n", "", 70);
    s += &f!("{:^70}\n", "Flubl :: BDSIM to FLUKA");
    s += &f!("{:-<1$}", "", 70);
    s
}

#[doc(hidden)]
/// Log a summary of the conversion
fn print_summary(converter: &BdsimConverter) {
    let [elements, materials, solids, logical, physical] = converter.registry().summary();
    info!("Summary");
    info!("  - model elements   : {}", converter.model().n);
    info!(
        "  - gdml entries     : {elements} elements, {materials} materials, {solids} solids"
    );
    info!("  - gdml volumes     : {logical} logical, {physical} physical");
    info!(
        "  - sampler regions  : {}",
        converter.sampler_region_names().len()
    );
}
