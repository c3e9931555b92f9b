//! Beam, defaults, and run control cards
//!
//! Everything here is a thin typed wrapper that knows how to turn itself into
//! one or more [Card]s. Positions are given in metres like the rest of the
//! builder and written in centimetres.

// internal modules
use crate::fluka::Card;
use crate::utils::*;

// external crates
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Centimetres per metre
const CM_PER_M: f64 = 100.0;

/// Default seed used by FLUKA when RANDOMIZ has no WHAT(2)
pub const DEFAULT_SEED: u32 = 54217137;

/// Sets of physics defaults for the `DEFAULTS` card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Defaults {
    Calorimetry,
    EetTransmutation,
    EmCascade,
    Icarus,
    Hadrotherapy,
    NewDefaults,
    Precision,
    Shielding,
    Damage,
}

impl Defaults {
    /// The SDUM keyword, as truncated by FLUKA
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Calorimetry => "CALORIME",
            Self::EetTransmutation => "EET/TRAN",
            Self::EmCascade => "EM-CASCA",
            Self::Icarus => "ICARUS",
            Self::Hadrotherapy => "HADROTHE",
            Self::NewDefaults => "NEW-DEFA",
            Self::Precision => "PRECISIO",
            Self::Shielding => "SHIELDIN",
            Self::Damage => "DAMAGE",
        }
    }

    pub fn card(&self) -> Card {
        Card::new("DEFAULTS").sdum(self.keyword())
    }
}

impl std::str::FromStr for Defaults {
    type Err = anyhow::Error;

    /// Accepts the full or truncated keyword, e.g. "EM-CASCA" or "EM-CASCADE"
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_uppercase();
        let variants = [
            Self::Calorimetry,
            Self::EetTransmutation,
            Self::EmCascade,
            Self::Icarus,
            Self::Hadrotherapy,
            Self::NewDefaults,
            Self::Precision,
            Self::Shielding,
            Self::Damage,
        ];
        variants
            .into_iter()
            .find(|v| s.starts_with(v.keyword()))
            .ok_or_else(|| anyhow!("Unknown DEFAULTS keyword \"{s}\""))
    }
}

/// Beam particles by their FLUKA names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Particle {
    Electron,
    Positron,
    Photon,
    Proton,
    AntiProton,
    Neutron,
    MuonPlus,
    MuonMinus,
    PionPlus,
    PionMinus,
}

impl Particle {
    pub fn fluka_name(&self) -> &'static str {
        match self {
            Self::Electron => "ELECTRON",
            Self::Positron => "POSITRON",
            Self::Photon => "PHOTON",
            Self::Proton => "PROTON",
            Self::AntiProton => "APROTON",
            Self::Neutron => "NEUTRON",
            Self::MuonPlus => "MUON+",
            Self::MuonMinus => "MUON-",
            Self::PionPlus => "PION+",
            Self::PionMinus => "PION-",
        }
    }
}

impl std::str::FromStr for Particle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let particle = match s.trim().to_uppercase().as_str() {
            "ELECTRON" | "E-" => Self::Electron,
            "POSITRON" | "E+" => Self::Positron,
            "PHOTON" | "GAMMA" => Self::Photon,
            "PROTON" => Self::Proton,
            "APROTON" | "ANTI_PROTON" => Self::AntiProton,
            "NEUTRON" => Self::Neutron,
            "MUON+" | "MU+" => Self::MuonPlus,
            "MUON-" | "MU-" => Self::MuonMinus,
            "PION+" | "PI+" => Self::PionPlus,
            "PION-" | "PI-" => Self::PionMinus,
            other => return Err(anyhow!("Unknown particle \"{other}\"")),
        };
        Ok(particle)
    }
}

impl std::fmt::Display for Particle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.fluka_name())
    }
}

/// Starting position and direction of the beam
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamPosition {
    /// Position (m)
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Direction cosines with respect to x and y
    pub cos_x: f64,
    pub cos_y: f64,
}

/// Orientation of the beam frame in the geometry frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamAxes {
    /// Direction cosines of the beam x axis
    pub x_axis: [f64; 3],
    /// Direction cosines of the beam z axis
    pub z_axis: [f64; 3],
}

/// Primary beam definition
///
/// ```rust
/// # use flubl::fluka::{Beam, Particle};
/// let mut beam = Beam::new(1.0, 0.01, Particle::Electron);
/// beam.add_beam_position(0.0, 0.0, 0.0, 0.0, 0.0)
///     .add_beam_axes(1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
///
/// let cards = beam.cards();
/// assert_eq!(cards.len(), 3);
/// assert_eq!(cards[0].keyword(), "BEAM");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    /// Kinetic energy (GeV)
    pub energy: f64,
    /// Flat momentum spread (GeV/c)
    pub energy_spread: f64,
    pub particle: Particle,
    pub position: Option<BeamPosition>,
    pub axes: Option<BeamAxes>,
}

impl Beam {
    pub fn new(energy: f64, energy_spread: f64, particle: Particle) -> Self {
        Self {
            energy,
            energy_spread,
            particle,
            position: None,
            axes: None,
        }
    }

    /// Starting point (m) and direction cosines
    pub fn add_beam_position(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        cos_x: f64,
        cos_y: f64,
    ) -> &mut Self {
        self.position = Some(BeamPosition {
            x,
            y,
            z,
            cos_x,
            cos_y,
        });
        self
    }

    /// Direction cosines of the beam x and z axes
    pub fn add_beam_axes(
        &mut self,
        xx: f64,
        xy: f64,
        xz: f64,
        zx: f64,
        zy: f64,
        zz: f64,
    ) -> &mut Self {
        self.axes = Some(BeamAxes {
            x_axis: [xx, xy, xz],
            z_axis: [zx, zy, zz],
        });
        self
    }

    /// BEAM, then BEAMPOS and BEAMAXES if set
    pub fn cards(&self) -> Vec<Card> {
        // negative WHAT(1) is kinetic energy rather than momentum
        let mut cards = vec![Card::new("BEAM")
            .what(1, -self.energy)
            .what(2, self.energy_spread)
            .sdum(self.particle.fluka_name())];

        if let Some(p) = &self.position {
            cards.push(Card::new("BEAMPOS").whats(&[
                p.x * CM_PER_M,
                p.y * CM_PER_M,
                p.z * CM_PER_M,
                p.cos_x,
                p.cos_y,
            ]));
        }

        if let Some(a) = &self.axes {
            let [xx, xy, xz] = a.x_axis;
            let [zx, zy, zz] = a.z_axis;
            cards.push(Card::new("BEAMAXES").whats(&[xx, xy, xz, zx, zy, zz]));
        }

        cards
    }
}

/// Random number initialisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Randomiz {
    /// Logical unit of the random number seeds
    pub unit: u32,
    pub seed: u32,
}

impl Default for Randomiz {
    fn default() -> Self {
        Self {
            unit: 1,
            seed: DEFAULT_SEED,
        }
    }
}

impl Randomiz {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    pub fn card(&self) -> Card {
        Card::new("RANDOMIZ").whats(&[self.unit as f64, self.seed as f64])
    }
}

/// Number of primaries to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Start {
    pub primaries: u64,
}

impl Start {
    pub fn new(primaries: u64) -> Self {
        Self { primaries }
    }

    pub fn card(&self) -> Card {
        Card::new("START").what(1, self.primaries as f64)
    }
}

impl std::fmt::Display for Start {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", f!("{} primaries", self.primaries))
    }
}
