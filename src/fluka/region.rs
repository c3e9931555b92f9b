//! FLUKA regions as boolean zone expressions of bodies
//!
//! A region is a union of zones (`|`), each zone being the intersection of
//! bodies (`+`) and complements of bodies (`-`). Parenthesised groups allow a
//! whole union to be added or subtracted within a zone.

// internal modules
use crate::fluka::body::wrap;
use crate::utils::*;

// external crates
use itertools::Itertools;

/// Neighbourhood number written for every region
const NAZ: u32 = 5;

/// A single term of a zone
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Inside a body
    Plus(String),
    /// Outside a body
    Minus(String),
    /// Inside any of the zones
    PlusGroup(Vec<Zone>),
    /// Outside all of the zones
    MinusGroup(Vec<Zone>),
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Plus(body) => write!(f, "+{body}"),
            Self::Minus(body) => write!(f, "-{body}"),
            Self::PlusGroup(zones) => write!(f, "+( {} )", zones.iter().join(" | ")),
            Self::MinusGroup(zones) => write!(f, "-( {} )", zones.iter().join(" | ")),
        }
    }
}

/// Intersection of terms
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Zone {
    pub terms: Vec<Term>,
}

impl Zone {
    /// Zone inside a single body
    pub fn body(name: &str) -> Self {
        Self {
            terms: vec![Term::Plus(name.to_string())],
        }
    }

    pub fn plus(mut self, name: &str) -> Self {
        self.terms.push(Term::Plus(name.to_string()));
        self
    }

    pub fn minus(mut self, name: &str) -> Self {
        self.terms.push(Term::Minus(name.to_string()));
        self
    }

    /// Subtract a union of zones, simplified where possible
    pub fn minus_zones(mut self, zones: &[Zone]) -> Self {
        match zones {
            [] => (),
            [single] if single.terms.len() == 1 => match &single.terms[0] {
                Term::Plus(body) => self.terms.push(Term::Minus(body.clone())),
                Term::Minus(body) => self.terms.push(Term::Plus(body.clone())),
                _ => self.terms.push(Term::MinusGroup(zones.to_vec())),
            },
            _ => self.terms.push(Term::MinusGroup(zones.to_vec())),
        }
        self
    }

    /// Intersection of two zones
    pub fn and(&self, other: &Zone) -> Zone {
        Zone {
            terms: self.terms.iter().chain(other.terms.iter()).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Every body referenced, including inside groups
    pub fn bodies(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for term in &self.terms {
            match term {
                Term::Plus(b) | Term::Minus(b) => names.push(b.as_str()),
                Term::PlusGroup(zones) | Term::MinusGroup(zones) => {
                    names.extend(zones.iter().flat_map(|z| z.bodies()))
                }
            }
        }
        names
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.terms.iter().join(" "))
    }
}

/// Intersect every zone in `a` with every zone in `b`
pub fn intersect(a: &[Zone], b: &[Zone]) -> Vec<Zone> {
    a.iter()
        .cartesian_product(b.iter())
        .map(|(za, zb)| za.and(zb))
        .collect()
}

/// A named region with its zones and the FLUKA material assigned to it
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub zones: Vec<Zone>,
    pub material: String,
}

impl Region {
    pub fn new(name: &str, zones: Vec<Zone>, material: &str) -> Self {
        Self {
            name: name.to_string(),
            zones: zones.into_iter().filter(|z| !z.is_empty()).collect(),
            material: material.to_string(),
        }
    }
}

impl std::fmt::Display for Region {
    /// Free format region definition
    ///
    /// ```rust
    /// # use flubl::fluka::{Region, Zone};
    /// let zones = vec![Zone::body("B1").minus("B2"), Zone::body("B3")];
    /// let region = Region::new("R1", zones, "IRON");
    /// assert_eq!(region.to_string(), "R1 5 | +B1 -B2 | +B3");
    /// ```
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let zones = self.zones.iter().map(|z| f!("| {z}")).join(" ");
        write!(f, "{}", wrap(&f!("{} {} {}", self.name, NAZ, zones)))
    }
}
