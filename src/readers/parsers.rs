//! Parsers for GDML attribute values
//!
//! GDML allows any numeric attribute to be an arithmetic expression over
//! numbers, named constants, unit symbols, and a handful of functions. The
//! expression is parsed into a small syntax tree with `nom` and evaluated
//! against whatever has been defined so far.
//!
//! Unit symbols evaluate to their value in internal units (mm, rad, g/cm3) so
//! that `10*cm` is `100.0`, the same way Geant4 treats them.

// standard library
use std::collections::HashMap;
use std::f64::consts::PI;

// external crates
use anyhow::{anyhow, bail, Result};
use nom::branch::alt;
use nom::character::complete::{alpha1, alphanumeric1, char, multispace0, one_of};
use nom::combinator::{all_consuming, map, map_res, peek, recognize};
use nom::multi::{many0, many0_count, separated_list1};
use nom::number::complete::recognize_float;
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;

/// Syntax tree of an attribute expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Name(String),
    Negate(Box<Expr>),
    Binary(char, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    /// Evaluate against named constants, falling back to built-in symbols
    pub fn evaluate(&self, constants: &HashMap<String, f64>) -> Result<f64> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Name(name) => constants
                .get(name)
                .copied()
                .or_else(|| builtin_symbol(name))
                .ok_or_else(|| anyhow!("Unknown name \"{name}\" in expression")),
            Self::Negate(expr) => Ok(-expr.evaluate(constants)?),
            Self::Binary(op, lhs, rhs) => {
                let (a, b) = (lhs.evaluate(constants)?, rhs.evaluate(constants)?);
                match op {
                    '+' => Ok(a + b),
                    '-' => Ok(a - b),
                    '*' => Ok(a * b),
                    '/' => Ok(a / b),
                    '^' => Ok(a.powf(b)),
                    _ => bail!("Unknown operator '{op}'"),
                }
            }
            Self::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| a.evaluate(constants))
                    .collect::<Result<Vec<f64>>>()?;
                call_function(name, &args)
            }
        }
    }
}

/// Parse and evaluate an attribute value in one go
///
/// ```rust
/// # use std::collections::HashMap;
/// # use flubl::readers::parsers::evaluate;
/// let mut constants = HashMap::new();
/// constants.insert("half".to_string(), 0.5);
///
/// assert_eq!(evaluate("1.5e3", &constants).unwrap(), 1500.0);
/// assert_eq!(evaluate("2*(3+half)", &constants).unwrap(), 7.0);
/// assert_eq!(evaluate("10*cm", &constants).unwrap(), 100.0);
/// assert_eq!(evaluate("-pow(2, 3)", &constants).unwrap(), -8.0);
/// assert!(evaluate("2*unknown", &constants).is_err());
/// ```
pub fn evaluate(input: &str, constants: &HashMap<String, f64>) -> Result<f64> {
    parse_expression(input)?.evaluate(constants)
}

/// Parse a complete attribute string into an expression
pub fn parse_expression(input: &str) -> Result<Expr> {
    all_consuming(delimited(multispace0, expression, multispace0))(input)
        .map(|(_, expr)| expr)
        .map_err(|_| anyhow!("Failed to parse expression \"{input}\""))
}

/// Multiplier to mm for a GDML length unit
pub fn length_unit(unit: &str) -> Result<f64> {
    match unit {
        "nm" => Ok(1e-6),
        "um" => Ok(1e-3),
        "mm" => Ok(1.0),
        "cm" => Ok(10.0),
        "m" => Ok(1e3),
        "km" => Ok(1e6),
        _ => bail!("Unknown length unit \"{unit}\""),
    }
}

/// Multiplier to radians for a GDML angle unit
pub fn angle_unit(unit: &str) -> Result<f64> {
    match unit {
        "rad" | "radian" => Ok(1.0),
        "mrad" | "milliradian" => Ok(1e-3),
        "deg" | "degree" => Ok(PI / 180.0),
        _ => bail!("Unknown angle unit \"{unit}\""),
    }
}

/// Multiplier to g/cm3 for a GDML density unit
pub fn density_unit(unit: &str) -> Result<f64> {
    match unit {
        "g/cm3" | "g/cm^3" => Ok(1.0),
        "mg/cm3" | "mg/cm^3" => Ok(1e-3),
        "kg/m3" | "kg/m^3" => Ok(1e-3),
        "g/ml" => Ok(1.0),
        _ => bail!("Unknown density unit \"{unit}\""),
    }
}

/// Values for names every expression may use without defining them
fn builtin_symbol(name: &str) -> Option<f64> {
    let value = match name {
        "pi" => PI,
        "twopi" => 2.0 * PI,
        "halfpi" => 0.5 * PI,
        "e" => std::f64::consts::E,
        "mm" | "millimeter" => 1.0,
        "cm" | "centimeter" => 10.0,
        "m" | "meter" => 1e3,
        "um" | "micrometer" => 1e-3,
        "nm" | "nanometer" => 1e-6,
        "km" | "kilometer" => 1e6,
        "rad" | "radian" => 1.0,
        "mrad" | "milliradian" => 1e-3,
        "deg" | "degree" => PI / 180.0,
        _ => return None,
    };
    Some(value)
}

fn call_function(name: &str, args: &[f64]) -> Result<f64> {
    let value = match (name, args) {
        ("sin", [x]) => x.sin(),
        ("cos", [x]) => x.cos(),
        ("tan", [x]) => x.tan(),
        ("asin", [x]) => x.asin(),
        ("acos", [x]) => x.acos(),
        ("atan", [x]) => x.atan(),
        ("atan2", [y, x]) => y.atan2(*x),
        ("sqrt", [x]) => x.sqrt(),
        ("exp", [x]) => x.exp(),
        ("log", [x]) => x.ln(),
        ("log10", [x]) => x.log10(),
        ("abs", [x]) => x.abs(),
        ("pow", [x, y]) => x.powf(*y),
        ("min", [x, y]) => x.min(*y),
        ("max", [x, y]) => x.max(*y),
        _ => bail!("Unknown function {name} with {} argument(s)", args.len()),
    };
    Ok(value)
}

/// expression := term (('+' | '-') term)*
fn expression(i: &str) -> IResult<&str, Expr> {
    let (i, first) = term(i)?;
    let (i, rest) = many0(pair(token(one_of("+-")), term))(i)?;
    Ok((i, fold_binary(first, rest)))
}

/// term := factor (('*' | '/') factor)*
fn term(i: &str) -> IResult<&str, Expr> {
    let (i, first) = factor(i)?;
    let (i, rest) = many0(pair(token(one_of("*/")), factor))(i)?;
    Ok((i, fold_binary(first, rest)))
}

/// factor := ('-' | '+') factor | power
fn factor(i: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(token(char('-')), factor), |e| {
            Expr::Negate(Box::new(e))
        }),
        preceded(token(char('+')), factor),
        power,
    ))(i)
}

/// power := atom ('^' factor)?
fn power(i: &str) -> IResult<&str, Expr> {
    let (i, base) = atom(i)?;
    match preceded(token(char('^')), factor)(i) {
        Ok((i, exponent)) => Ok((i, Expr::Binary('^', Box::new(base), Box::new(exponent)))),
        Err(_) => Ok((i, base)),
    }
}

/// atom := number | call | name | '(' expression ')'
fn atom(i: &str) -> IResult<&str, Expr> {
    delimited(
        multispace0,
        alt((
            number,
            call,
            map(identifier, |s| Expr::Name(s.to_string())),
            delimited(char('('), expression, token(char(')'))),
        )),
        multispace0,
    )(i)
}

fn number(i: &str) -> IResult<&str, Expr> {
    // only start a number on a digit or point so names like "inf" are names
    let (i, _) = peek(one_of("0123456789."))(i)?;
    map_res(recognize_float, |s: &str| s.parse::<f64>().map(Expr::Number))(i)
}

fn call(i: &str) -> IResult<&str, Expr> {
    map(
        tuple((
            identifier,
            token(char('(')),
            separated_list1(token(char(',')), expression),
            token(char(')')),
        )),
        |(name, _, args, _)| Expr::Call(name.to_string(), args),
    )(i)
}

fn identifier(i: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, recognize(char('_')))),
        many0_count(alt((alphanumeric1, recognize(char('_'))))),
    ))(i)
}

/// Wrap a parser to ignore surrounding whitespace
fn token<'a, O, F>(parser: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, parser, multispace0)
}

fn fold_binary(first: Expr, rest: Vec<(char, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    })
}
