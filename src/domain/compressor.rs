use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest physically meaningful temperature in degrees Celsius.
pub const ABSOLUTE_ZERO_C: f64 = -273.15;

/// Compression technology of the compressor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Technology {
    Reciprocating,
    Scroll,
}

impl Technology {
    pub const ALL: [Technology; 2] = [Technology::Reciprocating, Technology::Scroll];

    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Reciprocating => "Reciprocating",
            Technology::Scroll => "Scroll",
        }
    }
}

impl std::str::FromStr for Technology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown technology: {}", s))
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refrigerant circulated by the compressor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Refrigerant {
    R407A,
    R22,
    R488A,
    R410A,
    R404A,
    R448,
}

impl Refrigerant {
    pub const ALL: [Refrigerant; 6] = [
        Refrigerant::R407A,
        Refrigerant::R22,
        Refrigerant::R488A,
        Refrigerant::R410A,
        Refrigerant::R404A,
        Refrigerant::R448,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Refrigerant::R407A => "R407A",
            Refrigerant::R22 => "R22",
            Refrigerant::R488A => "R488A",
            Refrigerant::R410A => "R410A",
            Refrigerant::R404A => "R404A",
            Refrigerant::R448 => "R448",
        }
    }
}

impl std::str::FromStr for Refrigerant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("Unknown refrigerant: {}", s))
    }
}

impl fmt::Display for Refrigerant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the compressor modulates its capacity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CapacityControl {
    #[serde(rename = "Fixed Speed")]
    FixedSpeed,
    #[serde(rename = "Variable Speed")]
    VariableSpeed,
}

impl CapacityControl {
    pub const ALL: [CapacityControl; 2] =
        [CapacityControl::FixedSpeed, CapacityControl::VariableSpeed];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityControl::FixedSpeed => "Fixed Speed",
            CapacityControl::VariableSpeed => "Variable Speed",
        }
    }
}

impl std::str::FromStr for CapacityControl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown capacity control: {}", s))
    }
}

impl fmt::Display for CapacityControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a compressor model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CompressorSpecification {
    pub model: String,
    pub technology: Technology,
    pub refrigerant: Refrigerant,
    pub capacity_control: CapacityControl,
}

/// One measured operating point of a compressor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompressorObservation {
    pub specs: CompressorSpecification,
    /// Condenser temperature (Celsius), never below absolute zero
    pub condenser_temp_c: f64,
    /// Evaporator temperature (Celsius)
    pub evaporator_temp_c: f64,
    /// Measured electrical power draw
    pub power: f64,
}

impl CompressorObservation {
    pub fn model(&self) -> &str {
        &self.specs.model
    }

    /// Regression inputs in column order (condenser, evaporator)
    pub fn inputs(&self) -> [f64; 2] {
        [self.condenser_temp_c, self.evaporator_temp_c]
    }
}
