//! Capabilities: the specialised downstream services a turn can be delegated to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named downstream capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Sales,
    Appointment,
    Booking,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Sales,
        Capability::Appointment,
        Capability::Booking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Sales => "sales",
            Capability::Appointment => "appointment",
            Capability::Booking => "booking",
        }
    }

    /// Derive the capability a tenant's declared modality allows.
    ///
    /// Matching is case-insensitive and substring based, so "Ventas",
    /// "Sales team" and "sales" all map to [`Capability::Sales`]. Anything
    /// unrecognised (including an empty modality) maps to
    /// [`Capability::Appointment`].
    pub fn from_modality(modality: &str) -> Self {
        let m = modality.to_lowercase();
        if m.contains("sales") || m.contains("venta") {
            Capability::Sales
        } else if m.contains("booking") || m.contains("reserv") {
            Capability::Booking
        } else {
            Capability::Appointment
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sales" => Ok(Capability::Sales),
            "appointment" => Ok(Capability::Appointment),
            "booking" => Ok(Capability::Booking),
            other => Err(format!("unknown capability: '{other}'")),
        }
    }
}
