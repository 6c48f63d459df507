//! Area-of-interest request types
//!
//! An [`AreaOfInterest`] is built once per invocation from command-line input
//! and never changes afterwards.

use std::fmt;
use std::str::FromStr;

use aoi_common::{suggest_name, Error, Result};
use serde::Serialize;

/// A WGS84 point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    /// Validate and build a coordinate
    pub fn new(lon: f64, lat: f64) -> Result<Self> {
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidInput(format!(
                "longitude {lon} is outside [-180, 180]"
            )));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidInput(format!(
                "latitude {lat} is outside [-90, 90]"
            )));
        }
        Ok(Self { lon, lat })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lon, self.lat)
    }
}

/// Reachability budget of an area of interest
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Budget {
    /// Travel-time limit in minutes
    Minutes(u32),
    /// Geodesic radius in kilometers
    RadiusKm(f64),
}

impl Budget {
    pub fn radius_km(km: f64) -> Result<Self> {
        if !km.is_finite() || km < 0.0 {
            return Err(Error::InvalidInput(format!(
                "radius must be a non-negative number of kilometers, got {km}"
            )));
        }
        Ok(Budget::RadiusKm(km))
    }

    /// Travel-time budget in seconds, as the isochrone function expects it
    pub fn seconds(&self) -> Option<f64> {
        match self {
            Budget::Minutes(minutes) => Some(f64::from(*minutes) * 60.0),
            Budget::RadiusKm(_) => None,
        }
    }

    /// Radius in meters, as geography distances are measured
    pub fn meters(&self) -> Option<f64> {
        match self {
            Budget::Minutes(_) => None,
            Budget::RadiusKm(km) => Some(km * 1000.0),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Budget::Minutes(minutes) => *minutes == 0,
            Budget::RadiusKm(km) => *km == 0.0,
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Budget::Minutes(minutes) => write!(f, "{minutes} min"),
            Budget::RadiusKm(km) => write!(f, "{km} km"),
        }
    }
}

/// A point plus the budget that bounds what is reachable from it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AreaOfInterest {
    pub origin: Coordinate,
    pub budget: Budget,
}

impl AreaOfInterest {
    pub fn new(origin: Coordinate, budget: Budget) -> Self {
        Self { origin, budget }
    }
}

/// Named cost profile
///
/// Each profile reads its traversal cost from its own edge column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Default,
    Car,
    Bike,
    Foot,
}

impl Profile {
    pub const NAMES: [&'static str; 4] = ["default", "car", "bike", "foot"];

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Default => "default",
            Profile::Car => "car",
            Profile::Bike => "bike",
            Profile::Foot => "foot",
        }
    }

    /// Edge column holding this profile's traversal cost
    pub fn cost_column(&self) -> String {
        match self {
            Profile::Default => "cost".to_string(),
            other => format!("cost_{}", other.name()),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Profile::Default),
            "car" => Ok(Profile::Car),
            "bike" => Ok(Profile::Bike),
            "foot" => Ok(Profile::Foot),
            _ => {
                let hint = match suggest_name(s, &Profile::NAMES) {
                    Some(name) => format!(" (did you mean '{name}'?)"),
                    None => format!(" (expected one of: {})", Profile::NAMES.join(", ")),
                };
                Err(Error::InvalidInput(format!("unknown profile '{s}'{hint}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_bounds() {
        assert!(Coordinate::new(-93.63, 41.99).is_ok());
        assert!(Coordinate::new(180.0, -90.0).is_ok());
        assert!(Coordinate::new(180.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, 91.0).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_budget_conversions() {
        assert_eq!(Budget::Minutes(60).seconds(), Some(3600.0));
        assert_eq!(Budget::Minutes(60).meters(), None);
        assert_eq!(Budget::RadiusKm(10.0).meters(), Some(10_000.0));
        assert_eq!(Budget::RadiusKm(10.0).seconds(), None);
    }

    #[test]
    fn test_budget_zero() {
        assert!(Budget::Minutes(0).is_zero());
        assert!(Budget::RadiusKm(0.0).is_zero());
        assert!(!Budget::RadiusKm(0.5).is_zero());
    }

    #[test]
    fn test_radius_rejects_negative() {
        assert!(Budget::radius_km(-1.0).is_err());
        assert!(Budget::radius_km(f64::INFINITY).is_err());
        assert_eq!(Budget::radius_km(0.0).unwrap(), Budget::RadiusKm(0.0));
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("default".parse::<Profile>().unwrap(), Profile::Default);
        assert_eq!("CAR".parse::<Profile>().unwrap(), Profile::Car);
        assert_eq!("Foot".parse::<Profile>().unwrap(), Profile::Foot);
    }

    #[test]
    fn test_profile_typo_suggests() {
        let err = "bikee".parse::<Profile>().unwrap_err();
        assert!(err.to_string().contains("did you mean 'bike'"));

        let err = "helicopter".parse::<Profile>().unwrap_err();
        assert!(err.to_string().contains("expected one of"));
    }

    #[test]
    fn test_profile_cost_columns() {
        assert_eq!(Profile::Default.cost_column(), "cost");
        assert_eq!(Profile::Bike.cost_column(), "cost_bike");
    }
}
