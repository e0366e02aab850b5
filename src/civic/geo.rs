//! Coordinate validation and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Map center used by the dashboard when no configuration overrides it.
pub const DEFAULT_MAP_CENTER: Coordinates = Coordinates {
    latitude: 28.6139,
    longitude: 77.209,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check that both components are finite and inside the geographic range.
    pub fn validate(&self) -> Result<(), String> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!(
                "latitude {} is outside the range -90..=90",
                self.latitude
            ));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!(
                "longitude {} is outside the range -180..=180",
                self.longitude
            ));
        }
        Ok(())
    }

    /// Haversine distance to `other` in kilometres.
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// Circular search area for proximity listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    pub center: Coordinates,
    pub radius_km: f64,
}

impl Proximity {
    pub fn new(center: Coordinates, radius_km: f64) -> Result<Self, String> {
        center.validate()?;
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(format!("radius_km must be positive, got {}", radius_km));
        }
        Ok(Self { center, radius_km })
    }

    pub fn contains(&self, point: &Coordinates) -> bool {
        self.center.distance_km(point) <= self.radius_km
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinates() {
        assert!(Coordinates::new(28.61, 77.20).validate().is_ok());
        assert!(Coordinates::new(90.0, 180.0).validate().is_ok());
        assert!(Coordinates::new(-90.0, -180.0).validate().is_ok());
    }

    #[test]
    fn test_out_of_range_coordinates() {
        assert!(Coordinates::new(90.5, 0.0).validate().is_err());
        assert!(Coordinates::new(0.0, -180.01).validate().is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).validate().is_err());
        assert!(Coordinates::new(0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = DEFAULT_MAP_CENTER;
        assert!(p.distance_km(&p).abs() < 1e-9);
    }

    #[test]
    fn test_distance_delhi_mumbai() {
        let delhi = Coordinates::new(28.6139, 77.209);
        let mumbai = Coordinates::new(19.076, 72.8777);
        let d = delhi.distance_km(&mumbai);
        assert!(d > 1100.0 && d < 1200.0, "got {}", d);
        // Symmetric
        assert!((d - mumbai.distance_km(&delhi)).abs() < 1e-6);
    }

    #[test]
    fn test_proximity_contains() {
        let area = Proximity::new(DEFAULT_MAP_CENTER, 5.0).unwrap();
        assert!(area.contains(&Coordinates::new(28.62, 77.21)));
        assert!(!area.contains(&Coordinates::new(19.076, 72.8777)));
    }

    #[test]
    fn test_proximity_rejects_bad_radius() {
        assert!(Proximity::new(DEFAULT_MAP_CENTER, 0.0).is_err());
        assert!(Proximity::new(DEFAULT_MAP_CENTER, -1.0).is_err());
        assert!(Proximity::new(Coordinates::new(100.0, 0.0), 1.0).is_err());
    }
}
