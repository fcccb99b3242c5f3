use chrono::{DateTime, Local};

/// One OCR guess for a detected plate region.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateCandidate {
    pub characters: String,
    /// Percent, 0-100.
    pub confidence: f32,
    pub rank: usize,
}

/// Candidates for a single detected plate, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateRegion {
    pub region_id: usize,
    pub candidates: Vec<PlateCandidate>,
}

/// Attributes returned by a successful registration lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleAttributes {
    pub make_model: Option<String>,
    pub body_type: Option<String>,
    pub colour: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Car {
    pub reg_number: String,
    pub recognized_at: DateTime<Local>,
    pub is_corrected: bool,
    pub is_verified: bool,
    pub vehicle: Option<VehicleAttributes>,
}

impl Car {
    pub fn recognized(reg_number: &str) -> Self {
        Car {
            reg_number: reg_number.to_string(),
            recognized_at: Local::now(),
            is_corrected: false,
            is_verified: false,
            vehicle: None,
        }
    }

    pub fn corrected(reg_number: &str) -> Self {
        Car {
            is_corrected: true,
            ..Car::recognized(reg_number)
        }
    }

    /// Consumes an unverified car, writing the lookup attributes. This is the
    /// only place the attributes are ever set.
    pub fn verified(self, vehicle: VehicleAttributes) -> Self {
        Car {
            is_verified: true,
            vehicle: Some(vehicle),
            ..self
        }
    }

    /// Line shown for the car in result listings.
    pub fn description(&self) -> String {
        let make_model = self
            .vehicle
            .as_ref()
            .and_then(|v| v.make_model.as_deref())
            .unwrap_or("unknown");
        format!("{}      {}", self.reg_number, make_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_sets_attributes_once() {
        let car = Car::corrected("AB12CDE");
        assert!(car.is_corrected);
        assert!(!car.is_verified);

        let car = car.verified(VehicleAttributes {
            make_model: Some("FORD FIESTA".to_string()),
            ..Default::default()
        });
        assert!(car.is_verified);
        assert!(car.is_corrected);
        assert_eq!(car.description(), "AB12CDE      FORD FIESTA");
    }
}
