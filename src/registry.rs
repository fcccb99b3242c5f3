use crate::types::{Car, VehicleAttributes};
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Promoted,
    AlreadyVerified,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Still under the attempt bound; a later tick will dispatch it again.
    Retry { attempts: u32 },
    /// Hit the attempt bound and was dropped from Unverified.
    Evicted { attempts: u32 },
    Unknown,
}

#[derive(Debug, Clone)]
struct Pending {
    car: Car,
    attempts: u32,
    in_flight: bool,
}

/// Unverified and Verified cars, keyed by registration number.
///
/// A registration number is held at most once across both collections;
/// promotion moves the car from one to the other in a single step.
#[derive(Debug, Default)]
pub struct CarRegistry {
    unverified: Vec<Pending>,
    verified: Vec<Car>,
}

impl CarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, reg_number: &str) -> bool {
        self.position_unverified(reg_number).is_some() || self.is_verified(reg_number)
    }

    pub fn is_verified(&self, reg_number: &str) -> bool {
        self.verified.iter().any(|car| car.reg_number == reg_number)
    }

    /// Adds a car awaiting lookup, marked as in flight. Returns false if its
    /// registration number is already held.
    pub fn add_unverified(&mut self, car: Car) -> bool {
        if self.contains(&car.reg_number) {
            return false;
        }
        self.unverified.push(Pending {
            car,
            attempts: 0,
            in_flight: true,
        });
        true
    }

    pub fn promote(&mut self, reg_number: &str, vehicle: VehicleAttributes) -> Promotion {
        if self.is_verified(reg_number) {
            return Promotion::AlreadyVerified;
        }
        match self.position_unverified(reg_number) {
            Some(index) => {
                let pending = self.unverified.remove(index);
                self.verified.push(pending.car.verified(vehicle));
                Promotion::Promoted
            }
            None => Promotion::Unknown,
        }
    }

    /// Records a failed lookup, evicting the car once `max_attempts` is hit.
    pub fn record_failure(&mut self, reg_number: &str, max_attempts: u32) -> RetryDecision {
        let index = match self.position_unverified(reg_number) {
            Some(index) => index,
            None => return RetryDecision::Unknown,
        };
        let pending = &mut self.unverified[index];
        pending.attempts += 1;
        pending.in_flight = false;
        let attempts = pending.attempts;
        if attempts >= max_attempts {
            self.unverified.remove(index);
            info!(
                "Giving up on {} after {} failed lookups",
                reg_number, attempts
            );
            RetryDecision::Evicted { attempts }
        } else {
            RetryDecision::Retry { attempts }
        }
    }

    /// Idle cars under the attempt bound, marked in flight as they are taken.
    pub fn take_due_for_retry(&mut self, max_attempts: u32) -> Vec<String> {
        self.unverified
            .iter_mut()
            .filter(|pending| !pending.in_flight && pending.attempts < max_attempts)
            .map(|pending| {
                pending.in_flight = true;
                pending.car.reg_number.clone()
            })
            .collect()
    }

    pub fn list_verified(&self) -> Vec<Car> {
        self.verified.clone()
    }

    pub fn unverified(&self) -> impl Iterator<Item = &Car> {
        self.unverified.iter().map(|pending| &pending.car)
    }

    pub fn unverified_len(&self) -> usize {
        self.unverified.len()
    }

    pub fn verified_len(&self) -> usize {
        self.verified.len()
    }

    fn position_unverified(&self, reg_number: &str) -> Option<usize> {
        self.unverified
            .iter()
            .position(|pending| pending.car.reg_number == reg_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(make_model: &str) -> VehicleAttributes {
        VehicleAttributes {
            make_model: Some(make_model.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn dedups_on_registration_value() {
        let mut registry = CarRegistry::new();
        assert!(registry.add_unverified(Car::recognized("AB12CDE")));
        assert!(!registry.add_unverified(Car::recognized("AB12CDE")));
        assert!(!registry.add_unverified(Car::corrected("AB12CDE")));
        assert_eq!(registry.unverified_len(), 1);
    }

    #[test]
    fn promotion_moves_exactly_once() {
        let mut registry = CarRegistry::new();
        registry.add_unverified(Car::recognized("AB12CDE"));

        assert_eq!(registry.promote("AB12CDE", attrs("VW GOLF")), Promotion::Promoted);
        assert_eq!(registry.unverified_len(), 0);
        assert_eq!(registry.verified_len(), 1);

        assert_eq!(
            registry.promote("AB12CDE", attrs("AUDI A3")),
            Promotion::AlreadyVerified
        );
        let verified = registry.list_verified();
        assert_eq!(verified.len(), 1);
        assert!(verified[0].is_verified);
        assert_eq!(verified[0].description(), "AB12CDE      VW GOLF");

        // Verified plates still block re-adding.
        assert!(!registry.add_unverified(Car::recognized("AB12CDE")));
        assert_eq!(registry.promote("ZZ99ZZZ", attrs("?")), Promotion::Unknown);
    }

    #[test]
    fn failed_lookups_retry_then_evict() {
        let mut registry = CarRegistry::new();
        registry.add_unverified(Car::recognized("AB12CDE"));

        // In flight from the moment it was added.
        assert!(registry.take_due_for_retry(3).is_empty());

        assert_eq!(
            registry.record_failure("AB12CDE", 3),
            RetryDecision::Retry { attempts: 1 }
        );
        assert_eq!(registry.take_due_for_retry(3), vec!["AB12CDE".to_string()]);
        assert!(registry.take_due_for_retry(3).is_empty());

        registry.record_failure("AB12CDE", 3);
        registry.take_due_for_retry(3);
        assert_eq!(
            registry.record_failure("AB12CDE", 3),
            RetryDecision::Evicted { attempts: 3 }
        );
        assert_eq!(registry.unverified_len(), 0);
        assert_eq!(registry.record_failure("AB12CDE", 3), RetryDecision::Unknown);
    }
}
