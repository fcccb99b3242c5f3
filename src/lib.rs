//! Live licence-plate capture: recognise plates on a periodic tick, dedup and
//! correct the recognizer's guesses, and confirm them against a vehicle
//! registry lookup.

#[macro_use]
extern crate failure;

pub mod actor;
pub mod capture;
pub mod config;
pub mod correction;
pub mod cycle;
pub mod db;
pub mod error;
pub mod frame;
pub mod live_set;
pub mod lookup;
pub mod presenter;
pub mod recognizer;
pub mod registry;
pub mod source;
pub mod types;
pub mod verify;

pub use actor::RegistryHandle;
pub use capture::{CaptureSession, Collaborators};
pub use config::Config;
pub use types::{Car, PlateCandidate, PlateRegion, VehicleAttributes};
