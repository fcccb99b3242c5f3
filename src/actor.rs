//! Single owner of the session's plate state.
//!
//! LiveSet and CarRegistry live inside one task; the recognition cycle and
//! the verification tasks reach them only through a [`RegistryHandle`], so
//! every mutation is applied in the order it arrives.

use crate::error::RegistryClosed;
use crate::live_set::LiveSet;
use crate::registry::{CarRegistry, Promotion, RetryDecision};
use crate::types::{Car, VehicleAttributes};
use log::{debug, info};
use tokio::sync::{mpsc, oneshot};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accepted,
    /// Already emitted this session.
    Duplicate,
    /// New to this session but already held by the registry.
    AlreadyRegistered,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub live: usize,
    pub unverified: usize,
    pub verified: usize,
}

enum Command {
    Accept {
        plate: String,
        corrected: bool,
        reply: oneshot::Sender<Acceptance>,
    },
    Promote {
        reg_number: String,
        vehicle: VehicleAttributes,
        reply: oneshot::Sender<Promotion>,
    },
    VerificationFailed {
        reg_number: String,
        reply: oneshot::Sender<RetryDecision>,
    },
    DueForRetry {
        reply: oneshot::Sender<Vec<String>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Car>>,
    },
    Stats {
        reply: oneshot::Sender<RegistryStats>,
    },
    ResetSession {
        reply: oneshot::Sender<()>,
    },
}

#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<Command>,
}

impl RegistryHandle {
    /// Spawns the owner task on the current runtime. It exits once every
    /// handle has been dropped.
    pub fn spawn(max_attempts: u32) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(run(rx, max_attempts));
        RegistryHandle { tx }
    }

    /// Dedups the plate against this session and, if new, registers a car
    /// for it in Unverified.
    pub async fn accept(
        &self,
        plate: &str,
        corrected: bool,
    ) -> Result<Acceptance, RegistryClosed> {
        let plate = plate.to_string();
        self.request(|reply| Command::Accept {
            plate,
            corrected,
            reply,
        })
        .await
    }

    pub async fn promote(
        &self,
        reg_number: &str,
        vehicle: VehicleAttributes,
    ) -> Result<Promotion, RegistryClosed> {
        let reg_number = reg_number.to_string();
        self.request(|reply| Command::Promote {
            reg_number,
            vehicle,
            reply,
        })
        .await
    }

    pub async fn verification_failed(
        &self,
        reg_number: &str,
    ) -> Result<RetryDecision, RegistryClosed> {
        let reg_number = reg_number.to_string();
        self.request(|reply| Command::VerificationFailed { reg_number, reply })
            .await
    }

    pub async fn due_for_retry(&self) -> Result<Vec<String>, RegistryClosed> {
        self.request(|reply| Command::DueForRetry { reply }).await
    }

    pub async fn snapshot_verified(&self) -> Result<Vec<Car>, RegistryClosed> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn stats(&self) -> Result<RegistryStats, RegistryClosed> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Starts a new capture session: forgets the plates emitted so far but
    /// keeps every registered car.
    pub async fn reset_session(&self) -> Result<(), RegistryClosed> {
        self.request(|reply| Command::ResetSession { reply }).await
    }

    async fn request<T, F>(&self, command: F) -> Result<T, RegistryClosed>
    where
        F: FnOnce(oneshot::Sender<T>) -> Command,
    {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| RegistryClosed)?;
        response.await.map_err(|_| RegistryClosed)
    }
}

struct Owner {
    live: LiveSet,
    registry: CarRegistry,
    max_attempts: u32,
}

impl Owner {
    fn handle(&mut self, command: Command) {
        // A dropped reply only means the caller stopped waiting.
        match command {
            Command::Accept {
                plate,
                corrected,
                reply,
            } => {
                let _ = reply.send(self.accept(&plate, corrected));
            }
            Command::Promote {
                reg_number,
                vehicle,
                reply,
            } => {
                let promotion = self.registry.promote(&reg_number, vehicle);
                if promotion == Promotion::Promoted {
                    info!("Verified plate {}", reg_number);
                }
                let _ = reply.send(promotion);
            }
            Command::VerificationFailed { reg_number, reply } => {
                let _ = reply.send(self.registry.record_failure(&reg_number, self.max_attempts));
            }
            Command::DueForRetry { reply } => {
                let _ = reply.send(self.registry.take_due_for_retry(self.max_attempts));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.registry.list_verified());
            }
            Command::Stats { reply } => {
                let _ = reply.send(RegistryStats {
                    live: self.live.len(),
                    unverified: self.registry.unverified_len(),
                    verified: self.registry.verified_len(),
                });
            }
            Command::ResetSession { reply } => {
                self.live.reset();
                let _ = reply.send(());
            }
        }
    }

    fn accept(&mut self, plate: &str, corrected: bool) -> Acceptance {
        if !self.live.insert(plate) {
            return Acceptance::Duplicate;
        }
        let car = if corrected {
            Car::corrected(plate)
        } else {
            Car::recognized(plate)
        };
        if !self.registry.add_unverified(car) {
            return Acceptance::AlreadyRegistered;
        }
        info!(
            "Accepted plate {} ({} live){}",
            plate,
            self.live.len(),
            if corrected { " as a correction" } else { "" }
        );
        Acceptance::Accepted
    }
}

async fn run(mut rx: mpsc::Receiver<Command>, max_attempts: u32) {
    let mut owner = Owner {
        live: LiveSet::new(),
        registry: CarRegistry::new(),
        max_attempts,
    };
    while let Some(command) = rx.recv().await {
        owner.handle(command);
    }
    debug!("Registry owner exiting");
}
