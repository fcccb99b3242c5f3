use crate::actor::RegistryHandle;
use crate::registry::RetryDecision;
use crate::types::VehicleAttributes;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, warn};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(VehicleAttributes),
    NotFound,
}

/// Remote registration lookup.
pub trait VerificationService: Send + Sync {
    fn lookup<'a>(
        &'a self,
        reg_number: &'a str,
    ) -> BoxFuture<'a, Result<LookupOutcome, failure::Error>>;
}

/// Runs lookups off the recognition tick and reports the outcome back to the
/// registry owner. At most `workers` lookups are outstanding at once; further
/// scheduled lookups wait for a free slot.
#[derive(Clone)]
pub struct VerificationWorker {
    service: Arc<dyn VerificationService>,
    registry: RegistryHandle,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl VerificationWorker {
    pub fn new(
        service: Arc<dyn VerificationService>,
        registry: RegistryHandle,
        workers: usize,
        timeout: Duration,
    ) -> Self {
        VerificationWorker {
            service,
            registry,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            timeout,
        }
    }

    /// Looks up one registration. Unreachable services, malformed replies,
    /// timeouts and panics are logged and reported as `NotFound`.
    pub async fn verify(&self, reg_number: &str) -> LookupOutcome {
        let lookup = AssertUnwindSafe(self.service.lookup(reg_number)).catch_unwind();
        match time::timeout(self.timeout, lookup).await {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(e))) => {
                warn!("Lookup for {} failed: {}", reg_number, e);
                LookupOutcome::NotFound
            }
            Ok(Err(_)) => {
                warn!("Lookup for {} panicked", reg_number);
                LookupOutcome::NotFound
            }
            Err(_) => {
                warn!("Lookup for {} timed out after {:?}", reg_number, self.timeout);
                LookupOutcome::NotFound
            }
        }
    }

    pub fn schedule(&self, reg_number: String) -> JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move { worker.run(&reg_number).await })
    }

    async fn run(&self, reg_number: &str) {
        let outcome = match self.permits.acquire().await {
            Ok(_permit) => self.verify(reg_number).await,
            Err(_) => return,
        };
        let result = match outcome {
            LookupOutcome::Found(vehicle) => self
                .registry
                .promote(reg_number, vehicle)
                .await
                .map(|promotion| debug!("Promotion of {}: {:?}", reg_number, promotion)),
            LookupOutcome::NotFound => self
                .registry
                .verification_failed(reg_number)
                .await
                .map(|decision| match decision {
                    RetryDecision::Retry { attempts } => {
                        debug!("{} not found ({} attempts so far)", reg_number, attempts)
                    }
                    RetryDecision::Evicted { .. } | RetryDecision::Unknown => {}
                }),
        };
        if let Err(e) = result {
            warn!("Dropping lookup result for {}: {}", reg_number, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::actor::Acceptance;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Lookup backed by a fixed table; records every registration asked for.
    #[derive(Default)]
    pub(crate) struct TableLookup {
        pub(crate) known: HashMap<String, VehicleAttributes>,
        pub(crate) failing: Vec<String>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl VerificationService for TableLookup {
        fn lookup<'a>(
            &'a self,
            reg_number: &'a str,
        ) -> BoxFuture<'a, Result<LookupOutcome, failure::Error>> {
            async move {
                self.calls.lock().unwrap().push(reg_number.to_string());
                if self.failing.iter().any(|r| r == reg_number) {
                    return Err(format_err!("connection refused"));
                }
                Ok(match self.known.get(reg_number) {
                    Some(vehicle) => LookupOutcome::Found(vehicle.clone()),
                    None => LookupOutcome::NotFound,
                })
            }
            .boxed()
        }
    }

    struct HangingLookup;

    impl VerificationService for HangingLookup {
        fn lookup<'a>(
            &'a self,
            _reg_number: &'a str,
        ) -> BoxFuture<'a, Result<LookupOutcome, failure::Error>> {
            async move {
                time::sleep(Duration::from_secs(30)).await;
                Ok(LookupOutcome::NotFound)
            }
            .boxed()
        }
    }

    fn golf() -> VehicleAttributes {
        VehicleAttributes {
            make_model: Some("VOLKSWAGEN GOLF".to_string()),
            colour: Some("BLUE".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn found_cars_are_promoted() {
        let registry = RegistryHandle::spawn(3);
        let mut lookup = TableLookup::default();
        lookup.known.insert("AB12CDE".to_string(), golf());
        let worker =
            VerificationWorker::new(Arc::new(lookup), registry.clone(), 2, Duration::from_secs(1));

        assert_eq!(registry.accept("AB12CDE", false).await, Ok(Acceptance::Accepted));
        worker.schedule("AB12CDE".to_string()).await.unwrap();

        let verified = registry.snapshot_verified().await.unwrap();
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].vehicle, Some(golf()));
        assert_eq!(registry.stats().await.unwrap().unverified, 0);
    }

    #[tokio::test]
    async fn service_errors_leave_car_unverified() {
        let registry = RegistryHandle::spawn(3);
        let lookup = TableLookup {
            failing: vec!["AB12CDE".to_string()],
            ..Default::default()
        };
        let worker =
            VerificationWorker::new(Arc::new(lookup), registry.clone(), 2, Duration::from_secs(1));

        registry.accept("AB12CDE", false).await.unwrap();
        worker.schedule("AB12CDE".to_string()).await.unwrap();

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.unverified, 1);
        assert_eq!(stats.verified, 0);
        assert_eq!(registry.due_for_retry().await.unwrap(), vec!["AB12CDE"]);
    }

    #[tokio::test]
    async fn hung_lookup_times_out_as_not_found() {
        let registry = RegistryHandle::spawn(3);
        let worker = VerificationWorker::new(
            Arc::new(HangingLookup),
            registry,
            1,
            Duration::from_millis(20),
        );
        assert_eq!(worker.verify("AB12CDE").await, LookupOutcome::NotFound);
    }
}
