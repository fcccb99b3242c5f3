//! The periodic recognition tick.
//!
//! Each tick takes the latest frame, runs the recognizer on it, filters the
//! candidates and feeds the survivors (plus their corrected variants) to the
//! registry owner, dispatching a lookup for every new car. Nothing that goes
//! wrong inside a tick stops the next one.

use crate::actor::{Acceptance, RegistryHandle};
use crate::config::Config;
use crate::correction::Corrector;
use crate::error::RegistryClosed;
use crate::frame::{Frame, FrameBuffer};
use crate::presenter::Presenter;
use crate::recognizer::Recognizer;
use crate::types::{Car, PlateCandidate, PlateRegion};
use crate::verify::VerificationWorker;
use log::{debug, error, info, warn};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task;
use tokio::time::{self, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    NoFrame,
    RecognizerFault,
    RegistryUnavailable,
    Completed {
        frame: u64,
        accepted: Vec<String>,
        corrected: Vec<String>,
        retried: usize,
    },
}

/// Candidate filters applied before deduplication.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    pub confidence_threshold: f32,
    pub plate_pattern: Option<Regex>,
}

impl CandidateFilter {
    pub fn from_config(config: &Config) -> Self {
        CandidateFilter {
            confidence_threshold: config.confidence_threshold,
            plate_pattern: config.plate_filter.clone(),
        }
    }

    pub fn admits(&self, candidate: &PlateCandidate) -> bool {
        if candidate.confidence <= self.confidence_threshold {
            return false;
        }
        match &self.plate_pattern {
            Some(pattern) => pattern.is_match(&candidate.characters),
            None => true,
        }
    }
}

pub struct RecognitionCycle {
    filter: CandidateFilter,
    top_n: usize,
    corrector: Corrector,
    frames: Arc<FrameBuffer>,
    recognizer: Arc<dyn Recognizer>,
    registry: RegistryHandle,
    verifier: VerificationWorker,
    presenter: Arc<dyn Presenter>,
}

impl RecognitionCycle {
    pub fn new(
        config: &Config,
        frames: Arc<FrameBuffer>,
        recognizer: Arc<dyn Recognizer>,
        registry: RegistryHandle,
        verifier: VerificationWorker,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        RecognitionCycle {
            filter: CandidateFilter::from_config(config),
            top_n: config.top_n,
            corrector: Corrector::new(config.confusable_pairs.clone(), config.correction),
            frames,
            recognizer,
            registry,
            verifier,
            presenter,
        }
    }

    /// Ticks every `period` until `shutdown` fires or its sender is dropped.
    /// A tick in progress always runs to completion first.
    pub async fn run(self, period: Duration, mut shutdown: oneshot::Receiver<()>) {
        info!("Recognition cycle running every {:?}", period);
        let mut ticker = time::interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let TickOutcome::Completed { frame, accepted, corrected, .. } = self.tick().await {
                        if !accepted.is_empty() {
                            info!(
                                "Frame {}: accepted {:?}, corrections {:?}",
                                frame, accepted, corrected
                            );
                        }
                    }
                }
            }
        }
        info!("Recognition cycle stopped");
    }

    pub async fn tick(&self) -> TickOutcome {
        let frame = match self.frames.current() {
            Some(frame) => frame,
            None => {
                debug!("No frame yet, skipping tick");
                return TickOutcome::NoFrame;
            }
        };
        let seq = frame.seq;
        let regions = match self.recognize(frame).await {
            Ok(regions) => regions,
            Err(e) => {
                warn!("Recognition failed on frame {}: {}", seq, e);
                return TickOutcome::RecognizerFault;
            }
        };
        match self.process(seq, &regions).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Skipping tick for frame {}: {}", seq, e);
                TickOutcome::RegistryUnavailable
            }
        }
    }

    async fn recognize(&self, frame: Arc<Frame>) -> Result<Vec<PlateRegion>, failure::Error> {
        let recognizer = self.recognizer.clone();
        let top_n = self.top_n;
        task::spawn_blocking(move || recognizer.recognize(&frame, top_n))
            .await
            .map_err(|e| format_err!("Recognizer task failed: {}", e))?
    }

    async fn process(
        &self,
        seq: u64,
        regions: &[PlateRegion],
    ) -> Result<TickOutcome, RegistryClosed> {
        // Only failures reported before this tick's submissions are retried.
        let due = self.registry.due_for_retry().await?;
        for reg_number in &due {
            debug!("Retrying lookup for {}", reg_number);
            self.verifier.schedule(reg_number.clone());
        }

        let mut accepted = Vec::new();
        let mut corrected = Vec::new();
        for candidate in regions.iter().flat_map(|region| region.candidates.iter()) {
            if !self.filter.admits(candidate) {
                debug!(
                    "Frame {}: rejected {} ({:.1}%)",
                    seq, candidate.characters, candidate.confidence
                );
                continue;
            }
            if self.submit(&candidate.characters, false).await? {
                accepted.push(candidate.characters.clone());
                corrected.extend(self.submit_corrections(&candidate.characters).await?);
            }
        }

        let verified = self.registry.snapshot_verified().await?;
        self.refresh(verified).await;

        Ok(TickOutcome::Completed {
            frame: seq,
            accepted,
            corrected,
            retried: due.len(),
        })
    }

    /// Runs one plate through session dedup and, if it is new, registers it
    /// and dispatches its lookup.
    async fn submit(&self, plate: &str, corrected: bool) -> Result<bool, RegistryClosed> {
        match self.registry.accept(plate, corrected).await? {
            Acceptance::Accepted => {
                self.verifier.schedule(plate.to_string());
                Ok(true)
            }
            Acceptance::Duplicate | Acceptance::AlreadyRegistered => Ok(false),
        }
    }

    /// Variants skip the confidence and pattern filters; they only go through
    /// dedup.
    async fn submit_corrections(&self, plate: &str) -> Result<Vec<String>, RegistryClosed> {
        if !self.corrector.applies_to(plate) {
            return Ok(Vec::new());
        }
        let variants = match self.corrector.variants(plate) {
            Ok(variants) => variants,
            Err(e) => {
                warn!("Not correcting: {}", e);
                return Ok(Vec::new());
            }
        };
        let mut accepted = Vec::new();
        for variant in variants {
            if self.submit(&variant, true).await? {
                accepted.push(variant);
            }
        }
        Ok(accepted)
    }

    async fn refresh(&self, verified: Vec<Car>) {
        let presenter = self.presenter.clone();
        if let Err(e) = task::spawn_blocking(move || presenter.refresh(&verified)).await {
            warn!("Presenter refresh failed: {}", e);
        }
    }
}
