use crate::actor::RegistryHandle;
use crate::config::Config;
use crate::cycle::RecognitionCycle;
use crate::error::SessionError;
use crate::frame::{FrameBuffer, FrameSink};
use crate::presenter::Presenter;
use crate::recognizer::Recognizer;
use crate::source::FrameSource;
use crate::verify::{VerificationService, VerificationWorker};
use log::info;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};

/// External collaborators of a capture session.
pub struct Collaborators {
    pub recognizer: Arc<dyn Recognizer>,
    pub lookup: Arc<dyn VerificationService>,
    pub presenter: Arc<dyn Presenter>,
}

/// A running capture: frame source, recognition cycle and lookups wired to
/// one registry.
pub struct CaptureSession {
    shutdown: Option<oneshot::Sender<()>>,
    cycle: Option<JoinHandle<()>>,
    sink: FrameSink,
    source: Option<Box<dyn FrameSource>>,
    frames: Arc<FrameBuffer>,
    registry: RegistryHandle,
}

impl CaptureSession {
    /// Brings the recognizer and frame source up and starts ticking. Either
    /// failing to come up is returned here, before any tick runs.
    pub async fn start(
        config: &Config,
        collaborators: Collaborators,
        mut source: Box<dyn FrameSource>,
        registry: RegistryHandle,
    ) -> Result<Self, SessionError> {
        let recognizer = collaborators.recognizer.clone();
        task::spawn_blocking(move || recognizer.check())
            .await
            .map_err(|e| SessionError::Task(e.to_string()))?
            .map_err(SessionError::Recognizer)?;
        registry.reset_session().await?;

        let frames = Arc::new(FrameBuffer::new());
        let sink = FrameSink::new(frames.clone());
        source
            .start(sink.clone())
            .map_err(|error| SessionError::Source {
                source: source.describe(),
                error,
            })?;
        info!("Capturing from {}", source.describe());

        let verifier = VerificationWorker::new(
            collaborators.lookup,
            registry.clone(),
            config.verify_workers,
            config.verify_timeout,
        );
        let cycle = RecognitionCycle::new(
            config,
            frames.clone(),
            collaborators.recognizer,
            registry.clone(),
            verifier,
            collaborators.presenter,
        );
        let (shutdown, stopped) = oneshot::channel();
        let cycle = tokio::spawn(cycle.run(config.tick_period(), stopped));

        Ok(CaptureSession {
            shutdown: Some(shutdown),
            cycle: Some(cycle),
            sink,
            source: Some(source),
            frames,
            registry,
        })
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Stops ticking (waiting out a tick in progress), disconnects the frame
    /// sink, then releases the source. Lookups already dispatched still
    /// finish and report to the registry.
    pub async fn stop(mut self) -> Result<(), SessionError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(cycle) = self.cycle.take() {
            cycle
                .await
                .map_err(|e| SessionError::Task(e.to_string()))?;
        }
        self.sink.disconnect();
        if let Some(mut source) = self.source.take() {
            source.stop();
            info!("Released {}", source.describe());
        }
        self.frames.clear();
        Ok(())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Dropping the shutdown sender ends the cycle on its next wakeup.
        self.sink.disconnect();
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
    }
}
