//! Pose detection session.
//!
//! Owns the external estimator and the bound video source, forwards frames to
//! the estimator one at a time, turns results into [`PoseSnapshot`]s and fans
//! them out to subscribers.
//!
//! Lifecycle: `Uninitialized -> Initializing -> Tracking <-> Stopped`.
//! `Stopped` means the estimator is held but no video is bound.
//!
//! Every frame sent carries a [`FrameTicket`] stamped with the current run
//! generation. Stopping or restarting bumps the generation, so results that
//! arrive for an older ticket are discarded without reaching subscribers.

mod snapshot;
mod subscribers;

use std::rc::Rc;

pub use snapshot::{PoseSnapshot, RawPoseResults};
pub use subscribers::{SubscriberFn, Subscribers, Subscription, SubscriptionId};

use crate::config::{EstimatorConfig, TrackingConfig};
use crate::error::{Result, TrackingError};
use crate::placement::{get_placement, GarmentCategory, PlacementTransform};

/// A frame producer the estimator can read from
pub trait VideoSource {
    /// True once the source has decoded data for the current frame
    fn has_frame(&self) -> bool;
}

/// External landmark estimator.
///
/// `send` starts inference on the current frame of `source`. Results are
/// delivered back through [`TrackingSession::handle_results`] with the same
/// ticket, followed by [`TrackingSession::finish_frame`].
pub trait PoseEstimator {
    type Source: VideoSource;

    fn send(&mut self, source: &Self::Source, ticket: FrameTicket) -> Result<()>;

    fn close(&mut self) {}
}

/// Constructs the estimator on first initialization
pub trait EstimatorFactory {
    type Estimator: PoseEstimator;

    fn create(&mut self, config: &EstimatorConfig) -> Result<Self::Estimator>;
}

impl<F, E> EstimatorFactory for F
where
    F: FnMut(&EstimatorConfig) -> Result<E>,
    E: PoseEstimator,
{
    type Estimator = E;

    fn create(&mut self, config: &EstimatorConfig) -> Result<E> {
        self(config)
    }
}

/// Video source type accepted by the estimator a factory builds
pub type SourceOf<F> = <<F as EstimatorFactory>::Estimator as PoseEstimator>::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Tracking,
    Stopped,
}

/// Identifies one frame handed to the estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTicket {
    pub generation: u64,
    pub sequence: u64,
    /// Capture time in milliseconds
    pub captured_at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Not tracking, or the source has no frame yet
    Idle,
    /// Skipped: a frame is in flight, the rate cap applies, or send failed
    Dropped,
    Sent(FrameTicket),
}

pub struct TrackingSession<F: EstimatorFactory> {
    config: TrackingConfig,
    factory: F,
    estimator: Option<F::Estimator>,
    source: Option<SourceOf<F>>,
    state: SessionState,
    subscribers: Subscribers,
    last_snapshot: Option<Rc<PoseSnapshot>>,
    in_flight: Option<FrameTicket>,
    generation: u64,
    sequence: u64,
    last_sent_at: Option<f64>,
    error_handler: Option<Box<dyn FnMut(&TrackingError)>>,
}

impl<F: EstimatorFactory> TrackingSession<F> {
    pub fn new(config: TrackingConfig, factory: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            estimator: None,
            source: None,
            state: SessionState::Uninitialized,
            subscribers: Subscribers::new(),
            last_snapshot: None,
            in_flight: None,
            generation: 0,
            sequence: 0,
            last_sent_at: None,
            error_handler: None,
        })
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Tracking
    }

    pub fn is_initialized(&self) -> bool {
        self.estimator.is_some()
    }

    /// Receives every error the session reports, in addition to the log
    pub fn set_error_handler<H>(&mut self, handler: H)
    where
        H: FnMut(&TrackingError) + 'static,
    {
        self.error_handler = Some(Box::new(handler));
    }

    /// Construct the estimator. Repeated calls reuse the existing one.
    pub fn initialize(&mut self) -> Result<()> {
        if self.estimator.is_some() {
            return Ok(());
        }

        self.state = SessionState::Initializing;
        match self.factory.create(&self.config.estimator) {
            Ok(estimator) => {
                self.estimator = Some(estimator);
                self.state = SessionState::Stopped;
                log::info!(
                    "Pose estimator initialized (model complexity {})",
                    self.config.estimator.model_complexity
                );
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Uninitialized;
                Err(self.report_error(e))
            }
        }
    }

    /// Bind a video source and begin tracking, initializing first if needed.
    ///
    /// Restarting while already tracking rebinds the source and invalidates
    /// any frame still in flight.
    pub fn start_detection(&mut self, source: Option<SourceOf<F>>) -> Result<()> {
        let source = match source {
            Some(source) => source,
            None => return Err(self.report_error(TrackingError::MissingVideoSource)),
        };
        self.initialize()?;

        self.generation += 1;
        self.in_flight = None;
        self.last_sent_at = None;
        self.source = Some(source);
        self.state = SessionState::Tracking;
        log::info!("Pose detection started (run {})", self.generation);
        Ok(())
    }

    /// Offer the current video frame to the estimator.
    ///
    /// At most one frame is in flight; later ticks are dropped until
    /// [`finish_frame`](Self::finish_frame) clears it.
    pub fn pump_frame(&mut self, now_ms: f64) -> FrameOutcome {
        if self.state != SessionState::Tracking {
            return FrameOutcome::Idle;
        }
        let (estimator, source) = match (self.estimator.as_mut(), self.source.as_ref()) {
            (Some(estimator), Some(source)) => (estimator, source),
            _ => return FrameOutcome::Idle,
        };
        if !source.has_frame() {
            return FrameOutcome::Idle;
        }
        if self.in_flight.is_some() {
            log::trace!("Frame dropped, estimator busy");
            return FrameOutcome::Dropped;
        }
        if let (Some(rate), Some(last)) = (self.config.max_frame_rate, self.last_sent_at) {
            if now_ms - last < 1000.0 / f64::from(rate) {
                return FrameOutcome::Dropped;
            }
        }

        self.sequence += 1;
        let ticket = FrameTicket {
            generation: self.generation,
            sequence: self.sequence,
            captured_at: now_ms,
        };

        match estimator.send(source, ticket) {
            Ok(()) => {
                self.in_flight = Some(ticket);
                self.last_sent_at = Some(now_ms);
                FrameOutcome::Sent(ticket)
            }
            Err(e) => {
                self.report_error(e);
                FrameOutcome::Dropped
            }
        }
    }

    /// Ticket of the frame currently held by the estimator
    pub fn in_flight(&self) -> Option<FrameTicket> {
        self.in_flight
    }

    /// Release the in-flight slot once the estimator is done with `ticket`
    pub fn finish_frame(&mut self, ticket: FrameTicket) {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
    }

    /// Build and store a snapshot without notifying subscribers.
    ///
    /// Returns `None` when `ticket` belongs to a stopped or superseded run.
    pub fn ingest_results(
        &mut self,
        ticket: FrameTicket,
        raw: RawPoseResults,
    ) -> Option<Rc<PoseSnapshot>> {
        if self.state != SessionState::Tracking || ticket.generation != self.generation {
            log::debug!(
                "Discarding results for frame {} of run {}",
                ticket.sequence,
                ticket.generation
            );
            return None;
        }

        let snapshot = Rc::new(PoseSnapshot::from_results(raw, ticket.captured_at));
        self.last_snapshot = Some(Rc::clone(&snapshot));
        Some(snapshot)
    }

    /// Ingest estimator output and deliver it to all subscribers
    pub fn handle_results(
        &mut self,
        ticket: FrameTicket,
        raw: RawPoseResults,
    ) -> Option<Rc<PoseSnapshot>> {
        let snapshot = self.ingest_results(ticket, raw)?;
        self.subscribers.dispatch(&snapshot);
        Some(snapshot)
    }

    pub fn subscribe<S>(&self, callback: S) -> Subscription
    where
        S: Fn(&Rc<PoseSnapshot>) -> Result<()> + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Handle to the subscriber registry, usable while the session is borrowed
    pub fn subscribers(&self) -> Subscribers {
        self.subscribers.clone()
    }

    pub fn last_snapshot(&self) -> Option<Rc<PoseSnapshot>> {
        self.last_snapshot.clone()
    }

    /// Placement for `category` from the most recent snapshot
    pub fn placement_for(&self, category: GarmentCategory) -> Option<PlacementTransform> {
        let key_points = self
            .last_snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.key_points.as_ref());
        get_placement(key_points, category)
    }

    /// Unbind the video source. The estimator and subscribers are kept.
    pub fn stop(&mut self) {
        if self.state != SessionState::Tracking {
            return;
        }
        self.generation += 1;
        self.source = None;
        self.in_flight = None;
        self.last_sent_at = None;
        self.state = SessionState::Stopped;
        log::info!("Pose detection stopped");
    }

    /// Stop and release the estimator
    pub fn close(&mut self) {
        self.stop();
        if let Some(mut estimator) = self.estimator.take() {
            estimator.close();
            log::info!("Pose estimator closed");
        }
        self.state = SessionState::Uninitialized;
    }

    /// Log an error and pass it to the error handler
    pub fn report_error(&mut self, error: TrackingError) -> TrackingError {
        log::error!("{}", error);
        if let Some(handler) = self.error_handler.as_mut() {
            handler(&error);
        }
        error
    }
}

impl<F: EstimatorFactory> Drop for TrackingSession<F> {
    fn drop(&mut self) {
        self.close();
    }
}
