//! Centralized application state with context passing pattern
//!
//! Implements a Context Passing pattern where:
//! 1. `AppState` is a single struct owning the tracker, the garment rig and
//!    the configuration they were built from
//! 2. Core functions take explicit references (e.g., `&PoseSnapshot`, `&mut dyn RenderScene`)
//! 3. WASM bindings are thin wrappers that extract from AppState and call pure functions
//!
//! This design enables:
//! - Unit testing of the whole frame path with a mock estimator
//! - Clear dependency graphs

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::TrackingConfig;
use crate::error::{Result, TrackingError};
use crate::scene::{GarmentRig, SceneTransform};
use crate::session::{
    EstimatorFactory, FrameOutcome, FrameTicket, PoseSnapshot, RawPoseResults, Subscribers,
    TrackingSession,
};
use crate::tracker::{PoseTracker, TrackerOptions};

/// Output of one estimator result, ready to be delivered outside the state borrow
pub struct FrameDelivery {
    pub snapshot: Rc<PoseSnapshot>,
    /// Garment transforms to push to the render scene, in rig order
    pub transforms: Vec<(String, SceneTransform)>,
    subscribers: Subscribers,
}

impl FrameDelivery {
    /// Notify subscribers, including the tracker's detection gate
    pub fn dispatch(&self) -> usize {
        self.subscribers.dispatch(&self.snapshot)
    }
}

/// Functions should take explicit references to what they need, not access
/// this struct directly via globals.
pub struct AppState<F: EstimatorFactory> {
    /// Tracking configuration (read-only after construction)
    pub config: TrackingConfig,
    /// Pose tracker and the session it drives
    pub tracker: PoseTracker<F>,
    /// Garments currently worn
    pub rig: GarmentRig,
    /// Session errors awaiting delivery; filled by the tracker's error handler
    errors: Rc<RefCell<Vec<TrackingError>>>,
}

impl<F: EstimatorFactory> AppState<F> {
    pub fn new(config: TrackingConfig, factory: F) -> Result<Self> {
        let session = TrackingSession::new(config, factory)?;
        let mut tracker = PoseTracker::new(session, TrackerOptions::from_config(&config));

        let errors: Rc<RefCell<Vec<TrackingError>>> = Rc::default();
        let queue = Rc::clone(&errors);
        tracker.on_error(move |error| queue.borrow_mut().push(error.clone()));

        Ok(Self {
            tracker,
            rig: GarmentRig::from_config(&config),
            config,
            errors,
        })
    }

    /// Errors reported since the last call, oldest first.
    ///
    /// Like [`FrameDelivery`], these are meant to reach user callbacks after
    /// the state has been released. Replacing the tracker's `on_error`
    /// handler stops the queueing.
    pub fn take_errors(&mut self) -> Vec<TrackingError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }

    pub fn pump_frame(&mut self, now_ms: f64) -> FrameOutcome {
        self.tracker.session_mut().pump_frame(now_ms)
    }

    /// Ingest estimator output and compute garment transforms.
    ///
    /// Subscribers are not called here; the caller dispatches the returned
    /// delivery once it no longer holds the state.
    pub fn receive_results(
        &mut self,
        ticket: FrameTicket,
        raw: RawPoseResults,
    ) -> Option<FrameDelivery> {
        let session = self.tracker.session_mut();
        let snapshot = session.ingest_results(ticket, raw)?;
        let subscribers = session.subscribers();

        let mut transforms = Vec::new();
        self.rig
            .update(&snapshot, &mut |id: &str, t: &SceneTransform| {
                transforms.push((id.to_string(), *t))
            });

        Some(FrameDelivery {
            snapshot,
            transforms,
            subscribers,
        })
    }

    pub fn finish_frame(&mut self, ticket: FrameTicket) {
        self.tracker.session_mut().finish_frame(ticket);
    }

    pub fn stop_tracking(&mut self) {
        self.tracker.stop_tracking();
        self.rig.reset_smoothing();
    }
}

#[cfg(target_arch = "wasm32")]
pub use global::*;

#[cfg(target_arch = "wasm32")]
mod global {
    use std::cell::RefCell;

    use super::AppState;
    use crate::web::JsEstimatorFactory;

    pub type WebAppState = AppState<JsEstimatorFactory>;

    // Global state access, thin wrapper for WASM bindings only
    thread_local! {
        static APP_STATE: RefCell<Option<WebAppState>> = const { RefCell::new(None) };
    }

    /// Execute a closure with immutable access to AppState
    ///
    /// Returns None if AppState is not initialized, or is already borrowed by
    /// a callback further up the stack
    pub fn with_app_state<F, R>(f: F) -> Option<R>
    where
        F: FnOnce(&WebAppState) -> R,
    {
        APP_STATE.with(|state| match state.try_borrow() {
            Ok(borrowed) => borrowed.as_ref().map(f),
            Err(_) => {
                log::warn!("App state is busy; ignoring reentrant call");
                None
            }
        })
    }

    /// Execute a closure with mutable access to AppState
    ///
    /// Returns None if AppState is not initialized or already borrowed
    pub fn with_app_state_mut<F, R>(f: F) -> Option<R>
    where
        F: FnOnce(&mut WebAppState) -> R,
    {
        APP_STATE.with(|state| match state.try_borrow_mut() {
            Ok(mut borrowed) => borrowed.as_mut().map(f),
            Err(_) => {
                log::warn!("App state is busy; ignoring reentrant call");
                None
            }
        })
    }

    /// Install a new AppState, dropping (and closing) any previous one
    pub fn initialize_app_state(app: WebAppState) {
        let previous = APP_STATE.with(|state| state.borrow_mut().replace(app));
        drop(previous);
    }

    /// Drop the AppState, releasing the estimator
    pub fn destroy_app_state() -> bool {
        let previous = APP_STATE.with(|state| state.borrow_mut().take());
        previous.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurements::fixtures::standing_body;
    use crate::scene::GarmentEntry;
    use crate::session::mock::{video, Recorder};
    use std::cell::Cell;

    fn sent(outcome: FrameOutcome) -> FrameTicket {
        match outcome {
            FrameOutcome::Sent(ticket) => ticket,
            other => panic!("expected a sent frame, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_path() {
        let recorder = Recorder::default();
        let mut app = AppState::new(TrackingConfig::default(), recorder.factory()).unwrap();
        app.rig.add(GarmentEntry::new("tee", "shirt"));

        let detected = Rc::new(Cell::new(0));
        let d = detected.clone();
        app.tracker.on_pose_detected(move |_| d.set(d.get() + 1));
        assert!(app.tracker.start_tracking(video()));

        let ticket = sent(app.pump_frame(0.0));
        assert_eq!(app.pump_frame(16.0), FrameOutcome::Dropped);

        let delivery = app
            .receive_results(ticket, RawPoseResults::new(standing_body()))
            .unwrap();
        app.finish_frame(ticket);
        assert_eq!(delivery.transforms.len(), 1);
        assert_eq!(delivery.transforms[0].0, "tee");

        // Gate callbacks only run on dispatch
        assert_eq!(detected.get(), 0);
        assert_eq!(delivery.dispatch(), 1);
        assert_eq!(detected.get(), 1);
        assert!(app.tracker.is_pose_detected());
    }

    #[test]
    fn test_results_after_stop_are_dropped() {
        let recorder = Recorder::default();
        let mut app = AppState::new(TrackingConfig::default(), recorder.factory()).unwrap();
        app.tracker.start_tracking(video());
        let ticket = sent(app.pump_frame(0.0));

        app.stop_tracking();
        assert!(app
            .receive_results(ticket, RawPoseResults::new(standing_body()))
            .is_none());
        assert_eq!(app.pump_frame(16.0), FrameOutcome::Idle);
    }

    #[test]
    fn test_errors_queue_until_taken() {
        let recorder = Recorder::default();
        let mut app = AppState::new(TrackingConfig::default(), recorder.factory()).unwrap();
        assert!(app.take_errors().is_empty());

        assert!(!app.tracker.start_tracking(None));
        // Still queued after the failing call returns; nothing has been delivered yet
        assert_eq!(app.take_errors(), vec![TrackingError::MissingVideoSource]);
        assert!(app.take_errors().is_empty());

        // The state is usable again for a retry
        assert!(app.tracker.start_tracking(video()));
        assert!(app.take_errors().is_empty());
    }

    #[test]
    fn test_config_flows_into_rig() {
        let recorder = Recorder::default();
        let config = TrackingConfig {
            mirror_x: true,
            ..TrackingConfig::default()
        };
        let app = AppState::new(config, recorder.factory()).unwrap();
        assert!(app.rig.projection().mirror_x);
        assert_eq!(app.tracker.min_confidence(), 0.5);
    }
}
