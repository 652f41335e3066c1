//! Pose tracking facade.
//!
//! Wraps a [`TrackingSession`] with a detection gate. Every snapshot updates
//! the current pose. A confident detection fires `on_pose_detected` and a
//! frame without a body fires `on_pose_lost`. A detected pose below the
//! confidence threshold fires neither.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::TrackingConfig;
use crate::error::TrackingError;
use crate::keypoints::BodyPart;
use crate::measurements::BodyMeasurements;
use crate::placement::{get_placement, GarmentCategory, PlacementTransform};
use crate::session::{EstimatorFactory, PoseSnapshot, SourceOf, Subscription, TrackingSession};
use crate::stabilizer::{MeasurementStabilizer, DEFAULT_WINDOW};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerOptions {
    /// Aggregate visibility a detected pose needs to count as confident
    pub min_confidence: f32,
    /// Measurement averaging window; `None` disables averaging
    pub stabilizer_window: Option<usize>,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            stabilizer_window: Some(DEFAULT_WINDOW),
        }
    }
}

impl TrackerOptions {
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            stabilizer_window: Some(config.stabilizer_window),
        }
    }
}

/// Gate decision for one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseEvent {
    Detected,
    Lost,
    /// Body present but below the confidence threshold
    LowConfidence,
}

pub fn classify(snapshot: &PoseSnapshot, min_confidence: f32) -> PoseEvent {
    if !snapshot.is_detected {
        PoseEvent::Lost
    } else if snapshot.visibility >= min_confidence {
        PoseEvent::Detected
    } else {
        PoseEvent::LowConfidence
    }
}

type PoseCallback = Rc<dyn Fn(&PoseSnapshot)>;

struct GateState {
    pose: Option<Rc<PoseSnapshot>>,
    stabilizer: Option<MeasurementStabilizer>,
    on_pose_detected: Option<PoseCallback>,
    on_pose_lost: Option<PoseCallback>,
}

fn deliver(gate: &RefCell<GateState>, snapshot: &Rc<PoseSnapshot>, min_confidence: f32) {
    let callback = {
        let mut state = gate.borrow_mut();
        state.pose = Some(Rc::clone(snapshot));
        if let Some(stabilizer) = state.stabilizer.as_mut() {
            stabilizer.observe(snapshot);
        }
        match classify(snapshot, min_confidence) {
            PoseEvent::Detected => state.on_pose_detected.clone(),
            PoseEvent::Lost => state.on_pose_lost.clone(),
            PoseEvent::LowConfidence => None,
        }
    };

    // Invoked after the borrow is released so callbacks may query the tracker state
    if let Some(callback) = callback {
        callback(snapshot);
    }
}

pub struct PoseTracker<F: EstimatorFactory> {
    session: TrackingSession<F>,
    min_confidence: f32,
    gate: Rc<RefCell<GateState>>,
    subscription: Option<Subscription>,
}

impl<F: EstimatorFactory> PoseTracker<F> {
    pub fn new(session: TrackingSession<F>, options: TrackerOptions) -> Self {
        Self {
            session,
            min_confidence: options.min_confidence,
            gate: Rc::new(RefCell::new(GateState {
                pose: None,
                stabilizer: options.stabilizer_window.map(MeasurementStabilizer::new),
                on_pose_detected: None,
                on_pose_lost: None,
            })),
            subscription: None,
        }
    }

    pub fn session(&self) -> &TrackingSession<F> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TrackingSession<F> {
        &mut self.session
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    pub fn on_pose_detected<C>(&mut self, callback: C)
    where
        C: Fn(&PoseSnapshot) + 'static,
    {
        self.gate.borrow_mut().on_pose_detected = Some(Rc::new(callback));
    }

    pub fn on_pose_lost<C>(&mut self, callback: C)
    where
        C: Fn(&PoseSnapshot) + 'static,
    {
        self.gate.borrow_mut().on_pose_lost = Some(Rc::new(callback));
    }

    /// Receives initialization, video source and frame errors
    pub fn on_error<C>(&mut self, callback: C)
    where
        C: Fn(&TrackingError) + 'static,
    {
        self.session.set_error_handler(move |error| callback(error));
    }

    /// Start tracking `source`. Returns false if startup failed; the error
    /// has already been logged and passed to `on_error`.
    pub fn start_tracking(&mut self, source: Option<SourceOf<F>>) -> bool {
        if self.subscription.is_some() {
            return true;
        }
        if self.session.start_detection(source).is_err() {
            return false;
        }

        {
            let mut state = self.gate.borrow_mut();
            state.pose = None;
            if let Some(stabilizer) = state.stabilizer.as_mut() {
                stabilizer.clear();
            }
        }

        let gate = Rc::clone(&self.gate);
        let min_confidence = self.min_confidence;
        self.subscription = Some(self.session.subscribe(move |snapshot| {
            deliver(&gate, snapshot, min_confidence);
            Ok(())
        }));
        true
    }

    pub fn stop_tracking(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.session.stop();
        self.gate.borrow_mut().pose = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.subscription.is_some()
    }

    /// Most recent snapshot of the current run
    pub fn pose(&self) -> Option<Rc<PoseSnapshot>> {
        self.gate.borrow().pose.clone()
    }

    pub fn is_pose_detected(&self) -> bool {
        self.gate
            .borrow()
            .pose
            .as_ref()
            .is_some_and(|pose| pose.is_detected)
    }

    pub fn pose_confidence(&self) -> f32 {
        self.gate
            .borrow()
            .pose
            .as_ref()
            .map_or(0.0, |pose| pose.visibility)
    }

    /// Timestamp of the most recent snapshot in milliseconds
    pub fn last_update(&self) -> Option<f64> {
        self.gate.borrow().pose.as_ref().map(|pose| pose.timestamp)
    }

    pub fn body_measurements(&self) -> Option<BodyMeasurements> {
        self.gate
            .borrow()
            .pose
            .as_ref()
            .and_then(|pose| pose.measurements)
    }

    /// Window-averaged measurements over the current run
    pub fn averaged_measurements(&self) -> Option<BodyMeasurements> {
        self.gate
            .borrow()
            .stabilizer
            .as_ref()
            .and_then(MeasurementStabilizer::averaged)
    }

    pub fn clothing_placement(&self, category: GarmentCategory) -> Option<PlacementTransform> {
        let state = self.gate.borrow();
        let pose = state.pose.as_ref().filter(|pose| pose.is_detected)?;
        get_placement(pose.key_points.as_ref(), category)
    }

    pub fn is_body_part_visible(&self, part: BodyPart, min_visibility: f32) -> bool {
        self.gate
            .borrow()
            .pose
            .as_ref()
            .and_then(|pose| pose.key_points.as_ref())
            .is_some_and(|kp| kp.is_body_part_visible(part, min_visibility))
    }
}

impl<F: EstimatorFactory> Drop for PoseTracker<F> {
    fn drop(&mut self) {
        if self.is_tracking() {
            self.stop_tracking();
        }
    }
}
