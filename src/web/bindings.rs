//! Exported tracking API.
//!
//! Thin wrappers over [`crate::state`]: each function borrows the global
//! `AppState`, calls into the core and converts the result for JS.

use std::cell::RefCell;

use js_sys::Function;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::HtmlVideoElement;

use super::estimator::{describe, landmarks_from_js, parse_results, FrameExchange, JsEstimatorFactory};
use super::pump::FramePump;
use crate::config::{QualityPreset, TrackingConfig};
use crate::error::TrackingError;
use crate::keypoints::{extract_key_points, BodyPart};
use crate::measurements::compute_measurements;
use crate::placement::{get_placement, GarmentCategory};
use crate::scene::{key_light_position, GarmentEntry, SceneTransform};
use crate::session::{FrameOutcome, FrameTicket, PoseSnapshot, SubscriptionId};
use crate::state::{
    destroy_app_state, initialize_app_state, with_app_state, with_app_state_mut, AppState,
};

/// Browser-only pieces that live next to the AppState
struct WebRuntime {
    exchange: FrameExchange,
    pump: Option<FramePump>,
    render_scene: Option<Function>,
    on_error: Option<Function>,
}

thread_local! {
    static RUNTIME: RefCell<Option<WebRuntime>> = const { RefCell::new(None) };
}

fn to_js<T: Serialize>(value: Option<&T>) -> JsValue {
    match value.map(serde_wasm_bindgen::to_value) {
        Some(Ok(js)) => js,
        Some(Err(e)) => {
            log::error!("Failed to serialize value: {}", e);
            JsValue::NULL
        }
        None => JsValue::NULL,
    }
}

fn call_js(callback: &Function, args: &[&JsValue]) -> Result<(), JsValue> {
    let this = JsValue::NULL;
    let result = match args {
        [] => callback.call0(&this),
        [a] => callback.call1(&this, a),
        [a, b] => callback.call2(&this, a, b),
        _ => Err(JsValue::from_str("Unsupported callback arity")),
    };
    result.map(|_| ())
}

fn snapshot_callback(callback: Function) -> impl Fn(&PoseSnapshot) + 'static {
    move |snapshot| {
        if let Err(e) = call_js(&callback, &[&to_js(Some(snapshot))]) {
            log::error!("Pose callback threw: {}", describe(&e));
        }
    }
}

/// Create the tracking state.
///
/// `config` is a partial `TrackingConfig` object (or null for defaults).
/// `create_estimator` is a zero-argument JS function returning an object with
/// `setOptions`, `onResults`, `send` and `close`.
#[wasm_bindgen]
pub fn init_tracking(config: JsValue, create_estimator: Function) -> Result<(), JsValue> {
    crate::init_logging();

    let config: TrackingConfig = if config.is_null() || config.is_undefined() {
        TrackingConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse config: {}", e)))?
    };
    start_runtime(config, create_estimator)
}

/// Create the tracking state from a quality preset name: low, medium or high
#[wasm_bindgen]
pub fn init_tracking_with_preset(preset: &str, create_estimator: Function) -> Result<(), JsValue> {
    crate::init_logging();

    let preset: QualityPreset = serde_json::from_value(serde_json::Value::from(preset))
        .map_err(|_| JsValue::from_str(&format!("Unknown quality preset: {}", preset)))?;
    start_runtime(TrackingConfig::from_preset(preset), create_estimator)
}

fn start_runtime(config: TrackingConfig, create_estimator: Function) -> Result<(), JsValue> {
    // Tear down any previous instance first so its estimator is closed
    destroy_tracking();

    let exchange = FrameExchange::default();
    let factory = JsEstimatorFactory::new(create_estimator, exchange.clone());
    let app = AppState::new(config, factory).map_err(|e| JsValue::from_str(&e.to_string()))?;
    initialize_app_state(app);

    RUNTIME.with(|runtime| {
        *runtime.borrow_mut() = Some(WebRuntime {
            exchange,
            pump: None,
            render_scene: None,
            on_error: None,
        });
    });
    log::info!("Pose tracking ready");
    Ok(())
}

/// Pass queued session errors to the `on_tracking_error` callback.
///
/// Runs once the state borrow is released, so the callback may call back into
/// the API (e.g. to retry `start_tracking`).
fn deliver_errors() {
    let errors = with_app_state_mut(|app| app.take_errors()).unwrap_or_default();
    if errors.is_empty() {
        return;
    }
    let callback = RUNTIME.with(|runtime| {
        runtime
            .borrow()
            .as_ref()
            .and_then(|runtime| runtime.on_error.clone())
    });
    let Some(callback) = callback else {
        return;
    };
    for error in errors {
        if let Err(e) = call_js(&callback, &[&JsValue::from_str(&error.to_string())]) {
            log::error!("Error callback threw: {}", describe(&e));
        }
    }
}

/// Construct the estimator ahead of tracking
#[wasm_bindgen]
pub fn initialize_estimator() -> Result<(), JsValue> {
    let result = with_app_state_mut(|app| app.tracker.session_mut().initialize());
    deliver_errors();
    result
        .ok_or_else(|| JsValue::from_str("Tracking not initialized"))?
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Start tracking a video element. Returns false on failure; the error is
/// passed to the `on_tracking_error` callback.
#[wasm_bindgen]
pub fn start_tracking(video: Option<HtmlVideoElement>) -> bool {
    let started = with_app_state_mut(|app| app.tracker.start_tracking(video)).unwrap_or(false);
    if !started {
        deliver_errors();
        return false;
    }

    let pumped = RUNTIME.with(|runtime| {
        let mut runtime = runtime.borrow_mut();
        let Some(runtime) = runtime.as_mut() else {
            return Err(JsValue::from_str("Tracking runtime missing"));
        };
        if runtime.pump.as_ref().is_some_and(FramePump::is_running) {
            return Ok(());
        }

        let exchange = runtime.exchange.clone();
        let pump = FramePump::start(move |now| pump_once(&exchange, now))?;
        runtime.pump = Some(pump);
        Ok(())
    });

    // Reported after RUNTIME is released; the error callback may call back in
    match pumped {
        Ok(()) => true,
        Err(e) => {
            let error = TrackingError::Camera(describe(&e));
            with_app_state_mut(|app| {
                app.tracker.session_mut().report_error(error);
                app.stop_tracking();
            });
            deliver_errors();
            false
        }
    }
}

#[wasm_bindgen]
pub fn stop_tracking() {
    RUNTIME.with(|runtime| {
        if let Some(runtime) = runtime.borrow_mut().as_mut() {
            if let Some(pump) = runtime.pump.take() {
                pump.stop();
            }
        }
    });
    with_app_state_mut(|app| app.stop_tracking());
}

/// Stop tracking and release the estimator
#[wasm_bindgen]
pub fn destroy_tracking() {
    stop_tracking();
    RUNTIME.with(|runtime| runtime.borrow_mut().take());
    if destroy_app_state() {
        log::info!("Pose tracking destroyed");
    }
}

fn pump_once(exchange: &FrameExchange, now: f64) {
    let outcome = with_app_state_mut(|app| app.pump_frame(now));
    let Some(FrameOutcome::Sent(ticket)) = outcome else {
        // A rejected send is reported from inside pump_frame
        deliver_errors();
        return;
    };
    match exchange.take_pending() {
        Some(promise) => spawn_local(complete_frame(exchange.clone(), ticket, promise)),
        None => {
            with_app_state_mut(|app| app.finish_frame(ticket));
        }
    }
}

async fn complete_frame(exchange: FrameExchange, ticket: FrameTicket, promise: js_sys::Promise) {
    let failure = JsFuture::from(promise).await.err();
    let raw = exchange.take_results().map(|value| parse_results(&value));

    let delivery = with_app_state_mut(|app| {
        if let Some(e) = failure {
            app.tracker
                .session_mut()
                .report_error(TrackingError::EstimatorSend(describe(&e)));
        }
        let delivery = raw.and_then(|raw| app.receive_results(ticket, raw));
        app.finish_frame(ticket);
        delivery
    })
    .flatten();
    deliver_errors();

    // Delivered outside the state borrow so JS callbacks can query it
    if let Some(delivery) = delivery {
        render(&delivery.transforms);
        delivery.dispatch();
    }
}

fn render(transforms: &[(String, SceneTransform)]) {
    let Some(callback) = RUNTIME.with(|runtime| {
        runtime
            .borrow()
            .as_ref()
            .and_then(|runtime| runtime.render_scene.clone())
    }) else {
        return;
    };
    for (id, transform) in transforms {
        if let Err(e) = call_js(&callback, &[&JsValue::from_str(id), &to_js(Some(transform))]) {
            log::error!("Render scene rejected transform for {}: {}", id, describe(&e));
        }
    }
}

/// Register `(garmentId, {position, rotation, scale})` as the render scene
#[wasm_bindgen]
pub fn set_render_scene(callback: Option<Function>) {
    RUNTIME.with(|runtime| {
        if let Some(runtime) = runtime.borrow_mut().as_mut() {
            runtime.render_scene = callback;
        }
    });
}

/// Subscribe to every pose snapshot. Returns the subscription id.
#[wasm_bindgen]
pub fn subscribe_pose(callback: Function) -> Option<u32> {
    with_app_state(|app| {
        let subscription = app.tracker.session().subscribe(move |snapshot| {
            call_js(&callback, &[&to_js(Some(&**snapshot))])
                .map_err(|e| TrackingError::Subscriber(describe(&e)))
        });
        subscription.id().0
    })
}

#[wasm_bindgen]
pub fn unsubscribe_pose(id: u32) -> bool {
    with_app_state(|app| app.tracker.session().subscribers().unsubscribe(SubscriptionId(id)))
        .unwrap_or(false)
}

#[wasm_bindgen]
pub fn on_pose_detected(callback: Function) {
    with_app_state_mut(|app| app.tracker.on_pose_detected(snapshot_callback(callback)));
}

#[wasm_bindgen]
pub fn on_pose_lost(callback: Function) {
    with_app_state_mut(|app| app.tracker.on_pose_lost(snapshot_callback(callback)));
}

/// Receives error messages as strings, after the failing call has released
/// the tracking state
#[wasm_bindgen]
pub fn on_tracking_error(callback: Option<Function>) {
    RUNTIME.with(|runtime| {
        if let Some(runtime) = runtime.borrow_mut().as_mut() {
            runtime.on_error = callback;
        }
    });
}

#[wasm_bindgen]
pub fn is_tracking() -> bool {
    with_app_state(|app| app.tracker.is_tracking()).unwrap_or(false)
}

#[wasm_bindgen]
pub fn is_pose_detected() -> bool {
    with_app_state(|app| app.tracker.is_pose_detected()).unwrap_or(false)
}

#[wasm_bindgen]
pub fn get_pose_confidence() -> f32 {
    with_app_state(|app| app.tracker.pose_confidence()).unwrap_or(0.0)
}

/// Current pose snapshot, or null
#[wasm_bindgen]
pub fn get_pose() -> JsValue {
    with_app_state(|app| to_js(app.tracker.pose().as_deref())).unwrap_or(JsValue::NULL)
}

#[wasm_bindgen]
pub fn get_body_measurements() -> JsValue {
    with_app_state(|app| to_js(app.tracker.body_measurements().as_ref())).unwrap_or(JsValue::NULL)
}

#[wasm_bindgen]
pub fn get_averaged_measurements() -> JsValue {
    with_app_state(|app| to_js(app.tracker.averaged_measurements().as_ref()))
        .unwrap_or(JsValue::NULL)
}

#[wasm_bindgen]
pub fn get_clothing_placement(category: &str) -> JsValue {
    let category = GarmentCategory::parse(category);
    with_app_state(|app| to_js(app.tracker.clothing_placement(category).as_ref()))
        .unwrap_or(JsValue::NULL)
}

/// `[x, y, z]` of the pose-following key light, or undefined without a pose
#[wasm_bindgen]
pub fn get_key_light_position(category: &str) -> Option<Vec<f32>> {
    let category = GarmentCategory::parse(category);
    with_app_state(|app| app.tracker.clothing_placement(category))
        .flatten()
        .map(|placement| key_light_position(&placement).to_array().to_vec())
}

/// `part` is one of shoulders, hips, arms, legs
#[wasm_bindgen]
pub fn is_body_part_visible(part: &str, min_visibility: f32) -> bool {
    let Some(part) = BodyPart::parse(part) else {
        log::warn!("Unknown body part: {}", part);
        return false;
    };
    with_app_state(|app| app.tracker.is_body_part_visible(part, min_visibility)).unwrap_or(false)
}

/// Add a catalog garment to the session; true if it was not already worn
#[wasm_bindgen]
pub fn add_garment(entry: JsValue) -> Result<bool, JsValue> {
    let entry: GarmentEntry = serde_wasm_bindgen::from_value(entry)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse garment: {}", e)))?;
    with_app_state_mut(|app| app.rig.add(entry))
        .ok_or_else(|| JsValue::from_str("Tracking not initialized"))
}

#[wasm_bindgen]
pub fn remove_garment(id: &str) -> bool {
    with_app_state_mut(|app| app.rig.remove(id).is_some()).unwrap_or(false)
}

#[wasm_bindgen]
pub fn set_garment_visible(id: &str, visible: bool) -> bool {
    with_app_state_mut(|app| app.rig.set_visible(id, visible)).unwrap_or(false)
}

#[wasm_bindgen]
pub fn get_garments() -> JsValue {
    with_app_state(|app| {
        let garments: Vec<&GarmentEntry> = app.rig.garments().collect();
        to_js(Some(&garments))
    })
    .unwrap_or(JsValue::NULL)
}

/// Stateless: body measurements for a landmark array, or null
#[wasm_bindgen]
pub fn measure_landmarks(landmarks: JsValue) -> JsValue {
    let measurements = landmarks_from_js(landmarks).and_then(|lms| compute_measurements(&lms));
    to_js(measurements.as_ref())
}

/// Stateless: placement for a landmark array and garment category, or null
#[wasm_bindgen]
pub fn place_garment(landmarks: JsValue, category: &str) -> JsValue {
    let key_points = landmarks_from_js(landmarks).and_then(|lms| extract_key_points(&lms));
    let placement = get_placement(key_points.as_ref(), GarmentCategory::parse(category));
    to_js(placement.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn noop_estimator() -> Function {
        Function::new_no_args(
            "return { setOptions() {}, onResults() {}, send() { return Promise.resolve(); }, close() {} };",
        )
    }

    #[wasm_bindgen_test]
    fn test_lifecycle_without_video() {
        init_tracking(JsValue::NULL, noop_estimator()).unwrap();
        assert!(!is_tracking());
        assert!(!start_tracking(None));
        assert!(get_pose().is_null());
        destroy_tracking();
    }

    #[wasm_bindgen_test]
    fn test_error_callback_runs_after_state_release() {
        init_tracking(JsValue::NULL, noop_estimator()).unwrap();

        let seen: Rc<RefCell<Vec<(String, bool)>>> = Rc::default();
        let log = Rc::clone(&seen);
        let callback = Closure::<dyn FnMut(JsValue)>::new(move |message: JsValue| {
            // Retry from inside the callback must reach the state
            let reachable = with_app_state(|_| ()).is_some();
            log.borrow_mut()
                .push((message.as_string().unwrap_or_default(), reachable));
        });
        on_tracking_error(Some(callback.as_ref().unchecked_ref::<Function>().clone()));

        assert!(!start_tracking(None));
        assert_eq!(
            *seen.borrow(),
            vec![("Video element is required for pose tracking".to_string(), true)]
        );
        destroy_tracking();
    }

    #[wasm_bindgen_test]
    fn test_rejects_bad_config() {
        let config = js_sys::JSON::parse(r#"{"minConfidence": 3}"#).unwrap();
        assert!(init_tracking(config, noop_estimator()).is_err());
        assert!(init_tracking_with_preset("ultra", noop_estimator()).is_err());
        assert!(init_tracking_with_preset("high", noop_estimator()).is_ok());
        destroy_tracking();
    }

    #[wasm_bindgen_test]
    fn test_garments_and_estimator_init() {
        init_tracking(JsValue::NULL, noop_estimator()).unwrap();
        initialize_estimator().unwrap();
        let entry = js_sys::JSON::parse(r#"{"id": "tee", "category": "shirt"}"#).unwrap();
        assert!(add_garment(entry).unwrap());
        assert!(set_garment_visible("tee", false));
        assert!(remove_garment("tee"));
        destroy_tracking();
    }

    #[wasm_bindgen_test]
    fn test_stateless_measurements() {
        assert!(measure_landmarks(JsValue::NULL).is_null());
        let short = js_sys::JSON::parse(r#"[{"x": 0.1, "y": 0.2}]"#).unwrap();
        assert!(measure_landmarks(short.clone()).is_null());
        assert!(place_garment(short, "shirt").is_null());
    }
}
