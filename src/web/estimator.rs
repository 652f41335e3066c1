//! Browser bindings for the external pose estimator and the video element

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlVideoElement;

use crate::config::EstimatorConfig;
use crate::error::{Result, TrackingError};
use crate::landmark::Landmark;
use crate::session::{EstimatorFactory, FrameTicket, PoseEstimator, RawPoseResults, VideoSource};

/// `HTMLMediaElement.HAVE_CURRENT_DATA`
const HAVE_CURRENT_DATA: u16 = 2;

#[wasm_bindgen]
extern "C" {
    /// Estimator object built by the host's factory function
    pub type JsPose;

    #[wasm_bindgen(method, catch, js_name = setOptions)]
    fn set_options(this: &JsPose, options: &JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(method, js_name = onResults)]
    fn on_results(this: &JsPose, callback: &Function);

    #[wasm_bindgen(method, catch)]
    fn send(this: &JsPose, input: &JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn close(this: &JsPose) -> std::result::Result<JsValue, JsValue>;
}

impl VideoSource for HtmlVideoElement {
    fn has_frame(&self) -> bool {
        self.ready_state() >= HAVE_CURRENT_DATA
    }
}

/// Hand-off between the estimator callbacks and the frame pump.
///
/// `send` leaves its promise here and `onResults` leaves the raw results; the
/// pump collects both once the promise settles.
#[derive(Clone, Default)]
pub struct FrameExchange {
    results: Rc<RefCell<Option<JsValue>>>,
    pending: Rc<RefCell<Option<Promise>>>,
}

impl FrameExchange {
    pub fn take_results(&self) -> Option<JsValue> {
        self.results.borrow_mut().take()
    }

    pub fn take_pending(&self) -> Option<Promise> {
        self.pending.borrow_mut().take()
    }
}

pub struct JsPoseEstimator {
    pose: JsPose,
    exchange: FrameExchange,
    _on_results: Closure<dyn FnMut(JsValue)>,
}

impl PoseEstimator for JsPoseEstimator {
    type Source = HtmlVideoElement;

    fn send(&mut self, source: &HtmlVideoElement, ticket: FrameTicket) -> Result<()> {
        let input = Object::new();
        Reflect::set(&input, &JsValue::from_str("image"), source)
            .map_err(|e| TrackingError::EstimatorSend(describe(&e)))?;

        let returned = self
            .pose
            .send(&input)
            .map_err(|e| TrackingError::EstimatorSend(describe(&e)))?;
        log::trace!("Frame {} sent to estimator", ticket.sequence);

        // Non-promise returns settle immediately
        *self.exchange.pending.borrow_mut() = Some(Promise::resolve(&returned));
        Ok(())
    }

    fn close(&mut self) {
        if let Err(e) = self.pose.close() {
            log::warn!("Failed to close pose estimator: {}", describe(&e));
        }
    }
}

/// Builds [`JsPoseEstimator`]s by calling a JS factory function
pub struct JsEstimatorFactory {
    create: Function,
    exchange: FrameExchange,
}

impl JsEstimatorFactory {
    pub fn new(create: Function, exchange: FrameExchange) -> Self {
        Self { create, exchange }
    }
}

impl EstimatorFactory for JsEstimatorFactory {
    type Estimator = JsPoseEstimator;

    fn create(&mut self, config: &EstimatorConfig) -> Result<JsPoseEstimator> {
        let value = self
            .create
            .call0(&JsValue::NULL)
            .map_err(|e| TrackingError::EstimatorInit(describe(&e)))?;
        if value.is_null() || value.is_undefined() {
            return Err(TrackingError::EstimatorInit(
                "estimator factory returned nothing".to_string(),
            ));
        }
        let pose: JsPose = value.unchecked_into();

        let options = serde_wasm_bindgen::to_value(config)
            .map_err(|e| TrackingError::EstimatorInit(e.to_string()))?;
        pose.set_options(&options)
            .map_err(|e| TrackingError::EstimatorInit(describe(&e)))?;

        let slot = Rc::clone(&self.exchange.results);
        let on_results = Closure::<dyn FnMut(JsValue)>::new(move |results: JsValue| {
            *slot.borrow_mut() = Some(results);
        });
        pose.on_results(on_results.as_ref().unchecked_ref());

        Ok(JsPoseEstimator {
            pose,
            exchange: self.exchange.clone(),
            _on_results: on_results,
        })
    }
}

/// Read `{poseLandmarks?, poseWorldLandmarks?}` from an estimator result.
///
/// Other fields (e.g. the segmentation image) are ignored.
pub fn parse_results(results: &JsValue) -> RawPoseResults {
    RawPoseResults {
        pose_landmarks: read_landmarks(results, "poseLandmarks"),
        pose_world_landmarks: read_landmarks(results, "poseWorldLandmarks"),
    }
}

fn read_landmarks(results: &JsValue, key: &str) -> Option<Vec<Landmark>> {
    let field = Reflect::get(results, &JsValue::from_str(key)).ok()?;
    landmarks_from_js(field)
}

/// Deserialize a landmark array; `None` for null, undefined or malformed input
pub fn landmarks_from_js(value: JsValue) -> Option<Vec<Landmark>> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    match serde_wasm_bindgen::from_value(value) {
        Ok(landmarks) => Some(landmarks),
        Err(e) => {
            log::warn!("Ignoring malformed landmarks: {}", e);
            None
        }
    }
}

pub fn describe(error: &JsValue) -> String {
    error.as_string().unwrap_or_else(|| format!("{:?}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn json(text: &str) -> JsValue {
        js_sys::JSON::parse(text).unwrap()
    }

    #[wasm_bindgen_test]
    fn test_parse_results() {
        let raw = parse_results(&json(
            r#"{"poseLandmarks": [{"x": 0.5, "y": 0.25, "z": 0.0, "visibility": 0.9}], "image": {}}"#,
        ));
        let landmarks = raw.pose_landmarks.unwrap();
        assert_eq!(landmarks, vec![Landmark::new(0.5, 0.25, 0.0, 0.9)]);
        assert!(raw.pose_world_landmarks.is_none());
    }

    #[wasm_bindgen_test]
    fn test_parse_empty_and_malformed() {
        assert_eq!(parse_results(&json("{}")), RawPoseResults::empty());
        assert_eq!(
            parse_results(&json(r#"{"poseLandmarks": "nope"}"#)),
            RawPoseResults::empty()
        );
    }

    #[wasm_bindgen_test]
    fn test_fresh_video_has_no_frame() {
        let document = web_sys::window().unwrap().document().unwrap();
        let video: HtmlVideoElement = document.create_element("video").unwrap().dyn_into().unwrap();
        assert!(!video.has_frame());
    }
}
