//! Browser runtime: estimator and video bindings, the frame pump and the
//! exported tracking API

mod bindings;
mod estimator;
mod pump;

pub use bindings::*;
pub use estimator::{
    describe, landmarks_from_js, parse_results, FrameExchange, JsEstimatorFactory,
    JsPoseEstimator,
};
pub use pump::FramePump;
