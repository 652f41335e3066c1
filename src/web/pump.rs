//! `requestAnimationFrame` loop

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

type FrameCallback = Closure<dyn FnMut(f64)>;

fn request_frame(callback: &FrameCallback) -> Result<i32, JsValue> {
    web_sys::window()
        .ok_or_else(|| JsValue::from_str("No window"))?
        .request_animation_frame(callback.as_ref().unchecked_ref())
}

/// Calls `on_frame` with the frame timestamp once per display refresh until
/// stopped or dropped
pub struct FramePump {
    handle: Rc<Cell<Option<i32>>>,
    callback: Rc<RefCell<Option<FrameCallback>>>,
}

impl FramePump {
    pub fn start<F>(mut on_frame: F) -> Result<Self, JsValue>
    where
        F: FnMut(f64) + 'static,
    {
        let handle = Rc::new(Cell::new(None));
        let callback: Rc<RefCell<Option<FrameCallback>>> = Rc::new(RefCell::new(None));

        let next = Rc::clone(&handle);
        let slot = Rc::clone(&callback);
        *callback.borrow_mut() = Some(Closure::new(move |now: f64| {
            on_frame(now);
            // Cleared handle means the pump was stopped
            if next.get().is_none() {
                return;
            }
            if let Some(cb) = slot.borrow().as_ref() {
                match request_frame(cb) {
                    Ok(id) => next.set(Some(id)),
                    Err(e) => {
                        log::error!("Frame pump stopped: {:?}", e);
                        next.set(None);
                    }
                }
            }
        }));

        let id = match callback.borrow().as_ref() {
            Some(cb) => request_frame(cb)?,
            None => return Err(JsValue::from_str("Frame callback missing")),
        };
        handle.set(Some(id));

        Ok(Self { handle, callback })
    }

    pub fn is_running(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn stop(&self) {
        if let Some(id) = self.handle.take() {
            if let Some(window) = web_sys::window() {
                if let Err(e) = window.cancel_animation_frame(id) {
                    log::warn!("Failed to cancel animation frame: {:?}", e);
                }
            }
        }
        // Breaks the closure's reference to itself
        self.callback.borrow_mut().take();
    }
}

impl Drop for FramePump {
    fn drop(&mut self) {
        self.stop();
    }
}
