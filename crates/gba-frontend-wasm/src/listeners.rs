//! DOM listener and animation-frame handles that unregister on drop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Event, EventTarget, Window};

use crate::module::describe;

/// An event listener, removed when dropped.
pub struct Listener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    /// # Errors
    ///
    /// The browser refused the registration.
    pub fn new(
        target: &EventTarget,
        event: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<Self, wasm_bindgen::JsValue> {
        let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            event,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(e) = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref())
        {
            warn!("Could not remove {} listener: {}", self.event, describe(&e));
        }
    }
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// A `requestAnimationFrame` loop, cancelled when dropped.
pub struct FrameLoop {
    window: Window,
    handle: Rc<Cell<i32>>,
    callback: FrameCallback,
}

impl FrameLoop {
    /// Call `tick` once per animation frame until dropped.
    ///
    /// # Errors
    ///
    /// The first frame request failed.
    pub fn start(
        window: &Window,
        mut tick: impl FnMut() + 'static,
    ) -> Result<Self, wasm_bindgen::JsValue> {
        let callback: FrameCallback = Rc::new(RefCell::new(None));
        let handle = Rc::new(Cell::new(0));

        let next = Rc::clone(&callback);
        let next_handle = Rc::clone(&handle);
        let next_window = window.clone();
        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            tick();
            if let Some(f) = next.borrow().as_ref() {
                match next_window.request_animation_frame(f.as_ref().unchecked_ref()) {
                    Ok(id) => next_handle.set(id),
                    Err(e) => warn!("Animation frame request failed: {}", describe(&e)),
                }
            }
        }) as Box<dyn FnMut()>));

        let first = match callback.borrow().as_ref() {
            Some(f) => window.request_animation_frame(f.as_ref().unchecked_ref())?,
            None => 0,
        };
        handle.set(first);

        Ok(Self {
            window: window.clone(),
            handle,
            callback,
        })
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        if let Err(e) = self.window.cancel_animation_frame(self.handle.get()) {
            warn!("Could not cancel animation frame: {}", describe(&e));
        }
        // Breaks the closure's reference to itself.
        self.callback.borrow_mut().take();
    }
}
