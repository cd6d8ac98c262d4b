//! The emscripten-built emulator module, seen through [`CoreModule`].
//!
//! Methods are looked up with `Reflect::get` and invoked with
//! `Function::apply`. The module factory is asynchronous, so the page
//! resolves it and hands the finished module object over; every ROM load
//! rebinds that module to the player's canvas.
//!
//! State saves and loads may answer with a promise; those are awaited
//! through [`JsFuture`].

use gba_frontend::emulator::ready;
use gba_frontend::{
    CaptureError, CoreError, CoreFuture, CoreModule, CoreValue, ModuleFactory, RenderSurface,
};
use js_sys::{Array, ArrayBuffer, Function, Promise, Reflect, Uint8Array};
use log::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlCanvasElement;

/// Best human-readable text for a thrown JS value.
pub(crate) fn describe(err: &JsValue) -> String {
    if let Some(e) = err.dyn_ref::<js_sys::Error>() {
        return String::from(e.message());
    }
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

fn to_js(value: &CoreValue) -> JsValue {
    match value {
        CoreValue::Undefined => JsValue::UNDEFINED,
        CoreValue::Null => JsValue::NULL,
        CoreValue::Bool(b) => JsValue::from_bool(*b),
        CoreValue::Number(n) => JsValue::from_f64(*n),
        CoreValue::String(s) => JsValue::from_str(s),
        CoreValue::Bytes(bytes) => Uint8Array::from(bytes.as_slice()).into(),
    }
}

fn from_js(value: &JsValue) -> CoreValue {
    if value.is_null() {
        return CoreValue::Null;
    }
    if let Some(b) = value.as_bool() {
        return CoreValue::Bool(b);
    }
    if let Some(n) = value.as_f64() {
        return CoreValue::Number(n);
    }
    if let Some(s) = value.as_string() {
        return CoreValue::String(s);
    }
    if let Some(array) = value.dyn_ref::<Uint8Array>() {
        return CoreValue::Bytes(array.to_vec());
    }
    if let Some(buffer) = value.dyn_ref::<ArrayBuffer>() {
        return CoreValue::Bytes(Uint8Array::new(buffer).to_vec());
    }
    CoreValue::Undefined
}

fn get(target: &JsValue, name: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

fn function(target: &JsValue, name: &str) -> Option<Function> {
    get(target, name).and_then(|v| v.dyn_into::<Function>().ok())
}

/// A live module object.
pub struct JsModule {
    module: JsValue,
}

impl JsModule {
    fn apply(&self, name: &str, args: &[CoreValue]) -> Result<JsValue, CoreError> {
        let f = function(&self.module, name)
            .ok_or_else(|| CoreError::call(name, "not a function"))?;
        let js_args: Array = args.iter().map(to_js).collect();
        f.apply(&self.module, &js_args)
            .map_err(|e| CoreError::call(name, describe(&e)))
    }

    fn fs_call(&self, op: &str, args: &Array) -> Result<(), CoreError> {
        let fs = get(&self.module, "FS").ok_or(CoreError::Unsupported("FS"))?;
        let f = function(&fs, op).ok_or_else(|| CoreError::call(op, "not a function"))?;
        f.apply(&fs, args)
            .map(drop)
            .map_err(|e| CoreError::call(op, describe(&e)))
    }
}

impl CoreModule for JsModule {
    fn has_method(&self, name: &str) -> bool {
        function(&self.module, name).is_some()
    }

    fn call(&mut self, name: &str, args: &[CoreValue]) -> Result<CoreValue, CoreError> {
        let result = self.apply(name, args)?;
        if result.is_instance_of::<Promise>() {
            debug!("{name} answered with a promise; not awaited");
        }
        Ok(from_js(&result))
    }

    fn call_deferred(&mut self, name: &str, args: Vec<CoreValue>) -> CoreFuture<CoreValue> {
        let result = match self.apply(name, &args) {
            Ok(result) => result,
            Err(e) => return ready(Err(e)),
        };
        let promise = match result.dyn_into::<Promise>() {
            Ok(promise) => promise,
            Err(value) => return ready(Ok(from_js(&value))),
        };
        let name = name.to_string();
        Box::pin(async move {
            JsFuture::from(promise)
                .await
                .map(|value| from_js(&value))
                .map_err(|e| CoreError::call(&name, describe(&e)))
        })
    }

    fn make_dir(&mut self, path: &str) -> Result<(), CoreError> {
        self.fs_call("mkdir", &Array::of1(&JsValue::from_str(path)))
    }

    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), CoreError> {
        let data: JsValue = Uint8Array::from(bytes).into();
        self.fs_call("writeFile", &Array::of2(&JsValue::from_str(path), &data))
    }
}

/// Hands out the page-provided module, bound to the canvas.
pub struct JsModuleFactory {
    module: JsValue,
}

impl JsModuleFactory {
    #[must_use]
    pub fn new(module: JsValue) -> Self {
        Self { module }
    }
}

impl ModuleFactory for JsModuleFactory {
    type Surface = HtmlCanvasElement;
    type Module = JsModule;

    fn instantiate(&mut self, surface: &HtmlCanvasElement) -> Result<JsModule, CoreError> {
        if !self.module.is_object() {
            return Err(CoreError::Init("emulator module is not an object".to_string()));
        }
        let key = JsValue::from_str("canvas");
        if let Err(e) = Reflect::set(&self.module, &key, surface.as_ref()) {
            warn!("Could not bind canvas to module: {}", describe(&e));
        }
        Ok(JsModule {
            module: self.module.clone(),
        })
    }
}

/// The player's canvas as a screenshot/fullscreen target.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
}

impl CanvasSurface {
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self { canvas }
    }

    #[must_use]
    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

impl RenderSurface for CanvasSurface {
    fn to_png_data_url(&self) -> Result<String, CaptureError> {
        self.canvas
            .to_data_url_with_type("image/png")
            .map_err(|e| CaptureError::Surface(describe(&e)))
    }

    fn request_fullscreen(&self) {
        if let Err(e) = self.canvas.request_fullscreen() {
            warn!("Fullscreen request refused: {}", describe(&e));
        }
    }
}
