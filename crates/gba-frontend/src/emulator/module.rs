//! Capability-detecting adapter over a dynamically typed emulator module.
//!
//! Builds of the external core disagree on method names for the same
//! operation. Every semantic action therefore carries an ordered list of
//! candidate names; the first one the module actually exposes is invoked,
//! and a missing method is a silent no-op rather than a failure.

use std::fmt;

use log::{debug, error, info, warn};

use super::{CoreFuture, EmulatorStatus, GbaCore, SaveSlot, SavedState, TurboRate, ready};
use crate::button::GbaButton;
use crate::error::CoreError;

/// A dynamically-typed argument or return value of a module call.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl CoreValue {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for CoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for CoreValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for CoreValue {
    fn from(v: u8) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<f64> for CoreValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for CoreValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for CoreValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&[u8]> for CoreValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<SaveSlot> for CoreValue {
    fn from(slot: SaveSlot) -> Self {
        Self::from(slot.get())
    }
}

/// A live emulator module exposing methods by name.
pub trait CoreModule {
    fn has_method(&self, name: &str) -> bool;

    /// Invoke `name` with `args`.
    ///
    /// # Errors
    ///
    /// [`CoreError::Call`] when the method throws.
    fn call(&mut self, name: &str, args: &[CoreValue]) -> Result<CoreValue, CoreError>;

    /// Invoke `name`, letting the module answer later.
    ///
    /// Used for state saves and loads, which some builds expose as
    /// asynchronous. The default settles immediately with [`call`](Self::call).
    fn call_deferred(&mut self, name: &str, args: Vec<CoreValue>) -> CoreFuture<CoreValue> {
        ready(self.call(name, &args))
    }

    /// Create a directory in the module's virtual filesystem.
    ///
    /// # Errors
    ///
    /// Fails when the directory exists or the filesystem is unavailable.
    fn make_dir(&mut self, path: &str) -> Result<(), CoreError>;

    /// Write a file into the module's virtual filesystem.
    ///
    /// # Errors
    ///
    /// Fails when the filesystem is unavailable.
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), CoreError>;
}

/// Creates a module bound to a rendering surface.
pub trait ModuleFactory {
    type Surface;
    type Module: CoreModule;

    /// # Errors
    ///
    /// Whatever the module reports while starting up.
    fn instantiate(&mut self, surface: &Self::Surface) -> Result<Self::Module, CoreError>;
}

const ROM_DIR: &str = "/roms";
const DEFAULT_ROM_NAME: &str = "game.gba";

const FS_INIT: &str = "FSInit";
const FS_SYNC: &str = "FSSync";
const LOAD_GAME: &str = "loadGame";

const START: &[&str] = &["resumeGame"];
const PAUSE: &[&str] = &["pauseGame"];
const RESET: &[&str] = &["quickReload"];
const AUDIO_ON: &[&str] = &["resumeAudio"];
const AUDIO_OFF: &[&str] = &["pauseAudio"];
const PRESS: &[&str] = &["buttonPress"];
const RELEASE: &[&str] = &["buttonUnpress"];

const SET_TURBO: &[&str] = &[
    "setTurbo",
    "setSpeedMultiplier",
    "setFastForward",
    "setFastForwardMultiplier",
    "setThrottle",
];
const GET_TURBO: &[&str] = &["getTurbo", "getSpeedMultiplier"];

const SAVE_BYTES: &[&str] = &["saveStateBytes", "getSaveState"];
const LOAD_BYTES: &[&str] = &["loadStateBytes", "setSaveState"];
const SAVE_INTERNAL: &[&str] = &["saveState"];
const LOAD_INTERNAL: &[&str] = &["loadState"];

fn first_method<M: CoreModule>(module: &M, names: &[&'static str]) -> Option<&'static str> {
    names.iter().copied().find(|name| module.has_method(name))
}

/// [`GbaCore`] implementation over a [`CoreModule`].
///
/// The module is created on the first ROM load. Audio and turbo preferences
/// are remembered here and re-applied after every lifecycle call, since the
/// module may reset them internally.
pub struct ModuleCore<F: ModuleFactory> {
    factory: F,
    surface: Option<F::Surface>,
    module: Option<F::Module>,
    status: EmulatorStatus,
    audio_enabled: bool,
    turbo: TurboRate,
    /// Last answer from the module's speed getter.
    reported_turbo: Option<TurboRate>,
    turbo_warned: bool,
}

impl<F: ModuleFactory> ModuleCore<F> {
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            surface: None,
            module: None,
            status: EmulatorStatus::Idle,
            audio_enabled: true,
            turbo: TurboRate::X1,
            reported_turbo: None,
            turbo_warned: false,
        }
    }

    #[must_use]
    pub fn module(&self) -> Option<&F::Module> {
        self.module.as_ref()
    }

    #[must_use]
    pub fn surface(&self) -> Option<&F::Surface> {
        self.surface.as_ref()
    }

    /// Call the first available method from `names`.
    ///
    /// `None` when the module is absent or exposes none of them.
    fn invoke_first(
        &mut self,
        names: &[&'static str],
        args: &[CoreValue],
    ) -> Option<Result<CoreValue, CoreError>> {
        let module = self.module.as_mut()?;
        let name = first_method(module, names)?;
        Some(module.call(name, args))
    }

    /// Like [`invoke_first`](Self::invoke_first) for calls whose failure
    /// only gets logged.
    fn invoke_logged(&mut self, names: &[&'static str], args: &[CoreValue]) {
        if let Some(Err(e)) = self.invoke_first(names, args) {
            error!("Core call failed: {e}");
        }
    }

    fn apply_audio(&mut self) {
        if self.audio_enabled && self.status == EmulatorStatus::Running {
            self.invoke_logged(AUDIO_ON, &[]);
        } else {
            self.invoke_logged(AUDIO_OFF, &[]);
        }
    }

    fn apply_turbo(&mut self) {
        let rate = self.turbo;
        match self.invoke_first(SET_TURBO, &[rate.multiplier().into()]) {
            Some(Ok(_)) => {}
            Some(Err(e)) => error!("Core call failed: {e}"),
            None => {
                if self.module.is_some() && rate != TurboRate::X1 && !self.turbo_warned {
                    self.turbo_warned = true;
                    warn!("Turbo {rate} requested but the core exposes no speed control");
                }
            }
        }
        self.reported_turbo = self.read_turbo();
    }

    /// Ask the module for its current speed multiplier.
    ///
    /// `None` when no getter exists or the value is not a supported rate.
    fn read_turbo(&mut self) -> Option<TurboRate> {
        let value = match self.invoke_first(GET_TURBO, &[])? {
            Ok(value) => value.as_f64()?,
            Err(e) => {
                error!("Core call failed: {e}");
                return None;
            }
        };
        if !(1.0..=4.0).contains(&value) || value.fract().abs() > f64::EPSILON {
            debug!("Core reported unsupported speed {value}");
            return None;
        }
        TurboRate::try_from(value as u8).ok()
    }

    fn save_internal(module: &mut F::Module, slot: SaveSlot) -> Result<SavedState, CoreError> {
        let name = first_method(module, SAVE_INTERNAL).ok_or(CoreError::Unsupported("saveState"))?;
        if module.call(name, &[slot.into()])? == CoreValue::Bool(false) {
            return Err(CoreError::call(name, "core refused to save"));
        }
        if module.has_method(FS_SYNC) {
            module.call(FS_SYNC, &[])?;
        }
        Ok(SavedState::Internal)
    }

    fn after_lifecycle(&mut self) {
        self.apply_audio();
        self.apply_turbo();
    }

    fn button(&mut self, names: &[&'static str], button: GbaButton) {
        self.invoke_logged(names, &[button.core_name().into()]);
    }
}

impl<F: ModuleFactory> GbaCore for ModuleCore<F> {
    type Surface = F::Surface;

    fn status(&self) -> EmulatorStatus {
        self.status
    }

    fn attach_surface(&mut self, surface: Self::Surface) {
        self.surface = Some(surface);
    }

    fn load_rom(&mut self, rom: &[u8], file_name: Option<&str>) -> Result<(), CoreError> {
        let surface = self.surface.as_ref().ok_or(CoreError::SurfaceNotAttached)?;
        let mut module = self.factory.instantiate(surface)?;

        if module.has_method(FS_INIT) {
            module.call(FS_INIT, &[])?;
        }
        if let Err(e) = module.make_dir(ROM_DIR) {
            debug!("mkdir {ROM_DIR}: {e}");
        }
        let path = format!("{ROM_DIR}/{}", file_name.unwrap_or(DEFAULT_ROM_NAME));
        module.write_file(&path, rom)?;

        if !module.has_method(LOAD_GAME) {
            return Err(CoreError::Unsupported(LOAD_GAME));
        }
        module.call(LOAD_GAME, &[path.as_str().into(), CoreValue::Null])?;
        info!("Core loaded {path}");

        self.module = Some(module);
        self.status = EmulatorStatus::Running;
        self.after_lifecycle();
        Ok(())
    }

    fn start(&mut self) {
        if self.module.is_none() {
            return;
        }
        self.invoke_logged(START, &[]);
        self.status = EmulatorStatus::Running;
        self.after_lifecycle();
    }

    fn pause(&mut self) {
        if self.module.is_none() {
            return;
        }
        self.invoke_logged(PAUSE, &[]);
        self.status = EmulatorStatus::Paused;
        self.invoke_logged(AUDIO_OFF, &[]);
    }

    fn reset(&mut self) {
        if self.module.is_none() {
            return;
        }
        self.invoke_logged(RESET, &[]);
        self.status = EmulatorStatus::Running;
        self.after_lifecycle();
    }

    fn press(&mut self, button: GbaButton) {
        self.button(PRESS, button);
    }

    fn release(&mut self, button: GbaButton) {
        self.button(RELEASE, button);
    }

    fn save_state(&mut self, slot: SaveSlot) -> CoreFuture<SavedState> {
        let Some(module) = self.module.as_mut() else {
            return ready(Err(CoreError::NotLoaded));
        };

        let Some(name) = first_method(module, SAVE_BYTES) else {
            return ready(Self::save_internal(module, slot));
        };
        let call = module.call_deferred(name, vec![slot.into()]);
        Box::pin(async move {
            match call.await? {
                CoreValue::Bytes(bytes) => Ok(SavedState::Bytes(bytes)),
                other => Err(CoreError::call(
                    name,
                    format!("expected bytes, got {}", other.kind()),
                )),
            }
        })
    }

    fn load_state(&mut self, slot: SaveSlot, bytes: Option<&[u8]>) -> CoreFuture<()> {
        let Some(module) = self.module.as_mut() else {
            return ready(Err(CoreError::NotLoaded));
        };

        let call = match bytes {
            Some(bytes) => match first_method(module, LOAD_BYTES) {
                Some(name) => module.call_deferred(name, vec![slot.into(), bytes.into()]),
                None => return ready(Err(CoreError::Unsupported("loadStateBytes"))),
            },
            None => match first_method(module, LOAD_INTERNAL) {
                Some(name) => ready(module.call(name, &[slot.into()])),
                None => return ready(Err(CoreError::Unsupported("loadState"))),
            },
        };
        Box::pin(async move {
            if call.await? == CoreValue::Bool(false) {
                return Err(CoreError::NoSaveData(slot));
            }
            Ok(())
        })
    }

    fn supports_state_bytes(&self) -> bool {
        self.module.as_ref().is_some_and(|m| {
            first_method(m, SAVE_BYTES).is_some() && first_method(m, LOAD_BYTES).is_some()
        })
    }

    fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio_enabled = enabled;
        self.apply_audio();
    }

    fn set_turbo(&mut self, rate: TurboRate) {
        self.turbo = rate;
        self.apply_turbo();
    }

    fn turbo(&self) -> Option<TurboRate> {
        let module = self.module.as_ref()?;
        self.reported_turbo
            .or_else(|| first_method(module, SET_TURBO).map(|_| self.turbo))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::rc::Rc;

    use pollster::block_on;

    use super::*;

    type CallLog = Rc<RefCell<Vec<String>>>;

    struct FakeModule {
        methods: HashSet<&'static str>,
        returns: HashMap<&'static str, CoreValue>,
        files: Vec<String>,
        log: CallLog,
    }

    impl CoreModule for FakeModule {
        fn has_method(&self, name: &str) -> bool {
            self.methods.contains(name)
        }

        fn call(&mut self, name: &str, args: &[CoreValue]) -> Result<CoreValue, CoreError> {
            let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
            self.log
                .borrow_mut()
                .push(format!("{name}({})", rendered.join(", ")));
            Ok(self.returns.get(name).cloned().unwrap_or(CoreValue::Undefined))
        }

        fn make_dir(&mut self, _path: &str) -> Result<(), CoreError> {
            Err(CoreError::call("mkdir", "exists"))
        }

        fn write_file(&mut self, path: &str, _bytes: &[u8]) -> Result<(), CoreError> {
            self.files.push(path.to_string());
            Ok(())
        }
    }

    struct FakeFactory {
        methods: Vec<&'static str>,
        returns: Vec<(&'static str, CoreValue)>,
        log: CallLog,
    }

    impl ModuleFactory for FakeFactory {
        type Surface = ();
        type Module = FakeModule;

        fn instantiate(&mut self, _surface: &()) -> Result<FakeModule, CoreError> {
            Ok(FakeModule {
                methods: self.methods.iter().copied().collect(),
                returns: self.returns.iter().cloned().collect(),
                files: Vec::new(),
                log: Rc::clone(&self.log),
            })
        }
    }

    const BASIC: &[&str] = &[
        "FSInit",
        "loadGame",
        "resumeGame",
        "pauseGame",
        "quickReload",
        "resumeAudio",
        "pauseAudio",
        "buttonPress",
        "buttonUnpress",
        "saveState",
        "loadState",
        "FSSync",
    ];

    fn core_with(methods: &[&'static str]) -> (ModuleCore<FakeFactory>, CallLog) {
        let log = CallLog::default();
        let mut core = ModuleCore::new(FakeFactory {
            methods: methods.to_vec(),
            returns: Vec::new(),
            log: Rc::clone(&log),
        });
        core.attach_surface(());
        (core, log)
    }

    fn calls(log: &CallLog) -> Vec<String> {
        log.borrow_mut().drain(..).collect()
    }

    #[test]
    fn load_without_surface_fails() {
        let mut core = ModuleCore::new(FakeFactory {
            methods: BASIC.to_vec(),
            returns: Vec::new(),
            log: CallLog::default(),
        });
        assert!(matches!(
            core.load_rom(&[0; 16], None),
            Err(CoreError::SurfaceNotAttached)
        ));
        assert_eq!(core.status(), EmulatorStatus::Idle);
    }

    #[test]
    fn load_writes_rom_and_runs() {
        let (mut core, log) = core_with(BASIC);
        core.load_rom(&[0; 16], Some("zelda.gba")).unwrap();
        assert_eq!(core.status(), EmulatorStatus::Running);
        assert_eq!(
            core.module().unwrap().files,
            ["/roms/zelda.gba".to_string()]
        );
        assert_eq!(
            calls(&log),
            ["FSInit()", "loadGame(\"/roms/zelda.gba\", null)", "resumeAudio()"]
        );
    }

    #[test]
    fn default_rom_name() {
        let (mut core, _log) = core_with(BASIC);
        core.load_rom(&[], None).unwrap();
        assert_eq!(core.module().unwrap().files, ["/roms/game.gba".to_string()]);
    }

    #[test]
    fn missing_load_game_is_unsupported() {
        let (mut core, _log) = core_with(&["FSInit"]);
        assert!(matches!(
            core.load_rom(&[], None),
            Err(CoreError::Unsupported("loadGame"))
        ));
        assert_eq!(core.status(), EmulatorStatus::Idle);
    }

    #[test]
    fn lifecycle_before_load_does_nothing() {
        let (mut core, log) = core_with(BASIC);
        core.start();
        core.pause();
        core.reset();
        core.press(GbaButton::A);
        assert_eq!(core.status(), EmulatorStatus::Idle);
        assert!(calls(&log).is_empty());
        assert!(matches!(
            block_on(core.save_state(SaveSlot::default())),
            Err(CoreError::NotLoaded)
        ));
    }

    #[test]
    fn pause_silences_audio_and_start_restores_it() {
        let (mut core, log) = core_with(BASIC);
        core.load_rom(&[], None).unwrap();
        calls(&log);

        core.pause();
        assert_eq!(core.status(), EmulatorStatus::Paused);
        assert_eq!(calls(&log), ["pauseGame()", "pauseAudio()"]);

        // Enabling audio while paused keeps it silent.
        core.set_audio_enabled(true);
        assert_eq!(calls(&log), ["pauseAudio()"]);

        core.start();
        assert_eq!(calls(&log), ["resumeGame()", "resumeAudio()"]);
    }

    #[test]
    fn disabled_audio_survives_reset() {
        let (mut core, log) = core_with(BASIC);
        core.set_audio_enabled(false);
        core.load_rom(&[], None).unwrap();
        calls(&log);
        core.reset();
        assert_eq!(calls(&log), ["quickReload()", "pauseAudio()"]);
    }

    #[test]
    fn turbo_uses_first_available_name_and_reapplies() {
        let mut methods = BASIC.to_vec();
        methods.push("setFastForward");
        methods.push("setThrottle");
        let (mut core, log) = core_with(&methods);
        core.load_rom(&[], None).unwrap();
        calls(&log);

        core.set_turbo(TurboRate::X4);
        assert_eq!(calls(&log), ["setFastForward(4)"]);

        core.reset();
        assert_eq!(
            calls(&log),
            ["quickReload()", "resumeAudio()", "setFastForward(4)"]
        );
    }

    #[test]
    fn missing_turbo_warns_once_and_is_a_noop() {
        let (mut core, log) = core_with(BASIC);
        core.load_rom(&[], None).unwrap();
        calls(&log);
        core.set_turbo(TurboRate::X2);
        core.set_turbo(TurboRate::X4);
        assert!(core.turbo_warned);
        assert!(calls(&log).is_empty());
        assert_eq!(core.turbo(), None);
    }

    #[test]
    fn buttons_use_core_names() {
        let (mut core, log) = core_with(BASIC);
        core.load_rom(&[], None).unwrap();
        calls(&log);
        core.press(GbaButton::Start);
        core.release(GbaButton::Start);
        assert_eq!(
            calls(&log),
            ["buttonPress(\"start\")", "buttonUnpress(\"start\")"]
        );
    }

    #[test]
    fn internal_save_syncs_filesystem() {
        let (mut core, log) = core_with(BASIC);
        core.load_rom(&[], None).unwrap();
        calls(&log);
        let slot = SaveSlot::try_from(2).unwrap();
        assert_eq!(block_on(core.save_state(slot)).unwrap(), SavedState::Internal);
        assert_eq!(calls(&log), ["saveState(2)", "FSSync()"]);
        assert!(!core.supports_state_bytes());
    }

    #[test]
    fn byte_save_and_load() {
        let log = CallLog::default();
        let mut methods = BASIC.to_vec();
        methods.extend(["getSaveState", "setSaveState"]);
        let mut core = ModuleCore::new(FakeFactory {
            methods,
            returns: vec![("getSaveState", CoreValue::Bytes(vec![1, 2, 3]))],
            log: Rc::clone(&log),
        });
        core.attach_surface(());
        core.load_rom(&[], None).unwrap();
        calls(&log);

        assert!(core.supports_state_bytes());
        let slot = SaveSlot::default();
        assert_eq!(
            block_on(core.save_state(slot)).unwrap(),
            SavedState::Bytes(vec![1, 2, 3])
        );
        block_on(core.load_state(slot, Some(&[1, 2, 3]))).unwrap();
        assert_eq!(
            calls(&log),
            ["getSaveState(1)", "setSaveState(1, <3 bytes>)"]
        );
    }

    #[test]
    fn refused_internal_load_is_no_save_data() {
        let log = CallLog::default();
        let mut core = ModuleCore::new(FakeFactory {
            methods: BASIC.to_vec(),
            returns: vec![("loadState", CoreValue::Bool(false))],
            log,
        });
        core.attach_surface(());
        core.load_rom(&[], None).unwrap();
        let slot = SaveSlot::try_from(3).unwrap();
        assert!(matches!(
            block_on(core.load_state(slot, None)),
            Err(CoreError::NoSaveData(s)) if s == slot
        ));
    }

    #[test]
    fn reported_turbo_comes_from_the_getter() {
        let log = CallLog::default();
        let mut methods = BASIC.to_vec();
        methods.extend(["setTurbo", "getTurbo"]);
        let mut core = ModuleCore::new(FakeFactory {
            methods,
            returns: vec![("getTurbo", CoreValue::Number(2.0))],
            log: Rc::clone(&log),
        });
        core.attach_surface(());
        assert_eq!(core.turbo(), None);
        core.load_rom(&[], None).unwrap();
        calls(&log);

        core.set_turbo(TurboRate::X4);
        assert_eq!(calls(&log), ["setTurbo(4)", "getTurbo()"]);
        assert_eq!(core.turbo(), Some(TurboRate::X2));
    }

    #[test]
    fn unreadable_getter_falls_back_to_requested_rate() {
        let mut methods = BASIC.to_vec();
        methods.extend(["setTurbo", "getTurbo"]);
        let mut core = ModuleCore::new(FakeFactory {
            methods,
            returns: vec![("getTurbo", CoreValue::Number(1.5))],
            log: CallLog::default(),
        });
        core.attach_surface(());
        core.load_rom(&[], None).unwrap();
        core.set_turbo(TurboRate::X2);
        assert_eq!(core.turbo(), Some(TurboRate::X2));
    }

    #[test]
    fn wrong_type_from_byte_save_is_an_error() {
        let mut methods = BASIC.to_vec();
        methods.push("saveStateBytes");
        let mut core = ModuleCore::new(FakeFactory {
            methods,
            returns: vec![("saveStateBytes", CoreValue::Null)],
            log: CallLog::default(),
        });
        core.attach_surface(());
        core.load_rom(&[], None).unwrap();
        let err = block_on(core.save_state(SaveSlot::default())).unwrap_err();
        assert_eq!(err.to_string(), "saveStateBytes: expected bytes, got null");
    }
}
