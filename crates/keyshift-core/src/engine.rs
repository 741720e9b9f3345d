use crate::app_context::AppContextResolver;
use crate::handlers::{HandlerContext, HANDLER_CHAIN};
use crate::injector::{InjectError, InputInjector};
use crate::key_state::KeyStateSource;
use crate::recorder::ShortcutRecorder;
use crate::tables::RemapTables;
use crate::types::{EventTag, InputEvent, KeyAction, KeyEdge, KeyEvent, Vk};
use parking_lot::Mutex;
use tracing::{info, trace, warn};

lazy_static::lazy_static! {
    pub static ref ENGINE: Mutex<Engine> = Mutex::new(Engine::default());
}

/// Entry point of the hook callback.
///
/// Runs physical events through the handler chain. The claiming handler's
/// replacement input comes back as [`KeyAction::Inject`] so the hook can send
/// it after letting go of [`ENGINE`]. Events carrying our own tag are always
/// forwarded.
pub struct Engine {
    tables: RemapTables,
    enabled: bool,
    key_state: Box<dyn KeyStateSource + Send>,
    injector: Box<dyn InputInjector + Send>,
    app_context: Box<dyn AppContextResolver + Send>,
    recorder: Option<ShortcutRecorder>,
    on_enabled_change: Option<Box<dyn Fn(bool) + Send + Sync>>,
    pending: Vec<InputEvent>,
}

#[cfg(windows)]
impl Default for Engine {
    fn default() -> Self {
        Self::new(
            crate::key_state::AsyncKeyState,
            crate::injector::SendInputInjector::new(),
            crate::app_context::ForegroundProcess,
        )
    }
}

#[cfg(not(windows))]
impl Default for Engine {
    fn default() -> Self {
        Self::new(
            crate::key_state::KeyboardSnapshot::new(),
            crate::injector::RecordingInjector::new(),
            crate::app_context::StaticAppContext::default(),
        )
    }
}

impl Engine {
    pub fn new(
        key_state: impl KeyStateSource + Send + 'static,
        injector: impl InputInjector + Send + 'static,
        app_context: impl AppContextResolver + Send + 'static,
    ) -> Self {
        Self {
            tables: RemapTables::default(),
            enabled: true,
            key_state: Box::new(key_state),
            injector: Box::new(injector),
            app_context: Box::new(app_context),
            recorder: None,
            on_enabled_change: None,
            pending: Vec::with_capacity(8),
        }
    }

    pub fn with_tables(mut self, tables: RemapTables) -> Self {
        self.tables = tables;
        self
    }

    /// Hook-facing entry point. The caller injects the events of a returned
    /// [`KeyAction::Inject`] and reports failures through
    /// [`Engine::report_injection_failure`].
    pub fn on_event(&mut self, vk: Vk, edge: KeyEdge, tag: EventTag) -> KeyAction {
        self.decide(KeyEvent::new(vk, edge, tag))
    }

    /// Like [`Engine::on_event`], but injects through the engine's own
    /// injector. Returns `Pass` or `Block`.
    pub fn process_event(&mut self, event: KeyEvent) -> KeyAction {
        match self.decide(event) {
            KeyAction::Inject(events) => {
                self.inject(&events);
                KeyAction::Block
            }
            action => action,
        }
    }

    fn decide(&mut self, event: KeyEvent) -> KeyAction {
        if let Some(recorder) = self.recorder.as_mut() {
            if event.is_injected() {
                return KeyAction::Pass;
            }
            return if recorder.record(&event) {
                KeyAction::Block
            } else {
                KeyAction::Pass
            };
        }

        if !self.enabled {
            return KeyAction::Pass;
        }

        // Resolving the foreground process costs a few syscalls, so only do
        // it when there is an app table it could select.
        let app = if !event.is_injected() && self.tables.has_app_chords() {
            self.app_context.current_app_identity()
        } else {
            None
        };

        let mut ctx = HandlerContext {
            tables: &mut self.tables,
            key_state: self.key_state.as_ref(),
            app: app.as_deref(),
            out: &mut self.pending,
        };

        if event.is_injected() {
            for handler in HANDLER_CHAIN.iter() {
                handler.observe_injected(&event, &mut ctx);
            }
            return KeyAction::Pass;
        }

        for handler in HANDLER_CHAIN.iter() {
            if handler.handle(&event, &mut ctx).is_claimed() {
                trace!("{} {:?} claimed by {}", event.vk, event.edge, handler.name());
                return if self.pending.is_empty() {
                    KeyAction::Block
                } else {
                    KeyAction::Inject(std::mem::take(&mut self.pending))
                };
            }
        }
        KeyAction::Pass
    }

    /// Injection of `count` events failed. The originating event stays
    /// blocked; echoes the chords were waiting for are forgotten.
    pub fn report_injection_failure(&mut self, count: usize, err: &InjectError) {
        warn!("Failed to inject {} events: {}", count, err);
        self.tables.drop_echoes();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            if !enabled {
                self.release_all();
            }
            info!("Engine {}", if enabled { "enabled" } else { "disabled" });
            if let Some(ref cb) = self.on_enabled_change {
                cb(enabled);
            }
        }
    }

    pub fn set_on_enabled_change(&mut self, cb: impl Fn(bool) + Send + Sync + 'static) {
        self.on_enabled_change = Some(Box::new(cb));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Replaces the tables wholesale. Replacement keys the old tables were
    /// holding down are released first.
    pub fn load_tables(&mut self, tables: RemapTables) {
        self.release_all();
        self.tables = tables;
        info!(
            "Engine: tables loaded ({} single-key, {} toggle, {} os shortcuts)",
            self.tables.single_key_count(),
            self.tables.toggle_count(),
            self.tables.os_chords().len()
        );
    }

    pub fn tables(&self) -> &RemapTables {
        &self.tables
    }

    /// Routes physical input to `recorder` until [`Engine::end_recording`].
    pub fn begin_recording(&mut self, recorder: ShortcutRecorder) {
        self.release_all();
        self.recorder = Some(recorder);
        info!("Shortcut recording started");
    }

    pub fn end_recording(&mut self) -> Option<ShortcutRecorder> {
        let recorder = self.recorder.take();
        if recorder.is_some() {
            info!("Shortcut recording stopped");
        }
        recorder
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn recorder(&self) -> Option<&ShortcutRecorder> {
        self.recorder.as_ref()
    }

    fn release_all(&mut self) {
        self.tables.release_all(&mut self.pending);
        let events = std::mem::take(&mut self.pending);
        self.inject(&events);
    }

    fn inject(&mut self, events: &[InputEvent]) {
        if events.is_empty() {
            return;
        }
        if let Err(e) = self.injector.send(events) {
            self.report_injection_failure(events.len(), &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_context::StaticAppContext;
    use crate::config::RemapConfig;
    use crate::injector::RecordingInjector;
    use crate::key_state::KeyboardSnapshot;
    use crate::vk_map::{letter, VK_CAPITAL, VK_LCONTROL, VK_LMENU, VK_OEM_4, VK_RETURN};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn make_engine() -> (Engine, KeyboardSnapshot, RecordingInjector) {
        let keys = KeyboardSnapshot::new();
        let sink = RecordingInjector::new();
        let tables = RemapConfig::sample().build().expect("sample tables");
        let engine = Engine::new(keys.clone(), sink.clone(), StaticAppContext::default())
            .with_tables(tables);
        (engine, keys, sink)
    }

    fn down(vk: Vk) -> KeyEvent {
        KeyEvent::physical(vk, KeyEdge::Down)
    }

    fn up(vk: Vk) -> KeyEvent {
        KeyEvent::physical(vk, KeyEdge::Up)
    }

    #[test]
    fn test_unmapped_key_passes() {
        let (mut engine, _, sink) = make_engine();
        assert_eq!(engine.process_event(down(letter('q'))), KeyAction::Pass);
        assert_eq!(engine.process_event(up(letter('q'))), KeyAction::Pass);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_injected_events_are_forwarded_untouched() {
        let (mut engine, _, sink) = make_engine();
        let action = engine.process_event(KeyEvent::injected(VK_OEM_4, KeyEdge::Down));
        assert_eq!(action, KeyAction::Pass);
        let action = engine.process_event(KeyEvent::injected(VK_CAPITAL, KeyEdge::Down));
        assert_eq!(action, KeyAction::Pass);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_injection_failure_still_blocks() {
        let tables = RemapConfig::sample().build().unwrap();
        let mut engine = Engine::new(
            KeyboardSnapshot::new(),
            RecordingInjector::failing(),
            StaticAppContext::default(),
        )
        .with_tables(tables);
        assert_eq!(engine.process_event(down(VK_CAPITAL)), KeyAction::Block);
    }

    #[test]
    fn test_on_event_hands_replacement_to_caller() {
        let (mut engine, keys, sink) = make_engine();
        keys.press(VK_LMENU);

        let action = engine.on_event(letter('d'), KeyEdge::SysDown, EventTag::Physical);
        assert_eq!(
            action,
            KeyAction::Inject(vec![
                InputEvent::up(letter('d')),
                InputEvent::up(VK_LMENU),
                InputEvent::down(VK_LCONTROL),
                InputEvent::down(letter('v')),
            ])
        );
        assert!(action.is_blocked());
        assert!(sink.events().is_empty());

        // Disabled keys are swallowed without a replacement.
        let action = engine.on_event(VK_OEM_4, KeyEdge::Down, EventTag::Physical);
        assert_eq!(action, KeyAction::Block);
    }

    #[test]
    fn test_injection_failure_forgets_echoes() {
        let keys = KeyboardSnapshot::new();
        let tables = RemapConfig::sample().build().unwrap();
        let mut engine = Engine::new(
            keys.clone(),
            RecordingInjector::failing(),
            StaticAppContext::default(),
        )
        .with_tables(tables);
        keys.press(VK_LMENU);

        assert_eq!(engine.process_event(down(letter('d'))), KeyAction::Block);
        let remap = &engine.tables().os_chords().entries()[0].remap;
        assert!(remap.is_active());
        assert_eq!(remap.pending_echoes(), 0);
    }

    #[test]
    fn test_disable_releases_active_chord_and_resets() {
        let (mut engine, keys, sink) = make_engine();
        let flips = Arc::new(AtomicBool::new(true));
        let seen = flips.clone();
        engine.set_on_enabled_change(move |on| seen.store(on, Ordering::SeqCst));

        keys.press(VK_LMENU);
        engine.process_event(down(letter('d')));
        engine.process_event(down(VK_CAPITAL));
        sink.take();

        engine.set_enabled(false);
        assert!(!flips.load(Ordering::SeqCst));
        assert_eq!(
            sink.take(),
            vec![InputEvent::up(letter('v')), InputEvent::up(VK_LCONTROL)]
        );
        assert!(!engine.tables().has_active_chords());

        // Disabled: everything is forwarded.
        assert_eq!(engine.process_event(down(VK_OEM_4)), KeyAction::Pass);

        engine.set_enabled(true);
        assert!(flips.load(Ordering::SeqCst));
        // Toggle state was reset, so the next press pulses again.
        assert_eq!(engine.process_event(down(VK_CAPITAL)), KeyAction::Block);
        assert_eq!(sink.take().len(), 2);
    }

    #[test]
    fn test_load_tables_releases_held_replacement() {
        let (mut engine, keys, sink) = make_engine();
        keys.press(VK_LMENU);
        engine.process_event(down(letter('d')));
        sink.take();

        engine.load_tables(RemapTables::new());
        assert_eq!(sink.take().len(), 2);
        assert_eq!(engine.process_event(down(letter('d'))), KeyAction::Pass);
    }

    #[test]
    fn test_recording_bypasses_handlers() {
        let (mut engine, _, sink) = make_engine();
        engine.begin_recording(ShortcutRecorder::new());

        assert_eq!(engine.process_event(down(VK_LMENU)), KeyAction::Block);
        assert_eq!(engine.process_event(down(VK_CAPITAL)), KeyAction::Block);
        assert_eq!(
            engine.process_event(KeyEvent::injected(letter('x'), KeyEdge::Down)),
            KeyAction::Pass
        );
        assert!(sink.events().is_empty());

        let recorder = engine.end_recording().expect("was recording");
        assert_eq!(recorder.snapshot(), &[VK_LMENU, VK_CAPITAL]);
        assert!(!engine.is_recording());
    }

    #[test]
    fn test_recording_forwards_release_of_key_held_before_start() {
        let (mut engine, _, _) = make_engine();
        engine.begin_recording(ShortcutRecorder::new());

        // Enter from launching the capture comes up after it started.
        assert_eq!(engine.process_event(up(VK_RETURN)), KeyAction::Pass);

        assert_eq!(engine.process_event(down(VK_LCONTROL)), KeyAction::Block);
        assert_eq!(engine.process_event(up(VK_LCONTROL)), KeyAction::Block);
    }
}
