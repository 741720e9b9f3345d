use keyshift_core::app_context::StaticAppContext;
use keyshift_core::config::{RemapConfig, ShortcutRemap, SingleKeyRemap};
use keyshift_core::injector::RecordingInjector;
use keyshift_core::key_state::{KeyStateSource, KeyboardSnapshot};
use keyshift_core::recorder::ShortcutRecorder;
use keyshift_core::tables::ToggleState;
use keyshift_core::vk_map::{
    letter, VK_CAPITAL, VK_LCONTROL, VK_LMENU, VK_LSHIFT, VK_LWIN, VK_OEM_4, VK_PLACEHOLDER,
};
use keyshift_core::{Engine, InputEvent, KeyAction, KeyEdge, KeyEvent, Vk};

/// Drives the engine the way Windows would: forwarded physical events update
/// the key state, and everything injected is fed back through the hook.
struct Rig {
    engine: Engine,
    keys: KeyboardSnapshot,
    sink: RecordingInjector,
    app: StaticAppContext,
    injected: Vec<InputEvent>,
}

impl Rig {
    fn new(config: RemapConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let keys = KeyboardSnapshot::new();
        let sink = RecordingInjector::new();
        let app = StaticAppContext::default();
        let tables = config.build().expect("valid config");
        let engine = Engine::new(keys.clone(), sink.clone(), app.clone()).with_tables(tables);
        Self {
            engine,
            keys,
            sink,
            app,
            injected: Vec::new(),
        }
    }

    fn press(&mut self, vk: Vk) -> KeyAction {
        self.physical(vk, KeyEdge::Down)
    }

    fn release(&mut self, vk: Vk) -> KeyAction {
        self.physical(vk, KeyEdge::Up)
    }

    fn physical(&mut self, vk: Vk, edge: KeyEdge) -> KeyAction {
        let event = KeyEvent::physical(vk, edge);
        let action = self.engine.process_event(event);
        if action == KeyAction::Pass {
            self.keys.apply(&event);
        }
        self.replay();
        action
    }

    fn replay(&mut self) {
        loop {
            let batch = self.sink.take();
            if batch.is_empty() {
                break;
            }
            for out in batch {
                self.injected.push(out);
                let event = out.as_key_event();
                let action = self.engine.process_event(event);
                if event.is_injected() {
                    assert_eq!(action, KeyAction::Pass, "tagged {:?} was blocked", out);
                    assert!(
                        self.sink.events().is_empty(),
                        "tagged {:?} caused more injection",
                        out
                    );
                }
                if action == KeyAction::Pass {
                    self.keys.apply(&event);
                }
            }
        }
    }

    fn take_injected(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.injected)
    }

    fn assert_idle(&self) {
        assert!(!self.engine.tables().has_active_chords());
        assert!(self.keys.held().is_empty(), "stuck keys: {:?}", self.keys.held());
    }
}

fn remap(trigger: &str, target: &str) -> ShortcutRemap {
    ShortcutRemap {
        trigger: trigger.into(),
        target: target.into(),
    }
}

fn alt_d_config() -> RemapConfig {
    RemapConfig {
        os_shortcuts: vec![remap("LAlt+D", "LCtrl+V")],
        ..RemapConfig::default()
    }
}

#[test]
fn chord_activation_and_teardown_on_action_release() {
    let mut rig = Rig::new(alt_d_config());
    let (d, v) = (letter('d'), letter('v'));

    assert_eq!(rig.press(VK_LMENU), KeyAction::Pass);
    assert_eq!(rig.physical(d, KeyEdge::SysDown), KeyAction::Block);
    assert_eq!(
        rig.take_injected(),
        vec![
            InputEvent::up(d),
            InputEvent::up(VK_LMENU),
            InputEvent::down(VK_LCONTROL),
            InputEvent::down(v),
        ]
    );
    assert!(rig.keys.is_down(VK_LCONTROL));
    assert!(!rig.keys.is_down(VK_LMENU));

    // Auto-repeat of the action key repeats the replacement action key.
    assert_eq!(rig.physical(d, KeyEdge::Down), KeyAction::Block);
    assert_eq!(rig.take_injected(), vec![InputEvent::down(v)]);

    assert_eq!(rig.release(d), KeyAction::Block);
    assert_eq!(
        rig.take_injected(),
        vec![
            InputEvent::up(v),
            InputEvent::up(VK_LCONTROL),
            InputEvent::down(VK_LMENU).untagged(),
            InputEvent::up(VK_PLACEHOLDER),
        ]
    );
    // The user still holds LAlt, and the OS agrees again.
    assert!(rig.keys.is_down(VK_LMENU));

    // Pressing D again fires the chord a second time.
    assert_eq!(rig.physical(d, KeyEdge::SysDown), KeyAction::Block);
    assert_eq!(rig.take_injected().len(), 4);
    rig.release(d);
    rig.take_injected();

    assert_eq!(rig.release(VK_LMENU), KeyAction::Pass);
    assert!(rig.take_injected().is_empty());
    rig.assert_idle();
}

#[test]
fn prefix_release_escape_releases_replacement_exactly_once() {
    let mut rig = Rig::new(alt_d_config());
    let (d, v) = (letter('d'), letter('v'));

    rig.press(VK_LMENU);
    rig.physical(d, KeyEdge::SysDown);
    rig.take_injected();

    assert_eq!(rig.release(VK_LMENU), KeyAction::Block);
    assert_eq!(
        rig.take_injected(),
        vec![InputEvent::up(v), InputEvent::up(VK_LCONTROL)]
    );

    // The action key comes up after the chord is gone: plain pass-through.
    assert_eq!(rig.release(d), KeyAction::Pass);
    assert!(rig.take_injected().is_empty());
    rig.assert_idle();
}

#[test]
fn single_key_round_trip() {
    let mut rig = Rig::new(RemapConfig {
        single_key_remaps: vec![
            SingleKeyRemap {
                from: "A".into(),
                to: "B".into(),
            },
            SingleKeyRemap {
                from: "[".into(),
                to: "Disabled".into(),
            },
        ],
        ..RemapConfig::default()
    });

    assert_eq!(rig.press(letter('a')), KeyAction::Block);
    assert!(rig.keys.is_down(letter('b')));
    assert_eq!(rig.release(letter('a')), KeyAction::Block);
    assert_eq!(
        rig.take_injected(),
        vec![InputEvent::down(letter('b')), InputEvent::up(letter('b'))]
    );

    assert_eq!(rig.press(VK_OEM_4), KeyAction::Block);
    assert_eq!(rig.release(VK_OEM_4), KeyAction::Block);
    assert!(rig.take_injected().is_empty());
    rig.assert_idle();
}

#[test]
fn toggle_repeat_is_idempotent() {
    let mut rig = Rig::new(RemapConfig {
        toggle_to_modifier: vec!["CapsLock".into()],
        ..RemapConfig::default()
    });

    for _ in 0..5 {
        assert_eq!(rig.press(VK_CAPITAL), KeyAction::Block);
    }
    assert_eq!(
        rig.engine.tables().toggle_state(VK_CAPITAL),
        Some(ToggleState::Held)
    );
    assert_eq!(rig.release(VK_CAPITAL), KeyAction::Block);

    let pulse = [InputEvent::down(VK_CAPITAL), InputEvent::up(VK_CAPITAL)];
    assert_eq!(rig.take_injected(), [pulse, pulse].concat());
    assert_eq!(
        rig.engine.tables().toggle_state(VK_CAPITAL),
        Some(ToggleState::Released)
    );
    rig.assert_idle();
}

#[test]
fn app_specific_remap_takes_precedence() {
    let mut config = alt_d_config();
    config
        .app_shortcuts
        .insert("Notepad.exe".into(), vec![remap("LAlt+D", "LCtrl+C")]);
    let mut rig = Rig::new(config);

    rig.app.set(Some(r"C:\Windows\notepad.exe"));
    rig.press(VK_LMENU);
    rig.physical(letter('d'), KeyEdge::SysDown);
    let out = rig.take_injected();
    assert_eq!(out[3], InputEvent::down(letter('c')));
    rig.release(letter('d'));
    rig.release(VK_LMENU);
    rig.take_injected();
    rig.assert_idle();

    rig.app.set(Some("code.exe"));
    rig.press(VK_LMENU);
    rig.physical(letter('d'), KeyEdge::SysDown);
    let out = rig.take_injected();
    assert_eq!(out[3], InputEvent::down(letter('v')));
    rig.release(letter('d'));
    rig.release(VK_LMENU);
    rig.assert_idle();
}

#[test]
fn app_remap_wins_over_generic_global_trigger() {
    let config = RemapConfig {
        os_shortcuts: vec![remap("Alt+D", "LCtrl+V")],
        app_shortcuts: [("notepad.exe".to_string(), vec![remap("LAlt+D", "LCtrl+C")])]
            .into_iter()
            .collect(),
        ..RemapConfig::default()
    };
    let mut rig = Rig::new(config);

    rig.app.set(Some("notepad.exe"));
    rig.press(VK_LMENU);
    assert_eq!(rig.physical(letter('d'), KeyEdge::SysDown), KeyAction::Block);
    assert_eq!(
        rig.take_injected(),
        vec![
            InputEvent::up(letter('d')),
            InputEvent::up(VK_LMENU),
            InputEvent::down(VK_LCONTROL),
            InputEvent::down(letter('c')),
        ]
    );
    rig.release(letter('d'));
    rig.release(VK_LMENU);
    rig.take_injected();
    rig.assert_idle();

    // Elsewhere the generic global trigger matches LAlt.
    rig.app.set(Some("code.exe"));
    rig.press(VK_LMENU);
    rig.physical(letter('d'), KeyEdge::SysDown);
    assert_eq!(rig.take_injected()[3], InputEvent::down(letter('v')));
    rig.release(letter('d'));
    rig.release(VK_LMENU);
    rig.assert_idle();
}

#[test]
fn app_chord_survives_focus_change_until_released() {
    let mut config = RemapConfig::default();
    config
        .app_shortcuts
        .insert("notepad.exe".into(), vec![remap("LAlt+D", "LCtrl+C")]);
    let mut rig = Rig::new(config);

    rig.app.set(Some("notepad.exe"));
    rig.press(VK_LMENU);
    rig.physical(letter('d'), KeyEdge::SysDown);
    rig.take_injected();

    rig.app.set(None);
    assert_eq!(rig.release(VK_LMENU), KeyAction::Block);
    assert_eq!(
        rig.take_injected(),
        vec![InputEvent::up(letter('c')), InputEvent::up(VK_LCONTROL)]
    );
    rig.release(letter('d'));
    rig.assert_idle();
}

#[test]
fn disable_mid_chord_leaves_nothing_held() {
    let mut rig = Rig::new(RemapConfig::sample());

    rig.press(VK_LWIN);
    assert_eq!(rig.press(letter('f')), KeyAction::Block);
    assert!(rig.keys.is_down(letter('s')));

    rig.engine.set_enabled(false);
    rig.replay();
    assert!(!rig.keys.is_down(letter('s')));
    assert!(!rig.keys.is_down(VK_LWIN));

    // Physical releases now pass straight through.
    assert_eq!(rig.release(letter('f')), KeyAction::Pass);
    assert_eq!(rig.release(VK_LWIN), KeyAction::Pass);
    rig.assert_idle();
}

#[test]
fn idle_engine_forwards_everything() {
    let mut rig = Rig::new(RemapConfig::sample());

    for vk in [letter('a'), letter('d'), VK_LCONTROL, letter('z')] {
        assert_eq!(rig.press(vk), KeyAction::Pass);
        assert_eq!(rig.release(vk), KeyAction::Pass);
    }
    // D without LAlt held is not a chord.
    assert!(rig.take_injected().is_empty());
    rig.assert_idle();
}

#[test]
fn recording_mode_keeps_remap_state_clean() {
    let mut rig = Rig::new(RemapConfig::sample());
    rig.press(VK_CAPITAL);
    rig.take_injected();

    rig.engine.begin_recording(ShortcutRecorder::new());
    assert_eq!(
        rig.engine.tables().toggle_state(VK_CAPITAL),
        Some(ToggleState::Released)
    );

    // Keys go to the recorder, not to the OS.
    assert_eq!(rig.press(VK_LCONTROL), KeyAction::Block);
    assert_eq!(rig.press(letter('k')), KeyAction::Block);
    assert_eq!(rig.release(letter('k')), KeyAction::Block);
    assert_eq!(rig.release(VK_LCONTROL), KeyAction::Block);

    let recorder = rig.engine.end_recording().expect("recording");
    let shortcut = recorder.detected_shortcut().expect("valid shortcut");
    assert_eq!(shortcut.to_string(), "LCtrl + K");

    // Entering recording put the toggle back to rest, so this press pulses.
    assert_eq!(rig.press(VK_CAPITAL), KeyAction::Block);
    assert_eq!(rig.take_injected().len(), 2);
}

#[test]
fn shipped_sample_config_loads() {
    let mut p = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.push("..");
    p.push("..");
    p.push("config");
    p.push("sample.json");

    let config = RemapConfig::load(&p).expect("load sample.json");
    let tables = config.build().expect("sample.json is valid");
    assert_eq!(tables.os_chords().len(), 3);
    assert_eq!(tables.app_chords("notepad.exe").map(|t| t.len()), Some(1));

    let mut rig = Rig::new(config);
    rig.app.set(Some("notepad.exe"));
    rig.press(VK_LCONTROL);
    rig.press(VK_LSHIFT);
    assert_eq!(rig.press(letter('s')), KeyAction::Block);
    assert_eq!(rig.take_injected().last(), Some(&InputEvent::down(Vk(0x7B))));
}
