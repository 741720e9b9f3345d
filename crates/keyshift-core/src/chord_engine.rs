use crate::handlers::{HandlerContext, HandlerResult, KeyHandler};
use crate::key_state::KeyStateSource;
use crate::shortcut::Shortcut;
use crate::tables::{Activation, ChordEntry, ChordTable};
use crate::types::{InputEvent, KeyEvent, Vk};
use crate::vk_map::{self, VK_PLACEHOLDER};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordScope {
    /// The OS-level table.
    Global,
    /// The table of the foreground application.
    AppSpecific,
}

/// Chorded shortcut state machine over one scope's tables.
///
/// Each entry is either `Inactive` or `Active`. Activation swaps the user's
/// held trigger for the replacement chord; the replacement stays down until
/// the user lets go of a prefix key or the action key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordMatcher {
    scope: ChordScope,
}

impl ChordMatcher {
    pub const GLOBAL: Self = Self {
        scope: ChordScope::Global,
    };
    pub const APP_SPECIFIC: Self = Self {
        scope: ChordScope::AppSpecific,
    };

    pub fn scope(&self) -> ChordScope {
        self.scope
    }
}

impl KeyHandler for ChordMatcher {
    fn name(&self) -> &'static str {
        match self.scope {
            ChordScope::Global => "chord-global",
            ChordScope::AppSpecific => "chord-app",
        }
    }

    fn handle(&self, event: &KeyEvent, ctx: &mut HandlerContext<'_>) -> HandlerResult {
        let tables = &mut *ctx.tables;
        match self.scope {
            ChordScope::Global => {
                // A remap in the foreground application's table that fires on
                // this same input takes precedence, whether or not its trigger
                // is spelled the same way (`Alt+D` vs `LAlt+D`).
                let app_fires = ctx
                    .app
                    .and_then(|app| tables.app_chords.get(app))
                    .is_some_and(|table| {
                        table
                            .entries()
                            .iter()
                            .any(|entry| fires_on(&entry.trigger, event, ctx.key_state))
                    });
                step_table(&mut tables.os_chords, event, ctx.key_state, ctx.out, !app_fires)
            }
            ChordScope::AppSpecific => {
                let current = match ctx.app {
                    Some(app) => tables.app_chords.get_mut(app),
                    None => None,
                };
                if let Some(table) = current {
                    if step_table(table, event, ctx.key_state, ctx.out, true).is_claimed() {
                        return HandlerResult::Claimed;
                    }
                }

                // Chords left active by an application that lost focus still
                // need their release path.
                for (app, table) in tables.app_chords.iter_mut() {
                    if Some(app.as_str()) == ctx.app || !table.has_active() {
                        continue;
                    }
                    if step_table(table, event, ctx.key_state, ctx.out, false).is_claimed() {
                        return HandlerResult::Claimed;
                    }
                }
                HandlerResult::Passed
            }
        }
    }

    fn observe_injected(&self, event: &KeyEvent, ctx: &mut HandlerContext<'_>) {
        let echo = InputEvent {
            vk: event.vk,
            up: event.is_up(),
            tag: event.tag,
        };
        let tables = &mut *ctx.tables;
        let consumed = match self.scope {
            ChordScope::Global => consume_echo(&mut tables.os_chords, &echo),
            ChordScope::AppSpecific => tables
                .app_chords
                .values_mut()
                .any(|table| consume_echo(table, &echo)),
        };
        if consumed {
            trace!("{}: echo {} up={}", self.name(), echo.vk, echo.up);
        }
    }
}

/// Runs `event` through the entries of one table in order.
/// Without `may_activate` only already active entries can claim.
fn step_table(
    table: &mut ChordTable,
    event: &KeyEvent,
    keys: &dyn KeyStateSource,
    out: &mut Vec<InputEvent>,
    may_activate: bool,
) -> HandlerResult {
    for entry in table.entries_mut() {
        if step_entry(entry, event, keys, out, may_activate).is_claimed() {
            return HandlerResult::Claimed;
        }
    }
    HandlerResult::Passed
}

fn step_entry(
    entry: &mut ChordEntry,
    event: &KeyEvent,
    keys: &dyn KeyStateSource,
    out: &mut Vec<InputEvent>,
    may_activate: bool,
) -> HandlerResult {
    let trigger = &entry.trigger;
    let remap = &mut entry.remap;

    match remap.state {
        Activation::Inactive => {
            if !may_activate || !fires_on(trigger, event, keys) {
                return HandlerResult::Passed;
            }

            let start = out.len();
            remap.released.clear();
            for key in trigger.prefix() {
                held_sides(*key, keys, &mut remap.released);
            }

            out.push(InputEvent::up(event.vk));
            out.extend(remap.released.iter().rev().map(|k| InputEvent::up(*k)));
            out.extend(remap.target.keys().iter().map(|k| InputEvent::down(*k)));

            remap.state = Activation::Active;
            remap.echoes.clear();
            remap.echoes.extend(out[start..].iter().copied());
            debug!("chord {} -> {} active", trigger, DisplayKeys(remap.target.keys()));
            HandlerResult::Claimed
        }
        Activation::Active => {
            let replacement = remap.target.keys();

            if event.is_up() && trigger.prefix().iter().any(|k| vk_map::key_matches(*k, event.vk)) {
                out.extend(replacement.iter().rev().map(|k| InputEvent::up(*k)));
                debug!("chord {} released by {} up", trigger, event.vk);
                remap.reset();
                return HandlerResult::Claimed;
            }

            // The action key can overtake our own injected presses, so a
            // replacement key still in flight counts as held.
            let first = remap.target.first_key();
            if !vk_map::key_matches(trigger.action_key(), event.vk)
                || !(keys.is_down(first) || remap.awaits_down(first))
            {
                return HandlerResult::Passed;
            }

            if event.is_down() {
                let repeat = InputEvent::down(remap.target.action_key());
                out.push(repeat);
                remap.echoes.push_back(repeat);
                return HandlerResult::Claimed;
            }

            // Action key let go while the trigger's modifiers are still held:
            // drop the replacement and give the user their modifiers back
            // untagged, so the next press can trigger the chord again.
            out.extend(replacement.iter().rev().map(|k| InputEvent::up(*k)));
            out.extend(remap.released.iter().map(|k| InputEvent::down(*k).untagged()));
            out.push(InputEvent::up(VK_PLACEHOLDER));
            debug!("chord {} finished, prefix restored", trigger);
            remap.reset();
            HandlerResult::Claimed
        }
    }
}

/// Action key down with every prefix key live-down.
fn fires_on(trigger: &Shortcut, event: &KeyEvent, keys: &dyn KeyStateSource) -> bool {
    event.is_down()
        && vk_map::key_matches(trigger.action_key(), event.vk)
        && trigger.prefix().iter().all(|k| keys.is_down(*k))
}

/// Physical keys to release for a configured prefix key.
fn held_sides(key: Vk, keys: &dyn KeyStateSource, released: &mut Vec<Vk>) {
    let Some(sides) = vk_map::sides(key) else {
        released.push(key);
        return;
    };
    let before = released.len();
    released.extend(sides.into_iter().filter(|s| keys.is_down(*s)));
    if released.len() == before {
        released.push(sides[0]);
    }
}

fn consume_echo(table: &mut ChordTable, echo: &InputEvent) -> bool {
    table
        .entries_mut()
        .iter_mut()
        .filter(|entry| entry.remap.is_active())
        .any(|entry| entry.remap.take_echo(echo))
}

struct DisplayKeys<'a>(&'a [Vk]);

impl std::fmt::Display for DisplayKeys<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}
