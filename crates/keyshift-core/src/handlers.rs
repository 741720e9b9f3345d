use crate::chord_engine::ChordMatcher;
use crate::key_state::KeyStateSource;
use crate::tables::{KeyTarget, RemapTables, ToggleState};
use crate::types::{InputEvent, KeyEvent};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResult {
    /// The event is consumed; later handlers do not run.
    Claimed,
    Passed,
}

impl HandlerResult {
    pub fn is_claimed(self) -> bool {
        matches!(self, HandlerResult::Claimed)
    }
}

/// Everything a handler may read or mutate while deciding on one event.
pub struct HandlerContext<'a> {
    pub tables: &'a mut RemapTables,
    pub key_state: &'a dyn KeyStateSource,
    /// Foreground application, resolved only when app tables exist.
    pub app: Option<&'a str>,
    /// Events to inject, in order, once the chain has finished.
    pub out: &'a mut Vec<InputEvent>,
}

/// One stage of the remap chain.
pub trait KeyHandler: Sync {
    fn name(&self) -> &'static str;

    /// Decide on a physical event.
    fn handle(&self, event: &KeyEvent, ctx: &mut HandlerContext<'_>) -> HandlerResult;

    /// Sees events carrying our own injection tag. These are always
    /// forwarded, so there is nothing to claim.
    fn observe_injected(&self, _event: &KeyEvent, _ctx: &mut HandlerContext<'_>) {}
}

/// Fixed evaluation order. The first handler to claim an event wins.
pub static HANDLER_CHAIN: [&dyn KeyHandler; 4] = [
    &SingleKeyRemapper,
    &ToggleModifierConverter,
    &ChordMatcher::GLOBAL,
    &ChordMatcher::APP_SPECIFIC,
];

/// Replaces one key with another, or swallows it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleKeyRemapper;

impl KeyHandler for SingleKeyRemapper {
    fn name(&self) -> &'static str {
        "single-key"
    }

    fn handle(&self, event: &KeyEvent, ctx: &mut HandlerContext<'_>) -> HandlerResult {
        match ctx.tables.single_key(event.vk) {
            None => HandlerResult::Passed,
            Some(KeyTarget::Disabled) => {
                trace!("{} disabled", event.vk);
                HandlerResult::Claimed
            }
            Some(KeyTarget::Key(target)) => {
                ctx.out.push(if event.is_down() {
                    InputEvent::down(target)
                } else {
                    InputEvent::up(target)
                });
                HandlerResult::Claimed
            }
        }
    }
}

/// Turns a toggle key (Caps Lock and friends) into something that can be held
/// like a modifier: the toggle fires once on press and once on release, and
/// auto-repeat in between is swallowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToggleModifierConverter;

impl KeyHandler for ToggleModifierConverter {
    fn name(&self) -> &'static str {
        "toggle-to-modifier"
    }

    fn handle(&self, event: &KeyEvent, ctx: &mut HandlerContext<'_>) -> HandlerResult {
        let Some(state) = ctx.tables.toggles.get_mut(&event.vk) else {
            return HandlerResult::Passed;
        };

        if event.is_down() {
            if *state == ToggleState::Held {
                return HandlerResult::Claimed;
            }
            *state = ToggleState::Held;
        }

        ctx.out.push(InputEvent::down(event.vk));
        ctx.out.push(InputEvent::up(event.vk));

        if event.is_up() {
            *state = ToggleState::Released;
        }
        HandlerResult::Claimed
    }
}
