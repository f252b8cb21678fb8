//! Turns polled host input into the edge-triggered callbacks the module expects.
//!
//! The host is sampled every cycle; [`InputState`] remembers what the previous cycle saw
//! and produces only the transitions. Stick positions are the exception: they go out
//! every cycle, even at rest.

use std::ffi::c_int;
use std::thread;
use std::time::Duration;

use shim_logger::Log;

use crate::host::InputSource;

/// Number of touch slots the module tracks.
pub const MAX_TOUCHES: usize = 2;

/// One touch report, in device coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchSample {
    pub x: u16,
    pub y: u16,
}

/// One controller sample: a button bitmask and two unsigned 2-axis sticks centred at 128.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadSample {
    pub buttons: u32,
    pub lx: u8,
    pub ly: u8,
    pub rx: u8,
    pub ry: u8,
}

impl Default for PadSample {
    fn default() -> Self {
        Self { buttons: 0, lx: 128, ly: 128, rx: 128, ry: 128 }
    }
}

/// Host controller button bits.
pub mod buttons {
    pub const SELECT: u32 = 0x0001;
    pub const START: u32 = 0x0008;
    pub const UP: u32 = 0x0010;
    pub const RIGHT: u32 = 0x0020;
    pub const DOWN: u32 = 0x0040;
    pub const LEFT: u32 = 0x0080;
    pub const L1: u32 = 0x0400;
    pub const R1: u32 = 0x0800;
    pub const TRIANGLE: u32 = 0x1000;
    pub const CIRCLE: u32 = 0x2000;
    pub const CROSS: u32 = 0x4000;
    pub const SQUARE: u32 = 0x8000;
}

/// Key codes the module understands.
pub mod keycodes {
    pub const DPAD_UP: i32 = 19;
    pub const DPAD_DOWN: i32 = 20;
    pub const DPAD_LEFT: i32 = 21;
    pub const DPAD_RIGHT: i32 = 22;
    pub const BUTTON_A: i32 = 29;
    pub const BUTTON_B: i32 = 30;
    pub const BUTTON_X: i32 = 99;
    pub const BUTTON_Y: i32 = 100;
    pub const BUTTON_L1: i32 = 102;
    pub const BUTTON_R1: i32 = 103;
    pub const BUTTON_START: i32 = 108;
    pub const BUTTON_SELECT: i32 = 109;
}

/// Host button bit to module key code. Events for one cycle go out in this order.
pub const BUTTON_MAP: [(u32, i32); 12] = [
    (buttons::UP, keycodes::DPAD_UP),
    (buttons::DOWN, keycodes::DPAD_DOWN),
    (buttons::LEFT, keycodes::DPAD_LEFT),
    (buttons::RIGHT, keycodes::DPAD_RIGHT),
    (buttons::CROSS, keycodes::BUTTON_A),
    (buttons::CIRCLE, keycodes::BUTTON_B),
    (buttons::SQUARE, keycodes::BUTTON_X),
    (buttons::TRIANGLE, keycodes::BUTTON_Y),
    (buttons::L1, keycodes::BUTTON_L1),
    (buttons::R1, keycodes::BUTTON_R1),
    (buttons::START, keycodes::BUTTON_START),
    (buttons::SELECT, keycodes::BUTTON_SELECT),
];

/// The event type the module's joystick callback expects for stick motion.
pub const JOYSTICK_MOTION: c_int = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TouchAction {
    Down = 1,
    Up = 2,
    Move = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum KeyAction {
    Down = 0,
    Up = 1,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Touch { action: TouchAction, x: i32, y: i32, id: i32 },
    Key { action: KeyAction, code: i32 },
    Joystick { x: f32, y: f32, id: i32 },
}

/// Maps device touch coordinates onto the module's logical screen, each axis scaled
/// independently and truncated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchScale {
    x: f32,
    y: f32,
}

impl TouchScale {
    pub fn new(device: (u32, u32), logical: (u32, u32)) -> Self {
        Self { x: logical.0 as f32 / device.0 as f32, y: logical.1 as f32 / device.1 as f32 }
    }

    pub fn apply(&self, sample: TouchSample) -> (i32, i32) {
        ((sample.x as f32 * self.x) as i32, (sample.y as f32 * self.y) as i32)
    }
}

/// Normalizes a raw stick axis to `-1.0..1.0`. Anything inside the dead zone is exactly
/// zero.
pub fn normalize_axis(raw: u8, dead_zone: f32) -> f32 {
    let value = (raw as f32 - 128.0) / 128.0;

    if value.abs() < dead_zone {
        0.0
    } else {
        value
    }
}

/// Edge-detection state for touches and buttons. Owned by the input thread alone.
#[derive(Debug, Clone)]
pub struct InputState {
    scale: TouchScale,
    dead_zone: f32,

    /// Last reported coordinates of each slot that is currently down.
    touches: [Option<(i32, i32)>; MAX_TOUCHES],
    buttons: u32,
}

impl InputState {
    pub fn new(scale: TouchScale, dead_zone: f32) -> Self {
        Self { scale, dead_zone, touches: [None; MAX_TOUCHES], buttons: 0 }
    }

    /// Advances one cycle and returns the events to deliver, in delivery order: touches
    /// by slot, then key edges in [`BUTTON_MAP`] order, then both sticks.
    pub fn cycle(&mut self, touches: [Option<TouchSample>; MAX_TOUCHES], pad: PadSample) -> Vec<InputEvent> {
        let mut events = Vec::new();

        for (slot, (sample, last)) in touches.into_iter().zip(self.touches.iter_mut()).enumerate() {
            let id = slot as i32;

            match (sample, *last) {
                (Some(sample), previous) => {
                    let (x, y) = self.scale.apply(sample);
                    let action = if previous.is_some() { TouchAction::Move } else { TouchAction::Down };

                    events.push(InputEvent::Touch { action, x, y, id });
                    *last = Some((x, y));
                },

                (None, Some((x, y))) => {
                    events.push(InputEvent::Touch { action: TouchAction::Up, x, y, id });
                    *last = None;
                },

                (None, None) => {},
            }
        }

        let pressed = pad.buttons & !self.buttons;
        let released = !pad.buttons & self.buttons;
        self.buttons = pad.buttons;

        for (bit, code) in BUTTON_MAP {
            if pressed & bit != 0 {
                events.push(InputEvent::Key { action: KeyAction::Down, code });
            }

            if released & bit != 0 {
                events.push(InputEvent::Key { action: KeyAction::Up, code });
            }
        }

        let dead_zone = self.dead_zone;
        events.push(InputEvent::Joystick {
            x: normalize_axis(pad.lx, dead_zone),
            y: normalize_axis(pad.ly, dead_zone),
            id: 0,
        });
        events.push(InputEvent::Joystick {
            x: normalize_axis(pad.rx, dead_zone),
            y: normalize_axis(pad.ry, dead_zone),
            id: 1,
        });

        events
    }
}

/// Where input events end up.
pub trait InputDispatch {
    fn dispatch(&mut self, event: InputEvent);
}

pub type TouchEventFn = unsafe extern "C" fn(action: c_int, x: c_int, y: c_int, id: c_int) -> c_int;
pub type KeyEventFn = unsafe extern "C" fn(action: c_int, keycode: c_int) -> c_int;
pub type JoystickEventFn = unsafe extern "C" fn(action: c_int, x: f32, y: f32, id: c_int) -> c_int;

/// The module's input entry points.
#[derive(Debug, Clone, Copy)]
pub struct ModuleInput {
    pub touch: TouchEventFn,
    pub key: KeyEventFn,
    pub joystick: JoystickEventFn,
}

impl InputDispatch for ModuleInput {
    fn dispatch(&mut self, event: InputEvent) {
        // Return values carry nothing the host acts on.
        unsafe {
            match event {
                InputEvent::Touch { action, x, y, id } => {
                    (self.touch)(action as c_int, x, y, id);
                },

                InputEvent::Key { action, code } => {
                    (self.key)(action as c_int, code);
                },

                InputEvent::Joystick { x, y, id } => {
                    (self.joystick)(JOYSTICK_MOTION, x, y, id);
                },
            }
        }
    }
}

/// The input thread: poll, diff, dispatch, sleep.
#[derive(Debug)]
pub struct InputBridge<S, D> {
    source: S,
    dispatch: D,
    state: InputState,
    poll_interval: Duration,
}

impl<S, D> InputBridge<S, D>
where
    S: InputSource,
    D: InputDispatch,
{
    pub fn new(source: S, dispatch: D, state: InputState, poll_interval: Duration) -> Self {
        Self { source, dispatch, state, poll_interval }
    }

    /// Runs one poll cycle and returns how many events were dispatched.
    pub fn poll_once(&mut self) -> usize {
        let touches = self.source.peek_touch();
        let pad = self.source.peek_pad();

        let events = self.state.cycle(touches, pad);

        for event in &events {
            if !matches!(event, InputEvent::Joystick { .. }) {
                tracing::trace!(target: Log::Input, ?event, "Dispatching input");
            }

            self.dispatch.dispatch(*event);
        }

        events.len()
    }

    /// Polls forever.
    pub fn run(mut self) -> ! {
        tracing::info!(target: Log::Input, interval = ?self.poll_interval, "Input bridge running");

        loop {
            self.poll_once();
            thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> InputState {
        InputState::new(TouchScale::new((1920, 1088), (960, 544)), 0.25)
    }

    fn touch(x: u16, y: u16) -> [Option<TouchSample>; MAX_TOUCHES] {
        [Some(TouchSample { x, y }), None]
    }

    fn pad(buttons: u32) -> PadSample {
        PadSample { buttons, ..PadSample::default() }
    }

    fn non_stick(events: Vec<InputEvent>) -> Vec<InputEvent> {
        events.into_iter().filter(|e| !matches!(e, InputEvent::Joystick { .. })).collect()
    }

    #[test]
    fn touch_contact_hold_release() {
        let mut state = state();

        let down = non_stick(state.cycle(touch(200, 200), pad(0)));
        assert_eq!(down, vec![InputEvent::Touch { action: TouchAction::Down, x: 100, y: 100, id: 0 }]);

        let held = non_stick(state.cycle(touch(240, 220), pad(0)));
        assert_eq!(held, vec![InputEvent::Touch { action: TouchAction::Move, x: 120, y: 110, id: 0 }]);

        let up = non_stick(state.cycle([None, None], pad(0)));
        assert_eq!(up, vec![InputEvent::Touch { action: TouchAction::Up, x: 120, y: 110, id: 0 }]);

        assert!(non_stick(state.cycle([None, None], pad(0))).is_empty());

        // The slot was reset, so the next contact is a fresh Down.
        let again = non_stick(state.cycle(touch(2, 2), pad(0)));
        assert_eq!(again, vec![InputEvent::Touch { action: TouchAction::Down, x: 1, y: 1, id: 0 }]);
    }

    #[test]
    fn touch_slots_are_independent() {
        let mut state = state();
        let both = [Some(TouchSample { x: 0, y: 0 }), Some(TouchSample { x: 1920, y: 1088 })];

        state.cycle(both, pad(0));
        let events = non_stick(state.cycle([None, Some(TouchSample { x: 1918, y: 1086 })], pad(0)));

        assert_eq!(
            events,
            vec![
                InputEvent::Touch { action: TouchAction::Up, x: 0, y: 0, id: 0 },
                InputEvent::Touch { action: TouchAction::Move, x: 959, y: 543, id: 1 },
            ]
        );
    }

    #[test]
    fn newly_pressed_button_emits_one_key_down() {
        let mut state = state();
        state.cycle([None, None], pad(buttons::SELECT));

        let events = non_stick(state.cycle([None, None], pad(buttons::SELECT | buttons::START)));
        assert_eq!(events, vec![InputEvent::Key { action: KeyAction::Down, code: keycodes::BUTTON_START }]);

        let releases = events.iter().filter(|e| matches!(e, InputEvent::Key { action: KeyAction::Up, .. })).count();
        assert_eq!(releases, 0);
    }

    #[test]
    fn unmapped_bits_emit_nothing() {
        let mut state = state();

        // 0b0001 is SELECT, 0b0010 is L3, which the module has no key code for.
        state.cycle([None, None], pad(0b0001));
        let events = non_stick(state.cycle([None, None], pad(0b0011)));
        assert!(events.is_empty());

        let events = non_stick(state.cycle([None, None], pad(0b0001)));
        assert!(events.is_empty());
    }

    #[test]
    fn press_and_release_follow_map_order() {
        let mut state = state();
        state.cycle([None, None], pad(buttons::CROSS | buttons::LEFT));

        let events = non_stick(state.cycle([None, None], pad(buttons::UP | buttons::CROSS)));

        assert_eq!(
            events,
            vec![
                InputEvent::Key { action: KeyAction::Down, code: keycodes::DPAD_UP },
                InputEvent::Key { action: KeyAction::Up, code: keycodes::DPAD_LEFT },
            ]
        );
    }

    #[test]
    fn sticks_inside_dead_zone_are_exactly_zero() {
        assert_eq!(normalize_axis(128, 0.25), 0.0);
        assert_eq!(normalize_axis(128 + 31, 0.25), 0.0);
        assert_eq!(normalize_axis(128 - 31, 0.25), 0.0);
        assert_eq!(normalize_axis(128 + 32, 0.25), 0.25);
        assert_eq!(normalize_axis(0, 0.25), -1.0);
    }

    #[test]
    fn sticks_are_reported_every_cycle() {
        let mut state = state();

        for _ in 0..3 {
            let events = state.cycle([None, None], pad(0));

            assert_eq!(
                events,
                vec![InputEvent::Joystick { x: 0.0, y: 0.0, id: 0 }, InputEvent::Joystick { x: 0.0, y: 0.0, id: 1 }]
            );
        }
    }

    struct Scripted {
        pads: Vec<PadSample>,
    }

    impl InputSource for Scripted {
        fn peek_touch(&mut self) -> [Option<TouchSample>; MAX_TOUCHES] {
            [None, None]
        }

        fn peek_pad(&mut self) -> PadSample {
            self.pads.remove(0)
        }
    }

    #[derive(Default)]
    struct Collect(Vec<InputEvent>);

    impl InputDispatch for Collect {
        fn dispatch(&mut self, event: InputEvent) {
            self.0.push(event);
        }
    }

    #[test]
    fn bridge_dispatches_what_the_state_produces() {
        let source = Scripted { pads: vec![pad(buttons::CIRCLE), pad(0)] };
        let mut bridge = InputBridge::new(source, Collect::default(), state(), Duration::from_millis(1));

        assert_eq!(bridge.poll_once(), 3);
        assert_eq!(bridge.poll_once(), 3);

        let keys = non_stick(bridge.dispatch.0.clone());
        assert_eq!(
            keys,
            vec![
                InputEvent::Key { action: KeyAction::Down, code: keycodes::BUTTON_B },
                InputEvent::Key { action: KeyAction::Up, code: keycodes::BUTTON_B },
            ]
        );
    }
}
