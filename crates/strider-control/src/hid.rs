//! Background reader for the gamepad event device.
//!
//! Parses the kernel's `input_event` records from `/dev/input/eventN` and
//! publishes them into a [`SharedGamepad`]. Only the channels the input
//! mapping consumes are decoded; everything else on the device is
//! ignored.

use std::fs::File;
use std::io::{self, Read};
use std::thread;

use tracing::{info, warn};

use crate::input::SharedGamepad;

/// `struct input_event` on a 64-bit kernel: two 64-bit timestamp words,
/// then type, code, value.
const EVENT_SIZE: usize = 24;

const EV_KEY: u16 = 0x01;
const EV_ABS: u16 = 0x03;

const ABS_X: u16 = 0x00;
const ABS_Y: u16 = 0x01;
const ABS_Z: u16 = 0x02; // L2 pressure
const ABS_RX: u16 = 0x03;
const ABS_RY: u16 = 0x04;
const ABS_RZ: u16 = 0x05; // R2 pressure

const BTN_SELECT: u16 = 0x13a;
const BTN_START: u16 = 0x13b;
const BTN_MODE: u16 = 0x13c; // the PS button
const BTN_DPAD_UP: u16 = 0x220;
const BTN_DPAD_DOWN: u16 = 0x221;

/// Spawns the reader thread. It runs until the device goes away, then
/// logs and exits; a dead pad leaves the last snapshot in place, which
/// the robot treats as "hands off the sticks".
pub fn spawn(path: &str, pad: SharedGamepad) -> io::Result<thread::JoinHandle<()>> {
    let mut device = File::open(path)?;
    let name = path.to_owned();
    thread::Builder::new().name("gamepad".into()).spawn(move || {
        info!(device = %name, "gamepad reader running");
        let mut buf = [0u8; EVENT_SIZE];
        loop {
            if let Err(e) = device.read_exact(&mut buf) {
                warn!(device = %name, error = %e, "gamepad reader stopped");
                return;
            }
            let kind = u16::from_ne_bytes([buf[16], buf[17]]);
            let code = u16::from_ne_bytes([buf[18], buf[19]]);
            let value = i32::from_ne_bytes([buf[20], buf[21], buf[22], buf[23]]);
            apply(&pad, kind, code, value);
        }
    })
}

/// Folds one event into the shared snapshot.
fn apply(pad: &SharedGamepad, kind: u16, code: u16, value: i32) {
    match kind {
        EV_ABS => pad.publish(|snap| match code {
            ABS_X => snap.left_stick.x = centered(value),
            ABS_Y => snap.left_stick.y = centered(value),
            ABS_RX => snap.right_stick.x = centered(value),
            ABS_RY => snap.right_stick.y = centered(value),
            ABS_Z => snap.l2 = pressure(value),
            ABS_RZ => snap.r2 = pressure(value),
            _ => {}
        }),
        EV_KEY => pad.publish(|snap| {
            let pressed = value != 0;
            match code {
                BTN_START => snap.start = pressed,
                BTN_SELECT => snap.select = pressed,
                BTN_MODE => snap.ps = pressed,
                BTN_DPAD_UP => snap.dpad_up = if pressed { 255 } else { 0 },
                BTN_DPAD_DOWN => snap.dpad_down = if pressed { 255 } else { 0 },
                _ => {}
            }
        }),
        _ => {}
    }
}

/// Maps a `0..=255` axis with a centre detent to `[-127, 127]`.
fn centered(value: i32) -> i16 {
    (value.clamp(0, 255) - 128).clamp(-127, 127) as i16
}

/// Clamps a pressure axis to `0..=255`.
fn pressure(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
