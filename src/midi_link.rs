//! MIDI link to the hardware under test
//!
//! Outbound: LFO parameter pushes as CC messages plus a note trigger.
//! Inbound: capture of the device's modulation-output CC stream. Captured
//! points carry the source driver's timestamp, not ours, so asynchronous
//! delivery cannot skew the later analysis.

use crate::capture::CapturedPoint;
use crate::engine::LfoConfig;
use crate::timing::MULTIPLIERS;
use midir::{MidiInput, MidiInputConnection, MidiInputPort, MidiOutput, MidiOutputConnection, MidiOutputPort};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// LFO page CC numbers from the device's MIDI implementation chart.
pub const CC_LFO_SPEED: u8 = 102;
pub const CC_LFO_MULTIPLIER: u8 = 103;
pub const CC_LFO_FADE: u8 = 104;
pub const CC_LFO_DESTINATION: u8 = 105;
pub const CC_LFO_WAVEFORM: u8 = 106;
pub const CC_LFO_START_PHASE: u8 = 107;
pub const CC_LFO_MODE: u8 = 108;
pub const CC_LFO_DEPTH: u8 = 109;

/// Trigger note sent as note-on immediately followed by note-off.
pub const TRIGGER_NOTE: u8 = 60;
pub const TRIGGER_VELOCITY: u8 = 100;

/// Offset-encode a signed parameter into its 7-bit CC value.
pub fn encode_signed(value: i32) -> u8 {
    (value + 64).clamp(0, 127) as u8
}

/// Multiplier CC value is the index into the hardware's multiplier table.
pub fn encode_multiplier(multiplier: u32) -> u8 {
    MULTIPLIERS
        .iter()
        .position(|m| *m == multiplier)
        .unwrap_or(0) as u8
}

/// The CC sequence that pushes one full LFO config to the device. Pure, so
/// the exact wire traffic is testable without a connection.
pub fn config_cc_messages(channel: u8, config: &LfoConfig) -> Vec<[u8; 3]> {
    let status = 0xB0 | (channel & 0x0F);
    vec![
        [status, CC_LFO_SPEED, encode_signed(config.speed.round() as i32)],
        [status, CC_LFO_MULTIPLIER, encode_multiplier(config.multiplier)],
        [status, CC_LFO_FADE, encode_signed(config.fade)],
        [status, CC_LFO_WAVEFORM, config.waveform.to_cc()],
        [status, CC_LFO_START_PHASE, config.start_phase.min(127)],
        [status, CC_LFO_MODE, config.mode.to_cc()],
        [status, CC_LFO_DEPTH, encode_signed(config.depth)],
    ]
}

/// MIDI device info
pub struct OutputDevice {
    pub name: String,
    pub port: MidiOutputPort,
}

pub struct InputDevice {
    pub name: String,
    pub port: MidiInputPort,
}

/// Outbound half: parameter pushes and triggers.
pub struct ControlOut {
    connection: Option<MidiOutputConnection>,
}

impl ControlOut {
    pub fn new() -> Self {
        Self { connection: None }
    }

    /// List available MIDI output devices
    pub fn list_devices() -> Result<Vec<OutputDevice>, Box<dyn std::error::Error>> {
        let midi_out = MidiOutput::new("Lfolab MIDI Scanner")?;
        let mut devices = Vec::new();
        for port in midi_out.ports() {
            let name = midi_out.port_name(&port)?;
            devices.push(OutputDevice { name, port });
        }
        Ok(devices)
    }

    /// Connect to a MIDI output device by (partial) name
    pub fn connect(&mut self, device_name: &str) -> Result<(), Box<dyn std::error::Error>> {
        let device = Self::list_devices()?
            .into_iter()
            .find(|d| d.name.contains(device_name))
            .ok_or_else(|| format!("MIDI output device '{device_name}' not found"))?;

        let midi_out = MidiOutput::new("Lfolab Control Out")?;
        self.connection = Some(midi_out.connect(&device.port, "lfolab-control")?);
        debug!("connected control output to '{}'", device.name);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        match &mut self.connection {
            Some(conn) => {
                conn.send(bytes)?;
                Ok(())
            }
            None => Err("Not connected to a MIDI output device".into()),
        }
    }

    /// Send a single CC message
    pub fn send_cc(&mut self, channel: u8, cc: u8, value: u8) -> Result<(), Box<dyn std::error::Error>> {
        self.send(&[0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F])
    }

    /// Push a full LFO configuration as a CC sequence.
    pub fn push_config(&mut self, channel: u8, config: &LfoConfig) -> Result<(), Box<dyn std::error::Error>> {
        for msg in config_cc_messages(channel, config) {
            self.send(&msg)?;
        }
        Ok(())
    }

    /// Route the LFO to a destination so its output shows up on the tap CC.
    pub fn set_destination(&mut self, channel: u8, destination: u8) -> Result<(), Box<dyn std::error::Error>> {
        self.send_cc(channel, CC_LFO_DESTINATION, destination)
    }

    /// Fire one trigger event: note-on immediately followed by note-off.
    pub fn trigger(&mut self, channel: u8) -> Result<(), Box<dyn std::error::Error>> {
        let ch = channel & 0x0F;
        self.send(&[0x90 | ch, TRIGGER_NOTE, TRIGGER_VELOCITY])?;
        self.send(&[0x80 | ch, TRIGGER_NOTE, 0])?;
        Ok(())
    }
}

impl Default for ControlOut {
    fn default() -> Self {
        Self::new()
    }
}

/// Inbound half: captures the device's modulation-output CC stream.
///
/// The midir callback runs on its own thread; it appends into a shared
/// buffer while the gate is open. `end_capture` drains and sorts.
pub struct CaptureIn {
    connection: Option<MidiInputConnection<()>>,
    points: Arc<Mutex<Vec<CapturedPoint>>>,
    gate: Arc<AtomicBool>,
    watch_channel: u8,
    watch_cc: u8,
}

impl CaptureIn {
    pub fn new(watch_channel: u8, watch_cc: u8) -> Self {
        Self {
            connection: None,
            points: Arc::new(Mutex::new(Vec::new())),
            gate: Arc::new(AtomicBool::new(false)),
            watch_channel: watch_channel & 0x0F,
            watch_cc: watch_cc & 0x7F,
        }
    }

    /// List available MIDI input devices
    pub fn list_devices() -> Result<Vec<InputDevice>, Box<dyn std::error::Error>> {
        let midi_in = MidiInput::new("Lfolab MIDI Scanner")?;
        let mut devices = Vec::new();
        for port in midi_in.ports() {
            let name = midi_in.port_name(&port)?;
            devices.push(InputDevice { name, port });
        }
        Ok(devices)
    }

    /// Connect to a MIDI input device by (partial) name
    pub fn connect(&mut self, device_name: &str) -> Result<(), Box<dyn std::error::Error>> {
        let device = Self::list_devices()?
            .into_iter()
            .find(|d| d.name.contains(device_name))
            .ok_or_else(|| format!("MIDI input device '{device_name}' not found"))?;

        let midi_in = MidiInput::new("Lfolab Capture In")?;
        let points = Arc::clone(&self.points);
        let gate = Arc::clone(&self.gate);
        let watch_channel = self.watch_channel;
        let watch_cc = self.watch_cc;

        let connection = midi_in.connect(
            &device.port,
            "lfolab-capture",
            move |timestamp_us, message, _| {
                if !gate.load(Ordering::Relaxed) {
                    return;
                }
                if let Some(point) = parse_watched_cc(message, watch_channel, watch_cc, timestamp_us) {
                    match points.lock() {
                        Ok(mut buf) => buf.push(point),
                        Err(_) => warn!("capture buffer poisoned; dropping point"),
                    }
                }
            },
            (),
        )?;
        self.connection = Some(connection);
        debug!("connected capture input to '{}'", device.name);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Open the capture gate; anything already buffered is discarded.
    pub fn begin_capture(&self) {
        if let Ok(mut buf) = self.points.lock() {
            buf.clear();
        }
        self.gate.store(true, Ordering::Relaxed);
    }

    /// Close the gate and drain the capture, sorted by device timestamp.
    pub fn end_capture(&self) -> Vec<CapturedPoint> {
        self.gate.store(false, Ordering::Relaxed);
        let mut points = match self.points.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(_) => Vec::new(),
        };
        crate::capture::sort_by_timestamp(&mut points);
        points
    }
}

/// Parse a raw MIDI message into a captured point if it is a CC on the
/// watched channel/controller.
pub fn parse_watched_cc(
    message: &[u8],
    watch_channel: u8,
    watch_cc: u8,
    timestamp_us: u64,
) -> Option<CapturedPoint> {
    if message.len() < 3 {
        return None;
    }
    let status = message[0];
    if status & 0xF0 != 0xB0 || status & 0x0F != watch_channel {
        return None;
    }
    if message[1] != watch_cc {
        return None;
    }
    Some(CapturedPoint {
        timestamp_us,
        value: message[2] & 0x7F,
    })
}
