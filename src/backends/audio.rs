// SPDX-License-Identifier: GPL-3.0-only

//! Audio device enumeration for ALSA

use crate::config::AudioDeviceId;
use std::process::Command;
use tracing::{debug, warn};

/// Represents an audio capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub id: AudioDeviceId,
    pub name: String,
}

/// Enumerate capture devices with `arecord -l`
pub fn enumerate_audio_devices(arecord: &str) -> Vec<AudioDevice> {
    let output = match Command::new(arecord).arg("-l").output() {
        Ok(output) => output,
        Err(e) => {
            warn!("Failed to run {}: {}", arecord, e);
            return Vec::new();
        }
    };

    if !output.status.success() {
        warn!("{} -l command failed", arecord);
        return Vec::new();
    }

    let devices = parse_arecord_list(&String::from_utf8_lossy(&output.stdout));
    debug!(count = devices.len(), "Enumerated ALSA capture devices");
    devices
}

/// Parse `arecord -l` output
///
/// Example format:
/// ```text
/// **** List of CAPTURE Hardware Devices ****
/// card 1: Device [USB Audio Device], device 0: USB Audio [USB Audio]
///   Subdevices: 1/1
/// ```
pub fn parse_arecord_list(stdout: &str) -> Vec<AudioDevice> {
    stdout.lines().filter_map(parse_card_line).collect()
}

fn parse_card_line(line: &str) -> Option<AudioDevice> {
    let rest = line.trim().strip_prefix("card ")?;
    let (card, rest) = rest.split_once(':')?;
    let card: u32 = card.trim().parse().ok()?;

    let (card_desc, rest) = rest.split_once(", device ")?;
    let (device, device_desc) = rest.split_once(':')?;
    let device: u32 = device.trim().parse().ok()?;

    // Prefer the bracketed long name of the card
    let name = bracketed(card_desc)
        .or_else(|| bracketed(device_desc))
        .unwrap_or_else(|| card_desc.trim())
        .to_string();

    Some(AudioDevice {
        id: AudioDeviceId { card, device },
        name,
    })
}

fn bracketed(s: &str) -> Option<&str> {
    let start = s.find('[')?;
    let end = s[start + 1..].find(']')?;
    Some(&s[start + 1..start + 1 + end])
}
