use anyhow::Result;
use murmur::audio::{CpalCapture, CpalMixer};
use murmur::DeviceError;

/// Which side of the sound card to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }

    fn query(self) -> Result<Vec<String>, DeviceError> {
        match self {
            Direction::Input => CpalCapture::list_devices(),
            Direction::Output => CpalMixer::list_devices(),
        }
    }
}

/// `MURMUR_TEST_DEVICES` (comma separated) replaces the hardware query.
fn test_devices() -> Option<Vec<String>> {
    let raw = std::env::var("MURMUR_TEST_DEVICES").ok()?;
    Some(
        raw.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

pub(crate) fn device_listing(direction: Direction, devices: &[String]) -> String {
    let label = direction.label();
    if devices.is_empty() {
        return format!("No audio {label} devices detected.\n");
    }
    let mut out = format!("Available audio {label} devices:\n");
    for name in devices {
        out.push_str(&format!("  - {name}\n"));
    }
    out
}

pub(crate) fn list_devices(direction: Direction) -> Result<()> {
    let devices = test_devices().unwrap_or_else(|| {
        direction.query().unwrap_or_else(|err| {
            eprintln!("Failed to list audio {} devices: {err}", direction.label());
            Vec::new()
        })
    });
    print!("{}", device_listing(direction, &devices));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_names_every_device() {
        let devices = vec!["Built-in Mic".to_string(), "USB Mic".to_string()];
        let text = device_listing(Direction::Input, &devices);
        assert!(text.starts_with("Available audio input devices:"));
        assert!(text.contains("  - USB Mic"));
    }

    #[test]
    fn empty_listing_says_so() {
        assert_eq!(
            device_listing(Direction::Output, &[]),
            "No audio output devices detected.\n"
        );
    }
}
