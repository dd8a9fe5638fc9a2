use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn murmur_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_murmur").expect("murmur test binary not built")
}

#[test]
fn murmur_help_mentions_name() {
    let output = Command::new(murmur_bin())
        .arg("--help")
        .output()
        .expect("run murmur --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("murmur"));
    assert!(combined.contains("--clips-dir"));
}

#[test]
fn murmur_list_input_devices_uses_test_override() {
    let output = Command::new(murmur_bin())
        .arg("--list-input-devices")
        .env("MURMUR_TEST_DEVICES", "Desk Mic, Room Mic")
        .output()
        .expect("run murmur --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Available audio input devices"));
    assert!(combined.contains("Room Mic"));
}

#[test]
fn murmur_list_output_devices_prints_message() {
    let output = Command::new(murmur_bin())
        .arg("--list-output-devices")
        .output()
        .expect("run murmur --list-output-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("audio output devices")
            || combined.contains("Failed to list audio output devices")
    );
}

#[test]
fn murmur_rejects_invalid_channel_count() {
    let output = Command::new(murmur_bin())
        .args(["--channels", "0", "--no-logs"])
        .output()
        .expect("run murmur --channels 0");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--channels"));
}
