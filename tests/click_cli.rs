use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_click_cli"))
}

#[test]
fn schedule_prints_timeline_as_json_lines() {
    let output = cli()
        .args(["schedule", "--bpm", "120", "--beats", "3", "--seconds", "1.8"])
        .output()
        .expect("schedule command");

    assert!(
        output.status.success(),
        "schedule exited with {:?}",
        output.status.code()
    );
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    let lines: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid JSON line"))
        .collect();

    assert_eq!(lines.len(), 4);
    let indices: Vec<u64> = lines
        .iter()
        .map(|line| line["beat_index"].as_u64().unwrap())
        .collect();
    assert_eq!(indices, [0, 1, 2, 0]);
    let times: Vec<f64> = lines
        .iter()
        .map(|line| line["time"].as_f64().unwrap())
        .collect();
    assert_eq!(times, [0.1, 0.6, 1.1, 1.6]);
    assert_eq!(lines[0]["accent"], true);
    assert_eq!(lines[1]["accent"], false);
    assert_eq!(lines[3]["bar"], 1);
    assert_eq!(lines[0]["timbre"], "digital");
}

#[test]
fn schedule_clamps_out_of_range_tempo() {
    let output = cli()
        .args(["schedule", "--bpm", "1000", "--beats", "1", "--seconds", "0.5"])
        .output()
        .expect("schedule command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    // 300 BPM: onsets at 0.1, 0.3, 0.5
    assert_eq!(stdout.lines().count(), 3);
}

#[test]
fn render_writes_wav_file() {
    let output_path =
        std::env::temp_dir().join(format!("click-cli-render-{}.wav", std::process::id()));

    let output = cli()
        .args([
            "render",
            "--bpm",
            "120",
            "--timbre",
            "woodblock",
            "--seconds",
            "1",
            "--output",
            output_path.to_str().unwrap(),
        ])
        .output()
        .expect("render command");

    assert!(
        output.status.success(),
        "render exited with {:?}",
        output.status.code()
    );
    let report: Value = serde_json::from_slice(&output.stdout).expect("render report JSON");
    assert!(report["notes_scheduled"].as_u64().unwrap_or_default() >= 2);

    let reader = hound::WavReader::open(&output_path).expect("rendered WAV");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 48000);
    let samples: Vec<f32> = reader
        .into_samples::<f32>()
        .collect::<Result<_, _>>()
        .expect("float samples");
    let _ = std::fs::remove_file(&output_path);

    assert_eq!(samples.len(), 72000);
    // Silent before the first onset at 0.1 s
    assert!(samples[..4800].iter().all(|&s| s == 0.0));
    assert!(samples.iter().any(|s| s.abs() > 0.5));
}

#[test]
fn unknown_timbre_is_rejected() {
    let output = cli()
        .args(["schedule", "--timbre", "cowbell"])
        .output()
        .expect("schedule command");
    assert!(!output.status.success());
}
