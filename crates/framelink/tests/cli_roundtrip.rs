#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/framelink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn framelink(args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_framelink"));
    command.args(["--log-level", "error"]).args(args);
    command
}

fn run_with_stdin(mut command: Command, input: Vec<u8>) -> Output {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("framelink should start");

    let mut stdin = child.stdin.take().expect("stdin should be piped");
    let writer = thread::spawn(move || {
        let _ = stdin.write_all(&input);
    });
    let output = child.wait_with_output().expect("framelink should finish");
    writer.join().expect("stdin writer should not panic");
    output
}

fn encode_file(path: &std::path::Path, extra: &[&str]) -> String {
    let mut args = vec!["encode", "--framerate", "1000"];
    args.extend_from_slice(extra);
    let output = framelink(&args)
        .arg(path)
        .output()
        .expect("encode should run");
    assert!(
        output.status.success(),
        "encode failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("frames should be text")
}

fn last_json_line(stderr: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stderr);
    let line = text
        .lines()
        .rev()
        .find(|line| line.starts_with('{'))
        .expect("stats should be printed");
    serde_json::from_str(line).expect("stats should be json")
}

#[test]
fn message_records_survive_encode_and_decode() {
    let dir = unique_temp_dir("messages");
    let records = dir.join("records.txt");
    std::fs::write(
        &records,
        "1 hello\n---\n2 {\"v\":1}\n---\n\n---\n3 no closing delimiter\n",
    )
    .expect("records should be writable");

    let frames = encode_file(&records, &[]);
    assert_eq!(frames.lines().count(), 3);

    let output = run_with_stdin(framelink(&["decode"]), frames.into_bytes());
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "1 hello\n---\n2 {\"v\":1}\n---\n3 no closing delimiter\n---\n"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn records_longer_than_a_frame_are_delivered() {
    let dir = unique_temp_dir("long");
    let records = dir.join("records.txt");
    let long = format!("{{\"data\":\"{}\"}}", "x".repeat(1024));
    std::fs::write(&records, format!("1 {long}\n---\n2 short\n---\n"))
        .expect("records should be writable");

    let frames = encode_file(&records, &[]);
    assert!(frames.lines().count() > 2);

    let output = run_with_stdin(framelink(&["decode"]), frames.into_bytes());
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        format!("1 {long}\n---\n2 short\n---\n")
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn lost_frames_are_counted_in_stats() {
    let dir = unique_temp_dir("lossy");
    let records = dir.join("records.txt");
    std::fs::write(&records, "5 one\n---\n5 two\n---\n5 three\n---\n").expect("writable");

    let frames = encode_file(&records, &[]);
    let mut lines: Vec<&str> = frames.lines().collect();
    lines.insert(1, "");
    lines.insert(3, "not-a-frame");
    let capture = lines.join("\n") + "\n";

    let output = run_with_stdin(
        framelink(&["--format", "json", "decode", "--stats", "--json"]),
        capture.into_bytes(),
    );
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let texts: Vec<String> = stdout
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).expect("json message");
            value["text"].as_str().unwrap_or_default().to_string()
        })
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);

    let stats = last_json_line(&output.stderr);
    assert_eq!(stats["frames_seen"], 5);
    assert_eq!(stats["frames_lost"], 2);
    assert_eq!(stats["messages_received"], 3);
    assert_eq!(stats["messages_lost"], 0);
    assert_eq!(stats["window_quality_percent"], 10);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn binary_lake_reassembles_out_of_order_capture() {
    let dir = unique_temp_dir("lake");
    let blob = dir.join("blob.bin");
    let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
    std::fs::write(&blob, &data).expect("blob should be writable");

    let frames = encode_file(
        &blob,
        &["--binary", "--lake", "--no-loop", "--frame-size", "64"],
    );
    let mut lines: Vec<&str> = frames.lines().collect();
    assert_eq!(lines.len(), 1000usize.div_ceil(64 - 15));
    lines.reverse();
    let capture = lines.join("\n") + "\n";

    let output = run_with_stdin(
        framelink(&["--format", "json", "decode", "--binary", "--stats"]),
        capture.into_bytes(),
    );
    assert!(output.status.success());
    assert_eq!(output.stdout, data);

    let stats = last_json_line(&output.stderr);
    assert_eq!(stats["mode"], "lake");
    assert_eq!(stats["lake_complete"], true);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn pipe_mode_stops_at_end_of_transmission() {
    let mut input = b"1 first\n---\n2 second\n---\n".to_vec();
    input.push(0x04);
    input.extend_from_slice(b"3 after the marker\n---\n");

    let output = run_with_stdin(
        framelink(&["encode", "--pipe", "--framerate", "1000"]),
        input,
    );
    assert!(
        output.status.success(),
        "encode failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let frames = String::from_utf8(output.stdout).expect("frames should be text");
    assert_eq!(frames.lines().count(), 2);

    let decoded = run_with_stdin(framelink(&["decode"]), frames.into_bytes());
    assert_eq!(
        String::from_utf8_lossy(&decoded.stdout),
        "1 first\n---\n2 second\n---\n"
    );
}

#[test]
fn schema_directory_filters_records() {
    let dir = unique_temp_dir("schemas");
    let schema_dir = dir.join("schemas");
    std::fs::create_dir_all(&schema_dir).expect("schema dir should be creatable");
    std::fs::write(
        schema_dir.join("schema_1.schema.json"),
        r#"{
            "type": "object",
            "properties": { "ok": { "type": "boolean" } },
            "required": ["ok"]
        }"#,
    )
    .expect("schema should be writable");
    let records = dir.join("records.txt");
    std::fs::write(
        &records,
        "1 {\"ok\":true}\n---\n1 {\"nope\":1}\n---\n2 {\"ok\":true}\n---\n",
    )
    .expect("records should be writable");

    let output = framelink(&["--format", "json", "encode", "--framerate", "1000", "--stats"])
        .arg("--schemas")
        .arg(&schema_dir)
        .arg(&records)
        .output()
        .expect("encode should run");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 1);

    let stats = last_json_line(&output.stderr);
    assert_eq!(stats["frames_sent"], 1);
    assert_eq!(stats["discarded_records"], 2);

    let _ = std::fs::remove_dir_all(&dir);
}
