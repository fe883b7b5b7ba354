use assert_cmd::cargo::CommandCargoExt;
use assert_cmd::Command;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::str;

fn fixture() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures/DOL.txt");
    path
}

/// Run dolgeo with exactly the given arguments.
fn run_dolgeo_raw(args: &[&str]) -> std::process::Output {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("dolgeo").unwrap();
    cmd.env_remove("DOLGEO_FORMAT")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to execute")
}

/// Run dolgeo with color and log noise turned off.
fn run_dolgeo(args: &[&str]) -> std::process::Output {
    let mut test_args = vec!["--color", "never", "--log-level", "off"];
    test_args.extend_from_slice(args);
    run_dolgeo_raw(&test_args)
}

fn stdout_of(output: &std::process::Output) -> String {
    str::from_utf8(&output.stdout)
        .expect("Failed to read stdout as UTF-8")
        .to_string()
}

fn temp_log(text: &str) -> tempfile::NamedTempFile {
    temp_log_bytes(text.as_bytes())
}

fn temp_log_bytes(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
}

/// A GEO response too close to the top, then a good one
const SKIPPABLE_LOG: &str = "a\nb\nc\nGEO response \"CountryCode\":\"US\" 8.8.8.8\n\
                             Time: t\n-\n-\n-\n-\nGEO response \"CountryCode\":\"NL\" 9.9.9.9\n";

/// One Delivery Optimization record per address, each a GEO response
fn geo_log(count: usize) -> String {
    let mut text = String::new();
    for i in 0..count {
        text.push_str(&format!(
            "TimeCreated : 3/5/2021 9:{:02}:{:02} AM\n-\n-\n-\n-\n",
            (i / 60) % 60,
            i % 60
        ));
        text.push_str(&format!(
            "Message : GEO response: \
             {{\"ExternalIpAddress\":\"10.{}.{}.{}\",\"CountryCode\":\"US\"}}\n",
            (i >> 16) & 0xff,
            (i >> 8) & 0xff,
            i & 0xff
        ));
    }
    text
}

/// Default table report over the fixture log
#[test]
fn table_report() {
    let src = fixture();
    let output = run_dolgeo(&["-s", src.to_str().unwrap()]);
    assert!(output.status.success());

    let canonical = src.canonicalize().unwrap();
    let expected = format!(
        "\
User Input
----------
File Selection:  {}
+--------------+--------------+-------------+
| IP Address   | Country Code | Occurrences |
+--------------+--------------+-------------+
| 73.162.10.25 | US           | 2           |
| 98.76.54.32  | CA           | 1           |
+--------------+--------------+-------------+
Program Terminated Normally
",
        canonical.display()
    );
    assert_eq!(stdout_of(&output), expected);
}

/// Secondary listing for an address seen twice
#[test]
fn address_report() {
    let src = fixture();
    let output = run_dolgeo(&["-s", src.to_str().unwrap(), "-a", "73.162.10.25"]);
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    let secondary = "\
Results for 73.162.10.25
+---+--------------+---------------------+
| # | IP Address   | Date/Time           |
+---+--------------+---------------------+
| 1 | 73.162.10.25 | 3/5/2021 9:41:07 AM |
| 2 | 73.162.10.25 | 3/6/2021 8:05:19 AM |
+---+--------------+---------------------+
Program Terminated Normally
";
    assert!(stdout.ends_with(secondary), "unexpected output: {stdout}");
}

/// Unknown address gives an empty listing and a normal exit
#[test]
fn unknown_address() {
    let src = fixture();
    let output = run_dolgeo(&["-s", src.to_str().unwrap(), "-a", "1.1.1.1", "-f", "plain"]);
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("Results for 1.1.1.1\n"));
    assert!(!stdout.contains("|  1 |"));
    assert!(stdout.ends_with("Program Terminated Normally\n"));
}

/// Plain and table modes carry the same information
#[test]
fn plain_report() {
    let src = fixture();
    let output = run_dolgeo(&["-s", src.to_str().unwrap(), "--format", "plain"]);
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains(
        "IP:             73.162.10.25\nCountry Code:   US\nOccurrences:    2\n"
    ));
    assert!(stdout.contains(
        "IP:             98.76.54.32\nCountry Code:   CA\nOccurrences:    1\n"
    ));
    assert!(!stdout.contains("+--"));
}

#[test]
fn json_report() {
    let src = fixture();
    let output = run_dolgeo(&["-s", src.to_str().unwrap(), "-f", "json", "-a", "98.76.54.32"]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(value["records"].as_array().unwrap().len(), 2);
    assert_eq!(value["timestamps"][0]["timestamp"], "3/5/2021 2:13:55 PM");
    assert_eq!(value["timestamps"][0]["seq"], 2);
}

/// Log with no GEO responses prints an empty table
#[test]
fn empty_log() {
    let log = temp_log("TimeCreated : 3/5/2021 9:41:07 AM\nMessage : nothing here\n");
    let output = run_dolgeo(&["-s", log.path().to_str().unwrap()]);
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains(
        "+------------+--------------+-------------+\n\
         | IP Address | Country Code | Occurrences |\n\
         +------------+--------------+-------------+\n\
         Program Terminated Normally\n"
    ));
}

/// Missing source is a usage error before any processing
#[test]
fn missing_source() {
    let output = run_dolgeo(&["-s", "/no/such/DOL.txt"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("File does not exist"), "stderr: {stderr}");
}

#[test]
fn source_is_required() {
    let output = run_dolgeo(&[]);
    assert_eq!(output.status.code(), Some(2));
}

/// GEO response too close to the top of the file aborts with the line index
#[test]
fn malformed_line_aborts() {
    let log = temp_log("a\nb\nc\nGEO response \"CountryCode\":\"US\" 8.8.8.8\n");
    let output = run_dolgeo(&["-s", log.path().to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("extraction failed at line 3"), "stderr: {stderr}");
}

#[test]
fn malformed_line_skipped() {
    let log = temp_log(SKIPPABLE_LOG);
    let output = run_dolgeo(&["-s", log.path().to_str().unwrap(), "--skip-malformed"]);
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("| 9.9.9.9    | NL           | 1           |"));
    assert!(!stdout.contains("8.8.8.8"));
}

#[test]
fn custom_offset_and_marker() {
    let log = temp_log("When: noon\nGEO answer \"CountryCode\":\"JP\" 4.4.4.4\n");
    let output = run_dolgeo(&[
        "-s",
        log.path().to_str().unwrap(),
        "--timestamp-offset",
        "1",
        "--marker",
        "GEO answer",
        "-a",
        "4.4.4.4",
    ]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("| 1 | 4.4.4.4    | noon      |"));
}

/// Skipped lines are reported on stderr with their index and reason
#[test]
fn malformed_line_skipped_warns() {
    let log = temp_log(SKIPPABLE_LOG);
    let path = log.path().to_str().unwrap();
    let output = run_dolgeo_raw(&["-s", path, "--color", "never", "--skip-malformed"]);
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(
            "skipping malformed line: extraction failed at line 3: timestamp line 5 lines back"
        ),
        "stderr: {stderr}"
    );
    assert!(stderr.contains("WARN"), "stderr: {stderr}");
}

/// Invalid UTF-8 in the log does not stop extraction
#[test]
fn invalid_utf8_log() {
    let mut bytes = b"TimeCreated : 3/5/2021 9:41:07 AM\n\xff\n-\n-\n-\n".to_vec();
    bytes.extend_from_slice(
        b"Message : \xfe GEO response: \
          {\"ExternalIpAddress\":\"1.2.3.4\",\"CountryCode\":\"SE\"}\n",
    );
    let log = temp_log_bytes(&bytes);
    let output = run_dolgeo(&["-s", log.path().to_str().unwrap(), "-a", "1.2.3.4"]);
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("| 1.2.3.4    | SE           | 1           |"));
    assert!(stdout.contains("| 1 | 1.2.3.4    | 3/5/2021 9:41:07 AM |"));
}

/// Old Mac style line endings split like any other
#[test]
fn carriage_return_only_log() {
    let log = temp_log(&geo_log(2).replace('\n', "\r"));
    let output = run_dolgeo(&["-s", log.path().to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout_of(&output).contains("| 10.0.0.1   | US           | 1           |"));
}

/// Forced color wraps the table headers in bold escapes
#[test]
fn color_always_bolds_headers() {
    let src = fixture();
    let path = src.to_str().unwrap();
    let output = run_dolgeo_raw(&["-s", path, "--color", "always", "--log-level", "off"]);
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("\x1b[1m"), "stdout: {stdout:?}");
    assert!(stdout.contains("IP Address  \x1b[0m"), "stdout: {stdout:?}");

    let plain = run_dolgeo_raw(&["-s", path, "--color", "never", "--log-level", "off"]);
    assert!(!stdout_of(&plain).contains('\x1b'));
}

/// A reader that goes away early is not an error, in any format
#[test]
fn closed_stdout_is_not_an_error() {
    let log = temp_log(&geo_log(5000));
    let path = log.path().to_str().unwrap();

    for format in ["json", "table", "plain"] {
        let mut child = std::process::Command::cargo_bin("dolgeo")
            .unwrap()
            .env_remove("DOLGEO_FORMAT")
            .env_remove("RUST_LOG")
            .args(["-s", path, "-f", format, "--log-level", "off"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn");

        // close the read end before the report is written
        drop(child.stdout.take());
        let output = child.wait_with_output().expect("failed to wait");

        assert!(
            output.status.success(),
            "{format}: stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(output.stderr.is_empty(), "{format}");
    }
}
