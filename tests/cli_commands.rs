use mpyfs::cli::Command;
use mpyfs::commands::{self, execute};
use mpyfs::{
    BoardFs, ConnectionParams, DeviceClient, ProtocolTiming, SerialPortInfo, SimulatedDevice,
};
use mpyfs_communication::DeviceReply;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn board(device: &SimulatedDevice) -> BoardFs {
    BoardFs::new(DeviceClient::new(
        Arc::new(device.clone()),
        ConnectionParams::new(device.name()),
        ProtocolTiming::fast().with_marker_deadline(Duration::from_millis(100)),
    ))
}

fn run(device: &SimulatedDevice, command: Command) -> anyhow::Result<String> {
    let mut out = Vec::new();
    execute(&command, &board(device), &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn test_ls_prints_one_name_per_line() {
    let device = SimulatedDevice::with_reply("sim", DeviceReply::marker(r#"["boot.py","lib"]"#));
    let out = run(&device, Command::Ls { path: "/".to_string() }).unwrap();
    assert_eq!(out, "boot.py\nlib");
}

#[test]
fn test_ls_typed_prints_json() {
    let device = SimulatedDevice::with_reply(
        "sim",
        DeviceReply::marker(r#"[{"name":"lib","isDir":true}]"#),
    );
    let out = run(&device, Command::LsTyped { path: "/".to_string() }).unwrap();
    assert_eq!(out.trim(), r#"[{"name":"lib","isDir":true}]"#);
}

#[test]
fn test_file_info_tokens() {
    let device = SimulatedDevice::with_reply("sim", DeviceReply::marker("32768|42|file|ro"));
    let out = run(&device, Command::FileInfo { path: "/a".to_string() }).unwrap();
    assert_eq!(out, "32768|42|file|ro");

    let device = SimulatedDevice::with_reply("sim", DeviceReply::marker("error:ENOENT"));
    let out = run(&device, Command::FileInfo { path: "/a".to_string() }).unwrap();
    assert_eq!(out, "error:ENOENT");
}

#[test]
fn test_file_exists_without_answer_is_not_exists() {
    let device = SimulatedDevice::with_reply("sim", DeviceReply::silent());
    let out = run(&device, Command::FileExists { path: "/a".to_string() }).unwrap();
    assert_eq!(out, "not_exists");
}

#[test]
fn test_wipe_path_fallback_report() {
    let device = SimulatedDevice::with_reply("sim", DeviceReply::silent());
    let out = run(&device, Command::WipePath { path: "/".to_string() }).unwrap();
    let report: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["errors"][0], "wipe_failed");
    assert_eq!(report["error_count"], 1);
}

#[test]
fn test_cp_from_writes_local_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dst = temp_dir.path().join("main.py");
    let device = SimulatedDevice::with_reply("sim", DeviceReply::marker("cHJpbnQoMSk=\n"));

    run(
        &device,
        Command::CpFrom {
            src: "/main.py".to_string(),
            dst: dst.clone(),
        },
    )
    .unwrap();

    assert_eq!(std::fs::read(&dst).unwrap(), b"print(1)".to_vec());
}

#[test]
fn test_run_file_prints_output_verbatim() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let src = temp_dir.path().join("hello.py");
    std::fs::write(&src, "print('hello')").unwrap();
    let device = SimulatedDevice::with_reply("sim", DeviceReply::immediate("hello\r\n"));

    let out = run(&device, Command::RunFile { src }).unwrap();

    assert!(out.contains("hello\r\n"));
    assert_eq!(device.programs(), vec!["print('hello')".to_string()]);
}

#[test]
fn test_exit_codes() {
    let device = SimulatedDevice::with_reply("sim", DeviceReply::silent());
    assert!(commands::connection_params(&mpyfs::Config::default()).is_err());

    let busy = {
        use mpyfs_communication::PortOpener;
        let _port = device.open(&ConnectionParams::new("sim")).unwrap();
        run(&device, Command::Mkdir { path: "/d".to_string() }).unwrap_err()
    };
    assert_eq!(commands::exit_code(&busy), 2);
    assert!(commands::guidance(&busy).contains("busy"));

    let missing = run(&device, Command::Mv { src: "/a".to_string(), dst: "/b".to_string() })
        .unwrap_err();
    assert_eq!(commands::exit_code(&missing), 1);
}

#[test]
fn test_devs_output_formats() {
    let ports = vec![
        SerialPortInfo::new("/dev/ttyACM0", "USB MicroPython Board in FS mode")
            .with_manufacturer("MicroPython")
            .with_serial_number("e6614c311b4f")
            .with_usb_ids(0x2e8a, 0x0005),
        SerialPortInfo::new("/dev/ttyS0", "Serial Port"),
    ];

    let mut out = Vec::new();
    commands::write_ports(&ports, false, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "/dev/ttyACM0\n/dev/ttyS0");

    let mut out = Vec::new();
    commands::write_ports(&ports, true, &mut out).unwrap();
    let listed: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(listed[0]["manufacturer"], "MicroPython");
    assert_eq!(listed[0]["serial_number"], "e6614c311b4f");
    assert_eq!(listed[0]["vid"], 0x2e8a);
    assert_eq!(listed[0]["pid"], 5);
    assert_eq!(listed[1]["description"], "Serial Port");
    assert!(listed[1]["vid"].is_null());
}
