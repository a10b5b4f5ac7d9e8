//! Scanner line in, label out: the whole server over loopback sockets

mod common;

use common::{FakePrinter, eventually, fast_client};
use label_server::{BackgroundTasks, Config, PrinterRegistry, ServerState};
use serde_json::json;
use shared::models::{PrinterRecord, ScanEvent, ScanStatus};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn config(dir: &std::path::Path) -> Config {
    let mut config = Config::with_work_dir(dir);
    config.printer = fast_client();
    config.scanner.reconnect_delay = Duration::from_millis(50);
    config.scanner.health_interval = Duration::from_millis(100);
    config.shutdown_timeout_ms = 2000;
    config
}

#[tokio::test]
async fn test_scan_prints_configured_label() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let printer = FakePrinter::start().await;
    let scanner = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let scanner_addr = scanner.local_addr().unwrap().to_string();

    let registry = PrinterRegistry::new(&config.printers_file);
    registry.set(
        "printer_1",
        PrinterRecord {
            ip: printer.address.clone(),
            name: "Packline 1".into(),
            ..Default::default()
        },
    );
    registry.persist().await.unwrap();

    std::fs::write(
        &config.scanners_file,
        json!([{
            "id": "s1",
            "name": "Dock 1",
            "connection_type": "network",
            "connection_string": scanner_addr,
        }])
        .to_string(),
    )
    .unwrap();

    std::fs::write(
        &config.scan_configs_file,
        json!({
            "s1": {
                "A-01": [{
                    "group_name": "Line 1",
                    "printer_id": "printer_1",
                    "template_name": "PTI case",
                    "label_width": 812,
                    "label_height": 406,
                    "copies": 2,
                    "lot_number": "L1",
                    "product": {"gtin": "00012345678905", "product_description": "Roma Tomatoes"},
                    "elements": [
                        {"type": "text", "x": 20, "y": 20, "fontSize": 30, "text": "{{product.description}}"},
                        {"type": "barcode-gs1-128", "x": 20, "y": 80, "data": "(01){{product.gtin}}(10){{lot_number}}"},
                        {"type": "voicepick", "x": 600, "y": 20, "text": "{{voice_pick}}"}
                    ]
                }]
            }
        })
        .to_string(),
    )
    .unwrap();

    let shutdown = CancellationToken::new();
    let mut tasks = BackgroundTasks::with_token(shutdown.clone());
    let (state, events) = ServerState::initialize(&config, shutdown).unwrap();
    assert_eq!(state.registry.len(), 1);

    let scanner_task = tokio::spawn(async move {
        let (mut socket, _) = scanner.accept().await.unwrap();
        socket.write_all(b"0000star;QR Code;A-01stop;\r\n").await.unwrap();
        // Hold the connection open until the test ends
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let attempted = state.start(&mut tasks, events).await.unwrap();
    assert_eq!(attempted, 1);
    assert!(state.scanners.is_connected("s1"));

    eventually(|| printer.job_count() == 1).await;
    let job = &printer.jobs()[0];
    assert!(job.starts_with("^XA\n^PW812\n^LL406\n"));
    assert!(job.contains("^PQ2,0,0,N"));
    assert!(job.contains("^FDRoma Tomatoes^FS"));
    assert!(job.contains("^FD>;>8010001234567890510L1^FS"));
    assert!(job.ends_with("^XZ"));

    let events_file = config.scan_events_file.clone();
    eventually(|| {
        std::fs::read_to_string(&events_file)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    })
    .await;
    let logged: ScanEvent =
        serde_json::from_str(std::fs::read_to_string(&events_file).unwrap().lines().next().unwrap())
            .unwrap();
    assert_eq!(logged.scanner_id, "s1");
    assert_eq!(logged.license_plate_code, "A-01");
    assert_eq!(logged.status, ScanStatus::Success);
    assert_eq!(logged.labels_printed, 2);

    state.shutdown(tasks).await;
    scanner_task.abort();
}

#[tokio::test]
async fn test_unknown_code_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let printer = FakePrinter::start().await;

    let registry = PrinterRegistry::new(&config.printers_file);
    registry.set(
        "printer_1",
        PrinterRecord {
            ip: printer.address.clone(),
            name: "Packline 1".into(),
            ..Default::default()
        },
    );
    registry.persist().await.unwrap();

    std::fs::write(
        &config.scan_configs_file,
        json!({
            "s1": {
                "DEFAULT": [{
                    "group_name": "Fallback",
                    "printer_id": "printer_1",
                    "label_width": 812,
                    "label_height": 406,
                    "elements": [{"type": "text", "x": 10, "y": 10, "text": "{{lot_number|NO LOT}}"}]
                }]
            }
        })
        .to_string(),
    )
    .unwrap();

    let (state, _events) = ServerState::initialize(&config, CancellationToken::new()).unwrap();

    let outcome = state.router.handle("s1", "star;Z-99stop;").await;
    assert!(outcome.success);
    assert_eq!(outcome.status, Some(ScanStatus::Success));
    assert_eq!(outcome.labels_printed, 1);
    eventually(|| printer.job_count() == 1).await;
    assert!(printer.jobs()[0].contains("^FDNO LOT^FS"));

    let outcome = state.router.handle("s2", "star;Z-99stop;").await;
    assert_eq!(outcome.status, Some(ScanStatus::NoConfig));
}
