use std::fs;
use std::io::Write;
use std::time::Duration;

use panima::configuration::Config;
use panima::controller::Controller;
use panima::data_capture::types::FilterSet;
use panima::error_handling::types::{ControllerError, SessionError};
use serde_json::Value;
use tempfile::NamedTempFile;

const LOG: &str = r#"{"method":"Network.requestWillBeSent","params":{"requestId":"1","request":{"url":"https://site.test/","method":"GET","headers":{"Accept":"text/html"}},"timestamp":10.0}}
{"method":"Network.responseReceived","params":{"requestId":"1","type":"Document","response":{"url":"https://site.test/","status":200,"statusText":"OK","mimeType":"text/html","protocol":"h2"}}}
{"method":"Network.loadingFinished","params":{"requestId":"1"}}
{"method":"Network.requestWillBeSent","params":{"requestId":"2","request":{"url":"https://site.test/static/app.js?v=3","method":"GET"},"timestamp":10.5}}
{"method":"Network.responseReceived","params":{"requestId":"2","type":"Script","response":{"url":"https://site.test/static/app.js?v=3","status":200,"statusText":"OK","mimeType":"application/javascript"}}}
{"method":"Network.loadingFinished","params":{"requestId":"2"}}
{"method":"Network.requestWillBeSent","params":{"requestId":"3","request":{"url":"wss://site.test/live","method":"GET"},"timestamp":11.0}}
{"method":"Network.webSocketFrameSent","params":{"requestId":"3","timestamp":11.1,"response":{"opcode":1,"mask":true,"payloadData":"ping"}}}
{"method":"Network.webSocketFrameReceived","params":{"requestId":"3","timestamp":11.2,"response":{"opcode":1,"mask":false,"payloadData":"pong"}}}
{"method":"Network.requestWillBeSent","params":{"requestId":"4","request":{"url":"https://site.test/logo.png","method":"GET"},"timestamp":12.0}}
{"method":"Network.responseReceived","params":{"requestId":"4","type":"Image","response":{"url":"https://site.test/logo.png","status":200,"statusText":"OK","mimeType":"image/png"}}}
{"method":"Network.loadingFinished","params":{"requestId":"4"}}
{"method":"Network.getResponseBody","params":{"requestId":"1"},"result":{"body":"<html></html>","base64Encoded":false}}
{"method":"Network.getResponseBody","params":{"requestId":"2"},"result":{"body":"Y29uc29sZS5sb2coMSk=","base64Encoded":true}}
{"method":"Network.getResponseBody","params":{"requestId":"4"},"error":{"code":-32000,"message":"No resource with given identifier found"}}
"#;

fn u16_at(buf: &[u8], at: usize) -> usize {
    u16::from_le_bytes([buf[at], buf[at + 1]]) as usize
}

fn u32_at(buf: &[u8], at: usize) -> usize {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]) as usize
}

/// Lists `(name, data)` pairs through the central directory.
fn unzip(buf: &[u8]) -> Vec<(String, Vec<u8>)> {
    let eocd = buf.len() - 22;
    assert_eq!(&buf[eocd..eocd + 4], b"PK\x05\x06");
    let count = u16_at(buf, eocd + 10);
    let mut at = u32_at(buf, eocd + 16);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        assert_eq!(&buf[at..at + 4], b"PK\x01\x02");
        let size = u32_at(buf, at + 20);
        let name_len = u16_at(buf, at + 28);
        let local = u32_at(buf, at + 42);
        let name = String::from_utf8(buf[at + 46..at + 46 + name_len].to_vec()).unwrap();

        assert_eq!(&buf[local..local + 4], b"PK\x03\x04");
        let data_start = local + 30 + u16_at(buf, local + 26);
        entries.push((name, buf[data_start..data_start + size].to_vec()));
        at += 46 + name_len;
    }
    entries
}

#[tokio::test]
async fn replayed_capture_produces_archive() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut log = NamedTempFile::new().unwrap();
    log.write_all(LOG.as_bytes()).unwrap();
    let out = tempfile::tempdir().unwrap();
    let config = Config {
        output_dir: out.path().join("archives"),
        replay_log: Some(log.path().to_path_buf()),
        archive_prefix: "flow".to_string(),
        ..Default::default()
    };

    let (controller, handle) = Controller::from_config(config).unwrap();
    let task = tokio::spawn(controller.run());

    let filters: FilterSet = "js,html,packets".parse().unwrap();
    handle.start(filters).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let report = handle.stop().await.unwrap();

    assert!(report.file_name.starts_with("flow_"));
    assert_eq!(report.path, out.path().join("archives").join(&report.file_name));

    let entries = unzip(&fs::read(&report.path).unwrap());
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(entries.len(), 3, "entries: {:?}", names);
    assert!(names.contains(&"site.test/index.html"));
    let js = names
        .iter()
        .find(|n| n.starts_with("site.test/static/app.js__q"))
        .copied()
        .unwrap();
    let (_, js_bytes) = entries.iter().find(|(n, _)| n == js).unwrap();
    assert_eq!(js_bytes, b"console.log(1)");
    assert_eq!(names[2], "packets/requests.json");

    let manifest: Value = serde_json::from_slice(&entries[2].1).unwrap();
    assert!(manifest["createdAt"].is_string());
    let items = manifest["items"].as_array().unwrap();
    let ids: Vec<&str> = items
        .iter()
        .map(|i| i["requestId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);

    assert_eq!(items[0]["response"]["category"], "html");
    assert_eq!(items[0]["request"]["headers"]["Accept"], "text/html");
    assert!(items[2]["response"].is_null());
    let frames = items[2]["websocket"].as_array().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["direction"], "sent");
    assert_eq!(frames[1]["payloadData"], "pong");

    // image body was fetched for the packets document but never archived
    assert_eq!(
        items[3]["response"]["bodyUnavailableReason"],
        "getResponseBody_failed"
    );

    assert!(!handle.status().await.unwrap());
    assert!(matches!(
        handle.stop().await,
        Err(ControllerError::Session(SessionError::NotActive))
    ));

    drop(handle);
    task.await.unwrap();
}
