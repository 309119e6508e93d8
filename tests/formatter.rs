use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use tracing_fluentd_json::{
    EntryFormatter, FluentdFormatter, FormatterConfig, Level, LogEntry, Record, Value,
};

#[derive(thiserror::Error, Debug)]
#[error("not found")]
struct NotFound;

fn service_fields(entry: LogEntry) -> LogEntry {
    let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
    entry
        .with_field("status", 404)
        .with_field("body", Value::bytes(b"Not Found"))
        .with_field("trace.spanid", 123456789)
        .with_field("trace.traceid", "42q54faf98745")
        .with_field("header", Value::map([("Content-Type", vec!["plain/text"])]))
        .with_field("error", Value::error(NotFound))
        .with_field("addr", Value::display(addr))
        .with_field(
            "user",
            Value::reference(
                Record::new()
                    .field("Username", "gopher")
                    .field("Age", 8)
                    .field("ID", 1024u64),
            ),
        )
        .with_field("nil", Value::null_ref())
}

fn parse(line: &[u8]) -> serde_json::Map<String, serde_json::Value> {
    serde_json::from_slice(line).unwrap()
}

#[test]
fn every_level_produces_a_parsable_line() {
    let formatter = FluentdFormatter::default();
    for level in [Level::Debug, Level::Info, Level::Warn, Level::Error] {
        let entry = service_fields(LogEntry::new(level, level.to_string()));
        let line = formatter.format(&entry).unwrap();
        let m = parse(&line);

        assert_eq!(m.len(), entry.fields.len() + 3);
        let severity = m["severity"].as_str().unwrap();
        assert_eq!(severity.parse::<Level>().unwrap(), level);
        assert_eq!(m["message"], severity);
        DateTime::parse_from_rfc3339(m["time"].as_str().unwrap()).unwrap();
    }
}

#[test]
fn field_values_are_normalized() {
    let formatter = FluentdFormatter::default();
    let line = formatter
        .format(&service_fields(LogEntry::new(Level::Info, "request")))
        .unwrap();
    let m = parse(&line);

    assert_eq!(m["status"], 404);
    assert_eq!(m["trace.spanid"], 123456789);
    assert_eq!(m["trace.traceid"], "42q54faf98745");
    assert_eq!(m["body"], "[78 111 116 32 70 111 117 110 100]");
    assert_eq!(m["header"], "map[Content-Type:[plain/text]]");
    assert_eq!(m["error"], "not found");
    assert_eq!(m["addr"], "127.0.0.1:8080");
    assert_eq!(m["user"], "{Username:gopher Age:8 ID:1024}");
    assert!(m["nil"].is_null());
}

#[test]
fn key_count_includes_clash_copies() {
    let formatter = FluentdFormatter::default();
    let entry = LogEntry::new(Level::Warn, "clash")
        .with_field("time", 1)
        .with_field("msg", "m")
        .with_field("level", "l")
        .with_field("plain", 0);
    let m = parse(&formatter.format(&entry).unwrap());

    assert_eq!(m.len(), 4 + 3 + 3);
    assert_eq!(m["fields.time"], 1);
    assert_eq!(m["fields.msg"], "m");
    assert_eq!(m["fields.level"], "l");
    assert_eq!(m["msg"], "m");
    assert_eq!(m["level"], "l");
    assert_eq!(m["severity"], "warning");
}

#[test]
fn custom_format_round_trips() {
    let pattern = "%Y-%m-%d %H:%M:%S%.3f %z";
    let formatter =
        FluentdFormatter::new(FormatterConfig::with_timestamp_format(pattern)).unwrap();
    let now = Utc::now();
    let line = formatter
        .format(&LogEntry::new(Level::Info, "tick").with_timestamp(now))
        .unwrap();
    let m = parse(&line);

    let parsed = DateTime::parse_from_str(m["time"].as_str().unwrap(), pattern).unwrap();
    assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
}

#[test]
fn formatter_is_shareable_across_threads() {
    let formatter = std::sync::Arc::new(FluentdFormatter::default());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let formatter = std::sync::Arc::clone(&formatter);
            std::thread::spawn(move || {
                let entry = LogEntry::new(Level::Info, "worker").with_field("worker", i);
                formatter.format(&entry).unwrap()
            })
        })
        .collect();

    for handle in handles {
        let m = parse(&handle.join().unwrap());
        assert_eq!(m["message"], "worker");
    }
}
