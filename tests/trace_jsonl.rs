use percentile_harness::trace::hash_text;
use percentile_harness::{
    question_key, AttemptStatus, AttemptTrace, ForecastEngine, JsonlTraceSink, QuestionBounds,
    TraceError, TraceSink,
};
use tempfile::tempdir;

#[derive(Debug, serde::Deserialize)]
struct TraceRow {
    question_key: String,
    attempt_index: usize,
    text_hash: String,
    status: String,
    error_code: Option<String>,
    violations: Vec<serde_json::Value>,
}

fn make_trace(attempt_index: usize) -> AttemptTrace {
    AttemptTrace {
        question_key: "q".to_string(),
        timestamp_ms: 0,
        attempt_index,
        text_hash: "hash".to_string(),
        status: AttemptStatus::Accepted,
        anchor_count: Some(3),
        error_code: None,
        error: None,
        violations: Vec::new(),
    }
}

#[test]
fn jsonl_trace_sink_writes_events_and_flushes_on_join() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");

    let (sink, worker) = JsonlTraceSink::create(&path).unwrap();
    sink.record(make_trace(1)).unwrap();
    sink.record(make_trace(2)).unwrap();

    drop(sink);
    assert_eq!(worker.join().unwrap(), 2);

    let raw = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: TraceRow = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first.attempt_index, 1);
    assert_eq!(first.status, "accepted");
    assert_eq!(first.question_key, "q");
}

#[test]
fn forecast_records_one_trace_per_attempt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("forecast.jsonl");
    let engine = ForecastEngine::default();
    let good = "Percentile 10: 20\nPercentile 50: 45\nPercentile 90: 80";
    let spike = "Percentile 10: 50\nPercentile 50: 50.0001\nPercentile 90: 50.0002";
    let attempts = [good, "no answer", spike];

    let (sink, worker) = JsonlTraceSink::create(&path).unwrap();
    engine
        .forecast_question_with_trace(
            &QuestionBounds::closed(0.0, 100.0),
            &attempts,
            Some(&sink),
        )
        .unwrap();
    drop(sink);
    worker.join().unwrap();

    let rows: Vec<TraceRow> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].text_hash, hash_text(good));
    assert_eq!(rows[0].status, "accepted");
    assert_eq!(rows[1].status, "failed");
    assert_eq!(rows[1].error_code.as_deref(), Some("no_percentile_lines"));
    assert_eq!(rows[2].status, "rejected");
    assert!(!rows[2].violations.is_empty());
}

#[test]
fn questions_sharing_a_trace_file_stay_separable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("batch.jsonl");
    let engine = ForecastEngine::default();
    let answer = "Percentile 10: 20\nPercentile 50: 45\nPercentile 90: 80";
    let closed = QuestionBounds::closed(0.0, 100.0);
    let open = closed.clone().open(false, true);

    let (sink, worker) = JsonlTraceSink::create(&path).unwrap();
    let writer = sink.clone();
    for bounds in [&closed, &open] {
        engine
            .forecast_question_with_trace(bounds, &[answer, answer], Some(&writer))
            .unwrap();
    }
    drop(writer);
    drop(sink);
    assert_eq!(worker.join().unwrap(), 4);

    let rows: Vec<TraceRow> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let keys: Vec<&str> = rows.iter().map(|r| r.question_key.as_str()).collect();
    let (closed_key, open_key) = (question_key(&closed), question_key(&open));
    assert_eq!(keys, vec![&closed_key[..], &closed_key[..], &open_key[..], &open_key[..]]);
    assert_ne!(closed_key, open_key);
}

struct FailingSink;

impl TraceSink for FailingSink {
    fn record(&self, _event: AttemptTrace) -> Result<(), TraceError> {
        Err(TraceError::Disconnected)
    }
}

#[test]
fn trace_failures_do_not_fail_the_forecast() {
    let engine = ForecastEngine::default();
    let forecast = engine
        .forecast_question_with_trace(
            &QuestionBounds::closed(0.0, 100.0),
            &["Percentile 10: 20\nPercentile 90: 80"],
            Some(&FailingSink),
        )
        .unwrap();
    assert_eq!(forecast.distribution.source_count, 1);
}
