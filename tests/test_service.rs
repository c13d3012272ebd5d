use std::io;
use std::sync::Arc;

use commit_log::errors::ServiceError;
use commit_log::CommitLog;
use commit_log::Config;
use commit_log::ConsumeRequest;
use commit_log::LogService;
use commit_log::ProduceRequest;
use commit_log::RecordBatch;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn new_service(
    temp_dir: &TempDir,
    config: impl FnOnce(Config) -> Config,
) -> Result<LogService<CommitLog>, io::Error> {
    let c = config(Config::new(temp_dir.path().to_str().unwrap()));
    let log = CommitLog::open(Arc::new(c))?;
    Ok(LogService::new(Arc::new(log)))
}

fn produce_req(value: &str) -> ProduceRequest {
    ProduceRequest::new(RecordBatch::from_values([value]))
}

fn value_of(batch: &RecordBatch) -> String {
    String::from_utf8_lossy(&batch.records[0].value).to_string()
}

#[test]
fn test_produce_consume_scenario() -> Result<(), io::Error> {
    let temp_dir = TempDir::new()?;
    let svc = new_service(&temp_dir, |c| c)?;

    let err = svc.consume(ConsumeRequest::new(0)).unwrap_err();
    assert!(matches!(err, ServiceError::OffsetOutOfRange(_)), "{}", err);

    let resp = svc.produce(produce_req("hello world"))?;
    assert_eq!(0, resp.first_offset);

    let resp = svc.consume(ConsumeRequest::new(0))?;
    assert_eq!(1, resp.record_batch.records.len());
    assert_eq!("hello world", value_of(&resp.record_batch));

    let resp = svc.produce(produce_req("second"))?;
    assert_eq!(1, resp.first_offset);

    let mut stream = svc.consume_stream(ConsumeRequest::new(0));

    let got = stream.next().unwrap()?;
    assert_eq!("hello world", value_of(&got.record_batch));

    let got = stream.next().unwrap()?;
    assert_eq!("second", value_of(&got.record_batch));

    let err = stream.next().unwrap().unwrap_err();
    assert!(matches!(err, ServiceError::OffsetOutOfRange(_)), "{}", err);

    assert!(stream.next().is_none());
    Ok(())
}

#[test]
fn test_produce_stream_across_segments() -> Result<(), io::Error> {
    let temp_dir = TempDir::new()?;
    let svc = new_service(&temp_dir, |c| Config {
        segment_max_records: Some(4),
        initial_offset: Some(1),
        ..c
    })?;

    let inbound = (0..10).map(|i| produce_req(&format!("v{}", i)));
    let offsets = svc
        .produce_stream(inbound)
        .map(|r| r.map(|resp| resp.first_offset))
        .collect::<Result<Vec<_>, _>>()?;

    assert_eq!((1..=10).collect::<Vec<_>>(), offsets);
    assert_eq!(3, svc.log().stat().segments.len());

    let got = svc
        .consume_stream(ConsumeRequest::new(3))
        .map_while(|r| r.ok())
        .map(|resp| value_of(&resp.record_batch))
        .collect::<Vec<_>>();

    let want = (2..10).map(|i| format!("v{}", i)).collect::<Vec<_>>();
    assert_eq!(want, got);

    Ok(())
}

#[test]
fn test_consume_stream_after_truncate() -> Result<(), io::Error> {
    let temp_dir = TempDir::new()?;
    let svc = new_service(&temp_dir, |c| Config {
        segment_max_records: Some(2),
        ..c
    })?;

    for i in 0..5 {
        svc.produce(produce_req(&format!("v{}", i)))?;
    }

    svc.log().truncate(2)?;

    // Below the lowest offset is out of range, like past the end
    let mut stream = svc.consume_stream(ConsumeRequest::new(0));
    let err = stream.next().unwrap().unwrap_err();
    assert!(err.is_offset_out_of_range(), "{}", err);

    let n = svc
        .consume_stream(ConsumeRequest::new(2))
        .take_while(|r| r.is_ok())
        .count();
    assert_eq!(3, n);

    Ok(())
}
