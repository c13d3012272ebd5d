//! This demo shows basic usage of CommitLog, including:
//! - Opening a CommitLog
//! - Appending and reading batches
//! - Rolling over to new segments
//! - Producing and consuming through the service layer
//! - Reopening and truncating the log

use std::io;
use std::sync::Arc;

use commit_log::CommitLog;
use commit_log::Config;
use commit_log::ConsumeRequest;
use commit_log::LogService;
use commit_log::ProduceRequest;
use commit_log::Record;
use commit_log::RecordBatch;

fn main() -> io::Result<()> {
    // Create a temporary directory for the segment files
    let temp_dir = tempfile::tempdir()?;

    // Small segments so that the demo rolls over a few times.
    let config = Arc::new(Config {
        segment_max_records: Some(3),
        ..Config::new(temp_dir.path().to_str().unwrap())
    });

    {
        let log = Arc::new(CommitLog::open(config.clone())?);

        // A batch holds records; the whole batch gets one offset.
        let batch = RecordBatch::new(0, vec![
            Record::new("first record", 0),
            Record::new("second record", 1),
        ]);
        let offset = log.append_batch(&batch)?;
        println!("Appended batch at offset {}", offset);

        let got = log.read_batch(offset)?;
        assert_eq!(batch, got);

        // The service layer speaks in requests and responses.
        let svc = LogService::new(log.clone());

        let inbound = (1..=7).map(|i| {
            ProduceRequest::new(RecordBatch::from_values([format!("message-{}", i)]))
        });
        for resp in svc.produce_stream(inbound) {
            println!("Produced at offset {}", resp?.first_offset);
        }

        // Read from offset 2 to the end of the log.
        for res in svc.consume_stream(ConsumeRequest::new(2)) {
            match res {
                Ok(resp) => {
                    let v = &resp.record_batch.records[0].value;
                    println!("Consumed: {}", String::from_utf8_lossy(v));
                }
                Err(e) if e.is_offset_out_of_range() => {
                    println!("Reached the end of the log: {}", e);
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        println!("\nSegments:\n{:#}", log.stat());
    }

    // Reopen: everything appended is still there.
    let log = CommitLog::open(config)?;
    println!(
        "\nReopened: offsets [{}, {})",
        log.lowest_offset(),
        log.next_offset()
    );

    // Drop the segments that hold only offsets below 6.
    let removed = log.truncate(6)?;
    println!("Removed segments: {:?}", removed);
    println!("Lowest offset is now {}", log.lowest_offset());

    println!("\nDump:\n{}", log.dump().write_to_string()?);

    log.close()
}
