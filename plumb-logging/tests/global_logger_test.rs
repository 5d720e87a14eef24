mod common;

use common::{capture, debug_config};
use plumb_logging::{init_logger, log_event, log_exception, LogLevel};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("upload rejected")]
struct UploadError;

#[test]
fn test_macros_route_through_global_logger() {
    // No global logger yet: both macros are no-ops
    log_event!(LogLevel::Info, "dropped");

    let (logger, output) = capture(debug_config());
    init_logger(Arc::new(logger)).unwrap();
    assert!(init_logger(Arc::new(plumb_logging::NullLogger)).is_err());

    log_event!(LogLevel::Warning, "job {job_id} slow", job_id = 7);
    log_exception!(UploadError, "upload of {file} failed", file = "report.csv");

    let lines = output.json_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["message"], "job 7 slow");
    assert_eq!(lines[0]["level"], "warning");
    assert_eq!(lines[1]["message"], "upload of report.csv failed");
    assert_eq!(lines[1]["exception"], "upload rejected");
    assert!(plumb_logging::logger().is_some());
}
