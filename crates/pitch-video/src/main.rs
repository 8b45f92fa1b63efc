use std::process::ExitCode;
use std::time::Duration;

use pitch_video::{load_config, logging, sanitize, JobError, JobManager, JobStatus};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn usage() -> ExitCode {
    eprintln!("usage: pitch-video <config.json> <source>...");
    eprintln!();
    eprintln!("Set PITCH_VIDEO_LOG_JSON=1 for JSON log lines, RUST_LOG to filter.");
    ExitCode::from(2)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((config_path, sources)) = args.split_first() else {
        return usage();
    };
    if sources.is_empty() {
        return usage();
    }

    let json_logs = std::env::var("PITCH_VIDEO_LOG_JSON").is_ok_and(|v| v == "1");
    if let Err(e) = logging::init_logging(json_logs) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let manager = JobManager::from_config(&config);
    let mut job_ids = Vec::new();
    for source in sources {
        // The manager never queues; wait here for a free slot instead.
        loop {
            match manager.submit(source, None) {
                Ok(job) => {
                    job_ids.push(job.id);
                    break;
                }
                Err(JobError::Capacity { .. }) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(e) => {
                    log::error!("Rejected {}: {}", sanitize::redact_source(source), e);
                    break;
                }
            }
        }
    }

    loop {
        let pending = job_ids
            .iter()
            .filter_map(|id| manager.get(id))
            .filter(|job| !job.is_finished())
            .count();
        if pending == 0 {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    let jobs: Vec<_> = job_ids.iter().filter_map(|id| manager.get(id)).collect();
    match serde_json::to_string_pretty(&jobs) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Failed to serialise results: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let failed = jobs.iter().any(|job| job.status == JobStatus::Failed);
    if failed || job_ids.len() < sources.len() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
