//! Replay stub log.
//!
//! When enabled, every completed chat call appends one JSON line describing
//! the request to `<dir>/replay_stub.jsonl`, so a run can be reproduced
//! later against the same runtime.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::ClientError;
use crate::http::{PURPOSE_HEADER, REQUEST_ID_HEADER};

/// Payload fields kept in a replay record.
const PAYLOAD_FIELDS: [&str; 6] = ["model", "messages", "temperature", "seed", "tools", "stream"];

/// Request headers kept in a replay record. Credentials are never written.
const HEADER_FIELDS: [&str; 2] = [REQUEST_ID_HEADER, PURPOSE_HEADER];

const REPLAY_LOG: &str = "replay_stub.jsonl";
const REPLAY_SCRIPT: &str = "replay.sh";
const REPLAY_SCRIPT_BODY: &str = "#!/usr/bin/env bash\n\
# Minimal replay helper\n\
echo 'Provide an audit JSONL line to audit/repro/inference_replay.py'\n";

/// One line of the replay log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayRecord {
    pub ts: f64,
    pub request_id: String,
    pub endpoint: String,
    pub payload: Map<String, Value>,
    pub headers: Map<String, Value>,
    pub streamed: bool,
    pub chunk_hashes: Vec<String>,
}

impl ReplayRecord {
    /// Capture the replayable parts of a request.
    pub fn new(
        request_id: &str,
        endpoint: &str,
        payload: &Value,
        headers: &HeaderMap,
        streamed: bool,
        chunk_hashes: Vec<String>,
    ) -> Self {
        let payload = PAYLOAD_FIELDS
            .iter()
            .map(|field| {
                let value = payload.get(*field).cloned().unwrap_or(Value::Null);
                (field.to_string(), value)
            })
            .collect();

        let headers = HEADER_FIELDS
            .iter()
            .filter_map(|name| {
                let value = headers.get(*name)?.to_str().ok()?;
                Some((name.to_string(), Value::String(value.to_string())))
            })
            .collect();

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default();

        Self {
            ts,
            request_id: request_id.to_string(),
            endpoint: endpoint.to_string(),
            payload,
            headers,
            streamed,
            chunk_hashes,
        }
    }
}

/// Appends [`ReplayRecord`]s to a directory.
#[derive(Debug, Clone)]
pub struct ReplayRecorder {
    dir: PathBuf,
}

impl ReplayRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append `record` and make sure the replay script exists.
    pub fn record(&self, record: &ReplayRecord) -> Result<(), ClientError> {
        fs::create_dir_all(&self.dir)?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(REPLAY_LOG))?
            .write_all(line.as_bytes())?;

        let script = self.dir.join(REPLAY_SCRIPT);
        if !script.exists() {
            fs::write(script, REPLAY_SCRIPT_BODY)?;
        }
        Ok(())
    }
}
