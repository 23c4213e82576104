//! Offline verification of the runtime's audit event log.
//!
//! The runtime writes one JSON record per request to append-only JSONL
//! logs. Each record carries `hash`, the SHA-256 of its core fields, and
//! `prev_hash`, the hash of the record before it. Verifying the log means
//! recomputing every hash and checking that the links are unbroken.
//!
//! Logs are checked either one file at a time ([`verify_events_file`]) or
//! as an audit pack ([`verify_pack`]): a zip holding `MANIFEST.json`,
//! `MANIFEST.sig.json` and the logs under `audit/audit_*.jsonl`, which form
//! one chain in file name order.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;
use zip::ZipArchive;

use crate::client::ClientError;

/// Fields covered by a record's `hash`, in no particular order.
pub const CORE_KEYS: [&str; 11] = [
    "ts",
    "ts_iso",
    "request_id",
    "endpoint",
    "status",
    "input_hash",
    "output_hash",
    "params_snapshot",
    "policy_hash",
    "code_git_sha",
    "prev_hash",
];

const MANIFEST: &str = "MANIFEST.json";
const MANIFEST_SIG: &str = "MANIFEST.sig.json";
const LOG_PREFIX: &str = "audit/audit_";
const LOG_SUFFIX: &str = ".jsonl";

/// Result of checking one log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub ok: bool,
    /// Records that parsed and were checked.
    pub checked: usize,
    pub first_error: Option<Failure>,
}

/// Result of checking an audit pack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackVerification {
    pub ok: bool,
    pub checked: usize,
    /// Digest of the manifest, `None` when the pack has no usable manifest.
    pub manifest_sha256: Option<String>,
    pub manifest: Value,
    pub manifest_sig: Value,
    pub first_error: Option<Failure>,
}

/// The first problem found in a log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    JsonParseError,
    HashMismatch,
    PrevHashMismatch,
}

/// SHA-256 (hex) of a record's core fields.
///
/// Missing fields hash as `null`. Objects are serialised compactly with
/// sorted keys so the digest does not depend on field order.
pub fn record_hash(record: &Map<String, Value>) -> String {
    let core: Map<String, Value> = CORE_KEYS
        .iter()
        .map(|key| (key.to_string(), record.get(*key).cloned().unwrap_or(Value::Null)))
        .collect();
    digest(&Value::Object(core))
}

fn digest(value: &Value) -> String {
    let encoded = canonical(value).to_string();
    hex::encode(Sha256::digest(encoded.as_bytes()))
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), canonical(v))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

/// Walks one hash chain, possibly spread over several files.
#[derive(Debug)]
pub struct ChainVerifier {
    ok: bool,
    checked: usize,
    last_hash: Option<Value>,
    first_error: Option<Failure>,
}

impl Default for ChainVerifier {
    fn default() -> Self {
        Self {
            ok: true,
            checked: 0,
            last_hash: None,
            first_error: None,
        }
    }
}

impl ChainVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the records in `lines`, continuing the chain from the previous
    /// call. Empty lines are skipped; `file` labels any failure.
    pub fn check_lines<'a, I>(&mut self, file: &str, lines: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for line in lines {
            if line.is_empty() {
                continue;
            }

            let record = match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(record)) => record,
                _ => {
                    self.fail(file, None, FailureReason::JsonParseError);
                    continue;
                }
            };
            let request_id = || Some(record.get("request_id").cloned().unwrap_or(Value::Null));
            let hash = record.get("hash").cloned().unwrap_or(Value::Null);

            if hash.as_str() != Some(record_hash(&record).as_str()) {
                self.fail(file, request_id(), FailureReason::HashMismatch);
            }

            if let Some(last) = &self.last_hash {
                let prev = record.get("prev_hash").unwrap_or(&Value::Null);
                if !prev.is_null() && prev != last {
                    self.fail(file, request_id(), FailureReason::PrevHashMismatch);
                }
            }

            self.last_hash = Some(hash).filter(|hash| !hash.is_null() && hash != "");
            self.checked += 1;
        }
    }

    pub fn finish(self) -> Verification {
        Verification {
            ok: self.ok,
            checked: self.checked,
            first_error: self.first_error,
        }
    }

    fn fail(&mut self, file: &str, request_id: Option<Value>, reason: FailureReason) {
        self.ok = false;
        self.first_error.get_or_insert_with(|| Failure {
            file: file.to_string(),
            request_id,
            reason,
        });
    }
}

/// Verify the records in `lines` as one self-contained chain.
pub fn verify_event_lines<'a, I>(file: &str, lines: I) -> Verification
where
    I: IntoIterator<Item = &'a str>,
{
    let mut chain = ChainVerifier::new();
    chain.check_lines(file, lines);
    chain.finish()
}

/// Read and verify a JSONL log file.
pub fn verify_events_file(path: &Path) -> Result<Verification, ClientError> {
    let content = fs::read_to_string(path)?;
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(verify_event_lines(&file, content.lines()))
}

/// Verify an audit pack.
///
/// Fails only when the pack cannot be opened or is not a zip archive. A
/// missing or unreadable manifest is reported as `{}`.
pub fn verify_pack(path: &Path) -> Result<PackVerification, ClientError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;

    let manifest = read_json_entry(&mut archive, MANIFEST);
    let manifest_sig = read_json_entry(&mut archive, MANIFEST_SIG);

    let mut logs: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with(LOG_PREFIX) && name.ends_with(LOG_SUFFIX))
        .map(str::to_string)
        .collect();
    logs.sort();

    let mut chain = ChainVerifier::new();
    for name in &logs {
        let mut bytes = Vec::new();
        archive.by_name(name)?.read_to_end(&mut bytes)?;
        let content = String::from_utf8_lossy(&bytes);
        debug!(file = %name, "checking audit log");
        chain.check_lines(name, content.lines());
    }
    let Verification {
        ok,
        checked,
        first_error,
    } = chain.finish();

    let manifest_sha256 = is_present(&manifest).then(|| digest(&manifest));
    Ok(PackVerification {
        ok,
        checked,
        manifest_sha256,
        manifest,
        manifest_sig,
        first_error,
    })
}

fn read_json_entry(archive: &mut ZipArchive<File>, name: &str) -> Value {
    let mut bytes = Vec::new();
    let read = archive
        .by_name(name)
        .map_err(ClientError::from)
        .and_then(|mut entry| Ok(entry.read_to_end(&mut bytes)?));

    match read {
        Ok(_) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            debug!(entry = name, error = %err, "ignoring malformed pack entry");
            Value::Object(Map::new())
        }),
        Err(_) => Value::Object(Map::new()),
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(text) => !text.is_empty(),
        Value::Number(_) | Value::Bool(true) => true,
    }
}
