// src/report/diagnostic.rs
// =============================================================================
// Structured failure reports.
//
// Every rate-limit, transport failure and malformed response produces one
// DiagnosticRecord: which query, what the request looked like, the response
// body if there was one, and a human-readable cause. Where the record ends
// up is up to the DiagnosticSink; the default sink writes it as one JSON line
// through tracing.
//
// JSON shape:
// {"query":"ab'","http_response":{"method":"GET","path":"/search",
//  "args":{...},"headers":{...},"status":200,"data":"<html>..."},
//  "error":"not json response ..."}
// =============================================================================

use serde::Serialize;

use super::marshal::to_json_line;
use crate::crawl::RequestSummary;
use crate::model::Query;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpExchangeRecord {
    pub method: String,
    pub path: String,
    pub args: std::collections::BTreeMap<String, Vec<String>>,
    pub headers: std::collections::BTreeMap<String, String>,
    /// Absent when the transport failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Response body, absent when the transport failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRecord {
    pub query: String,
    pub offset: u64,
    pub http_response: HttpExchangeRecord,
    pub error: String,
}

impl DiagnosticRecord {
    pub fn new(
        query: &Query,
        offset: u64,
        request: &RequestSummary,
        status: Option<u16>,
        body: Option<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            query: query.to_string(),
            offset,
            http_response: HttpExchangeRecord {
                method: request.method.clone(),
                path: request.path.clone(),
                args: request.args.clone(),
                headers: request.headers.clone(),
                status,
                data: body,
            },
            error: cause.into(),
        }
    }

    pub fn to_json_line(&self) -> String {
        to_json_line(self)
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, record: DiagnosticRecord);
}

// Default sink: one warn-level event per record, JSON in the message
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, record: DiagnosticRecord) {
        tracing::warn!(target: "keysweep::diagnostic", "{}", record.to_json_line());
    }
}

// Test sink that keeps every record in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CollectingDiagnostics {
    records: std::sync::Mutex<Vec<DiagnosticRecord>>,
}

#[cfg(test)]
impl CollectingDiagnostics {
    pub(crate) fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl DiagnosticSink for CollectingDiagnostics {
    fn report(&self, record: DiagnosticRecord) {
        self.records.lock().unwrap().push(record);
    }
}
