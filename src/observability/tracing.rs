//! W3C Trace Context propagation.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests
//! - Mint child span ids for upstream calls
//! - Inject `traceparent` into upstream request headers

use axum::http::{HeaderMap, HeaderValue};
use uuid::Uuid;

pub const TRACEPARENT: &str = "traceparent";
pub const TRACESTATE: &str = "tracestate";
const VERSION: &str = "00";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
    pub flags: u8,
    pub state: Option<String>,
}

impl TraceContext {
    /// Fresh sampled root context.
    pub fn new_root() -> Self {
        Self {
            trace_id: *Uuid::new_v4().as_bytes(),
            span_id: new_span_id(),
            flags: 0x01,
            state: None,
        }
    }

    /// Continue the caller's trace if it sent a valid `traceparent`, else start one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let parent = headers
            .get(TRACEPARENT)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_traceparent);

        match parent {
            Some((trace_id, span_id, flags)) => Self {
                trace_id,
                span_id,
                flags,
                state: headers
                    .get(TRACESTATE)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from),
            }
            .child(),
            None => Self::new_root(),
        }
    }

    /// Same trace, new span id.
    pub fn child(&self) -> Self {
        Self {
            span_id: new_span_id(),
            ..self.clone()
        }
    }

    pub fn trace_id_hex(&self) -> String {
        hex(&self.trace_id)
    }

    pub fn span_id_hex(&self) -> String {
        hex(&self.span_id)
    }

    pub fn traceparent(&self) -> String {
        format!(
            "{}-{}-{}-{:02x}",
            VERSION,
            self.trace_id_hex(),
            self.span_id_hex(),
            self.flags
        )
    }

    /// Write this context into outgoing headers.
    pub fn inject(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.traceparent()) {
            headers.insert(TRACEPARENT, value);
        }
        match self.state.as_deref().map(HeaderValue::from_str) {
            Some(Ok(state)) => {
                headers.insert(TRACESTATE, state);
            }
            _ => {
                headers.remove(TRACESTATE);
            }
        }
    }
}

fn new_span_id() -> [u8; 8] {
    let bytes = Uuid::new_v4().into_bytes();
    let mut id = [0u8; 8];
    id.copy_from_slice(&bytes[..8]);
    id
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn unhex<const N: usize>(s: &str) -> Option<[u8; N]> {
    if s.len() != N * 2 || !s.is_ascii() {
        return None;
    }
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

fn parse_traceparent(value: &str) -> Option<([u8; 16], [u8; 8], u8)> {
    let parts: Vec<&str> = value.trim().split('-').collect();
    if parts.len() < 4 || parts[0] == "ff" {
        return None;
    }
    let trace_id = unhex::<16>(parts[1])?;
    let span_id = unhex::<8>(parts[2])?;
    let flags = u8::from_str_radix(parts[3], 16).ok()?;

    // All-zero ids are invalid
    if trace_id.iter().all(|b| *b == 0) || span_id.iter().all(|b| *b == 0) {
        return None;
    }
    Some((trace_id, span_id, flags))
}
