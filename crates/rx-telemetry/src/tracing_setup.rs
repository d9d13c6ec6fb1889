use uuid::Uuid;

/// Generate a trace ID (32 hex characters).
pub fn generate_trace_id() -> String {
    // A UUID without hyphens is exactly 32 hex chars.
    Uuid::new_v4().as_simple().to_string()
}

/// Generate a span ID (16 hex characters).
pub fn generate_span_id() -> String {
    Uuid::new_v4().as_simple().to_string()[..16].to_string()
}

/// Create a named span for one workflow operation (fetch, submit, parse,
/// change creation), returning the span and its trace ID.
pub fn create_operation_span(operation: &str) -> (tracing::Span, String) {
    let trace_id = generate_trace_id();
    let span_id = generate_span_id();
    let span = tracing::info_span!(
        "operation",
        trace_id = %trace_id,
        span_id = %span_id,
        operation = %operation,
    );
    (span, trace_id)
}

/// Create a child span under an existing trace ID.
pub fn create_child_span(trace_id: &str, operation: &str) -> tracing::Span {
    let span_id = generate_span_id();
    tracing::info_span!(
        "operation",
        trace_id = %trace_id,
        span_id = %span_id,
        operation = %operation,
    )
}

/// Span for everything that happens to one AI request record. The record id
/// doubles as the trace ID, so submit, listener and completion line up.
pub fn create_request_span(request_id: &Uuid, operation: &str) -> tracing::Span {
    create_child_span(&request_id.as_simple().to_string(), operation)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
