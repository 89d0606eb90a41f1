//! Hand attack results to a reporting layer.

use std::io::{BufRead, Write};

use crate::models::Result as AttackResult;

/// Errors raised while encoding or decoding results
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Encode attack results as JSON, one object per line
pub fn write_json<W: Write>(results: &[AttackResult], writer: &mut W) -> Result<(), EncodeError> {
    for result in results {
        serde_json::to_writer(&mut *writer, result)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Decode attack results written by [`write_json`], skipping blank lines
pub fn read_json<R: BufRead>(reader: R) -> Result<Vec<AttackResult>, EncodeError> {
    let mut results = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        results.push(serde_json::from_str(&line)?);
    }
    Ok(results)
}

/// Encode attack results to CSV
pub fn write_csv<W: Write>(results: &[AttackResult], writer: &mut W) -> Result<(), EncodeError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "seq",
        "timestamp",
        "latency",
        "status_code",
        "error",
        "method",
        "url",
        "bytes_in",
        "bytes_out",
    ])?;

    for result in results {
        csv_writer.write_record([
            result.seq.to_string(),
            result.timestamp.to_rfc3339(),
            humantime::format_duration(result.latency).to_string(),
            result.status_code.to_string(),
            result.error.clone().unwrap_or_default(),
            result.method.clone(),
            result.url.clone(),
            result.bytes_in.to_string(),
            result.bytes_out.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}
