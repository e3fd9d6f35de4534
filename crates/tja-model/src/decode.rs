use std::path::Path;

use log::debug;

use crate::chart::ParsedChart;
use crate::error::ChartError;

/// Reads a chart file as UTF-8, falling back to Shift-JIS.
pub fn read_chart_file<P: AsRef<Path>>(path: P) -> Result<String, ChartError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ChartError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    decode_chart_bytes(&bytes).ok_or_else(|| ChartError::Decode {
        path: path.to_path_buf(),
    })
}

pub fn decode_chart_bytes(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_string());
    }

    debug!("chart is not UTF-8; trying Shift-JIS");
    let (text, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
    if had_errors {
        return None;
    }
    Some(text.into_owned())
}

pub fn load_chart_file<P: AsRef<Path>>(path: P) -> Result<ParsedChart, ChartError> {
    let text = read_chart_file(path)?;
    Ok(crate::parse(&text)?)
}
