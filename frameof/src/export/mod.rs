//! Frame export functionality
//!
//! Writes captured frames as JSON records for consumption by other tools.
//! Each record carries the raw frame fields plus the decomposed name.

use serde::Serialize;
use std::io::Write;

use crate::domain::{Address, ExportError};
use crate::frame::Frame;

/// Serialized form of one [`Frame`]
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FrameRecord<'a> {
    pub pc: Address,
    pub entry: Address,
    pub function: &'a str,
    pub file: &'a str,
    pub line: u32,
    pub package_path: &'a str,
    pub package_name: &'a str,
    pub function_name: &'a str,
}

impl From<&Frame> for FrameRecord<'static> {
    fn from(frame: &Frame) -> Self {
        Self {
            pc: frame.pc(),
            entry: frame.entry(),
            function: frame.qualified_name(),
            file: frame.file(),
            line: frame.line(),
            package_path: frame.package_path(),
            package_name: frame.package_name(),
            function_name: frame.function_name(),
        }
    }
}

/// Write `frames` as a pretty-printed JSON array
///
/// # Errors
/// Returns an error if serialization or the underlying writer fails
pub fn write_json<W: Write>(frames: &[Frame], mut writer: W) -> Result<(), ExportError> {
    let records: Vec<FrameRecord<'_>> = frames.iter().map(FrameRecord::from).collect();
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_named_frame() {
        let frame = Frame::with_name("app/net/tcp.connect");
        let record = FrameRecord::from(&frame);
        assert_eq!(record.function, "app/net/tcp.connect");
        assert_eq!(record.package_path, "app/net");
        assert_eq!(record.package_name, "tcp");
        assert_eq!(record.function_name, "connect");
        assert_eq!(record.line, 0);
    }

    #[test]
    fn test_write_json() {
        let frames = [Frame::with_name("pkg.Func"), Frame::default()];
        let mut out = Vec::new();
        write_json(&frames, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["function_name"], "Func");
        assert_eq!(records[0]["package_name"], "pkg");
        assert_eq!(records[1]["function"], "");
        assert_eq!(records[1]["pc"], 0);
    }

    #[test]
    fn test_write_json_empty() {
        let mut out = Vec::new();
        write_json(&[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "[]");
    }
}
