//! Record serialization.
//!
//! One compact JSON object per analyzed directory, written back-to-back with
//! no delimiter. A consumer either knows the record count or uses a streaming
//! decoder that reads one value at a time.

use std::io::Write;

use tracing::warn;

use crate::package::Package;

/// Serialize and write one record. A directory whose selection succeeded but
/// produced invalid files is still flagged. Serialization or write failures
/// are replaced by a minimal error object; they never abort the batch.
pub fn emit<W: Write>(out: &mut W, mut pkg: Package) {
    if pkg.error.is_empty() && !pkg.invalid_go_files.is_empty() {
        pkg.error = "invalid Go sources encountered".to_string();
    }

    let payload = match serde_json::to_string(&pkg) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "failed to encode package metadata");
            write_fallback(out, &format!("Failed to encode package metadata: {e}"));
            return;
        }
    };
    if let Err(e) = out.write_all(payload.as_bytes()) {
        warn!(error = %e, "failed to write package metadata");
        write_fallback(out, &format!("Failed to write package metadata: {e}"));
    }
}

fn write_fallback<W: Write>(out: &mut W, message: &str) {
    let obj = serde_json::json!({ "Error": message });
    // Nothing left to do if even the fallback write fails.
    let _ = out.write_all(obj.to_string().as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io;

    #[test]
    fn test_emit_minimal_record() {
        let mut out = Vec::new();
        emit(&mut out, Package::default());
        assert_eq!(String::from_utf8(out).unwrap(), r#"{"Name":""}"#);
    }

    #[test]
    fn test_emit_flags_invalid_sources() {
        let mut pkg = Package {
            name: "foo".to_string(),
            go_files: vec!["a.go".to_string()],
            ..Package::default()
        };
        pkg.invalid_go_files
            .insert("bad.go".to_string(), "missing package clause".to_string());

        let mut out = Vec::new();
        emit(&mut out, pkg);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["Error"], "invalid Go sources encountered");
    }

    #[test]
    fn test_emit_keeps_existing_error() {
        let mut pkg = Package {
            error: "no buildable Go source files in /x".to_string(),
            ..Package::default()
        };
        pkg.invalid_go_files
            .insert("bad.go".to_string(), "boom".to_string());

        let mut out = Vec::new();
        emit(&mut out, pkg);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["Error"], "no buildable Go source files in /x");
    }

    #[test]
    fn test_records_concatenate_without_delimiter() {
        let mut out = Vec::new();
        emit(&mut out, Package::default());
        emit(&mut out, Package::default());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"Name":""}{"Name":""}"#
        );
    }

    /// Fails the first write, then recovers. The fallback object for the
    /// failed record must land, and later records must be unaffected.
    struct FlakyWriter {
        failed_once: bool,
        inner: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.failed_once {
                self.failed_once = true;
                return Err(io::Error::other("pipe gone"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_substitutes_error_object() {
        let mut out = FlakyWriter {
            failed_once: false,
            inner: Vec::new(),
        };
        emit(&mut out, Package::default());
        emit(&mut out, Package::default());

        let text = String::from_utf8(out.inner).unwrap();
        assert!(text.starts_with(r#"{"Error":"Failed to write package metadata"#));
        assert!(text.ends_with(r#"{"Name":""}"#));
    }
}
