//! Binary loader for doom-host.
//!
//! Responsibilities:
//! - Read the guest artifact into one contiguous buffer.
//! - Detect whether the bytes are a `.wasm` binary or `.wat` text.
//! - If it looks like WAT, convert it to WASM bytes (via the `wat` crate).
//! - Validate, then compile a Wasmtime `Module`.
//!
//! Validation and compilation are separate steps so that malformed input is
//! reported as a format error and only real codegen failures as compile errors.

use std::path::Path;

use tracing::debug;
use wasmtime::{Engine, Module};

use crate::error::{HostError, Result};

/// Read the artifact at `path`. The buffer length equals the file size.
pub fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).map_err(|source| HostError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), len = bytes.len(), "read guest artifact");
    Ok(bytes)
}

/// Load: read -> detect -> (optional) wat->wasm -> validate -> compile.
pub fn load_module(engine: &Engine, path: &Path) -> Result<Module> {
    let bytes = read_artifact(path)?;
    compile_module(engine, &bytes)
}

/// Detect -> (optional) wat->wasm -> validate -> compile.
///
/// The input buffer is not retained; the returned module owns everything it needs.
pub fn compile_module(engine: &Engine, bytes: &[u8]) -> Result<Module> {
    let Detected { format, wasm_bytes } = normalize_to_wasm(bytes)?;
    debug!(?format, len = wasm_bytes.len(), "normalized guest module");

    Module::validate(engine, &wasm_bytes)
        .map_err(|e| HostError::format(e.root_cause().to_string()))?;
    Module::new(engine, &wasm_bytes).map_err(|error| HostError::Compile { error })
}

/// Detect format and normalize to WASM bytes.
pub fn normalize_to_wasm(bytes: &[u8]) -> Result<Detected> {
    let format = detect_format(bytes)
        .ok_or_else(|| HostError::format("not a WebAssembly module (missing `\\0asm` magic)"))?;

    match format {
        DetectedFormat::Wasm => Ok(Detected {
            format,
            wasm_bytes: bytes.to_vec(),
        }),
        DetectedFormat::Wat => {
            let wasm_bytes = wat::parse_bytes(bytes)
                .map_err(|e| HostError::format(format!("failed to parse WAT: {e}")))?
                .into_owned();
            Ok(Detected { format, wasm_bytes })
        }
    }
}

/// What kind of module the loader inferred from the bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DetectedFormat {
    Wasm,
    Wat,
}

/// Result of normalizing (detecting + possibly converting) the input.
#[derive(Clone, Debug)]
pub struct Detected {
    pub format: DetectedFormat,
    /// Always WASM bytes; validity is checked separately.
    pub wasm_bytes: Vec<u8>,
}

/// Best-effort detection.
///
/// Rules:
/// - If the first 4 bytes are `\0asm`, treat as WASM.
/// - Else, after stripping UTF-8 BOM / leading whitespace, if the first non-ws byte is `(`,
///   treat as WAT.
pub fn detect_format(bytes: &[u8]) -> Option<DetectedFormat> {
    if is_wasm_magic(bytes) {
        return Some(DetectedFormat::Wasm);
    }

    let i = skip_bom_and_leading_ws(bytes);
    if i < bytes.len() && bytes[i] == b'(' {
        return Some(DetectedFormat::Wat);
    }

    None
}

fn is_wasm_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(b"\0asm")
}

fn skip_bom_and_leading_ws(bytes: &[u8]) -> usize {
    let mut i = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        3
    } else {
        0
    };

    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\r' | b'\n') {
        i += 1;
    }

    i
}
