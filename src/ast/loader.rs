//! Boundary to the binary decoder and validator
//!
//! Decoding is done by an external collaborator. This crate only fixes the
//! shape of the boundary: bytes in, a validated [`AstModule`] or an error out.

use std::path::Path;

use super::module::AstModule;
use crate::runtime::RuntimeError;

pub trait Loader {
    /// Decode and validate a module from an in-memory buffer
    fn parse_from_bytes(&self, bytes: &[u8]) -> Result<AstModule, RuntimeError>;

    /// Read `path` and decode it with [`Loader::parse_from_bytes`]
    fn parse_from_file(&self, path: &Path) -> Result<AstModule, RuntimeError> {
        if !path.is_file() {
            return Err(RuntimeError::IllegalPath(path.display().to_string()));
        }
        let bytes = std::fs::read(path).map_err(|e| RuntimeError::ReadError(format!("{}: {e}", path.display())))?;
        self.parse_from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::ModuleBuilder;
    use std::io::Write;

    /// Accepts only the empty module: the eight-byte preamble.
    struct PreambleOnly;

    impl Loader for PreambleOnly {
        fn parse_from_bytes(&self, bytes: &[u8]) -> Result<AstModule, RuntimeError> {
            if bytes != b"\0asm\x01\0\0\0" {
                return Err(RuntimeError::Malformed("not an empty module".to_string()));
            }
            ModuleBuilder::new().build()
        }
    }

    #[test]
    fn missing_file_is_illegal_path() {
        let err = PreambleOnly
            .parse_from_file(Path::new("/definitely/not/here.wasm"))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::IllegalPath(_)));
    }

    #[test]
    fn file_contents_reach_the_decoder() {
        let path = std::env::temp_dir().join(format!("wasmbed-loader-{}.wasm", std::process::id()));
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"\0asm\x01\0\0\0")
            .unwrap();
        let module = PreambleOnly.parse_from_file(&path).unwrap();
        assert!(module.imports().is_empty());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn decoder_failure_produces_no_module() {
        assert!(PreambleOnly.parse_from_bytes(b"garbage").is_err());
    }
}
