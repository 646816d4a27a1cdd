//! WASI context: arguments, environment, descriptors and the exit code
//!
//! The context is the host data of the WASI module and is shared by all of its
//! functions through an `Arc`. It never holds guest memory; each call reaches
//! the caller's memory through its calling frame and passes it in.

use std::io::{Read, Write};
use std::time::Instant;

use parking_lot::Mutex;

use super::types::WasiErrno;
use crate::runtime::Memory;

/// One slot of the descriptor table
pub struct FileDescriptor {
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    /// Guest-visible name of a preopened directory
    preopen: Option<String>,
}

impl FileDescriptor {
    pub fn new_reader(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader: Some(reader),
            writer: None,
            preopen: None,
        }
    }

    pub fn new_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            reader: None,
            writer: Some(writer),
            preopen: None,
        }
    }

    pub fn new_preopen(path: impl Into<String>) -> Self {
        Self {
            reader: None,
            writer: None,
            preopen: Some(path.into()),
        }
    }

    pub fn readable(&self) -> bool {
        self.reader.is_some()
    }

    pub fn writable(&self) -> bool {
        self.writer.is_some()
    }
}

impl std::fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDescriptor")
            .field("readable", &self.readable())
            .field("writable", &self.writable())
            .field("preopen", &self.preopen)
            .finish()
    }
}

pub struct WasiContext {
    /// Descriptors: 0, 1 and 2 are stdio, preopens follow from 3
    fds: Mutex<Vec<Option<FileDescriptor>>>,
    args: Vec<String>,
    /// `NAME=value` pairs
    envs: Vec<String>,
    exit_code: Mutex<Option<u32>>,
    started: Instant,
}

impl WasiContext {
    pub fn builder() -> WasiContextBuilder {
        WasiContextBuilder::new()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn envs(&self) -> &[String] {
        &self.envs
    }

    /// Exit code recorded by `proc_exit`, if it ran
    pub fn exit_code(&self) -> Option<u32> {
        *self.exit_code.lock()
    }

    pub(crate) fn set_exit_code(&self, code: u32) {
        *self.exit_code.lock() = Some(code);
    }

    /// Time since the context was built, the base of the monotonic clock
    pub(crate) fn uptime_nanos(&self) -> u64 {
        self.started.elapsed().as_nanos() as u64
    }

    pub fn preopen(&self, fd: u32) -> Option<String> {
        self.fds
            .lock()
            .get(fd as usize)
            .and_then(Option::as_ref)
            .and_then(|entry| entry.preopen.clone())
    }

    /// Release `fd`; the slot number is not reused
    pub fn close_fd(&self, fd: u32) -> Result<(), WasiErrno> {
        let mut fds = self.fds.lock();
        let slot = fds.get_mut(fd as usize).ok_or(WasiErrno::BadF)?;
        match slot.take() {
            Some(_) => Ok(()),
            None => Err(WasiErrno::BadF),
        }
    }

    /// Scatter-read from `fd` into the buffers described by the iovec array
    /// at `iovs_ptr`, returning the number of bytes read
    pub fn fd_read(&self, memory: &Memory, fd: u32, iovs_ptr: u32, iovs_len: u32) -> Result<usize, WasiErrno> {
        let iovecs = read_iovecs(memory, iovs_ptr, iovs_len)?;
        let mut fds = self.fds.lock();
        let reader = fds
            .get_mut(fd as usize)
            .and_then(Option::as_mut)
            .and_then(|entry| entry.reader.as_mut())
            .ok_or(WasiErrno::BadF)?;

        let mut total = 0;
        for (buf_ptr, buf_len) in iovecs {
            if buf_len == 0 {
                continue;
            }
            let mut buf = vec![0u8; buf_len as usize];
            let n = loop {
                match reader.read(&mut buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            };
            if n == 0 {
                break;
            }
            memory.set_data(&buf[..n], buf_ptr as u64).map_err(|_| WasiErrno::Fault)?;
            total += n;
            if n < buf.len() {
                break;
            }
        }
        Ok(total)
    }

    /// Gather-write the buffers described by the iovec array at `iovs_ptr` to
    /// `fd`, returning the number of bytes written
    pub fn fd_write(&self, memory: &Memory, fd: u32, iovs_ptr: u32, iovs_len: u32) -> Result<usize, WasiErrno> {
        let iovecs = read_iovecs(memory, iovs_ptr, iovs_len)?;
        let mut fds = self.fds.lock();
        let writer = fds
            .get_mut(fd as usize)
            .and_then(Option::as_mut)
            .and_then(|entry| entry.writer.as_mut())
            .ok_or(WasiErrno::BadF)?;

        let mut total = 0;
        for (buf_ptr, buf_len) in iovecs {
            if buf_len == 0 {
                continue;
            }
            let data = memory
                .get_data(buf_ptr as u64, buf_len as usize)
                .map_err(|_| WasiErrno::Fault)?;
            writer.write_all(&data)?;
            total += data.len();
        }
        writer.flush()?;
        Ok(total)
    }
}

/// Each iovec is a 4-byte buffer pointer followed by a 4-byte length
fn read_iovecs(memory: &Memory, ptr: u32, len: u32) -> Result<Vec<(u32, u32)>, WasiErrno> {
    (0..len as u64)
        .map(|i| {
            let base = ptr as u64 + i * 8;
            let buf_ptr = memory.read_u32(base).map_err(|_| WasiErrno::Fault)?;
            let buf_len = memory.read_u32(base + 4).map_err(|_| WasiErrno::Fault)?;
            Ok((buf_ptr, buf_len))
        })
        .collect()
}

impl std::fmt::Debug for WasiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasiContext")
            .field("args", &self.args)
            .field("envs", &self.envs)
            .field("exit_code", &self.exit_code())
            .finish()
    }
}

#[derive(Default)]
pub struct WasiContextBuilder {
    args: Vec<String>,
    envs: Vec<String>,
    preopens: Vec<String>,
    stdin: Option<Box<dyn Read + Send>>,
    stdout: Option<Box<dyn Write + Send>>,
    stderr: Option<Box<dyn Write + Send>>,
}

impl WasiContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Environment as `NAME=value` strings
    pub fn envs(mut self, envs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.envs = envs.into_iter().map(Into::into).collect();
        self
    }

    /// Directories to expose as preopens, numbered from fd 3 in order
    pub fn preopens(mut self, dirs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.preopens = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn stdin(mut self, stdin: Box<dyn Read + Send>) -> Self {
        self.stdin = Some(stdin);
        self
    }

    pub fn stdout(mut self, stdout: Box<dyn Write + Send>) -> Self {
        self.stdout = Some(stdout);
        self
    }

    pub fn stderr(mut self, stderr: Box<dyn Write + Send>) -> Self {
        self.stderr = Some(stderr);
        self
    }

    /// Use the host process's standard streams for any stream not set yet
    pub fn inherit_stdio(mut self) -> Self {
        self.stdin.get_or_insert_with(|| Box::new(std::io::stdin()));
        self.stdout.get_or_insert_with(|| Box::new(std::io::stdout()));
        self.stderr.get_or_insert_with(|| Box::new(std::io::stderr()));
        self
    }

    pub fn build(self) -> WasiContext {
        let mut fds = vec![
            self.stdin.map(FileDescriptor::new_reader),
            self.stdout.map(FileDescriptor::new_writer),
            self.stderr.map(FileDescriptor::new_writer),
        ];
        fds.extend(self.preopens.into_iter().map(|dir| Some(FileDescriptor::new_preopen(dir))));
        WasiContext {
            fds: Mutex::new(fds),
            args: self.args,
            envs: self.envs,
            exit_code: Mutex::new(None),
            started: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{Limit, MemoryType};
    use crate::runtime::MemoryInstance;
    use std::io::Cursor;
    use std::sync::Arc;

    struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn memory() -> MemoryInstance {
        Memory::new(MemoryType::new(Limit::new(1, None))).unwrap()
    }

    #[test]
    fn test_builder_sets_args_and_envs() {
        let ctx = WasiContext::builder()
            .args(["program", "arg1"])
            .envs(["HOME=/home/user"])
            .build();
        assert_eq!(ctx.args(), ["program", "arg1"]);
        assert_eq!(ctx.envs(), ["HOME=/home/user"]);
        assert!(ctx.exit_code().is_none());
    }

    #[test]
    fn preopens_start_at_fd_3() {
        let ctx = WasiContext::builder().preopens(["/sandbox", "/tmp"]).build();
        assert_eq!(ctx.preopen(3).as_deref(), Some("/sandbox"));
        assert_eq!(ctx.preopen(4).as_deref(), Some("/tmp"));
        assert_eq!(ctx.preopen(1), None);
        assert_eq!(ctx.preopen(5), None);
    }

    #[test]
    fn test_fd_write_to_captured_stdout() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let ctx = WasiContext::builder()
            .stdout(Box::new(CapturedWriter(Arc::clone(&captured))))
            .build();
        let mem = memory();
        mem.set_data(b"Hello, ", 100).unwrap();
        mem.set_data(b"World!", 200).unwrap();
        // two iovecs: {100, 7} and {200, 6}
        for (i, word) in [100u32, 7, 200, 6].iter().enumerate() {
            mem.write_u32(i as u64 * 4, *word).unwrap();
        }
        assert_eq!(ctx.fd_write(&mem, 1, 0, 2), Ok(13));
        assert_eq!(&*captured.lock(), b"Hello, World!");
    }

    #[test]
    fn test_fd_read_from_mock_stdin() {
        let ctx = WasiContext::builder()
            .stdin(Box::new(Cursor::new(b"test input\n".to_vec())))
            .build();
        let mem = memory();
        mem.write_u32(0, 100).unwrap();
        mem.write_u32(4, 64).unwrap();
        assert_eq!(ctx.fd_read(&mem, 0, 0, 1), Ok(11));
        assert_eq!(mem.get_data(100, 11).unwrap(), b"test input\n");
        // at EOF the next read yields nothing
        assert_eq!(ctx.fd_read(&mem, 0, 0, 1), Ok(0));
    }

    #[test]
    fn iovec_outside_memory_is_a_fault() {
        let ctx = WasiContext::builder().stdout(Box::new(std::io::sink())).build();
        let mem = memory();
        mem.write_u32(0, u32::MAX - 2).unwrap();
        mem.write_u32(4, 8).unwrap();
        assert_eq!(ctx.fd_write(&mem, 1, 0, 1), Err(WasiErrno::Fault));
        assert_eq!(ctx.fd_write(&mem, 1, u32::MAX - 4, 1), Err(WasiErrno::Fault));
    }

    #[test]
    fn test_bad_fd_returns_error() {
        let ctx = WasiContext::builder().build();
        let mem = memory();
        assert_eq!(ctx.fd_read(&mem, 99, 0, 0), Err(WasiErrno::BadF));
        assert_eq!(ctx.fd_write(&mem, 0, 0, 0), Err(WasiErrno::BadF));
    }

    #[test]
    fn close_fd_once() {
        let ctx = WasiContext::builder().stdout(Box::new(std::io::sink())).build();
        assert_eq!(ctx.close_fd(1), Ok(()));
        assert_eq!(ctx.close_fd(1), Err(WasiErrno::BadF));
        assert_eq!(ctx.close_fd(42), Err(WasiErrno::BadF));
    }
}
