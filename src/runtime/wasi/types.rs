//! WASI preview1 constants
//!
//! See: <https://github.com/WebAssembly/WASI/blob/wasi-0.1/preview1/docs.md#errno>

/// Errno values returned by the host functions of this module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WasiErrno {
    Success = 0,
    /// Permission denied
    Access = 2,
    /// Bad file descriptor
    BadF = 8,
    /// Bad address: the guest passed a range outside its memory, or has none
    Fault = 21,
    /// Invalid argument
    Inval = 28,
    Io = 29,
    /// Function not supported
    NoSys = 52,
    /// Value too large to be stored in data type
    Overflow = 61,
}

impl WasiErrno {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl From<WasiErrno> for u32 {
    fn from(errno: WasiErrno) -> u32 {
        errno as u32
    }
}

impl From<std::io::Error> for WasiErrno {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => WasiErrno::Access,
            std::io::ErrorKind::Unsupported => WasiErrno::NoSys,
            _ => WasiErrno::Io,
        }
    }
}

/// Clocks understood by `clock_time_get`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockId {
    Realtime,
    Monotonic,
    ProcessCpuTime,
    ThreadCpuTime,
}

impl TryFrom<u32> for ClockId {
    type Error = WasiErrno;

    fn try_from(id: u32) -> Result<Self, WasiErrno> {
        match id {
            0 => Ok(ClockId::Realtime),
            1 => Ok(ClockId::Monotonic),
            2 => Ok(ClockId::ProcessCpuTime),
            3 => Ok(ClockId::ThreadCpuTime),
            _ => Err(WasiErrno::Inval),
        }
    }
}

/// `preopentype::dir`, the only preopen kind preview1 defines
pub const PREOPENTYPE_DIR: u8 = 0;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_errno_values() {
        assert_eq!(WasiErrno::Success.as_u32(), 0);
        assert_eq!(WasiErrno::BadF.as_u32(), 8);
        assert_eq!(WasiErrno::Fault.as_u32(), 21);
        assert_eq!(u32::from(WasiErrno::Inval), 28);
    }

    #[rstest]
    #[case(0, Ok(ClockId::Realtime))]
    #[case(1, Ok(ClockId::Monotonic))]
    #[case(3, Ok(ClockId::ThreadCpuTime))]
    #[case(4, Err(WasiErrno::Inval))]
    fn clock_ids(#[case] id: u32, #[case] expected: Result<ClockId, WasiErrno>) {
        assert_eq!(ClockId::try_from(id), expected);
    }

    #[test]
    fn io_errors_map_to_errno() {
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(WasiErrno::from(denied), WasiErrno::Access);
        let other = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert_eq!(WasiErrno::from(other), WasiErrno::Io);
    }
}
