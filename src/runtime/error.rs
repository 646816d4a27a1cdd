//! Error taxonomy and the stable numeric result encoding

use std::fmt;

use crate::ast::types::ExternalKind;

/// Runtime fault that aborts the current call chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Trap {
    #[error("unreachable instruction")]
    Unreachable,
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    #[error("out of bounds table access")]
    TableOutOfBounds,
    #[error("integer divide by zero")]
    DivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConvToInt,
    #[error("call stack exhausted")]
    CallStackExhausted,
    #[error("undefined element")]
    UndefinedElement,
    #[error("uninitialized element")]
    UninitializedElement,
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    #[error("cost limit exceeded")]
    CostLimitExceeded,
    #[error("execution interrupted")]
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("unknown import: {module}.{name}")]
    UnknownImport { module: String, name: String },
    #[error("incompatible import type for {module}.{name}: {reason}")]
    IncompatibleImportType {
        module: String,
        name: String,
        reason: String,
    },
    #[error("module name conflict: {0}")]
    ModuleNameConflict(String),
    #[error("anonymous module instance cannot be registered")]
    AnonymousModule,
    #[error("module instance {0} is already linked into a store")]
    AlreadyLinked(String),
    #[error("data segment does not fit")]
    DataSegmentDoesNotFit,
    #[error("elements segment does not fit")]
    ElementSegmentDoesNotFit,
    #[error(transparent)]
    Trap(#[from] Trap),
    #[error("host function failed with user code {0:#x}")]
    Host(u32),
    #[error("terminated")]
    Terminated,
    #[error("function signature mismatch: {0}")]
    FuncSigMismatch(String),
    #[error("wrong instance address")]
    WrongInstanceAddress,
    #[error("wrong instance index: {0}")]
    WrongInstanceIndex(u32),
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("set value to const global")]
    SetValueToConst,
    #[error("set value with wrong type: expected {expected}, got {actual}")]
    SetValueErrorType { expected: String, actual: String },
    #[error("expected {expected} extern, got {actual}")]
    VariantMismatch {
        expected: ExternalKind,
        actual: ExternalKind,
    },
    #[error("wasm function not found: {0}")]
    FuncNotFound(String),
    #[error("invalid path: {0}")]
    IllegalPath(String),
    #[error("read error: {0}")]
    ReadError(String),
    #[error("malformed module: {0}")]
    Malformed(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("plugin already registered: {0}")]
    PluginConflict(String),
    #[error("plugin or plugin module not found: {0}")]
    PluginNotFound(String),
}

impl RuntimeError {
    pub fn type_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        RuntimeError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn code(&self) -> ErrCode {
        match self {
            RuntimeError::UnknownImport { .. } => ErrCode::UnknownImport,
            RuntimeError::IncompatibleImportType { .. } => ErrCode::IncompatibleImportType,
            RuntimeError::ModuleNameConflict(_) => ErrCode::ModuleNameConflict,
            RuntimeError::AnonymousModule | RuntimeError::AlreadyLinked(_) => ErrCode::WrongVMWorkflow,
            RuntimeError::DataSegmentDoesNotFit => ErrCode::DataSegDoesNotFit,
            RuntimeError::ElementSegmentDoesNotFit => ErrCode::ElemSegDoesNotFit,
            RuntimeError::Trap(trap) => trap.code(),
            // user codes are encoded separately by ResultCode
            RuntimeError::Host(_) => ErrCode::ExecutionFailed,
            RuntimeError::Terminated => ErrCode::Terminated,
            RuntimeError::FuncSigMismatch(_) => ErrCode::FuncSigMismatch,
            RuntimeError::WrongInstanceAddress => ErrCode::WrongInstanceAddress,
            RuntimeError::WrongInstanceIndex(_) => ErrCode::WrongInstanceIndex,
            RuntimeError::TypeMismatch { .. } => ErrCode::InstrTypeMismatch,
            RuntimeError::SetValueToConst => ErrCode::SetValueToConst,
            RuntimeError::SetValueErrorType { .. } => ErrCode::SetValueErrorType,
            RuntimeError::VariantMismatch { .. } => ErrCode::RefTypeMismatch,
            RuntimeError::FuncNotFound(_) => ErrCode::FuncNotFound,
            RuntimeError::IllegalPath(_) => ErrCode::IllegalPath,
            RuntimeError::ReadError(_) => ErrCode::ReadError,
            RuntimeError::Malformed(_) => ErrCode::MalformedModule,
            RuntimeError::Config(_) | RuntimeError::Spawn(_) => ErrCode::RuntimeError,
            RuntimeError::ExecutionFailed(_) => ErrCode::ExecutionFailed,
            RuntimeError::PluginConflict(_) => ErrCode::ModuleNameConflict,
            RuntimeError::PluginNotFound(_) => ErrCode::WrongVMWorkflow,
        }
    }
}

impl Trap {
    pub fn code(&self) -> ErrCode {
        match self {
            Trap::Unreachable => ErrCode::Unreachable,
            Trap::MemoryOutOfBounds => ErrCode::MemoryOutOfBounds,
            Trap::TableOutOfBounds => ErrCode::TableOutOfBounds,
            Trap::DivideByZero => ErrCode::DivideByZero,
            Trap::IntegerOverflow => ErrCode::IntegerOverflow,
            Trap::InvalidConvToInt => ErrCode::InvalidConvToInt,
            Trap::CallStackExhausted => ErrCode::CallStackExhausted,
            Trap::UndefinedElement => ErrCode::UndefinedElement,
            Trap::UninitializedElement => ErrCode::UninitializedElement,
            Trap::IndirectCallTypeMismatch => ErrCode::IndirectCallTypeMismatch,
            Trap::CostLimitExceeded => ErrCode::CostLimitExceeded,
            Trap::Interrupted => ErrCode::Interrupted,
        }
    }
}

/// Standard error codes of the WASM category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrCode {
    Success = 0x00,
    Terminated = 0x01,
    RuntimeError = 0x02,
    CostLimitExceeded = 0x03,
    WrongVMWorkflow = 0x04,
    FuncNotFound = 0x05,
    AOTDisabled = 0x06,
    Interrupted = 0x07,
    SetValueToConst = 0x08,
    SetValueErrorType = 0x09,
    IllegalPath = 0x20,
    ReadError = 0x21,
    MalformedModule = 0x22,
    ModuleNameConflict = 0x60,
    IncompatibleImportType = 0x61,
    UnknownImport = 0x62,
    DataSegDoesNotFit = 0x63,
    ElemSegDoesNotFit = 0x64,
    WrongInstanceAddress = 0x80,
    WrongInstanceIndex = 0x81,
    InstrTypeMismatch = 0x82,
    FuncSigMismatch = 0x83,
    DivideByZero = 0x84,
    IntegerOverflow = 0x85,
    InvalidConvToInt = 0x86,
    TableOutOfBounds = 0x87,
    MemoryOutOfBounds = 0x88,
    Unreachable = 0x89,
    UninitializedElement = 0x8A,
    UndefinedElement = 0x8B,
    IndirectCallTypeMismatch = 0x8C,
    ExecutionFailed = 0x8D,
    RefTypeMismatch = 0x8E,
    CallStackExhausted = 0x8F,
}

const ALL_CODES: [ErrCode; 34] = [
    ErrCode::Success,
    ErrCode::Terminated,
    ErrCode::RuntimeError,
    ErrCode::CostLimitExceeded,
    ErrCode::WrongVMWorkflow,
    ErrCode::FuncNotFound,
    ErrCode::AOTDisabled,
    ErrCode::Interrupted,
    ErrCode::SetValueToConst,
    ErrCode::SetValueErrorType,
    ErrCode::IllegalPath,
    ErrCode::ReadError,
    ErrCode::MalformedModule,
    ErrCode::ModuleNameConflict,
    ErrCode::IncompatibleImportType,
    ErrCode::UnknownImport,
    ErrCode::DataSegDoesNotFit,
    ErrCode::ElemSegDoesNotFit,
    ErrCode::WrongInstanceAddress,
    ErrCode::WrongInstanceIndex,
    ErrCode::InstrTypeMismatch,
    ErrCode::FuncSigMismatch,
    ErrCode::DivideByZero,
    ErrCode::IntegerOverflow,
    ErrCode::InvalidConvToInt,
    ErrCode::TableOutOfBounds,
    ErrCode::MemoryOutOfBounds,
    ErrCode::Unreachable,
    ErrCode::UninitializedElement,
    ErrCode::UndefinedElement,
    ErrCode::IndirectCallTypeMismatch,
    ErrCode::ExecutionFailed,
    ErrCode::RefTypeMismatch,
    ErrCode::CallStackExhausted,
];

impl ErrCode {
    pub fn from_u32(code: u32) -> Option<Self> {
        ALL_CODES.iter().copied().find(|c| *c as u32 == code)
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrCode::Success => "success",
            ErrCode::Terminated => "terminated",
            ErrCode::RuntimeError => "generic runtime error",
            ErrCode::CostLimitExceeded => "cost limit exceeded",
            ErrCode::WrongVMWorkflow => "wrong VM workflow",
            ErrCode::FuncNotFound => "wasm function not found",
            ErrCode::AOTDisabled => "AOT runtime is disabled in this build",
            ErrCode::Interrupted => "execution interrupted",
            ErrCode::SetValueToConst => "set value to const",
            ErrCode::SetValueErrorType => "set value type mismatch",
            ErrCode::IllegalPath => "invalid path",
            ErrCode::ReadError => "read error",
            ErrCode::MalformedModule => "malformed module",
            ErrCode::ModuleNameConflict => "module name conflict",
            ErrCode::IncompatibleImportType => "incompatible import type",
            ErrCode::UnknownImport => "unknown import",
            ErrCode::DataSegDoesNotFit => "data segment does not fit",
            ErrCode::ElemSegDoesNotFit => "elements segment does not fit",
            ErrCode::WrongInstanceAddress => "wrong instance address",
            ErrCode::WrongInstanceIndex => "wrong instance index",
            ErrCode::InstrTypeMismatch => "instruction type mismatch",
            ErrCode::FuncSigMismatch => "function signature mismatch",
            ErrCode::DivideByZero => "integer divide by zero",
            ErrCode::IntegerOverflow => "integer overflow",
            ErrCode::InvalidConvToInt => "invalid conversion to integer",
            ErrCode::TableOutOfBounds => "out of bounds table access",
            ErrCode::MemoryOutOfBounds => "out of bounds memory access",
            ErrCode::Unreachable => "unreachable",
            ErrCode::UninitializedElement => "uninitialized element",
            ErrCode::UndefinedElement => "undefined element",
            ErrCode::IndirectCallTypeMismatch => "indirect call type mismatch",
            ErrCode::ExecutionFailed => "host function failed",
            ErrCode::RefTypeMismatch => "reference type mismatch",
            ErrCode::CallStackExhausted => "call stack exhausted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrCategory {
    Wasm = 0,
    UserLevel = 1,
}

/// 32-bit result value: category in the top 8 bits, code in the low 24
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(u32);

const CODE_MASK: u32 = 0x00ff_ffff;
const USER_MESSAGE: &str = "user defined error code";

impl ResultCode {
    pub fn success() -> Self {
        ResultCode(ErrCode::Success as u32)
    }

    pub fn terminated() -> Self {
        ResultCode(ErrCode::Terminated as u32)
    }

    pub fn wasm(code: ErrCode) -> Self {
        ResultCode(code as u32)
    }

    /// A user-level code; bits above the low 24 are discarded
    pub fn user(code: u32) -> Self {
        ResultCode(((ErrCategory::UserLevel as u32) << 24) | (code & CODE_MASK))
    }

    pub fn from_raw(raw: u32) -> Self {
        ResultCode(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn category(self) -> ErrCategory {
        if self.0 >> 24 == ErrCategory::Wasm as u32 {
            ErrCategory::Wasm
        } else {
            ErrCategory::UserLevel
        }
    }

    pub fn code(self) -> u32 {
        self.0 & CODE_MASK
    }

    pub fn is_ok(self) -> bool {
        self.category() == ErrCategory::Wasm
            && (self.code() == ErrCode::Success as u32 || self.code() == ErrCode::Terminated as u32)
    }

    /// Human-readable message; user-level codes all share one generic text
    pub fn message(self) -> &'static str {
        match self.category() {
            ErrCategory::UserLevel => USER_MESSAGE,
            ErrCategory::Wasm => ErrCode::from_u32(self.code()).map_or("unknown error code", ErrCode::message),
        }
    }
}

impl From<&RuntimeError> for ResultCode {
    fn from(err: &RuntimeError) -> Self {
        match err {
            RuntimeError::Host(code) => ResultCode::user(*code),
            other => ResultCode::wasm(other.code()),
        }
    }
}

impl<T> From<&Result<T, RuntimeError>> for ResultCode {
    fn from(result: &Result<T, RuntimeError>) -> Self {
        match result {
            Ok(_) => ResultCode::success(),
            Err(err) => err.into(),
        }
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultCode({:?}, {:#x})", self.category(), self.code())
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Successful end of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The function returned normally and its results were written
    Returned,
    /// A host function requested termination; no results were written
    Terminated,
}

impl Completion {
    pub fn result_code(self) -> ResultCode {
        match self {
            Completion::Returned => ResultCode::success(),
            Completion::Terminated => ResultCode::terminated(),
        }
    }
}
