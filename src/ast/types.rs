//! Type descriptors shared by the AST and the runtime
//!
//! Every descriptor here is immutable once built. Runtime objects hand them out
//! by reference, so a borrowed `&FunctionType` lives no longer than the instance
//! or module it was taken from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runtime::RuntimeError;

/// Heap category of a reference type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeapType {
    Func,
    Extern,
}

/// A reference type: a heap category plus nullability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefType {
    pub heap: HeapType,
    pub nullable: bool,
}

impl RefType {
    pub const FUNCREF: RefType = RefType {
        heap: HeapType::Func,
        nullable: true,
    };
    pub const EXTERNREF: RefType = RefType {
        heap: HeapType::Extern,
        nullable: true,
    };

    pub fn non_null(heap: HeapType) -> Self {
        RefType { heap, nullable: false }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.heap, self.nullable) {
            (HeapType::Func, true) => write!(f, "funcref"),
            (HeapType::Extern, true) => write!(f, "externref"),
            (HeapType::Func, false) => write!(f, "(ref func)"),
            (HeapType::Extern, false) => write!(f, "(ref extern)"),
        }
    }
}

/// Category of a WebAssembly value
///
/// Two `ValType`s are the same type exactly when their [`ValType::to_code`]
/// encodings are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
    V128,
    Ref(RefType),
}

impl ValType {
    pub const FUNCREF: ValType = ValType::Ref(RefType::FUNCREF);
    pub const EXTERNREF: ValType = ValType::Ref(RefType::EXTERNREF);

    /// Fixed-size encoding: the binary-format type byte in the low 8 bits,
    /// bit 8 set for non-nullable references.
    pub fn to_code(self) -> u64 {
        match self {
            ValType::I32 => 0x7f,
            ValType::I64 => 0x7e,
            ValType::F32 => 0x7d,
            ValType::F64 => 0x7c,
            ValType::V128 => 0x7b,
            ValType::Ref(r) => {
                let byte = match r.heap {
                    HeapType::Func => 0x70,
                    HeapType::Extern => 0x6f,
                };
                if r.nullable {
                    byte
                } else {
                    byte | 0x100
                }
            }
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        let nullable = code & 0x100 == 0;
        let ty = match code & 0xff {
            0x7f => ValType::I32,
            0x7e => ValType::I64,
            0x7d => ValType::F32,
            0x7c => ValType::F64,
            0x7b => ValType::V128,
            0x70 => ValType::Ref(RefType {
                heap: HeapType::Func,
                nullable,
            }),
            0x6f => ValType::Ref(RefType {
                heap: HeapType::Extern,
                nullable,
            }),
            _ => return None,
        };
        if !nullable && !ty.is_ref() {
            return None;
        }
        Some(ty)
    }

    pub fn is_ref(self) -> bool {
        matches!(self, ValType::Ref(_))
    }

    pub fn is_num(self) -> bool {
        matches!(self, ValType::I32 | ValType::I64 | ValType::F32 | ValType::F64)
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValType::I32 => write!(f, "i32"),
            ValType::I64 => write!(f, "i64"),
            ValType::F32 => write!(f, "f32"),
            ValType::F64 => write!(f, "f64"),
            ValType::V128 => write!(f, "v128"),
            ValType::Ref(r) => write!(f, "{r}"),
        }
    }
}

/// Size bounds of a table (in elements) or a memory (in pages)
///
/// `max` is only meaningful when `has_max` is set. Equality compares all four
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Limit {
    pub has_max: bool,
    pub shared: bool,
    pub min: u64,
    pub max: u64,
}

impl Limit {
    pub fn new(min: u64, max: Option<u64>) -> Self {
        Limit {
            has_max: max.is_some(),
            shared: false,
            min,
            max: max.unwrap_or(0),
        }
    }

    pub fn shared(min: u64, max: u64) -> Self {
        Limit {
            has_max: true,
            shared: true,
            min,
            max,
        }
    }

    pub fn max(&self) -> Option<u64> {
        self.has_max.then_some(self.max)
    }

    /// Import matching: an instance whose current size is `actual_min` and whose
    /// limit is `self` may satisfy an import declaring `wanted`.
    pub fn satisfies(&self, actual_min: u64, wanted: &Limit) -> bool {
        if actual_min < wanted.min {
            return false;
        }
        if self.shared != wanted.shared {
            return false;
        }
        match (self.max(), wanted.max()) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(have), Some(want)) => have <= want,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max() {
            Some(max) => write!(f, "{{min {}, max {}}}", self.min, max),
            None => write!(f, "{{min {}}}", self.min),
        }
    }
}

/// Ordered parameter and result types of a function
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FunctionType {
    params: Vec<ValType>,
    results: Vec<ValType>,
}

impl FunctionType {
    pub fn new(params: impl Into<Vec<ValType>>, results: impl Into<Vec<ValType>>) -> Self {
        FunctionType {
            params: params.into(),
            results: results.into(),
        }
    }

    pub fn params(&self) -> &[ValType] {
        &self.params
    }

    pub fn results(&self) -> &[ValType] {
        &self.results
    }

    pub fn params_len(&self) -> usize {
        self.params.len()
    }

    pub fn results_len(&self) -> usize {
        self.results.len()
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[ValType]| types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        write!(f, "({}) -> ({})", join(&self.params), join(&self.results))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableType {
    pub element: RefType,
    pub limit: Limit,
}

impl TableType {
    pub fn new(element: RefType, limit: Limit) -> Self {
        TableType { element, limit }
    }
}

/// Memory descriptor; the limit is counted in 64KiB pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryType {
    pub limit: Limit,
}

impl MemoryType {
    pub fn new(limit: Limit) -> Self {
        MemoryType { limit }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mutability {
    Const,
    Var,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalType {
    pub content: ValType,
    pub mutability: Mutability,
}

impl GlobalType {
    pub fn new(content: ValType, mutability: Mutability) -> Self {
        GlobalType { content, mutability }
    }

    pub fn is_mutable(&self) -> bool {
        self.mutability == Mutability::Var
    }
}

/// Exception tag descriptor: the payload signature of a throw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagType {
    signature: FunctionType,
}

impl TagType {
    pub fn new(signature: FunctionType) -> Self {
        TagType { signature }
    }

    pub fn function_type(&self) -> &FunctionType {
        &self.signature
    }
}

/// Discriminant of [`ExternalType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExternalKind {
    Function,
    Table,
    Memory,
    Global,
    Tag,
}

impl fmt::Display for ExternalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExternalKind::Function => "function",
            ExternalKind::Table => "table",
            ExternalKind::Memory => "memory",
            ExternalKind::Global => "global",
            ExternalKind::Tag => "tag",
        };
        f.write_str(name)
    }
}

/// The descriptor of an import or export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalType {
    Function(FunctionType),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
    Tag(TagType),
}

macro_rules! external_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Result<&$ty, RuntimeError> {
            match self {
                ExternalType::$variant(inner) => Ok(inner),
                other => Err(RuntimeError::VariantMismatch {
                    expected: ExternalKind::$variant,
                    actual: other.kind(),
                }),
            }
        }
    };
}

impl ExternalType {
    pub fn kind(&self) -> ExternalKind {
        match self {
            ExternalType::Function(_) => ExternalKind::Function,
            ExternalType::Table(_) => ExternalKind::Table,
            ExternalType::Memory(_) => ExternalKind::Memory,
            ExternalType::Global(_) => ExternalKind::Global,
            ExternalType::Tag(_) => ExternalKind::Tag,
        }
    }

    external_accessor!(function_type, Function, FunctionType);
    external_accessor!(table_type, Table, TableType);
    external_accessor!(memory_type, Memory, MemoryType);
    external_accessor!(global_type, Global, GlobalType);
    external_accessor!(tag_type, Tag, TagType);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportType {
    pub module: String,
    pub name: String,
    pub ty: ExternalType,
}

impl ImportType {
    pub fn kind(&self) -> ExternalKind {
        self.ty.kind()
    }
}

/// An export entry: its name, its descriptor and the index it exports within
/// the module's index space of that kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportType {
    pub name: String,
    pub ty: ExternalType,
    pub index: u32,
}

impl ExportType {
    pub fn kind(&self) -> ExternalKind {
        self.ty.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(vec![], vec![])]
    #[case(vec![ValType::I32, ValType::I32], vec![ValType::I32])]
    #[case(vec![ValType::F64], vec![ValType::I64, ValType::FUNCREF, ValType::V128])]
    #[case(vec![], vec![ValType::EXTERNREF])]
    fn function_type_keeps_order(#[case] params: Vec<ValType>, #[case] results: Vec<ValType>) {
        let ty = FunctionType::new(params.clone(), results.clone());
        assert_eq!(ty.params(), params.as_slice());
        assert_eq!(ty.results(), results.as_slice());
        assert_eq!(ty.params_len(), params.len());
        assert_eq!(ty.results_len(), results.len());
    }

    #[test]
    fn limit_equality_covers_every_field() {
        let base = Limit {
            has_max: true,
            shared: false,
            min: 1,
            max: 4,
        };
        assert_eq!(base, base.clone());
        assert_ne!(base, Limit { has_max: false, ..base });
        assert_ne!(base, Limit { shared: true, ..base });
        assert_ne!(base, Limit { min: 2, ..base });
        assert_ne!(base, Limit { max: 5, ..base });
    }

    #[test]
    fn val_type_codes() {
        for ty in [
            ValType::I32,
            ValType::I64,
            ValType::F32,
            ValType::F64,
            ValType::V128,
            ValType::FUNCREF,
            ValType::EXTERNREF,
            ValType::Ref(RefType::non_null(HeapType::Func)),
        ] {
            assert_eq!(ValType::from_code(ty.to_code()), Some(ty));
        }
        assert_ne!(
            ValType::FUNCREF.to_code(),
            ValType::Ref(RefType::non_null(HeapType::Func)).to_code()
        );
        assert_eq!(ValType::from_code(0x17f), None);
        assert_eq!(ValType::from_code(0x00), None);
    }

    #[test]
    fn limit_satisfies_import() {
        let have = Limit::new(2, Some(4));
        assert!(have.satisfies(2, &Limit::new(1, None)));
        assert!(have.satisfies(2, &Limit::new(2, Some(8))));
        assert!(!have.satisfies(2, &Limit::new(3, None)));
        assert!(!have.satisfies(2, &Limit::new(1, Some(3))));
        assert!(!Limit::new(1, None).satisfies(1, &Limit::new(1, Some(10))));
    }

    #[test]
    fn external_type_wrong_kind() {
        let ext = ExternalType::Memory(MemoryType::new(Limit::new(1, None)));
        assert!(ext.memory_type().is_ok());
        let err = ext.function_type().unwrap_err();
        assert_eq!(
            err,
            RuntimeError::VariantMismatch {
                expected: ExternalKind::Function,
                actual: ExternalKind::Memory,
            }
        );
    }
}
