//! Primitive type registry.
//!
//! Every type the compiler works with is one of a closed set of wasm-mapped
//! primitives, interned in a [`TypeRegistry`] so that equal kinds share one
//! [`Ty`] handle. The registry is parameterized by the target word size,
//! which decides whether `uintptr` lowers to `i32` or `i64`, and answers all
//! derived questions: byte size, signedness, integer/long/float family
//! membership, the sub-word shift and mask constants used by the conversion
//! engine, and the one-character signature tag used for function type
//! interning.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use wasm_encoder::ValType;

/// An interned type handle.
///
/// Equal type kinds always intern to the same `Ty` value, so type equality
/// is an integer compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ty(pub u32);

impl Ty {
    pub const VOID: Ty = Ty(0);
    pub const BOOL: Ty = Ty(1);
    pub const BYTE: Ty = Ty(2);
    pub const SBYTE: Ty = Ty(3);
    pub const SHORT: Ty = Ty(4);
    pub const USHORT: Ty = Ty(5);
    pub const INT: Ty = Ty(6);
    pub const UINT: Ty = Ty(7);
    pub const LONG: Ty = Ty(8);
    pub const ULONG: Ty = Ty(9);
    pub const FLOAT: Ty = Ty(10);
    pub const DOUBLE: Ty = Ty(11);
    /// The bare pointer-sized integer, with no element type attached.
    pub const UINTPTR: Ty = Ty(12);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ty({})", self.0)
    }
}

/// Canonical type kinds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TyKind {
    Void,
    Bool,
    Byte,
    SByte,
    Short,
    UShort,
    Int,
    Uint,
    Long,
    Ulong,
    Float,
    Double,
    /// Pointer-sized integer. `Ptr<T>` resolves to this kind with the
    /// element type preserved for later passes; plain `uintptr` has none.
    Uintptr { elem: Option<Ty> },
}

/// Raised when the compiler is configured with a word size other than 4 or 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported target word size {0}: expected 4 or 8")]
pub struct UnsupportedWordSize(pub u8);

/// Interning registry for the primitive type lattice.
pub struct TypeRegistry {
    word_size: u8,
    cache: HashMap<TyKind, Ty>,
    kinds: Vec<TyKind>,
}

impl TypeRegistry {
    /// Create a registry for the given target word size (4 or 8 bytes).
    pub fn new(word_size: u8) -> Result<Self, UnsupportedWordSize> {
        if word_size != 4 && word_size != 8 {
            return Err(UnsupportedWordSize(word_size));
        }

        let mut registry = Self {
            word_size,
            cache: HashMap::new(),
            kinds: Vec::new(),
        };

        // Pre-intern the closed set at the indices the Ty::* constants name.
        assert_eq!(registry.intern(TyKind::Void), Ty::VOID);
        assert_eq!(registry.intern(TyKind::Bool), Ty::BOOL);
        assert_eq!(registry.intern(TyKind::Byte), Ty::BYTE);
        assert_eq!(registry.intern(TyKind::SByte), Ty::SBYTE);
        assert_eq!(registry.intern(TyKind::Short), Ty::SHORT);
        assert_eq!(registry.intern(TyKind::UShort), Ty::USHORT);
        assert_eq!(registry.intern(TyKind::Int), Ty::INT);
        assert_eq!(registry.intern(TyKind::Uint), Ty::UINT);
        assert_eq!(registry.intern(TyKind::Long), Ty::LONG);
        assert_eq!(registry.intern(TyKind::Ulong), Ty::ULONG);
        assert_eq!(registry.intern(TyKind::Float), Ty::FLOAT);
        assert_eq!(registry.intern(TyKind::Double), Ty::DOUBLE);
        assert_eq!(registry.intern(TyKind::Uintptr { elem: None }), Ty::UINTPTR);

        Ok(registry)
    }

    /// Target word size in bytes.
    pub fn word_size(&self) -> u8 {
        self.word_size
    }

    fn intern(&mut self, kind: TyKind) -> Ty {
        if let Some(&ty) = self.cache.get(&kind) {
            return ty;
        }
        let ty = Ty(self.kinds.len() as u32);
        self.kinds.push(kind);
        self.cache.insert(kind, ty);
        ty
    }

    pub fn kind(&self, ty: Ty) -> TyKind {
        self.kinds[ty.index()]
    }

    /// Intern a pointer type carrying an element type.
    pub fn ptr_to(&mut self, elem: Ty) -> Ty {
        self.intern(TyKind::Uintptr { elem: Some(elem) })
    }

    /// The element type of a pointer, if `ty` is a pointer carrying one.
    pub fn pointee(&self, ty: Ty) -> Option<Ty> {
        match self.kind(ty) {
            TyKind::Uintptr { elem } => elem,
            _ => None,
        }
    }

    /// Look up a primitive by its surface name.
    ///
    /// This table is the set of admissible type names; nothing outside it
    /// (other than `Ptr<T>`) resolves.
    pub fn lookup_name(&self, name: &str) -> Option<Ty> {
        Some(match name {
            "void" => Ty::VOID,
            "bool" => Ty::BOOL,
            "byte" => Ty::BYTE,
            "sbyte" => Ty::SBYTE,
            "short" => Ty::SHORT,
            "ushort" => Ty::USHORT,
            "int" => Ty::INT,
            "uint" => Ty::UINT,
            "long" => Ty::LONG,
            "ulong" => Ty::ULONG,
            "float" => Ty::FLOAT,
            "double" => Ty::DOUBLE,
            "uintptr" => Ty::UINTPTR,
            _ => return None,
        })
    }

    /// Size in bytes. `void` is the only zero-sized type.
    pub fn size_of(&self, ty: Ty) -> u8 {
        match self.kind(ty) {
            TyKind::Void => 0,
            TyKind::Bool | TyKind::Byte | TyKind::SByte => 1,
            TyKind::Short | TyKind::UShort => 2,
            TyKind::Int | TyKind::Uint | TyKind::Float => 4,
            TyKind::Long | TyKind::Ulong | TyKind::Double => 8,
            TyKind::Uintptr { .. } => self.word_size,
        }
    }

    pub fn is_signed(&self, ty: Ty) -> bool {
        matches!(
            self.kind(ty),
            TyKind::SByte | TyKind::Short | TyKind::Int | TyKind::Long
        )
    }

    /// The 32-bit integer family: integers of at most 4 bytes, including
    /// `bool` and `uintptr` on 4-byte targets.
    pub fn is_int(&self, ty: Ty) -> bool {
        match self.kind(ty) {
            TyKind::Bool
            | TyKind::Byte
            | TyKind::SByte
            | TyKind::Short
            | TyKind::UShort
            | TyKind::Int
            | TyKind::Uint => true,
            TyKind::Uintptr { .. } => self.word_size == 4,
            _ => false,
        }
    }

    /// The 64-bit integer family: `long`, `ulong`, and `uintptr` on 8-byte
    /// targets.
    pub fn is_long(&self, ty: Ty) -> bool {
        match self.kind(ty) {
            TyKind::Long | TyKind::Ulong => true,
            TyKind::Uintptr { .. } => self.word_size == 8,
            _ => false,
        }
    }

    pub fn is_float(&self, ty: Ty) -> bool {
        matches!(self.kind(ty), TyKind::Float | TyKind::Double)
    }

    pub fn is_integer(&self, ty: Ty) -> bool {
        self.is_int(ty) || self.is_long(ty)
    }

    /// Shift amount that moves a sub-word value into the top of an i32.
    /// Only meaningful for integer types smaller than 4 bytes.
    pub fn shift32(&self, ty: Ty) -> u32 {
        32 - 8 * u32::from(self.size_of(ty))
    }

    /// Bit mask selecting the value bits of an integer within an i32.
    pub fn mask32(&self, ty: Ty) -> u32 {
        let size = self.size_of(ty);
        if size >= 4 {
            u32::MAX
        } else {
            (1u32 << (8 * u32::from(size))) - 1
        }
    }

    /// One-character signature tag, used to build function type keys.
    ///
    /// Types sharing a wasm value type share a tag, so signatures that
    /// lower identically intern to one function type.
    pub fn sig_char(&self, ty: Ty) -> char {
        match self.kind(ty) {
            TyKind::Void => 'v',
            TyKind::Float => 'f',
            TyKind::Double => 'F',
            _ if self.is_long(ty) => 'I',
            _ => 'i',
        }
    }

    /// The wasm value type a `ty` lowers to; `None` for `void`.
    pub fn val_type(&self, ty: Ty) -> Option<ValType> {
        match self.kind(ty) {
            TyKind::Void => None,
            TyKind::Float => Some(ValType::F32),
            TyKind::Double => Some(ValType::F64),
            _ if self.is_long(ty) => Some(ValType::I64),
            _ => Some(ValType::I32),
        }
    }

    /// Human-readable name for diagnostics.
    pub fn display(&self, ty: Ty) -> String {
        match self.kind(ty) {
            TyKind::Void => "void".into(),
            TyKind::Bool => "bool".into(),
            TyKind::Byte => "byte".into(),
            TyKind::SByte => "sbyte".into(),
            TyKind::Short => "short".into(),
            TyKind::UShort => "ushort".into(),
            TyKind::Int => "int".into(),
            TyKind::Uint => "uint".into(),
            TyKind::Long => "long".into(),
            TyKind::Ulong => "ulong".into(),
            TyKind::Float => "float".into(),
            TyKind::Double => "double".into(),
            TyKind::Uintptr { elem: None } => "uintptr".into(),
            TyKind::Uintptr { elem: Some(elem) } => format!("Ptr<{}>", self.display(elem)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_word_size() {
        assert_eq!(TypeRegistry::new(2).err(), Some(UnsupportedWordSize(2)));
        assert!(TypeRegistry::new(4).is_ok());
        assert!(TypeRegistry::new(8).is_ok());
    }

    #[test]
    fn sizes() {
        let reg = TypeRegistry::new(4).unwrap();
        assert_eq!(reg.size_of(Ty::VOID), 0);
        assert_eq!(reg.size_of(Ty::BOOL), 1);
        assert_eq!(reg.size_of(Ty::SBYTE), 1);
        assert_eq!(reg.size_of(Ty::USHORT), 2);
        assert_eq!(reg.size_of(Ty::INT), 4);
        assert_eq!(reg.size_of(Ty::FLOAT), 4);
        assert_eq!(reg.size_of(Ty::ULONG), 8);
        assert_eq!(reg.size_of(Ty::UINTPTR), 4);

        let reg64 = TypeRegistry::new(8).unwrap();
        assert_eq!(reg64.size_of(Ty::UINTPTR), 8);
    }

    #[test]
    fn uintptr_follows_word_size() {
        let reg32 = TypeRegistry::new(4).unwrap();
        assert!(reg32.is_int(Ty::UINTPTR));
        assert!(!reg32.is_long(Ty::UINTPTR));
        assert_eq!(reg32.val_type(Ty::UINTPTR), Some(ValType::I32));
        assert_eq!(reg32.sig_char(Ty::UINTPTR), 'i');

        let reg64 = TypeRegistry::new(8).unwrap();
        assert!(!reg64.is_int(Ty::UINTPTR));
        assert!(reg64.is_long(Ty::UINTPTR));
        assert_eq!(reg64.val_type(Ty::UINTPTR), Some(ValType::I64));
        assert_eq!(reg64.sig_char(Ty::UINTPTR), 'I');
    }

    #[test]
    fn shift_and_mask_constants() {
        let reg = TypeRegistry::new(4).unwrap();
        assert_eq!(reg.shift32(Ty::SBYTE), 24);
        assert_eq!(reg.shift32(Ty::SHORT), 16);
        assert_eq!(reg.mask32(Ty::BYTE), 0xFF);
        assert_eq!(reg.mask32(Ty::USHORT), 0xFFFF);
        assert_eq!(reg.mask32(Ty::UINT), 0xFFFF_FFFF);
    }

    #[test]
    fn pointer_interning_preserves_element() {
        let mut reg = TypeRegistry::new(4).unwrap();
        let p1 = reg.ptr_to(Ty::INT);
        let p2 = reg.ptr_to(Ty::INT);
        let p3 = reg.ptr_to(Ty::DOUBLE);
        assert_eq!(p1, p2);
        assert_ne!(p1, p3);
        assert_eq!(reg.pointee(p1), Some(Ty::INT));
        assert_eq!(reg.pointee(Ty::UINTPTR), None);
        assert_eq!(reg.display(p3), "Ptr<double>");

        // Annotated pointers stay in the pointer family.
        assert!(reg.is_int(p1));
        assert_eq!(reg.sig_char(p1), 'i');
    }

    #[test]
    fn signature_tags_collapse_to_wasm_types() {
        let reg = TypeRegistry::new(4).unwrap();
        assert_eq!(reg.sig_char(Ty::BYTE), 'i');
        assert_eq!(reg.sig_char(Ty::INT), 'i');
        assert_eq!(reg.sig_char(Ty::UINT), 'i');
        assert_eq!(reg.sig_char(Ty::BOOL), 'i');
        assert_eq!(reg.sig_char(Ty::LONG), 'I');
        assert_eq!(reg.sig_char(Ty::ULONG), 'I');
        assert_eq!(reg.sig_char(Ty::FLOAT), 'f');
        assert_eq!(reg.sig_char(Ty::DOUBLE), 'F');
        assert_eq!(reg.sig_char(Ty::VOID), 'v');
    }
}
