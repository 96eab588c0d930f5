//! Central compiler context.

use std::sync::Arc;

use crate::diagnostic::Diagnostics;
use crate::interner::{Interner, Name};
use crate::source::SourceMap;
use crate::symbols::SymbolTable;
use crate::types::{TypeRegistry, UnsupportedWordSize};

/// Global state of one compilation: the string interner, the primitive type
/// registry, the symbol tables built by pass 1, the source map and the
/// accumulated diagnostics. Each compilation owns a fresh instance.
pub struct CompilerContext {
    pub interner: Arc<Interner>,
    pub types: TypeRegistry,
    pub symbols: SymbolTable,
    pub source_map: SourceMap,
    pub diagnostics: Diagnostics,
}

impl CompilerContext {
    /// Create a context for the given target word size (4 or 8 bytes).
    pub fn new(word_size: u8) -> Result<Self, UnsupportedWordSize> {
        Ok(Self {
            interner: Arc::new(Interner::new()),
            types: TypeRegistry::new(word_size)?,
            symbols: SymbolTable::new(),
            source_map: SourceMap::new(),
            diagnostics: Diagnostics::new(),
        })
    }

    pub fn intern(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    pub fn str(&self, name: Name) -> String {
        self.interner.str(name).to_string()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }

    pub fn render_diagnostics(&self) -> String {
        self.diagnostics.render(&self.source_map)
    }
}
