//! Opal compiler core.
//!
//! Compiles a statically-typed, class-based script subset into WebAssembly
//! modules.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CompilerContext                        │
//! │  ┌──────────┐ ┌────────────┐ ┌─────────┐ ┌─────────────┐   │
//! │  │ Interner │ │ TypeRegistry│ │ Symbols │ │  SourceMap  │   │
//! │  │ (strings)│ │ (Ty→Kind)   │ │ (pass 1)│ │ (files)     │   │
//! │  └──────────┘ └────────────┘ └─────────┘ └─────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!        ↑               ↑             ↑
//!   ┌────┴────┐    ┌─────┴─────┐  ┌────┴─────┐
//!   │  Parse  │ →  │  Declare  │→ │  Bodies  │ → ModuleBuilder → .wasm
//!   │  (AST)  │    │  (pass 1) │  │ (pass 2) │
//!   └─────────┘    └───────────┘  └──────────┘
//! ```
//!
//! Pass 1 materializes function, class and enum symbols with their wasm
//! signatures so forward references resolve; pass 2 lowers function bodies
//! through a contextually-typed expression compiler backed by the numeric
//! conversion engine.

pub mod codegen;
pub mod compiler;
pub mod context;
pub mod diagnostic;
pub mod interner;
pub mod source;
pub mod symbols;
pub mod syntax;
pub mod types;

pub use codegen::{CodegenError, ModuleBuilder};
pub use compiler::{CompileError, CompileResult, Compiler, CompilerOptions};
pub use context::CompilerContext;
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use interner::{Interner, Name};
pub use source::{Source, SourceId, SourceMap, Span};
pub use symbols::{Constant, FuncId, FunctionSymbol, SymbolTable};
pub use syntax::{parse, ParseError};
pub use types::{Ty, TyKind, TypeRegistry, UnsupportedWordSize};
