//! Main compiler driver.
//!
//! Runs the whole pipeline over one or more parsed source files:
//! declaration scan (pass 1), then body compilation (pass 2), then module
//! assembly. Any error diagnostic after either pass makes the driver refuse
//! to hand out module bytes.

use crate::codegen::{bodies, declarations, CodegenError, ModuleBuilder};
use crate::context::CompilerContext;
use crate::diagnostic::Diagnostic;
use crate::syntax::ast::File;
use crate::syntax::{parse_with_source_id, ParseError};
use crate::types::UnsupportedWordSize;

use std::path::Path;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Compilation error.
#[derive(Debug)]
pub enum CompileError {
    /// Parse error.
    Parse(ParseError),
    /// Invalid compiler configuration.
    Config(UnsupportedWordSize),
    /// Structural code generation error.
    Codegen(CodegenError),
    /// Error diagnostics were reported; inspect the context for details.
    Failed { errors: usize },
    /// IO error.
    Io(std::io::Error),
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::Io(e)
    }
}

impl From<CodegenError> for CompileError {
    fn from(e: CodegenError) -> Self {
        CompileError::Codegen(e)
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Parse(e) => write!(f, "parse error: {}", e),
            CompileError::Config(e) => write!(f, "configuration error: {}", e),
            CompileError::Codegen(e) => write!(f, "codegen error: {}", e),
            CompileError::Failed { errors } => {
                write!(f, "compilation failed with {} error(s)", errors)
            }
            CompileError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for CompileError {}

/// Compiler configuration.
#[derive(Debug, Clone, Copy)]
pub struct CompilerOptions {
    /// Target word size in bytes; decides the width of `uintptr`.
    pub word_size: u8,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { word_size: 4 }
    }
}

/// Compiler instance.
pub struct Compiler {
    ctx: CompilerContext,
    files: Vec<File>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// A compiler with default options (4-byte word size).
    pub fn new() -> Self {
        let ctx = CompilerContext::new(4).expect("4 is a supported word size");
        Self {
            ctx,
            files: Vec::new(),
        }
    }

    pub fn with_options(options: CompilerOptions) -> CompileResult<Self> {
        let ctx = CompilerContext::new(options.word_size).map_err(CompileError::Config)?;
        Ok(Self {
            ctx,
            files: Vec::new(),
        })
    }

    pub fn context(&self) -> &CompilerContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut CompilerContext {
        &mut self.ctx
    }

    /// Load and parse a source file.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> CompileResult<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let source_id = self.ctx.source_map.add_file(path, content.clone());
        self.parse_source(&content, source_id)
    }

    /// Parse a source string.
    ///
    /// On error, the parse error is also recorded as a diagnostic.
    pub fn parse(&mut self, source: &str) -> CompileResult<()> {
        let source_id = self.ctx.source_map.add_inline(source);
        self.parse_source(source, source_id)
    }

    fn parse_source(
        &mut self,
        source: &str,
        source_id: crate::source::SourceId,
    ) -> CompileResult<()> {
        match parse_with_source_id(source, source_id) {
            Ok(file) => {
                self.files.push(file);
                Ok(())
            }
            Err(e) => {
                self.ctx.diagnostics.push(Diagnostic::error(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Run both passes over every loaded file.
    ///
    /// Kept separate from [`Compiler::compile`] so tests can inspect the
    /// builder before the binary is assembled.
    pub(crate) fn build(&mut self) -> CompileResult<ModuleBuilder> {
        let mut builder = ModuleBuilder::new();

        for file in &self.files {
            declarations::run(&mut self.ctx, &mut builder, file)?;
        }
        if self.ctx.has_errors() {
            return Err(CompileError::Failed {
                errors: self.ctx.error_count(),
            });
        }

        for file in &self.files {
            bodies::run(&mut self.ctx, &mut builder, file)?;
        }
        if self.ctx.has_errors() {
            return Err(CompileError::Failed {
                errors: self.ctx.error_count(),
            });
        }

        Ok(builder)
    }

    /// Compile every loaded file into wasm module bytes.
    pub fn compile(&mut self) -> CompileResult<Vec<u8>> {
        Ok(self.build()?.finish())
    }

    pub fn has_errors(&self) -> bool {
        self.ctx.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.ctx.error_count()
    }

    pub fn render_diagnostics(&self) -> String {
        self.ctx.render_diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_encoder::Instruction;

    fn build(source: &str) -> ModuleBuilder {
        let mut compiler = Compiler::new();
        compiler.parse(source).unwrap();
        let builder = compiler.build().unwrap_or_else(|e| {
            panic!("build failed: {}\n{}", e, compiler.render_diagnostics())
        });
        builder
    }

    // ========================================================================
    // END-TO-END SCENARIOS
    // ========================================================================

    #[test]
    fn exported_add_function() {
        let builder = build("export function add(a: int, b: int): int { return a + b; }");

        assert_eq!(builder.signatures.len(), 1);
        assert_eq!(builder.signatures[0].key, "iii");
        assert_eq!(builder.functions.len(), 1);
        assert_eq!(builder.functions[0].name, "add");
        assert!(matches!(
            builder.functions[0].code[..],
            [
                Instruction::LocalGet(0),
                Instruction::LocalGet(1),
                Instruction::I32Add,
                Instruction::Return
            ]
        ));

        let bytes = builder.finish();
        assert_eq!(&bytes[0..4], b"\0asm");
    }

    #[test]
    fn declared_function_becomes_an_import() {
        let builder = build("declare function log(x: double): void;");

        assert!(builder.functions.is_empty());
        assert_eq!(builder.imports.len(), 1);
        assert_eq!(builder.imports[0].module, "env");
        assert_eq!(builder.imports[0].field, "log");
        assert_eq!(builder.signatures[builder.imports[0].type_index as usize].key, "Fv");
    }

    #[test]
    fn enum_constant_in_function_body() {
        let builder = build(
            "enum E { A = 1, B = 2 }
             export function pick(): int { return E.B; }",
        );
        assert!(matches!(
            builder.functions[0].code[..],
            [Instruction::I32Const(2), Instruction::Return]
        ));
    }

    #[test]
    fn narrowing_cast_masks() {
        let builder = build("export function narrow(x: int): byte { return x as byte; }");
        assert!(matches!(
            builder.functions[0].code[..],
            [
                Instruction::LocalGet(0),
                Instruction::I32Const(0xFF),
                Instruction::I32And,
                Instruction::Return
            ]
        ));
    }

    #[test]
    fn mixed_float_addition_promotes() {
        let builder = build("export function mix(a: float, b: double): double { return a + b; }");
        assert!(matches!(
            builder.functions[0].code[..],
            [
                Instruction::LocalGet(0),
                Instruction::F64PromoteF32,
                Instruction::LocalGet(1),
                Instruction::F64Add,
                Instruction::Return
            ]
        ));
    }

    #[test]
    fn long_negation_via_zero_minus() {
        let builder = build("export function neg(x: long): long { return 0 - x; }");
        assert!(matches!(
            builder.functions[0].code[..],
            [
                Instruction::I64Const(0),
                Instruction::LocalGet(0),
                Instruction::I64Sub,
                Instruction::Return
            ]
        ));
    }

    // ========================================================================
    // DRIVER BEHAVIOR
    // ========================================================================

    #[test]
    fn errors_refuse_module_bytes() {
        let mut compiler = Compiler::new();
        compiler
            .parse("function f(): int { return missing; }")
            .unwrap();
        match compiler.compile() {
            Err(CompileError::Failed { errors }) => assert_eq!(errors, 1),
            other => panic!("expected failure, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn parse_errors_are_recorded_as_diagnostics() {
        let mut compiler = Compiler::new();
        assert!(compiler.parse("function {").is_err());
        assert!(compiler.has_errors());
    }

    #[test]
    fn forward_references_resolve_across_files() {
        let mut compiler = Compiler::new();
        compiler
            .parse("export function pick(): int { return E.B; }")
            .unwrap();
        compiler.parse("enum E { A, B }").unwrap();
        let bytes = compiler.compile().unwrap();
        assert_eq!(&bytes[0..4], b"\0asm");
    }

    #[test]
    fn word_size_options_are_validated() {
        assert!(Compiler::with_options(CompilerOptions { word_size: 8 }).is_ok());
        assert!(matches!(
            Compiler::with_options(CompilerOptions { word_size: 3 }),
            Err(CompileError::Config(_))
        ));
    }

    #[test]
    fn start_function_is_exported_when_flagged() {
        let builder = build("export function start(): void { return; }");
        let bytes = builder.finish();
        // Exported under its own name and installed as the start function.
        assert!(bytes
            .windows("start".len())
            .any(|w| w == b"start"));
        assert!(bytes.windows(2).any(|w| w == b"\x08\x01"));
    }

    #[test]
    fn memory_is_exported() {
        let builder = build("export function f(): int { return 1; }");
        let bytes = builder.finish();
        assert!(bytes.windows("memory".len()).any(|w| w == b"memory"));
    }
}
