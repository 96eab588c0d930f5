//! Thin façade over the `wasm-encoder` module builder.
//!
//! Collects interned function types, imports, compiled function bodies,
//! exports and the optional start function, then assembles the sections in
//! binary order. The one invariant: every type index handed to
//! [`ModuleBuilder::add_function`] or [`ModuleBuilder::add_import`] was
//! returned by [`ModuleBuilder::add_function_type`] first.

use std::collections::HashMap;
use wasm_encoder::{
    CodeSection, EntityType, ExportKind, ExportSection, Function, FunctionSection, ImportSection,
    Instruction, MemorySection, MemoryType, Module, StartSection, TypeSection, ValType,
};

/// A registered function type, interned by signature key.
#[derive(Debug)]
pub(crate) struct FunctionTypeEntry {
    pub key: String,
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

#[derive(Debug)]
pub(crate) struct ImportEntry {
    /// Internal (mangled) name, used for index resolution.
    pub name: String,
    pub module: String,
    pub field: String,
    pub type_index: u32,
}

#[derive(Debug)]
pub(crate) struct FunctionEntry {
    pub name: String,
    pub type_index: u32,
    /// Locals beyond the parameters.
    pub locals: Vec<ValType>,
    pub code: Vec<Instruction<'static>>,
}

/// Accumulates one wasm module.
pub struct ModuleBuilder {
    pub(crate) signatures: Vec<FunctionTypeEntry>,
    signature_keys: HashMap<String, u32>,
    pub(crate) imports: Vec<ImportEntry>,
    pub(crate) functions: Vec<FunctionEntry>,
    exports: Vec<(String, String)>,
    start: Option<String>,
    memory_initial: u64,
    memory_maximum: Option<u64>,
    memory_export: String,
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleBuilder {
    /// A builder with the default linear memory: 256 pages (16 MiB), no
    /// maximum, exported as `memory`.
    pub fn new() -> Self {
        Self {
            signatures: Vec::new(),
            signature_keys: HashMap::new(),
            imports: Vec::new(),
            functions: Vec::new(),
            exports: Vec::new(),
            start: None,
            memory_initial: 256,
            memory_maximum: None,
            memory_export: "memory".to_string(),
        }
    }

    pub fn set_memory(&mut self, initial_pages: u64, maximum_pages: Option<u64>, export: &str) {
        self.memory_initial = initial_pages;
        self.memory_maximum = maximum_pages;
        self.memory_export = export.to_string();
    }

    /// Register a function type, deduplicated by signature key.
    ///
    /// The mapping is insertion-only: a key registered once keeps its index
    /// for the rest of the compilation.
    pub fn add_function_type(
        &mut self,
        key: &str,
        params: Vec<ValType>,
        results: Vec<ValType>,
    ) -> u32 {
        if let Some(&index) = self.signature_keys.get(key) {
            return index;
        }
        let index = self.signatures.len() as u32;
        self.signature_keys.insert(key.to_string(), index);
        self.signatures.push(FunctionTypeEntry {
            key: key.to_string(),
            params,
            results,
        });
        index
    }

    pub fn add_function(
        &mut self,
        name: &str,
        type_index: u32,
        locals: Vec<ValType>,
        code: Vec<Instruction<'static>>,
    ) {
        assert!(
            (type_index as usize) < self.signatures.len(),
            "function type {} was not registered",
            type_index
        );
        self.functions.push(FunctionEntry {
            name: name.to_string(),
            type_index,
            locals,
            code,
        });
    }

    pub fn add_import(&mut self, name: &str, module: &str, field: &str, type_index: u32) {
        assert!(
            (type_index as usize) < self.signatures.len(),
            "function type {} was not registered",
            type_index
        );
        self.imports.push(ImportEntry {
            name: name.to_string(),
            module: module.to_string(),
            field: field.to_string(),
            type_index,
        });
    }

    pub fn add_export(&mut self, internal: &str, external: &str) {
        self.exports.push((internal.to_string(), external.to_string()));
    }

    pub fn set_start(&mut self, internal: &str) {
        self.start = Some(internal.to_string());
    }

    /// Function index space: imports first, then defined functions, in
    /// insertion order.
    pub(crate) fn function_indices(&self) -> HashMap<&str, u32> {
        let mut indices = HashMap::new();
        let mut index = 0u32;
        for import in &self.imports {
            indices.insert(import.name.as_str(), index);
            index += 1;
        }
        for function in &self.functions {
            indices.insert(function.name.as_str(), index);
            index += 1;
        }
        indices
    }

    /// Assemble the module bytes.
    pub fn finish(&self) -> Vec<u8> {
        let mut module = Module::new();

        let mut types = TypeSection::new();
        for signature in &self.signatures {
            types
                .ty()
                .function(signature.params.iter().copied(), signature.results.iter().copied());
        }
        module.section(&types);

        if !self.imports.is_empty() {
            let mut imports = ImportSection::new();
            for import in &self.imports {
                imports.import(
                    &import.module,
                    &import.field,
                    EntityType::Function(import.type_index),
                );
            }
            module.section(&imports);
        }

        let mut functions = FunctionSection::new();
        for function in &self.functions {
            functions.function(function.type_index);
        }
        module.section(&functions);

        let mut memories = MemorySection::new();
        memories.memory(MemoryType {
            minimum: self.memory_initial,
            maximum: self.memory_maximum,
            memory64: false,
            shared: false,
            page_size_log2: None,
        });
        module.section(&memories);

        let indices = self.function_indices();

        let mut exports = ExportSection::new();
        exports.export(&self.memory_export, ExportKind::Memory, 0);
        for (internal, external) in &self.exports {
            if let Some(&index) = indices.get(internal.as_str()) {
                exports.export(external, ExportKind::Func, index);
            }
        }
        module.section(&exports);

        if let Some(start) = &self.start {
            if let Some(&function_index) = indices.get(start.as_str()) {
                module.section(&StartSection { function_index });
            }
        }

        let mut code = CodeSection::new();
        for entry in &self.functions {
            let mut function = Function::new_with_locals_types(entry.locals.iter().copied());
            for instruction in &entry.code {
                function.instruction(instruction);
            }
            function.instruction(&Instruction::End);
            code.function(&function);
        }
        module.section(&code);

        module.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_interning_is_stable() {
        let mut builder = ModuleBuilder::new();
        let a = builder.add_function_type("iii", vec![ValType::I32, ValType::I32], vec![ValType::I32]);
        let b = builder.add_function_type("iii", vec![ValType::I32, ValType::I32], vec![ValType::I32]);
        let c = builder.add_function_type("Fv", vec![ValType::F64], vec![]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(builder.signatures.len(), 2);
        assert_eq!(builder.signatures[0].key, "iii");
    }

    #[test]
    fn imports_precede_functions_in_the_index_space() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_function_type("v", vec![], vec![]);
        builder.add_import("log", "env", "log", ty);
        builder.add_function("main", ty, vec![], vec![]);

        let indices = builder.function_indices();
        assert_eq!(indices["log"], 0);
        assert_eq!(indices["main"], 1);
    }

    #[test]
    fn finish_emits_a_wasm_header() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_function_type("v", vec![], vec![]);
        builder.add_function("start", ty, vec![], vec![]);
        builder.set_start("start");
        builder.add_export("start", "start");

        let bytes = builder.finish();
        assert_eq!(&bytes[0..4], b"\0asm");
        assert_eq!(&bytes[4..8], &[1, 0, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "was not registered")]
    fn unregistered_type_index_is_rejected() {
        let mut builder = ModuleBuilder::new();
        builder.add_function("f", 3, vec![], vec![]);
    }
}
