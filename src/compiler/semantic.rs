// Semantic analyzer - symbol table and reference validation
//
// Registers built-in primitive types, built-in namespaces, asset-derived
// identifiers (`ASSET_<name>`), and user types/functions, then validates
// references and the entry point. The analyzer recovers to the end of
// its stage so authors see every error in one run; type checking of
// operator operands is deliberately lightweight (the code generator
// enforces value-range and shape constraints at emission time).

use crate::compiler::ast::*;
use crate::compiler::diagnostics::{codes, Diagnostic, SourcePos, SourceRange, Stage};
use std::collections::HashMap;

/// Built-in primitive type names
pub const BUILTIN_TYPES: &[&str] = &[
    "i8", "i16", "i32", "u8", "u16", "u32", "bool", "fx8_8", "fx16_16", "Sprite", "Vec2",
];

/// Built-in namespaces reachable through member access
pub const BUILTIN_NAMESPACES: &[&str] = &["ppu", "sprite", "oam", "apu", "gfx", "input"];

/// Built-in free functions
pub const BUILTIN_FUNCTIONS: &[&str] = &["wait_vblank"];

/// What a global name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    BuiltinType,
    BuiltinFunction,
    Namespace,
    UserType,
    Function,
    AssetConst,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub pos: Option<SourcePos>,
}

/// Inferred local variable types
///
/// Lightweight inference only: number literals become i16, bools bool,
/// calls u16, everything else u16.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalType {
    Scalar(String),
    Struct(String),
}

/// Result of the semantic pass: the global symbol table
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }
}

/// Run the semantic pass
///
/// Appends diagnostics for duplicates, undefined identifiers, and entry
/// point problems; always returns the table it built.
pub fn analyze(program: &Program, file: &str, diagnostics: &mut Vec<Diagnostic>) -> SymbolTable {
    let mut analyzer = SemanticAnalyzer {
        symbols: HashMap::new(),
        file,
        diagnostics,
    };
    analyzer.register_builtins();
    analyzer.register_declarations(program);
    analyzer.check_entry_point(program);
    for function in &program.functions {
        analyzer.check_function(function);
    }
    SymbolTable {
        symbols: analyzer.symbols,
    }
}

struct SemanticAnalyzer<'a> {
    symbols: HashMap<String, Symbol>,
    file: &'a str,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> SemanticAnalyzer<'a> {
    fn register_builtins(&mut self) {
        for name in BUILTIN_TYPES {
            self.symbols.insert(
                name.to_string(),
                Symbol {
                    kind: SymbolKind::BuiltinType,
                    pos: None,
                },
            );
        }
        for name in BUILTIN_NAMESPACES {
            self.symbols.insert(
                name.to_string(),
                Symbol {
                    kind: SymbolKind::Namespace,
                    pos: None,
                },
            );
        }
        for name in BUILTIN_FUNCTIONS {
            self.symbols.insert(
                name.to_string(),
                Symbol {
                    kind: SymbolKind::BuiltinFunction,
                    pos: None,
                },
            );
        }
    }

    fn register_declarations(&mut self, program: &Program) {
        // Assets first: their duplicate check carries its own code and
        // the prior position in the related list
        let mut asset_positions: HashMap<&str, SourcePos> = HashMap::new();
        for asset in &program.assets {
            if let Some(prior) = asset_positions.get(asset.name.as_str()) {
                self.diagnostics.push(
                    Diagnostic::error(
                        Stage::Semantic,
                        "SymbolError",
                        codes::E_ASSET_DUPLICATE,
                        format!("duplicate asset '{}'", asset.name),
                        self.file,
                        SourceRange::at(asset.pos),
                    )
                    .with_related("previous declaration", self.file, *prior),
                );
                continue;
            }
            asset_positions.insert(&asset.name, asset.pos);
            self.declare(
                format!("ASSET_{}", asset.name),
                SymbolKind::AssetConst,
                asset.pos,
            );
        }

        for decl in &program.types {
            self.declare(decl.name.clone(), SymbolKind::UserType, decl.pos);
            for field in &decl.fields {
                if !self.is_type_name(&field.type_name) && !self.declared_later_type(program, &field.type_name) {
                    self.diagnostics.push(Diagnostic::error(
                        Stage::Semantic,
                        "TypeError",
                        codes::E_TYPE,
                        format!("unknown field type '{}'", field.type_name),
                        self.file,
                        SourceRange::at(field.pos),
                    ));
                }
            }
        }

        for function in &program.functions {
            self.declare(function.name.clone(), SymbolKind::Function, function.pos);
        }
    }

    fn declared_later_type(&self, program: &Program, name: &str) -> bool {
        program.types.iter().any(|t| t.name == name)
    }

    fn declare(&mut self, name: String, kind: SymbolKind, pos: SourcePos) {
        if let Some(existing) = self.symbols.get(&name) {
            let mut diagnostic = Diagnostic::error(
                Stage::Semantic,
                "SymbolError",
                codes::E_DUPLICATE,
                format!("duplicate declaration of '{}'", name),
                self.file,
                SourceRange::at(pos),
            );
            if let Some(prior) = existing.pos {
                diagnostic = diagnostic.with_related("previous declaration", self.file, prior);
            } else {
                diagnostic = diagnostic.with_note("shadows a built-in name");
            }
            self.diagnostics.push(diagnostic);
            return;
        }
        self.symbols.insert(name, Symbol { kind, pos: Some(pos) });
    }

    fn is_type_name(&self, name: &str) -> bool {
        matches!(
            self.symbols.get(name),
            Some(Symbol {
                kind: SymbolKind::BuiltinType | SymbolKind::UserType,
                ..
            })
        )
    }

    fn check_entry_point(&mut self, program: &Program) {
        let entry = program
            .functions
            .iter()
            .find(|f| f.name == "__Boot")
            .or_else(|| program.functions.iter().find(|f| f.name == "Start"));

        match entry {
            None => {
                self.diagnostics.push(Diagnostic::error(
                    Stage::Semantic,
                    "ValidationError",
                    codes::E_MISSING_ENTRYPOINT,
                    "program has no 'Start' entry point",
                    self.file,
                    SourceRange::default(),
                ));
            }
            Some(function) if !function.params.is_empty() => {
                self.diagnostics.push(Diagnostic::error(
                    Stage::Semantic,
                    "ValidationError",
                    codes::E_ENTRYPOINT_PARAMS,
                    format!("entry point '{}' must take no parameters", function.name),
                    self.file,
                    SourceRange::at(function.pos),
                ));
            }
            Some(_) => {}
        }
    }

    fn check_function(&mut self, function: &FunctionDecl) {
        let mut locals: HashMap<String, SourcePos> = HashMap::new();
        for param in &function.params {
            locals.insert(param.name.clone(), param.pos);
            if let Some(type_name) = &param.type_name {
                if !self.is_type_name(type_name) {
                    self.diagnostics.push(Diagnostic::error(
                        Stage::Semantic,
                        "TypeError",
                        codes::E_TYPE,
                        format!("unknown parameter type '{}'", type_name),
                        self.file,
                        SourceRange::at(param.pos),
                    ));
                }
            }
        }
        self.check_block(&function.body, &mut locals);
    }

    fn check_block(&mut self, body: &[Stmt], locals: &mut HashMap<String, SourcePos>) {
        for stmt in body {
            self.check_stmt(stmt, locals);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt, locals: &mut HashMap<String, SourcePos>) {
        match stmt {
            Stmt::VarDecl {
                name,
                type_name,
                value,
                pos,
            } => {
                if let Some(value) = value {
                    self.check_expr(value, locals);
                }
                if let Some(type_name) = type_name {
                    if !self.is_type_name(type_name) {
                        self.diagnostics.push(Diagnostic::error(
                            Stage::Semantic,
                            "TypeError",
                            codes::E_TYPE,
                            format!("unknown type '{}'", type_name),
                            self.file,
                            SourceRange::at(*pos),
                        ));
                    }
                }
                if let Some(prior) = locals.get(name) {
                    self.diagnostics.push(
                        Diagnostic::error(
                            Stage::Semantic,
                            "SymbolError",
                            codes::E_DUPLICATE,
                            format!("duplicate declaration of '{}'", name),
                            self.file,
                            SourceRange::at(*pos),
                        )
                        .with_related("previous declaration", self.file, *prior),
                    );
                } else {
                    locals.insert(name.clone(), *pos);
                }
            }
            Stmt::Assign { target, value, .. } => {
                self.check_expr(target, locals);
                self.check_expr(value, locals);
            }
            Stmt::If {
                arms, else_body, ..
            } => {
                for (cond, body) in arms {
                    self.check_expr(cond, locals);
                    self.check_block(body, locals);
                }
                if let Some(body) = else_body {
                    self.check_block(body, locals);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.check_expr(cond, locals);
                self.check_block(body, locals);
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.check_stmt(init, locals);
                self.check_expr(cond, locals);
                self.check_block(body, locals);
                self.check_stmt(post, locals);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.check_expr(value, locals);
                }
            }
            Stmt::Expr { expr, .. } => self.check_expr(expr, locals),
        }
    }

    fn check_expr(&mut self, expr: &Expr, locals: &HashMap<String, SourcePos>) {
        match expr {
            Expr::Number { .. } | Expr::Bool { .. } | Expr::Str { .. } => {}
            Expr::Ident { name, pos } => {
                if !locals.contains_key(name) && !self.symbols.contains_key(name) {
                    self.diagnostics.push(Diagnostic::error(
                        Stage::Semantic,
                        "SymbolError",
                        codes::E_UNDEFINED,
                        format!("undefined identifier '{}'", name),
                        self.file,
                        SourceRange::at(*pos),
                    ));
                }
            }
            Expr::Unary { operand, .. } => self.check_expr(operand, locals),
            Expr::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs, locals);
                self.check_expr(rhs, locals);
            }
            Expr::Call { callee, args, .. } => {
                // A namespaced callee validates only its namespace root;
                // unknown member names surface as codegen diagnostics
                match &**callee {
                    Expr::Member { object, .. } => self.check_expr(object, locals),
                    other => self.check_expr(other, locals),
                }
                for arg in args {
                    self.check_expr(arg, locals);
                }
            }
            Expr::Member { object, .. } => self.check_expr(object, locals),
            Expr::Index { object, index, .. } => {
                self.check_expr(object, locals);
                self.check_expr(index, locals);
            }
        }
    }
}

/// Infer a declaration's local type from its annotation or initializer
pub fn infer_decl_type(type_name: Option<&str>, value: Option<&Expr>) -> LocalType {
    if let Some(name) = type_name {
        if name == "Sprite" || name == "Vec2" {
            return LocalType::Struct(name.to_string());
        }
        return LocalType::Scalar(name.to_string());
    }
    match value {
        Some(Expr::Number { .. }) => LocalType::Scalar("i16".to_string()),
        Some(Expr::Bool { .. }) => LocalType::Scalar("bool".to_string()),
        Some(Expr::Call { .. }) => LocalType::Scalar("u16".to_string()),
        _ => LocalType::Scalar("u16".to_string()),
    }
}
