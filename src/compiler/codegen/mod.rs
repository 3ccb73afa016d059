// Code generator - AST to instruction words
//
// Walks the AST emitting 16-bit instructions (plus immediate words) into
// a `RomBuilder`. The entry function (`__Boot` preferred, else `Start`)
// is emitted first so its first instruction lands at the entry offset.
//
// Storage model: variables live in frame-local stack slots from $1FFE
// downward (2 bytes per scalar slot); registers R0..R7 are scratch and
// may be clobbered by built-in call sequences, which avoids a calling
// convention while remaining correct for nested built-in calls. During
// expression evaluation, R0 holds the result, R1/R2 are temporaries,
// and intermediate values spill to transient slots just below the
// allocated locals.
//
// The generator stops at the first unsupported operation (user-defined
// calls, general multiplication, unknown built-ins) and returns that
// condition as its error.

mod builtins;
mod rom_builder;

pub use rom_builder::{LabelId, RomBuilder};

use crate::compiler::assets::AssetIR;
use crate::compiler::ast::*;
use crate::compiler::diagnostics::{codes, Diagnostic, SourceRange, Stage};
use crate::cpu::decode::{
    enc_alu_ri, enc_alu_rr, enc_cmp_ri, enc_cmp_rr, enc_hlt, enc_mov_load, enc_mov_ri, enc_mov_rr,
    enc_mov_store, enc_not, enc_ret, AluOp, Predicate,
};
use std::collections::HashMap;

/// Top of the frame-local variable region (grows downward)
const FRAME_TOP: u16 = 0x1FFE;

type GResult<T> = Result<T, Box<Diagnostic>>;

/// Byte layout of a struct type
#[derive(Debug, Clone)]
pub struct StructLayout {
    pub size: u16,
    /// (name, byte offset, width in bytes)
    pub fields: Vec<(String, u16, u16)>,
}

impl StructLayout {
    fn field(&self, name: &str) -> Option<(u16, u16)> {
        self.fields
            .iter()
            .find(|(f, _, _)| f == name)
            .map(|(_, offset, width)| (*offset, *width))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LocalTy {
    Scalar,
    Struct(String),
}

#[derive(Debug, Clone)]
struct Local {
    addr: u16,
    ty: LocalTy,
}

/// Generate code words for a program
///
/// On an unsupported construct, pushes one codegen diagnostic and
/// returns None.
pub fn generate(
    program: &Program,
    assets: &[AssetIR],
    file: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<u16>> {
    let mut generator = CodeGenerator::new(program, assets, file);
    match generator.run(program) {
        Ok(words) => Some(words),
        Err(diagnostic) => {
            diagnostics.push(*diagnostic);
            None
        }
    }
}

pub(crate) struct CodeGenerator<'a> {
    builder: RomBuilder,
    assets: &'a [AssetIR],
    structs: HashMap<String, StructLayout>,
    locals: HashMap<String, Local>,
    next_slot_addr: u16,
    scratch_depth: u16,
    file: &'a str,
    in_entry: bool,
}

impl<'a> CodeGenerator<'a> {
    fn new(program: &Program, assets: &'a [AssetIR], file: &'a str) -> Self {
        let mut structs = HashMap::new();
        structs.insert(
            "Sprite".to_string(),
            StructLayout {
                size: 6,
                fields: vec![
                    ("x_lo".to_string(), 0, 1),
                    ("x_hi".to_string(), 1, 1),
                    ("y".to_string(), 2, 1),
                    ("tile".to_string(), 3, 1),
                    ("attr".to_string(), 4, 1),
                    ("ctrl".to_string(), 5, 1),
                ],
            },
        );
        structs.insert(
            "Vec2".to_string(),
            StructLayout {
                size: 4,
                fields: vec![("x".to_string(), 0, 2), ("y".to_string(), 2, 2)],
            },
        );
        for decl in &program.types {
            let mut offset = 0u16;
            let mut fields = Vec::new();
            for field in &decl.fields {
                let width = match field.type_name.as_str() {
                    "i8" | "u8" | "bool" => 1,
                    _ => 2,
                };
                fields.push((field.name.clone(), offset, width));
                offset += width;
            }
            structs.insert(
                decl.name.clone(),
                StructLayout {
                    size: offset,
                    fields,
                },
            );
        }

        CodeGenerator {
            builder: RomBuilder::new(),
            assets,
            structs,
            locals: HashMap::new(),
            next_slot_addr: FRAME_TOP,
            scratch_depth: 0,
            file,
            in_entry: false,
        }
    }

    fn run(&mut self, program: &Program) -> GResult<Vec<u16>> {
        let entry_index = program
            .functions
            .iter()
            .position(|f| f.name == "__Boot")
            .or_else(|| program.functions.iter().position(|f| f.name == "Start"));

        let mut order: Vec<&FunctionDecl> = Vec::new();
        if let Some(index) = entry_index {
            order.push(&program.functions[index]);
        }
        for (index, function) in program.functions.iter().enumerate() {
            if Some(index) != entry_index {
                order.push(function);
            }
        }

        for (position, function) in order.iter().enumerate() {
            self.gen_function(function, position == 0 && entry_index.is_some())?;
        }

        self.builder.resolve().map_err(|message| {
            Box::new(Diagnostic::error(
                Stage::Codegen,
                "InternalCompilerError",
                codes::E_INTERNAL,
                format!("label resolution failed: {}", message),
                self.file,
                SourceRange::default(),
            ))
        })?;
        Ok(std::mem::take(&mut self.builder).into_words())
    }

    fn unsupported(&self, pos: crate::compiler::diagnostics::SourcePos, message: impl Into<String>) -> Box<Diagnostic> {
        Box::new(Diagnostic::error(
            Stage::Codegen,
            "BackendCodegenError",
            codes::E_CODEGEN_UNSUPPORTED,
            message,
            self.file,
            SourceRange::at(pos),
        ))
    }

    // ========================================
    // Emission Helpers
    // ========================================

    pub(crate) fn emit(&mut self, word: u16) {
        self.builder.emit(word);
    }

    pub(crate) fn builder_mut(&mut self) -> &mut RomBuilder {
        &mut self.builder
    }

    /// MOV reg, #imm
    pub(crate) fn emit_mov_imm(&mut self, reg: u8, value: u16) {
        self.emit(enc_mov_ri(reg));
        self.emit(value);
    }

    /// ALU reg, #imm
    pub(crate) fn emit_alu_imm(&mut self, op: AluOp, reg: u8, value: u16) {
        self.emit(enc_alu_ri(op, reg));
        self.emit(value);
    }

    /// Store R0's low byte to a port: `MOV R1,#port ; [R1].b = R0`
    pub(crate) fn emit_write_port_r0(&mut self, port: u16) {
        self.emit_mov_imm(1, port);
        self.emit(enc_mov_store(1, 0, false));
    }

    /// Store an immediate byte to a port
    pub(crate) fn emit_write_port_imm(&mut self, port: u16, value: u8) {
        self.emit_mov_imm(0, value as u16);
        self.emit_write_port_r0(port);
    }

    /// Load a 16-bit value from a frame slot: `MOV R2,#addr ; dst = [R2].w`
    ///
    /// `dst` must not be R2.
    pub(crate) fn emit_load_slot(&mut self, dst: u8, addr: u16) {
        debug_assert_ne!(dst, 2);
        self.emit_mov_imm(2, addr);
        self.emit(enc_mov_load(dst, 2, true));
    }

    /// Store R0 to a frame slot as a 16-bit value
    pub(crate) fn emit_store_slot_r0(&mut self, addr: u16) {
        self.emit_mov_imm(2, addr);
        self.emit(enc_mov_store(2, 0, true));
    }

    /// Transient spill slot just below the allocated locals
    pub(crate) fn scratch_push(&mut self) -> u16 {
        let addr = self.next_slot_addr - 2 * self.scratch_depth;
        self.scratch_depth += 1;
        addr
    }

    pub(crate) fn scratch_pop(&mut self) {
        debug_assert!(self.scratch_depth > 0);
        self.scratch_depth -= 1;
    }

    /// Evaluate each argument and spill it to its own scratch slot
    pub(crate) fn eval_args_to_scratch(&mut self, args: &[Expr]) -> GResult<Vec<u16>> {
        let mut slots = Vec::with_capacity(args.len());
        for arg in args {
            self.gen_expr(arg)?;
            let slot = self.scratch_push();
            self.emit_store_slot_r0(slot);
            slots.push(slot);
        }
        Ok(slots)
    }

    pub(crate) fn free_scratch(&mut self, count: usize) {
        for _ in 0..count {
            self.scratch_pop();
        }
    }

    // ========================================
    // Constant Folding
    // ========================================

    /// Evaluate an expression to a compile-time u16 when possible
    pub(crate) fn const_eval(&self, expr: &Expr) -> Option<u16> {
        match expr {
            Expr::Number { value, .. } => in_range(*value),
            Expr::Bool { value, .. } => Some(*value as u16),
            Expr::Ident { name, .. } => {
                let asset_name = name.strip_prefix("ASSET_")?;
                self.assets
                    .iter()
                    .find(|a| a.name == asset_name)
                    .map(|a| a.tag)
            }
            Expr::Unary { op, operand, .. } => {
                let value = self.const_eval(operand)?;
                match op {
                    UnaryOp::Neg => Some((value as i32).wrapping_neg() as u16),
                    UnaryOp::BitNot => Some(!value),
                    UnaryOp::Not => Some((value == 0) as u16),
                    UnaryOp::AddrOf => None,
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let a = self.const_eval(lhs)?;
                let b = self.const_eval(rhs)?;
                match op {
                    BinaryOp::Add => Some(a.wrapping_add(b)),
                    BinaryOp::Sub => Some(a.wrapping_sub(b)),
                    BinaryOp::Mul => Some(a.wrapping_mul(b)),
                    BinaryOp::Div => (b != 0).then(|| a / b),
                    BinaryOp::Mod => (b != 0).then(|| a % b),
                    BinaryOp::BitAnd => Some(a & b),
                    BinaryOp::BitOr => Some(a | b),
                    BinaryOp::BitXor => Some(a ^ b),
                    BinaryOp::Shl => Some(a << (b & 0xF)),
                    BinaryOp::Shr => Some(a >> (b & 0xF)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The asset a compile-time tag refers to, if it is a graphics kind
    pub(crate) fn gfx_asset_by_tag(&self, tag: u16) -> Option<&'a AssetIR> {
        self.assets
            .iter()
            .find(|a| a.tag == tag && crate::compiler::assets::is_gfx_kind(&a.kind))
    }

    pub(crate) fn gfx_assets(&self) -> impl Iterator<Item = &'a AssetIR> {
        self.assets
            .iter()
            .filter(|a| crate::compiler::assets::is_gfx_kind(&a.kind))
    }

    // ========================================
    // Functions and Statements
    // ========================================

    fn gen_function(&mut self, function: &FunctionDecl, is_entry: bool) -> GResult<()> {
        self.locals.clear();
        self.next_slot_addr = FRAME_TOP;
        self.scratch_depth = 0;
        self.in_entry = is_entry;

        // Parameters get slots so bodies compile; only the entry function
        // is reachable and it takes none.
        for param in &function.params {
            let addr = self.alloc_local(2);
            self.locals.insert(
                param.name.clone(),
                Local {
                    addr,
                    ty: LocalTy::Scalar,
                },
            );
        }

        for stmt in &function.body {
            self.gen_stmt(stmt)?;
        }

        // Epilogue for fall-through
        if is_entry {
            self.emit(enc_hlt());
        } else {
            self.emit(enc_ret());
        }
        Ok(())
    }

    fn alloc_local(&mut self, size: u16) -> u16 {
        let size2 = (size + 1) & !1;
        let addr = self.next_slot_addr - size2 + 2;
        self.next_slot_addr = addr - 2;
        addr
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> GResult<()> {
        match stmt {
            Stmt::VarDecl {
                name,
                type_name,
                value,
                pos,
            } => {
                let struct_name = type_name
                    .as_deref()
                    .filter(|t| self.structs.contains_key(*t))
                    .map(str::to_string);
                if let Some(type_name) = struct_name {
                    if value.is_some() {
                        return Err(self.unsupported(*pos, "struct locals take no initializer"));
                    }
                    let size = self.structs[&type_name].size;
                    let addr = self.alloc_local(size);
                    self.locals.insert(
                        name.clone(),
                        Local {
                            addr,
                            ty: LocalTy::Struct(type_name),
                        },
                    );
                    return Ok(());
                }

                match value {
                    Some(value) => self.gen_expr(value)?,
                    None => self.emit_mov_imm(0, 0),
                }
                let addr = self.alloc_local(2);
                self.locals.insert(
                    name.clone(),
                    Local {
                        addr,
                        ty: LocalTy::Scalar,
                    },
                );
                self.emit_store_slot_r0(addr);
                Ok(())
            }

            Stmt::Assign { target, value, pos } => match target {
                Expr::Ident { name, .. } => {
                    let local = self
                        .locals
                        .get(name)
                        .cloned()
                        .ok_or_else(|| self.unsupported(*pos, format!("cannot assign to '{}'", name)))?;
                    if local.ty != LocalTy::Scalar {
                        return Err(self.unsupported(*pos, "cannot assign a whole struct"));
                    }
                    self.gen_expr(value)?;
                    self.emit_store_slot_r0(local.addr);
                    Ok(())
                }
                Expr::Member { object, field, pos } => {
                    let (addr, width) = self.member_address(object, field, *pos)?;
                    self.gen_expr(value)?;
                    self.emit_mov_imm(1, addr);
                    self.emit(enc_mov_store(1, 0, width == 2));
                    Ok(())
                }
                other => Err(self.unsupported(other.pos(), "unsupported assignment target")),
            },

            Stmt::If {
                arms, else_body, ..
            } => {
                let end = self.builder.new_label();
                for (cond, body) in arms {
                    let next_arm = self.builder.new_label();
                    self.gen_condition(cond, next_arm)?;
                    for stmt in body {
                        self.gen_stmt(stmt)?;
                    }
                    self.builder.emit_jmp(end);
                    self.builder.bind_label(next_arm);
                }
                if let Some(body) = else_body {
                    for stmt in body {
                        self.gen_stmt(stmt)?;
                    }
                }
                self.builder.bind_label(end);
                Ok(())
            }

            Stmt::While { cond, body, .. } => {
                let top = self.builder.new_label();
                let end = self.builder.new_label();
                self.builder.bind_label(top);
                self.gen_condition(cond, end)?;
                for stmt in body {
                    self.gen_stmt(stmt)?;
                }
                self.builder.emit_jmp(top);
                self.builder.bind_label(end);
                Ok(())
            }

            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.gen_stmt(init)?;
                let top = self.builder.new_label();
                let end = self.builder.new_label();
                self.builder.bind_label(top);
                self.gen_condition(cond, end)?;
                for stmt in body {
                    self.gen_stmt(stmt)?;
                }
                self.gen_stmt(post)?;
                self.builder.emit_jmp(top);
                self.builder.bind_label(end);
                Ok(())
            }

            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.gen_expr(value)?;
                }
                if self.in_entry {
                    self.emit(enc_hlt());
                } else {
                    self.emit(enc_ret());
                }
                Ok(())
            }

            Stmt::Expr { expr, .. } => self.gen_expr(expr),
        }
    }

    /// Evaluate a condition; branch to `on_false` when it is zero
    fn gen_condition(&mut self, cond: &Expr, on_false: LabelId) -> GResult<()> {
        self.gen_expr(cond)?;
        self.emit(enc_cmp_ri(0));
        self.emit(0);
        self.builder.emit_branch(Predicate::Eq, on_false);
        Ok(())
    }

    // ========================================
    // Expressions
    // ========================================

    /// Emit code leaving the expression's value in R0
    ///
    /// May clobber R1 and R2 and use transient spill slots.
    pub(crate) fn gen_expr(&mut self, expr: &Expr) -> GResult<()> {
        // Whole-constant subtrees collapse to a single immediate
        if let Some(value) = self.const_eval(expr) {
            self.emit_mov_imm(0, value);
            return Ok(());
        }

        match expr {
            Expr::Number { value, pos } => {
                let value = in_range(*value)
                    .ok_or_else(|| self.value_range_error(*pos, *value))?;
                self.emit_mov_imm(0, value);
                Ok(())
            }
            Expr::Bool { value, .. } => {
                self.emit_mov_imm(0, *value as u16);
                Ok(())
            }
            Expr::Str { pos, .. } => {
                Err(self.unsupported(*pos, "string values are only valid in asset payloads"))
            }
            Expr::Ident { name, pos } => {
                let local = self.locals.get(name).cloned();
                match local {
                    Some(Local {
                        addr,
                        ty: LocalTy::Scalar,
                    }) => {
                        self.emit_load_slot(0, addr);
                        Ok(())
                    }
                    // A struct-typed local's value is its stack address
                    Some(Local { addr, .. }) => {
                        self.emit_mov_imm(0, addr);
                        Ok(())
                    }
                    None => Err(self.unsupported(
                        *pos,
                        format!("'{}' has no value in this context", name),
                    )),
                }
            }
            Expr::Unary { op, operand, pos } => self.gen_unary(*op, operand, *pos),
            Expr::Binary { op, lhs, rhs, pos } => self.gen_binary(*op, lhs, rhs, *pos),
            Expr::Call { callee, args, pos } => self.gen_call(callee, args, *pos),
            Expr::Member { object, field, pos } => {
                let (addr, width) = self.member_address(object, field, *pos)?;
                self.emit_mov_imm(1, addr);
                self.emit(enc_mov_load(0, 1, width == 2));
                Ok(())
            }
            Expr::Index { pos, .. } => {
                Err(self.unsupported(*pos, "indexing is not supported"))
            }
        }
    }

    fn value_range_error(
        &self,
        pos: crate::compiler::diagnostics::SourcePos,
        value: i64,
    ) -> Box<Diagnostic> {
        Box::new(Diagnostic::error(
            Stage::Codegen,
            "TypeError",
            codes::E_TYPE,
            format!("value {} does not fit in 16 bits", value),
            self.file,
            SourceRange::at(pos),
        ))
    }

    /// Resolve a `local.field` access to (absolute address, field width)
    fn member_address(
        &self,
        object: &Expr,
        field: &str,
        pos: crate::compiler::diagnostics::SourcePos,
    ) -> GResult<(u16, u16)> {
        let name = match object {
            Expr::Ident { name, .. } => name,
            other => {
                return Err(self.unsupported(other.pos(), "member access requires a struct local"))
            }
        };
        let local = self
            .locals
            .get(name)
            .ok_or_else(|| self.unsupported(pos, format!("unknown struct local '{}'", name)))?;
        let type_name = match &local.ty {
            LocalTy::Struct(type_name) => type_name,
            LocalTy::Scalar => {
                return Err(self.unsupported(pos, format!("'{}' is not a struct", name)))
            }
        };
        let layout = &self.structs[type_name];
        let (offset, width) = layout.field(field).ok_or_else(|| {
            self.unsupported(pos, format!("type '{}' has no field '{}'", type_name, field))
        })?;
        Ok((local.addr + offset, width))
    }

    fn gen_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        pos: crate::compiler::diagnostics::SourcePos,
    ) -> GResult<()> {
        match op {
            UnaryOp::Neg => {
                self.gen_expr(operand)?;
                self.emit(enc_mov_rr(1, 0));
                self.emit_mov_imm(0, 0);
                self.emit(enc_alu_rr(AluOp::Sub, 0, 1));
                Ok(())
            }
            UnaryOp::Not => {
                self.gen_expr(operand)?;
                self.emit(enc_cmp_ri(0));
                self.emit(0);
                self.emit_select(Predicate::Eq);
                Ok(())
            }
            UnaryOp::BitNot => {
                self.gen_expr(operand)?;
                self.emit(enc_not(0));
                Ok(())
            }
            UnaryOp::AddrOf => match operand {
                Expr::Ident { name, .. } => {
                    let local = self.locals.get(name).ok_or_else(|| {
                        self.unsupported(pos, format!("'&' requires a local, found '{}'", name))
                    })?;
                    let addr = local.addr;
                    self.emit_mov_imm(0, addr);
                    Ok(())
                }
                other => Err(self.unsupported(other.pos(), "'&' requires a plain local")),
            },
        }
    }

    /// Leave 1 or 0 in R0 depending on the already-computed flags
    fn emit_select(&mut self, predicate: Predicate) {
        let on_true = self.builder.new_label();
        let end = self.builder.new_label();
        self.builder.emit_branch(predicate, on_true);
        self.emit_mov_imm(0, 0);
        self.builder.emit_jmp(end);
        self.builder.bind_label(on_true);
        self.emit_mov_imm(0, 1);
        self.builder.bind_label(end);
    }

    /// Evaluate lhs and rhs, leaving lhs in R0 and rhs in R1
    fn gen_operand_pair(&mut self, lhs: &Expr, rhs: &Expr) -> GResult<()> {
        self.gen_expr(lhs)?;
        let slot = self.scratch_push();
        self.emit_store_slot_r0(slot);
        self.gen_expr(rhs)?;
        self.emit(enc_mov_rr(1, 0));
        self.emit_load_slot(0, slot);
        self.scratch_pop();
        Ok(())
    }

    fn gen_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        pos: crate::compiler::diagnostics::SourcePos,
    ) -> GResult<()> {
        // Direct ALU mappings
        let alu = match op {
            BinaryOp::Add => Some(AluOp::Add),
            BinaryOp::Sub => Some(AluOp::Sub),
            BinaryOp::BitAnd | BinaryOp::And => Some(AluOp::And),
            BinaryOp::BitOr | BinaryOp::Or => Some(AluOp::Or),
            BinaryOp::BitXor => Some(AluOp::Xor),
            BinaryOp::Shl => Some(AluOp::Shl),
            BinaryOp::Shr => Some(AluOp::Shr),
            _ => None,
        };
        if let Some(alu) = alu {
            // Immediate form when the right side folds
            if let Some(value) = self.const_eval(rhs) {
                self.gen_expr(lhs)?;
                self.emit_alu_imm(alu, 0, value);
                return Ok(());
            }
            self.gen_operand_pair(lhs, rhs)?;
            self.emit(enc_alu_rr(alu, 0, 1));
            return Ok(());
        }

        // Comparisons: CMP then a predicate select of 1/0
        let predicate = match op {
            BinaryOp::Eq => Some(Predicate::Eq),
            BinaryOp::Ne => Some(Predicate::Ne),
            BinaryOp::Lt => Some(Predicate::Lt),
            BinaryOp::Le => Some(Predicate::Le),
            BinaryOp::Gt => Some(Predicate::Gt),
            BinaryOp::Ge => Some(Predicate::Ge),
            _ => None,
        };
        if let Some(predicate) = predicate {
            if let Some(value) = self.const_eval(rhs) {
                self.gen_expr(lhs)?;
                self.emit(enc_cmp_ri(0));
                self.emit(value);
            } else {
                self.gen_operand_pair(lhs, rhs)?;
                self.emit(enc_cmp_rr(0, 1));
            }
            self.emit_select(predicate);
            return Ok(());
        }

        match op {
            BinaryOp::Mul => self.gen_mul(lhs, rhs, pos),
            BinaryOp::Div => self.gen_div(lhs, rhs, pos),
            BinaryOp::Mod => self.gen_mod(lhs, rhs, pos),
            _ => unreachable!("all operators handled"),
        }
    }

    fn gen_mul(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        pos: crate::compiler::diagnostics::SourcePos,
    ) -> GResult<()> {
        if let Some(shift) = self.const_eval(rhs).and_then(pow2_shift) {
            self.gen_expr(lhs)?;
            self.emit_alu_imm(AluOp::Shl, 0, shift);
            return Ok(());
        }
        if let Some(shift) = self.const_eval(lhs).and_then(pow2_shift) {
            self.gen_expr(rhs)?;
            self.emit_alu_imm(AluOp::Shl, 0, shift);
            return Ok(());
        }
        Err(self.unsupported(
            pos,
            "multiplication is only supported by power-of-two literals",
        ))
    }

    fn gen_div(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        pos: crate::compiler::diagnostics::SourcePos,
    ) -> GResult<()> {
        if let Some(shift) = self.const_eval(rhs).and_then(pow2_shift) {
            self.gen_expr(lhs)?;
            self.emit_alu_imm(AluOp::Shr, 0, shift);
            return Ok(());
        }
        Err(self.unsupported(
            pos,
            "division is only supported by power-of-two literals",
        ))
    }

    fn gen_mod(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        pos: crate::compiler::diagnostics::SourcePos,
    ) -> GResult<()> {
        if let Some(value) = self.const_eval(rhs) {
            if pow2_shift(value).is_some() {
                self.gen_expr(lhs)?;
                self.emit_alu_imm(AluOp::And, 0, value - 1);
                return Ok(());
            }
            if value == 60 {
                // Subtract loop: while R0 >= 60 { R0 -= 60 }
                self.gen_expr(lhs)?;
                let top = self.builder.new_label();
                let done = self.builder.new_label();
                self.builder.bind_label(top);
                self.emit(enc_cmp_ri(0));
                self.emit(60);
                self.builder.emit_branch(Predicate::Lt, done);
                self.emit_alu_imm(AluOp::Sub, 0, 60);
                self.builder.emit_jmp(top);
                self.builder.bind_label(done);
                return Ok(());
            }
        }
        Err(self.unsupported(
            pos,
            "modulo is only supported by power-of-two literals or 60",
        ))
    }

    fn gen_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        pos: crate::compiler::diagnostics::SourcePos,
    ) -> GResult<()> {
        match callee {
            Expr::Ident { name, .. } => match name.as_str() {
                "wait_vblank" => {
                    self.check_arity("wait_vblank", args, 0, pos)?;
                    self.emit_wait_vblank();
                    Ok(())
                }
                other => Err(self.unsupported(
                    pos,
                    format!("user-defined function calls are not supported ('{}')", other),
                )),
            },
            Expr::Member { object, field, .. } => {
                let namespace = match &**object {
                    Expr::Ident { name, .. } => name.as_str(),
                    other => {
                        return Err(
                            self.unsupported(other.pos(), "calls require a namespace receiver")
                        )
                    }
                };
                self.gen_builtin(namespace, field, args, pos)
            }
            other => Err(self.unsupported(other.pos(), "unsupported call target")),
        }
    }

    pub(crate) fn check_arity(
        &self,
        name: &str,
        args: &[Expr],
        expected: usize,
        pos: crate::compiler::diagnostics::SourcePos,
    ) -> GResult<()> {
        if args.len() != expected {
            return Err(self.unsupported(
                pos,
                format!(
                    "{} expects {} argument(s), found {}",
                    name,
                    expected,
                    args.len()
                ),
            ));
        }
        Ok(())
    }
}

fn in_range(value: i64) -> Option<u16> {
    if (-32768..=65535).contains(&value) {
        Some(value as u16)
    } else {
        None
    }
}

/// The shift amount when `value` is a power of two greater than zero
fn pow2_shift(value: u16) -> Option<u16> {
    (value != 0 && value & (value - 1) == 0).then(|| value.trailing_zeros() as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::compiler::assets::normalize_assets;
    use crate::compiler::lexer::lex;
    use crate::compiler::parser::parse;
    use crate::cpu::Cpu;
    use crate::rom::Rom;

    /// Compile a source string straight to code words
    fn compile_words(source: &str) -> Vec<u16> {
        let mut diagnostics = Vec::new();
        let tokens = lex(source, "test.clx", &mut diagnostics);
        let program = parse(&tokens, "test.clx", &mut diagnostics).expect("parse");
        let assets = normalize_assets(&program.assets, "test.clx", &mut diagnostics);
        let words =
            generate(&program, &assets, "test.clx", &mut diagnostics).expect("generate");
        assert!(diagnostics.is_empty(), "diagnostics: {:?}", diagnostics);
        words
    }

    fn compile_err(source: &str) -> Diagnostic {
        let mut diagnostics = Vec::new();
        let tokens = lex(source, "test.clx", &mut diagnostics);
        let program = parse(&tokens, "test.clx", &mut diagnostics).expect("parse");
        let assets = normalize_assets(&program.assets, "test.clx", &mut diagnostics);
        let words = generate(&program, &assets, "test.clx", &mut diagnostics);
        assert!(words.is_none());
        diagnostics.pop().expect("diagnostic")
    }

    /// Run compiled words until the CPU halts (or the step cap runs out)
    fn run_to_halt(words: &[u16]) -> (Cpu, Bus) {
        let mut bus = Bus::new();
        bus.load_rom(Rom::from_code_words(words));
        let mut cpu = Cpu::new();
        for _ in 0..200_000 {
            if cpu.halted {
                break;
            }
            cpu.step(&mut bus).expect("step");
        }
        assert!(cpu.halted, "program should reach HLT");
        (cpu, bus)
    }

    // ========================================
    // Basic Codegen Tests
    // ========================================

    #[test]
    fn test_var_decl_and_arithmetic() {
        let words = compile_words("function Start()\n    x := 5\n    y := x + 3\n");
        let (_, bus) = run_to_halt(&words);
        assert_eq!(bus.wram().read16(0x1FFE), 5, "first slot at $1FFE");
        assert_eq!(bus.wram().read16(0x1FFC), 8, "second slot at $1FFC");
    }

    #[test]
    fn test_assignment() {
        let words = compile_words("function Start()\n    x := 1\n    x = x + 41\n");
        let (_, bus) = run_to_halt(&words);
        assert_eq!(bus.wram().read16(0x1FFE), 42);
    }

    #[test]
    fn test_constant_folding() {
        let words = compile_words("function Start()\n    x := 6 * 7\n");
        let (_, bus) = run_to_halt(&words);
        assert_eq!(bus.wram().read16(0x1FFE), 42, "const multiply folds");
    }

    #[test]
    fn test_comparison_selects_bool() {
        let source = "function Start()\n    a := 3 < 5\n    b := 5 < 3\n    c := a == b\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        assert_eq!(bus.wram().read16(0x1FFE), 1);
        assert_eq!(bus.wram().read16(0x1FFC), 0);
        assert_eq!(bus.wram().read16(0x1FFA), 0);
    }

    #[test]
    fn test_if_else_chain() {
        let source = "function Start()\n    x := 2\n    r := 0\n    if x == 1\n        r = 10\n    elseif x == 2\n        r = 20\n    else\n        r = 30\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        assert_eq!(bus.wram().read16(0x1FFC), 20);
    }

    #[test]
    fn test_while_loop() {
        let source = "function Start()\n    i := 0\n    total := 0\n    while i < 5\n        total = total + i\n        i = i + 1\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        assert_eq!(bus.wram().read16(0x1FFC), 10, "0+1+2+3+4");
    }

    #[test]
    fn test_for_loop() {
        let source =
            "function Start()\n    total := 0\n    for i := 0, i < 4, i = i + 1\n        total = total + 2\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        assert_eq!(bus.wram().read16(0x1FFE), 8);
    }

    #[test]
    fn test_mul_div_mod_pow2() {
        let source = "function Start()\n    a := 5\n    b := a * 8\n    c := b / 4\n    d := b % 16\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        assert_eq!(bus.wram().read16(0x1FFC), 40);
        assert_eq!(bus.wram().read16(0x1FFA), 10);
        assert_eq!(bus.wram().read16(0x1FF8), 8);
    }

    #[test]
    fn test_mod_60() {
        let source = "function Start()\n    f := 130\n    s := f % 60\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        assert_eq!(bus.wram().read16(0x1FFC), 10);
    }

    #[test]
    fn test_unary_operators() {
        let source = "function Start()\n    x := 5\n    n := -x\n    b := !x\n    c := ~x\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        assert_eq!(bus.wram().read16(0x1FFC), (-5i16) as u16);
        assert_eq!(bus.wram().read16(0x1FFA), 0);
        assert_eq!(bus.wram().read16(0x1FF8), !5u16);
    }

    #[test]
    fn test_addr_of() {
        let source = "function Start()\n    x := 7\n    p := &x\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        assert_eq!(bus.wram().read16(0x1FFC), 0x1FFE, "address of the first slot");
    }

    #[test]
    fn test_struct_member_access() {
        let source = "function Start()\n    s: Sprite\n    s.y = 99\n    s.tile = 7\n    v := s.y\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        // Sprite occupies $1FFA..$1FFF; y is byte offset 2
        assert_eq!(bus.wram().read(0x1FFA + 2), 99);
        assert_eq!(bus.wram().read(0x1FFA + 3), 7);
        assert_eq!(bus.wram().read16(0x1FF8), 99);
    }

    #[test]
    fn test_vec2_members_are_words() {
        let source = "function Start()\n    v: Vec2\n    v.x = 320\n    v.y = 200\n    s := v.x + v.y\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        // Vec2 occupies $1FFC..$1FFF; the next scalar slot is $1FFA
        assert_eq!(bus.wram().read16(0x1FFC), 320);
        assert_eq!(bus.wram().read16(0x1FFE), 200);
        assert_eq!(bus.wram().read16(0x1FFA), 520);
    }

    #[test]
    fn test_entry_function_emitted_first() {
        // Start's first instruction must land at the entry offset even
        // when it is declared after another function
        let source = "function Helper()\n    return\nfunction Start()\n    x := 1\n";
        let words = compile_words(source);
        // The first word belongs to Start: MOV R0, #1
        assert_eq!(words[0], enc_mov_ri(0));
        assert_eq!(words[1], 1);
    }

    #[test]
    fn test_asset_constant_value() {
        let source = "asset A: tiles8 hex\n    60\nasset B: tiles8 hex\n    61\nfunction Start()\n    id := ASSET_B\n";
        let (_, bus) = run_to_halt(&compile_words(source));
        assert_eq!(bus.wram().read16(0x1FFE), 2, "1-based declaration order");
    }

    // ========================================
    // Error Tests
    // ========================================

    #[test]
    fn test_general_multiplication_rejected() {
        let diagnostic = compile_err("function Start()\n    a := 3\n    b := a * a\n");
        assert_eq!(diagnostic.code, "E_CODEGEN_UNSUPPORTED");
        assert_eq!(diagnostic.stage, Stage::Codegen);
    }

    #[test]
    fn test_user_call_rejected() {
        let diagnostic =
            compile_err("function Helper()\n    return\nfunction Start()\n    Helper()\n");
        assert_eq!(diagnostic.code, "E_CODEGEN_UNSUPPORTED");
        assert!(diagnostic.message.contains("user-defined"));
    }

    #[test]
    fn test_unknown_builtin_rejected() {
        let diagnostic = compile_err("function Start()\n    gfx.frobnicate(1)\n");
        assert_eq!(diagnostic.code, "E_CODEGEN_UNSUPPORTED");
    }

    #[test]
    fn test_out_of_range_literal_rejected() {
        let diagnostic = compile_err("function Start()\n    x := 70000\n");
        assert_eq!(diagnostic.code, "E_TYPE");
    }

    #[test]
    fn test_stops_at_first_error() {
        let source = "function Start()\n    a := 3\n    b := a * a\n    c := a * a\n";
        let mut diagnostics = Vec::new();
        let tokens = lex(source, "test.clx", &mut diagnostics);
        let program = parse(&tokens, "test.clx", &mut diagnostics).expect("parse");
        generate(&program, &[], "test.clx", &mut diagnostics);
        assert_eq!(diagnostics.len(), 1, "first unsupported condition only");
    }
}
