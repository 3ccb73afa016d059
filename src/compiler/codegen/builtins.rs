// Built-in call sequences
//
// Every built-in is open-coded as an inline instruction sequence that
// programs the owning device's MMIO directly. Arguments evaluate to
// scratch slots first; sequences then reload them through R2 so that R1
// can hold a port address across several stores. Results come back in
// R0.

use super::CodeGenerator;
use crate::compiler::assets::{is_16x16_kind, AssetIR};
use crate::compiler::ast::Expr;
use crate::compiler::diagnostics::SourcePos;
use crate::cpu::decode::{enc_alu_ri, enc_cmp_ri, enc_mov_load, enc_mov_store, AluOp, Predicate};
use crate::{apu, ppu};

type GResult<T> = Result<T, Box<crate::compiler::diagnostics::Diagnostic>>;

impl<'a> CodeGenerator<'a> {
    /// Dispatch a namespaced built-in call
    pub(crate) fn gen_builtin(
        &mut self,
        namespace: &str,
        name: &str,
        args: &[Expr],
        pos: SourcePos,
    ) -> GResult<()> {
        match (namespace, name) {
            ("input", "read") => {
                self.check_arity("input.read", args, 0, pos)?;
                self.emit_input_read();
                Ok(())
            }
            ("gfx", "set_palette") => {
                self.check_arity("gfx.set_palette", args, 3, pos)?;
                self.emit_set_palette(args)
            }
            ("gfx", "load_tiles") => {
                self.check_arity("gfx.load_tiles", args, 2, pos)?;
                self.emit_load_tiles(&args[0], &args[1], pos)
            }
            ("oam", "write_sprite_data") => {
                self.check_arity("oam.write_sprite_data", args, 6, pos)?;
                self.emit_write_sprite_data(args)
            }
            ("oam", "clear_sprite") => {
                self.check_arity("oam.clear_sprite", args, 1, pos)?;
                self.emit_clear_sprite(&args[0])
            }
            ("sprite", "set_position") => {
                self.check_arity("sprite.set_position", args, 3, pos)?;
                self.emit_sprite_set_position(args)
            }
            ("ppu", "enable_bg0") => {
                self.check_arity("ppu.enable_bg0", args, 0, pos)?;
                self.emit_write_port_imm(ppu::ports::BG0_CONTROL, 1);
                Ok(())
            }
            ("ppu", "set_scroll") => {
                self.check_arity("ppu.set_scroll", args, 2, pos)?;
                self.emit_set_scroll(args)
            }
            ("apu", "enable") => {
                self.check_arity("apu.enable", args, 0, pos)?;
                self.emit_write_port_imm(apu::ports::MASTER_VOLUME, 0xFF);
                Ok(())
            }
            ("apu", "master_volume") => {
                self.check_arity("apu.master_volume", args, 1, pos)?;
                self.gen_expr(&args[0])?;
                self.emit_write_port_r0(apu::ports::MASTER_VOLUME);
                Ok(())
            }
            ("apu", "play") => {
                self.check_arity("apu.play", args, 4, pos)?;
                self.emit_apu_play(args, pos)
            }
            ("apu", "stop") => {
                self.check_arity("apu.stop", args, 1, pos)?;
                self.emit_apu_stop(&args[0])
            }
            _ => Err(self.unsupported(pos, format!("unknown built-in '{}.{}'", namespace, name))),
        }
    }

    // ========================================
    // Polling and Input
    // ========================================

    /// Two-phase poll of the VBlank flag: wait for it to clear, then to
    /// set, so one call always spans into a fresh VBlank
    pub(crate) fn emit_wait_vblank(&mut self) {
        self.emit_mov_imm(1, ppu::ports::VBLANK_FLAG);

        let wait_clear = self.builder_mut().new_label();
        self.builder_mut().bind_label(wait_clear);
        self.emit(enc_mov_load(0, 1, false));
        self.emit(enc_alu_ri(AluOp::And, 0));
        self.emit(1);
        self.emit(enc_cmp_ri(0));
        self.emit(0);
        self.builder_mut().emit_branch(Predicate::Ne, wait_clear);

        let wait_set = self.builder_mut().new_label();
        self.builder_mut().bind_label(wait_set);
        self.emit(enc_mov_load(0, 1, false));
        self.emit(enc_alu_ri(AluOp::And, 0));
        self.emit(1);
        self.emit(enc_cmp_ri(0));
        self.emit(0);
        self.builder_mut().emit_branch(Predicate::Eq, wait_set);
    }

    /// Latch controller 1 and assemble its 16-bit state in R0
    fn emit_input_read(&mut self) {
        self.emit_write_port_imm(0xA001, 1);
        self.emit_write_port_imm(0xA001, 0);
        self.emit_mov_imm(1, 0xA000);
        self.emit(enc_mov_load(3, 1, false)); // low byte
        self.emit(enc_mov_load(0, 1, false)); // high byte
        self.emit(enc_alu_ri(AluOp::Shl, 0));
        self.emit(8);
        self.emit(crate::cpu::decode::enc_alu_rr(AluOp::Or, 0, 3));
    }

    // ========================================
    // Graphics
    // ========================================

    /// Program CGRAM index `p*16 + c`, then the low and high color bytes
    ///
    /// The index is written as-is: the CGRAM port applies the x2 byte
    /// addressing itself, so no further scaling happens here.
    fn emit_set_palette(&mut self, args: &[Expr]) -> GResult<()> {
        let slots = self.eval_args_to_scratch(args)?;

        self.emit_load_slot(0, slots[0]);
        self.emit_alu_imm(AluOp::Shl, 0, 4);
        self.emit_load_slot(1, slots[1]);
        self.emit(crate::cpu::decode::enc_alu_rr(AluOp::Add, 0, 1));
        self.emit_write_port_r0(ppu::ports::CGRAM_ADDR);

        self.emit_load_slot(0, slots[2]);
        self.emit_write_port_r0(ppu::ports::CGRAM_DATA);
        self.emit_alu_imm(AluOp::Shr, 0, 8);
        self.emit(enc_mov_store(1, 0, false)); // R1 still holds the port

        self.free_scratch(slots.len());
        Ok(())
    }

    /// `gfx.load_tiles(asset, base)` - returns the VRAM address in R0
    ///
    /// A compile-time asset id streams its payload inline. A variable id
    /// compiles to a compare chain over every graphics asset tag, each
    /// arm inlining that asset's stream, so runtime dispatch reaches the
    /// same bytes.
    fn emit_load_tiles(&mut self, asset_expr: &Expr, base_expr: &Expr, pos: SourcePos) -> GResult<()> {
        if let Some(asset) = self
            .const_eval(asset_expr)
            .and_then(|tag| self.gfx_asset_by_tag(tag))
        {
            let shift = tile_shift(asset);
            let payload = asset.data.clone();

            self.gen_expr(base_expr)?;
            self.emit_alu_imm(AluOp::Shl, 0, shift);
            let addr_slot = self.scratch_push();
            self.emit_store_slot_r0(addr_slot);
            self.emit_vram_stream(&payload);
            self.emit_load_slot(0, addr_slot);
            self.scratch_pop();
            return Ok(());
        }

        // Runtime dispatch over the known graphics assets
        let arms: Vec<(u16, u16, Vec<u8>)> = self
            .gfx_assets()
            .map(|a| (a.tag, tile_shift(a), a.data.clone()))
            .collect();
        if arms.is_empty() {
            return Err(self.unsupported(
                pos,
                "gfx.load_tiles with a variable id needs at least one graphics asset",
            ));
        }

        self.gen_expr(base_expr)?;
        let base_slot = self.scratch_push();
        self.emit_store_slot_r0(base_slot);
        let result_slot = self.scratch_push();
        self.emit_mov_imm(0, 0);
        self.emit_store_slot_r0(result_slot);

        self.gen_expr(asset_expr)?; // id in R0 across the compare chain

        let end = self.builder_mut().new_label();
        for (tag, shift, payload) in arms {
            let next = self.builder_mut().new_label();
            self.emit(enc_cmp_ri(0));
            self.emit(tag);
            self.builder_mut().emit_branch(Predicate::Ne, next);

            self.emit_load_slot(0, base_slot);
            self.emit_alu_imm(AluOp::Shl, 0, shift);
            self.emit_store_slot_r0(result_slot);
            self.emit_vram_stream(&payload);

            self.builder_mut().emit_jmp(end);
            self.builder_mut().bind_label(next);
        }
        self.builder_mut().bind_label(end);

        self.emit_load_slot(0, result_slot);
        self.scratch_pop();
        self.scratch_pop();
        Ok(())
    }

    /// Program the VRAM address latch from R0, then stream payload bytes
    /// through the data port
    fn emit_vram_stream(&mut self, payload: &[u8]) {
        self.emit_write_port_r0(ppu::ports::VRAM_ADDR_LO);
        self.emit_alu_imm(AluOp::Shr, 0, 8);
        self.emit_write_port_r0(ppu::ports::VRAM_ADDR_HI);

        self.emit_mov_imm(1, ppu::ports::VRAM_DATA);
        for &byte in payload {
            self.emit_mov_imm(0, byte as u16);
            self.emit(enc_mov_store(1, 0, false));
        }
    }

    fn emit_set_scroll(&mut self, args: &[Expr]) -> GResult<()> {
        let slots = self.eval_args_to_scratch(args)?;

        self.emit_load_slot(0, slots[0]);
        self.emit_write_port_r0(ppu::ports::BG0_SCROLL_X_LO);
        self.emit_alu_imm(AluOp::Shr, 0, 8);
        self.emit_write_port_r0(ppu::ports::BG0_SCROLL_X_HI);

        self.emit_load_slot(0, slots[1]);
        self.emit_write_port_r0(ppu::ports::BG0_SCROLL_Y_LO);
        self.emit_alu_imm(AluOp::Shr, 0, 8);
        self.emit_write_port_r0(ppu::ports::BG0_SCROLL_Y_HI);

        self.free_scratch(slots.len());
        Ok(())
    }

    // ========================================
    // OAM
    // ========================================

    /// Write a full six-byte sprite entry through the OAM ports
    fn emit_write_sprite_data(&mut self, args: &[Expr]) -> GResult<()> {
        let slots = self.eval_args_to_scratch(args)?;

        self.emit_load_slot(0, slots[0]);
        self.emit_write_port_r0(ppu::ports::OAM_ADDR);

        self.emit_mov_imm(1, ppu::ports::OAM_DATA);
        // X low byte then the sign/high bit
        self.emit_load_slot(0, slots[1]);
        self.emit(enc_mov_store(1, 0, false));
        self.emit_alu_imm(AluOp::Shr, 0, 8);
        self.emit_alu_imm(AluOp::And, 0, 1);
        self.emit(enc_mov_store(1, 0, false));
        // Y, tile, attr, ctrl
        for &slot in &slots[2..6] {
            self.emit_load_slot(0, slot);
            self.emit(enc_mov_store(1, 0, false));
        }

        self.free_scratch(slots.len());
        Ok(())
    }

    fn emit_clear_sprite(&mut self, id: &Expr) -> GResult<()> {
        self.gen_expr(id)?;
        self.emit_write_port_r0(ppu::ports::OAM_ADDR);
        self.emit_mov_imm(1, ppu::ports::OAM_DATA);
        self.emit_mov_imm(0, 0);
        for _ in 0..6 {
            self.emit(enc_mov_store(1, 0, false));
        }
        Ok(())
    }

    /// Rewrite only a sprite's position bytes (X low/high, Y)
    fn emit_sprite_set_position(&mut self, args: &[Expr]) -> GResult<()> {
        let slots = self.eval_args_to_scratch(args)?;

        self.emit_load_slot(0, slots[0]);
        self.emit_write_port_r0(ppu::ports::OAM_ADDR);

        self.emit_mov_imm(1, ppu::ports::OAM_DATA);
        self.emit_load_slot(0, slots[1]);
        self.emit(enc_mov_store(1, 0, false));
        self.emit_alu_imm(AluOp::Shr, 0, 8);
        self.emit_alu_imm(AluOp::And, 0, 1);
        self.emit(enc_mov_store(1, 0, false));
        self.emit_load_slot(0, slots[2]);
        self.emit(enc_mov_store(1, 0, false));

        self.free_scratch(slots.len());
        Ok(())
    }

    // ========================================
    // APU
    // ========================================

    /// `apu.play(ch, freq, vol, frames)` - one-shot square tone
    fn emit_apu_play(&mut self, args: &[Expr], _pos: SourcePos) -> GResult<()> {
        // The channel register block sits at $9000 + 8*ch
        if let Some(ch) = self.const_eval(&args[0]) {
            let base = apu::ports::CHANNEL_BASE + (ch & 3) * apu::ports::CHANNEL_STRIDE;
            let slots = self.eval_args_to_scratch(&args[1..])?;

            self.emit_load_slot(0, slots[0]);
            self.emit_write_port_r0(base + apu::ports::FREQ_LO);
            self.emit_alu_imm(AluOp::Shr, 0, 8);
            self.emit_write_port_r0(base + apu::ports::FREQ_HI);

            self.emit_load_slot(0, slots[1]);
            self.emit_write_port_r0(base + apu::ports::VOLUME);

            self.emit_load_slot(0, slots[2]);
            self.emit_write_port_r0(base + apu::ports::DURATION_LO);
            self.emit_alu_imm(AluOp::Shr, 0, 8);
            self.emit_write_port_r0(base + apu::ports::DURATION_HI);

            self.emit_write_port_imm(base + apu::ports::DURATION_MODE, 0);
            self.emit_write_port_imm(base + apu::ports::CONTROL, 0x03);

            self.free_scratch(slots.len());
            return Ok(());
        }

        // Runtime channel: compute the block base into a slot first
        let slots = self.eval_args_to_scratch(args)?;
        self.emit_load_slot(0, slots[0]);
        self.emit_alu_imm(AluOp::Shl, 0, 3);
        self.emit_alu_imm(AluOp::Add, 0, apu::ports::CHANNEL_BASE);
        let base_slot = self.scratch_push();
        self.emit_store_slot_r0(base_slot);

        let writes: [(u16, usize, bool); 5] = [
            (apu::ports::FREQ_LO, 1, false),
            (apu::ports::FREQ_HI, 1, true),
            (apu::ports::VOLUME, 2, false),
            (apu::ports::DURATION_LO, 3, false),
            (apu::ports::DURATION_HI, 3, true),
        ];
        for (offset, arg_index, high_byte) in writes {
            self.emit_load_slot(1, base_slot);
            if offset != 0 {
                self.emit_alu_imm(AluOp::Add, 1, offset);
            }
            self.emit_load_slot(0, slots[arg_index]);
            if high_byte {
                self.emit_alu_imm(AluOp::Shr, 0, 8);
            }
            self.emit(enc_mov_store(1, 0, false));
        }

        self.emit_load_slot(1, base_slot);
        self.emit_alu_imm(AluOp::Add, 1, apu::ports::DURATION_MODE);
        self.emit_mov_imm(0, 0);
        self.emit(enc_mov_store(1, 0, false));

        self.emit_load_slot(1, base_slot);
        self.emit_alu_imm(AluOp::Add, 1, apu::ports::CONTROL);
        self.emit_mov_imm(0, 0x03);
        self.emit(enc_mov_store(1, 0, false));

        self.scratch_pop();
        self.free_scratch(slots.len());
        Ok(())
    }

    fn emit_apu_stop(&mut self, ch: &Expr) -> GResult<()> {
        if let Some(ch) = self.const_eval(ch) {
            let base = apu::ports::CHANNEL_BASE + (ch & 3) * apu::ports::CHANNEL_STRIDE;
            self.emit_write_port_imm(base + apu::ports::CONTROL, 0);
            return Ok(());
        }
        self.gen_expr(ch)?;
        self.emit_alu_imm(AluOp::Shl, 0, 3);
        self.emit_alu_imm(AluOp::Add, 0, apu::ports::CHANNEL_BASE + apu::ports::CONTROL);
        self.emit(crate::cpu::decode::enc_mov_rr(1, 0));
        self.emit_mov_imm(0, 0);
        self.emit(enc_mov_store(1, 0, false));
        Ok(())
    }
}

/// VRAM address shift for a graphics asset's tile size
///
/// 8x8 kinds address tiles at `base*32`; 16x16 kinds use `base*128`
/// (four consecutive 32-byte tiles per block).
fn tile_shift(asset: &AssetIR) -> u16 {
    if is_16x16_kind(&asset.kind) {
        7
    } else {
        5
    }
}
