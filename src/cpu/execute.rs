// CPU execution - fetch/decode/execute cycle
//
// `step()` performs one instruction: fetch the word at (PCBank,
// PCOffset) through the Bus's code path, advance the PC, decode, execute,
// and add the instruction's cycle cost to the counter. PCOffset never
// carries into PCBank; loaders must keep code inside one bank.

use crate::bus::Bus;
use crate::cpu::alu;
use crate::cpu::decode::{decode, AluOp, Instruction, Predicate, Rhs};
use crate::cpu::{Cpu, CpuError};

impl Cpu {
    /// Execute one instruction
    ///
    /// Returns the cycle cost, or a recoverable [`CpuError`] for a word
    /// that does not decode. A halted CPU idles at one cycle per call.
    pub fn step(&mut self, bus: &mut Bus) -> Result<u32, CpuError> {
        if self.halted {
            return Ok(1);
        }

        let word_bank = self.pc_bank;
        let word_offset = self.pc_offset;
        let word = bus.fetch16(word_bank, word_offset);
        self.pc_offset = self.pc_offset.wrapping_add(2);

        let instruction = decode(word).ok_or(CpuError::InvalidOpcode {
            word,
            bank: word_bank,
            offset: word_offset,
        })?;

        let cycles = self.execute(instruction, bus);
        self.cycles += cycles as u64;
        Ok(cycles)
    }

    /// Fetch the immediate word following the current instruction
    fn fetch_imm(&mut self, bus: &Bus) -> u16 {
        let value = bus.fetch16(self.pc_bank, self.pc_offset);
        self.pc_offset = self.pc_offset.wrapping_add(2);
        value
    }

    /// Resolve a right-hand operand, fetching the immediate if needed
    fn rhs_value(&mut self, rhs: Rhs, bus: &Bus) -> u16 {
        match rhs {
            Rhs::Reg(src) => self.r[src as usize],
            Rhs::Imm => self.fetch_imm(bus),
        }
    }

    /// Push a 16-bit word onto the stack in WRAM
    fn push16(&mut self, bus: &mut Bus, value: u16) {
        self.sp = self.sp.wrapping_sub(2);
        bus.write16(self.dbr, self.sp, value);
    }

    /// Pop a 16-bit word from the stack
    fn pop16(&mut self, bus: &mut Bus) -> u16 {
        let value = bus.read16(self.dbr, self.sp);
        self.sp = self.sp.wrapping_add(2);
        value
    }

    fn predicate_holds(&self, predicate: Predicate) -> bool {
        let f = self.flags;
        match predicate {
            Predicate::Eq => f.zero(),
            Predicate::Ne => !f.zero(),
            Predicate::Lt => f.negative() != f.overflow(),
            Predicate::Le => f.zero() || (f.negative() != f.overflow()),
            Predicate::Gt => !f.zero() && (f.negative() == f.overflow()),
            Predicate::Ge => f.negative() == f.overflow(),
        }
    }

    fn execute(&mut self, instruction: Instruction, bus: &mut Bus) -> u32 {
        match instruction {
            Instruction::Nop => 1,

            Instruction::Hlt => {
                self.halted = true;
                1
            }

            Instruction::MovRegReg { dst, src } => {
                self.r[dst as usize] = self.r[src as usize];
                1
            }

            Instruction::MovImm { dst } => {
                let value = self.fetch_imm(bus);
                self.r[dst as usize] = value;
                2
            }

            Instruction::MovLoad { dst, addr, word } => {
                let offset = self.r[addr as usize];
                self.r[dst as usize] = if word {
                    bus.read16(self.dbr, offset)
                } else {
                    bus.read8(self.dbr, offset) as u16
                };
                3
            }

            Instruction::MovStore { addr, src, word } => {
                let offset = self.r[addr as usize];
                let value = self.r[src as usize];
                if word {
                    bus.write16(self.dbr, offset, value);
                } else {
                    bus.write8(self.dbr, offset, (value & 0xFF) as u8);
                }
                3
            }

            Instruction::Alu { op, dst, rhs } => {
                let imm = matches!(rhs, Rhs::Imm);
                let a = self.r[dst as usize];
                let b = self.rhs_value(rhs, bus);
                let (result, flags) = match op {
                    AluOp::Add => alu::add16(a, b),
                    AluOp::Sub => alu::sub16(a, b),
                    AluOp::And => alu::and16(a, b),
                    AluOp::Or => alu::or16(a, b),
                    AluOp::Xor => alu::xor16(a, b),
                    AluOp::Shl => alu::shl16(a, b),
                    AluOp::Shr => alu::shr16(a, b),
                };
                self.r[dst as usize] = result;
                self.flags = flags;
                if imm {
                    2
                } else {
                    1
                }
            }

            Instruction::Not { dst } => {
                let (result, flags) = alu::not16(self.r[dst as usize]);
                self.r[dst as usize] = result;
                self.flags = flags;
                1
            }

            Instruction::Cmp { lhs, rhs } => {
                let imm = matches!(rhs, Rhs::Imm);
                let a = self.r[lhs as usize];
                let b = self.rhs_value(rhs, bus);
                self.flags = alu::cmp16(a, b);
                if imm {
                    2
                } else {
                    1
                }
            }

            Instruction::Branch { predicate } => {
                let offset = self.fetch_imm(bus) as i16;
                // The anchor is the address after the offset word
                if self.predicate_holds(predicate) {
                    self.pc_offset = self.pc_offset.wrapping_add(offset as u16);
                    3
                } else {
                    2
                }
            }

            Instruction::Jmp => {
                let offset = self.fetch_imm(bus) as i16;
                self.pc_offset = self.pc_offset.wrapping_add(offset as u16);
                2
            }

            Instruction::Call => {
                let offset = self.fetch_imm(bus) as i16;
                let return_offset = self.pc_offset;
                self.push16(bus, return_offset);
                self.pc_offset = self.pc_offset.wrapping_add(offset as u16);
                4
            }

            Instruction::Ret => {
                self.pc_offset = self.pop16(bus);
                4
            }
        }
    }
}
