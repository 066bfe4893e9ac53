//! Tools for generating code using the x86_64 instruction set.
//!
//! The focus here is in concrete x86_64 instructions. One method call on an
//! Assembler generates one instruction, so documentation about the x86_64
//! instruction set applies directly to the code we assemble.
//!
//! We implement only the moves and jumps that adapter stubs need. Where we
//! have freedom to do so, we choose to make the subset as regular as
//! possible, sometimes ignoring more efficient encodings. For example, every
//! memory operand has a 32-bit displacement.

use crate::buffer::{Buffer};

/** Returns a bit pattern which includes register number `num` in all useful positions. */
fn mask(num: u8) -> u64 {
    [
        0x0000000000,
        0x0909090900, // 1
        0x1212121200, // 2
        0x1B1B1B1B00,
        0x2424242400, // 4
        0x2D2D2D2D00,
        0x3636363600,
        0x3F3F3F3F00,
        0x0000000007, // 8
        0x0909090907,
        0x1212121207,
        0x1B1B1B1B07,
        0x2424242407,
        0x2D2D2D2D07,
        0x3636363607,
        0x3F3F3F3F07,
    ][num as usize]
}

/** Anything that can go in the `reg` or `rm` field of a ModR/M byte. */
pub trait RegisterField: Copy {
    /** Returns a bit pattern which includes `self` in all useful positions. */
    fn mask(self) -> u64;
}

/**
 * The general-purpose x86_64 registers.
 *
 * All register names include a leading `R`, and omit a trailing `X`. This is
 * not intended to imply anything about the operand width, which is specified
 * in another way.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
pub enum Register {
    RA = 0,
    RC = 1,
    RD = 2,
    RB = 3,
    RSP = 4,
    RBP = 5,
    RSI = 6,
    RDI = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl RegisterField for Register {
    fn mask(self) -> u64 { mask(self as u8) }
}

/** An SSE register, `XMM0` to `XMM15`. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Xmm(pub u8);

impl RegisterField for Xmm {
    fn mask(self) -> u64 {
        assert!(self.0 < 16);
        mask(self.0)
    }
}

//-----------------------------------------------------------------------------

/**
 * Represents the precision of a move.
 * For integer moves, P32 writes the bottom 32 bits of the destination and
 * zeroes the top 32 bits. For floating-point moves, P32 is single precision
 * and P64 is double precision.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Precision {
    P32 = 0,
    P64 = 1,
}

use Precision::*;

impl Precision {
    pub fn w_bit(self) -> u64 {
        (self as u64) << 3
    }

    /** The mandatory prefix that selects `MOVSS` or `MOVSD`. */
    pub fn sse_prefix(self) -> u8 {
        match self {
            P32 => 0xF3,
            P64 => 0xF2,
        }
    }
}

//-----------------------------------------------------------------------------

/**
 * An assembler, implementing a regular subset of x86_64.
 *
 * There is a `write_x()` method for each encoding pattern `x`. A typical
 * pattern is "ROOM" meaning a REX byte, two opcode bytes, and a ModR/M byte.
 * Opcodes are written as little-endian integers, so the REX byte is the
 * least significant byte. Mandatory prefixes go before the REX byte and are
 * written separately.
 *
 * Memory operands are `(base, displacement)` pairs.
 */
pub struct Assembler<B: Buffer> {
    /// The area we're filling with code.
    buffer: B,
}

impl<B: Buffer> Assembler<B> {
    /** Construct an Assembler that writes to `buffer` */
    pub fn new(buffer: B) -> Self {
        Assembler {buffer}
    }

    /** Recover the [`Buffer`]. */
    pub fn into_buffer(self) -> B {
        self.buffer
    }

    /** Get the assembly pointer. */
    pub fn get_pos(&self) -> usize {
        self.buffer.get_pos()
    }

    // Patterns and constants.

    /** Writes a 32-bit signed immediate constant. */
    pub fn write_imm32(&mut self, immediate: i32) {
        self.buffer.write(u64::from(immediate as u32), 4);
    }

    /** Writes a 64-bit signed immediate constant. */
    pub fn write_imm64(&mut self, immediate: i64) {
        self.buffer.write(immediate as u64, 8);
    }

    /** Writes an instruction with pattern "RO", and one register. */
    pub fn write_ro_1(&mut self, mut opcode: u64, prec: Precision, rd: Register) {
        opcode |= prec.w_bit();
        opcode |= 0x0701 & rd.mask();
        self.buffer.write(opcode, 2);
    }

    /** Writes an instruction with pattern "ROM" and one register. */
    pub fn write_rom_1(&mut self, mut opcode: u64, prec: Precision, rm: impl RegisterField) {
        opcode |= prec.w_bit();
        opcode |= 0x070001 & rm.mask();
        self.buffer.write(opcode, 3);
    }

    /** Writes an instruction with pattern "ROM" and two registers. */
    pub fn write_rom_2(&mut self, mut opcode: u64, prec: Precision, rm: impl RegisterField, reg: impl RegisterField) {
        opcode |= prec.w_bit();
        opcode |= 0x070001 & rm.mask();
        opcode |= 0x380004 & reg.mask();
        self.buffer.write(opcode, 3);
    }

    /** Writes an instruction with pattern "ROOM" and two registers. */
    pub fn write_room_2(&mut self, mut opcode: u64, prec: Precision, rm: impl RegisterField, reg: impl RegisterField) {
        opcode |= prec.w_bit();
        opcode |= 0x07000001 & rm.mask();
        opcode |= 0x38000004 & reg.mask();
        self.buffer.write(opcode, 4);
    }

    /**
     * If `rm` is `RSP` or `R12`, writes the byte `0x24`, otherwise does
     * nothing.
     *
     * This is necessary after a ModR/M byte if `rm` is used as a memory
     * operand, because the bit pattern 100 in the `rm` field indicates the
     * presence of a SIB byte. `0x24` is a SIB byte with 100 in the `index`
     * field, indicating no index, and 100 in the `base` field, matching `rm`.
     */
    pub fn write_sib_fix(&mut self, rm: Register) {
        if (rm as usize) & 7 == 4 {
            self.buffer.write_byte(0x24);
        }
    }

    /** Writes the SIB fix, if needed, and the displacement of `address`. */
    fn write_address(&mut self, address: (Register, i32)) {
        self.write_sib_fix(address.0);
        self.write_imm32(address.1);
    }

    // Integer moves.

    /** Move register to register. */
    pub fn move_(&mut self, prec: Precision, dest: Register, src: Register) {
        self.write_rom_2(0xC08B40, prec, src, dest);
    }

    /** Move memory to register. */
    pub fn load(&mut self, prec: Precision, dest: Register, src: (Register, i32)) {
        self.write_rom_2(0x808B40, prec, src.0, dest);
        self.write_address(src);
    }

    /** Move register to memory. */
    pub fn store(&mut self, prec: Precision, dest: (Register, i32), src: Register) {
        self.write_rom_2(0x808940, prec, dest.0, src);
        self.write_address(dest);
    }

    // Floating-point moves.

    /** `MOVSS` or `MOVSD` register to register. */
    pub fn float_move(&mut self, prec: Precision, dest: Xmm, src: Xmm) {
        self.buffer.write_byte(prec.sse_prefix());
        self.write_room_2(0xC0100F40, P32, src, dest);
    }

    /** `MOVSS` or `MOVSD` memory to register. */
    pub fn float_load(&mut self, prec: Precision, dest: Xmm, src: (Register, i32)) {
        self.buffer.write_byte(prec.sse_prefix());
        self.write_room_2(0x80100F40, P32, src.0, dest);
        self.write_address(src);
    }

    /** `MOVSS` or `MOVSD` register to memory. */
    pub fn float_store(&mut self, prec: Precision, dest: (Register, i32), src: Xmm) {
        self.buffer.write_byte(prec.sse_prefix());
        self.write_room_2(0x80110F40, P32, dest.0, src);
        self.write_address(dest);
    }

    /** `MOVD` or `MOVQ` general-purpose register to SSE register. */
    pub fn move_to_float(&mut self, prec: Precision, dest: Xmm, src: Register) {
        self.buffer.write_byte(0x66);
        self.write_room_2(0xC06E0F40, prec, src, dest);
    }

    /** `MOVD` or `MOVQ` SSE register to general-purpose register. */
    pub fn move_from_float(&mut self, prec: Precision, dest: Register, src: Xmm) {
        self.buffer.write_byte(0x66);
        self.write_room_2(0xC07E0F40, prec, dest, src);
    }

    /**
     * Move constant to register, using the shortest of the three encodings
     * and leaving the status flags alone.
     */
    pub fn const_(&mut self, dest: Register, imm: i64) {
        if i64::from(imm as u32) == imm {
            self.write_ro_1(0xB840, P32, dest);
            self.write_imm32(imm as i32);
        } else if i64::from(imm as i32) == imm {
            self.write_rom_1(0xC0C740, P64, dest);
            self.write_imm32(imm as i32);
        } else {
            self.write_ro_1(0xB840, P64, dest);
            self.write_imm64(imm);
        }
    }

    // Control flow.

    /** Unconditional jump to a register. */
    pub fn jump(&mut self, target: Register) {
        self.write_rom_1(0xE0FF40, P32, target);
    }

    /** Unconditional jump to the address stored in memory. */
    pub fn jump_indirect(&mut self, target: (Register, i32)) {
        self.write_rom_1(0xA0FF40, P32, target.0);
        self.write_address(target);
    }
}

//-----------------------------------------------------------------------------
