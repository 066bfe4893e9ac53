use tracing::{trace};

use crate::buffer::{Buffer, VecU8, CodeHeap};
use crate::cache::{EmitAdapter, EntryPoint};
use crate::error::{EmitError};
use crate::shuffle::{ShuffleArray, Location};
use super::{
    Assembler, Register, Xmm, Precision,
    ARGUMENTS, FLOAT_ARGUMENTS, DISPATCH, HELPER, SCRATCH, STACK_ARGUMENTS,
};
use Precision::*;
use Register::*;

/** Where a [`Location`] lives inside an adapter. */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Operand {
    Gp(Register),
    Fp(Xmm, Precision),
    /// A displacement from `RSP`.
    Memory(i32),
}

fn operand(location: Location) -> Result<Operand, EmitError> {
    Ok(match location {
        Location::Stack(offset) => Operand::Memory(STACK_ARGUMENTS + i32::from(offset)),
        Location::Register(index) => {
            let r = ARGUMENTS.get(usize::from(index)).ok_or_else(|| {
                EmitError::Encoding(format!("no integer argument register {}", index))
            })?;
            Operand::Gp(*r)
        },
        Location::FloatRegister {index, single} => {
            let x = FLOAT_ARGUMENTS.get(usize::from(index)).ok_or_else(|| {
                EmitError::Encoding(format!("no floating-point argument register {}", index))
            })?;
            Operand::Fp(*x, if single { P32 } else { P64 })
        },
        Location::Helper => Operand::Gp(HELPER),
    })
}

/** Assembles one move. */
fn move_<B: Buffer>(a: &mut Assembler<B>, dest: Operand, src: Operand) {
    use Operand::*;
    match (dest, src) {
        (Gp(d), Gp(s)) => a.move_(P64, d, s),
        (Gp(d), Memory(s)) => a.load(P64, d, (RSP, s)),
        (Gp(d), Fp(s, prec)) => a.move_from_float(prec, d, s),
        (Memory(d), Gp(s)) => a.store(P64, (RSP, d), s),
        (Memory(d), Memory(s)) => {
            a.load(P64, SCRATCH, (RSP, s));
            a.store(P64, (RSP, d), SCRATCH);
        },
        (Memory(d), Fp(s, prec)) => a.float_store(prec, (RSP, d), s),
        (Fp(d, prec), Gp(s)) => a.move_to_float(prec, d, s),
        (Fp(d, prec), Memory(s)) => a.float_load(prec, d, (RSP, s)),
        (Fp(d, dp), Fp(s, sp)) => {
            let prec = if dp == P32 && sp == P32 { P32 } else { P64 };
            a.float_move(prec, d, s);
        },
    }
}

//-----------------------------------------------------------------------------

/**
 * Compiles [`ShuffleArray`]s into x86_64 adapters.
 *
 * On entry to an adapter, `R10` holds the dispatch cell. `R10` is the static
 * chain register, so it never carries an argument and the same code serves
 * every [`Adaptation`](crate::builder::Adaptation). The adapter performs the
 * moves and then jumps to the code pointer at `dispatch_offset` in the
 * dispatch cell. The return address stays on the stack, so the target returns
 * directly to the original caller, which also pops the stack arguments.
 *
 * Hidden arguments that the destination has and the source lacks are not
 * written by the adapter. The code that loads `R10` is responsible for them.
 */
#[derive(Debug)]
pub struct ShuffleEmitter {
    dispatch_offset: i32,
    heap: CodeHeap,
}

impl ShuffleEmitter {
    pub fn new(dispatch_offset: i32) -> Self {
        ShuffleEmitter {dispatch_offset, heap: CodeHeap::new()}
    }

    pub fn heap(&self) -> &CodeHeap { &self.heap }

    /** Assembles the adapter for `shuffle`, without installing it. */
    pub fn assemble(&self, shuffle: &ShuffleArray) -> Result<Vec<u8>, EmitError> {
        let delta = shuffle.stack_size_delta();
        if delta < 0 {
            return Err(EmitError::Encoding(format!(
                "a tail-calling adapter cannot grow the argument area by {} bytes", -i32::from(delta),
            )));
        }
        // The longest move is two instructions of 8 bytes.
        let mut a = Assembler::new(VecU8::new(vec![0u8; 16 * (shuffle.len() + 1)]));
        for m in shuffle.moves() {
            move_(&mut a, operand(m.dest)?, operand(m.src)?);
        }
        a.jump_indirect((DISPATCH, self.dispatch_offset));
        Ok(a.into_buffer().into_code())
    }

    /**
     * Assembles an entry point that loads `cell` into `R10` and jumps to
     * `adapter`. Arguments pass through untouched.
     */
    pub fn assemble_entry(&self, cell: usize, adapter: EntryPoint) -> Vec<u8> {
        let mut a = Assembler::new(VecU8::new(vec![0u8; 32]));
        a.const_(DISPATCH, cell as i64);
        a.const_(HELPER, adapter.0 as i64);
        a.jump(HELPER);
        a.into_buffer().into_code()
    }

    /** Installs the code made by [`Self::assemble_entry()`]. */
    pub fn emit_entry(&self, cell: usize, adapter: EntryPoint) -> Result<EntryPoint, EmitError> {
        let code = self.assemble_entry(cell, adapter);
        let entry_point = self.heap.install(&code)?;
        trace!(?entry_point, cell, ?adapter, "installed entry");
        Ok(entry_point)
    }
}

impl EmitAdapter for ShuffleEmitter {
    fn emit_adapter(&self, shuffle: &ShuffleArray) -> Result<EntryPoint, EmitError> {
        let code = self.assemble(shuffle)?;
        let entry_point = self.heap.install(&code)?;
        trace!(?entry_point, bytes = code.len(), "installed adapter");
        Ok(entry_point)
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::assembler::tests::{format};
    use crate::builder::{build_shuffle_array, Adaptation};
    use crate::convention::{ArgType, Signature, Layout, Convention};
    use crate::shuffle::{Move};
    use Location::*;

    fn open_static_words(n: usize) -> ShuffleArray {
        let conv = Convention::SYSV_X86_64;
        let source = Layout::compute(&Signature::new(vec![ArgType::Word; n]).with_receiver(), &conv).unwrap();
        let dest = Layout::compute(&Signature::new(vec![ArgType::Word; n]), &conv).unwrap();
        build_shuffle_array(&source, &dest, Adaptation::RemoveReceiver).unwrap()
    }

    fn float_swaps() -> ShuffleArray {
        let d = |index| FloatRegister {index, single: false};
        let s = |index| FloatRegister {index, single: true};
        ShuffleArray::new([
            Move {src: d(0), dest: Helper},
            Move {src: d(1), dest: d(0)},
            Move {src: Helper, dest: d(1)},
            Move {src: s(2), dest: Helper},
            Move {src: s(3), dest: s(2)},
            Move {src: Helper, dest: s(3)},
        ], 0).unwrap()
    }

    #[test]
    fn shift_down() {
        let code = ShuffleEmitter::new(8).assemble(&open_static_words(8)).unwrap();
        let observed = format(&code);
        assert_eq!(&observed[..10], [
            "mov rdi,rsi",
            "mov rsi,rdx",
            "mov rdx,rcx",
            "mov rcx,r8",
            "mov r8,r9",
            "mov r9,[rsp+8]",
            "mov rax,[rsp+10h]",
            "mov [rsp+8],rax",
            "mov rax,[rsp+18h]",
            "mov [rsp+10h],rax",
        ]);
        assert_eq!(observed.len(), 11);
        assert!(observed[10].starts_with("jmp") && observed[10].contains("[r10+8]"), "{:?}", observed);
    }

    #[test]
    fn inserted_receiver_does_not_touch_dispatch() {
        let conv = Convention::SYSV_X86_64;
        let source = Layout::compute(&Signature::new([ArgType::Word]), &conv).unwrap();
        let dest = Layout::compute(&Signature::new([ArgType::Word]).with_receiver(), &conv).unwrap();
        let shuffle = build_shuffle_array(&source, &dest, Adaptation::InsertReceiver).unwrap();
        let observed = format(&ShuffleEmitter::new(8).assemble(&shuffle).unwrap());
        assert_eq!(observed.len(), 2);
        assert_eq!(observed[0], "mov rsi,rdi");
        assert!(observed[1].starts_with("jmp") && observed[1].contains("[r10+8]"), "{:?}", observed);
    }

    #[test]
    fn float_moves() {
        let code = ShuffleEmitter::new(8).assemble(&float_swaps()).unwrap();
        let observed = format(&code);
        assert_eq!(observed.len(), 7);
        assert_eq!(observed[0], "movq r11,xmm0");
        assert!(observed[1].starts_with("movsd") && observed[1].ends_with("xmm0,xmm1"), "{:?}", observed);
        assert_eq!(observed[2], "movq xmm1,r11");
        assert_eq!(observed[3], "movd r11d,xmm2");
        assert!(observed[4].starts_with("movss") && observed[4].ends_with("xmm2,xmm3"), "{:?}", observed);
        assert_eq!(observed[5], "movd xmm3,r11d");
    }

    #[test]
    fn float_stack() {
        let shuffle = ShuffleArray::new([
            Move {src: Stack(0), dest: FloatRegister {index: 2, single: false}},
            Move {src: FloatRegister {index: 3, single: true}, dest: Stack(8)},
        ], 0).unwrap();
        let observed = format(&ShuffleEmitter::new(8).assemble(&shuffle).unwrap());
        assert!(observed[0].starts_with("movsd xmm2,") && observed[0].contains("[rsp+8]"), "{:?}", observed);
        assert!(observed[1].starts_with("movss ") && observed[1].contains("[rsp+10h]"), "{:?}", observed);
    }

    #[test]
    fn pass_through() {
        let observed = format(&ShuffleEmitter::new(0x20).assemble(&ShuffleArray::pass_through(0)).unwrap());
        assert_eq!(observed.len(), 1);
        assert!(observed[0].starts_with("jmp") && observed[0].contains("[r10+20h]"), "{:?}", observed);
    }

    #[test]
    fn entry() {
        let emitter = ShuffleEmitter::new(8);
        let observed = format(&emitter.assemble_entry(0x1234_5678_9ABC, EntryPoint(0x7FFF_0000_1000)));
        assert_eq!(observed, [
            "mov r10,123456789ABCh",
            "mov r11,7FFF00001000h",
            "jmp r11",
        ]);
        let observed = format(&emitter.assemble_entry(0x1000, EntryPoint(0x2000)));
        assert_eq!(observed, ["mov r10d,1000h", "mov r11d,2000h", "jmp r11"]);
    }

    #[test]
    fn rejected() {
        let emitter = ShuffleEmitter::new(8);
        assert!(matches!(emitter.assemble(&ShuffleArray::pass_through(-8)), Err(EmitError::Encoding(_))));
        let shuffle = ShuffleArray::new([Move {src: Register(6), dest: Register(0)}], 0).unwrap();
        assert!(matches!(emitter.assemble(&shuffle), Err(EmitError::Encoding(_))));
        let shuffle = ShuffleArray::new([Move {src: FloatRegister {index: 8, single: false}, dest: Stack(0)}], 0).unwrap();
        assert!(matches!(emitter.assemble(&shuffle), Err(EmitError::Encoding(_))));
        assert!(emitter.heap().is_empty());
    }

    #[cfg(target_arch = "x86_64")]
    mod execute {
        use super::*;
        use memoffset::{offset_of};

        /** A delegate object: a header word followed by the target code pointer. */
        #[repr(C)]
        struct Cell {
            header: usize,
            target: usize,
        }

        /**
         * Compiles `shuffle` and an entry point that dispatches through
         * `cell`. The code is unmapped when the returned emitter is dropped.
         */
        fn compile(shuffle: &ShuffleArray, cell: &Cell) -> (ShuffleEmitter, EntryPoint) {
            let emitter = ShuffleEmitter::new(offset_of!(Cell, target) as i32);
            let adapter = emitter.emit_adapter(shuffle).unwrap();
            let entry = emitter.emit_entry(cell as *const Cell as usize, adapter).unwrap();
            assert_eq!(emitter.heap().len(), 2);
            (emitter, entry)
        }

        extern "sysv64" fn digits(a: i64, b: i64, c: i64, d: i64, e: i64, f: i64, g: i64, h: i64) -> i64 {
            a + 10 * b + 100 * c + 1000 * d + 10000 * e + 100000 * f + 1000000 * g + 10000000 * h
        }

        extern "sysv64" fn mix(a: f64, b: f64, c: f32, d: f32) -> f64 {
            a - 2.0 * b + 100.0 * f64::from(c - 2.0 * d)
        }

        extern "sysv64" fn scale(_this: usize, a: i64, b: f64, c: i64) -> f64 {
            a as f64 * b + c as f64
        }

        #[test]
        fn open_static() {
            let cell = Cell {header: 0xdead, target: digits as *const () as usize};
            let (_emitter, entry) = compile(&open_static_words(8), &cell);
            type Invoke = extern "sysv64" fn(*const Cell, i64, i64, i64, i64, i64, i64, i64, i64) -> i64;
            let invoke: Invoke = unsafe { std::mem::transmute(entry.as_ptr()) };
            assert_eq!(invoke(&cell, 1, 2, 3, 4, 5, 6, 7, 8), 87654321);
            assert_eq!(invoke(&cell, 0, 0, 0, 0, 0, 0, 0, 9), 90000000);
            assert_eq!(cell.header, 0xdead);
        }

        #[test]
        fn swap_floats() {
            let cell = Cell {header: 0, target: mix as *const () as usize};
            let (_emitter, entry) = compile(&float_swaps(), &cell);
            type Invoke = extern "sysv64" fn(f64, f64, f32, f32) -> f64;
            let invoke: Invoke = unsafe { std::mem::transmute(entry.as_ptr()) };
            // Calls `mix(10.0, 1.0, 5.0, 3.0)`.
            assert_eq!(invoke(1.0, 10.0, 3.0, 5.0), -92.0);
        }

        #[test]
        fn insert_receiver() {
            let conv = Convention::SYSV_X86_64;
            let params = [ArgType::Word, ArgType::F64, ArgType::Word];
            let source = Layout::compute(&Signature::new(params.clone()), &conv).unwrap();
            let dest = Layout::compute(&Signature::new(params).with_receiver(), &conv).unwrap();
            let shuffle = build_shuffle_array(&source, &dest, Adaptation::InsertReceiver).unwrap();
            let cell = Cell {header: 0, target: scale as *const () as usize};
            let (_emitter, entry) = compile(&shuffle, &cell);
            type Invoke = extern "sysv64" fn(i64, f64, i64) -> f64;
            let invoke: Invoke = unsafe { std::mem::transmute(entry.as_ptr()) };
            assert_eq!(invoke(5, 0.5, 3), 5.5);
            assert_eq!(invoke(-4, 2.0, 1), -7.0);
        }
    }
}
