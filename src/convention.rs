//! Argument layouts: where each argument of a call lives under a register
//! calling convention. This is the argument-layout descriptor consumed by the
//! plan builder.

use crate::error::{LayoutError};
use crate::shuffle::{Location, OFSMASK};

/// The register bank an eightbyte of an argument is passed in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ValueClass {
    Integer,
    Float,
}

/// The type of one argument, as far as the calling convention cares.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgType {
    /// A pointer-width integer, native int or object reference.
    Word,
    /// An integer of 1, 2 or 4 bytes. It occupies a whole slot.
    SubWord(u8),
    F32,
    F64,
    /// A value type passed by value. `classes` has one entry per eightbyte.
    Aggregate {size: u16, classes: Box<[ValueClass]>},
}

impl ArgType {
    pub fn aggregate(size: u16, classes: &[ValueClass]) -> Self {
        ArgType::Aggregate {size, classes: classes.into()}
    }

    fn validate(&self, index: usize) -> Result<(), LayoutError> {
        match self {
            ArgType::SubWord(size) if ![1, 2, 4].contains(size) => {
                Err(LayoutError::SubWordSize {index, size: *size})
            },
            ArgType::Aggregate {size: 0, ..} => Err(LayoutError::EmptyAggregate {index}),
            ArgType::Aggregate {size, classes} => {
                let expected = (*size as usize + 7) / 8;
                if classes.len() != expected {
                    return Err(LayoutError::AggregateClasses {
                        index, size: *size, expected, actual: classes.len(),
                    });
                }
                Ok(())
            },
            _ => Ok(()),
        }
    }

    /**
     * Returns the bank and precision of each eightbyte. A floating-point
     * eightbyte is single precision if it holds at most four bytes.
     */
    pub fn eightbytes(&self) -> Vec<(ValueClass, bool)> {
        match self {
            ArgType::Word | ArgType::SubWord(_) => vec![(ValueClass::Integer, false)],
            ArgType::F32 => vec![(ValueClass::Float, true)],
            ArgType::F64 => vec![(ValueClass::Float, false)],
            ArgType::Aggregate {size, classes} => classes.iter().enumerate().map(|(i, &class)| {
                let remaining = *size as usize - 8 * i;
                (class, class == ValueClass::Float && remaining <= 4)
            }).collect(),
        }
    }
}

//-----------------------------------------------------------------------------

/// Why an argument is present.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArgRole {
    /// The implicit `this`.
    Receiver,
    /// The hidden pointer to caller-allocated return storage.
    ReturnBuffer,
    /// The hidden instantiation argument of shared generic code.
    GenericContext,
    /// A declared parameter, numbered from zero.
    Param(usize),
}

/// The argument list of a method, including hidden arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    pub receiver: bool,
    pub return_buffer: bool,
    pub generic_context: bool,
    pub params: Vec<ArgType>,
}

impl Signature {
    pub fn new(params: impl Into<Vec<ArgType>>) -> Self {
        Signature {params: params.into(), ..Default::default()}
    }

    pub fn with_receiver(mut self) -> Self { self.receiver = true; self }

    pub fn with_return_buffer(mut self) -> Self { self.return_buffer = true; self }

    pub fn with_generic_context(mut self) -> Self { self.generic_context = true; self }

    /**
     * All arguments in the order they are assigned locations: receiver,
     * return buffer, generic context, then the declared parameters.
     */
    pub fn args(&self) -> Vec<(ArgRole, ArgType)> {
        let mut ret = Vec::with_capacity(self.params.len() + 3);
        if self.receiver { ret.push((ArgRole::Receiver, ArgType::Word)); }
        if self.return_buffer { ret.push((ArgRole::ReturnBuffer, ArgType::Word)); }
        if self.generic_context { ret.push((ArgRole::GenericContext, ArgType::Word)); }
        ret.extend(self.params.iter().cloned().enumerate().map(|(i, ty)| (ArgRole::Param(i), ty)));
        ret
    }
}

//-----------------------------------------------------------------------------

/// The register resources of a calling convention.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Convention {
    /// The number of general-purpose argument registers.
    pub gp_registers: u16,
    /// The number of floating-point argument registers.
    pub fp_registers: u16,
    /// The size in bytes of one stack argument slot.
    pub slot_size: u16,
    /// Larger aggregates are always passed on the stack.
    pub max_register_aggregate: u16,
}

impl Convention {
    /// The System V AMD64 convention.
    pub const SYSV_X86_64: Convention = Convention {
        gp_registers: 6,
        fp_registers: 8,
        slot_size: 8,
        max_register_aggregate: 16,
    };
}

impl Default for Convention {
    fn default() -> Self { Convention::SYSV_X86_64 }
}

/// The locations of one argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgPlacement {
    pub role: ArgRole,
    pub ty: ArgType,
    /// One [`Location`] per eightbyte, in order.
    pub chunks: Vec<Location>,
}

/// The locations of all arguments of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    args: Vec<ArgPlacement>,
    stack_size: u16,
}

impl Layout {
    /** Wraps a layout computed elsewhere. */
    pub fn new(args: Vec<ArgPlacement>, stack_size: u16) -> Self {
        Layout {args, stack_size}
    }

    /**
     * Assigns locations to the arguments of `signature` under `convention`.
     *
     * Each eightbyte takes the next register of its bank. An aggregate goes
     * in registers only if all of its eightbytes fit; otherwise, or if it is
     * larger than `max_register_aggregate`, all of it goes on the stack.
     */
    pub fn compute(signature: &Signature, convention: &Convention) -> Result<Self, LayoutError> {
        let mut gp: u16 = 0;
        let mut fp: u16 = 0;
        let mut stack: u32 = 0;
        let mut args = Vec::new();
        for (index, (role, ty)) in signature.args().into_iter().enumerate() {
            ty.validate(index)?;
            let parts = ty.eightbytes();
            let need_gp = parts.iter().filter(|&&(c, _)| c == ValueClass::Integer).count() as u16;
            let need_fp = parts.len() as u16 - need_gp;
            let in_memory = matches!(ty, ArgType::Aggregate {size, ..} if size > convention.max_register_aggregate);
            let fits = gp + need_gp <= convention.gp_registers && fp + need_fp <= convention.fp_registers;
            let mut chunks = Vec::with_capacity(parts.len());
            if fits && !in_memory {
                for (class, single) in parts {
                    chunks.push(match class {
                        ValueClass::Integer => { gp += 1; Location::Register(gp - 1) },
                        ValueClass::Float => { fp += 1; Location::FloatRegister {index: fp - 1, single} },
                    });
                }
            } else {
                for _ in parts {
                    let next = stack + u32::from(convention.slot_size);
                    if next > u32::from(OFSMASK) + 1 {
                        return Err(LayoutError::StackOverflow(next));
                    }
                    chunks.push(Location::Stack(stack as u16));
                    stack = next;
                }
            }
            args.push(ArgPlacement {role, ty, chunks});
        }
        Ok(Layout {args, stack_size: stack as u16})
    }

    pub fn args(&self) -> &[ArgPlacement] { &self.args }

    /** The number of bytes of stack arguments. */
    pub fn stack_size(&self) -> u16 { self.stack_size }

    /** The placement of the hidden argument or parameter `role`, if any. */
    pub fn find(&self, role: ArgRole) -> Option<&ArgPlacement> {
        self.args.iter().find(|a| a.role == role)
    }
}

//-----------------------------------------------------------------------------
