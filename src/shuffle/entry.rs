use std::fmt::{self, Debug, Formatter};

use crate::error::{EncodeError};

/// Register offset bit.
pub const REGMASK: u16 = 0x8000;
/// Floating point register bit.
pub const FPREGMASK: u16 = 0x4000;
/// Single precision floating point register bit.
pub const FPSINGLEMASK: u16 = 0x2000;
/// Mask to get a stack offset.
pub const OFSMASK: u16 = 0x7fff;
/// Mask to get a register index.
pub const OFSREGMASK: u16 = 0x1fff;
/// Indicates the end of a shuffle array.
pub const SENTINEL: u16 = 0xffff;
/// The helper register, used to break cycles.
pub const HELPERREG: u16 = 0xcfff;

/**
 * One packed relocation record. There are no padding bits, so two arrays
 * describing the same plan are byte-identical.
 *
 * The second field is overloaded: it is the destination when `srcofs` is a
 * location, and the two's complement stack size delta when `srcofs` is
 * [`SENTINEL`].
 */
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ShuffleEntry {
    pub srcofs: u16,
    pub dstofs: u16,
}

/** The size in bytes of a serialized [`ShuffleEntry`]. */
pub const ENTRY_SIZE: usize = std::mem::size_of::<ShuffleEntry>();

impl ShuffleEntry {
    /** A record that moves `src` to `dest`. */
    pub fn new(src: Location, dest: Location) -> Result<Self, EncodeError> {
        Ok(ShuffleEntry {srcofs: src.encode()?, dstofs: dest.encode()?})
    }

    /** The terminal record, carrying `stack_size_delta`. */
    pub fn sentinel(stack_size_delta: i16) -> Self {
        ShuffleEntry {srcofs: SENTINEL, dstofs: stack_size_delta as u16}
    }

    pub fn is_sentinel(self) -> bool { self.srcofs == SENTINEL }

    /** The stack size delta, if `self` is the terminal record. */
    pub fn stack_size_delta(self) -> Option<i16> {
        if self.is_sentinel() { Some(self.dstofs as i16) } else { None }
    }

    pub fn to_bytes(self) -> [u8; ENTRY_SIZE] {
        let [s0, s1] = self.srcofs.to_le_bytes();
        let [d0, d1] = self.dstofs.to_le_bytes();
        [s0, s1, d0, d1]
    }

    pub fn from_bytes(bytes: [u8; ENTRY_SIZE]) -> Self {
        ShuffleEntry {
            srcofs: u16::from_le_bytes([bytes[0], bytes[1]]),
            dstofs: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

impl Debug for ShuffleEntry {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        if let Some(delta) = self.stack_size_delta() {
            return write!(f, "Sentinel(delta={})", delta);
        }
        match (Location::decode(self.srcofs), Location::decode(self.dstofs)) {
            (Some(src), Some(dest)) => write!(f, "{:?} -> {:?}", src, dest),
            _ => write!(f, "{:#06x} -> {:#06x}", self.srcofs, self.dstofs),
        }
    }
}

//-----------------------------------------------------------------------------

/**
 * A decoded argument location. Register indices count argument registers of
 * one bank, starting from the first argument register; they are not hardware
 * register numbers.
 */
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// A byte offset into the outgoing argument stack area.
    Stack(u16),
    /// A general-purpose argument register.
    Register(u16),
    /// A floating-point argument register.
    FloatRegister {index: u16, single: bool},
    /// The scratch register used to break cycles.
    Helper,
}

impl Location {
    pub fn encode(self) -> Result<u16, EncodeError> {
        match self {
            Location::Stack(offset) => {
                if offset > OFSMASK { return Err(EncodeError::StackOffset(offset.into())); }
                Ok(offset)
            },
            Location::Register(index) => {
                if index > OFSREGMASK { return Err(EncodeError::RegisterIndex(index)); }
                Ok(REGMASK | index)
            },
            Location::FloatRegister {index, single} => {
                // Index `0xfff` would alias `HELPERREG`.
                if index >= HELPERREG & OFSREGMASK {
                    return Err(EncodeError::FloatRegisterIndex(index));
                }
                let precision = if single { FPSINGLEMASK } else { 0 };
                Ok(REGMASK | FPREGMASK | precision | index)
            },
            Location::Helper => Ok(HELPERREG),
        }
    }

    /** Inverse of `encode()`. Returns `None` for `SENTINEL` and invalid bits. */
    pub fn decode(bits: u16) -> Option<Self> {
        if bits == SENTINEL { return None; }
        if bits == HELPERREG { return Some(Location::Helper); }
        if bits & REGMASK == 0 { return Some(Location::Stack(bits & OFSMASK)); }
        let index = bits & OFSREGMASK;
        if bits & FPREGMASK != 0 {
            if index >= HELPERREG & OFSREGMASK { return None; }
            Some(Location::FloatRegister {index, single: bits & FPSINGLEMASK != 0})
        } else if bits & FPSINGLEMASK != 0 {
            None
        } else {
            Some(Location::Register(index))
        }
    }

    /**
     * The storage that `self` names, without the single-precision tag. Two
     * `Location`s alias iff their slots are equal.
     */
    pub fn slot(self) -> Self {
        match self {
            Location::FloatRegister {index, ..} => Location::FloatRegister {index, single: false},
            other => other,
        }
    }

    pub fn is_register(self) -> bool {
        matches!(self, Location::Register(_) | Location::FloatRegister {..} | Location::Helper)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Location::FloatRegister {..})
    }
}

impl Debug for Location {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        match *self {
            Location::Stack(offset) => write!(f, "Stack({:#x})", offset),
            Location::Register(index) => write!(f, "Reg({})", index),
            Location::FloatRegister {index, single: false} => write!(f, "FpReg({})", index),
            Location::FloatRegister {index, single: true} => write!(f, "FpReg({}, single)", index),
            Location::Helper => f.write_str("Helper"),
        }
    }
}

//-----------------------------------------------------------------------------
