//! The fixed enumeration of instruction opcodes.
//!
//! Numbering is part of the wire format: once assigned, a discriminant must
//! never be reused for a different opcode, since loaders hand the VM raw
//! bytecode produced by an out-of-tree compiler.

use core::convert::TryFrom;

/// Instruction shape, i.e. how the three operand bytes following the opcode
/// byte are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// `op A B C`: three independent 8-bit operands.
    Abc,
    /// `op A Bx`: an 8-bit register plus a 16-bit little-endian immediate.
    Abx,
    /// `op Ax`: a single 24-bit little-endian immediate.
    Ax,
    /// `op A`: a single 8-bit register, B and C unused.
    A,
    /// `op`: no operands.
    None,
}

macro_rules! opcodes {
    ($($variant:ident = $disc:literal, $shape:ident;)*) => {
        /// A single bytecode opcode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                #[doc = concat!("`", stringify!($variant), "`")]
                $variant = $disc,
            )*
        }

        impl Opcode {
            /// The instruction shape this opcode is encoded with.
            #[must_use]
            pub const fn shape(self) -> Shape {
                match self {
                    $(Self::$variant => Shape::$shape,)*
                }
            }
        }

        impl TryFrom<u8> for Opcode {
            type Error = u8;

            fn try_from(byte: u8) -> Result<Self, Self::Error> {
                match byte {
                    $($disc => Ok(Self::$variant),)*
                    other => Err(other),
                }
            }
        }
    };
}

opcodes! {
    Goto = 0x00, Ax;
    Not = 0x01, Abc;
    Inc = 0x02, Abc;
    Dec = 0x03, Abc;
    Add = 0x04, Abc;
    Sub = 0x05, Abc;
    Mul = 0x06, Abc;
    Div = 0x07, Abc;
    Mod = 0x08, Abc;
    Pow = 0x09, Abc;
    Gt = 0x0a, Abc;
    Ge = 0x0b, Abc;
    Lt = 0x0c, Abc;
    Le = 0x0d, Abc;
    Eq = 0x0e, Abc;
    Ne = 0x0f, Abc;
    MoveS = 0x10, Abx;
    MoveI = 0x11, Abx;
    MoveF = 0x12, Abx;
    MoveN = 0x13, A;
    Move = 0x14, Abc;
    Load = 0x15, Abc;
    Store = 0x16, Abc;
    LoadGlobal = 0x17, Abx;
    StoreGlobal = 0x18, Abx;
    LoadCaptured = 0x19, Abx;
    StoreCaptured = 0x1a, Abx;
    Index = 0x1b, Abc;
    SetIndex = 0x1c, Abc;
    If = 0x1d, Abx;
    Beq = 0x1e, Abc;
    Bne = 0x1f, Abc;
    Bgt = 0x20, Abc;
    Blt = 0x21, Abc;
    Bge = 0x22, Abc;
    Ble = 0x23, Abc;
    Bz = 0x24, Abc;
    Bnz = 0x25, Abc;
    Push = 0x26, Abc;
    PushN = 0x27, Abc;
    Pop = 0x28, Abc;
    Call = 0x29, Abc;
    TailCall = 0x2a, Abc;
    Return = 0x2b, Abc;
    ReturnVoid = 0x2c, A;
    NewHash = 0x2d, A;
    NewArray = 0x2e, A;
    NewClosure = 0x2f, Abx;
    NewUserClosure = 0x30, Abx;
    Halt = 0x31, None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_opcode_round_trips_through_its_discriminant() {
        for op in Opcode::iter() {
            let byte = op as u8;
            assert_eq!(Opcode::try_from(byte), Ok(op));
        }
    }

    #[test]
    fn unassigned_bytes_are_rejected() {
        assert_eq!(Opcode::try_from(0xff), Err(0xff));
    }
}
