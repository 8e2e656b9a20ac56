//! The fixed 4-byte instruction encoding.
//!
//! Every instruction is exactly [`Instruction::LEN`] bytes, stored
//! little-endian on the wire for the multi-byte immediate forms. The decoder
//! never needs to look beyond the opcode byte to know how many of the
//! remaining three bytes to interpret as registers versus an immediate.

use crate::opcode::{Opcode, Shape};
use core::convert::TryFrom;

/// A decoded instruction, tagged with the fields its [`Shape`] actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// `op A B C`
    Abc { op: Opcode, a: u8, b: u8, c: u8 },
    /// `op A Bx`
    Abx { op: Opcode, a: u8, bx: u16 },
    /// `op Ax` (24-bit signed)
    Ax { op: Opcode, ax: i32 },
    /// `op A`
    A { op: Opcode, a: u8 },
    /// `op`
    None { op: Opcode },
}

/// An instruction byte that does not correspond to a known [`Opcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IllegalOpcode(pub u8);

impl Instruction {
    /// Size of an instruction in bytes.
    pub const LEN: usize = 4;

    /// Decode a 4-byte little-endian-immediate instruction word.
    pub fn decode(bytes: [u8; 4]) -> Result<Self, IllegalOpcode> {
        let op = Opcode::try_from(bytes[0]).map_err(IllegalOpcode)?;
        Ok(match op.shape() {
            Shape::Abc => Self::Abc {
                op,
                a: bytes[1],
                b: bytes[2],
                c: bytes[3],
            },
            Shape::Abx => Self::Abx {
                op,
                a: bytes[1],
                bx: u16::from_le_bytes([bytes[2], bytes[3]]),
            },
            Shape::Ax => {
                let raw = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], 0]);
                Self::Ax {
                    op,
                    ax: sign_extend_24(raw),
                }
            }
            Shape::A => Self::A { op, a: bytes[1] },
            Shape::None => Self::None { op },
        })
    }

    /// Encode this instruction back to its 4-byte wire form.
    #[must_use]
    pub fn encode(self) -> [u8; 4] {
        match self {
            Self::Abc { op, a, b, c } => [op as u8, a, b, c],
            Self::Abx { op, a, bx } => {
                let [lo, hi] = bx.to_le_bytes();
                [op as u8, a, lo, hi]
            }
            Self::Ax { op, ax } => {
                let raw = (ax as u32) & 0x00ff_ffff;
                let bytes = raw.to_le_bytes();
                [op as u8, bytes[0], bytes[1], bytes[2]]
            }
            Self::A { op, a } => [op as u8, a, 0, 0],
            Self::None { op } => [op as u8, 0, 0, 0],
        }
    }

    /// The decoded opcode, regardless of shape.
    #[must_use]
    pub const fn opcode(self) -> Opcode {
        match self {
            Self::Abc { op, .. }
            | Self::Abx { op, .. }
            | Self::Ax { op, .. }
            | Self::A { op, .. }
            | Self::None { op } => op,
        }
    }
}

/// Sign-extend a 24-bit value (stored in the low 3 bytes of a `u32`) to `i32`.
const fn sign_extend_24(raw: u32) -> i32 {
    let shifted = (raw << 8) as i32;
    shifted >> 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abc_round_trips() {
        let ins = Instruction::Abc {
            op: Opcode::Add,
            a: 1,
            b: 2,
            c: 3,
        };
        assert_eq!(Instruction::decode(ins.encode()).unwrap(), ins);
    }

    #[test]
    fn abx_uses_little_endian_immediate() {
        let bytes = [Opcode::MoveI as u8, 5, 0x34, 0x12];
        let ins = Instruction::decode(bytes).unwrap();
        assert_eq!(
            ins,
            Instruction::Abx {
                op: Opcode::MoveI,
                a: 5,
                bx: 0x1234
            }
        );
    }

    #[test]
    fn ax_sign_extends_negative_offsets() {
        let bytes = [Opcode::Goto as u8, 0xff, 0xff, 0xff];
        let ins = Instruction::decode(bytes).unwrap();
        assert_eq!(
            ins,
            Instruction::Ax {
                op: Opcode::Goto,
                ax: -1
            }
        );
    }

    #[test]
    fn ax_round_trips_a_positive_offset() {
        let ins = Instruction::Ax {
            op: Opcode::Goto,
            ax: 1000,
        };
        assert_eq!(Instruction::decode(ins.encode()).unwrap(), ins);
    }

    #[test]
    fn unknown_opcode_byte_is_rejected() {
        let bytes = [0xee, 0, 0, 0];
        assert_eq!(Instruction::decode(bytes), Err(IllegalOpcode(0xee)));
    }

    #[quickcheck_macros::quickcheck]
    fn abc_survives_any_byte_triple(a: u8, b: u8, c: u8) -> bool {
        let ins = Instruction::Abc {
            op: Opcode::Add,
            a,
            b,
            c,
        };
        Instruction::decode(ins.encode()) == Ok(ins)
    }
}
