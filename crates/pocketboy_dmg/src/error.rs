use std::fmt;

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Fatal, deterministic emulation conditions.
///
/// The reference design terminated the process on any of these. Here they
/// are propagated to the driving loop instead, so a host application can
/// report a halted-emulation state, show diagnostics, or recover. None of
/// them are transient; retrying the same step reproduces the same error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CoreError {
    /// Access to a region the core deliberately does not model
    /// (external cartridge RAM, echo RAM, the 0xFEA0 band).
    UnimplementedRegion { region: &'static str, addr: u16 },
    /// Write into the ROM range while the bus is configured to fault on
    /// such writes (see `RomWritePolicy`).
    RomWrite { addr: u16 },
    /// Opcode that matches no decode rule.
    IllegalOpcode { opcode: u8, pc: u16 },
    /// Opcode the core recognises but intentionally does not implement
    /// yet (HALT, STOP). Documented extension point.
    UnimplementedOpcode { opcode: u8, pc: u16 },
    /// An operand-index accessor was called with an index outside its
    /// table. Unreachable from legally decoded opcodes; indicates a
    /// decode bug.
    BadOperandIndex { table: &'static str, index: u8 },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CoreError::UnimplementedRegion { region, addr } => {
                write!(f, "access to unimplemented {region} at 0x{addr:04X}")
            }
            CoreError::RomWrite { addr } => {
                write!(f, "write to ROM at 0x{addr:04X}")
            }
            CoreError::IllegalOpcode { opcode, pc } => {
                write!(f, "illegal opcode 0x{opcode:02X} at PC 0x{pc:04X}")
            }
            CoreError::UnimplementedOpcode { opcode, pc } => {
                write!(f, "unimplemented opcode 0x{opcode:02X} at PC 0x{pc:04X}")
            }
            CoreError::BadOperandIndex { table, index } => {
                write!(f, "operand index {index} out of range for {table}")
            }
        }
    }
}

impl std::error::Error for CoreError {}
