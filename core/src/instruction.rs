use std::fmt;

use crate::variant::Capabilities;

/// A decoded instruction. Register operands are nibbles and so always name
/// one of V0..VF.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instruction {
    /// 00E0
    ClearScreen,
    /// 00EE
    Return,
    /// 00Cn (SUPER-CHIP)
    ScrollDown(u8),
    /// 00Dn (SUPER-CHIP)
    ScrollUp(u8),
    /// 00FB (SUPER-CHIP)
    ScrollRight,
    /// 00FC (SUPER-CHIP)
    ScrollLeft,
    /// 00FD (SUPER-CHIP), accepted and ignored
    Exit,
    /// 00FE (SUPER-CHIP)
    LowRes,
    /// 00FF (SUPER-CHIP)
    HighRes,
    /// 00Dn (XO-CHIP)
    PlayPattern(u8),
    /// 1NNN
    Jump(u16),
    /// 2NNN
    Call(u16),
    /// 3XNN
    SkipEqImm(u8, u8),
    /// 4XNN
    SkipNeImm(u8, u8),
    /// 5XY0
    SkipEqReg(u8, u8),
    /// 5XY2 (XO-CHIP)
    SaveRange(u8, u8),
    /// 5XY3 (XO-CHIP)
    LoadRange(u8, u8),
    /// 6XNN
    SetImm(u8, u8),
    /// 7XNN
    AddImm(u8, u8),
    /// 8XY0
    Assign(u8, u8),
    /// 8XY1
    Or(u8, u8),
    /// 8XY2
    And(u8, u8),
    /// 8XY3
    Xor(u8, u8),
    /// 8XY4
    Add(u8, u8),
    /// 8XY5
    Sub(u8, u8),
    /// 8XY6
    ShiftRight(u8, u8),
    /// 8XY7
    SubReverse(u8, u8),
    /// 8XYE
    ShiftLeft(u8, u8),
    /// 9XY0
    SkipNeReg(u8, u8),
    /// ANNN
    SetIndex(u16),
    /// BNNN / BXNN
    JumpOffset(u16, u8),
    /// CXNN
    Random(u8, u8),
    /// DXYN
    Draw(u8, u8, u8),
    /// EX9E
    SkipKeyPressed(u8),
    /// EXA1
    SkipKeyNotPressed(u8),
    /// F000 NNNN (XO-CHIP), the address follows in the next word
    LongIndex,
    /// FX01 (XO-CHIP)
    SelectPlanes(u8),
    /// FX07
    GetDelay(u8),
    /// FX0A
    WaitKey(u8),
    /// FX15
    SetDelay(u8),
    /// FX18
    SetSound(u8),
    /// FX1E
    AddIndex(u8),
    /// FX29
    FontChar(u8),
    /// FX33
    Bcd(u8),
    /// FX55
    Store(u8),
    /// FX65
    Load(u8),
    /// FX75 (XO-CHIP)
    SaveAudio(u8),
    /// FX85 (XO-CHIP)
    LoadAudio(u8),
    /// Anything else; executes as a no-op
    Unknown(u16),
}

impl Instruction {
    pub fn decode(opcode: u16, caps: &Capabilities) -> Instruction {
        let x = ((opcode & 0x0F00) >> 8) as u8;
        let y = ((opcode & 0x00F0) >> 4) as u8;
        let n = (opcode & 0x000F) as u8;
        let nn = (opcode & 0x00FF) as u8;
        let nnn = opcode & 0x0FFF;

        if caps.super_chip {
            if let Some(inst) = Instruction::decode_extended(opcode, caps) {
                return inst;
            }
        }

        match (opcode >> 12, n) {
            (0x0, _) => match opcode {
                0x00E0 => Instruction::ClearScreen,
                0x00EE => Instruction::Return,
                _ => Instruction::Unknown(opcode),
            },
            (0x1, _) => Instruction::Jump(nnn),
            (0x2, _) => Instruction::Call(nnn),
            (0x3, _) => Instruction::SkipEqImm(x, nn),
            (0x4, _) => Instruction::SkipNeImm(x, nn),
            (0x5, 0x0) => Instruction::SkipEqReg(x, y),
            (0x5, 0x2) if caps.xo_chip => Instruction::SaveRange(x, y),
            (0x5, 0x3) if caps.xo_chip => Instruction::LoadRange(x, y),
            (0x6, _) => Instruction::SetImm(x, nn),
            (0x7, _) => Instruction::AddImm(x, nn),
            (0x8, 0x0) => Instruction::Assign(x, y),
            (0x8, 0x1) => Instruction::Or(x, y),
            (0x8, 0x2) => Instruction::And(x, y),
            (0x8, 0x3) => Instruction::Xor(x, y),
            (0x8, 0x4) => Instruction::Add(x, y),
            (0x8, 0x5) => Instruction::Sub(x, y),
            (0x8, 0x6) => Instruction::ShiftRight(x, y),
            (0x8, 0x7) => Instruction::SubReverse(x, y),
            (0x8, 0xE) => Instruction::ShiftLeft(x, y),
            (0x9, 0x0) => Instruction::SkipNeReg(x, y),
            (0xA, _) => Instruction::SetIndex(nnn),
            (0xB, _) => Instruction::JumpOffset(nnn, x),
            (0xC, _) => Instruction::Random(x, nn),
            (0xD, _) => Instruction::Draw(x, y, n),
            (0xE, _) => match nn {
                0x9E => Instruction::SkipKeyPressed(x),
                0xA1 => Instruction::SkipKeyNotPressed(x),
                _ => Instruction::Unknown(opcode),
            },
            (0xF, _) => match nn {
                0x00 if x == 0 && caps.xo_chip => Instruction::LongIndex,
                0x01 if caps.xo_chip => Instruction::SelectPlanes(x),
                0x07 => Instruction::GetDelay(x),
                0x0A => Instruction::WaitKey(x),
                0x15 => Instruction::SetDelay(x),
                0x18 => Instruction::SetSound(x),
                0x1E => Instruction::AddIndex(x),
                0x29 => Instruction::FontChar(x),
                0x33 => Instruction::Bcd(x),
                0x55 => Instruction::Store(x),
                0x65 => Instruction::Load(x),
                0x75 if caps.xo_chip => Instruction::SaveAudio(x),
                0x85 if caps.xo_chip => Instruction::LoadAudio(x),
                _ => Instruction::Unknown(opcode),
            },
            _ => Instruction::Unknown(opcode),
        }
    }

    /// Scroll, resolution and pattern opcodes in the 00xx page
    fn decode_extended(opcode: u16, caps: &Capabilities) -> Option<Instruction> {
        let n = (opcode & 0x000F) as u8;
        let inst = match opcode & 0xFFF0 {
            0x00C0 => Instruction::ScrollDown(n),
            0x00D0 if caps.xo_chip => Instruction::PlayPattern(n),
            0x00D0 => Instruction::ScrollUp(n),
            _ => match opcode {
                0x00FB => Instruction::ScrollRight,
                0x00FC => Instruction::ScrollLeft,
                0x00FD => Instruction::Exit,
                0x00FE => Instruction::LowRes,
                0x00FF => Instruction::HighRes,
                _ => return None,
            },
        };
        Some(inst)
    }

    /// Size in bytes, including any trailing operand word
    pub fn size(&self) -> u16 {
        match self {
            Instruction::LongIndex => 4,
            _ => 2,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::ClearScreen => write!(f, "CLEAR"),
            Instruction::Return => write!(f, "RET"),
            Instruction::ScrollDown(n) => write!(f, "SCROLL DOWN {n}"),
            Instruction::ScrollUp(n) => write!(f, "SCROLL UP {n}"),
            Instruction::ScrollRight => write!(f, "SCROLL RIGHT"),
            Instruction::ScrollLeft => write!(f, "SCROLL LEFT"),
            Instruction::Exit => write!(f, "EXIT"),
            Instruction::LowRes => write!(f, "LORES"),
            Instruction::HighRes => write!(f, "HIRES"),
            Instruction::PlayPattern(n) => write!(f, "PATTERN {n:x}"),
            Instruction::Jump(addr) => write!(f, "JMP 0x{addr:03x}"),
            Instruction::Call(addr) => write!(f, "CALL 0x{addr:03x}"),
            Instruction::SkipEqImm(x, nn) => write!(f, "SKIP V{x:X}=={nn:02x}"),
            Instruction::SkipNeImm(x, nn) => write!(f, "SKIP V{x:X}!={nn:02x}"),
            Instruction::SkipEqReg(x, y) => write!(f, "SKIP V{x:X}==V{y:X}"),
            Instruction::SaveRange(x, y) => write!(f, "SAVE V{x:X}-V{y:X}"),
            Instruction::LoadRange(x, y) => write!(f, "LOAD V{x:X}-V{y:X}"),
            Instruction::SetImm(x, nn) => write!(f, "SET V{x:X} {nn:02x}"),
            Instruction::AddImm(x, nn) => write!(f, "ADD V{x:X} {nn:02x}"),
            Instruction::Assign(x, y) => write!(f, "SET V{x:X} V{y:X}"),
            Instruction::Or(x, y) => write!(f, "OR V{x:X} V{y:X}"),
            Instruction::And(x, y) => write!(f, "AND V{x:X} V{y:X}"),
            Instruction::Xor(x, y) => write!(f, "XOR V{x:X} V{y:X}"),
            Instruction::Add(x, y) => write!(f, "ADD V{x:X} V{y:X}"),
            Instruction::Sub(x, y) => write!(f, "SUB V{x:X} V{y:X}"),
            Instruction::ShiftRight(x, y) => write!(f, "SHR V{x:X} V{y:X}"),
            Instruction::SubReverse(x, y) => write!(f, "SUB2 V{x:X} V{y:X}"),
            Instruction::ShiftLeft(x, y) => write!(f, "SHL V{x:X} V{y:X}"),
            Instruction::SkipNeReg(x, y) => write!(f, "SKIP V{x:X}!=V{y:X}"),
            Instruction::SetIndex(addr) => write!(f, "SET I 0x{addr:03x}"),
            Instruction::JumpOffset(addr, x) => write!(f, "JMP 0x{addr:03x} +V0/V{x:X}"),
            Instruction::Random(x, nn) => write!(f, "RNG V{x:X} 0x{nn:02x}"),
            Instruction::Draw(x, y, n) => write!(f, "DRAW V{x:X} V{y:X} {n:x}"),
            Instruction::SkipKeyPressed(x) => write!(f, "SKIP KEY V{x:X}"),
            Instruction::SkipKeyNotPressed(x) => write!(f, "SKIP !KEY V{x:X}"),
            Instruction::LongIndex => write!(f, "SET I LONG"),
            Instruction::SelectPlanes(x) => write!(f, "PLANE V{x:X}"),
            Instruction::GetDelay(x) => write!(f, "GET DELAY V{x:X}"),
            Instruction::WaitKey(x) => write!(f, "WAIT KEY V{x:X}"),
            Instruction::SetDelay(x) => write!(f, "SET DELAY V{x:X}"),
            Instruction::SetSound(x) => write!(f, "SET SOUND V{x:X}"),
            Instruction::AddIndex(x) => write!(f, "ADD I V{x:X}"),
            Instruction::FontChar(x) => write!(f, "FONT V{x:X}"),
            Instruction::Bcd(x) => write!(f, "BCD V{x:X}"),
            Instruction::Store(x) => write!(f, "STORE V{x:X}"),
            Instruction::Load(x) => write!(f, "LOAD V{x:X}"),
            Instruction::SaveAudio(x) => write!(f, "SAVE AUDIO V{x:X}"),
            Instruction::LoadAudio(x) => write!(f, "LOAD AUDIO V{x:X}"),
            Instruction::Unknown(op) => write!(f, "??? 0x{op:04x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::Variant;

    fn decode(opcode: u16, variant: Variant) -> Instruction {
        Instruction::decode(opcode, &Capabilities::from(variant))
    }

    #[test]
    fn test_decode_base_set() {
        let v = Variant::CHIP_8;
        assert_eq!(decode(0x00E0, v), Instruction::ClearScreen);
        assert_eq!(decode(0x00EE, v), Instruction::Return);
        assert_eq!(decode(0x1ABC, v), Instruction::Jump(0xABC));
        assert_eq!(decode(0x2ABC, v), Instruction::Call(0xABC));
        assert_eq!(decode(0x3A12, v), Instruction::SkipEqImm(0xA, 0x12));
        assert_eq!(decode(0x5AB0, v), Instruction::SkipEqReg(0xA, 0xB));
        assert_eq!(decode(0x8AB6, v), Instruction::ShiftRight(0xA, 0xB));
        assert_eq!(decode(0x8ABE, v), Instruction::ShiftLeft(0xA, 0xB));
        assert_eq!(decode(0xB2F0, v), Instruction::JumpOffset(0x2F0, 0x2));
        assert_eq!(decode(0xD125, v), Instruction::Draw(0x1, 0x2, 0x5));
        assert_eq!(decode(0xE39E, v), Instruction::SkipKeyPressed(0x3));
        assert_eq!(decode(0xF40A, v), Instruction::WaitKey(0x4));
        assert_eq!(decode(0xF565, v), Instruction::Load(0x5));
    }

    #[test]
    fn test_decode_unknown_in_family() {
        let v = Variant::CHIP_8;
        assert_eq!(decode(0x5AB1, v), Instruction::Unknown(0x5AB1));
        assert_eq!(decode(0x8AB8, v), Instruction::Unknown(0x8AB8));
        assert_eq!(decode(0x9AB1, v), Instruction::Unknown(0x9AB1));
        assert_eq!(decode(0xE3FF, v), Instruction::Unknown(0xE3FF));
        assert_eq!(decode(0xF3FF, v), Instruction::Unknown(0xF3FF));
        assert_eq!(decode(0x0123, v), Instruction::Unknown(0x0123));
    }

    #[test]
    fn test_extensions_gated_by_variant() {
        assert_eq!(decode(0x00C4, Variant::CHIP_8), Instruction::Unknown(0x00C4));
        assert_eq!(decode(0x00FF, Variant::CHIP_8), Instruction::Unknown(0x00FF));
        assert_eq!(decode(0x00C4, Variant::SUPER_CHIP), Instruction::ScrollDown(4));
        assert_eq!(decode(0x00FF, Variant::SUPER_CHIP), Instruction::HighRes);
        assert_eq!(decode(0x00FD, Variant::XO_CHIP), Instruction::Exit);

        assert_eq!(decode(0x5AB2, Variant::SUPER_CHIP), Instruction::Unknown(0x5AB2));
        assert_eq!(decode(0x5AB2, Variant::XO_CHIP), Instruction::SaveRange(0xA, 0xB));
        assert_eq!(decode(0xF201, Variant::CHIP_8), Instruction::Unknown(0xF201));
        assert_eq!(decode(0xF201, Variant::XO_CHIP), Instruction::SelectPlanes(2));
        assert_eq!(decode(0xF375, Variant::XO_CHIP), Instruction::SaveAudio(3));
        assert_eq!(decode(0xF000, Variant::XO_CHIP), Instruction::LongIndex);
        assert_eq!(decode(0xF000, Variant::SUPER_CHIP), Instruction::Unknown(0xF000));
    }

    #[test]
    fn test_00dn_depends_on_variant() {
        assert_eq!(decode(0x00D3, Variant::CHIP_8), Instruction::Unknown(0x00D3));
        assert_eq!(decode(0x00D3, Variant::SUPER_CHIP), Instruction::ScrollUp(3));
        assert_eq!(decode(0x00D3, Variant::XO_CHIP), Instruction::PlayPattern(3));
    }

    #[test]
    fn test_extended_checked_before_base() {
        // 00E0 and 00EE still decode normally on the extended variants
        assert_eq!(decode(0x00E0, Variant::XO_CHIP), Instruction::ClearScreen);
        assert_eq!(decode(0x00EE, Variant::SUPER_CHIP), Instruction::Return);
    }

    #[test]
    fn test_size() {
        assert_eq!(Instruction::LongIndex.size(), 4);
        assert_eq!(Instruction::ClearScreen.size(), 2);
    }

    #[test]
    fn test_disassembly() {
        assert_eq!(Instruction::Jump(0x2A0).to_string(), "JMP 0x2a0");
        assert_eq!(Instruction::SkipEqImm(0xA, 0x0F).to_string(), "SKIP VA==0f");
        assert_eq!(Instruction::Draw(1, 2, 0xF).to_string(), "DRAW V1 V2 f");
        assert_eq!(Instruction::Unknown(0x5AB9).to_string(), "??? 0x5ab9");
    }
}
