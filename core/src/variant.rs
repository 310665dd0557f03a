use std::{fmt, str::FromStr};

use crate::display::SpriteEdge;

pub const CHIP8_MEMORY_SIZE: usize = 0x1000;
pub const SCHIP_MEMORY_SIZE: usize = 0x2000;
pub const XOCHIP_MEMORY_SIZE: usize = 0x10000;

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Variant {
    CHIP_8,
    SUPER_CHIP,
    XO_CHIP,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::CHIP_8, Variant::SUPER_CHIP, Variant::XO_CHIP];

    pub fn memory_size(self) -> usize {
        match self {
            Variant::CHIP_8 => CHIP8_MEMORY_SIZE,
            Variant::SUPER_CHIP => SCHIP_MEMORY_SIZE,
            Variant::XO_CHIP => XOCHIP_MEMORY_SIZE,
        }
    }

    /// Instructions per second the reference host runs this variant at
    pub fn default_ips(self) -> u32 {
        match self {
            Variant::CHIP_8 => 700,
            Variant::SUPER_CHIP => 1000,
            Variant::XO_CHIP => 2000,
        }
    }

    /// Next variant in menu order, wrapping around
    pub fn next(self) -> Variant {
        match self {
            Variant::CHIP_8 => Variant::SUPER_CHIP,
            Variant::SUPER_CHIP => Variant::XO_CHIP,
            Variant::XO_CHIP => Variant::CHIP_8,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Variant::CHIP_8 => 0,
            Variant::SUPER_CHIP => 1,
            Variant::XO_CHIP => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Variant> {
        Variant::ALL.into_iter().find(|v| v.tag() == tag)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::CHIP_8 => "CHIP-8",
            Variant::SUPER_CHIP => "SUPER-CHIP",
            Variant::XO_CHIP => "XO-CHIP",
        };
        name.fmt(f)
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Variant, String> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "chip8" => Ok(Variant::CHIP_8),
            "schip" | "superchip" => Ok(Variant::SUPER_CHIP),
            "xochip" => Ok(Variant::XO_CHIP),
            _ => Err(format!("unknown variant '{s}' (expected chip8, schip or xochip)")),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Quirks {
    /// Bitwise shift (8XY6 and 8XYE) quirk: if true VY is the shift source instead of VX
    pub shift_uses_vy: bool,
    /// Store and load memory (FX55/FX65) quirk: advance I by X+1 after the transfer
    pub load_store_increment_i: bool,
    /// Jump with offset (BNNN/BXNN) quirk: add VX instead of V0 to the jump target
    pub jump_with_vx: bool,
}

impl Quirks {
    pub fn for_variant(variant: Variant) -> Quirks {
        match variant {
            Variant::CHIP_8 | Variant::XO_CHIP => Quirks {
                shift_uses_vy: true,
                load_store_increment_i: true,
                jump_with_vx: false,
            },
            Variant::SUPER_CHIP => Quirks {
                shift_uses_vy: false,
                load_store_increment_i: false,
                jump_with_vx: true,
            },
        }
    }
}

/// Variant-dependent behaviour, resolved once when the machine is built
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Capabilities {
    pub memory_size: usize,
    /// 00Cn/00FB-00FF, 16x16 sprites
    pub super_chip: bool,
    /// 5XY2/5XY3, FX01, FX75/FX85, 00Dn pattern playback, F000 NNNN
    pub xo_chip: bool,
    /// 8XY1/8XY2/8XY3 reset VF
    pub logic_resets_vf: bool,
    /// Scroll distances are doubled in high resolution
    pub scroll_doubles_in_hires: bool,
    /// Start up in two-plane colour mode
    pub color_planes: bool,
    pub sprite_edge: SpriteEdge,
}

impl From<Variant> for Capabilities {
    fn from(variant: Variant) -> Capabilities {
        match variant {
            Variant::CHIP_8 => Capabilities {
                memory_size: CHIP8_MEMORY_SIZE,
                super_chip: false,
                xo_chip: false,
                logic_resets_vf: true,
                scroll_doubles_in_hires: false,
                color_planes: false,
                sprite_edge: SpriteEdge::WrapOriginClip,
            },
            Variant::SUPER_CHIP => Capabilities {
                memory_size: SCHIP_MEMORY_SIZE,
                super_chip: true,
                xo_chip: false,
                logic_resets_vf: false,
                scroll_doubles_in_hires: false,
                color_planes: false,
                sprite_edge: SpriteEdge::MaskOriginClip,
            },
            Variant::XO_CHIP => Capabilities {
                memory_size: XOCHIP_MEMORY_SIZE,
                super_chip: true,
                xo_chip: true,
                logic_resets_vf: false,
                scroll_doubles_in_hires: true,
                color_planes: true,
                sprite_edge: SpriteEdge::Wrap,
            },
        }
    }
}
