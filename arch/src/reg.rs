use bimap::BiMap;
use num_enum::IntoPrimitive;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// SIC/XE register set. The numeric value is the register code used in
/// format-2 instruction encoding; note the gap at 7.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, IntoPrimitive,
)]
#[repr(u8)]
pub enum Reg {
    #[default]
    A = 0,
    X = 1,
    L = 2,
    B = 3,
    S = 4,
    T = 5,
    F = 6,
    PC = 8,
    SW = 9,
}

static REG_MAP: Lazy<BiMap<&'static str, Reg>> = Lazy::new(|| {
    let mut map: BiMap<&'static str, Reg> = BiMap::new();
    map.insert("A", Reg::A);
    map.insert("X", Reg::X);
    map.insert("L", Reg::L);
    map.insert("B", Reg::B);
    map.insert("S", Reg::S);
    map.insert("T", Reg::T);
    map.insert("F", Reg::F);
    map.insert("PC", Reg::PC);
    map.insert("SW", Reg::SW);
    map
});

impl Reg {
    pub fn parse(s: &str) -> Result<Reg, String> {
        if let Some(reg) = REG_MAP.get_by_left(s) {
            Ok(*reg)
        } else {
            Err(format!("illegal register name (`{}`)", s))
        }
    }

    pub fn code(&self) -> u8 {
        (*self).into()
    }
}

impl Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", REG_MAP.get_by_right(self).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_names() {
        assert_eq!(Reg::parse("A").unwrap(), Reg::A);
        assert_eq!(Reg::parse("PC").unwrap(), Reg::PC);
        assert_eq!(Reg::parse("SW").unwrap(), Reg::SW);
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(Reg::parse("Z").is_err());
        assert!(Reg::parse("a").is_err());
    }

    #[test]
    fn codes_skip_seven() {
        assert_eq!(Reg::F.code(), 6);
        assert_eq!(Reg::PC.code(), 8);
        assert_eq!(Reg::SW.code(), 9);
    }
}
