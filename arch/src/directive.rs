use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Assembler directives. Everything the pass-1 resolver accepts as an
/// operator that is not in the opcode catalog must be one of these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
pub enum Directive {
    START,
    CSECT,
    EXTDEF,
    EXTREF,
    BYTE,
    WORD,
    RESB,
    RESW,
    LTORG,
    EQU,
    END,
}

impl Directive {
    pub fn parse(s: &str) -> Result<Self, String> {
        s.parse::<Self>()
            .map_err(|_| format!("illegal directive name (`{}`)", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_directives() {
        assert_eq!(Directive::parse("START").unwrap(), Directive::START);
        assert_eq!(Directive::parse("LTORG").unwrap(), Directive::LTORG);
        assert_eq!(Directive::parse("END").unwrap(), Directive::END);
    }

    #[test]
    fn parse_rejects_lowercase_and_unknown() {
        assert!(Directive::parse("start").is_err());
        assert!(Directive::parse("MACRO").is_err());
    }
}
