use sicxe::op::OpTable;

use crate::error::AsmError;
use crate::objcode::ObjectCode;
use crate::section::ControlSection;

/// Slice the source into one line group per control section: a new group
/// opens at every CSECT line, and every group except the last gets the
/// final source line (the END line) appended as its terminator.
pub fn divide_input(lines: &[String]) -> Vec<Vec<String>> {
    let Some(last) = lines.last() else {
        return Vec::new();
    };
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in lines {
        let is_csect = line.split('\t').nth(1) == Some("CSECT");
        if is_csect && !current.is_empty() {
            current.push(last.clone());
            groups.push(std::mem::take(&mut current));
        }
        current.push(line.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// The whole run's result: one control section and one object module per
/// line group, in source order.
pub struct Assembly {
    pub sections: Vec<ControlSection>,
    pub objects: Vec<ObjectCode>,
}

impl Assembly {
    /// All object modules serialized, joined by blank lines.
    pub fn object_text(&self) -> Result<String, AsmError> {
        let modules = self
            .objects
            .iter()
            .map(|o| o.serialize())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(modules.join("\n\n"))
    }

    /// Per-section symbol table listings, joined by blank lines.
    pub fn symbol_text(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.symbols().to_string())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Per-section literal table listings, joined by blank lines.
    pub fn literal_text(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.literals().to_string())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Front door: owns the opcode catalog and runs both passes over every
/// control section. Sections are independent; pass 2 of a section only
/// needs that same section's completed pass 1.
pub struct Assembler {
    optable: OpTable,
}

impl Assembler {
    pub fn new(optable: OpTable) -> Self {
        Assembler { optable }
    }

    pub fn with_builtin() -> Self {
        Assembler {
            optable: OpTable::builtin().clone(),
        }
    }

    pub fn assemble(&self, source: &str) -> Result<Assembly, AsmError> {
        let lines: Vec<String> = source.lines().map(str::to_string).collect();
        let groups = divide_input(&lines);

        let mut sections = Vec::new();
        for group in &groups {
            sections.push(ControlSection::pass1(&self.optable, group)?);
        }
        let mut objects = Vec::new();
        for section in &sections {
            objects.push(section.pass2()?);
        }
        Ok(Assembly { sections, objects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &[&str]) -> Vec<String> {
        src.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_section_is_one_group() {
        let groups = divide_input(&lines(&["COPY\tSTART\t0", "\tRSUB", "\tEND\tCOPY"]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn csect_opens_a_new_group_with_end_appended() {
        let groups = divide_input(&lines(&[
            "COPY\tSTART\t0",
            "\tRSUB",
            "RDREC\tCSECT",
            "\tRSUB",
            "\tEND\tFIRST",
        ]));
        assert_eq!(groups.len(), 2);
        // The first group is terminated by a copy of the END line.
        assert_eq!(groups[0].last().unwrap(), "\tEND\tFIRST");
        assert_eq!(groups[1].first().unwrap(), "RDREC\tCSECT");
        assert_eq!(groups[1].last().unwrap(), "\tEND\tFIRST");
    }

    #[test]
    fn empty_input_has_no_groups() {
        assert!(divide_input(&[]).is_empty());
    }
}
