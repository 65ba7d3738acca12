use serde::Serialize;

/// School sections. Section-format student identifiers carry the 3-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Creche,
    Nursery,
    Primary,
    College,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Creche,
        Section::Nursery,
        Section::Primary,
        Section::College,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Section::Creche => "CRE",
            Section::Nursery => "NUR",
            Section::Primary => "PRY",
            Section::College => "COL",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Section::Creche => "creche",
            Section::Nursery => "nursery",
            Section::Primary => "primary",
            Section::College => "college",
        }
    }

    /// Accepts either the section name or its code, any case.
    pub fn lookup(s: &str) -> Option<Section> {
        let t = s.trim();
        Section::ALL
            .into_iter()
            .find(|sec| sec.name().eq_ignore_ascii_case(t) || sec.code().eq_ignore_ascii_case(t))
    }
}

/// Display name to class code, in school order.
pub const CLASS_CODES: &[(&str, &str)] = &[
    ("Creche 1", "CRE1"),
    ("Creche 2", "CRE2"),
    ("Nursery 1", "NUR1"),
    ("Nursery 2", "NUR2"),
    ("Nursery 3", "NUR3"),
    ("Primary 1", "PRY1"),
    ("Primary 2", "PRY2"),
    ("Primary 3", "PRY3"),
    ("Primary 4", "PRY4"),
    ("Primary 5", "PRY5"),
    ("Primary 6", "PRY6"),
    ("JSS 1", "JSS1"),
    ("JSS 2", "JSS2"),
    ("JSS 3", "JSS3"),
    ("SSS 1", "SSS1"),
    ("SSS 2", "SSS2"),
    ("SSS 3", "SSS3"),
];

pub fn class_code_to_name(code: &str) -> Option<&'static str> {
    CLASS_CODES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

pub fn name_to_class_code(name: &str) -> Option<&'static str> {
    CLASS_CODES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| *code)
}

/// Section from the class-code prefix. Junior and senior secondary both sit in college.
pub fn class_code_to_section(code: &str) -> Option<Section> {
    if code.starts_with("CRE") {
        Some(Section::Creche)
    } else if code.starts_with("NUR") {
        Some(Section::Nursery)
    } else if code.starts_with("PRY") {
        Some(Section::Primary)
    } else if code.starts_with("JSS") || code.starts_with("SSS") {
        Some(Section::College)
    } else {
        None
    }
}
