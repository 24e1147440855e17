//! Participants derived from a case's raw party columns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which block of the case a participant came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Plaintiff,
    Defendant,
    Representative,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintiff => "plaintiff",
            Self::Defendant => "defendant",
            Self::Representative => "representative",
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legal form of a participant, selecting which dialog the portal shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    /// Organization, identified by BIN.
    Juridical,
    /// Natural person, identified by IIN.
    Physical,
}

impl PartyKind {
    /// Interpret a raw type cell. `"1"` and `"true"` mean juridical;
    /// anything else, including a missing value, means physical.
    pub fn from_type_flag(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => Self::Juridical,
            _ => Self::Physical,
        }
    }

    pub fn is_juridical(&self) -> bool {
        matches!(self, Self::Juridical)
    }

    /// Value of the participant-kind select on the portal.
    pub fn form_value(&self) -> &'static str {
        if self.is_juridical() {
            "true"
        } else {
            "false"
        }
    }
}

/// One participant ready to be entered through the participant dialog.
///
/// All attribute fields are optional; absent values are left untouched
/// in the dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub role: ParticipantRole,
    /// BIN or IIN.
    pub id: Option<String>,
    pub side: Option<String>,
    pub kind: PartyKind,
    pub address: Option<String>,
    pub bank: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Participant {
    pub fn new(role: ParticipantRole, kind: PartyKind) -> Self {
        Self {
            role,
            id: None,
            side: None,
            kind,
            address: None,
            bank: None,
            phone: None,
            email: None,
        }
    }
}
