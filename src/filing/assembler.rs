//! Participant assembly from a case's raw `*`-delimited columns.
//!
//! The identifier list decides how many participants a role has. Side and
//! type are broadcast when a single value is given for several
//! participants; contact columns are only padded.

use tracing::warn;

use crate::models::{Case, Participant, ParticipantRole, PartyFields, PartyKind};

/// Multi-value delimiter used throughout the import sheet.
pub const DELIMITER: char = '*';

/// Participants of one case, per role, in sheet order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledParticipants {
    pub plaintiffs: Vec<Participant>,
    pub defendants: Vec<Participant>,
    pub representatives: Vec<Participant>,
}

impl AssembledParticipants {
    pub fn len(&self) -> usize {
        self.plaintiffs.len() + self.defendants.len() + self.representatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plaintiffs, then defendants, then representatives.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.plaintiffs
            .iter()
            .chain(self.defendants.iter())
            .chain(self.representatives.iter())
    }
}

/// Split a raw column on `*`, trimming each part. Absent or blank input
/// yields an empty list.
pub fn split_field(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(s) if !s.trim().is_empty() => {
            s.split(DELIMITER).map(|part| part.trim().to_string()).collect()
        }
        _ => Vec::new(),
    }
}

/// Number of participants implied by an identifier column.
pub fn participant_count(ids: &[String]) -> usize {
    match ids.first() {
        Some(first) if !first.is_empty() => ids.len(),
        _ => 0,
    }
}

/// Fit `values` to `count` entries.
///
/// With `broadcast`, a single value is repeated for every participant.
/// Otherwise missing trailing entries become `None` and extras are dropped.
/// Empty parts count as missing.
fn align(values: Vec<String>, count: usize, broadcast: bool) -> Vec<Option<String>> {
    if broadcast && values.len() == 1 && count > 1 {
        let value = Some(values[0].clone()).filter(|v| !v.is_empty());
        return vec![value; count];
    }
    let mut aligned: Vec<Option<String>> = values
        .into_iter()
        .take(count)
        .map(|v| Some(v).filter(|v| !v.is_empty()))
        .collect();
    aligned.resize(count, None);
    aligned
}

fn check_count(role: ParticipantRole, column: &str, values: &[String], count: usize, broadcast: bool) {
    let len = values.len();
    if len == 0 || len == count || (broadcast && len == 1) {
        return;
    }
    warn!(
        %role,
        column,
        expected = count,
        found = len,
        "Participant column length does not match identifier count; padding/truncating"
    );
}

fn assemble_role(role: ParticipantRole, fields: &PartyFields, contacts_only: bool) -> Vec<Participant> {
    let ids = split_field(fields.ids.as_deref());
    let count = participant_count(&ids);
    if count == 0 {
        return Vec::new();
    }

    let column = |name: &str, raw: &Option<String>, broadcast: bool| {
        let values = split_field(raw.as_deref());
        check_count(role, name, &values, count, broadcast);
        align(values, count, broadcast)
    };

    let sides = column("side", &fields.sides, true);
    let types = column("type", &fields.types, true);
    let phones = column("phone", &fields.phones, false);
    let emails = column("email", &fields.emails, false);
    let (addresses, banks) = if contacts_only {
        (vec![None; count], vec![None; count])
    } else {
        (
            column("address", &fields.addresses, false),
            column("bank", &fields.banks, false),
        )
    };

    let ids = align(ids, count, false);
    (0..count)
        .map(|i| Participant {
            role,
            id: ids[i].clone(),
            side: sides[i].clone(),
            kind: PartyKind::from_type_flag(types[i].as_deref()),
            address: addresses[i].clone(),
            bank: banks[i].clone(),
            phone: phones[i].clone(),
            email: emails[i].clone(),
        })
        .collect()
}

/// Build the participant lists of a case. Never fails; malformed columns
/// degrade to fewer or emptier participants.
pub fn assemble(case: &Case) -> AssembledParticipants {
    AssembledParticipants {
        plaintiffs: assemble_role(ParticipantRole::Plaintiff, &case.plaintiff, false),
        defendants: assemble_role(ParticipantRole::Defendant, &case.defendant, true),
        representatives: assemble_role(
            ParticipantRole::Representative,
            &case.representative,
            false,
        ),
    }
}
