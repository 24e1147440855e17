//! Where each surface target lives on the portal's pages.
//!
//! Most of the wizard is addressed by visible label or button text, the
//! participant dialogs by stable id suffixes that the JSF components
//! generate.

use serde::Serialize;

use crate::filing::{Control, Dialog, Element, Field, Target};

/// The page-wide loading overlay; hidden when it carries `d-none`.
pub const LOADER_CSS: &str = ".loader";

/// Present once RichFaces has no request in flight.
pub const AJAX_IDLE_CSS: &str = r#".rf-st-stop[style=""]"#;

/// Attribute set on the element resolved for a native click or typing.
pub const MARK_ATTR: &str = "data-courtfile-target";

const SIDE_DIALOG: &str = "#selectSideModalDialog";
const JURIDICAL_DIALOG: &str = "#jurModalDialog";
const PHYSICAL_DIALOG: &str = "#fizModalDialog";

const PROCEED_TEXT: &str = "Ары қарай";
const SAVE_BUTTON: &str = r#"input[value="Сақтау"]"#;

/// How to find an element, serialized for the injected resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum By {
    Css { css: &'static str },
    /// The `index`-th match of `css`.
    Nth { css: &'static str, index: usize },
    /// Elements matching `css` whose text contains `text`.
    Text { css: &'static str, text: &'static str },
    Link { text: &'static str },
    Button { text: &'static str },
    /// The control a `<label>` with this text points at.
    Label { text: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Locator {
    #[serde(flatten)]
    pub by: By,
    /// Restrict the search to this container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<&'static str>,
}

impl Locator {
    const fn new(by: By) -> Self {
        Self { by, scope: None }
    }

    const fn within(by: By, scope: &'static str) -> Self {
        Self {
            by,
            scope: Some(scope),
        }
    }
}

const fn css(css: &'static str) -> By {
    By::Css { css }
}

const fn label(text: &'static str) -> By {
    By::Label { text }
}

pub fn field(field: Field) -> Locator {
    match field {
        Field::LitigationKind => Locator::new(label("Сот ісін жүргізу түрі")),
        Field::InstanceLevel => Locator::new(label("Саты")),
        Field::DocumentType => Locator::new(label("Құжат түрі")),
        Field::ProceedingType => Locator::new(label("Іс бойынша іс жүргізу түрі")),
        Field::CaseCategory => Locator::new(label("Іс санаты")),
        Field::ClaimNature => Locator::new(label("Арыз сипаты")),
        Field::Region => Locator::new(label("Облыс (астана, республикалық маңызы бар қала)")),
        Field::Court => Locator::new(label("Сот органы")),
        Field::ParticipantKind => Locator::within(css(r#"select[id$=":pp-type"]"#), SIDE_DIALOG),
        Field::ParticipantSide => Locator::within(css(r#"select[id$=":pp-side"]"#), SIDE_DIALOG),
        Field::OrganizationBin => Locator::within(css(r#"input[id$=":org-bin"]"#), JURIDICAL_DIALOG),
        Field::FactAddress => {
            Locator::within(css(r#"input[name$=":org-factAddress"]"#), JURIDICAL_DIALOG)
        }
        Field::BankDetails => {
            Locator::within(css(r#"input[name$=":org-bankDetails"]"#), JURIDICAL_DIALOG)
        }
        Field::PersonIin => Locator::within(css(r#"input[id$=":person-iin"]"#), PHYSICAL_DIALOG),
        Field::Phone => Locator::within(css(r#"input[id$=":person-phone"]"#), PHYSICAL_DIALOG),
        Field::Email => Locator::within(css(r#"input[id$=":person-email"]"#), PHYSICAL_DIALOG),
        Field::ClaimCategory => Locator::new(By::Nth {
            css: "select",
            index: 0,
        }),
        Field::ClaimAmount => Locator::new(css("input[name$=':edit-totalSum']")),
        Field::StateDuty => Locator::new(css("input[name$=':edit-duty']")),
        Field::TextArea(index) => Locator::new(By::Nth {
            css: "textarea",
            index,
        }),
    }
}

pub fn control(control: Control) -> Locator {
    match control {
        Control::FilingEntry => Locator::new(By::Link {
            text: "Құжаттарды жіберу",
        }),
        Control::SubmitFilingKind => Locator::new(By::Button { text: "Жіберу" }),
        Control::AddParticipant => Locator::new(By::Button {
            text: "Процесс қатысушысын қосу",
        }),
        Control::SideSelectProceed => Locator::within(
            css(r#"input[value="Ары қарай"]"#),
            SIDE_DIALOG,
        ),
        Control::JuridicalLookup => Locator::within(css(".gbdSearch"), JURIDICAL_DIALOG),
        Control::JuridicalSave => Locator::within(css(SAVE_BUTTON), JURIDICAL_DIALOG),
        Control::PhysicalLookup => Locator::within(css(".gbdSearch"), PHYSICAL_DIALOG),
        Control::PhysicalSave => Locator::within(css(SAVE_BUTTON), PHYSICAL_DIALOG),
        Control::Proceed => Locator::new(By::Text {
            css: ".button-orange",
            text: PROCEED_TEXT,
        }),
        Control::OnlinePayment => Locator::new(css("input[name$='isonline-payment']")),
        Control::AttachFile => Locator::new(By::Button {
            text: "Файлды қоса тіркеу",
        }),
        Control::UploadClaim => Locator::new(By::Button {
            text: "Талап арызды жүктеу",
        }),
    }
}

pub fn dialog(dialog: Dialog) -> Locator {
    Locator::new(css(match dialog {
        Dialog::SideSelect => SIDE_DIALOG,
        Dialog::Juridical => JURIDICAL_DIALOG,
        Dialog::Physical => PHYSICAL_DIALOG,
    }))
}

pub fn element(element: Element) -> Locator {
    match element {
        Element::ConfirmationPayload => Locator::new(css("#xmlToSign0")),
    }
}

pub fn locate(target: Target) -> Locator {
    match target {
        Target::Field(f) => field(f),
        Target::Control(c) => control(c),
        Target::Dialog(d) => dialog(d),
        Target::Element(e) => element(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_json() {
        let json = serde_json::to_value(field(Field::Phone)).unwrap();
        assert_eq!(json["by"], "css");
        assert_eq!(json["css"], r#"input[id$=":person-phone"]"#);
        assert_eq!(json["scope"], PHYSICAL_DIALOG);

        let json = serde_json::to_value(field(Field::TextArea(1))).unwrap();
        assert_eq!(json["by"], "nth");
        assert_eq!(json["index"], 1);
        assert!(json.get("scope").is_none());
    }

    #[test]
    fn test_dialog_fields_are_scoped() {
        for f in [
            Field::ParticipantKind,
            Field::ParticipantSide,
            Field::OrganizationBin,
            Field::PersonIin,
            Field::Email,
        ] {
            assert!(field(f).scope.is_some(), "{} should be scoped", f);
        }
        assert_eq!(control(Control::JuridicalSave).scope, Some(JURIDICAL_DIALOG));
        assert_eq!(control(Control::PhysicalSave).scope, Some(PHYSICAL_DIALOG));
    }
}
