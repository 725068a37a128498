//! Provider application flow.

use serde::{Deserialize, Serialize};

use super::{DraftError, Flow, filled};
use crate::catalog::BUSINESS_TYPES;
use crate::types::{ApplicationStatus, UserId};

/// Minimum number of distinct services a provider must offer.
pub const MIN_SERVICES: usize = 3;

/// The provider onboarding wizard.
pub struct ProviderApplicationFlow;

impl ProviderApplicationFlow {
    pub const BUSINESS: u8 = 1;
    pub const SERVICES: u8 = 2;
    pub const VERIFICATION: u8 = 3;
    pub const BANKING: u8 = 4;
    pub const REVIEW: u8 = 5;
}

impl Flow for ProviderApplicationFlow {
    type Draft = ProviderApplicationDraft;

    const NAME: &'static str = "provider_application";
    const STEPS: &'static [&'static str] =
        &["business", "services", "verification", "banking", "review"];

    fn is_step_complete(step: u8, draft: &ProviderApplicationDraft) -> bool {
        match step {
            Self::BUSINESS => {
                filled(draft.business_name.as_deref())
                    && filled(draft.ein.as_deref())
                    && filled(draft.owner_name.as_deref())
            }
            Self::SERVICES => draft.services.len() >= MIN_SERVICES,
            Self::VERIFICATION => draft.background_check,
            Self::BANKING => true,
            _ => false,
        }
    }
}

/// The partially filled application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderApplicationDraft {
    pub business_name: Option<String>,
    pub business_type: Option<String>,
    pub ein: Option<String>,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Distinct service names, in the order they were first selected.
    pub services: Vec<String>,
    pub insurance: Option<String>,
    pub certifications: Vec<String>,
    pub service_area: Option<String>,
    pub portfolio: Vec<String>,
    pub bank_account: Option<String>,
    pub routing_number: Option<String>,
    pub background_check: bool,
}

impl ProviderApplicationDraft {
    /// Copy with bank fields reduced to their last four digits, for
    /// returning to clients.
    #[must_use]
    pub fn masked(&self) -> Self {
        Self {
            bank_account: self.bank_account.as_deref().map(mask_digits),
            routing_number: self.routing_number.as_deref().map(mask_digits),
            ..self.clone()
        }
    }
}

/// A client edit to the application draft. Absent fields are left alone.
///
/// `services` replaces the whole selection; duplicates collapse to one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderApplicationPatch {
    pub business_name: Option<String>,
    pub business_type: Option<String>,
    pub ein: Option<String>,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub services: Option<Vec<String>>,
    pub insurance: Option<String>,
    pub certifications: Option<Vec<String>>,
    pub service_area: Option<String>,
    pub portfolio: Option<Vec<String>>,
    pub bank_account: Option<String>,
    pub routing_number: Option<String>,
    pub background_check: Option<bool>,
}

impl ProviderApplicationPatch {
    /// Validate and merge this edit into `draft`.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::InvalidField` for an unknown business type, a
    /// malformed EIN, or a routing number that is not nine digits.
    pub fn apply(self, draft: &mut ProviderApplicationDraft) -> Result<(), DraftError> {
        if let Some(kind) = &self.business_type
            && !BUSINESS_TYPES.contains(&kind.as_str())
        {
            return Err(DraftError::InvalidField {
                field: "businessType",
                reason: format!("must be one of {}", BUSINESS_TYPES.join(", ")),
            });
        }

        if let Some(ein) = &self.ein
            && !ein.trim().is_empty()
            && !is_ein(ein.trim())
        {
            return Err(DraftError::InvalidField {
                field: "ein",
                reason: "expected XX-XXXXXXX".to_owned(),
            });
        }

        if let Some(routing) = &self.routing_number
            && !(routing.len() == 9 && routing.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(DraftError::InvalidField {
                field: "routingNumber",
                reason: "must be 9 digits".to_owned(),
            });
        }

        if let Some(account) = &self.bank_account
            && !account.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(DraftError::InvalidField {
                field: "bankAccount",
                reason: "must contain only digits".to_owned(),
            });
        }

        set(&mut draft.business_name, self.business_name);
        set(&mut draft.business_type, self.business_type);
        set(&mut draft.ein, self.ein.map(|e| e.trim().to_owned()));
        set(&mut draft.owner_name, self.owner_name);
        set(&mut draft.phone, self.phone);
        set(&mut draft.email, self.email);
        set(&mut draft.insurance, self.insurance);
        set(&mut draft.service_area, self.service_area);
        set(&mut draft.bank_account, self.bank_account);
        set(&mut draft.routing_number, self.routing_number);

        if let Some(services) = self.services {
            let mut unique: Vec<String> = Vec::with_capacity(services.len());
            for service in services {
                if !unique.contains(&service) {
                    unique.push(service);
                }
            }
            draft.services = unique;
        }
        if let Some(certifications) = self.certifications {
            draft.certifications = certifications;
        }
        if let Some(portfolio) = self.portfolio {
            draft.portfolio = portfolio;
        }
        if let Some(checked) = self.background_check {
            draft.background_check = checked;
        }
        Ok(())
    }
}

fn set(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

/// `XX-XXXXXXX`, or nine bare digits.
fn is_ein(value: &str) -> bool {
    let digits: Vec<u8> = value.bytes().filter(u8::is_ascii_digit).collect();
    let dashes = value.bytes().filter(|&b| b == b'-').count();
    digits.len() == 9
        && (dashes == 0 || (dashes == 1 && value.as_bytes().get(2) == Some(&b'-')))
        && value.len() == 9 + dashes
}

/// Replace all but the last four characters with `*`.
#[must_use]
pub fn mask_digits(value: &str) -> String {
    let count = value.chars().count();
    value
        .chars()
        .enumerate()
        .map(|(i, c)| if i + 4 < count { '*' } else { c })
        .collect()
}

/// The record persisted when an application is submitted.
///
/// `submittedAt` is the store's creation timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderApplicationRecord {
    #[serde(flatten)]
    pub application: ProviderApplicationDraft,
    pub status: ApplicationStatus,
    pub user_id: UserId,
}

impl ProviderApplicationRecord {
    #[must_use]
    pub fn new(draft: &ProviderApplicationDraft, user_id: UserId) -> Self {
        Self {
            application: draft.clone(),
            status: ApplicationStatus::Pending,
            user_id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::wizard::{Wizard, WizardState};

    fn at(step: u8, draft: ProviderApplicationDraft) -> Wizard<ProviderApplicationFlow> {
        Wizard::from_state(WizardState {
            current_step: step,
            draft,
        })
    }

    #[test]
    fn test_business_step_requires_three_fields() {
        let mut draft = ProviderApplicationDraft {
            business_name: Some("Shine Co".to_owned()),
            owner_name: Some("Jordan".to_owned()),
            ..Default::default()
        };
        assert!(!at(1, draft.clone()).advance());

        draft.ein = Some("12-3456789".to_owned());
        let mut wizard = at(1, draft);
        assert!(wizard.advance());
        assert_eq!(wizard.current_step(), ProviderApplicationFlow::SERVICES);
    }

    #[test]
    fn test_services_step_needs_three() {
        let mut wizard = at(ProviderApplicationFlow::SERVICES, ProviderApplicationDraft::default());
        wizard.draft_mut().services = vec!["Full Detail".to_owned(), "Paint Correction".to_owned()];
        assert!(!wizard.advance());
        assert_eq!(wizard.current_step(), ProviderApplicationFlow::SERVICES);

        wizard.draft_mut().services.push("Ceramic Coating".to_owned());
        assert!(wizard.advance());
        assert_eq!(wizard.current_step(), ProviderApplicationFlow::VERIFICATION);
    }

    #[test]
    fn test_patch_deduplicates_services() {
        let mut draft = ProviderApplicationDraft::default();
        ProviderApplicationPatch {
            services: Some(vec![
                "Full Detail".to_owned(),
                "Full Detail".to_owned(),
                "Ceramic Coating".to_owned(),
            ]),
            ..Default::default()
        }
        .apply(&mut draft)
        .unwrap();
        assert_eq!(draft.services, vec!["Full Detail", "Ceramic Coating"]);
        assert!(!ProviderApplicationFlow::is_step_complete(2, &draft));
    }

    #[test]
    fn test_verification_requires_background_check() {
        let mut wizard = at(
            ProviderApplicationFlow::VERIFICATION,
            ProviderApplicationDraft::default(),
        );
        assert!(!wizard.advance());
        wizard.draft_mut().background_check = true;
        assert!(wizard.advance());
        assert!(wizard.advance(), "banking never gates");
        assert!(wizard.is_terminal());
    }

    #[test]
    fn test_patch_validation() {
        let mut draft = ProviderApplicationDraft::default();

        let err = ProviderApplicationPatch {
            business_type: Some("nonprofit".to_owned()),
            ..Default::default()
        }
        .apply(&mut draft)
        .unwrap_err();
        assert!(matches!(err, DraftError::InvalidField { field: "businessType", .. }));

        let err = ProviderApplicationPatch {
            routing_number: Some("12345".to_owned()),
            ..Default::default()
        }
        .apply(&mut draft)
        .unwrap_err();
        assert!(matches!(err, DraftError::InvalidField { field: "routingNumber", .. }));

        let err = ProviderApplicationPatch {
            ein: Some("1-23456789".to_owned()),
            ..Default::default()
        }
        .apply(&mut draft)
        .unwrap_err();
        assert!(matches!(err, DraftError::InvalidField { field: "ein", .. }));

        assert_eq!(draft, ProviderApplicationDraft::default());
    }

    #[test]
    fn test_ein_formats() {
        assert!(is_ein("12-3456789"));
        assert!(is_ein("123456789"));
        assert!(!is_ein("123-456789"));
        assert!(!is_ein("12-345678"));
        assert!(!is_ein("12-34567a9"));
    }

    #[test]
    fn test_masking() {
        assert_eq!(mask_digits("123456789"), "*****6789");
        assert_eq!(mask_digits("12"), "12");

        let draft = ProviderApplicationDraft {
            bank_account: Some("000123456789".to_owned()),
            routing_number: Some("021000021".to_owned()),
            business_name: Some("Shine Co".to_owned()),
            ..Default::default()
        };
        let masked = draft.masked();
        assert_eq!(masked.bank_account.as_deref(), Some("********6789"));
        assert_eq!(masked.routing_number.as_deref(), Some("*****0021"));
        assert_eq!(masked.business_name, draft.business_name);
    }

    #[test]
    fn test_record_flattens_application() {
        let draft = ProviderApplicationDraft {
            business_name: Some("Shine Co".to_owned()),
            ..Default::default()
        };
        let record = ProviderApplicationRecord::new(&draft, UserId::new("u1"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["businessName"], "Shine Co");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["userId"], "u1");
    }
}
