//! Customer booking flow.
//!
//! Steps: service, date & time, vehicle & address, payment, confirm.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DraftError, Flow, filled};
use crate::catalog::{self, ServiceOffering};
use crate::types::{
    Amount, BookingStatus, FeeMode, FeeSplit, PaymentStatus, ProviderId, ServiceId, UserId,
    VehicleId,
};

/// The booking wizard.
pub struct BookingFlow;

impl BookingFlow {
    pub const SERVICE: u8 = 1;
    pub const DATE_TIME: u8 = 2;
    pub const VEHICLE_ADDRESS: u8 = 3;
    pub const PAYMENT: u8 = 4;
    pub const CONFIRM: u8 = 5;
}

impl Flow for BookingFlow {
    type Draft = BookingDraft;

    const NAME: &'static str = "booking";
    const STEPS: &'static [&'static str] =
        &["service", "date_time", "vehicle_address", "payment", "confirm"];

    fn is_step_complete(step: u8, draft: &BookingDraft) -> bool {
        match step {
            Self::SERVICE => draft.service.is_some(),
            Self::DATE_TIME => draft.date.is_some() && filled(draft.time.as_deref()),
            Self::VEHICLE_ADDRESS => draft.vehicle.is_some() && filled(draft.address.as_deref()),
            // Card details are captured by the processor's browser fields and
            // never gate the flow.
            Self::PAYMENT => true,
            _ => false,
        }
    }
}

/// Service details frozen into a booking at selection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub id: ServiceId,
    pub name: String,
    pub price: Amount,
    pub duration: String,
}

impl From<ServiceOffering> for ServiceSnapshot {
    fn from(offering: ServiceOffering) -> Self {
        Self {
            id: offering.id,
            name: offering.name,
            price: offering.price,
            duration: offering.duration,
        }
    }
}

/// The provider a booking was started from, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSnapshot {
    pub id: ProviderId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The customer's vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<VehicleId>,
    pub make: String,
    pub model: String,
    pub year: String,
}

impl Vehicle {
    /// "2023 Tesla Model 3".
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

/// The partially filled booking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub service: Option<ServiceSnapshot>,
    pub provider: Option<ProviderSnapshot>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub vehicle: Option<Vehicle>,
    pub address: Option<String>,
    /// Processor-issued payment method token from the browser card fields.
    pub payment_method_id: Option<String>,
}

/// A client edit to the booking draft. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraftPatch {
    pub service_id: Option<ServiceId>,
    pub provider: Option<ProviderSnapshot>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub vehicle: Option<Vehicle>,
    pub address: Option<String>,
    pub payment_method_id: Option<String>,
}

impl BookingDraftPatch {
    /// Validate and merge this edit into `draft`.
    ///
    /// Nothing is written unless every supplied field is acceptable.
    ///
    /// # Errors
    ///
    /// Returns a `DraftError` for unknown services or time slots, dates
    /// before `today`, and blank vehicle fields.
    pub fn apply(self, draft: &mut BookingDraft, today: NaiveDate) -> Result<(), DraftError> {
        let service = self
            .service_id
            .map(|id| {
                catalog::find_service(&id)
                    .map(ServiceSnapshot::from)
                    .ok_or_else(|| DraftError::UnknownService(id.into_inner()))
            })
            .transpose()?;

        if let Some(date) = self.date
            && date < today
        {
            return Err(DraftError::DateInPast(date));
        }

        if let Some(time) = &self.time
            && !catalog::is_time_slot(time)
        {
            return Err(DraftError::UnknownTimeSlot(time.clone()));
        }

        if let Some(vehicle) = &self.vehicle {
            for (field, value) in [
                ("vehicle.make", &vehicle.make),
                ("vehicle.model", &vehicle.model),
                ("vehicle.year", &vehicle.year),
            ] {
                if value.trim().is_empty() {
                    return Err(DraftError::InvalidField {
                        field,
                        reason: "must not be blank".to_owned(),
                    });
                }
            }
        }

        if service.is_some() {
            draft.service = service;
        }
        if self.provider.is_some() {
            draft.provider = self.provider;
        }
        if self.date.is_some() {
            draft.date = self.date;
        }
        if self.time.is_some() {
            draft.time = self.time;
        }
        if self.vehicle.is_some() {
            draft.vehicle = self.vehicle;
        }
        if let Some(address) = self.address {
            draft.address = Some(address.trim().to_owned());
        }
        if self.payment_method_id.is_some() {
            draft.payment_method_id = self.payment_method_id;
        }
        Ok(())
    }
}

/// Who is booking, and how fees are split. Supplied by the caller at submit.
#[derive(Debug, Clone)]
pub struct BookingContext {
    pub customer_id: UserId,
    pub customer_email: String,
    pub customer_name: String,
    pub fee_mode: FeeMode,
}

/// The record persisted when a booking is submitted.
///
/// `createdAt` is stamped by the document store; `paidAt` is set by
/// settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub customer_id: UserId,
    pub customer_email: String,
    pub customer_name: String,
    pub provider_id: Option<ProviderId>,
    pub provider_name: Option<String>,
    pub service: ServiceSnapshot,
    pub date: NaiveDate,
    pub time: String,
    pub vehicle: Vehicle,
    pub address: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: Amount,
    pub platform_fee: Amount,
    pub provider_amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
}

impl BookingRecord {
    /// Assemble the persisted record from a complete draft.
    ///
    /// Returns `None` if a gated field is missing; callers check
    /// [`super::Wizard::ready_for_submit`] first, so this only guards
    /// against misuse.
    #[must_use]
    pub fn assemble(draft: &BookingDraft, ctx: &BookingContext) -> Option<Self> {
        let service = draft.service.clone()?;
        let split = FeeSplit::compute(service.price, ctx.fee_mode);

        Some(Self {
            customer_id: ctx.customer_id.clone(),
            customer_email: ctx.customer_email.clone(),
            customer_name: ctx.customer_name.clone(),
            provider_id: draft.provider.as_ref().map(|p| p.id.clone()),
            provider_name: draft.provider.as_ref().map(|p| p.name.clone()),
            date: draft.date?,
            time: draft.time.clone()?,
            vehicle: draft.vehicle.clone()?,
            address: draft.address.clone()?,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_amount: split.total_amount,
            platform_fee: split.platform_fee,
            provider_amount: split.provider_amount,
            payment_method_id: draft.payment_method_id.clone(),
            service,
        })
    }
}
