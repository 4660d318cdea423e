//! Simulated outbound voice calls.
//!
//! No telephony happens here: a call is composed, logged and handed back to
//! the caller for display.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::registry::MotherRegistry;

/// What a call is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceMessageKind {
    WeeklyTip,
    AppointmentReminder,
    SymptomReport,
}

impl VoiceMessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceMessageKind::WeeklyTip => "weekly_tip",
            VoiceMessageKind::AppointmentReminder => "appointment_reminder",
            VoiceMessageKind::SymptomReport => "symptom_report",
        }
    }
}

impl fmt::Display for VoiceMessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A composed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceCall {
    pub phone_number: String,
    pub language: String,
    pub kind: VoiceMessageKind,
    pub message: String,
}

impl fmt::Display for VoiceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VOICE CALL to {} ({}): {}",
            self.phone_number, self.language, self.message
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VoiceSystem;

impl VoiceSystem {
    pub fn new() -> Self {
        Self
    }

    /// Compose and "place" a call to a registered mother.
    ///
    /// Returns `None` if the phone number is not registered.
    pub fn call(
        &self,
        registry: &MotherRegistry,
        phone_number: &str,
        kind: VoiceMessageKind,
        today: NaiveDate,
    ) -> Option<VoiceCall> {
        let Some(mother) = registry.get(phone_number) else {
            tracing::warn!(phone = phone_number, %kind, "voice call to unregistered number");
            return None;
        };
        let weeks = mother.weeks_pregnant(today);

        let call = VoiceCall {
            phone_number: mother.phone_number.clone(),
            language: mother.language.clone(),
            kind,
            message: compose(kind, weeks),
        };
        tracing::info!(
            phone = %call.phone_number,
            language = %call.language,
            %kind,
            weeks_pregnant = weeks,
            "voice call placed"
        );
        Some(call)
    }
}

fn compose(kind: VoiceMessageKind, weeks: u32) -> String {
    match kind {
        VoiceMessageKind::WeeklyTip => weekly_tip(weeks).to_string(),
        VoiceMessageKind::AppointmentReminder => format!(
            "Appointment reminder: Your next antenatal visit is due soon. \
             You are {weeks} weeks pregnant."
        ),
        VoiceMessageKind::SymptomReport => {
            "Thank you for reporting your symptoms. A health worker will contact you soon."
                .to_string()
        }
    }
}

fn weekly_tip(weeks: u32) -> &'static str {
    if weeks < 14 {
        "Health tip: Eat nutritious foods and take folic acid. Avoid alcohol and smoking."
    } else if weeks < 28 {
        "Health tip: You should feel your baby move. Attend all antenatal appointments."
    } else {
        "Health tip: Prepare for delivery. Know the signs of labor and where to go."
    }
}
