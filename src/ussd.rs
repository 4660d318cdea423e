//! USSD menu simulator.
//!
//! Sessions are keyed by phone number. Each session is a small state machine
//! whose states carry the registration answers collected so far, so a
//! half-finished registration can never produce a record with missing fields.
//! An `END` response always closes the session.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::config::UssdConfig;
use crate::error::RegistryResult;
use crate::record::Mother;
use crate::registry::MotherRegistry;
use crate::voice::VoiceMessageKind;

static NATIONAL_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{6,12}$").unwrap());

pub const MIN_AGE: u32 = 10;
pub const MAX_AGE: u32 = 60;
const EDD_FORMAT: &str = "%d-%m-%Y";

/// A gateway response: `CON` keeps the session open, `END` closes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UssdResponse {
    Continue(String),
    End(String),
}

impl UssdResponse {
    pub fn text(&self) -> &str {
        match self {
            UssdResponse::Continue(text) | UssdResponse::End(text) => text,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, UssdResponse::End(_))
    }
}

impl fmt::Display for UssdResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UssdResponse::Continue(text) => write!(f, "CON {text}"),
            UssdResponse::End(text) => write!(f, "END {text}"),
        }
    }
}

/// A response plus the voice call it promises, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UssdReply {
    pub response: UssdResponse,
    pub voice: Option<VoiceMessageKind>,
}

impl UssdReply {
    fn con(text: impl Into<String>) -> Self {
        Self {
            response: UssdResponse::Continue(text.into()),
            voice: None,
        }
    }

    fn end(text: impl Into<String>) -> Self {
        Self {
            response: UssdResponse::End(text.into()),
            voice: None,
        }
    }

    fn with_voice(mut self, kind: VoiceMessageKind) -> Self {
        self.voice = Some(kind);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Welcome,
    Language,
    NationalId {
        language: String,
    },
    Age {
        language: String,
        national_id: String,
    },
    DueDate {
        language: String,
        national_id: String,
        age: u32,
    },
}

/// In-memory USSD front end.
#[derive(Debug)]
pub struct UssdSimulator {
    config: UssdConfig,
    dashboard_url: String,
    sessions: HashMap<String, Step>,
}

impl UssdSimulator {
    pub fn new(config: UssdConfig, dashboard_url: impl Into<String>) -> Self {
        Self {
            config,
            dashboard_url: dashboard_url.into(),
            sessions: HashMap::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.config.code
    }

    pub fn has_session(&self, phone_number: &str) -> bool {
        self.sessions.contains_key(phone_number)
    }

    /// Process one line of input from `phone_number`.
    ///
    /// Dialing the service code always restarts the session. A registry
    /// write failure during registration is propagated and drops the session.
    pub fn handle(
        &mut self,
        phone_number: &str,
        input: &str,
        registry: &mut MotherRegistry,
        today: NaiveDate,
    ) -> RegistryResult<UssdReply> {
        let input = input.trim();
        let code = self.config.code.as_str();

        if input == code {
            tracing::debug!(phone = phone_number, "ussd session started");
            self.sessions.insert(phone_number.to_string(), Step::Welcome);
            return Ok(welcome());
        }
        let input = input.strip_prefix(code).map(str::trim).unwrap_or(input);

        let Some(step) = self.sessions.remove(phone_number) else {
            self.sessions.insert(phone_number.to_string(), Step::Welcome);
            return Ok(welcome());
        };

        let (reply, next) = self.advance(step, phone_number, input, registry, today)?;
        match next {
            Some(step) if !reply.response.is_end() => {
                self.sessions.insert(phone_number.to_string(), step);
            }
            _ => tracing::debug!(phone = phone_number, "ussd session closed"),
        }
        Ok(reply)
    }

    fn advance(
        &self,
        step: Step,
        phone_number: &str,
        input: &str,
        registry: &mut MotherRegistry,
        today: NaiveDate,
    ) -> RegistryResult<(UssdReply, Option<Step>)> {
        let outcome = match step {
            Step::Welcome => match input {
                "1" => (UssdReply::con(self.language_menu("Select your language:")), Some(Step::Language)),
                "2" => (
                    UssdReply::con("Please wait for a voice call to report symptoms.")
                        .with_voice(VoiceMessageKind::SymptomReport),
                    Some(Step::Welcome),
                ),
                "3" => (appointment(registry, phone_number, today), None),
                "4" => (
                    UssdReply::con("Please wait for a voice call with health tips.")
                        .with_voice(VoiceMessageKind::WeeklyTip),
                    Some(Step::Welcome),
                ),
                "5" => (
                    UssdReply::con(format!(
                        "View the dashboard in your browser at {}",
                        self.dashboard_url
                    )),
                    Some(Step::Welcome),
                ),
                _ => (UssdReply::con("Invalid option. Please choose 1-5."), Some(Step::Welcome)),
            },

            Step::Language => match self.config.languages.get(input) {
                Some(language) => (
                    UssdReply::con("Please enter your National ID:"),
                    Some(Step::NationalId {
                        language: language.clone(),
                    }),
                ),
                None => (
                    UssdReply::con(self.language_menu("Invalid selection. Please choose:")),
                    Some(Step::Language),
                ),
            },

            Step::NationalId { language } => {
                if NATIONAL_ID.is_match(input) {
                    (
                        UssdReply::con("Please enter your age in years:"),
                        Some(Step::Age {
                            language,
                            national_id: input.to_string(),
                        }),
                    )
                } else {
                    (
                        UssdReply::con("Invalid National ID. Please enter a valid ID:"),
                        Some(Step::NationalId { language }),
                    )
                }
            }

            Step::Age {
                language,
                national_id,
            } => match input.parse::<u32>() {
                Ok(age) if (MIN_AGE..=MAX_AGE).contains(&age) => (
                    UssdReply::con("Please enter your expected due date (DD-MM-YYYY):"),
                    Some(Step::DueDate {
                        language,
                        national_id,
                        age,
                    }),
                ),
                _ => (
                    UssdReply::con(format!(
                        "Invalid age. Please enter a number between {MIN_AGE} and {MAX_AGE}:"
                    )),
                    Some(Step::Age {
                        language,
                        national_id,
                    }),
                ),
            },

            Step::DueDate {
                language,
                national_id,
                age,
            } => match NaiveDate::parse_from_str(input, EDD_FORMAT) {
                Ok(edd) => {
                    let mother = Mother::registered(phone_number, national_id, language, age, edd);
                    let reply = UssdReply::end(format!(
                        "Registration complete. Thank you, {} speaker! \
                         You can view the dashboard at {}",
                        mother.language, self.dashboard_url
                    ));
                    tracing::info!(
                        phone = phone_number,
                        language = %mother.language,
                        edd = %mother.edd,
                        "mother registered via ussd"
                    );
                    registry.add(mother)?;
                    (reply, None)
                }
                Err(_) => (
                    UssdReply::con("Invalid date format. Please use DD-MM-YYYY:"),
                    Some(Step::DueDate {
                        language,
                        national_id,
                        age,
                    }),
                ),
            },
        };
        Ok(outcome)
    }

    fn language_menu(&self, heading: &str) -> String {
        let mut menu = heading.to_string();
        for (key, name) in &self.config.languages {
            menu.push_str(&format!("\n{key}. {name}"));
        }
        menu
    }
}

fn welcome() -> UssdReply {
    UssdReply::con(
        "Welcome to FURHA Antenatal Care\n\
         1. Register for antenatal care\n\
         2. Report symptoms\n\
         3. Check next appointment\n\
         4. Listen to health tips\n\
         5. View dashboard data",
    )
}

fn appointment(registry: &MotherRegistry, phone_number: &str, today: NaiveDate) -> UssdReply {
    let Some(mother) = registry.get(phone_number) else {
        return UssdReply::end("You are not registered. Please register first.");
    };
    let weeks = mother.weeks_pregnant(today);
    UssdReply::end(format!(
        "You are {weeks} weeks pregnant. Your next appointment is due {}.",
        next_visit(weeks)
    ))
}

/// When the next antenatal visit falls due, by completed weeks of pregnancy.
pub fn next_visit(weeks_pregnant: u32) -> &'static str {
    match weeks_pregnant {
        0..12 => "within 4 weeks for your first ANC visit",
        12..28 => "within 4 weeks for your next ANC visit",
        28..36 => "within 2 weeks for your next ANC visit",
        _ => "within 1 week for your next ANC visit",
    }
}
