//! Flat-file record store for registered mothers.
//!
//! Records are keyed by phone number and kept in insertion order. Every
//! mutation is written straight back to the CSV file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::csv::{self, Row, Table};
use crate::error::{RegistryError, RegistryResult};
use crate::record::{split_symptoms, Mother, RiskLevel};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column order used when writing the registry file.
pub const COLUMNS: [&str; 13] = [
    "phone_number",
    "national_id",
    "language",
    "edd",
    "lmp",
    "age",
    "prev_pregnancies",
    "prev_complications",
    "risk_level",
    "anc_visits",
    "missed_anc",
    "last_contact",
    "symptoms",
];

const REQUIRED: [&str; 8] = [
    "phone_number",
    "national_id",
    "language",
    "edd",
    "lmp",
    "age",
    "prev_pregnancies",
    "prev_complications",
];

/// CSV-backed registry of mothers.
#[derive(Debug)]
pub struct MotherRegistry {
    path: PathBuf,
    mothers: Vec<Mother>,
    index: HashMap<String, usize>,
}

impl MotherRegistry {
    /// Open the registry at `path`, seeding it with sample records if the file
    /// does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> RegistryResult<Self> {
        let path = path.into();
        if !path.exists() {
            tracing::info!(path = %path.display(), "registry file missing, creating sample data");
            let mut registry = Self::empty(path);
            for mother in sample_mothers(Local::now().date_naive()) {
                registry.insert(mother);
            }
            registry.save()?;
            return Ok(registry);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| RegistryError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut registry = Self::empty(path);
        for mother in parse_mothers(&content, &registry.path)? {
            registry.insert(mother);
        }
        tracing::debug!(
            path = %registry.path.display(),
            mothers = registry.len(),
            "loaded registry"
        );
        Ok(registry)
    }

    /// An in-memory registry bound to `path` that has not been written yet.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mothers: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert or replace a mother, then persist.
    pub fn add(&mut self, mother: Mother) -> RegistryResult<()> {
        self.insert(mother);
        self.save()
    }

    /// Insert or replace many mothers with a single write.
    pub fn extend<I>(&mut self, mothers: I) -> RegistryResult<()>
    where
        I: IntoIterator<Item = Mother>,
    {
        for mother in mothers {
            self.insert(mother);
        }
        self.save()
    }

    fn insert(&mut self, mother: Mother) {
        match self.index.get(&mother.phone_number) {
            Some(&idx) => self.mothers[idx] = mother,
            None => {
                self.index
                    .insert(mother.phone_number.clone(), self.mothers.len());
                self.mothers.push(mother);
            }
        }
    }

    /// Look up a mother by phone number.
    pub fn get(&self, phone_number: &str) -> Option<&Mother> {
        self.index.get(phone_number).map(|&idx| &self.mothers[idx])
    }

    /// Apply `f` to the mother with this phone number and persist.
    ///
    /// Returns `Ok(false)` if no such mother exists. The phone number itself is
    /// the key and is restored if `f` changes it.
    pub fn update<F>(&mut self, phone_number: &str, f: F) -> RegistryResult<bool>
    where
        F: FnOnce(&mut Mother),
    {
        let Some(&idx) = self.index.get(phone_number) else {
            return Ok(false);
        };
        let mother = &mut self.mothers[idx];
        f(mother);
        mother.phone_number = phone_number.to_string();
        self.save()?;
        Ok(true)
    }

    /// Write every record to the registry file.
    pub fn save(&self) -> RegistryResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RegistryError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let mut out = csv::join_line(&COLUMNS);
        out.push('\n');
        for mother in &self.mothers {
            out.push_str(&csv::join_line(&to_fields(mother)));
            out.push('\n');
        }

        std::fs::write(&self.path, out).map_err(|e| RegistryError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mother> {
        self.mothers.iter()
    }

    /// All records in insertion order.
    pub fn mothers(&self) -> &[Mother] {
        &self.mothers
    }

    pub fn len(&self) -> usize {
        self.mothers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mothers.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The two records the prototype seeds an empty registry with.
pub fn sample_mothers(today: NaiveDate) -> Vec<Mother> {
    let days = chrono::Duration::days;
    vec![
        Mother {
            phone_number: "+254711123456".into(),
            national_id: "12345678".into(),
            language: "Samburu".into(),
            edd: today + days(120),
            lmp: today - days(90),
            age: 28,
            prev_pregnancies: 2,
            prev_complications: false,
            risk_level: RiskLevel::Low,
            anc_visits: 0,
            missed_anc: 0,
            last_contact: None,
            symptoms: Vec::new(),
        },
        Mother {
            phone_number: "+254722987654".into(),
            national_id: "87654321".into(),
            language: "Rendille".into(),
            edd: today + days(60),
            lmp: today - days(150),
            age: 17,
            prev_pregnancies: 0,
            prev_complications: true,
            risk_level: RiskLevel::Low,
            anc_visits: 0,
            missed_anc: 0,
            last_contact: None,
            symptoms: vec!["bleeding".into()],
        },
    ]
}

fn to_fields(m: &Mother) -> Vec<String> {
    vec![
        m.phone_number.clone(),
        m.national_id.clone(),
        m.language.clone(),
        m.edd.format(DATE_FORMAT).to_string(),
        m.lmp.format(DATE_FORMAT).to_string(),
        m.age.to_string(),
        m.prev_pregnancies.to_string(),
        if m.prev_complications { "True" } else { "False" }.to_string(),
        m.risk_level.to_string(),
        m.anc_visits.to_string(),
        m.missed_anc.to_string(),
        m.last_contact
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default(),
        m.symptoms_joined(),
    ]
}

/// Parse a registry document into records.
pub fn parse_mothers(content: &str, path: &Path) -> RegistryResult<Vec<Mother>> {
    let table = Table::parse(content);
    for column in REQUIRED {
        if table.column(column).is_none() {
            return Err(RegistryError::MissingColumn {
                path: path.display().to_string(),
                column: column.into(),
            });
        }
    }

    table
        .rows
        .iter()
        .map(|row| RowReader { table: &table, row, path }.mother())
        .collect()
}

struct RowReader<'a> {
    table: &'a Table,
    row: &'a Row,
    path: &'a Path,
}

impl RowReader<'_> {
    fn raw(&self, column: &str) -> &str {
        self.table
            .column(column)
            .map(|idx| self.row.get(idx).trim())
            .unwrap_or("")
    }

    fn invalid(&self, column: &str) -> RegistryError {
        RegistryError::InvalidValue {
            path: self.path.display().to_string(),
            line: self.row.line,
            column: column.into(),
            value: self.raw(column).into(),
        }
    }

    fn date(&self, column: &str) -> RegistryResult<NaiveDate> {
        NaiveDate::parse_from_str(self.raw(column), DATE_FORMAT).map_err(|_| self.invalid(column))
    }

    fn optional_date(&self, column: &str) -> RegistryResult<Option<NaiveDate>> {
        if self.raw(column).is_empty() {
            return Ok(None);
        }
        self.date(column).map(Some)
    }

    fn count(&self, column: &str) -> RegistryResult<u32> {
        self.raw(column).parse().map_err(|_| self.invalid(column))
    }

    fn optional_count(&self, column: &str) -> RegistryResult<u32> {
        if self.raw(column).is_empty() {
            return Ok(0);
        }
        self.count(column)
    }

    fn mother(&self) -> RegistryResult<Mother> {
        let risk_level = match self.raw("risk_level") {
            "" => RiskLevel::Low,
            raw => raw.parse().map_err(|_| self.invalid("risk_level"))?,
        };
        let prev_complications =
            parse_bool(self.raw("prev_complications")).ok_or_else(|| self.invalid("prev_complications"))?;

        Ok(Mother {
            phone_number: self.raw("phone_number").to_string(),
            national_id: self.raw("national_id").to_string(),
            language: self.raw("language").to_string(),
            edd: self.date("edd")?,
            lmp: self.date("lmp")?,
            age: self.count("age")?,
            prev_pregnancies: self.count("prev_pregnancies")?,
            prev_complications,
            risk_level,
            anc_visits: self.optional_count("anc_visits")?,
            missed_anc: self.optional_count("missed_anc")?,
            last_contact: self.optional_date("last_contact")?,
            symptoms: split_symptoms(self.raw("symptoms")),
        })
    }
}

/// Accept `True`/`False` in any case, and `1`/`0`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
