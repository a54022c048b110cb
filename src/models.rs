/// Data models for the admin console.
///
/// This module defines the entities the admin panel edits:
/// - Appointment: a booked date between a patient and a doctor
/// - Doctor: a doctor account
/// - AvailabilitySlot: a window in which a doctor accepts appointments
/// - UserSummary: read-only user identity for selectors
///
/// Working copies hold what the operator typed; typed values are only
/// produced when a payload is built on submit.
use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone,
    Utc,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{FormError, ValidationError};

/// Backend identifier for every entity.
pub type EntityId = i64;

/// The three editable entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Date,
    Doctor,
    Availability,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Date => "Date",
            EntityKind::Doctor => "Doctor",
            EntityKind::Availability => "Availability",
        }
    }

    /// Collection path on the backend, without a leading slash.
    pub fn collection_path(&self) -> &'static str {
        match self {
            EntityKind::Date => "dates",
            EntityKind::Doctor => "doctors",
            EntityKind::Availability => "availabilities",
        }
    }

    /// Key a single-record response may be wrapped in.
    pub fn singular_key(&self) -> &'static str {
        match self {
            EntityKind::Date => "date",
            EntityKind::Doctor => "doctor",
            EntityKind::Availability => "availability",
        }
    }

    /// Key a list response may be wrapped in.
    pub fn plural_key(&self) -> &'static str {
        self.collection_path()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a submit creates a new record or updates an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Edit,
}

impl Mode {
    /// Edit iff the entity already has a backend id.
    pub fn for_id(id: Option<EntityId>) -> Self {
        match id {
            Some(_) => Mode::Edit,
            None => Mode::Create,
        }
    }
}

/// A value coming out of a form control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl FieldValue {
    fn into_text(self, field: &str) -> Result<String, FormError> {
        match self {
            FieldValue::Text(value) => Ok(value),
            FieldValue::Flag(_) => Err(FormError::WrongValueKind {
                field: field.to_string(),
                expected: "text",
            }),
        }
    }

    fn into_flag(self, field: &str) -> Result<bool, FormError> {
        match self {
            FieldValue::Flag(value) => Ok(value),
            FieldValue::Text(_) => Err(FormError::WrongValueKind {
                field: field.to_string(),
                expected: "a checkbox value",
            }),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

/// Body sent to the backend on create or update.
pub trait Payload: Serialize + fmt::Debug + Send + Sync {
    fn id(&self) -> Option<EntityId>;
}

/// An entity the admin panel can list, edit and submit.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    type Payload: Payload;

    const KIND: EntityKind;

    /// Blank template used when opening the form for create.
    fn blank() -> Self;

    fn id(&self) -> Option<EntityId>;

    /// Merge one form value into this working copy.
    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), FormError>;

    /// Validate the working copy and build the body for `mode`.
    fn to_payload(&self, mode: Mode) -> Result<Self::Payload, ValidationError>;

    /// Rebuild a record from an accepted payload.
    fn from_payload(payload: Self::Payload, id: EntityId) -> Self;
}

/// Names of required fields whose value is blank.
fn missing_fields(fields: &[(&'static str, &str)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

/// Accepts a JSON string, number or null as a form reference.
fn reference<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(value)) => value,
        Some(Raw::Number(value)) => value.to_string(),
        None => String::new(),
    })
}

/// Accepts a JSON number or numeric string as an entity id.
pub(crate) fn entity_id<'de, D>(deserializer: D) -> Result<Option<EntityId>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(value)) => Ok(Some(value)),
        Some(Raw::Text(value)) if value.trim().is_empty() => Ok(None),
        Some(Raw::Text(value)) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid id: '{}'", value))),
        None => Ok(None),
    }
}

// ── Appointment ──

/// A booked appointment ("date" on the backend).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "AppointmentRow")]
pub struct Appointment {
    pub id: Option<EntityId>,
    pub speciality: String,
    pub doctor: String,
    pub datetime: String,
    pub reason_for_appointment: String,
    pub date_type: String,
    pub user_id: String,
}

/// Wire shape of a date row. Older rows carry the doctor as `doctor_id`,
/// newer ones as `doctor`, and some carry both.
#[derive(Deserialize)]
struct AppointmentRow {
    #[serde(default, deserialize_with = "entity_id")]
    id: Option<EntityId>,
    #[serde(default)]
    speciality: String,
    #[serde(default, deserialize_with = "reference")]
    doctor: String,
    #[serde(default, deserialize_with = "reference")]
    doctor_id: String,
    #[serde(default)]
    datetime: String,
    #[serde(default)]
    reason_for_appointment: String,
    #[serde(default)]
    date_type: String,
    #[serde(default, deserialize_with = "reference")]
    user_id: String,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        let doctor = if row.doctor.trim().is_empty() {
            row.doctor_id
        } else {
            row.doctor
        };
        Appointment {
            id: row.id,
            speciality: row.speciality,
            doctor,
            datetime: row.datetime,
            reason_for_appointment: row.reason_for_appointment,
            date_type: row.date_type,
            user_id: row.user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub speciality: String,
    pub doctor_id: String,
    pub datetime: String,
    pub reason_for_appointment: String,
    pub date_type: String,
    pub user_id: String,
}

impl Payload for AppointmentPayload {
    fn id(&self) -> Option<EntityId> {
        self.id
    }
}

impl Entity for Appointment {
    type Payload = AppointmentPayload;

    const KIND: EntityKind = EntityKind::Date;

    fn blank() -> Self {
        Appointment {
            id: None,
            speciality: String::new(),
            doctor: String::new(),
            datetime: String::new(),
            reason_for_appointment: String::new(),
            date_type: String::new(),
            user_id: String::new(),
        }
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), FormError> {
        let slot = match field {
            "speciality" => &mut self.speciality,
            "doctor" | "doctor_id" => &mut self.doctor,
            "datetime" => &mut self.datetime,
            "reason_for_appointment" => &mut self.reason_for_appointment,
            "date_type" => &mut self.date_type,
            "user_id" => &mut self.user_id,
            _ => {
                return Err(FormError::UnknownField {
                    kind: Self::KIND,
                    field: field.to_string(),
                })
            }
        };
        *slot = value.into_text(field)?;
        Ok(())
    }

    fn to_payload(&self, mode: Mode) -> Result<AppointmentPayload, ValidationError> {
        let missing = missing_fields(&[
            ("speciality", self.speciality.as_str()),
            ("doctor", self.doctor.as_str()),
            ("datetime", self.datetime.as_str()),
            ("reason_for_appointment", self.reason_for_appointment.as_str()),
            ("date_type", self.date_type.as_str()),
            ("user_id", self.user_id.as_str()),
        ]);
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields {
                kind: Self::KIND,
                fields: missing,
            });
        }

        let instant = normalize_datetime(&self.datetime, &Local)?;

        Ok(AppointmentPayload {
            id: match mode {
                Mode::Edit => self.id,
                Mode::Create => None,
            },
            speciality: self.speciality.clone(),
            doctor_id: self.doctor.clone(),
            datetime: to_iso_instant(&instant),
            reason_for_appointment: self.reason_for_appointment.clone(),
            date_type: self.date_type.clone(),
            user_id: self.user_id.clone(),
        })
    }

    fn from_payload(payload: AppointmentPayload, id: EntityId) -> Self {
        Appointment {
            id: Some(id),
            speciality: payload.speciality,
            doctor: payload.doctor_id,
            datetime: payload.datetime,
            reason_for_appointment: payload.reason_for_appointment,
            date_type: payload.date_type,
            user_id: payload.user_id,
        }
    }
}

/// Turn a datetime as typed (or as returned by the backend) into an
/// absolute instant. Values without an offset are read in `tz`.
pub fn normalize_datetime<Tz: TimeZone>(
    raw: &str,
    tz: &Tz,
) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_rfc2822(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .map_err(|_| ValidationError::InvalidDateTime(raw.to_string()))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ValidationError::NonexistentLocalTime(raw.to_string()))
}

/// ISO-8601 instant in UTC with millisecond precision.
pub fn to_iso_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── Doctor ──

/// A doctor account.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Doctor {
    #[serde(default, deserialize_with = "entity_id")]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub speciality: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub document_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    /// Only used when creating; the backend never returns it.
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Doctor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Doctor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("speciality", &self.speciality)
            .field("last_name", &self.last_name)
            .field("document_type", &self.document_type)
            .field("document_number", &self.document_number)
            .field("address", &self.address)
            .field("phone", &self.phone)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct DoctorPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    pub email: String,
    pub speciality: String,
    pub last_name: String,
    pub document_type: String,
    pub document_number: String,
    pub address: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for DoctorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoctorPayload")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("speciality", &self.speciality)
            .field("has_password", &self.password.is_some())
            .finish_non_exhaustive()
    }
}

impl Payload for DoctorPayload {
    fn id(&self) -> Option<EntityId> {
        self.id
    }
}

impl Doctor {
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.last_name)
        }
    }
}

impl Entity for Doctor {
    type Payload = DoctorPayload;

    const KIND: EntityKind = EntityKind::Doctor;

    fn blank() -> Self {
        Doctor {
            id: None,
            name: String::new(),
            email: String::new(),
            speciality: String::new(),
            last_name: String::new(),
            document_type: String::new(),
            document_number: String::new(),
            address: String::new(),
            phone: String::new(),
            password: String::new(),
        }
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), FormError> {
        let slot = match field {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "speciality" => &mut self.speciality,
            "last_name" => &mut self.last_name,
            "document_type" => &mut self.document_type,
            "document_number" => &mut self.document_number,
            "address" => &mut self.address,
            "phone" => &mut self.phone,
            "password" => &mut self.password,
            _ => {
                return Err(FormError::UnknownField {
                    kind: Self::KIND,
                    field: field.to_string(),
                })
            }
        };
        *slot = value.into_text(field)?;
        Ok(())
    }

    fn to_payload(&self, mode: Mode) -> Result<DoctorPayload, ValidationError> {
        let missing = missing_fields(&[
            ("name", self.name.as_str()),
            ("email", self.email.as_str()),
            ("speciality", self.speciality.as_str()),
        ]);
        if !missing.is_empty() {
            return Err(ValidationError::DoctorIdentityRequired);
        }

        let (id, password) = match mode {
            Mode::Create => {
                if self.password.trim().is_empty() {
                    return Err(ValidationError::PasswordRequired);
                }
                (None, Some(self.password.clone()))
            }
            // Password is never re-submitted on edit.
            Mode::Edit => (self.id, None),
        };

        Ok(DoctorPayload {
            id,
            name: self.name.clone(),
            email: self.email.clone(),
            speciality: self.speciality.clone(),
            last_name: self.last_name.clone(),
            document_type: self.document_type.clone(),
            document_number: self.document_number.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            password,
        })
    }

    fn from_payload(payload: DoctorPayload, id: EntityId) -> Self {
        Doctor {
            id: Some(id),
            name: payload.name,
            email: payload.email,
            speciality: payload.speciality,
            last_name: payload.last_name,
            document_type: payload.document_type,
            document_number: payload.document_number,
            address: payload.address,
            phone: payload.phone,
            password: String::new(),
        }
    }
}

// ── Availability ──

fn default_available() -> bool {
    true
}

/// A window in which a doctor accepts appointments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AvailabilitySlot {
    #[serde(default, deserialize_with = "entity_id")]
    pub id: Option<EntityId>,
    #[serde(default, deserialize_with = "reference")]
    pub doctor_id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub doctor_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

impl Payload for AvailabilityPayload {
    fn id(&self) -> Option<EntityId> {
        self.id
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc2822(raw).map(|dt| dt.date_naive()))
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

fn parse_time(raw: &str) -> Result<NaiveTime, ValidationError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ValidationError::InvalidTime(raw.to_string()))
}

impl Entity for AvailabilitySlot {
    type Payload = AvailabilityPayload;

    const KIND: EntityKind = EntityKind::Availability;

    fn blank() -> Self {
        AvailabilitySlot {
            id: None,
            doctor_id: String::new(),
            date: String::new(),
            start_time: String::new(),
            end_time: String::new(),
            is_available: true,
        }
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), FormError> {
        let slot = match field {
            "is_available" => {
                self.is_available = value.into_flag(field)?;
                return Ok(());
            }
            "doctor_id" => &mut self.doctor_id,
            "date" => &mut self.date,
            "start_time" => &mut self.start_time,
            "end_time" => &mut self.end_time,
            _ => {
                return Err(FormError::UnknownField {
                    kind: Self::KIND,
                    field: field.to_string(),
                })
            }
        };
        *slot = value.into_text(field)?;
        Ok(())
    }

    fn to_payload(&self, mode: Mode) -> Result<AvailabilityPayload, ValidationError> {
        let missing = missing_fields(&[
            ("doctor_id", self.doctor_id.as_str()),
            ("date", self.date.as_str()),
            ("start_time", self.start_time.as_str()),
            ("end_time", self.end_time.as_str()),
        ]);
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields {
                kind: Self::KIND,
                fields: missing,
            });
        }

        let date = parse_date(&self.date)?;
        let start_time = parse_time(&self.start_time)?;
        let end_time = parse_time(&self.end_time)?;
        if end_time <= start_time {
            return Err(ValidationError::EndBeforeStart);
        }

        Ok(AvailabilityPayload {
            id: match mode {
                Mode::Edit => self.id,
                Mode::Create => None,
            },
            doctor_id: self.doctor_id.clone(),
            date,
            start_time,
            end_time,
            is_available: self.is_available,
        })
    }

    fn from_payload(payload: AvailabilityPayload, id: EntityId) -> Self {
        AvailabilitySlot {
            id: Some(id),
            doctor_id: payload.doctor_id,
            date: payload.date.format("%Y-%m-%d").to_string(),
            start_time: payload.start_time.format("%H:%M").to_string(),
            end_time: payload.end_time.format("%H:%M").to_string(),
            is_available: payload.is_available,
        }
    }
}

// ── Users ──

/// A user identity, only used to fill the appointment user selector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserSummary {
    #[serde(deserialize_with = "reference")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserSummary {
    pub fn label(&self) -> String {
        format!("{} {} (ID: {})", self.name, self.last_name, self.id)
    }
}
