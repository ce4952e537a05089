//! Process-wide settings.
//!
//! [`Settings`] is meant to be filled in during start-up, before other
//! threads begin connecting or parsing. Each setter is atomic with respect
//! to readers (the whole record sits behind one lock), but sequences of
//! setters are not: callers reconfiguring a running process must bring their
//! own synchronization.

use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Representation used for parsed datetime values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
pub enum TemporalKind {
    /// An absolute point in time with a UTC offset.
    #[default]
    #[serde(rename = "instant")]
    #[value(alias = "time")]
    Instant,
    /// A wall-clock date and time, two-digit years windowed.
    #[serde(rename = "civil_datetime")]
    #[value(name = "civil_datetime", alias = "datetime")]
    CivilDateTime,
}

/// Timezone used when a timestamp carries no offset of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timezone {
    Local,
    Utc,
}

/// Case conversion applied to identifiers on their way in or out of the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierCase {
    Upcase,
    Downcase,
}

impl IdentifierCase {
    #[must_use]
    pub fn apply(self, identifier: &str) -> String {
        match self {
            IdentifierCase::Upcase => identifier.to_uppercase(),
            IdentifierCase::Downcase => identifier.to_lowercase(),
        }
    }
}

/// A consistent copy of every setting, taken at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSnapshot {
    pub convert_two_digit_years: bool,
    pub datetime_class: TemporalKind,
    pub application_timezone: Option<Timezone>,
    pub database_timezone: Option<Timezone>,
    pub typecast_timezone: Option<Timezone>,
    pub identifier_input_method: Option<IdentifierCase>,
    pub identifier_output_method: Option<IdentifierCase>,
    pub quote_identifiers: Option<bool>,
    pub single_threaded: bool,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            convert_two_digit_years: true,
            datetime_class: TemporalKind::Instant,
            application_timezone: None,
            database_timezone: None,
            typecast_timezone: None,
            identifier_input_method: None,
            identifier_output_method: None,
            quote_identifiers: None,
            single_threaded: false,
        }
    }
}

impl SettingsSnapshot {
    /// The subset handed to connection factories with every new handle.
    #[must_use]
    pub fn database_defaults(&self) -> DatabaseDefaults {
        DatabaseDefaults {
            identifier_input_method: self.identifier_input_method,
            identifier_output_method: self.identifier_output_method,
            quote_identifiers: self.quote_identifiers,
            single_threaded: self.single_threaded,
        }
    }
}

/// Per-connection defaults derived from [`Settings`] when a handle is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DatabaseDefaults {
    pub identifier_input_method: Option<IdentifierCase>,
    pub identifier_output_method: Option<IdentifierCase>,
    pub quote_identifiers: Option<bool>,
    pub single_threaded: bool,
}

impl DatabaseDefaults {
    /// `identifier` as it should be sent to the database.
    #[must_use]
    pub fn input_identifier(&self, identifier: &str) -> String {
        convert_case(self.identifier_input_method, identifier)
    }

    /// `identifier` as the database returned it, converted for callers.
    #[must_use]
    pub fn output_identifier(&self, identifier: &str) -> String {
        convert_case(self.identifier_output_method, identifier)
    }
}

fn convert_case(case: Option<IdentifierCase>, identifier: &str) -> String {
    case.map_or_else(|| identifier.to_string(), |case| case.apply(identifier))
}

/// Shared, lock-protected settings record.
#[derive(Debug, Default)]
pub struct Settings {
    inner: RwLock<SettingsSnapshot>,
}

macro_rules! setting_accessors {
    ($($(#[$doc:meta])* $field:ident, $setter:ident: $ty:ty;)*) => {
        impl Settings {
            $(
                $(#[$doc])*
                #[must_use]
                pub fn $field(&self) -> $ty {
                    self.read().$field
                }

                pub fn $setter(&self, value: $ty) {
                    self.update(|s| s.$field = value);
                }
            )*
        }
    };
}

setting_accessors! {
    /// Whether one- and two-digit years are mapped into 1969..=2068 when parsing dates.
    convert_two_digit_years, set_convert_two_digit_years: bool;
    /// Representation produced by datetime parsing.
    datetime_class, set_datetime_class: TemporalKind;
    application_timezone, set_application_timezone: Option<Timezone>;
    database_timezone, set_database_timezone: Option<Timezone>;
    /// Timezone assumed for parsed timestamps without an explicit offset.
    typecast_timezone, set_typecast_timezone: Option<Timezone>;
    identifier_input_method, set_identifier_input_method: Option<IdentifierCase>;
    identifier_output_method, set_identifier_output_method: Option<IdentifierCase>;
    /// `None` lets each adapter pick its own quoting default.
    quote_identifiers, set_quote_identifiers: Option<bool>;
    /// Skip the process-wide mutex in `Toolkit::synchronize`.
    single_threaded, set_single_threaded: bool;
}

impl Settings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn load(snapshot: SettingsSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    /// Build settings from a JSON object; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an `Argument` error if the document is not a valid settings object.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: SettingsSnapshot = serde_json::from_str(json)
            .map_err(|e| DomainError::argument(format!("invalid settings document: {e}")))?;
        Ok(Self::load(snapshot))
    }

    #[must_use]
    pub fn snapshot(&self) -> SettingsSnapshot {
        *self.read()
    }

    /// Replace every setting at once.
    pub fn replace(&self, snapshot: SettingsSnapshot) {
        self.update(|s| *s = snapshot);
    }

    /// Set the application, database and typecast timezones together.
    pub fn set_default_timezone(&self, tz: Option<Timezone>) {
        self.update(|s| {
            s.application_timezone = tz;
            s.database_timezone = tz;
            s.typecast_timezone = tz;
        });
    }

    /// Set a setting from its textual form, e.g. `apply("datetime_class", "datetime")`.
    ///
    /// Optional settings accept `nil`, `none` or an empty string to clear them.
    ///
    /// # Errors
    ///
    /// Returns an `Argument` error for an unknown name or a value that cannot
    /// be coerced to the setting's type.
    pub fn apply(&self, name: &str, value: &str) -> Result<()> {
        match name {
            "convert_two_digit_years" => {
                self.set_convert_two_digit_years(coerce_bool(name, value)?);
            }
            "datetime_class" => self.set_datetime_class(coerce_enum(name, value)?),
            "application_timezone" => self.set_application_timezone(coerce_optional(name, value)?),
            "database_timezone" => self.set_database_timezone(coerce_optional(name, value)?),
            "typecast_timezone" => self.set_typecast_timezone(coerce_optional(name, value)?),
            "default_timezone" => self.set_default_timezone(coerce_optional(name, value)?),
            "identifier_input_method" => {
                self.set_identifier_input_method(coerce_optional(name, value)?);
            }
            "identifier_output_method" => {
                self.set_identifier_output_method(coerce_optional(name, value)?);
            }
            "quote_identifiers" => {
                let quote = if is_nil(value) {
                    None
                } else {
                    Some(coerce_bool(name, value)?)
                };
                self.set_quote_identifiers(quote);
            }
            "single_threaded" => self.set_single_threaded(coerce_bool(name, value)?),
            _ => return Err(DomainError::argument(format!("unknown setting: {name}"))),
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, SettingsSnapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut SettingsSnapshot)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut guard);
        tracing::trace!(settings = ?*guard, "settings updated");
    }
}

fn is_nil(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("nil") || value.eq_ignore_ascii_case("none")
}

fn coerce_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
        _ => Err(invalid_setting(name, value, "expected a boolean")),
    }
}

fn coerce_enum<T: ValueEnum>(name: &str, value: &str) -> Result<T> {
    <T as ValueEnum>::from_str(value.trim(), true).map_err(|e| invalid_setting(name, value, &e))
}

fn coerce_optional<T: ValueEnum>(name: &str, value: &str) -> Result<Option<T>> {
    if is_nil(value) {
        Ok(None)
    } else {
        coerce_enum(name, value).map(Some)
    }
}

fn invalid_setting(name: &str, value: &str, reason: &str) -> DomainError {
    DomainError::argument(format!("invalid value {value:?} for setting {name}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults() {
        let settings = Settings::new();
        assert!(settings.convert_two_digit_years());
        assert_eq!(settings.datetime_class(), TemporalKind::Instant);
        assert_eq!(settings.typecast_timezone(), None);
        assert!(!settings.single_threaded());
    }

    #[test]
    fn apply_coerces_text() {
        let settings = Settings::new();
        settings.apply("convert_two_digit_years", "off").unwrap();
        settings.apply("datetime_class", "datetime").unwrap();
        settings.apply("default_timezone", "UTC").unwrap();
        settings.apply("identifier_input_method", "upcase").unwrap();
        settings.apply("quote_identifiers", "nil").unwrap();

        let snap = settings.snapshot();
        assert!(!snap.convert_two_digit_years);
        assert_eq!(snap.datetime_class, TemporalKind::CivilDateTime);
        assert_eq!(snap.application_timezone, Some(Timezone::Utc));
        assert_eq!(snap.database_timezone, Some(Timezone::Utc));
        assert_eq!(snap.typecast_timezone, Some(Timezone::Utc));
        assert_eq!(snap.identifier_input_method, Some(IdentifierCase::Upcase));
        assert_eq!(snap.quote_identifiers, None);
    }

    #[test]
    fn apply_rejects_bad_input() {
        let settings = Settings::new();
        let err = settings.apply("convert_two_digit_years", "maybe").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        let err = settings.apply("no_such_setting", "1").unwrap_err();
        assert_eq!(err.message(), "unknown setting: no_such_setting");
        assert!(settings.apply("datetime_class", "sundial").is_err());
        assert!(settings.convert_two_digit_years());
    }

    #[test]
    fn json_keeps_missing_defaults() {
        let settings =
            Settings::from_json(r#"{"datetime_class": "civil_datetime", "single_threaded": true}"#)
                .unwrap();
        let snap = settings.snapshot();
        assert_eq!(snap.datetime_class, TemporalKind::CivilDateTime);
        assert!(snap.single_threaded);
        assert!(snap.convert_two_digit_years);
        assert!(Settings::from_json("[1, 2]").is_err());
    }

    #[test]
    fn identifier_case() {
        assert_eq!(IdentifierCase::Upcase.apply("users"), "USERS");
        assert_eq!(IdentifierCase::Downcase.apply("Users"), "users");

        let defaults = DatabaseDefaults {
            identifier_input_method: Some(IdentifierCase::Upcase),
            ..DatabaseDefaults::default()
        };
        assert_eq!(defaults.input_identifier("users"), "USERS");
        assert_eq!(defaults.output_identifier("USERS"), "USERS");
    }
}
