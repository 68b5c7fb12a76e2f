//! Request payload validation.
//!
//! Each form deserializes leniently (every field optional) and is then
//! cleaned into a domain value or a set of field-level errors that the HTTP
//! layer returns as `422 {"errors": {...}}`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::domain::aggregates::{Fulfilment, PickUpDetail, ShippingAddress, Urgency};

pub const USERNAME_MAX_LENGTH: u64 = 150;

/// Key for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "__all__";

const PICKUP_DATE_FORMATS: &[&str] = &["%Y-%m-%d %I:%M %p", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Field name to messages, serialized as the body of a 422 response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self { Self::default() }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn contains(&self, field: &str) -> bool { self.0.contains_key(field) }
    pub fn fields(&self) -> impl Iterator<Item = &str> { self.0.keys().map(String::as_str) }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::new();
        for (field, list) in errors.field_errors() {
            for error in list {
                out.add(field, error.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| default_message(&error.code)));
            }
        }
        out
    }
}

fn default_message(code: &str) -> String {
    match code {
        "required" => "This field is required.".to_string(),
        "email" => "Enter a valid email address.".to_string(),
        "length" => "Ensure this value has a valid length.".to_string(),
        other => format!("Invalid value ({other})."),
    }
}

fn validation_errors(result: Result<(), ValidationErrors>) -> FormErrors {
    result.err().map(FormErrors::from).unwrap_or_default()
}

/// Surrounding whitespace is dropped and a blank value counts as missing.
fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
}

fn text(value: Option<String>) -> String { value.unwrap_or_default().trim().to_string() }

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parses the pickup time formats the storefront's date picker and API clients send.
pub fn parse_pickup_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    PICKUP_DATE_FORMATS.iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_utc()))
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ShippingAddressForm {
    #[validate(required, email, length(max = 50))]
    #[serde(default, deserialize_with = "trimmed")]
    pub email: Option<String>,
    #[validate(required, length(min = 1, max = 20))]
    #[serde(default, deserialize_with = "trimmed")]
    pub phone: Option<String>,
    #[validate(required, length(min = 1, max = 50))]
    #[serde(default, deserialize_with = "trimmed")]
    pub first_name: Option<String>,
    #[validate(required, length(min = 1, max = 50))]
    #[serde(default, deserialize_with = "trimmed")]
    pub last_name: Option<String>,
    #[validate(required, length(min = 1, max = 100))]
    #[serde(default, deserialize_with = "trimmed")]
    pub address_1: Option<String>,
    #[validate(length(max = 100))]
    #[serde(default, deserialize_with = "trimmed")]
    pub address_2: Option<String>,
    #[validate(required, length(min = 1, max = 50))]
    #[serde(default, deserialize_with = "trimmed")]
    pub city: Option<String>,
    #[validate(required, length(min = 1, max = 50))]
    #[serde(default, deserialize_with = "trimmed")]
    pub state: Option<String>,
    #[validate(length(max = 20))]
    #[serde(default, deserialize_with = "trimmed")]
    pub zipcode: Option<String>,
    #[validate(required, length(min = 1, max = 50))]
    #[serde(default, deserialize_with = "trimmed")]
    pub country: Option<String>,
}

impl ShippingAddressForm {
    pub fn clean(self) -> Result<ShippingAddress, FormErrors> {
        validation_errors(self.validate()).into_result(|| ShippingAddress {
            email: text(self.email),
            phone: text(self.phone),
            first_name: text(self.first_name),
            last_name: text(self.last_name),
            address_1: text(self.address_1),
            address_2: optional_text(self.address_2),
            city: text(self.city),
            state: text(self.state),
            zipcode: optional_text(self.zipcode),
            country: text(self.country),
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PickUpDetailForm {
    #[validate(required, email, length(max = 50))]
    #[serde(default, deserialize_with = "trimmed")]
    pub email: Option<String>,
    #[validate(required, length(min = 1, max = 20))]
    #[serde(default, deserialize_with = "trimmed")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    pub urgency: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    pub pickup_date: Option<String>,
}

impl PickUpDetailForm {
    pub fn clean(self) -> Result<PickUpDetail, FormErrors> {
        let mut errors = validation_errors(self.validate());
        let urgency = match self.urgency.as_deref().map(str::trim) {
            None | Some("") => { errors.add("urgency", "This field is required."); None }
            Some(value) => {
                let parsed = Urgency::parse(value);
                if parsed.is_none() {
                    errors.add("urgency", format!("Select a valid choice. {value} is not one of the available choices."));
                }
                parsed
            }
        };
        let pickup_date = match self.pickup_date.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => {
                let parsed = parse_pickup_date(value);
                if parsed.is_none() { errors.add("pickup_date", "Enter a valid date/time."); }
                parsed
            }
            None => None,
        };
        if urgency == Some(Urgency::Custom) && pickup_date.is_none() && !errors.contains("pickup_date") {
            errors.add("pickup_date", "A pickup time is required for a scheduled order.");
        }
        errors.into_result(|| PickUpDetail {
            email: text(self.email),
            phone: text(self.phone),
            urgency: urgency.unwrap_or(Urgency::Asap),
            pickup_date: pickup_date.filter(|_| urgency == Some(Urgency::Custom)),
        })
    }
}

/// Body of both checkout endpoints, discriminated by `delivery`.
#[derive(Debug)]
pub enum CheckoutForm {
    Delivery(ShippingAddressForm),
    CarryOut(PickUpDetailForm),
}

#[derive(Debug, PartialEq, Eq)]
pub enum CheckoutPayloadError {
    /// No JSON object with a boolean `delivery` key.
    Missing,
    Invalid(FormErrors),
}

impl CheckoutForm {
    pub fn parse(body: &[u8]) -> Result<Self, CheckoutPayloadError> {
        let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| CheckoutPayloadError::Missing)?;
        let delivery = value.get("delivery").and_then(serde_json::Value::as_bool).ok_or(CheckoutPayloadError::Missing)?;
        let invalid = |e: serde_json::Error| CheckoutPayloadError::Invalid(FormErrors::single(NON_FIELD_ERRORS, e.to_string()));
        if delivery {
            serde_json::from_value(value).map(Self::Delivery).map_err(invalid)
        } else {
            serde_json::from_value(value).map(Self::CarryOut).map_err(invalid)
        }
    }

    pub fn clean(self) -> Result<Fulfilment, FormErrors> {
        match self {
            Self::Delivery(form) => form.clean().map(Fulfilment::Delivery),
            Self::CarryOut(form) => form.clean().map(Fulfilment::CarryOut),
        }
    }
}

// =============================================================================
// Coupon
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CouponForm {
    #[validate(required, length(min = 1, max = 50))]
    #[serde(default, deserialize_with = "trimmed")]
    pub code: Option<String>,
}

impl CouponForm {
    pub fn clean(self) -> Result<String, FormErrors> {
        validation_errors(self.validate()).into_result(|| text(self.code))
    }
}

// =============================================================================
// Accounts
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(required, length(min = 1, max = 150), custom = "validate_username")]
    #[serde(default, deserialize_with = "trimmed")]
    pub username: Option<String>,
    #[validate(required, email, length(max = 254))]
    #[serde(default, deserialize_with = "trimmed")]
    pub email: Option<String>,
    #[validate(required, length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub password1: Option<String>,
    #[validate(required)]
    pub password2: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration { pub username: String, pub email: String, pub password: String }

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c)) {
        Ok(())
    } else {
        let mut error = ValidationError::new("username");
        error.message = Some("Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.".into());
        Err(error)
    }
}

impl RegisterForm {
    pub fn clean(self) -> Result<Registration, FormErrors> {
        let mut errors = validation_errors(self.validate());
        let password = self.password1.unwrap_or_default();
        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            errors.add("password1", "This password is entirely numeric.");
        }
        if self.password2.as_deref().is_some_and(|confirm| confirm != password) {
            errors.add("password2", "The two password fields didn't match.");
        }
        errors.into_result(|| Registration { username: text(self.username), email: text(self.email).to_lowercase(), password })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(required, length(min = 1))]
    #[serde(default, deserialize_with = "trimmed")]
    pub username: Option<String>,
    #[validate(required, length(min = 1))]
    pub password: Option<String>,
}

impl LoginForm {
    pub fn clean(self) -> Result<(String, String), FormErrors> {
        validation_errors(self.validate()).into_result(|| (text(self.username), self.password.unwrap_or_default()))
    }
}

// =============================================================================
// Form descriptions served on GET
// =============================================================================

#[derive(Clone, Copy, Debug, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

const fn field(name: &'static str, kind: &'static str, required: bool, max_length: Option<u64>) -> FieldSpec {
    FieldSpec { name, kind, required, max_length }
}

pub const COUPON_FORM: &[FieldSpec] = &[field("code", "text", true, Some(50))];

pub const REGISTER_FORM: &[FieldSpec] = &[
    field("username", "text", true, Some(USERNAME_MAX_LENGTH)),
    field("email", "email", true, Some(254)),
    field("password1", "password", true, None),
    field("password2", "password", true, None),
];

pub const LOGIN_FORM: &[FieldSpec] = &[
    field("username", "text", true, Some(USERNAME_MAX_LENGTH)),
    field("password", "password", true, None),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delivery(overrides: serde_json::Value) -> Result<Fulfilment, FormErrors> {
        let mut body = json!({
            "delivery": true, "email": "test@example.com", "phone": "12345678",
            "first_name": "first name", "last_name": "last name", "address_1": "address 1",
            "city": "city", "state": "state", "country": "country",
        });
        if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra { base.insert(k.clone(), v.clone()); }
        }
        CheckoutForm::parse(body.to_string().as_bytes()).unwrap().clean()
    }

    fn checkout(body: serde_json::Value) -> Result<Fulfilment, FormErrors> {
        CheckoutForm::parse(body.to_string().as_bytes()).unwrap().clean()
    }

    #[test]
    fn test_missing_payload() {
        assert_eq!(CheckoutForm::parse(b"").unwrap_err(), CheckoutPayloadError::Missing);
        assert_eq!(CheckoutForm::parse(b"{\"email\": \"a@b.c\"}").unwrap_err(), CheckoutPayloadError::Missing);
        assert_eq!(CheckoutForm::parse(b"{\"delivery\": \"yes\"}").unwrap_err(), CheckoutPayloadError::Missing);
    }

    #[test]
    fn test_wrong_field_type_is_invalid() {
        let err = CheckoutForm::parse(br#"{"delivery": true, "phone": 1234}"#).unwrap_err();
        assert!(matches!(err, CheckoutPayloadError::Invalid(e) if e.contains(NON_FIELD_ERRORS)));
    }

    #[test]
    fn test_valid_delivery() {
        let Fulfilment::Delivery(address) = delivery(json!({})).unwrap() else { panic!("expected delivery") };
        assert_eq!(address.city, "city");
        assert_eq!(address.address_2, None);
    }

    #[test]
    fn test_delivery_missing_fields() {
        let body = json!({"delivery": true, "email": "test@example.com", "phone": "1234567", "address_1": "address 1"});
        let errors = checkout(body).unwrap_err();
        for f in ["first_name", "last_name", "city", "state", "country"] {
            assert!(errors.contains(f), "{f} should be reported");
        }
        assert!(!errors.contains("address_1"));
    }

    #[test]
    fn test_blank_fields_count_as_missing() {
        let errors = delivery(json!({"phone": "   ", "first_name": "  ", "city": "\t", "country": " "})).unwrap_err();
        for f in ["phone", "first_name", "city", "country"] {
            assert!(errors.contains(f), "{f} should be reported");
        }
        let errors = checkout(json!({"delivery": false, "email": "test@example.com", "phone": "   ", "urgency": "asap"})).unwrap_err();
        assert!(errors.contains("phone"));
        assert!(CouponForm { code: None }.clean().unwrap_err().contains("code"));

        let Fulfilment::Delivery(address) = delivery(json!({"city": "  Naples  "})).unwrap() else { panic!("expected delivery") };
        assert_eq!(address.city, "Naples");
    }

    #[test]
    fn test_delivery_length_limits() {
        let errors = delivery(json!({"phone": "12345671234567123456712345671234567123"})).unwrap_err();
        assert!(errors.contains("phone"));
        let errors = delivery(json!({"email": "testtesttesttesttestesttestestteststteststtestesttesttesttesttettest@example.com"})).unwrap_err();
        assert!(errors.contains("email"));
        let errors = delivery(json!({"email": "not an email"})).unwrap_err();
        assert!(errors.contains("email"));
    }

    #[test]
    fn test_pickup_urgency() {
        let ok = checkout(json!({"delivery": false, "email": "test@example.com", "phone": "12345678", "urgency": "asap", "pickup_date": "2023-02-02 2:00 PM"})).unwrap();
        let Fulfilment::CarryOut(detail) = ok else { panic!("expected carry out") };
        assert_eq!(detail.urgency, Urgency::Asap);
        assert_eq!(detail.pickup_date, None);

        let errors = checkout(json!({"delivery": false, "email": "test@example.com", "phone": "12345678", "urgency": "wrong urgency"})).unwrap_err();
        assert!(errors.contains("urgency"));
        let errors = checkout(json!({"delivery": false, "email": "test@example.com", "phone": "12345678"})).unwrap_err();
        assert!(errors.contains("urgency"));
    }

    #[test]
    fn test_custom_pickup_requires_date() {
        let base = |date: Option<&str>| {
            let mut body = json!({"delivery": false, "email": "test@example.com", "phone": "12345678", "urgency": "custom"});
            if let Some(d) = date { body["pickup_date"] = json!(d); }
            checkout(body)
        };
        assert!(base(None).unwrap_err().contains("pickup_date"));
        assert!(base(Some("wrong date")).unwrap_err().contains("pickup_date"));
        let Fulfilment::CarryOut(detail) = base(Some("2023-02-02 2:00 PM")).unwrap() else { panic!("expected carry out") };
        assert_eq!(detail.pickup_date.unwrap().format("%Y-%m-%d %H:%M").to_string(), "2023-02-02 14:00");
    }

    #[test]
    fn test_pickup_date_formats() {
        assert!(parse_pickup_date("2023-02-02 14:00").is_some());
        assert!(parse_pickup_date("2023-02-02T14:00").is_some());
        assert!(parse_pickup_date("2023-02-02T14:00:00+01:00").is_some());
        assert!(parse_pickup_date("tomorrow").is_none());
    }

    #[test]
    fn test_register_form() {
        let form = RegisterForm { username: Some("mario".into()), email: Some("Mario@Example.com".into()), password1: Some("s3cret-pie".into()), password2: Some("s3cret-pie".into()) };
        let reg = form.clean().unwrap();
        assert_eq!(reg.email, "mario@example.com");

        let form = RegisterForm { username: Some("bad name!".into()), email: Some("x@example.com".into()), password1: Some("12345678".into()), password2: Some("87654321".into()) };
        let errors = form.clean().unwrap_err();
        assert!(errors.contains("username"));
        assert!(errors.contains("password1"));
        assert!(errors.contains("password2"));
    }

    #[test]
    fn test_errors_serialize_as_map() {
        let errors = FormErrors::single("code", "Invalid coupon");
        assert_eq!(serde_json::to_value(&errors).unwrap(), json!({"code": ["Invalid coupon"]}));
    }
}
