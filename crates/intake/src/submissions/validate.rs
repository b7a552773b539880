//! Declarative per-field validation and sanitization for inbound payloads.
//!
//! Rules mirror the public intake forms: required presence, email/phone
//! format checks, and HTML entity escaping for text destined for later
//! rendering. Violations are collected across all fields before returning so
//! a client can fix everything in one pass.

use super::domain::{
    NewPatientRequest, NewProviderApplication, PatientIntake, ProviderIntake, Urgency,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Phone,
}

/// Validation rule applied to a single field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    required: bool,
    kind: FieldKind,
    escape: bool,
}

impl FieldRule {
    pub const fn text() -> Self {
        Self {
            required: false,
            kind: FieldKind::Text,
            escape: false,
        }
    }

    pub const fn email() -> Self {
        Self {
            required: false,
            kind: FieldKind::Email,
            escape: false,
        }
    }

    pub const fn phone() -> Self {
        Self {
            required: false,
            kind: FieldKind::Phone,
            escape: false,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn escaped(mut self) -> Self {
        self.escape = true;
        self
    }
}

/// Apply a rule to a raw value, pushing any violation onto `errors`.
///
/// Returns the sanitized value, or `None` when the field is absent or
/// rejected; rejected fields never reach the sanitized output.
pub fn apply(
    field: &str,
    value: Option<&str>,
    rule: FieldRule,
    errors: &mut Vec<String>,
) -> Option<String> {
    let trimmed = value.map(str::trim).filter(|v| !v.is_empty());
    let Some(raw) = trimmed else {
        if rule.required {
            errors.push(format!("{field} is required"));
        }
        return None;
    };

    match rule.kind {
        FieldKind::Email => {
            if !is_valid_email(raw) {
                errors.push(format!("{field} must be a valid email"));
                return None;
            }
        }
        FieldKind::Phone => {
            if !is_valid_phone(raw) {
                errors.push(format!("{field} must be a valid phone number"));
                return None;
            }
        }
        FieldKind::Text => {}
    }

    Some(if rule.escape {
        escape_html(raw)
    } else {
        raw.to_string()
    })
}

/// `local@domain.tld` shape: one `@` with a non-empty local part, a dot with
/// non-empty segments somewhere after it, and no whitespace anywhere.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Digits plus common phone punctuation, with at least one digit.
pub fn is_valid_phone(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit())
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'))
}

/// HTML entity escaping for text rendered in admin views and emails.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Validate and sanitize a raw patient-assistance payload.
pub fn patient_request(intake: PatientIntake) -> Result<NewPatientRequest, Vec<String>> {
    let mut errors = Vec::new();

    let name = apply(
        "name",
        intake.name.as_deref(),
        FieldRule::text().required().escaped(),
        &mut errors,
    );
    let email = apply(
        "email",
        intake.email.as_deref(),
        FieldRule::email().required(),
        &mut errors,
    );
    let phone = apply("phone", intake.phone.as_deref(), FieldRule::phone(), &mut errors);
    let location = apply(
        "location",
        intake.location.as_deref(),
        FieldRule::text().required().escaped(),
        &mut errors,
    );
    let wound_type = apply(
        "wound_type",
        intake.wound_type.as_deref(),
        FieldRule::text().escaped(),
        &mut errors,
    );
    let message = apply(
        "message",
        intake.message.as_deref(),
        FieldRule::text().escaped(),
        &mut errors,
    );

    let urgency = match intake.urgency.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        None => Urgency::default(),
        Some(raw) => match Urgency::parse(raw) {
            Some(urgency) => urgency,
            None => {
                errors.push("urgency must be one of low, medium, high, emergency".to_string());
                Urgency::default()
            }
        },
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewPatientRequest {
        name: name.expect("required field present after validation"),
        email: email.expect("required field present after validation"),
        phone,
        location: location.expect("required field present after validation"),
        wound_type,
        urgency,
        message,
    })
}

/// Validate and sanitize a raw provider application payload.
pub fn provider_application(intake: ProviderIntake) -> Result<NewProviderApplication, Vec<String>> {
    let mut errors = Vec::new();

    let name = apply(
        "name",
        intake.name.as_deref(),
        FieldRule::text().required().escaped(),
        &mut errors,
    );
    let email = apply(
        "email",
        intake.email.as_deref(),
        FieldRule::email().required(),
        &mut errors,
    );
    let phone = apply(
        "phone",
        intake.phone.as_deref(),
        FieldRule::phone().required(),
        &mut errors,
    );
    let credentials = apply(
        "credentials",
        intake.credentials.as_deref(),
        FieldRule::text().required().escaped(),
        &mut errors,
    );
    let location = apply(
        "location",
        intake.location.as_deref(),
        FieldRule::text().required().escaped(),
        &mut errors,
    );

    let specialties: Vec<String> = intake
        .specialties
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(escape_html)
        .collect();

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewProviderApplication {
        name: name.expect("required field present after validation"),
        email: email.expect("required field present after validation"),
        phone: phone.expect("required field present after validation"),
        credentials: credentials.expect("required field present after validation"),
        specialties,
        location: location.expect("required field present after validation"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_field_is_reported_and_omitted() {
        let mut errors = Vec::new();
        let value = apply("name", None, FieldRule::text().required(), &mut errors);
        assert!(value.is_none());
        assert_eq!(errors, vec!["name is required".to_string()]);
    }

    #[test]
    fn absent_optional_field_is_skipped_silently() {
        let mut errors = Vec::new();
        let value = apply("phone", None, FieldRule::phone(), &mut errors);
        assert!(value.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn email_shapes() {
        for accepted in ["a@b.c", "jane.doe@example.com", "x@sub.domain.org"] {
            assert!(is_valid_email(accepted), "{accepted} should pass");
        }
        for rejected in ["plain", "no@dot", "spa ce@b.c", "@b.c", "a@.c", "a@b.", "a@@b.c"] {
            assert!(!is_valid_email(rejected), "{rejected} should fail");
        }
    }

    #[test]
    fn phone_charset() {
        assert!(is_valid_phone("+1 (512) 555-0100"));
        assert!(!is_valid_phone("call me"));
        assert!(!is_valid_phone("+()- "));
    }

    #[test]
    fn escaping_covers_all_entities() {
        assert_eq!(
            escape_html(r#"<b>"Tom & Jerry's"</b>"#),
            "&lt;b&gt;&quot;Tom &amp; Jerry&#x27;s&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn violations_are_collected_not_short_circuited() {
        let errors = patient_request(PatientIntake {
            email: Some("not-an-email".to_string()),
            phone: Some("letters".to_string()),
            ..PatientIntake::default()
        })
        .expect_err("invalid payload");
        assert!(errors.contains(&"name is required".to_string()));
        assert!(errors.contains(&"email must be a valid email".to_string()));
        assert!(errors.contains(&"phone must be a valid phone number".to_string()));
        assert!(errors.contains(&"location is required".to_string()));
    }

    #[test]
    fn patient_payload_sanitizes_and_defaults_urgency() {
        let request = patient_request(PatientIntake {
            name: Some("  Jane <Doe>  ".to_string()),
            email: Some("jane@example.com".to_string()),
            location: Some("Austin, TX".to_string()),
            ..PatientIntake::default()
        })
        .expect("valid payload");
        assert_eq!(request.name, "Jane &lt;Doe&gt;");
        assert_eq!(request.urgency, Urgency::Medium);
        assert!(request.phone.is_none());
    }

    #[test]
    fn unknown_urgency_is_rejected() {
        let errors = patient_request(PatientIntake {
            name: Some("Jane".to_string()),
            email: Some("jane@example.com".to_string()),
            location: Some("Austin, TX".to_string()),
            urgency: Some("critical".to_string()),
            ..PatientIntake::default()
        })
        .expect_err("bad urgency");
        assert_eq!(
            errors,
            vec!["urgency must be one of low, medium, high, emergency".to_string()]
        );
    }

    #[test]
    fn provider_payload_requires_phone_and_credentials() {
        let errors = provider_application(ProviderIntake {
            name: Some("Dr. Smith".to_string()),
            email: Some("smith@clinic.org".to_string()),
            location: Some("Denver, CO".to_string()),
            ..ProviderIntake::default()
        })
        .expect_err("incomplete application");
        assert!(errors.contains(&"phone is required".to_string()));
        assert!(errors.contains(&"credentials is required".to_string()));
    }

    #[test]
    fn provider_specialties_are_trimmed_and_may_be_empty() {
        let application = provider_application(ProviderIntake {
            name: Some("Dr. Smith".to_string()),
            email: Some("smith@clinic.org".to_string()),
            phone: Some("555-0100".to_string()),
            credentials: Some("MD, CWS".to_string()),
            location: Some("Denver, CO".to_string()),
            specialties: vec![" wound care ".to_string(), "  ".to_string()],
        })
        .expect("valid application");
        assert_eq!(application.specialties, vec!["wound care".to_string()]);
    }
}
