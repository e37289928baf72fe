use super::common::submission;
use crate::enrollment::domain::{FeeSchedule, RawAge, Sex, Tier};
use crate::enrollment::validation::{parse_age, EnrollmentGuard, ValidationError};

fn guard() -> EnrollmentGuard {
    EnrollmentGuard::issued_under("memory://pendaftaran/")
}

#[test]
fn valid_submission_computes_fee_from_schedule() {
    let fees = FeeSchedule {
        tier_tk: 800_000,
        ..FeeSchedule::default()
    };
    let applicant = guard()
        .applicant_from_submission(&submission(), &fees)
        .expect("valid submission");

    assert_eq!(applicant.tier, Tier::Tk);
    assert_eq!(applicant.sex, Sex::Male);
    assert_eq!(applicant.age, 5);
    assert_eq!(applicant.computed_fee, 800_000);
    assert_eq!(applicant.guardian_email, None);
}

#[test]
fn blank_required_field_is_reported_by_name() {
    let mut blank_mother = submission();
    blank_mother.mother_name = "   ".to_string();

    let err = guard()
        .applicant_from_submission(&blank_mother, &FeeSchedule::default())
        .expect_err("mother name is required");
    assert_eq!(
        err,
        ValidationError::MissingField {
            field: "mother_name"
        }
    );
}

#[test]
fn missing_age_is_a_missing_field() {
    let mut no_age = submission();
    no_age.age = None;
    assert_eq!(
        guard().applicant_from_submission(&no_age, &FeeSchedule::default()),
        Err(ValidationError::MissingField { field: "age" })
    );
}

#[test]
fn age_bounds_are_inclusive() {
    assert_eq!(parse_age(&RawAge::Number(2)), Ok(2));
    assert_eq!(parse_age(&RawAge::Number(18)), Ok(18));
    assert_eq!(
        parse_age(&RawAge::Number(1)),
        Err(ValidationError::AgeOutOfRange { found: 1 })
    );
    assert_eq!(
        parse_age(&RawAge::Number(19)),
        Err(ValidationError::AgeOutOfRange { found: 19 })
    );
}

#[test]
fn text_ages_are_parsed_or_rejected() {
    assert_eq!(parse_age(&RawAge::Text(" 7 ".to_string())), Ok(7));
    assert_eq!(
        parse_age(&RawAge::Text("tujuh".to_string())),
        Err(ValidationError::InvalidAge {
            raw: "tujuh".to_string()
        })
    );
    assert_eq!(
        parse_age(&RawAge::Text(String::new())),
        Err(ValidationError::MissingField { field: "age" })
    );
}

#[test]
fn unknown_tier_and_sex_are_rejected() {
    let mut bad_tier = submission();
    bad_tier.tier = "SMA".to_string();
    assert_eq!(
        guard().applicant_from_submission(&bad_tier, &FeeSchedule::default()),
        Err(ValidationError::UnknownTier)
    );

    let mut bad_sex = submission();
    bad_sex.sex = "x".to_string();
    assert_eq!(
        guard().applicant_from_submission(&bad_sex, &FeeSchedule::default()),
        Err(ValidationError::UnknownSex)
    );
}

#[test]
fn blank_optional_fields_become_none() {
    let mut blanks = submission();
    blanks.guardian_email = Some("  ".to_string());
    blanks.document_url = Some(String::new());

    let applicant = guard()
        .applicant_from_submission(&blanks, &FeeSchedule::default())
        .expect("optional fields may be blank");
    assert_eq!(applicant.guardian_email, None);
    assert_eq!(applicant.document_url, None);
}

#[test]
fn submission_accepts_numeric_or_text_age_in_json() {
    let payload = serde_json::json!({
        "applicant_name": "Siti",
        "age": "6",
        "tier": "KB"
    });
    let parsed: crate::enrollment::domain::EnrollmentSubmission =
        serde_json::from_value(payload).expect("lenient payload");
    assert_eq!(parsed.age, Some(RawAge::Text("6".to_string())));
    assert_eq!(parsed.mother_name, "");
    assert!(!parsed.acknowledge_missing_document);
}

#[test]
fn document_links_must_come_from_the_enrollment_bucket() {
    let mut scripted = submission();
    scripted.document_url = Some("javascript:alert(document.cookie)".to_string());
    assert_eq!(
        guard().applicant_from_submission(&scripted, &FeeSchedule::default()),
        Err(ValidationError::UntrustedDocument {
            url: "javascript:alert(document.cookie)".to_string()
        })
    );

    for foreign in [
        "https://elsewhere.example/kk.png",
        "memory://images/kk.png",
        "memory://pendaftaran/",
        "memory://pendaftaran/../images/kk.png",
        "memory://pendaftaran/kk.png\" onerror=\"alert(1)",
    ] {
        let mut payload = submission();
        payload.document_url = Some(foreign.to_string());
        assert!(
            matches!(
                guard().applicant_from_submission(&payload, &FeeSchedule::default()),
                Err(ValidationError::UntrustedDocument { .. })
            ),
            "{foreign} should be refused"
        );
    }
}

#[test]
fn guard_without_prefix_still_requires_http_links() {
    let mut payload = submission();
    payload.document_url = Some("https://cdn.amalianur.id/pendaftaran/kk.png".to_string());
    let applicant = EnrollmentGuard::default()
        .applicant_from_submission(&payload, &FeeSchedule::default())
        .expect("https link accepted");
    assert_eq!(
        applicant.document_url.as_deref(),
        Some("https://cdn.amalianur.id/pendaftaran/kk.png")
    );

    payload.document_url = Some("data:text/html,<b>x</b>".to_string());
    assert!(EnrollmentGuard::default()
        .applicant_from_submission(&payload, &FeeSchedule::default())
        .is_err());
}
