//! End-to-end tests for building, storing and filling forms.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use form_schema::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn age_form() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("dob", FieldType::Date, "Date of birth").required(true),
        FieldDefinition::derived(
            "age",
            FieldType::Number,
            "Age",
            DerivedSpec::AgeFromDob {
                parent_field: "dob".into(),
            },
        ),
    ]
}

fn signup_form() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("first", FieldType::Text, "First name").required(true),
        FieldDefinition::new("last", FieldType::Text, "Last name").required(true),
        FieldDefinition::derived(
            "full",
            FieldType::Text,
            "Full name",
            DerivedSpec::FullName {
                first_name_field: "first".into(),
                last_name_field: "last".into(),
            },
        ),
        FieldDefinition::new("email", FieldType::Text, "Email").with_validation(ValidationRules {
            email: true,
            ..Default::default()
        }),
        FieldDefinition::new("phone", FieldType::Text, "Phone").with_validation(ValidationRules {
            min_digits: Some(4),
            ..Default::default()
        }),
    ]
}

mod derived_values {
    use super::*;

    #[test]
    fn age_follows_date_of_birth() {
        let clock = Arc::new(FixedClock(date(2024, 6, 14)));
        let mut session = FormSession::with_clock(age_form(), clock);

        session.set_value("dob", "2000-06-15").unwrap();
        assert_eq!(session.value("age"), Some(&FieldValue::from("23")));

        session.set_value("dob", "1990-01-01").unwrap();
        assert_eq!(session.value("age"), Some(&FieldValue::from("34")));
    }

    #[test]
    fn age_turns_over_on_birthday() {
        let clock = Arc::new(FixedClock(date(2024, 6, 15)));
        let mut session = FormSession::with_clock(age_form(), clock);

        session.set_value("dob", "2000-06-15").unwrap();
        assert_eq!(session.value("age"), Some(&FieldValue::from("24")));
    }

    #[test]
    fn clearing_parent_clears_derived_value() {
        let clock = Arc::new(FixedClock(date(2024, 6, 14)));
        let mut session = FormSession::with_clock(age_form(), clock);

        session.set_value("dob", "2000-06-15").unwrap();
        session.set_value("dob", "").unwrap();
        assert_eq!(session.value("age"), Some(&FieldValue::from("")));
    }

    #[test]
    fn unparseable_date_yields_empty_age() {
        let clock = Arc::new(FixedClock(date(2024, 6, 14)));
        let mut session = FormSession::with_clock(age_form(), clock);

        session.set_value("dob", "not a date").unwrap();
        assert_eq!(session.value("age"), Some(&FieldValue::from("")));
    }

    #[test]
    fn full_name_joins_available_parts() {
        let mut session = FormSession::new(signup_form());

        session.set_value("last", "Lovelace").unwrap();
        assert_eq!(session.value("full"), Some(&FieldValue::from("Lovelace")));

        session.set_value("first", "Ada").unwrap();
        assert_eq!(session.value("full"), Some(&FieldValue::from("Ada Lovelace")));
    }

    #[test]
    fn recompute_is_idempotent() {
        let clock = FixedClock(date(2024, 6, 14));
        let fields = age_form();
        let mut values = ValueSet::new();
        values.insert("dob".into(), "2000-06-15".into());
        values.insert("age".into(), "".into());

        let (once, changed) = update_derived_fields(&values, &fields, &clock);
        assert!(changed);
        let (twice, changed_again) = update_derived_fields(&once, &fields, &clock);
        assert!(!changed_again);
        assert_eq!(once, twice);
    }

    #[test]
    fn derived_fields_cannot_be_edited() {
        let mut session = FormSession::new(age_form());
        let err = session.set_value("age", "99").unwrap_err();
        assert!(matches!(err, SessionError::ReadOnlyField { .. }));
    }
}

mod validation {
    use super::*;

    #[test]
    fn derived_fields_are_never_reported() {
        let mut fields = age_form();
        fields[1].required = true;
        let mut values = ValueSet::new();
        values.insert("dob".into(), "2000-06-15".into());

        let errors = validate_form(&values, &fields);
        assert!(!has_validation_errors(&errors));
        assert_eq!(get_field_error("age", &errors), None);
    }

    #[test]
    fn required_stops_further_checks() {
        let field = FieldDefinition::new("pin", FieldType::Text, "PIN")
            .required(true)
            .with_validation(ValidationRules {
                min_length: Some(4),
                min_digits: Some(4),
                ..Default::default()
            });

        assert_eq!(
            validate_field(&FieldValue::from("  "), &field),
            vec!["PIN is required".to_string()]
        );
    }

    #[test]
    fn optional_blank_values_pass_every_rule() {
        let field = FieldDefinition::new("email", FieldType::Text, "Email").with_validation(
            ValidationRules {
                email: true,
                min_length: Some(5),
                ..Default::default()
            },
        );

        assert!(validate_field(&FieldValue::Empty, &field).is_empty());
    }

    #[test]
    fn digit_count_ignores_other_characters() {
        let field = FieldDefinition::new("code", FieldType::Text, "Code").with_validation(
            ValidationRules {
                min_digits: Some(4),
                ..Default::default()
            },
        );

        assert_eq!(
            validate_field(&FieldValue::from("12a3"), &field),
            vec!["Code must contain at least 4 digits".to_string()]
        );
        assert!(validate_field(&FieldValue::from("12a34"), &field).is_empty());
    }

    #[test]
    fn form_keeps_first_message_per_field() {
        let fields = vec![FieldDefinition::new("email", FieldType::Text, "Email")
            .with_validation(ValidationRules {
                email: true,
                min_length: Some(20),
                ..Default::default()
            })];
        let mut values = ValueSet::new();
        values.insert("email".into(), "nope".into());

        let errors = validate_form(&values, &fields);
        assert_eq!(get_field_error("email", &errors), Some(EMAIL_MESSAGE));
    }
}

mod submission {
    use super::*;

    #[tokio::test]
    async fn invalid_form_is_not_delivered() {
        let delivered = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&delivered);
        let handler = move |_: &ValueSet| -> Result<(), DeliveryError> {
            *counter.lock().unwrap() += 1;
            Ok(())
        };

        let mut session = FormSession::new(signup_form());
        session.set_value("first", "Ada").unwrap();
        session.set_value("email", "not-an-email").unwrap();

        let err = session.submit(&handler).await.unwrap_err();
        match err {
            SessionError::Invalid { errors } => {
                assert_eq!(
                    errors.get("last").map(String::as_str),
                    Some("Last name is required")
                );
                assert_eq!(errors.get("email").map(String::as_str), Some(EMAIL_MESSAGE));
                assert!(!errors.contains_key("full"));
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(*delivered.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn valid_form_delivers_derived_values() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let handler = move |values: &ValueSet| -> Result<(), DeliveryError> {
            *sink.lock().unwrap() = Some(values.clone());
            Ok(())
        };

        let mut session = FormSession::new(signup_form());
        session.set_value("first", "Ada").unwrap();
        session.set_value("last", "Lovelace").unwrap();
        session.set_value("phone", "555-0100").unwrap();

        session.submit(&handler).await.unwrap();
        assert_eq!(session.state(), SessionState::Submitted);

        let values = seen.lock().unwrap().clone().unwrap();
        assert_eq!(values.get("full"), Some(&FieldValue::from("Ada Lovelace")));
    }

    #[tokio::test]
    async fn editing_clears_that_fields_error() {
        let handler = |_: &ValueSet| -> Result<(), DeliveryError> { Ok(()) };

        let mut session = FormSession::new(signup_form());
        let _ = session.submit(&handler).await;
        assert!(session.error("first").is_some());
        assert!(session.error("last").is_some());

        session.set_value("first", "Ada").unwrap();
        assert_eq!(session.error("first"), None);
        assert!(session.error("last").is_some());
        assert_eq!(session.state(), SessionState::Editing);
    }

    #[tokio::test]
    async fn delivery_failure_is_kept_on_session() {
        let handler = |_: &ValueSet| -> Result<(), DeliveryError> { Err("backend offline".into()) };

        let mut session = FormSession::new(age_form());
        session.set_value("dob", "2000-06-15").unwrap();

        let err = session.submit(&handler).await.unwrap_err();
        assert!(matches!(err, SessionError::Delivery { .. }));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.submit_error(), Some("backend offline"));
        assert!(session.errors().is_empty());
    }
}

mod storage {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builder_saves_and_session_loads_from_store() {
        let dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("forms.json"));

        let mut builder = FormBuilder::new();
        builder.set_name("Signup");
        for field in signup_form() {
            builder.add_field(field).unwrap();
        }
        let saved = builder.save(&repo).unwrap();
        assert!(builder.fields().is_empty());

        let reopened = JsonFileRepository::new(dir.path().join("forms.json"));
        let stored = reopened.get_by_id(&saved.id).unwrap().unwrap();
        assert_eq!(stored, saved);

        let mut session = FormSession::from_schema(&stored);
        session.set_value("first", "Grace").unwrap();
        session.set_value("last", "Hopper").unwrap();
        assert_eq!(session.value("full"), Some(&FieldValue::from("Grace Hopper")));
    }

    #[test]
    fn editing_a_stored_form_updates_in_place() {
        let repo = InMemoryRepository::new();

        let mut builder = FormBuilder::new();
        builder.set_name("Birthday");
        for field in age_form() {
            builder.add_field(field).unwrap();
        }
        let saved = builder.save(&repo).unwrap();

        builder.load_for_editing(&saved);
        builder.set_name("Birthday v2");
        let updated = builder.save(&repo).unwrap();

        assert_eq!(updated.id, saved.id);
        assert!(updated.updated_at.is_some());
        let all = repo.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Birthday v2");
    }

    #[test]
    fn parent_in_use_cannot_be_deleted() {
        let mut builder = FormBuilder::new();
        for field in age_form() {
            builder.add_field(field).unwrap();
        }

        let err = builder.delete_field("dob").unwrap_err();
        assert!(matches!(err, ConfigError::ParentInUse { .. }));

        builder.delete_field("age").unwrap();
        builder.delete_field("dob").unwrap();
        assert!(builder.fields().is_empty());
    }
}
