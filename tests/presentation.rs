use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use eudi_age_verifier::{
    core::util::{Clock, FixedClock},
    verifier::presentation::{
        check_age, PresentationError, PresentationVerifier, TrustedIssuers, VerificationOptions,
    },
};
use serde_json::{json, Map, Value as Json};

mod common;

use common::MockWallet;

fn verifier_for(wallet: &MockWallet) -> PresentationVerifier {
    PresentationVerifier::new(
        VerificationOptions {
            public_key: Some(wallet.verifying_key()),
            ..Default::default()
        },
        Arc::new(common::clock()),
    )
}

fn claims(value: Json) -> Map<String, Json> {
    match value {
        Json::Object(map) => map,
        _ => panic!("claims must be an object"),
    }
}

#[test]
fn signed_presentation_yields_subject() {
    let wallet = MockWallet::new();
    let result = verifier_for(&wallet)
        .verify_presentation(&wallet.present(json!({ "age_over_18": true, "age_over_21": false })));

    assert!(result.valid);
    assert_eq!(result.error, None);
    let claims = result.verified_claims.unwrap();
    assert_eq!(claims["age_over_18"], true);
    assert_eq!(claims["id"], common::HOLDER);

    assert_eq!(
        serde_json::to_value(verifier_for(&wallet).verify_presentation("nope"))
            .unwrap()
            .get("verifiedClaims"),
        None
    );
}

#[test]
fn untrusted_issuer_never_reaches_the_predicate() {
    let wallet = MockWallet::new().with_issuer("did:example:mallory");
    let verifier = verifier_for(&wallet);

    let result = verifier.verify_presentation(&wallet.present(json!({ "age_over_18": true })));
    assert!(!result.valid);
    assert_eq!(
        result.error.as_deref(),
        Some("Untrusted issuer: did:example:mallory")
    );

    let age = verifier.verify_age(&wallet.present(json!({ "age_over_18": true })), 18);
    assert!(!age.is_old_enough);
    assert_eq!(age.assertion.age_range, ">=18");
    assert_eq!(
        age.assertion.error.as_deref(),
        Some("Untrusted issuer: did:example:mallory")
    );
}

#[test]
fn custom_trust_list() {
    let wallet = MockWallet::new().with_issuer("did:web:pid.example");
    let verifier = PresentationVerifier::new(
        VerificationOptions {
            trusted_issuers: TrustedIssuers::new(["did:web:pid.example"]),
            public_key: Some(wallet.verifying_key()),
            skip_signature_verification: false,
        },
        Arc::new(common::clock()),
    );
    assert!(verifier
        .verify_age(&wallet.present(json!({ "age_over_21": true })), 21)
        .is_old_enough);
}

#[test]
fn structural_failures_are_categorised() {
    let wallet = MockWallet::new();
    let verifier = verifier_for(&wallet);

    let cases = [
        (json!({ "iss": "did:example:eudi-issuer" }), PresentationError::MissingVp),
        (
            json!({ "iss": "did:example:eudi-issuer", "vp": { "verifiableCredential": [] } }),
            PresentationError::MissingCredential,
        ),
        (
            json!({ "iss": "did:example:eudi-issuer", "vp": {} }),
            PresentationError::MissingCredential,
        ),
        (
            json!({
                "iss": "did:example:eudi-issuer",
                "vp": { "verifiableCredential": [{ "type": ["VerifiableCredential"] }] },
            }),
            PresentationError::MissingCredentialSubject,
        ),
        (
            json!({ "vp": { "verifiableCredential": [{ "credentialSubject": {} }] } }),
            PresentationError::MissingIssuer,
        ),
    ];
    for (payload, expected) in cases {
        assert_eq!(verifier.decode(&wallet.sign(&payload)), Err(expected));
    }

    assert!(matches!(
        verifier.decode("not-a-jwt"),
        Err(PresentationError::MalformedJwt(_))
    ));
}

#[test]
fn only_the_first_credential_counts() {
    let wallet = MockWallet::new();
    let payload = json!({
        "iss": "did:example:eudi-issuer",
        "vp": { "verifiableCredential": [
            { "credentialSubject": { "age_over_18": false } },
            { "credentialSubject": { "age_over_18": true } },
        ] },
    });
    let age = verifier_for(&wallet).verify_age(&wallet.sign(&payload), 18);
    assert!(!age.is_old_enough);
    assert_eq!(age.assertion.error, None);
}

#[test]
fn signature_is_checked() {
    let wallet = MockWallet::new();
    let verifier = verifier_for(&wallet);

    let forged = MockWallet::new().present(json!({ "age_over_18": true }));
    assert_eq!(verifier.decode(&forged), Err(PresentationError::InvalidSignature));

    let unsigned = wallet.present_unsigned(json!({ "age_over_18": true }));
    assert_eq!(
        verifier.decode(&unsigned),
        Err(PresentationError::InvalidSignature)
    );
}

#[test]
fn a_verification_mode_is_required() {
    let wallet = MockWallet::new();
    let verifier =
        PresentationVerifier::new(VerificationOptions::default(), Arc::new(common::clock()));
    let result = verifier.verify_presentation(&wallet.present(json!({ "age_over_18": true })));
    assert!(!result.valid);
    assert_eq!(
        result.error.as_deref(),
        Some("Either publicKey or skipSignatureVerification must be provided")
    );
}

#[test]
fn predicate_wins_over_birthdate() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
    let minor = claims(json!({ "age_over_18": true, "birthdate": "2015-01-01" }));
    assert!(check_age(&minor, 18, today));

    // The predicate only answers the threshold it names.
    assert!(!check_age(&minor, 16, today));
    assert!(!check_age(&claims(json!({ "age_over_18": true })), 21, today));
}

#[test]
fn birthdate_counts_whole_years() {
    let birthdate = claims(json!({ "birthdate": "2000-06-15" }));
    assert!(check_age(
        &birthdate,
        18,
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    ));
    assert!(!check_age(
        &birthdate,
        24,
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    ));
    assert!(check_age(
        &birthdate,
        24,
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    ));
    assert!(!check_age(
        &birthdate,
        18,
        NaiveDate::from_ymd_opt(2018, 6, 14).unwrap()
    ));
}

#[test]
fn numeric_age_and_fallthrough() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
    assert!(check_age(&claims(json!({ "age": 18 })), 18, today));
    assert!(!check_age(&claims(json!({ "age": 17 })), 18, today));
    assert!(!check_age(&claims(json!({ "age": "42" })), 18, today));
    assert!(!check_age(&claims(json!({ "name": "Erika" })), 0, today));
    assert!(!check_age(&claims(json!({ "birthdate": "sometime" })), 18, today));
}

#[test]
fn verify_age_uses_the_injected_clock() {
    let wallet = MockWallet::new();
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2018, 6, 14, 0, 0, 0).unwrap());
    let verifier = PresentationVerifier::new(
        VerificationOptions {
            public_key: Some(wallet.verifying_key()),
            ..Default::default()
        },
        Arc::new(clock.clone()),
    );
    let jwt = wallet.present(json!({ "birthdate": "2000-06-15" }));
    assert!(!verifier.verify_age(&jwt, 18).is_old_enough);

    clock.set(Utc.with_ymd_and_hms(2018, 6, 15, 0, 0, 0).unwrap());
    assert!(verifier.verify_age(&jwt, 18).is_old_enough);
}

#[test]
fn stale_or_early_presentations_are_rejected() {
    let wallet = MockWallet::new();
    let verifier = verifier_for(&wallet);
    let now = common::clock().now().timestamp();
    let with = |claims: Json| {
        let mut payload = wallet.payload(json!({ "age_over_18": true }));
        for (name, value) in claims.as_object().unwrap() {
            payload[name] = value.clone();
        }
        wallet.sign(&payload)
    };

    assert_eq!(
        verifier.decode(&with(json!({ "exp": 1_000_000_000 }))),
        Err(PresentationError::Expired)
    );
    assert_eq!(
        verifier.decode(&with(json!({ "exp": now }))),
        Err(PresentationError::Expired)
    );
    assert_eq!(
        verifier.decode(&with(json!({ "nbf": 4_000_000_000_i64 }))),
        Err(PresentationError::NotYetValid)
    );
    assert!(matches!(
        verifier.decode(&with(json!({ "exp": "tomorrow" }))),
        Err(PresentationError::MalformedJwt(_))
    ));

    let age = verifier.verify_age(
        &with(json!({ "exp": 1_000_000_000, "nbf": 4_000_000_000_i64 })),
        18,
    );
    assert!(!age.is_old_enough);
    assert_eq!(age.assertion.error.as_deref(), Some("JWT has expired"));

    let current = with(json!({ "nbf": now, "exp": now + 300 }));
    assert!(verifier.verify_age(&current, 18).is_old_enough);
}
