//! Two-device verification flow using only core building blocks
//!
//! Device A beacons, device B decodes and records it, challenges A, and
//! promotes A to verified once A's signed answer checks out.

use std::sync::Arc;

use hopenet_core::{
    respond_to_challenge, verify_response, AdvertisementCodec, Challenge, CryptoProvider,
    Ed25519Provider, Identity, ManualTimeSource, PeerTable, RejectReason, Timestamp,
    UpsertOutcome, VerificationError, VerificationState,
};

fn device(handle: &str) -> Identity {
    Identity::generate(handle, &Ed25519Provider::new(), 256).unwrap()
}

fn table_for(identity: &Identity) -> PeerTable {
    PeerTable::new(
        identity.id(),
        16,
        std::time::Duration::from_secs(60),
        Arc::new(ManualTimeSource::new(Timestamp::new(0))),
    )
}

#[test]
fn test_end_to_end_verification() {
    let crypto: Arc<dyn CryptoProvider> = Arc::new(Ed25519Provider::new());
    let codec = AdvertisementCodec::new(crypto.clone());
    let device_a = device("+15550000001");
    let device_b = device("+15550000002");
    let table_b = table_for(&device_b);

    // A advertises with sequence 1
    let beacon = codec.encode(&device_a, 1).unwrap();

    // B decodes and upserts
    let ad = AdvertisementCodec::decode(&beacon).unwrap();
    assert_eq!(
        table_b.upsert(&ad, Timestamp::new(1_000), Some(-55)),
        UpsertOutcome::Inserted { evicted: None }
    );

    // B challenges A with a known nonce
    let challenge = Challenge::new(device_b.id(), device_a.id(), b"abc123".to_vec());
    table_b
        .begin_challenge(&device_a.id(), challenge.nonce.clone())
        .unwrap();

    // A signs the nonce
    let response = respond_to_challenge(&device_a, crypto.as_ref(), &challenge).unwrap();

    // B verifies and records the outcome
    let record = table_b.get(&device_a.id()).unwrap();
    let verified = verify_response(
        crypto.as_ref(),
        &challenge,
        &response,
        &record.public_key_fingerprint,
    );
    assert_eq!(
        table_b.complete_challenge(&device_a.id(), b"abc123", verified),
        Ok(VerificationState::Verified)
    );

    let snapshot = table_b.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].peer_id, device_a.id());
    assert_eq!(snapshot[0].verification, VerificationState::Verified);
    assert_eq!(
        snapshot[0].full_public_key.as_deref(),
        Some(device_a.public_key())
    );
}

#[test]
fn test_impostor_ends_failed() {
    let crypto: Arc<dyn CryptoProvider> = Arc::new(Ed25519Provider::new());
    let codec = AdvertisementCodec::new(crypto.clone());
    let victim = device("victim");
    let impostor = device("impostor");
    let observer = device("observer");
    let table = table_for(&observer);

    // The impostor replays the victim's beacon
    let beacon = codec.encode(&victim, 1).unwrap();
    let ad = AdvertisementCodec::decode(&beacon).unwrap();
    table.upsert(&ad, Timestamp::new(1), None);

    let challenge = Challenge::random(observer.id(), victim.id());
    table
        .begin_challenge(&victim.id(), challenge.nonce.clone())
        .unwrap();

    // ... but can only answer with its own key
    let response = respond_to_challenge(&impostor, crypto.as_ref(), &challenge).unwrap();
    let outcome = verify_response(
        crypto.as_ref(),
        &challenge,
        &response,
        &ad.public_key_fingerprint,
    );
    assert_eq!(outcome, Err(VerificationError::FingerprintMismatch));
    assert_eq!(
        table.complete_challenge(&victim.id(), &challenge.nonce, outcome),
        Ok(VerificationState::Failed)
    );
}

#[test]
fn test_own_beacon_is_rejected() {
    let crypto: Arc<dyn CryptoProvider> = Arc::new(Ed25519Provider::new());
    let codec = AdvertisementCodec::new(crypto);
    let me = device("me");
    let table = table_for(&me);

    let ad = AdvertisementCodec::decode(&codec.encode(&me, 1).unwrap()).unwrap();
    assert_eq!(
        table.upsert(&ad, Timestamp::new(1), None),
        UpsertOutcome::Rejected(RejectReason::SelfAdvertisement)
    );
    assert!(table.snapshot().is_empty());
}
