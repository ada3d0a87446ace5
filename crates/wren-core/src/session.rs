use async_trait::async_trait;
use blake3::Hasher;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use wren_wire::Jid;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::envelope::{MessageEnvelope, PreKeyEnvelope, SenderKeyEnvelope};
use crate::error::CoreError;

/// Curve marker byte carried in retry key bundles.
pub const CURVE_TYPE_DJB: u8 = 0x05;

/// Pairwise session endpoint, one per (user, device).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionAddress {
    pub name: String,
    pub device: u16,
}

impl SessionAddress {
    pub fn new(name: impl Into<String>, device: u16) -> Self {
        Self {
            name: name.into(),
            device,
        }
    }

    pub fn from_jid(jid: &Jid) -> Self {
        Self {
            name: jid.user.clone(),
            device: jid.device,
        }
    }
}

impl Display for SessionAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.name, self.device)
    }
}

/// Group sender-key session identity: one broadcast chain per sender per
/// group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupSender {
    pub group: String,
    pub sender: SessionAddress,
}

impl GroupSender {
    pub fn new(chat: &Jid, sender: &Jid) -> Self {
        Self {
            group: chat.to_string(),
            sender: SessionAddress::from_jid(sender),
        }
    }
}

impl Display for GroupSender {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.group, self.sender)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKey {
    pub id: u32,
    pub public_key: [u8; 32],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPreKey {
    pub id: u32,
    pub public_key: [u8; 32],
    pub signature: Vec<u8>,
}

/// Serializable account/device-identity record shipped in escalated retries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub details: Vec<u8>,
    pub account_signature: Vec<u8>,
    pub device_signature: Vec<u8>,
}

/// Session state and cipher capability. Implementations own all session key
/// material and serialize concurrent access per session identity; this core
/// only constructs identities and hands them to the operations below.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Decrypts a session-initiating handshake message. Establishing the new
    /// pairwise session and decrypting the first message is one atomic step:
    /// a failed decrypt must not leave a half-established session behind.
    async fn establish_and_decrypt(
        &self,
        address: &SessionAddress,
        envelope: &PreKeyEnvelope,
    ) -> Result<Vec<u8>, CoreError>;

    async fn decrypt_message(
        &self,
        address: &SessionAddress,
        envelope: &MessageEnvelope,
    ) -> Result<Vec<u8>, CoreError>;

    async fn decrypt_group_message(
        &self,
        sender: &GroupSender,
        envelope: &SenderKeyEnvelope,
    ) -> Result<Vec<u8>, CoreError>;

    /// Installs or refreshes the sender-key session announced by a
    /// distribution payload.
    async fn process_distribution(
        &self,
        sender: &GroupSender,
        payload: &[u8],
    ) -> Result<(), CoreError>;

    async fn identity_key(&self) -> [u8; 32];

    async fn signed_prekey(&self) -> SignedPreKey;

    /// Generates one fresh one-time prekey, owned by the store thereafter.
    async fn generate_prekey(&self) -> Result<PreKey, CoreError>;

    fn registration_id(&self) -> u16;

    async fn serialized_account(&self) -> Result<Vec<u8>, CoreError>;
}

/// Sender-key chain as announced in a distribution payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub key_id: u32,
    pub chain_key: [u8; 32],
}

#[derive(Clone)]
struct GroupChain {
    key_id: u32,
    chain_key: [u8; 32],
}

#[derive(Default)]
struct StoreState {
    sessions: HashMap<String, [u8; 32]>,
    sender_keys: HashMap<String, GroupChain>,
    prekey_seq: u32,
}

/// In-memory `SignalStore`: deterministic chain-key derivation with a keyed
/// MAC over each ciphertext. Faithful to the capability contract, not a
/// secure ratchet; the sealing half lives here too so tests can act as the
/// remote peer.
pub struct MemorySignalStore {
    registration_id: u16,
    identity_public: [u8; 32],
    signed_prekey: SignedPreKey,
    account: AccountIdentity,
    state: Mutex<StoreState>,
    decrypts: AtomicUsize,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        let identity_secret = StaticSecret::random_from_rng(OsRng);
        let identity_public = *X25519Public::from(&identity_secret).as_bytes();
        let signing_key = SigningKey::generate(&mut OsRng);
        let prekey_secret = StaticSecret::random_from_rng(OsRng);
        let prekey_public = *X25519Public::from(&prekey_secret).as_bytes();
        let signed_prekey = SignedPreKey {
            id: 1,
            public_key: prekey_public,
            signature: signing_key.sign(&prekey_public).to_bytes().to_vec(),
        };
        let details = signing_key.verifying_key().to_bytes().to_vec();
        let account = AccountIdentity {
            account_signature: signing_key.sign(&details).to_bytes().to_vec(),
            device_signature: signing_key.sign(&identity_public).to_bytes().to_vec(),
            details,
        };
        Self {
            registration_id: rand::thread_rng().gen(),
            identity_public,
            signed_prekey,
            account,
            state: Mutex::new(StoreState::default()),
            decrypts: AtomicUsize::new(0),
        }
    }

    /// Number of decrypt operations attempted against this store.
    pub fn decrypt_attempts(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }

    pub fn seal_message(base_key: &[u8; 32], counter: u32, plaintext: &[u8]) -> MessageEnvelope {
        let seed = session_seed(base_key);
        let key = message_key(&seed, counter);
        let ciphertext = keystream_xor(&key, plaintext);
        let mac = mac_tag(&key, &ciphertext).to_vec();
        MessageEnvelope {
            ratchet_key: *base_key,
            counter,
            previous_counter: counter.saturating_sub(1),
            ciphertext,
            mac,
        }
    }

    pub fn seal_prekey_message(
        base_key: &[u8; 32],
        registration_id: u32,
        plaintext: &[u8],
    ) -> PreKeyEnvelope {
        PreKeyEnvelope {
            registration_id,
            prekey_id: Some(1),
            signed_prekey_id: 1,
            base_key: *base_key,
            identity_key: derive_key(b"wren:identity:v1", base_key),
            message: Self::seal_message(base_key, 0, plaintext),
        }
    }

    pub fn seal_group_message(
        chain_key: &[u8; 32],
        key_id: u32,
        iteration: u32,
        plaintext: &[u8],
    ) -> SenderKeyEnvelope {
        let key = message_key(chain_key, iteration);
        let ciphertext = keystream_xor(&key, plaintext);
        let mac = mac_tag(&key, &ciphertext).to_vec();
        SenderKeyEnvelope {
            key_id,
            iteration,
            ciphertext,
            mac,
        }
    }

    pub fn distribution_payload(key_id: u32, chain_key: &[u8; 32]) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(&DistributionRecord {
            key_id,
            chain_key: *chain_key,
        })
        .map_err(|_| CoreError::Serialization)
    }
}

impl Default for MemorySignalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalStore for MemorySignalStore {
    async fn establish_and_decrypt(
        &self,
        address: &SessionAddress,
        envelope: &PreKeyEnvelope,
    ) -> Result<Vec<u8>, CoreError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        let seed = session_seed(&envelope.base_key);
        let plaintext = open(&seed, &envelope.message)?;
        let mut state = self.state.lock().await;
        state.sessions.insert(address.to_string(), seed);
        Ok(plaintext)
    }

    async fn decrypt_message(
        &self,
        address: &SessionAddress,
        envelope: &MessageEnvelope,
    ) -> Result<Vec<u8>, CoreError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        let seed = {
            let state = self.state.lock().await;
            state.sessions.get(&address.to_string()).copied()
        };
        let Some(seed) = seed else {
            return Err(CoreError::DecryptionFailed(format!(
                "no session for {}",
                address
            )));
        };
        open(&seed, envelope)
    }

    async fn decrypt_group_message(
        &self,
        sender: &GroupSender,
        envelope: &SenderKeyEnvelope,
    ) -> Result<Vec<u8>, CoreError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        let chain = {
            let state = self.state.lock().await;
            state.sender_keys.get(&sender.to_string()).cloned()
        };
        let Some(chain) = chain else {
            return Err(CoreError::DecryptionFailed(format!(
                "no sender key session for {}",
                sender
            )));
        };
        if chain.key_id != envelope.key_id {
            return Err(CoreError::DecryptionFailed(format!(
                "sender key {} does not match {}",
                envelope.key_id, chain.key_id
            )));
        }
        let key = message_key(&chain.chain_key, envelope.iteration);
        if mac_tag(&key, &envelope.ciphertext).as_slice() != envelope.mac.as_slice() {
            return Err(CoreError::DecryptionFailed("mac mismatch".to_string()));
        }
        Ok(keystream_xor(&key, &envelope.ciphertext))
    }

    async fn process_distribution(
        &self,
        sender: &GroupSender,
        payload: &[u8],
    ) -> Result<(), CoreError> {
        let record: DistributionRecord =
            serde_json::from_slice(payload).map_err(|_| CoreError::Serialization)?;
        let mut state = self.state.lock().await;
        state.sender_keys.insert(
            sender.to_string(),
            GroupChain {
                key_id: record.key_id,
                chain_key: record.chain_key,
            },
        );
        Ok(())
    }

    async fn identity_key(&self) -> [u8; 32] {
        self.identity_public
    }

    async fn signed_prekey(&self) -> SignedPreKey {
        self.signed_prekey.clone()
    }

    async fn generate_prekey(&self) -> Result<PreKey, CoreError> {
        let mut state = self.state.lock().await;
        state.prekey_seq = state.prekey_seq.saturating_add(1);
        let secret = StaticSecret::random_from_rng(OsRng);
        Ok(PreKey {
            id: state.prekey_seq,
            public_key: *X25519Public::from(&secret).as_bytes(),
        })
    }

    fn registration_id(&self) -> u16 {
        self.registration_id
    }

    async fn serialized_account(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(&self.account).map_err(|_| CoreError::Serialization)
    }
}

fn open(seed: &[u8; 32], envelope: &MessageEnvelope) -> Result<Vec<u8>, CoreError> {
    let key = message_key(seed, envelope.counter);
    if mac_tag(&key, &envelope.ciphertext).as_slice() != envelope.mac.as_slice() {
        return Err(CoreError::DecryptionFailed("mac mismatch".to_string()));
    }
    Ok(keystream_xor(&key, &envelope.ciphertext))
}

fn session_seed(base_key: &[u8; 32]) -> [u8; 32] {
    derive_key(b"wren:session:v1", base_key)
}

fn derive_key(label: &[u8], material: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(label);
    hasher.update(material);
    hasher.finalize().into()
}

fn message_key(seed: &[u8; 32], counter: u32) -> [u8; 32] {
    let mut hasher = Hasher::new_keyed(seed);
    hasher.update(b"msg");
    hasher.update(&counter.to_be_bytes());
    hasher.finalize().into()
}

fn keystream_xor(key: &[u8; 32], data: &[u8]) -> Vec<u8> {
    let mut hasher = Hasher::new_keyed(key);
    hasher.update(b"stream");
    let mut stream = vec![0u8; data.len()];
    hasher.finalize_xof().fill(&mut stream);
    data.iter().zip(stream.iter()).map(|(b, k)| b ^ k).collect()
}

fn mac_tag(key: &[u8; 32], data: &[u8]) -> [u8; 32] {
    *blake3::keyed_hash(key, data).as_bytes()
}
