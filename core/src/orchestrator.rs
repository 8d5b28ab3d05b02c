//! Process-wide coordinator (spec.md §9): brings every crate up in order —
//! keyserver, then per-identity caches, then presence — and tears them down
//! in reverse. Grounded on `zhtp/src/main.rs`'s component wiring, narrowed
//! from that file's multi-package runtime to the handful of components this
//! system actually has.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dna_gsk::{GskManager, GskStore};
use dna_identity::{presence::PresencePublisher, ContactBook, Fingerprint, Identity, IdentityRecord, KeyserverCache};
use dna_queue::OutboxWriter;
use dna_transport::{IceTier, Sender, TcpTier};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::config::DnaConfig;
use crate::error::Result;
use crate::gsk_lookup::CoreGskLookup;
use crate::store::SqliteStore;

/// Background poller cadence (spec.md §4.3 step 4, §5): GSK discovery,
/// ownership checks, and the offline queue. Presence republishing rides the
/// same tick, clamped to the configured `presence_refresh_seconds` if that's
/// shorter.
const BACKGROUND_POLL_INTERVAL: Duration = Duration::from_secs(120);

pub struct Node {
    pub config: DnaConfig,
    pub identity: Identity,
    pub dht: Arc<dna_dht::DhtClient>,
    pub store: Arc<SqliteStore>,
    pub contacts: Arc<ContactBook>,
    pub keyserver: Arc<KeyserverCache>,
    pub gsk: Arc<GskManager>,
    pub outbox: Arc<OutboxWriter>,
    pub tcp: Arc<TcpTier>,
    pub ice: Arc<IceTier>,
    pub sender: Arc<Sender>,
    presence: AsyncMutex<PresencePublisher>,
    poller: SyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Node {
    /// Init order: embedded store → identity → DHT → keyserver →
    /// per-identity caches (contacts, GSK manager, outbox) → transport →
    /// presence. Mirrors the teacher's component dependency ladder.
    pub async fn bootstrap(config: DnaConfig) -> Result<Arc<Self>> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = SqliteStore::open(&config.data_dir.join("dna.sqlite3"))?;

        let identity = match store.load_identity()? {
            Some(identity) => identity,
            None => {
                info!("no local identity found, generating one");
                let identity = Identity::generate(dna_identity::types::Profile::default());
                store.save_identity(&identity)?;
                identity
            }
        };
        info!(fingerprint = %dna_identity::fingerprint_hex(&identity.fingerprint), "local identity ready");

        let dht_addr: SocketAddr = format!("0.0.0.0:{}", config.dht_port).parse().expect("valid dht bind address");
        let dht = dna_dht::DhtClient::bind(dht_addr).await?;

        let keyserver = Arc::new(KeyserverCache::new(dht.clone()));
        keyserver.publish(&identity.record(), 1).await?;

        let contacts = Arc::new(ContactBook::new());
        for contact in store.load_contacts()? {
            contacts.observe(
                IdentityRecord {
                    signing_public_key: contact.signing_public_key,
                    kem_public_key: contact.kem_public_key,
                    profile: dna_identity::types::Profile::default(),
                },
                contact.name,
                contact.last_seen,
            );
        }

        let gsk_store: Arc<dyn GskStore> = store.clone();
        let gsk = Arc::new(GskManager::new(
            dht.clone(),
            keyserver.clone(),
            gsk_store,
            identity.fingerprint,
            identity.signing.clone(),
            identity.kem.clone(),
        ));

        let outbox = Arc::new(OutboxWriter::new(dht.clone()));

        let tcp = TcpTier::new(dht.clone(), config.max_frame_bytes, {
            let contacts = contacts.clone();
            let store = store.clone();
            let gsk = gsk.clone();
            let my_fingerprint = identity.fingerprint;
            let my_kem_secret = identity.kem.secret.0.clone();
            Arc::new(move |envelope: Vec<u8>| {
                tokio::spawn(dispatch_incoming_envelope(
                    envelope,
                    my_fingerprint,
                    my_kem_secret.clone(),
                    contacts.clone(),
                    store.clone(),
                    gsk.clone(),
                ));
            })
        });
        let tcp_addr: SocketAddr = format!("0.0.0.0:{}", config.listen_port).parse().expect("valid listen address");
        tcp.listen(identity.fingerprint, tcp_addr).await?;

        let ice = IceTier::new(identity.fingerprint, dht.clone(), config.stun_servers.clone());
        if let Err(e) = ice.start().await {
            warn!(error = %e, "ice tier failed to start, tier-2 delivery unavailable for this session");
        }

        let sender = Arc::new(Sender::new(tcp.clone(), ice.clone(), outbox.clone(), dna_transport::DEFAULT_ACK_TIMEOUT));

        let mut publisher = PresencePublisher::new(dht.clone(), identity.fingerprint);
        publisher.publish_now().await;

        let node = Arc::new(Self {
            config,
            identity,
            dht,
            store,
            contacts,
            keyserver,
            gsk,
            outbox,
            tcp,
            ice,
            sender,
            presence: AsyncMutex::new(publisher),
            poller: SyncMutex::new(None),
        });
        node.clone().spawn_background_poller();
        Ok(node)
    }

    fn spawn_background_poller(self: Arc<Self>) {
        let interval = Duration::from_secs(self.config.presence_refresh_seconds).min(BACKGROUND_POLL_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.presence.lock().await.publish_now().await;
                self.gsk.discover_all().await;

                for mut group in self.store.all_groups() {
                    if let Err(e) = self.gsk.maybe_transfer_ownership(&mut group).await {
                        warn!(group = %group.uuid, error = %e, "ownership check failed");
                    }
                }

                let fingerprints = [self.identity.fingerprint];
                let timeout = Duration::from_millis(self.config.parallel_retrieve_timeout_ms);
                let envelopes =
                    dna_queue::retrieve_parallel(&self.dht, &fingerprints, &self.identity.fingerprint, timeout).await;
                if !envelopes.is_empty() {
                    info!(count = envelopes.len(), "polled offline queue");
                    let my_kem_secret = self.identity.kem.secret.0.clone();
                    for envelope in envelopes {
                        dispatch_incoming_envelope(
                            envelope,
                            self.identity.fingerprint,
                            my_kem_secret.clone(),
                            self.contacts.clone(),
                            self.store.clone(),
                            self.gsk.clone(),
                        )
                        .await;
                    }
                    self.outbox.clear(&self.identity.fingerprint).await;
                }
            }
        });
        *self.poller.lock() = Some(handle);
    }

    /// Encode and send a direct message to `recipient` through the
    /// tier-1/tier-2/tier-3 send path.
    pub async fn send_direct(&self, recipient: &Fingerprint, plaintext: &[u8]) -> Result<()> {
        let record = self.keyserver.lookup(recipient).await?;
        let envelope = dna_codec::encode_direct(
            &self.identity.fingerprint,
            &self.identity.signing,
            &[(*recipient, record.kem_public_key)],
            plaintext,
        )?;
        self.store.save_message(recipient, true, plaintext, dna_dht::types::now_secs())?;
        self.sender.send(recipient, &envelope).await?;
        Ok(())
    }

    /// Reverse teardown relative to `bootstrap`: background poller first,
    /// then transport, then the embedded store (closed implicitly once its
    /// last `Arc` drops).
    pub async fn shutdown(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.abort();
        }
        self.ice.shutdown().await;
        info!("node shutdown complete");
    }
}

/// Decode whatever arrives on any transport tier. The signer isn't known up
/// front, so every known contact's signing key is tried as the expected
/// signer until one verifies — covers both direct and group envelopes, since
/// `dna_codec::decode` checks the embedded sender fingerprint against
/// whichever key actually verified the signature.
///
/// A group envelope whose signature verifies but whose GSK isn't cached yet
/// (spec.md §4.7: "on miss, trigger §4.3 fetch and retry once") triggers one
/// fetch-and-retry before the message is given up on: the signer having
/// verified means this contact's key is correct, so a missing GSK is purely
/// a local cache miss, not a wrong candidate.
async fn dispatch_incoming_envelope(
    envelope: Vec<u8>,
    my_fingerprint: Fingerprint,
    my_kem_secret: Vec<u8>,
    contacts: Arc<ContactBook>,
    store: Arc<SqliteStore>,
    gsk: Arc<GskManager>,
) {
    let gsk_store: Arc<dyn GskStore> = store.clone();
    let gsk_lookup = CoreGskLookup::new(gsk_store);

    for contact in contacts.all() {
        match dna_codec::decode(&envelope, &my_fingerprint, &my_kem_secret, &contact.signing_public_key, &gsk_lookup) {
            Ok(decoded) => {
                let _ = store.save_message(&decoded.sender_fingerprint, false, &decoded.plaintext, decoded.timestamp);
                return;
            }
            Err(dna_codec::CodecError::NotFound) => {
                if let Some((group_uuid, gsk_version)) = dna_codec::group_envelope_target(&envelope) {
                    if let Some(mut group) = gsk.refresh_group_metadata(&group_uuid.to_string()).await {
                        group.gsk_version = gsk_version;
                        if let Err(e) = gsk.fetch_and_install(&group).await {
                            warn!(group = %group_uuid, version = gsk_version, error = %e, "gsk fetch-on-miss failed");
                            return;
                        }
                        if let Ok(decoded) =
                            dna_codec::decode(&envelope, &my_fingerprint, &my_kem_secret, &contact.signing_public_key, &gsk_lookup)
                        {
                            let _ =
                                store.save_message(&decoded.sender_fingerprint, false, &decoded.plaintext, decoded.timestamp);
                        }
                    }
                }
                return;
            }
            Err(_) => continue,
        }
    }
}
