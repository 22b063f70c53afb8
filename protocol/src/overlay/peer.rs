//! # Peer Runtime
//!
//! The participant process end to end: start the listener, register with
//! a random seed majority, pull the directory, weave into the neighbor
//! graph, gossip a bounded burst of self-originated messages, and keep
//! pinging forever.
//!
//! Concurrency layout — one task per concern, shared state behind
//! `parking_lot` locks that are never held across an await:
//!
//! ```text
//! accept loop ──> one task per inbound connection ──> handle_message
//! ping loop   ──> strikes / escalation / quorum reports
//! originator  ──> 10 messages at 5 s cadence, then idle until shutdown
//! ```
//!
//! Every send snapshots its targets under the lock and performs the I/O
//! after releasing it. A slow neighbor can therefore slow a broadcast,
//! but never block the accept path or another handler.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::{interval, sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{
    neighbor_quorum, EXCHANGE_TIMEOUT, FETCH_DELAY, GOSSIP_INTERVAL, GOSSIP_MESSAGE_BUDGET,
    MAX_NEIGHBOR_TARGETS, PING_INTERVAL, PING_TIMEOUT, POWER_LAW_ALPHA, REGISTER_DELAY,
};
use crate::endpoint::Endpoint;
use crate::overlay::failure::FailureDetector;
use crate::overlay::gossip::{origin_payload, SeenMessages};
use crate::overlay::selection::sample_neighbors;
use crate::seeds::SeedList;
use crate::transport::{self, fire_and_forget, request};
use crate::wire::{self, Inbound, Message, PeersReply, StatusReply};

/// One peer process: identity, discovered world, and accumulated evidence.
pub struct PeerNode {
    me: Endpoint,
    seeds: SeedList,
    /// Seeds that acknowledged our registration; the set we pull from and
    /// report deaths to.
    registered: RwLock<HashSet<Endpoint>>,
    /// Current gossip neighbors. Grows by handshake (ours or theirs);
    /// never pruned locally — eviction is the seeds' call.
    neighbors: RwLock<HashSet<Endpoint>>,
    seen: SeenMessages,
    detector: Mutex<FailureDetector>,
}

impl PeerNode {
    pub fn new(me: Endpoint, seeds: SeedList) -> Arc<Self> {
        Arc::new(Self {
            detector: Mutex::new(FailureDetector::new(me.clone())),
            registered: RwLock::new(HashSet::new()),
            neighbors: RwLock::new(HashSet::new()),
            seen: SeenMessages::new(),
            me,
            seeds,
        })
    }

    /// Runs the peer until the shutdown signal flips. Takes a pre-bound
    /// listener; the caller owns the bind failure.
    pub async fn run(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        info!(peer = %self.me, "peer listener started");

        tokio::spawn(Arc::clone(&self).accept_loop(listener, shutdown.clone()));

        // Let the listener settle before anyone learns our address.
        sleep(REGISTER_DELAY).await;
        self.register_with_seeds().await;

        // Give the seeds' vote fan-out a moment before pulling the list.
        sleep(FETCH_DELAY).await;
        let candidates = self.fetch_peer_list().await;
        self.acquire_neighbors(candidates).await;

        tokio::spawn(Arc::clone(&self).ping_loop(shutdown.clone()));

        // Originator phase: a bounded burst, then settle into idling.
        let mut ticker = interval(GOSSIP_INTERVAL);
        let mut counter = 0u64;
        while counter < GOSSIP_MESSAGE_BUDGET {
            tokio::select! {
                _ = ticker.tick() => {
                    self.originate(counter).await;
                    counter += 1;
                }
                _ = shutdown.changed() => {
                    info!(peer = %self.me, "peer shutting down");
                    return;
                }
            }
        }

        let _ = shutdown.changed().await;
        info!(peer = %self.me, "peer shutting down");
    }

    // -----------------------------------------------------------------
    // Bootstrap
    // -----------------------------------------------------------------

    /// Registers with a uniformly random majority of the configured seeds.
    /// A seed counts as registered only once its acknowledgement arrives.
    async fn register_with_seeds(&self) {
        let picked = {
            let mut rng = rand::thread_rng();
            self.seeds.random_majority(&mut rng)
        };

        let frame = Message::Register {
            ip: self.me.host.clone(),
            port: self.me.port,
        };

        for seed in picked {
            match request::<_, StatusReply>(&seed, &frame, EXCHANGE_TIMEOUT).await {
                Ok(_) => {
                    self.registered.write().insert(seed.clone());
                    info!(seed = %seed, "registration sent to seed");
                }
                Err(e) => warn!(seed = %seed, error = %e, "seed registration failed"),
            }
        }
    }

    /// Pulls the directory from every registered seed and unions the
    /// results in discovery order, self excluded. The order matters: it is
    /// the ranking basis for power-law selection, and it must stay
    /// whatever the network happened to hand us — never sorted.
    async fn fetch_peer_list(&self) -> Vec<Endpoint> {
        let sources: Vec<Endpoint> = self.registered.read().iter().cloned().collect();

        let mut discovered: Vec<Endpoint> = Vec::new();
        for seed in sources {
            match request::<_, PeersReply>(&seed, &Message::GetPeers, EXCHANGE_TIMEOUT).await {
                Ok(reply) => {
                    for peer in reply.peers {
                        if peer != self.me && !discovered.contains(&peer) {
                            discovered.push(peer);
                        }
                    }
                }
                Err(e) => debug!(seed = %seed, error = %e, "peer list fetch failed"),
            }
        }

        info!(count = discovered.len(), peers = ?discovered, "peer list obtained");
        discovered
    }

    /// Power-law-samples neighbor targets and performs the `peer_info`
    /// handshake with each distinct pick.
    async fn acquire_neighbors(&self, candidates: Vec<Endpoint>) {
        let picks = {
            let mut rng = rand::thread_rng();
            sample_neighbors(&candidates, MAX_NEIGHBOR_TARGETS, POWER_LAW_ALPHA, &mut rng)
        };

        // Sampling is with replacement; one handshake per distinct target.
        let mut targets: Vec<Endpoint> = Vec::new();
        for pick in picks {
            if !targets.contains(&pick) {
                targets.push(pick);
            }
        }

        let hello = Message::PeerInfo {
            ip: self.me.host.clone(),
            port: self.me.port,
        };

        for target in targets {
            match fire_and_forget(&target, &hello, EXCHANGE_TIMEOUT).await {
                Ok(()) => {
                    self.neighbors.write().insert(target.clone());
                    info!(neighbor = %target, "neighbor acquired");
                }
                Err(e) => debug!(neighbor = %target, error = %e, "neighbor handshake failed"),
            }
        }
    }

    // -----------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------

    async fn accept_loop(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let node = Arc::clone(&self);
                            tokio::spawn(async move {
                                node.handle_connection(stream, Endpoint::from(addr)).await;
                            });
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
                _ = shutdown.changed() => return,
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, remote: Endpoint) {
        let bytes = match timeout(EXCHANGE_TIMEOUT, transport::read_frame(&mut stream)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                debug!(remote = %remote, error = %e, "dropping connection: unreadable frame");
                return;
            }
            Err(_) => {
                debug!(remote = %remote, "dropping connection: frame never arrived");
                return;
            }
        };

        let message = match wire::decode_inbound(&bytes) {
            Ok(Inbound::Known(message)) => message,
            Ok(Inbound::Unknown(kind)) => {
                debug!(kind = %kind, "ignoring unknown message kind");
                return;
            }
            Err(e) => {
                debug!(remote = %remote, error = %e, "dropping connection: malformed frame");
                return;
            }
        };

        if let Some(reply) = self.handle_message(message, remote).await {
            if let Err(e) = transport::write_frame(&mut stream, &reply).await {
                debug!(error = %e, "reply not delivered");
            }
        }
    }

    /// Dispatches one inbound frame. Returns the reply to write, if the
    /// kind expects one.
    async fn handle_message(&self, message: Message, remote: Endpoint) -> Option<Message> {
        match message {
            Message::PeerInfo { ip, port } => {
                let peer = Endpoint::new(ip, port);
                if peer != self.me {
                    self.neighbors.write().insert(peer.clone());
                    info!(neighbor = %peer, "neighbor added from handshake");
                }
                None
            }

            Message::Gossip { message } => {
                if self.seen.observe(&message) {
                    info!("Gossip received: {message}");
                    self.broadcast(&message, Some(&remote)).await;
                }
                None
            }

            Message::Ping => {
                info!(from = %remote, "Ping received");
                Some(Message::Pong)
            }

            Message::SuspicionVote { suspect, voter } => {
                if suspect == self.me {
                    // Reports of our own death are greatly exaggerated.
                    debug!(voter = %voter, "ignoring suspicion vote naming us");
                    return None;
                }
                let accusers = self.detector.lock().record_accuser(&suspect, voter);
                debug!(suspect = %suspect, accusers, "suspicion vote recorded");
                self.maybe_report(&suspect).await;
                None
            }

            other => {
                debug!(kind = other.kind(), "kind not served by a peer, ignoring");
                None
            }
        }
    }

    // -----------------------------------------------------------------
    // Gossip
    // -----------------------------------------------------------------

    /// Emits one self-originated message. Our own fingerprint goes into
    /// the seen set first, so the copy that loops back through the overlay
    /// is a duplicate, not a fresh arrival to re-flood.
    async fn originate(&self, counter: u64) {
        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let payload = origin_payload(unix_secs, &self.me.host, counter);

        self.seen.observe(&payload);
        info!(payload = %payload, "originating gossip");
        self.broadcast(&payload, None).await;
    }

    /// Sends a gossip frame to a snapshot of the neighbor set, minus an
    /// optional excluded endpoint, with all I/O outside the lock.
    async fn broadcast(&self, text: &str, exclude: Option<&Endpoint>) {
        let targets: Vec<Endpoint> = {
            let neighbors = self.neighbors.read();
            neighbors
                .iter()
                .filter(|n| Some(*n) != exclude)
                .cloned()
                .collect()
        };

        let frame = Message::Gossip {
            message: text.to_string(),
        };
        let sends = targets.iter().map(|target| {
            let frame = &frame;
            async move {
                if let Err(e) = fire_and_forget(target, frame, EXCHANGE_TIMEOUT).await {
                    debug!(neighbor = %target, error = %e, "gossip not delivered");
                }
            }
        });
        join_all(sends).await;
    }

    // -----------------------------------------------------------------
    // Failure detection
    // -----------------------------------------------------------------

    async fn ping_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(PING_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.ping_cycle().await,
                _ = shutdown.changed() => return,
            }
        }
    }

    /// Pings every current neighbor once and feeds the outcomes to the
    /// detector.
    async fn ping_cycle(&self) {
        let targets: Vec<Endpoint> = self.neighbors.read().iter().cloned().collect();

        for neighbor in targets {
            match request::<_, Message>(&neighbor, &Message::Ping, PING_TIMEOUT).await {
                Ok(Message::Pong) => self.detector.lock().ping_succeeded(&neighbor),
                Ok(other) => {
                    // A reply that is not a pong is not a live neighbor.
                    debug!(neighbor = %neighbor, kind = other.kind(), "unexpected ping reply");
                    self.note_ping_failure(&neighbor).await;
                }
                Err(_) => self.note_ping_failure(&neighbor).await,
            }
        }
    }

    async fn note_ping_failure(&self, neighbor: &Endpoint) {
        let escalated = self.detector.lock().ping_failed(neighbor);
        if escalated {
            info!(suspect = %neighbor, "escalating suspicion to the neighborhood");
            self.broadcast_suspicion(neighbor).await;
            self.maybe_report(neighbor).await;
        }
    }

    /// One-hop suspicion vote to every neighbor. No rebroadcast on the
    /// receiving side — the vote graph is a star around each accuser.
    async fn broadcast_suspicion(&self, suspect: &Endpoint) {
        let targets: Vec<Endpoint> = self.neighbors.read().iter().cloned().collect();
        let vote = Message::SuspicionVote {
            suspect: suspect.clone(),
            voter: self.me.clone(),
        };

        let sends = targets.iter().map(|target| {
            let vote = &vote;
            async move {
                if let Err(e) = fire_and_forget(target, vote, EXCHANGE_TIMEOUT).await {
                    debug!(neighbor = %target, error = %e, "suspicion vote not delivered");
                }
            }
        });
        join_all(sends).await;
    }

    /// Checks the neighborhood quorum and, exactly once per suspect, files
    /// the dead-node report with every registered seed.
    async fn maybe_report(&self, suspect: &Endpoint) {
        let quorum = neighbor_quorum(self.neighbors.read().len());
        let fire = self.detector.lock().should_report(suspect, quorum);
        if !fire {
            return;
        }

        info!(suspect = %suspect, quorum, "consensus reached: reporting dead node");

        let report = Message::DeadNode {
            dead_ip: suspect.host.clone(),
            dead_port: suspect.port,
            reporter_ip: self.me.host.clone(),
            reporter_port: self.me.port,
        };

        let seeds: Vec<Endpoint> = self.registered.read().iter().cloned().collect();
        for seed in seeds {
            if let Err(e) = request::<_, StatusReply>(&seed, &report, EXCHANGE_TIMEOUT).await {
                debug!(seed = %seed, error = %e, "dead node report not delivered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ep(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", port)
    }

    fn lone_peer() -> Arc<PeerNode> {
        PeerNode::new(ep(7001), SeedList::from_entries(Vec::new()))
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let node = lone_peer();
        let reply = node.handle_message(Message::Ping, ep(9999)).await;
        assert_eq!(reply, Some(Message::Pong));
    }

    #[tokio::test]
    async fn peer_info_adds_a_neighbor_but_never_self() {
        let node = lone_peer();

        let hello = Message::PeerInfo {
            ip: "127.0.0.1".into(),
            port: 7002,
        };
        assert_eq!(node.handle_message(hello, ep(9999)).await, None);
        assert!(node.neighbors.read().contains(&ep(7002)));

        let own = Message::PeerInfo {
            ip: "127.0.0.1".into(),
            port: 7001,
        };
        node.handle_message(own, ep(9999)).await;
        assert!(!node.neighbors.read().contains(&ep(7001)));
    }

    #[tokio::test]
    async fn gossip_is_deduplicated_by_content() {
        let node = lone_peer();
        let gossip = Message::Gossip {
            message: "1700000000:127.0.0.1:0".into(),
        };

        node.handle_message(gossip.clone(), ep(9999)).await;
        assert_eq!(node.seen.len(), 1);

        // Same payload from a different sender: still one message.
        node.handle_message(gossip, ep(8888)).await;
        assert_eq!(node.seen.len(), 1);
    }

    #[tokio::test]
    async fn suspicion_votes_naming_us_are_ignored() {
        let node = lone_peer();
        let vote = Message::SuspicionVote {
            suspect: ep(7001),
            voter: ep(7002),
        };
        node.handle_message(vote, ep(9999)).await;
        assert_eq!(node.detector.lock().accuser_count(&ep(7001)), 0);
    }

    #[tokio::test]
    async fn votes_accumulate_before_any_local_strike() {
        let node = lone_peer();
        for voter in [7002u16, 7003] {
            let vote = Message::SuspicionVote {
                suspect: ep(7004),
                voter: ep(voter),
            };
            node.handle_message(vote, ep(9999)).await;
        }
        assert_eq!(node.detector.lock().accuser_count(&ep(7004)), 2);
    }

    #[tokio::test]
    async fn quorum_report_reaches_each_registered_seed_exactly_once() {
        // A fake seed that counts dead-node reports.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let seed_ep = Endpoint::from(listener.local_addr().unwrap());
        let reports = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reports);
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let bytes = transport::read_frame(&mut stream).await.unwrap();
                if let Ok(Message::DeadNode { .. }) = wire::decode(&bytes) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                let _ = transport::write_frame(&mut stream, &StatusReply::received()).await;
            }
        });

        let node = lone_peer();
        node.registered.write().insert(seed_ep);
        // Two neighbors: QN = 2.
        node.neighbors.write().insert(ep(7004));
        node.neighbors.write().insert(ep(7005));

        let suspect = ep(7004);
        {
            let mut detector = node.detector.lock();
            // Two strikes escalate and file our own vote.
            detector.ping_failed(&suspect);
            assert!(detector.ping_failed(&suspect));
            // A neighbor's vote completes the quorum.
            detector.record_accuser(&suspect, ep(7005));
        }

        node.maybe_report(&suspect).await;
        node.maybe_report(&suspect).await;

        assert_eq!(reports.load(Ordering::SeqCst), 1);
    }
}
