//! # Seed Service
//!
//! The long-running seed process: accept loop, per-connection dispatch,
//! and the vote fan-out that keeps the seed quorum in agreement. All
//! engine access happens under one mutex and never spans an await — every
//! handler locks, mutates, unlocks, and only then touches the network.
//!
//! Fan-out failures are swallowed by design. A seed that cannot reach its
//! siblings keeps serving; transitions simply stall until enough of the
//! quorum is reachable again. Safety never depends on delivery.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::EXCHANGE_TIMEOUT;
use crate::directory::engine::DirectoryEngine;
use crate::endpoint::Endpoint;
use crate::seeds::SeedList;
use crate::transport::{self, fire_and_forget};
use crate::wire::{self, Inbound, Message, PeersReply, StatusReply};

/// How long a handler waits for the inbound frame to arrive before giving
/// up on the connection.
const INBOUND_FRAME_TIMEOUT: Duration = EXCHANGE_TIMEOUT;

/// One seed directory process.
pub struct SeedNode {
    me: Endpoint,
    seeds: SeedList,
    engine: Mutex<DirectoryEngine>,
}

impl SeedNode {
    /// Creates a seed anchored on the configured seed list. The quorum is
    /// fixed here, once, from the list length.
    pub fn new(me: Endpoint, seeds: SeedList) -> Arc<Self> {
        let quorum = seeds.quorum();
        Arc::new(Self {
            engine: Mutex::new(DirectoryEngine::new(me.clone(), quorum)),
            me,
            seeds,
        })
    }

    /// Serves the directory until the shutdown signal flips.
    ///
    /// Takes a pre-bound listener so the caller owns the bind (and its
    /// failure mode: a port already in use is fatal at startup, not here).
    pub async fn run(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        info!(
            seed = %self.me,
            quorum = self.seeds.quorum(),
            seeds = self.seeds.len(),
            "seed directory started"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let node = Arc::clone(&self);
                            tokio::spawn(async move {
                                node.handle_connection(stream).await;
                                debug!(remote = %addr, "connection done");
                            });
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!(seed = %self.me, "seed shutting down");
                    return;
                }
            }
        }
    }

    /// Reads one frame, dispatches it, maybe writes one reply, done.
    async fn handle_connection(&self, mut stream: TcpStream) {
        let bytes = match timeout(INBOUND_FRAME_TIMEOUT, transport::read_frame(&mut stream)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                debug!(error = %e, "dropping connection: unreadable frame");
                return;
            }
            Err(_) => {
                debug!("dropping connection: frame never arrived");
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
                debug!(error = %e, "dropping connection: malformed frame");
                return;
            }
        };

        match message {
            Message::Register { ip, port } => {
                let peer = Endpoint::new(ip, port);
                info!(peer = %peer, "registration proposal");

                let outcome = self.engine.lock().propose_register(peer.clone());
                if outcome.applied {
                    info!(peer = %peer, votes = outcome.votes, "peer registered via consensus");
                }

                if let Err(e) = transport::write_frame(&mut stream, &StatusReply::pending()).await {
                    debug!(error = %e, "register reply not delivered");
                }

                self.fan_out(Message::RegisterVote {
                    peer,
                    voter: self.me.clone(),
                })
                .await;
            }

            Message::RegisterVote { peer, voter } => {
                let outcome = self.engine.lock().merge_register_vote(peer.clone(), voter);
                if outcome.applied {
                    info!(peer = %peer, votes = outcome.votes, "peer registered via consensus");
                }
            }

            Message::GetPeers => {
                let peers = self.engine.lock().snapshot();
                let reply = PeersReply { peers };
                if let Err(e) = transport::write_frame(&mut stream, &reply).await {
                    debug!(error = %e, "get_peers reply not delivered");
                }
            }

            Message::DeadNode {
                dead_ip,
                dead_port,
                reporter_ip,
                reporter_port,
            } => {
                let dead = Endpoint::new(dead_ip, dead_port);
                let reporter = Endpoint::new(reporter_ip, reporter_port);
                info!(peer = %dead, reporter = %reporter, "dead node proposal");

                let outcome = self.engine.lock().propose_dead(dead.clone());
                if outcome.applied {
                    info!(peer = %dead, votes = outcome.votes, "peer removed via consensus");
                }

                if let Err(e) = transport::write_frame(&mut stream, &StatusReply::received()).await {
                    debug!(error = %e, "dead_node reply not delivered");
                }

                self.fan_out(Message::DeadVote {
                    peer: dead,
                    voter: self.me.clone(),
                })
                .await;
            }

            Message::DeadVote { peer, voter } => {
                let outcome = self.engine.lock().merge_dead_vote(peer.clone(), voter);
                if outcome.applied {
                    info!(peer = %peer, votes = outcome.votes, "peer removed via consensus");
                }
            }

            // Peer-to-peer kinds have no business at a seed. Ignore, like
            // any other kind we do not serve.
            other => {
                debug!(kind = other.kind(), "kind not served by the directory, ignoring");
            }
        }
    }

    /// Sends a vote to every other configured seed. Merges arriving at the
    /// siblings re-check their tallies; there is deliberately no
    /// re-broadcast on merge, so a vote travels exactly one hop.
    async fn fan_out(&self, vote: Message) {
        let targets = self.seeds.others(&self.me);
        let sends = targets.iter().map(|target| {
            let vote = &vote;
            async move {
                if let Err(e) = fire_and_forget(target, vote, EXCHANGE_TIMEOUT).await {
                    debug!(target = %target, error = %e, "vote not delivered");
                }
            }
        });
        join_all(sends).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::request;
    use std::time::Duration;

    async fn bound_listener() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = Endpoint::from(listener.local_addr().unwrap());
        (listener, endpoint)
    }

    fn seed_list(endpoints: &[Endpoint]) -> SeedList {
        SeedList::from_entries(endpoints.to_vec())
    }

    #[tokio::test]
    async fn lone_seed_registers_and_serves_peers() {
        let (listener, me) = bound_listener().await;
        let seeds = seed_list(std::slice::from_ref(&me));
        let (tx, rx) = watch::channel(false);
        tokio::spawn(SeedNode::new(me.clone(), seeds).run(listener, rx));

        let reply: StatusReply = request(
            &me,
            &Message::Register {
                ip: "127.0.0.1".into(),
                port: 7001,
            },
            EXCHANGE_TIMEOUT,
        )
        .await
        .unwrap();
        assert_eq!(reply, StatusReply::pending());

        let peers: PeersReply = request(&me, &Message::GetPeers, EXCHANGE_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(peers.peers, vec![Endpoint::new("127.0.0.1", 7001)]);

        drop(tx);
    }

    #[tokio::test]
    async fn majority_registration_reaches_every_seed() {
        // Three seeds, Q = 2: register with two of them and the third
        // must still learn the peer through the vote fan-out.
        let (l1, s1) = bound_listener().await;
        let (l2, s2) = bound_listener().await;
        let (l3, s3) = bound_listener().await;
        let all = seed_list(&[s1.clone(), s2.clone(), s3.clone()]);

        let (tx, rx) = watch::channel(false);
        tokio::spawn(SeedNode::new(s1.clone(), all.clone()).run(l1, rx.clone()));
        tokio::spawn(SeedNode::new(s2.clone(), all.clone()).run(l2, rx.clone()));
        tokio::spawn(SeedNode::new(s3.clone(), all.clone()).run(l3, rx));

        let register = Message::Register {
            ip: "127.0.0.1".into(),
            port: 7001,
        };
        let _: StatusReply = request(&s1, &register, EXCHANGE_TIMEOUT).await.unwrap();
        let _: StatusReply = request(&s2, &register, EXCHANGE_TIMEOUT).await.unwrap();

        // Let the fan-out settle.
        tokio::time::sleep(Duration::from_millis(300)).await;

        for seed in [&s1, &s2, &s3] {
            let peers: PeersReply = request(seed, &Message::GetPeers, EXCHANGE_TIMEOUT)
                .await
                .unwrap();
            assert_eq!(
                peers.peers,
                vec![Endpoint::new("127.0.0.1", 7001)],
                "seed {seed} should hold the registrant"
            );
        }

        drop(tx);
    }

    #[tokio::test]
    async fn death_quorum_evicts_the_peer() {
        let (l1, s1) = bound_listener().await;
        let (l2, s2) = bound_listener().await;
        let all = seed_list(&[s1.clone(), s2.clone()]);

        let (tx, rx) = watch::channel(false);
        tokio::spawn(SeedNode::new(s1.clone(), all.clone()).run(l1, rx.clone()));
        tokio::spawn(SeedNode::new(s2.clone(), all.clone()).run(l2, rx));

        let register = Message::Register {
            ip: "127.0.0.1".into(),
            port: 7004,
        };
        let _: StatusReply = request(&s1, &register, EXCHANGE_TIMEOUT).await.unwrap();
        let _: StatusReply = request(&s2, &register, EXCHANGE_TIMEOUT).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Both seeds get the dead-node report; Q = 2 evicts.
        let report = Message::DeadNode {
            dead_ip: "127.0.0.1".into(),
            dead_port: 7004,
            reporter_ip: "127.0.0.1".into(),
            reporter_port: 7001,
        };
        let _: StatusReply = request(&s1, &report, EXCHANGE_TIMEOUT).await.unwrap();
        let _: StatusReply = request(&s2, &report, EXCHANGE_TIMEOUT).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        for seed in [&s1, &s2] {
            let peers: PeersReply = request(seed, &Message::GetPeers, EXCHANGE_TIMEOUT)
                .await
                .unwrap();
            assert!(peers.peers.is_empty(), "seed {seed} should have evicted");
        }

        drop(tx);
    }

    #[tokio::test]
    async fn unknown_kinds_and_garbage_leave_no_trace() {
        let (listener, me) = bound_listener().await;
        let seeds = seed_list(std::slice::from_ref(&me));
        let (tx, rx) = watch::channel(false);
        tokio::spawn(SeedNode::new(me.clone(), seeds).run(listener, rx));

        // Unknown kind: silently ignored.
        let unknown = serde_json::json!({"type": "teleport", "to": "the moon"});
        let _ = fire_and_forget(&me, &unknown, EXCHANGE_TIMEOUT).await;

        // Garbage: connection dropped, no state change.
        use tokio::io::AsyncWriteExt;
        let mut raw = tokio::net::TcpStream::connect(me.as_dial_pair()).await.unwrap();
        raw.write_all(b"definitely not json").await.unwrap();
        drop(raw);

        let peers: PeersReply = request(&me, &Message::GetPeers, EXCHANGE_TIMEOUT)
            .await
            .unwrap();
        assert!(peers.peers.is_empty());

        drop(tx);
    }
}
