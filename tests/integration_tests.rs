//! Integration tests for the world server
//!
//! These tests drive the dispatch loop through the public API with a manual
//! clock, and exercise the UDP front-end end to end.

use bincode::{deserialize, serialize};
use server::clock::{ManualClock, MonotonicClock};
use server::config::EngineConfig;
use server::context::OperationContext;
use server::dispatcher::MemoryOutbound;
use server::factory::{DefaultOperationFactory, OperationArgs, OperationFactory};
use server::game::Game;
use server::notification::CreatureSpokeNotification;
use server::operation::{Operation, OperationError, Outcome};
use server::operations::{AttackOperation, AutoAttackOperation, MoveOperation, SpeechOperation};
use server::scheduler::Scheduler;
use shared::{CreatureId, Direction, Location, OperationKind, Packet, CLIENT_VERSION};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Game on a manual clock that starts at t=0.
fn manual_game() -> (Game, Arc<ManualClock>, Arc<MemoryOutbound>) {
    let clock = Arc::new(ManualClock::new(0));
    let outbound = Arc::new(MemoryOutbound::new());
    let game = Game::new(
        EngineConfig::default(),
        Scheduler::new(clock.clone()),
        outbound.clone(),
    )
    .with_seed(11);
    (game, clock, outbound)
}

fn add_player(game: &mut Game, id: CreatureId, x: i32, y: i32) {
    let player = game
        .config()
        .player(id, &format!("Player{}", id), Location::new(x, y, 7));
    game.world_mut().add_creature(player).unwrap();
}

/// Records the time and label of every execution.
struct Recorded {
    label: &'static str,
    actor: CreatureId,
    log: Arc<Mutex<Vec<(&'static str, u64)>>>,
}

impl Recorded {
    fn boxed(label: &'static str, actor: CreatureId, log: &Arc<Mutex<Vec<(&'static str, u64)>>>) -> Box<dyn Operation> {
        Box::new(Recorded {
            label,
            actor,
            log: Arc::clone(log),
        })
    }
}

impl Operation for Recorded {
    fn kind(&self) -> OperationKind {
        OperationKind::Movement
    }

    fn requestor(&self) -> CreatureId {
        self.actor
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        self.log.lock().unwrap().push((self.label, ctx.now()));
        Ok(Outcome::Completed)
    }
}

/// ENGINE SCENARIOS
mod engine_tests {
    use super::*;

    /// An operation never runs before its due time.
    #[test]
    fn operation_runs_at_due_time() {
        let (mut game, clock, _) = manual_game();
        let log = Arc::new(Mutex::new(Vec::new()));
        game.scheduler().schedule_at(Recorded::boxed("east", 1, &log), 100);

        clock.set(99);
        assert_eq!(game.run_pending(), 0);
        assert!(log.lock().unwrap().is_empty());

        clock.set(100);
        assert_eq!(game.run_pending(), 1);
        assert_eq!(*log.lock().unwrap(), vec![("east", 100)]);
    }

    /// Items with the same due time run in insertion order.
    #[test]
    fn equal_due_times_run_fifo() {
        let (mut game, clock, _) = manual_game();
        let log = Arc::new(Mutex::new(Vec::new()));
        for label in ["a", "b", "c", "d"] {
            game.scheduler()
                .schedule(Recorded::boxed(label, 1, &log), Duration::from_millis(50));
        }
        game.scheduler()
            .schedule(Recorded::boxed("early", 1, &log), Duration::from_millis(10));

        clock.advance(Duration::from_millis(50));
        game.run_pending();

        let order: Vec<_> = log.lock().unwrap().iter().map(|(label, _)| *label).collect();
        assert_eq!(order, vec!["early", "a", "b", "c", "d"]);
    }

    /// Ticks that schedule one follow-up each, repeating every 2000ms.
    struct Tick {
        runs: Arc<AtomicUsize>,
        followups: Arc<Mutex<Vec<(&'static str, u64)>>>,
    }

    impl Operation for Tick {
        fn kind(&self) -> OperationKind {
            OperationKind::AutoAttack
        }

        fn requestor(&self) -> CreatureId {
            7
        }

        fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            ctx.schedule(Recorded::boxed("swing", 7, &self.followups), Duration::ZERO);
            Ok(Outcome::Completed)
        }

        fn repeat_after(&self) -> Option<Duration> {
            Some(Duration::from_millis(2000))
        }
    }

    #[test]
    fn repeating_operation_runs_once_per_interval() {
        let (mut game, clock, _) = manual_game();
        let runs = Arc::new(AtomicUsize::new(0));
        let followups = Arc::new(Mutex::new(Vec::new()));
        let handle = game.scheduler().schedule(
            Box::new(Tick {
                runs: Arc::clone(&runs),
                followups: Arc::clone(&followups),
            }),
            Duration::ZERO,
        );

        for cycle in 0..3 {
            game.run_pending();
            assert_eq!(runs.load(Ordering::SeqCst), cycle + 1);
            clock.advance(Duration::from_millis(2000));
        }

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        let times: Vec<_> = followups.lock().unwrap().iter().map(|(_, at)| *at).collect();
        assert_eq!(times, vec![0, 2000, 4000]);

        // Still pending under its original handle.
        assert!(game.scheduler().cancel_handle(handle));
    }

    #[test]
    fn second_attack_waits_out_combat_exhaustion() {
        let (mut game, clock, _) = manual_game();
        add_player(&mut game, 7, 10, 10);
        add_player(&mut game, 8, 11, 10);
        let cost = Duration::from_millis(2000);

        game.scheduler()
            .schedule_throttled(Box::new(AttackOperation::new(7, 8, cost)), Duration::ZERO);
        game.run_pending();

        clock.advance(Duration::from_millis(500));
        let second = AttackOperation::new(7, 8, cost);
        assert!(game.scheduler().throttle_delay(&second) >= Duration::from_millis(1500));

        game.scheduler()
            .schedule_throttled(Box::new(second), Duration::ZERO);
        assert_eq!(game.scheduler().next_due(), Some(2000));
    }

    #[test]
    fn cancel_by_kind_spares_other_kinds() {
        let (game, _, _) = manual_game();
        let scheduler = game.scheduler();
        scheduler.schedule(Box::new(MoveOperation::new(3, Direction::East)), Duration::from_millis(100));
        scheduler.schedule(Box::new(MoveOperation::new(3, Direction::North)), Duration::from_millis(200));
        scheduler.schedule(Box::new(MoveOperation::new(4, Direction::North)), Duration::from_millis(200));
        scheduler.schedule(
            Box::new(SpeechOperation::new(3, "hi".to_string(), Duration::from_secs(1))),
            Duration::from_millis(100),
        );

        assert_eq!(scheduler.cancel_kind_for(3, OperationKind::Movement), 2);
        assert_eq!(scheduler.pending_count(), 2);
        assert_eq!(scheduler.cancel_kind_for(3, OperationKind::Speech), 1);
    }

    #[test]
    fn cancelled_operation_never_runs() {
        let (mut game, clock, _) = manual_game();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = game
            .scheduler()
            .schedule(Recorded::boxed("doomed", 1, &log), Duration::from_millis(100));

        assert!(game.scheduler().cancel_handle(handle));
        assert!(!game.scheduler().cancel_handle(handle));

        clock.advance(Duration::from_secs(1));
        game.run_pending();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(game.scheduler().pending_count(), 0);
    }

    #[test]
    fn auto_attack_hits_every_interval() {
        let (mut game, clock, _) = manual_game();
        add_player(&mut game, 7, 10, 10);
        add_player(&mut game, 8, 11, 10);
        game.scheduler().schedule(
            Box::new(AutoAttackOperation::new(7, 8, Duration::from_millis(2000))),
            Duration::ZERO,
        );

        let mut last = game.world().find_actor(8).unwrap().hitpoints;
        for _ in 0..3 {
            game.run_pending();
            let now = game.world().find_actor(8).unwrap().hitpoints;
            assert!(now < last);
            last = now;
            clock.advance(Duration::from_millis(2000));
        }
    }
}

/// THROTTLING AND DELIVERY
mod gameplay_tests {
    use super::*;

    #[test]
    fn early_speech_is_deferred_not_dropped() {
        let (mut game, clock, outbound) = manual_game();
        add_player(&mut game, 1, 10, 10);
        for text in ["first", "second"] {
            game.scheduler().schedule(
                Box::new(SpeechOperation::new(1, text.to_string(), Duration::from_secs(1))),
                Duration::ZERO,
            );
        }

        game.run_pending();
        assert_eq!(outbound.take().len(), 1);
        assert_eq!(game.scheduler().pending_count(), 1);

        clock.advance(Duration::from_secs(1));
        game.run_pending();
        assert_eq!(
            outbound.sent_to(1),
            vec![Packet::CreatureSpoke {
                creature_id: 1,
                name: "Player1".to_string(),
                text: "second".to_string(),
            }]
        );
    }

    #[test]
    fn spectators_resolve_when_dispatched() {
        let (mut game, clock, outbound) = manual_game();
        add_player(&mut game, 1, 10, 10);
        add_player(&mut game, 4, 9, 9);
        game.scheduler().schedule_notification(
            Box::new(CreatureSpokeNotification {
                creature_id: 1,
                name: "Player1".to_string(),
                text: "anyone there?".to_string(),
                location: Location::new(10, 10, 7),
            }),
            Duration::from_millis(500),
        );

        // Arrives after scheduling but before dispatch.
        add_player(&mut game, 2, 12, 11);
        // Out of view.
        add_player(&mut game, 3, 40, 40);
        // Walks away before dispatch.
        game.world_mut()
            .move_creature(4, Location::new(30, 30, 7))
            .unwrap();

        clock.advance(Duration::from_millis(500));
        game.run_pending();

        assert_eq!(outbound.sent_to(1).len(), 1);
        assert_eq!(outbound.sent_to(2).len(), 1);
        assert!(outbound.sent_to(3).is_empty());
        assert!(outbound.sent_to(4).is_empty());
    }

    #[test]
    fn login_and_logout_through_the_factory() {
        let (mut game, _, outbound) = manual_game();
        let factory = game.factory();
        let login = factory
            .create(OperationArgs::Login {
                creature_id: 1,
                name: "Alice".to_string(),
            })
            .unwrap();
        game.scheduler().schedule(login, Duration::ZERO);
        game.run_pending();

        let temple = game.config().temple;
        let alice = game.world().find_actor(1).unwrap();
        assert!(alice.location.is_adjacent_to(&temple) || alice.location == temple);
        assert!(outbound
            .sent_to(1)
            .iter()
            .any(|packet| matches!(packet, Packet::PlayerStats { .. })));
        // Regeneration is running.
        assert_eq!(game.scheduler().pending_count(), 1);

        let logout = factory.create(OperationArgs::Logout { creature_id: 1 }).unwrap();
        game.scheduler().schedule(logout, Duration::ZERO);
        game.run_pending();

        assert!(game.world().find_actor(1).is_none());
        assert_eq!(game.scheduler().pending_count(), 0);
    }

    #[test]
    fn invalid_requests_are_rejected_before_scheduling() {
        let factory = DefaultOperationFactory::new(EngineConfig::default());

        assert!(factory
            .create(OperationArgs::Attack {
                attacker: 5,
                target: 5,
            })
            .is_err());
        assert!(factory
            .create(OperationArgs::Speech {
                creature_id: 5,
                text: String::new(),
            })
            .is_err());
    }
}

/// FAULT ISOLATION
mod fault_tests {
    use super::*;

    struct Failing {
        panic: bool,
    }

    impl Operation for Failing {
        fn kind(&self) -> OperationKind {
            OperationKind::Attack
        }

        fn requestor(&self) -> CreatureId {
            1
        }

        fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
            ctx.schedule(Box::new(MoveOperation::new(1, Direction::East)), Duration::ZERO);
            ctx.notify(Box::new(CreatureSpokeNotification {
                creature_id: 1,
                name: "Player1".to_string(),
                text: "never said".to_string(),
                location: Location::new(10, 10, 7),
            }));
            if self.panic {
                panic!("operation blew up");
            }
            Err(OperationError::Fault("gave up".to_string()))
        }
    }

    #[test]
    fn failures_do_not_stop_the_loop() {
        let (mut game, _, outbound) = manual_game();
        add_player(&mut game, 1, 10, 10);
        let log = Arc::new(Mutex::new(Vec::new()));

        game.scheduler()
            .schedule(Box::new(Failing { panic: false }), Duration::ZERO);
        game.scheduler()
            .schedule(Box::new(Failing { panic: true }), Duration::ZERO);
        game.scheduler()
            .schedule(Recorded::boxed("survivor", 1, &log), Duration::ZERO);

        assert_eq!(game.run_pending(), 3);
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(outbound.is_empty());
        assert_eq!(game.scheduler().pending_count(), 0);
        assert_eq!(
            game.world().find_actor(1).unwrap().location,
            Location::new(10, 10, 7)
        );
    }

    #[test]
    fn shutdown_leaves_pending_work_unprocessed() {
        let (mut game, _, _) = manual_game();
        let log = Arc::new(Mutex::new(Vec::new()));
        game.scheduler()
            .schedule(Recorded::boxed("late", 1, &log), Duration::ZERO);

        game.scheduler().shutdown();

        assert_eq!(game.run_pending(), 0);
        assert!(log.lock().unwrap().is_empty());
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;
    use server::network::{Server, ServerMessage};
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    /// Tests packet serialization round-trip for network protocol validation
    #[test]
    fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::Connect {
                client_version: CLIENT_VERSION,
                name: "Alice".to_string(),
            },
            Packet::Say {
                text: "hello".to_string(),
            },
            Packet::Connected { creature_id: 42 },
            Packet::Disconnected {
                reason: "Test".to_string(),
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();
            assert_eq!(deserialized, packet);
        }
    }

    async fn recv(socket: &UdpSocket) -> Packet {
        let mut buf = [0u8; 2048];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("server did not answer")
            .unwrap();
        deserialize(&buf[..len]).unwrap()
    }

    /// Tests a full login over real UDP sockets
    #[tokio::test]
    async fn udp_login_round_trip() {
        let config = EngineConfig {
            spawn_points: Vec::new(),
            ..EngineConfig::default()
        };
        let scheduler = Scheduler::new(Arc::new(MonotonicClock::new()));
        let factory: Arc<dyn OperationFactory> =
            Arc::new(DefaultOperationFactory::new(config.clone()));
        let mut server = Server::new(
            "127.0.0.1:0",
            4,
            Duration::from_secs(5),
            scheduler.clone(),
            Arc::clone(&factory),
        )
        .await
        .unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control();
        let mut game = Game::new(config, scheduler.clone(), server.outbound()).with_factory(factory);

        let game_handle = tokio::spawn(async move { game.run().await });
        let server_handle = tokio::spawn(async move { server.run().await.is_ok() });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = Packet::Connect {
            client_version: CLIENT_VERSION,
            name: "Alice".to_string(),
        };
        client
            .send_to(&serialize(&connect).unwrap(), server_addr)
            .await
            .unwrap();

        assert_eq!(recv(&client).await, Packet::Connected { creature_id: 1 });
        assert!(matches!(
            recv(&client).await,
            Packet::PlayerStats {
                hitpoints: 150,
                max_hitpoints: 150
            }
        ));

        control.send(ServerMessage::Shutdown).unwrap();
        scheduler.shutdown();
        assert!(server_handle.await.unwrap());
        game_handle.await.unwrap();
    }

    /// Tests that clients with a different protocol version are refused
    #[tokio::test]
    async fn udp_version_mismatch_is_refused() {
        let scheduler = Scheduler::new(Arc::new(MonotonicClock::new()));
        let factory: Arc<dyn OperationFactory> =
            Arc::new(DefaultOperationFactory::new(EngineConfig::default()));
        let mut server = Server::new("127.0.0.1:0", 4, Duration::from_secs(5), scheduler, factory)
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control();
        let server_handle = tokio::spawn(async move { server.run().await.is_ok() });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = Packet::Connect {
            client_version: CLIENT_VERSION + 1,
            name: "Mallory".to_string(),
        };
        client
            .send_to(&serialize(&connect).unwrap(), server_addr)
            .await
            .unwrap();

        assert!(matches!(recv(&client).await, Packet::Disconnected { .. }));

        control.send(ServerMessage::Shutdown).unwrap();
        assert!(server_handle.await.unwrap());
    }
}
