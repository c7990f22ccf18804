//! Performance benchmarks for critical engine paths

use server::clock::ManualClock;
use server::config::EngineConfig;
use server::context::OperationContext;
use server::dispatcher::{Dispatcher, MemoryOutbound};
use server::game::Game;
use server::notification::CreatureMovedNotification;
use server::operation::{Operation, OperationError, Outcome};
use server::operations::MoveOperation;
use server::pathfinding::{GreedyPathFinder, PathConstraints, PathFinder};
use server::scheduler::Scheduler;
use shared::{CreatureId, Direction, Location, OperationKind};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Noop {
    actor: CreatureId,
}

impl Operation for Noop {
    fn kind(&self) -> OperationKind {
        OperationKind::Think
    }

    fn requestor(&self) -> CreatureId {
        self.actor
    }

    fn execute(&mut self, _ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError> {
        Ok(Outcome::Completed)
    }
}

/// Benchmarks scheduling and draining through the dispatch loop
#[test]
fn benchmark_schedule_and_dispatch() {
    let clock = Arc::new(ManualClock::new(0));
    let mut game = Game::new(
        EngineConfig::default(),
        Scheduler::new(clock.clone()),
        Arc::new(MemoryOutbound::new()),
    );

    let iterations = 100_000u64;
    let start = Instant::now();

    for i in 0..iterations {
        game.scheduler().schedule(
            Box::new(Noop { actor: (i % 64) as CreatureId + 1 }),
            Duration::from_millis(i % 1000),
        );
    }
    clock.advance(Duration::from_secs(1));
    let processed = game.run_pending();

    let duration = start.elapsed();
    println!(
        "Schedule + dispatch: {} operations in {:?} ({:.2} ns/op)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(processed as u64, iterations);
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks cancellation of a large pending set
#[test]
fn benchmark_cancellation() {
    let scheduler = Scheduler::new(Arc::new(ManualClock::new(0)));
    let actors = 1_000;
    for i in 0..50_000u32 {
        scheduler.schedule(
            Box::new(MoveOperation::new(i % actors + 1, Direction::East)),
            Duration::from_millis(100),
        );
    }

    let start = Instant::now();
    let mut cancelled = 0;
    for actor in 1..=100 {
        cancelled += scheduler.cancel_kind_for(actor, OperationKind::Movement);
    }

    let duration = start.elapsed();
    println!(
        "Cancellation: 100 actor sweeps over 50k items in {:?}",
        duration
    );

    assert_eq!(cancelled, 5_000);
    assert_eq!(scheduler.pending_count(), 45_000);
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks notification fan-out to a crowded screen
#[test]
fn benchmark_notification_dispatch() {
    let config = EngineConfig::default();
    let mut world = config.build_world();
    for id in 1..=60 {
        let location = Location::new(40 + (id % 10) as i32, 40 + (id / 10) as i32, 7);
        world.add_creature(config.player(id, "Watcher", location)).unwrap();
    }
    let outbound = Arc::new(MemoryOutbound::new());
    let dispatcher = Dispatcher::new(outbound.clone());
    let notification = CreatureMovedNotification {
        creature_id: 1,
        from: Location::new(41, 40, 7),
        to: Location::new(41, 40, 7),
    };

    let iterations = 10_000;
    let start = Instant::now();

    let mut delivered = 0;
    for _ in 0..iterations {
        delivered += dispatcher.dispatch(&world, &notification);
        outbound.take();
    }

    let duration = start.elapsed();
    println!(
        "Notification dispatch: {} notifications in {:?} ({:.2} μs/notification)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(delivered, 60 * iterations);
    // Should complete in under 10 seconds
    assert!(duration.as_millis() < 10_000);
}

/// Benchmarks path search across open ground
#[test]
fn benchmark_pathfinding() {
    let world = EngineConfig::default().build_world();
    let finder = GreedyPathFinder;
    let constraints = PathConstraints {
        max_steps: 64,
        stop_adjacent: false,
    };

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let from = Location::new(10 + (i % 5), 10, 7);
        let path = finder
            .find_path(&world, from, Location::new(40, 35, 7), constraints)
            .unwrap();
        assert!(!path.is_empty());
    }

    let duration = start.elapsed();
    println!(
        "Pathfinding: {} searches in {:?} ({:.2} μs/search)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}
