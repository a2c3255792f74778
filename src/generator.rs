//! Train arrival generator. Once per tick it either admits one new
//! train or, under overload, holds admissions until the queues drain.
//! The overload state machine lives here because its transitions are
//! only evaluated on generator ticks.

use crate::logfiles::{ControlEvent, LogHandle};
use crate::state::{CoreState, OverloadState, Shared, SimConfig};
use crate::train::{Direction, Train};
use chrono::{DateTime, Local};
use log::*;
use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// What a single generator tick decided, so the thread loop can log
/// and signal outside the lock.
#[derive(Debug)]
pub enum TickOutcome {
    /// Overloaded and still draining; no admission.
    Suppressed,
    /// Aggregate depth crossed the threshold; admissions stop.
    EnteredOverload { waiting: Vec<u64> },
    /// Every queue drained; admissions resume.
    ClearedOverload { secs: u64 },
    /// One train admitted and enqueued.
    Admitted { id: u64, direction: Direction },
}

/// Draw one train from the arrival distribution: length 100 with
/// probability 0.7 else 200; origin in the A/E/F group with
/// probability `p` (uniform thirds within the group) else B; the
/// destination a 50/50 pick between the route's two stations.
pub fn draw_train(
    id: u64,
    config: &SimConfig,
    now: DateTime<Local>,
    rng: &mut impl Rng,
) -> (Direction, Train) {
    let length = if rng.random::<f64>() < config.short_train_probability {
        100
    } else {
        200
    };
    let direction = if rng.random::<f64>() < config.p {
        let side = rng.random::<f64>();
        if side < 1.0 / 3.0 {
            Direction::AC
        } else if side < 2.0 / 3.0 {
            Direction::FD
        } else {
            Direction::ED
        }
    } else {
        Direction::BC
    };
    let [near, far] = direction.destinations();
    let destination = if rng.random::<f64>() < 0.5 { near } else { far };
    let train = Train {
        id,
        length,
        speed: config.train_speed,
        starting_point: direction.origin(),
        destination_point: destination,
        arrival_time: now,
        departure_time: None,
    };
    (direction, train)
}

/// One generator tick over the locked core state.
pub fn tick(
    core: &mut CoreState,
    config: &SimConfig,
    rng: &mut impl Rng,
    now: DateTime<Local>,
) -> TickOutcome {
    let total = core.queues.total_size();
    match core.overload {
        OverloadState::Overloaded { .. } if total > 0 => TickOutcome::Suppressed,
        OverloadState::Overloaded { since } => {
            core.overload = OverloadState::Normal;
            TickOutcome::ClearedOverload {
                secs: since.elapsed().as_secs(),
            }
        }
        OverloadState::Normal if total > config.overload_threshold => {
            core.overload = OverloadState::Overloaded {
                since: Instant::now(),
            };
            TickOutcome::EnteredOverload {
                waiting: core.queues.waiting_ids(),
            }
        }
        OverloadState::Normal => {
            let id = core.next_train_id;
            core.next_train_id += 1;
            let (direction, train) = draw_train(id, config, now, rng);
            core.queues.enqueue(direction, train);
            TickOutcome::Admitted { id, direction }
        }
    }
}

/// Generator thread loop: tick under the lock, report outside it,
/// sleep one tick, until shutdown.
pub fn run(shared: &Arc<Shared>, sink: &LogHandle) {
    let mut rng = rand::rng();
    let config = &shared.config;
    while !shared.shutdown_requested() {
        let outcome = {
            let mut core = shared.lock();
            tick(&mut core, config, &mut rng, Local::now())
        };
        match outcome {
            TickOutcome::Suppressed => {
                info!("system overloaded, waiting for all trains to clear the tunnel");
            }
            TickOutcome::EnteredOverload { waiting } => {
                warn!("system overload, suspending train arrivals");
                sink.control(ControlEvent::SystemOverload, None, waiting);
            }
            TickOutcome::ClearedOverload { secs } => {
                info!("overload cleared after {} secs, resuming train arrivals", secs);
                sink.tunnel_cleared(secs);
            }
            TickOutcome::Admitted { id, direction } => {
                info!("train {} arrived at {:?}", id, direction);
                shared.notify_one();
            }
        }
        thread::sleep(config.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queues::QueueStore;
    use crate::train::Station;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn core() -> CoreState {
        CoreState {
            queues: QueueStore::new(),
            tunnel_occupied: false,
            overload: OverloadState::Normal,
            next_train_id: 0,
        }
    }

    #[test]
    fn p_zero_admits_only_from_b() {
        let config = SimConfig::new(0.0, 5);
        let mut rng = StdRng::seed_from_u64(7);
        let mut core = core();
        for _ in 0..20 {
            match tick(&mut core, &config, &mut rng, Local::now()) {
                TickOutcome::Admitted { direction, .. } => {
                    assert_eq!(direction, Direction::BC)
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(core.queues.size(Direction::BC), 20);
    }

    #[test]
    fn p_one_never_admits_from_b() {
        let config = SimConfig::new(1.0, 5);
        let mut rng = StdRng::seed_from_u64(7);
        let mut core = core();
        for _ in 0..50 {
            if let TickOutcome::Admitted { direction, .. } =
                tick(&mut core, &config, &mut rng, Local::now())
            {
                assert_ne!(direction, Direction::BC);
            }
        }
        assert_eq!(core.queues.size(Direction::BC), 0);
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let config = SimConfig::new(0.5, 5);
        let mut rng = StdRng::seed_from_u64(1);
        let mut core = core();
        let mut last = None;
        for _ in 0..11 {
            if let TickOutcome::Admitted { id, .. } =
                tick(&mut core, &config, &mut rng, Local::now())
            {
                if let Some(prev) = last {
                    assert!(id > prev);
                }
                last = Some(id);
            }
        }
    }

    #[test]
    fn overload_enters_suppresses_and_clears() {
        let config = SimConfig::new(0.5, 5);
        let mut rng = StdRng::seed_from_u64(3);
        let mut core = core();

        // 11 admissions push the aggregate over the threshold of 10.
        for _ in 0..11 {
            match tick(&mut core, &config, &mut rng, Local::now()) {
                TickOutcome::Admitted { .. } => {}
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(core.queues.total_size(), 11);

        match tick(&mut core, &config, &mut rng, Local::now()) {
            TickOutcome::EnteredOverload { waiting } => {
                assert_eq!(waiting, (0..11).collect::<Vec<u64>>());
            }
            other => panic!("expected overload entry, got {:?}", other),
        }
        assert!(core.overload.is_overloaded());

        // No admissions while anything is still queued.
        for _ in 0..3 {
            assert!(matches!(
                tick(&mut core, &config, &mut rng, Local::now()),
                TickOutcome::Suppressed
            ));
        }
        assert_eq!(core.queues.total_size(), 11);

        // Drain everything, as the scheduler would.
        for &direction in Direction::ALL.iter() {
            while core.queues.dequeue(direction).is_some() {}
        }
        match tick(&mut core, &config, &mut rng, Local::now()) {
            // Entry and exit happen within the same test run, so the
            // whole-second duration rounds down to at most one.
            TickOutcome::ClearedOverload { secs } => assert!(secs <= 1),
            other => panic!("expected overload exit, got {:?}", other),
        }
        assert!(!core.overload.is_overloaded());

        // Back to normal admissions.
        assert!(matches!(
            tick(&mut core, &config, &mut rng, Local::now()),
            TickOutcome::Admitted { .. }
        ));
    }

    #[test]
    fn generator_thread_with_p_zero_stays_on_b() {
        use crate::logfiles::LogRecord;
        use crate::state::Shared;
        use std::time::Duration;

        let mut config = SimConfig::new(0.0, 5);
        config.tick = Duration::from_millis(1);
        let shared = Shared::new(config);
        let (handle, rx) = crate::logfiles::LogHandle::test_pair();

        let thread = {
            let shared = shared.clone();
            std::thread::spawn(move || run(&shared, &handle))
        };
        std::thread::sleep(Duration::from_millis(8));
        shared.request_shutdown();
        thread.join().expect("generator panicked");

        let core = shared.lock();
        let total = core.queues.total_size();
        assert!(total > 0, "no ticks ran");
        assert_eq!(core.queues.size(Direction::BC), total);
        // Fewer than eleven trains means the threshold was never
        // crossed, so no overload event may exist.
        if total <= 10 {
            while let Ok(record) = rx.try_recv() {
                assert!(!matches!(
                    record,
                    LogRecord::Control {
                        event: ControlEvent::SystemOverload,
                        ..
                    }
                ));
            }
        }
    }

    #[test]
    fn drawn_destinations_respect_route_table() {
        let config = SimConfig::new(0.5, 5);
        let mut rng = StdRng::seed_from_u64(42);
        for id in 0..200 {
            let (direction, train) = draw_train(id, &config, Local::now(), &mut rng);
            assert_eq!(train.starting_point, direction.origin());
            assert!(direction.destinations().contains(&train.destination_point));
            assert!(train.length == 100 || train.length == 200);
            assert_eq!(train.speed, 100);
            match train.starting_point {
                Station::A | Station::B => {
                    assert!(matches!(train.destination_point, Station::E | Station::F))
                }
                Station::E | Station::F => {
                    assert!(matches!(train.destination_point, Station::A | Station::B))
                }
            }
        }
    }
}
