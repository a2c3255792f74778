//! Tunnel scheduler: the single consumer. Waits until the tunnel is
//! free and some queue is non-empty, picks the busiest direction,
//! and simulates the passage with the lock released so arrivals keep
//! flowing during transit.

use crate::logfiles::{ControlEvent, LogHandle};
use crate::state::Shared;
use crate::train::Train;
use chrono::Local;
use log::*;
use rand::Rng;
use std::sync::Arc;
use std::thread;

/// Scheduler thread loop. Returns when shutdown is requested.
pub fn run(shared: &Arc<Shared>, sink: &LogHandle) {
    let mut rng = rand::rng();
    loop {
        let (train, waiting) = {
            let mut core = shared.lock();
            loop {
                if shared.shutdown_requested() {
                    return;
                }
                if !core.tunnel_occupied {
                    if let Some(direction) = core.queues.select() {
                        if let Some(train) = core.queues.dequeue(direction) {
                            core.tunnel_occupied = true;
                            break (train, core.queues.waiting_ids());
                        }
                    }
                }
                core = shared.wait(core);
            }
        };

        process_train(shared, sink, train, waiting, &mut rng);

        {
            let mut core = shared.lock();
            core.tunnel_occupied = false;
        }
        shared.notify_all();
    }
}

/// Simulate one tunnel transit. Runs without the lock; only the
/// breakdown snapshot and nothing else touches shared state.
fn process_train(
    shared: &Arc<Shared>,
    sink: &LogHandle,
    mut train: Train,
    waiting: Vec<u64>,
    rng: &mut impl Rng,
) {
    let config = &shared.config;
    sink.control(ControlEvent::TunnelPassing, Some(train.id), waiting);
    info!(
        "train {} from queue {} is entering the tunnel",
        train.id, train.starting_point
    );

    let mut passage_time = train.base_passage_time(config.tunnel_length);
    if rng.random::<f64>() < config.breakdown_probability {
        passage_time += config.breakdown_delay;
        warn!(
            "breakdown for train {} from queue {}",
            train.id, train.starting_point
        );
        let snapshot = shared.lock().queues.waiting_ids();
        sink.control(ControlEvent::Breakdown, Some(train.id), snapshot);
    }

    // Transit, sliced per tick so a shutdown request cuts it short.
    for _ in 0..passage_time {
        if shared.shutdown_requested() {
            break;
        }
        thread::sleep(config.tick);
    }

    info!("train {} has exited the tunnel", train.id);
    let departure = Local::now();
    train.departure_time = Some(departure);
    sink.passage(&train, departure);
}
