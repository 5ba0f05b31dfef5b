//! Ping/pong demo - a coordinator spawns ponger actors, plays a number of
//! rounds with each, shuts each one down and then stops the manager.
//!
//! Usage:
//!   vproc-demo --pairs 4 --rounds 100
//!   vproc-demo --workers 8 --config libs/concurrency/config/vproc.toml

use anyhow::Result;
use clap::Parser;
use concurrency::{
    Actor, ActorCore, ActorKey, ConcurrencyManager, HandlerTable, ManagerConfig, Message, Subject,
    TimeDomain, VirtualProcess,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Seconds between demo actor services
const DEMO_SERVICE_INTERVAL: f64 = 0.001;

#[derive(Parser, Debug)]
#[command(name = "vproc-demo")]
#[command(about = "Virtual process ping/pong demo")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,

    /// Run actors on a worker pool of this many threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Ping/pong round trips per ponger
    #[arg(short, long, default_value_t = 10)]
    rounds: u32,

    /// Number of ponger actors
    #[arg(short, long, default_value_t = 2)]
    pairs: usize,
}

#[derive(Debug)]
struct Ping {
    round: u32,
}
impl Message for Ping {}

#[derive(Debug)]
struct Pong {
    round: u32,
}
impl Message for Pong {}

struct Ponger {
    core: ActorCore,
}

impl Actor for Ponger {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn register_handlers(handlers: &mut HandlerTable<Self>) {
        handlers.register(|actor: &mut Ponger, source, ping: Arc<Ping>| {
            actor.core.send(source, Pong { round: ping.round });
        });
    }

    fn time_domain(&self) -> TimeDomain {
        TimeDomain::RealTime
    }

    fn reschedule_interval(&self) -> f64 {
        DEMO_SERVICE_INTERVAL
    }

    fn on_shutdown(&mut self, is_hard: bool) {
        let key = self.core.key();
        self.core.log(format!("{} stopping (hard: {})", key, is_hard));
    }
}

struct Coordinator {
    core: ActorCore,
    pairs: usize,
    rounds: u32,
    spawned: bool,
    completed: BTreeMap<ActorKey, u32>,
    finished: usize,
}

impl Coordinator {
    fn new(pairs: usize, rounds: u32) -> Self {
        Self {
            core: ActorCore::new(ActorKey::for_subject(Subject::Logic)),
            pairs,
            rounds,
            spawned: false,
            completed: BTreeMap::new(),
            finished: 0,
        }
    }

    fn handle_pong(&mut self, source: ActorKey, round: u32) {
        self.completed.insert(source, round);
        if round < self.rounds {
            self.core.send(source, Ping { round: round + 1 });
            return;
        }

        self.finished += 1;
        self.core.log(format!("{} finished {} rounds", source, round));
        self.core.request_shutdown(source);

        if self.finished == self.pairs {
            info!(pairs = self.pairs, rounds = self.rounds, "All pongers finished");
            self.core.request_manager_shutdown();
        }
    }
}

impl Actor for Coordinator {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn register_handlers(handlers: &mut HandlerTable<Self>) {
        handlers.register(|actor: &mut Coordinator, source, pong: Arc<Pong>| {
            actor.handle_pong(source, pong.round);
        });
    }

    fn time_domain(&self) -> TimeDomain {
        TimeDomain::RealTime
    }

    fn reschedule_interval(&self) -> f64 {
        DEMO_SERVICE_INTERVAL
    }

    fn on_service(&mut self, _now: f64) {
        if self.spawned {
            return;
        }
        self.spawned = true;

        if self.pairs == 0 {
            self.core.request_manager_shutdown();
            return;
        }
        for _ in 0..self.pairs {
            let ponger = Ponger {
                core: ActorCore::new(ActorKey::for_subject(Subject::Ai)),
            };
            self.core.spawn_actor(VirtualProcess::boxed(ponger), true, true);
        }
        self.core.log(format!("spawned {} pongers", self.pairs));
    }

    fn on_interface_added(&mut self, key: ActorKey) {
        if key.subject() == Some(Subject::Ai) && !self.completed.contains_key(&key) {
            self.completed.insert(key, 0);
            self.core.send(key, Ping { round: 1 });
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let mut config = ManagerConfig::load(args.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    if let Some(workers) = args.workers {
        config.execution = ManagerConfig::pooled(workers).execution;
        config.validate()?;
    }

    info!(
        pairs = args.pairs,
        rounds = args.rounds,
        mode = ?config.execution.mode,
        "Starting vproc demo"
    );

    let mut manager = ConcurrencyManager::new(config)?;
    manager.run(VirtualProcess::boxed(Coordinator::new(args.pairs, args.rounds)))?;

    let metrics = manager.metrics();
    info!(
        actors_added = metrics.actors_added,
        actors_removed = metrics.actors_removed,
        services = metrics.services_dispatched,
        frames_delivered = metrics.frames_delivered,
        frames_dropped = metrics.frames_dropped,
        interfaces_granted = metrics.interfaces_granted,
        iterations = metrics.iterations,
        "Demo finished"
    );

    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(log_level)
            .init();
    } else {
        tracing_subscriber::fmt().with_max_level(log_level).init();
    }

    Ok(())
}
