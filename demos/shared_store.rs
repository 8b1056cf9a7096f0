//! One store, many threads.
//!
//! Each worker thread opens its own session from a shared [`Store`] and
//! writes a batch of readings while a reader polls the table. Writes are
//! serialized by the store's lock; reads run concurrently with each other.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p rowmap-demos --example shared_store
//! ```

use std::thread;

use rowmap_core::{Record, Timestamp};
use rowmap_sqlite::{Store, StoreConfig};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Unit {
    Celsius,
    Percent,
}

#[derive(Debug, Serialize, Deserialize)]
struct Reading {
    id: Uuid,
    sensor: String,
    value: f64,
    unit: Unit,
    taken_at: Timestamp,
    note: Option<String>,
}

impl Record for Reading {
    type Key = Uuid;
    const PRIMARY_KEY: &'static str = "id";
    fn primary_key(&self) -> &Uuid {
        &self.id
    }
}

const WORKERS: usize = 4;
const READINGS_PER_WORKER: usize = 50;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = std::env::temp_dir().join(format!("rowmap-shared-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Store::with_config(dir.join("readings.db"), StoreConfig::default());

    thread::scope(|scope| {
        for worker in 0..WORKERS {
            let store = store.clone();
            scope.spawn(move || {
                let mut session = store.session().unwrap();
                let batch: Vec<Reading> = (0..READINGS_PER_WORKER)
                    .map(|i| Reading {
                        id: Uuid::new_v4(),
                        sensor: format!("sensor-{worker}"),
                        value: i as f64 * 0.5,
                        unit: if worker % 2 == 0 {
                            Unit::Celsius
                        } else {
                            Unit::Percent
                        },
                        taken_at: Timestamp::now(),
                        note: (i == 0).then(|| "first reading".to_string()),
                    })
                    .collect();
                session.insert(&batch).unwrap();
            });
        }

        let store = store.clone();
        scope.spawn(move || {
            let mut session = store.session().unwrap();
            for _ in 0..5 {
                // The table may not exist until the first writer has run
                match session.get_all::<Reading>() {
                    Ok(readings) => println!("reader sees {} readings", readings.len()),
                    Err(err) => println!("reader: {err}"),
                }
                thread::sleep(std::time::Duration::from_millis(5));
            }
        });
    });

    let mut session = store.session().unwrap();
    let readings = session.get_all::<Reading>().unwrap();
    println!(
        "\n{} readings from {} workers",
        readings.len(),
        WORKERS
    );
    if let Some(first) = readings.iter().find(|r| r.note.is_some()) {
        println!(
            "{} {:?} at {}: {}",
            first.sensor, first.unit, first.taken_at, first.value
        );
    }

    drop(session);
    std::fs::remove_dir_all(&dir).unwrap();
}
