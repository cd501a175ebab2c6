use rand::Rng;

use crate::record::{Dataset, Record};

const STATUSES: [&str; 3] = ["relationship", "complicated", "single"];

fn generate_person(rng: &mut impl Rng, id: u64) -> Record {
    Record::new(id)
        .with("firstName", format!("First{id}"))
        .with("lastName", format!("Last{id}"))
        .with("age", rng.random_range(0..80u32))
        .with("visits", rng.random_range(0..100u32))
        .with("progress", rng.random_range(0..100u32))
        .with("status", STATUSES[rng.random_range(0..STATUSES.len())])
}

/// Random records with ids `1..=count`. Not seeded, every call differs.
pub fn generate(count: usize) -> Dataset {
    let mut rng = rand::rng();
    (1..=count as u64)
        .map(|id| generate_person(&mut rng, id))
        .collect()
}
