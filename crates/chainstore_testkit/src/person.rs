//! Random person documents.
//!
//! Each person is keyed by its `guid`, and the document carries the same
//! guid as a text field, so tests can check that every stored value
//! belongs to its key.

use chainstore_codec::Value;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use uuid::{Builder, Uuid};

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Dennis", "Edsger", "Frances", "Grace", "John", "Ken", "Margaret",
    "Niklaus", "Radia",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Dijkstra", "Hamilton", "Hopper", "Kernighan", "Liskov", "Lovelace", "McCarthy",
    "Perlman", "Ritchie", "Turing", "Wirth",
];

const TAGS: &[&str] = &["admin", "beta", "ops", "staff", "trial", "vip"];

/// A generated person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    /// Unique id, also used as the store key.
    pub guid: Uuid,
    /// Full name.
    pub name: String,
    /// Age in years.
    pub age: i64,
    /// Contact address.
    pub email: String,
    /// Whether the account is active.
    pub active: bool,
    /// Account balance.
    pub balance: f64,
    /// Free-form labels.
    pub tags: Vec<String>,
}

impl Person {
    /// Generates a random person.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let guid = Builder::from_random_bytes(rng.gen()).into_uuid();
        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Ada");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("Lovelace");
        let tag_count = rng.gen_range(0..=3);
        let tags = TAGS
            .choose_multiple(rng, tag_count)
            .map(|t| (*t).to_string())
            .collect();

        Self {
            guid,
            name: format!("{first} {last}"),
            age: rng.gen_range(18..90),
            email: format!(
                "{}.{}@example.com",
                first.to_lowercase(),
                last.to_lowercase()
            ),
            active: rng.gen_bool(0.8),
            balance: f64::from(rng.gen_range(0u32..1_000_000)) / 100.0,
            tags,
        }
    }

    /// The store key: the guid in hyphenated form.
    pub fn key(&self) -> Vec<u8> {
        self.guid.hyphenated().to_string().into_bytes()
    }

    /// The person as a dict document.
    pub fn to_value(&self) -> Value {
        Value::dict(vec![
            ("guid", Value::from(self.guid.hyphenated().to_string())),
            ("name", Value::from(self.name.as_str())),
            ("age", Value::Integer(self.age)),
            ("email", Value::from(self.email.as_str())),
            ("active", Value::Bool(self.active)),
            ("balance", Value::Float(self.balance)),
            (
                "tags",
                Value::Array(self.tags.iter().map(|t| Value::from(t.as_str())).collect()),
            ),
        ])
    }
}

/// Generates `count` people from a fixed seed.
pub fn people(count: usize, seed: u64) -> Vec<Person> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| Person::random(&mut rng)).collect()
}

/// Renders people as a JSON array, the input format of `chainstore import`.
pub fn people_json(people: &[Person]) -> serde_json::Result<String> {
    serde_json::to_string(people)
}
