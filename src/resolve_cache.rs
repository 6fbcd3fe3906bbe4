use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::Error;

/// Semantic subtype denoting that a u64 is the monotonic access counter
/// backing the LRU ordering.
#[derive(
    Clone,
    Copy,
    Debug,
    derive_more::Deref,
    derive_more::Display,
    Eq,
    derive_more::From,
    Ord,
    PartialEq,
    PartialOrd,
)]
struct Tick(u64);

impl Tick {
    fn next(&mut self) -> Tick {
        self.0 += 1;
        *self
    }
}

/// Semantic subtype denoting that a u64 identifies one resolving flight;
/// failed-flight outcomes are only observable by the waiters of that exact
/// flight.
#[derive(
    Clone,
    Copy,
    Debug,
    derive_more::Deref,
    derive_more::Display,
    Eq,
    derive_more::From,
    Ord,
    PartialEq,
    PartialOrd,
)]
struct FlightGeneration(u64);

impl FlightGeneration {
    fn next(&mut self) -> FlightGeneration {
        self.0 += 1;
        *self
    }
}

/// The bounded LRU+TTL cache in front of the transport, with single-flight
/// semantics per key: concurrent callers for an unresolved key trigger one
/// transport round trip and share its outcome.  Only confirmed results are
/// ever stored; a failed resolve is handed to the callers that were waiting
/// on it and then forgotten.
pub struct ResolveCache<V: Clone> {
    max_capacity: usize,
    ttl: Duration,
    state: Mutex<CacheState<V>>,
    condvar: Condvar,
}

struct CacheState<V> {
    entry_m: HashMap<String, CacheEntry<V>>,
    /// Keys with a resolve in flight, tagged with the flight generation.
    flight_m: HashMap<String, FlightGeneration>,
    /// The outcome of the most recently finished failed flight per key, kept
    /// only so that the waiters of that exact flight can observe it.
    flight_error_m: HashMap<String, (FlightGeneration, Error)>,
    generation: FlightGeneration,
    tick: Tick,
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    last_used: Tick,
}

impl<V: Clone> ResolveCache<V> {
    pub fn new(initial_capacity: usize, max_capacity: usize, ttl: Duration) -> Self {
        Self {
            max_capacity: max_capacity.max(1),
            ttl,
            state: Mutex::new(CacheState {
                entry_m: HashMap::with_capacity(initial_capacity.min(max_capacity)),
                flight_m: HashMap::new(),
                flight_error_m: HashMap::new(),
                generation: FlightGeneration::from(0),
                tick: Tick::from(0),
            }),
            condvar: Condvar::new(),
        }
    }

    /// Fetch the value for `key`, resolving it with `resolve` on a miss.
    ///
    /// `force` evicts the key up front and always performs a fresh resolve,
    /// whose result replaces the cached entry.  TTL-expired entries count as
    /// misses.  When another caller is already resolving the key, this blocks
    /// and shares that caller's outcome (success or failure) instead of
    /// issuing its own transport call.
    pub fn get_or_resolve<F>(&self, key: &str, force: bool, resolve: F) -> Result<V, Error>
    where
        F: FnOnce() -> Result<V, Error>,
    {
        let mut state = self.state.lock().expect("resolve cache lock poisoned");
        if force {
            state.entry_m.remove(key);
        }
        let mut waited_generation_o: Option<FlightGeneration> = None;
        loop {
            if !force {
                if let Some(entry) = state.entry_m.get(key) {
                    if entry.stored_at.elapsed() <= self.ttl {
                        let tick = state.tick.next();
                        let entry = state
                            .entry_m
                            .get_mut(key)
                            .expect("programmer error: entry was just present");
                        entry.last_used = tick;
                        tracing::trace!(key, "resolve cache hit");
                        return Ok(entry.value.clone());
                    }
                    state.entry_m.remove(key);
                }
            }
            match state.flight_m.get(key) {
                Some(&flight_generation) => {
                    // Someone else is resolving this key; wait and share.
                    waited_generation_o = Some(flight_generation);
                    state = self
                        .condvar
                        .wait(state)
                        .expect("resolve cache lock poisoned");
                    if let Some(waited_generation) = waited_generation_o {
                        if let Some((generation, error)) = state.flight_error_m.get(key) {
                            if *generation == waited_generation {
                                tracing::trace!(key, "shared failed resolve");
                                return Err(error.clone());
                            }
                        }
                    }
                    // The flight may have succeeded; loop to check the cache.
                }
                None => break,
            }
        }
        // Become the resolving flight for this key.
        let flight_generation = state.generation.next();
        state.flight_m.insert(key.to_string(), flight_generation);
        state.flight_error_m.remove(key);
        drop(state);

        tracing::trace!(key, force, "resolve cache miss; resolving");
        let result = resolve();

        let mut state = self.state.lock().expect("resolve cache lock poisoned");
        state.flight_m.remove(key);
        match &result {
            Ok(value) => {
                let tick = state.tick.next();
                state.entry_m.insert(
                    key.to_string(),
                    CacheEntry {
                        value: value.clone(),
                        stored_at: Instant::now(),
                        last_used: tick,
                    },
                );
                self.evict_over_capacity(&mut state);
            }
            Err(error) => {
                // Never cached; recorded transiently for this flight's
                // waiters only.
                state
                    .flight_error_m
                    .insert(key.to_string(), (flight_generation, error.clone()));
                if state.flight_error_m.len() > self.max_capacity {
                    let min_generation =
                        FlightGeneration::from(flight_generation.saturating_sub(self.max_capacity as u64));
                    state
                        .flight_error_m
                        .retain(|_, (generation, _)| *generation >= min_generation);
                }
            }
        }
        drop(state);
        self.condvar.notify_all();
        result
    }

    /// Drop the entry for the given key, if present.
    pub fn remove(&self, key: &str) {
        let mut state = self.state.lock().expect("resolve cache lock poisoned");
        state.entry_m.remove(key);
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("resolve cache lock poisoned");
        state.entry_m.clear();
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock().expect("resolve cache lock poisoned");
        state.entry_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_over_capacity(&self, state: &mut CacheState<V>) {
        while state.entry_m.len() > self.max_capacity {
            // Expired entries go first, then the least recently used.
            let victim_o = state
                .entry_m
                .iter()
                .filter(|(_, entry)| entry.stored_at.elapsed() > self.ttl)
                .map(|(key, _)| key.clone())
                .next()
                .or_else(|| {
                    state
                        .entry_m
                        .iter()
                        .min_by_key(|(_, entry)| entry.last_used)
                        .map(|(key, _)| key.clone())
                });
            match victim_o {
                Some(victim) => {
                    tracing::trace!(key = victim.as_str(), "resolve cache eviction");
                    state.entry_m.remove(&victim);
                }
                None => break,
            }
        }
    }
}
