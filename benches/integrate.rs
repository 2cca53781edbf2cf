// model = "claude-opus-4-5"
// created = "2026-02-04"
// modified = "2026-02-05"
// driver = "Isaac Clayton"

//! Criterion benchmarks for command integration throughput.

use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use chorus::crdt::woot::Command;
use chorus::crdt::woot::Woot;
use chorus::crdt::Integrate;
use chorus::site::Id;
use chorus::site::Site;

/// Sequential typing: every character lands after the previous one.
fn sequential_history(len: usize) -> Vec<Command> {
    let site = Site::new();
    let mut doc = Woot::new();
    let mut after = Id::BEGIN;
    let mut commands = Vec::with_capacity(len);
    for i in 0..len {
        let chr = b'a' + (i % 26) as u8;
        let command = doc.make_insert(&site, chr, after);
        after = command.id();
        doc = doc.integrate(&command);
        commands.push(command);
    }
    return commands;
}

/// Random-position edits: each character lands after a uniformly
/// chosen existing character.
fn random_history(len: usize, seed: u64) -> Vec<Command> {
    let site = Site::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut doc = Woot::new();
    let mut ids = Vec::with_capacity(len);
    let mut commands = Vec::with_capacity(len);
    for _ in 0..len {
        let chr = rng.random_range(b'a'..=b'z');
        let after = if ids.is_empty() {
            Id::BEGIN
        } else {
            ids[rng.random_range(0..ids.len())]
        };
        let command = doc.make_insert(&site, chr, after);
        ids.push(command.id());
        doc = doc.integrate(&command);
        commands.push(command);
    }
    return commands;
}

fn replay(commands: &[Command]) -> String {
    let mut doc = Woot::new();
    for command in commands {
        doc = doc.integrate(command);
    }
    return doc.render();
}

fn bench_integrate(c: &mut Criterion) {
    let sequential = sequential_history(1_000);
    c.bench_function("integrate_1k_sequential", |b| {
        b.iter(|| black_box(replay(&sequential)));
    });

    let random = random_history(1_000, 42);
    c.bench_function("integrate_1k_random_positions", |b| {
        b.iter(|| black_box(replay(&random)));
    });
}

criterion_group!(benches, bench_integrate);
criterion_main!(benches);
