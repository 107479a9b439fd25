//! Notification decoder benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dirwatch_core::{decode, CanonicalPath, ChangeAction, RecordWriter};
use std::path::Path;

fn build_buffer(records: usize) -> Vec<u8> {
    let mut writer = RecordWriter::new();
    for i in 0..records {
        let action = match i % 3 {
            0 => ChangeAction::Added,
            1 => ChangeAction::Modified,
            _ => ChangeAction::Removed,
        };
        writer.push(action.code(), &format!("src/module_{i}/file_{i}.rs"));
    }
    writer.finish()
}

fn bench_decode(c: &mut Criterion) {
    let root = CanonicalPath::from_path(Path::new("C:\\projects\\dirwatch"));

    // Default buffer holds roughly this many short records
    let small = build_buffer(16);
    c.bench_function("decode_16_records", |b| {
        b.iter(|| {
            let count = decode(black_box(&small), small.len(), &root)
                .filter(|r| r.is_ok())
                .count();
            black_box(count)
        });
    });

    let large = build_buffer(1024);
    c.bench_function("decode_1024_records", |b| {
        b.iter(|| {
            let count = decode(black_box(&large), large.len(), &root)
                .filter(|r| r.is_ok())
                .count();
            black_box(count)
        });
    });
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
