//! Benchmarks for voice rendering and the full instrument graph.
//!
//! Run with: cargo bench
//!
//! Reference timing at 44.1kHz sample rate:
//!   - 64 samples  = 1.45ms deadline
//!   - 128 samples = 2.90ms deadline
//!   - 256 samples = 5.80ms deadline

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use trellis::nodes::SampleData;
use trellis::{
    ChainSpec, ChorusConfig, EchoConfig, EngineConfig, Instrument, LAYER_KEYS, NoteVoice, PolySynth,
    ScaleGenerator, Voice,
};

const BLOCK_SIZES: &[usize] = &[64, 128, 256];
const SAMPLE_RATE: f64 = 44_100.0;

fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("voices");

    let kinds: Vec<(&str, fn() -> NoteVoice)> = vec![
        ("soft_triangle", NoteVoice::soft_triangle),
        ("cheap_pluck", NoteVoice::cheap_pluck),
        ("detuned", NoteVoice::detuned),
        ("plucked", || NoteVoice::plucked(1)),
        ("sample", || NoteVoice::sample(SampleData::synthesize(220.0, 44_100.0, 2.0))),
    ];

    for &size in BLOCK_SIZES {
        let mut out = vec![0.0f32; size];
        for (name, make) in &kinds {
            let mut voice = make();
            voice.prepare(SAMPLE_RATE, size);
            voice.begin();
            voice.set_frequency(220.0);

            group.bench_with_input(BenchmarkId::new(*name, size), &size, |b, _| {
                b.iter(|| {
                    // Keep the voice sounding
                    if !voice.state().is_active() {
                        voice.note_on();
                    }
                    voice.render(black_box(&mut out));
                })
            });
        }
    }

    group.finish();
}

fn bench_instrument(c: &mut Criterion) {
    let mut group = c.benchmark_group("instrument");
    let scale = ScaleGenerator::default().generate();

    for &size in BLOCK_SIZES {
        let config = EngineConfig {
            block_size: size,
            ..EngineConfig::default()
        };
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        // Every key held on the triangle layer
        let mut inst = Instrument::with_default_layers(config).unwrap();
        inst.set_scale(&scale);
        for key in 0..LAYER_KEYS {
            inst.note_on(key);
        }
        group.bench_with_input(BenchmarkId::new("32_keys", size), &size, |b, _| {
            b.iter(|| inst.process_block(black_box(&mut left), black_box(&mut right)))
        });

        // Same, through every chain stage
        let chain = ChainSpec::default()
            .with_echo(EchoConfig::default())
            .with_chorus(ChorusConfig::default());
        let layers = trellis::default_layers(config.sample_rate as f32);
        let mut full = Instrument::new(config, &layers, &chain).unwrap();
        full.set_scale(&scale);
        for key in 0..LAYER_KEYS {
            full.note_on(key);
        }
        group.bench_with_input(BenchmarkId::new("32_keys_full_chain", size), &size, |b, _| {
            b.iter(|| full.process_block(black_box(&mut left), black_box(&mut right)))
        });

        let mut poly = PolySynth::new(config).unwrap();
        for note in 0..8 {
            poly.note_on(note * 3);
        }
        group.bench_with_input(BenchmarkId::new("poly_8_voices", size), &size, |b, _| {
            b.iter(|| poly.process_block(black_box(&mut left), black_box(&mut right)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_voices, bench_instrument);
criterion_main!(benches);
