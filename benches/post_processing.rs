use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use revoice::audio::dsp::{DecodedAudio, post_process, resample, resample_clip};
use revoice::audio::frame::FrameAssembler;
use revoice::audio::gate::calculate_rms;
use revoice::audio::wav::{decode_wav, encode_wav};

/// A synthesized-voice stand-in: `secs` of a 220Hz tone at `rate`, stereo.
fn tone(secs: f32, rate: u32) -> DecodedAudio {
    let frames = (secs * rate as f32) as usize;
    let samples = (0..frames)
        .flat_map(|i| {
            let t = i as f32 / rate as f32;
            let s = 0.4 * (2.0 * std::f32::consts::PI * 220.0 * t).sin();
            [s, s]
        })
        .collect();
    DecodedAudio::new(samples, rate, 2)
}

fn bench_post_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_process");
    for &rate in &[22050u32, 24000, 44100] {
        let clip = tone(3.0, rate);
        group.bench_with_input(BenchmarkId::from_parameter(rate), &clip, |b, clip| {
            b.iter(|| post_process(black_box(clip.clone()), -3.0, 16000));
        });
    }
    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let clip = tone(3.0, 24000);
    let mut group = c.benchmark_group("resample_24k_to_16k");
    group.bench_function("linear", |b| {
        b.iter(|| resample(black_box(&clip.samples), 24000, 16000));
    });
    group.bench_function("band_limited", |b| {
        b.iter(|| resample_clip(black_box(&clip.samples), 24000, 16000));
    });
    group.finish();
}

fn bench_wav_decode(c: &mut Criterion) {
    let Ok(bytes) = encode_wav(&tone(3.0, 24000)) else {
        eprintln!("Skipping wav decode: encoding failed");
        return;
    };
    c.bench_function("decode_wav_3s", |b| {
        b.iter(|| decode_wav(black_box(&bytes)));
    });
}

fn bench_capture_path(c: &mut Criterion) {
    // One second of microphone input in 10ms device reads
    let reads: Vec<Vec<i16>> = (0..100)
        .map(|n| {
            (0..160)
                .map(|i| (((n * 160 + i) as f32 * 0.05).sin() * 3000.0) as i16)
                .collect()
        })
        .collect();
    c.bench_function("assemble_and_gate_1s", |b| {
        b.iter(|| {
            let mut assembler = FrameAssembler::new(16000, 100);
            let mut admitted = 0usize;
            for read in &reads {
                for frame in assembler.push(black_box(read)) {
                    if calculate_rms(&frame.samples) >= 0.005 {
                        admitted += 1;
                    }
                }
            }
            admitted
        });
    });
}

criterion_group!(
    benches,
    bench_post_process,
    bench_resample,
    bench_wav_decode,
    bench_capture_path
);
criterion_main!(benches);
