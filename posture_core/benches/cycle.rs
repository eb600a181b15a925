use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use posture_core::mocks::{FnSensor, NullActuator};
use posture_core::orientation::tilt_to_accel;
use posture_core::{CalibrationOffset, MonitorSettings, build_monitor};
use posture_traits::{ImuReading, ManualClock};

// Synthetic wearer: slow nod between -25 and +25 degrees with xorshift jitter.
fn synth_session(n: usize, seed: u32) -> Vec<ImuReading> {
    let mut state = seed.max(1);
    let mut jitter = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0) - 0.5
    };
    (0..n)
        .map(|i| {
            let pitch = 25.0 * (i as f32 / 300.0).sin() + jitter();
            let gyro = 8.0 * jitter();
            ImuReading::new(tilt_to_accel(pitch, jitter()), [gyro, 0.0, 0.0])
        })
        .collect()
}

pub fn bench_cycle(c: &mut Criterion) {
    let mut g = c.benchmark_group("cycle");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p posture_core --bench cycle
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let n = 10_000usize;
    let session = synth_session(n, 0xC0FFEE);

    g.bench_function(format!("step_x{n}"), |b| {
        b.iter_batched(
            || {
                let clock = ManualClock::new();
                let readings = session.clone();
                let mut m = build_monitor(
                    FnSensor::new(move |i| Ok(readings[i as usize % readings.len()])),
                    NullActuator,
                    MonitorSettings::default(),
                    Some(Box::new(clock.clone())),
                )
                .unwrap();
                m.begin_with_offset(CalibrationOffset::default());
                (m, clock)
            },
            |(mut m, clock)| {
                for _ in 0..n {
                    clock.advance_ms(100);
                    black_box(m.step().unwrap());
                }
            },
            BatchSize::LargeInput,
        )
    });
    g.finish();
}

criterion_group!(cycle, bench_cycle);
criterion_main!(cycle);
