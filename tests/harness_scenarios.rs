use sid_cosim::capture::{compare_captures, read_raw_capture};
use sid_cosim::{
    ChipVariant, Harness, HarnessConfig, HarnessError, RecordingModel, DEFAULT_SETTLE_CYCLES,
};
use std::path::Path;
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn capture_config(path: &Path) -> HarnessConfig {
    HarnessConfig::default().capture_path(path)
}

fn sawtooth(len: usize) -> Vec<i16> {
    (0..len)
        .map(|i| (((i * 37) % 2000) as i32 * 23 - 23_000) as i16)
        .collect()
}

#[test]
fn volume_write_then_single_tick() -> anyhow::Result<()> {
    init_logging();
    let dir = tempdir()?;
    let path = dir.path().join("output.bin");

    let mut harness = Harness::initialize(capture_config(&path), RecordingModel::new())?;
    harness.enqueue_write(24, 0x0F)?;
    harness.run(1)?;

    let stats = harness.stats()?;
    assert_eq!(stats.pending_writes, 0);
    assert_eq!(stats.samples_captured, 1);

    let writes = harness.model()?.writes().to_vec();
    assert_eq!(writes.len(), 1, "write enable must pulse exactly once");
    assert_eq!(writes[0].address, 24);
    assert_eq!(writes[0].data, 0x0F);

    harness.shutdown()?;
    assert_eq!(std::fs::metadata(&path)?.len(), 2);
    Ok(())
}

#[test]
fn budget_of_100_split_40_60() -> anyhow::Result<()> {
    init_logging();
    let mut harness = Harness::initialize(
        HarnessConfig::without_capture().budget_ticks(100),
        RecordingModel::new(),
    )?;
    harness.run(40)?;
    assert!(!harness.should_stop()?);
    harness.run(60)?;
    assert!(harness.should_stop()?);
    Ok(())
}

#[test]
fn run_until_stop_consumes_exact_budget() -> anyhow::Result<()> {
    let budget = 12_345;
    let mut harness = Harness::initialize(
        HarnessConfig::without_capture().budget_ticks(budget),
        RecordingModel::new(),
    )?;

    let mut batches = [97u32, 313, 1, 1024].iter().cycle();
    while !harness.should_stop()? {
        let remaining = harness.stats()?.remaining_budget as u32;
        let batch = (*batches.next().unwrap()).min(remaining);
        harness.run(batch)?;
    }

    let stats = harness.stats()?;
    assert_eq!(stats.ticks_run, budget as u64);
    assert_eq!(stats.samples_emitted, budget as u64);
    assert_eq!(stats.remaining_budget, 0);
    Ok(())
}

#[test]
fn writes_applied_in_order_across_runs() -> anyhow::Result<()> {
    let mut harness = Harness::initialize(HarnessConfig::without_capture(), RecordingModel::new())?;

    let mut expected = Vec::new();
    let mut value = 0u8;
    for (burst, ticks) in [(5usize, 2u32), (0, 3), (7, 10), (3, 1), (1, 20)] {
        for _ in 0..burst {
            let register = value % 25;
            harness.enqueue_write(register, value)?;
            expected.push((register, value));
            value = value.wrapping_add(1);
        }
        harness.run(ticks)?;
    }
    // Drain whatever is left
    while harness.stats()?.pending_writes > 0 {
        harness.run(1)?;
    }

    let cycles_per_tick = 1 + DEFAULT_SETTLE_CYCLES as u64;
    let writes = harness.model()?.writes();
    let seen: Vec<(u8, u8)> = writes.iter().map(|w| (w.address, w.data)).collect();
    assert_eq!(seen, expected);

    for pair in writes.windows(2) {
        assert!(pair[1].edge > pair[0].edge, "two writes shared a cycle");
    }
    for write in writes {
        assert!(write.clock_enabled);
        assert_eq!(write.edge % cycles_per_tick, 0, "write outside an active cycle");
    }
    assert_eq!(harness.stats()?.writes_applied, expected.len() as u64);
    Ok(())
}

#[test]
fn duplicate_register_writes_both_reach_the_bus() -> anyhow::Result<()> {
    let mut harness = Harness::initialize(HarnessConfig::without_capture(), RecordingModel::new())?;
    harness.enqueue_write(4, 0x41)?;
    harness.enqueue_write(4, 0x40)?;
    harness.run(2)?;

    let data: Vec<u8> = harness.model()?.writes().iter().map(|w| w.data).collect();
    assert_eq!(data, vec![0x41, 0x40]);
    assert_eq!(harness.model()?.registers()[4], 0x40);
    Ok(())
}

#[test]
fn same_seed_gives_identical_captures() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let script = sawtooth(3000);

    let render = |name: &str, seed: u32| -> anyhow::Result<Vec<u8>> {
        let path = dir.path().join(name);
        let mut harness = Harness::initialize(
            capture_config(&path),
            RecordingModel::with_script(script.clone()),
        )?;
        harness.reseed_dither(seed)?;
        harness.run(3000)?;
        harness.shutdown()?;
        Ok(std::fs::read(&path)?)
    };

    let a = render("a.bin", 4242)?;
    let b = render("b.bin", 4242)?;
    let c = render("c.bin", 7)?;

    assert_eq!(a.len(), 6000);
    assert_eq!(a, b);
    assert_ne!(a, c, "dither seed should influence quantization");
    Ok(())
}

#[test]
fn unopenable_capture_degrades_to_noop() -> anyhow::Result<()> {
    init_logging();
    let dir = tempdir()?;
    let path = dir.path().join("no-such-dir").join("output.bin");

    let mut harness = Harness::initialize(capture_config(&path), RecordingModel::new())?;
    assert!(!harness.capture_active());

    harness.run(50)?;
    let stats = harness.stats()?;
    assert_eq!(stats.samples_emitted, 50);
    assert_eq!(stats.samples_captured, 0);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn reference_capture_lines_up_with_primary() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let primary = dir.path().join("output.bin");
    let reference = dir.path().join("reference.bin");

    let config = capture_config(&primary).reference_path(&reference);
    let mut harness = Harness::initialize(config, RecordingModel::with_script(vec![0; 64]))?;
    for _ in 0..64 {
        harness.run(1)?;
        harness.capture_reference(0)?;
    }
    harness.shutdown()?;

    let captured = read_raw_capture(&primary)?;
    let expected = read_raw_capture(&reference)?;
    assert_eq!(captured.len(), 64);
    assert_eq!(expected, vec![0; 64]);

    // Silence in, only dither truncation out
    let diff = compare_captures(&captured, &expected);
    assert_eq!(diff.compared, 64);
    assert!(diff.max_abs_diff <= 1);
    Ok(())
}

#[test]
fn shutdown_is_idempotent_and_final() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("output.bin");

    let mut harness = Harness::initialize(capture_config(&path), RecordingModel::new())?;
    harness.run(10)?;
    harness.shutdown()?;
    harness.shutdown()?;

    assert!(matches!(harness.run(1), Err(HarnessError::ShutDown)));
    assert!(matches!(harness.enqueue_write(0, 0), Err(HarnessError::ShutDown)));
    assert_eq!(read_raw_capture(&path)?.len(), 10);
    Ok(())
}

#[test]
fn zero_queue_capacity_is_config_error() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("output.bin");

    let result = Harness::initialize(capture_config(&path).queue_capacity(0), RecordingModel::new());
    assert!(matches!(result, Err(HarnessError::ConfigError(_))));
    assert!(!path.exists(), "capture opened for a rejected configuration");
    Ok(())
}

#[test]
fn drop_flushes_capture() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("output.bin");
    {
        let mut harness = Harness::initialize(capture_config(&path), RecordingModel::new())?;
        harness.run(25)?;
    }
    assert_eq!(read_raw_capture(&path)?.len(), 25);
    Ok(())
}

#[test]
fn initialize_from_process_args() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("args.bin");

    let mut harness = Harness::from_args(
        [
            "vsid".to_string(),
            "--capture".to_string(),
            path.display().to_string(),
            "--seconds".to_string(),
            "1".to_string(),
            "--variant".to_string(),
            "8580".to_string(),
        ],
        RecordingModel::new(),
    )?;
    assert!(harness.capture_active());
    assert_eq!(harness.stats()?.remaining_budget, 1_000_000);

    harness.run(3)?;
    assert_eq!(harness.model()?.variant(), ChipVariant::Mos8580);
    harness.shutdown()?;
    assert_eq!(read_raw_capture(&path)?.len(), 3);
    Ok(())
}

#[test]
fn process_args_shared_with_simulator() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("shared.bin");

    let mut harness = Harness::from_args(
        [
            "Vsid_top".to_string(),
            "+verilator+seed+5".to_string(),
            "--trace".to_string(),
            "--capture".to_string(),
            path.display().to_string(),
            "+verilator+rand+reset+2".to_string(),
            "--variant".to_string(),
            "8580".to_string(),
            "--seconds=1".to_string(),
        ],
        RecordingModel::new(),
    )?;
    assert!(harness.capture_active());
    assert_eq!(harness.stats()?.remaining_budget, 1_000_000);

    harness.run(4)?;
    assert_eq!(harness.model()?.variant(), ChipVariant::Mos8580);
    harness.shutdown()?;
    assert_eq!(read_raw_capture(&path)?.len(), 4);

    let bad = Harness::from_args(["Vsid_top", "--trace", "--seconds", "abc"], RecordingModel::new());
    assert!(matches!(bad, Err(HarnessError::ConfigError(_))));
    Ok(())
}

#[test]
fn settled_output_tracks_model_level() -> anyhow::Result<()> {
    // The default cascade has unity gain at DC
    let dir = tempdir()?;
    let path = dir.path().join("dc.bin");

    let mut harness =
        Harness::initialize(capture_config(&path), RecordingModel::with_script(vec![8000]))?;
    harness.run(5000)?;
    harness.shutdown()?;

    let samples = read_raw_capture(&path)?;
    let tail = &samples[4000..];
    assert!(tail.iter().all(|&s| (7999..=8000).contains(&s)), "{:?}", &tail[..8]);
    Ok(())
}

#[test]
fn full_scale_step_overshoot_saturates() -> anyhow::Result<()> {
    let dir = tempdir()?;

    for (name, level) in [("pos.bin", i16::MAX), ("neg.bin", i16::MIN)] {
        let path = dir.path().join(name);
        let mut harness =
            Harness::initialize(capture_config(&path), RecordingModel::with_script(vec![level]))?;
        harness.run(2000)?;
        harness.shutdown()?;

        let samples = read_raw_capture(&path)?;
        // The step response rings ~10% past the input level
        assert!(samples.iter().filter(|&&s| s == level).count() > 10);
        if level > 0 {
            assert_eq!(*samples.iter().max().unwrap(), i16::MAX);
        } else {
            assert_eq!(*samples.iter().min().unwrap(), i16::MIN);
        }
    }
    Ok(())
}

#[cfg(feature = "export-wav")]
#[test]
fn capture_exports_to_wav() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let raw = dir.path().join("output.bin");
    let wav = dir.path().join("output.wav");

    let mut harness = Harness::initialize(
        capture_config(&raw),
        RecordingModel::with_script(sawtooth(500)),
    )?;
    harness.run(500)?;
    harness.shutdown()?;

    let written = sid_cosim::capture::raw_to_wav(&raw, &wav, sid_cosim::SID_CLOCK_HZ)?;
    assert_eq!(written, 500);
    assert!(std::fs::metadata(&wav)?.len() > 1000);
    Ok(())
}
