use rirkit::dataset::{
    MemorySink, RirKey, WavDirectorySink, pass_keys, resolve_channel_offset, run_simulation,
};
use rirkit::points::{BoundingBox, CoordinateTable};
use rirkit::{
    ImageSourceSimulator, Microphone, Point3D, RirkitError, RoomSimError, RoomSimulator,
    ShoeBox, SimulationConfig, SourceRange,
};
use std::cell::Cell;
use tempfile::TempDir;

/// Returns `[k]` for the k-th microphone so written files reveal which
/// simulator channel they came from
#[derive(Default)]
struct IndexingSimulator {
    calls: Cell<usize>,
}

impl RoomSimulator for IndexingSimulator {
    fn compute_rir(
        &self,
        _room: &ShoeBox,
        _source: &Point3D,
        mics: &[Microphone],
    ) -> Result<Vec<Vec<f64>>, RoomSimError> {
        self.calls.set(self.calls.get() + 1);
        Ok((0..mics.len()).map(|k| vec![k as f64]).collect())
    }
}

fn small_config(temp_dir: &TempDir) -> SimulationConfig {
    SimulationConfig {
        grid_x: 2,
        grid_y: 2,
        mic_count: 4,
        points_path: temp_dir.path().join("wav_data/points.txt"),
        minmax_path: temp_dir.path().join("minmax/minmax.json"),
        results_dir: temp_dir.path().join("wav_data/raw"),
        ..Default::default()
    }
}

#[test]
fn test_each_source_writes_one_file_per_other_array_and_channel() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = small_config(&temp_dir);
    let mut sink = WavDirectorySink::from_config(&config).expect("create directories");
    let simulator = IndexingSimulator::default();

    let report = run_simulation(&config, &simulator, &mut sink).expect("simulation runs");
    let n = 4;
    assert_eq!(report.sources_simulated, n);
    assert_eq!(report.files_written, n * (n - 1) * config.mic_count);
    assert_eq!(simulator.calls.get(), n);

    let mut names: Vec<String> = std::fs::read_dir(&config.results_dir)
        .expect("results dir exists")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), n * (n - 1) * config.mic_count);
    for name in &names {
        let stem = name.strip_suffix(".wav").expect("wav extension");
        let parts: Vec<usize> = stem
            .split('_')
            .map(|p| p.parse().expect("numeric part"))
            .collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0] < n && parts[1] < n);
        assert_ne!(parts[0], parts[1]);
        assert!((1..=config.mic_count).contains(&parts[2]));
    }
}

#[test]
fn test_files_hold_the_shifted_simulator_channel() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = small_config(&temp_dir);
    let mut sink = WavDirectorySink::from_config(&config).expect("create directories");
    run_simulation(&config, &IndexingSimulator::default(), &mut sink).expect("simulation runs");

    for source in 0..4 {
        for mic in (0..4).filter(|&m| m != source) {
            for channel in 1..=4 {
                let key = RirKey {
                    source_index: source,
                    mic_array_index: mic,
                    channel,
                };
                let mut reader = hound::WavReader::open(sink.rir_path(key)).expect("open wav");
                assert_eq!(reader.spec().sample_rate, 48000);
                let samples: Vec<f32> =
                    reader.samples::<f32>().map(|s| s.expect("sample")).collect();
                let expected = resolve_channel_offset(source, mic, 4).expect("not the source")
                    + channel
                    - 1;
                assert_eq!(samples, vec![expected as f32], "{}", key.file_name());
            }
        }
    }
}

#[test]
fn test_layout_files_written_once_and_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = small_config(&temp_dir);

    let mut memory = MemorySink::default();
    run_simulation(&config, &IndexingSimulator::default(), &mut memory).expect("simulation runs");
    assert_eq!(memory.layout_writes, 1);
    let (table, bbox) = memory.layout.clone().expect("layout written");
    assert_eq!(table.len(), 4);
    assert_eq!(bbox, BoundingBox::for_room(config.room_dim));

    let mut sink = WavDirectorySink::from_config(&config).expect("create directories");
    run_simulation(&config, &IndexingSimulator::default(), &mut sink).expect("simulation runs");
    let read = CoordinateTable::read(&config.points_path).expect("points file");
    assert_eq!(read, table);
    let second = read.get(1).expect("index 1");
    assert_eq!((second.x, second.z), (0.5, 1.35));
    assert!((second.y - 5.9).abs() < 1e-12);
    assert_eq!(
        BoundingBox::read(&config.minmax_path).expect("minmax file"),
        bbox
    );
}

#[test]
fn test_invalid_configuration_touches_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = SimulationConfig {
        mic_radius: 10.0,
        ..small_config(&temp_dir)
    };
    let simulator = IndexingSimulator::default();
    let mut sink = MemorySink::default();
    let err = run_simulation(&config, &simulator, &mut sink).unwrap_err();
    assert!(matches!(err, RirkitError::MicRadiusTooLarge { .. }));
    assert!(err.is_config_error());
    assert_eq!(simulator.calls.get(), 0);
    assert!(sink.layout.is_none());
}

#[test]
fn test_skip_existing_and_source_range() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = SimulationConfig {
        source_range: Some(SourceRange { start: 1, end: 3 }),
        ..small_config(&temp_dir)
    };
    let mut sink = MemorySink::default();
    let first = run_simulation(&config, &IndexingSimulator::default(), &mut sink)
        .expect("simulation runs");
    assert_eq!(first.sources_simulated, 2);
    assert!(sink.records.keys().all(|k| (1..3).contains(&k.source_index)));

    let config = SimulationConfig {
        skip_existing: true,
        source_range: None,
        ..config
    };
    let simulator = IndexingSimulator::default();
    let second = run_simulation(&config, &simulator, &mut sink).expect("simulation runs");
    assert_eq!(second.sources_skipped, 2);
    assert_eq!(second.sources_simulated, 2);
    assert_eq!(simulator.calls.get(), 2);
    assert_eq!(sink.records.len(), 4 * 3 * 4);
}

#[test]
fn test_truncated_file_is_simulated_again() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = SimulationConfig {
        skip_existing: true,
        ..small_config(&temp_dir)
    };
    let mut sink = WavDirectorySink::from_config(&config).expect("create directories");
    run_simulation(&config, &IndexingSimulator::default(), &mut sink).expect("simulation runs");

    // an interrupted write of the last file of pass 0
    let last = pass_keys(0, 4, 4).last().expect("pass 0 has keys");
    std::fs::write(sink.rir_path(last), b"RIFF").expect("truncate file");

    let simulator = IndexingSimulator::default();
    let report = run_simulation(&config, &simulator, &mut sink).expect("simulation runs");
    assert_eq!(report.sources_skipped, 3);
    assert_eq!(report.sources_simulated, 1);
    assert_eq!(simulator.calls.get(), 1);

    let mut reader = hound::WavReader::open(sink.rir_path(last)).expect("file rewritten");
    let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.expect("sample")).collect();
    let expected = resolve_channel_offset(0, last.mic_array_index, 4).expect("not the source")
        + last.channel
        - 1;
    assert_eq!(samples, vec![expected as f32]);

    let leftovers = std::fs::read_dir(&config.results_dir)
        .expect("results dir exists")
        .filter(|e| {
            e.as_ref()
                .map(|e| e.file_name().to_string_lossy().ends_with(".part"))
                .unwrap_or(false)
        })
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_image_source_backend_end_to_end() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = SimulationConfig {
        sample_rate: 8000,
        max_order: Some(1),
        mic_directivity: true,
        ..small_config(&temp_dir)
    };
    let simulator = ImageSourceSimulator::new(config.speed_of_sound, 9);
    let mut sink = MemorySink::default();
    let report = run_simulation(&config, &simulator, &mut sink).expect("simulation runs");
    assert_eq!(report.files_written, 48);

    for samples in sink.records.values() {
        let peak = samples.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(peak > 0.0);
    }

    // capsule 3 faces the source, capsule 1 sits 2r further away facing off
    let near = &sink.records[&RirKey {
        source_index: 0,
        mic_array_index: 2,
        channel: 3,
    }];
    let far = &sink.records[&RirKey {
        source_index: 0,
        mic_array_index: 2,
        channel: 1,
    }];
    let loudest = |x: &[f64]| {
        x.iter()
            .enumerate()
            .fold((0, 0.0_f64), |best, (i, v)| if v.abs() > best.1 { (i, v.abs()) } else { best })
            .0
    };
    assert!(loudest(near) < loudest(far));
}
