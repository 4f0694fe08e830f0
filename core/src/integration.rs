//! End-to-end capture and replay tests
//!
//! Drives the recorders and replayers against the deterministic fake core,
//! the way a frontend would during a play session.

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::console::{EmulatorCore, keys};
    use crate::recording::{
        ContainerReader, DecodeOptions, Recorder, RecorderConfig, decode, decode_frames, stats,
    };
    use crate::replay::{InputRecorder, InputReplayer, ReplayError};
    use crate::test_utils::{FakeCore, TEST_HEIGHT, TEST_WIDTH};

    const FRAME_BYTES: usize = (TEST_WIDTH * TEST_HEIGHT * 4) as usize;

    /// Start, Up, A, idle, Down+B; 30 frames each
    const SCRIPT: [(u32, usize); 5] = [
        (keys::START, 30),
        (keys::UP, 30),
        (keys::A, 30),
        (0, 30),
        (keys::DOWN | keys::B, 30),
    ];

    /// Play the script while logging input. Returns the final frame.
    fn record_session(core: &mut FakeCore, path: &Path) -> Vec<u8> {
        let mut recorder = InputRecorder::new(path);
        recorder.start(core).unwrap();
        for (mask, frames) in SCRIPT {
            for _ in 0..frames {
                core.set_keys(mask);
                core.run_frame().unwrap();
                recorder.capture(mask).unwrap();
            }
        }
        recorder.stop();
        core.video_buffer().to_vec()
    }

    // ========================================================================
    // Input logs
    // ========================================================================

    #[test]
    fn test_input_session_replays_to_identical_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.gir");

        let mut core = FakeCore::new();
        // Anchor mid-game rather than at power-on
        crate::test_utils::run_frames(&mut core, keys::RIGHT, 17);
        let expected = record_session(&mut core, &path);
        assert_eq!(expected.len(), FRAME_BYTES);

        assert!(path.exists());
        assert!(dir.path().join("session.state").exists());

        let mut fresh = FakeCore::new();
        let mut replayer = InputReplayer::open(&path).unwrap();
        assert_eq!(replayer.frame_count(), 150);
        assert_eq!(replayer.declared_frame_count(), 150);

        let stepped = replayer.replay(&mut fresh).unwrap();
        assert_eq!(stepped, 150);
        assert!(replayer.is_complete());
        assert_eq!(fresh.video_buffer(), expected.as_slice());
    }

    #[test]
    fn test_replay_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twice.gir");
        let mut core = FakeCore::new();
        let expected = record_session(&mut core, &path);

        let mut replayer = InputReplayer::open(&path).unwrap();
        let mut replay_core = FakeCore::new();
        replayer.replay(&mut replay_core).unwrap();
        let first = replay_core.video_buffer().to_vec();

        // Second run re-anchors on the same core
        replayer.replay(&mut replay_core).unwrap();
        assert_eq!(replay_core.video_buffer(), first.as_slice());
        assert_eq!(first, expected);
    }

    #[test]
    fn test_replay_against_other_rom_steps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rom.gir");
        let mut core = FakeCore::new();
        record_session(&mut core, &path);

        let mut other = FakeCore::with_checksum(0x0BAD_F00D);
        let mut replayer = InputReplayer::open(&path).unwrap();
        assert!(matches!(
            replayer.replay(&mut other),
            Err(ReplayError::ChecksumMismatch {
                actual: 0x0BAD_F00D,
                ..
            })
        ));
        assert_eq!(other.frames_run(), 0);
        assert_eq!(replayer.current_frame(), 0);
    }

    #[test]
    fn test_crashed_log_uses_body_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crashed.gir");
        std::fs::write(
            &path,
            "# GEMBA INPUT RECORDING v1\n\
             # rom_checksum: 3735928559\n\
             # game_code: TEST\n\
             # anchor_state: crashed.state\n\
             # rom_path: \n\
             # frame_count: 0\n\
             ---\n\
             8\n\
             40\n\
             1\n",
        )
        .unwrap();

        let replayer = InputReplayer::open(&path).unwrap();
        assert_eq!(replayer.declared_frame_count(), 0);
        assert_eq!(replayer.frame_count(), 3);
        assert_eq!(replayer.iter().collect::<Vec<_>>(), vec![0x8, 0x40, 0x1]);
        assert_eq!(replayer.anchor_path(), dir.path().join("crashed.state"));
    }

    // ========================================================================
    // Audio/video recordings
    // ========================================================================

    #[test]
    fn test_identical_frames_container_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.grec");

        let mut recorder = Recorder::new(&path, RecorderConfig::default());
        recorder.start().unwrap();
        let frame = vec![0x40u8; FRAME_BYTES];
        let silence = vec![0u8; 2940];
        for _ in 0..5 {
            recorder.capture(&frame, &silence).unwrap();
        }
        let report = recorder.stop();
        assert_eq!(report.frame_count, 5);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"GEMBAREC");
        assert_eq!(&bytes[bytes.len() - 4..], b"GEND");
        let footer = &bytes[bytes.len() - 8..bytes.len() - 4];
        assert_eq!(u32::from_le_bytes(footer.try_into().unwrap()), 5);

        let mut reader = ContainerReader::open(&path).unwrap();
        let mut pcts = Vec::new();
        while let Some(meta) = reader.next_record_meta().unwrap() {
            pcts.push(meta.change_pct);
        }
        // Only the first frame differs from the zeroed start
        assert_eq!(pcts, vec![100, 0, 0, 0, 0]);
    }

    #[test]
    fn test_recorded_core_session_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.grec");

        let mut core = FakeCore::new();
        let mut recorder = Recorder::new(&path, RecorderConfig::from_core(&core));
        recorder.start().unwrap();
        let mut expected = Vec::new();
        for (mask, frames) in SCRIPT {
            for _ in 0..frames / 3 {
                core.set_keys(mask);
                core.run_frame().unwrap();
                recorder.capture_core(&mut core).unwrap();
                expected.push(core.video_buffer().to_vec());
            }
        }
        recorder.stop();

        let info = stats(&path).unwrap();
        assert_eq!(info.frame_count, 50);
        assert_eq!((info.width, info.height), (TEST_WIDTH, TEST_HEIGHT));
        assert_eq!(info.footer_frame_count, Some(50));
        assert!(info.audio_size > 0);
        assert!(info.compressed_video_size < info.raw_video_size);

        let mut frames: Vec<Vec<u8>> = Vec::new();
        let count = decode_frames(&path, &mut frames, None).unwrap();
        assert_eq!(count, 50);
        assert_eq!(frames, expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_round_trip_through_encoder_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("piped.grec");

        let mut core = FakeCore::new();
        let mut recorder = Recorder::new(&path, RecorderConfig::from_core(&core));
        recorder.start().unwrap();
        for (mask, frames) in SCRIPT {
            core.set_keys(mask);
            for _ in 0..frames / 10 {
                core.run_frame().unwrap();
                recorder.capture_core(&mut core).unwrap();
            }
        }
        recorder.stop();

        let output = dir.path().join("piped.rgba");
        let options = DecodeOptions {
            encoder: Some(crate::test_utils::copying_encoder(dir.path())),
            ..Default::default()
        };
        let summary = decode(&path, &output, &options, None).unwrap();

        assert_eq!(summary.frame_count, 15);
        assert_eq!((summary.width, summary.height), (TEST_WIDTH, TEST_HEIGHT));
        let size = std::fs::metadata(&output).unwrap().len();
        assert_eq!(size, 15 * FRAME_BYTES as u64);
        // The last frame piped out is the core's final picture
        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(&bytes[bytes.len() - FRAME_BYTES..], core.video_buffer());
    }

    #[test]
    fn test_round_trip_through_ffmpeg() {
        let Ok(_) = which::which("ffmpeg") else {
            eprintln!("ffmpeg not on PATH, skipping");
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.grec");

        let mut core = FakeCore::new();
        let mut recorder = Recorder::new(&path, RecorderConfig::from_core(&core));
        recorder.start().unwrap();
        for (mask, frames) in SCRIPT {
            core.set_keys(mask);
            for _ in 0..frames / 5 {
                core.run_frame().unwrap();
                recorder.capture_core(&mut core).unwrap();
            }
        }
        recorder.stop();

        let output = dir.path().join("clip.mp4");
        let mut last = 0.0;
        let mut progress = |p: f64| last = p;
        let summary = decode(
            &path,
            &output,
            &DecodeOptions::default(),
            Some(&mut progress),
        )
        .unwrap();

        assert_eq!(summary.frame_count, 30);
        assert_eq!((summary.width, summary.height), (TEST_WIDTH, TEST_HEIGHT));
        assert_eq!(last, 1.0);
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }
}
