use slotmix_lib::{
    AudioEngine, BackendCall, BackendError, EngineError, MockBackend, MockJournal, SoundCategory,
    SoundId, BGM_CAPACITY, SE_CAPACITY,
};

fn engine() -> (AudioEngine<MockBackend>, MockJournal) {
    let backend = MockBackend::new()
        .with_file("theme.ogg", 90.0)
        .with_file("battle.ogg", 120.0)
        .with_file("hit.wav", 0.25)
        .with_undecodable("broken.mp3");
    let journal = backend.journal();
    (AudioEngine::new(backend), journal)
}

#[test]
fn bgm_table_fills_in_index_order_then_refuses() {
    let (mut engine, _) = engine();
    let ids: Vec<u32> = (0..BGM_CAPACITY)
        .map(|_| engine.bgm_load("theme.ogg").raw())
        .collect();
    assert_eq!(ids, (1..=BGM_CAPACITY as u32).collect::<Vec<_>>());

    assert_eq!(engine.bgm_load("theme.ogg"), SoundId::NONE);
    assert_eq!(engine.bgm_live_count(), BGM_CAPACITY);
    match engine.try_bgm_load("theme.ogg") {
        Err(EngineError::CapacityExceeded { category, capacity }) => {
            assert_eq!(category, SoundCategory::Bgm);
            assert_eq!(capacity, 16);
        }
        other => panic!("expected capacity error, got {:?}", other),
    }
}

#[test]
fn se_table_holds_sixty_four_sounds() {
    let (mut engine, journal) = engine();
    for expected in 1..=SE_CAPACITY as u32 {
        assert_eq!(engine.se_load("hit.wav").raw(), expected);
    }
    let loads_before = journal.calls().len();

    assert!(engine.se_load("hit.wav").is_none());
    assert_eq!(engine.se_live_count(), 64);
    assert_eq!(engine.se_capacity(), 64);
    assert_eq!(journal.calls().len(), loads_before);
}

#[test]
fn freed_slots_are_reused_lowest_first() {
    let (mut engine, _) = engine();
    for _ in 0..5 {
        engine.se_load("hit.wav");
    }
    engine.se_free(SoundId::from_raw(4));
    engine.se_free(SoundId::from_raw(2));
    assert_eq!(engine.se_live_count(), 3);

    assert_eq!(engine.se_load("hit.wav").raw(), 2);
    assert_eq!(engine.se_load("hit.wav").raw(), 4);
    assert_eq!(engine.se_load("hit.wav").raw(), 6);
}

#[test]
fn missing_file_returns_zero_without_side_effects() {
    let (mut engine, journal) = engine();
    engine.bgm_load("theme.ogg");

    assert_eq!(engine.bgm_load("nowhere.ogg"), SoundId::NONE);
    assert_eq!(engine.se_load("nowhere.wav"), SoundId::NONE);
    assert_eq!(engine.bgm_live_count(), 1);
    assert_eq!(engine.se_live_count(), 0);
    assert_eq!(journal.calls().len(), 2);

    match engine.try_se_load("nowhere.wav") {
        Err(EngineError::LoadFailed {
            category,
            source: BackendError::Io(err),
            ..
        }) => {
            assert_eq!(category, SoundCategory::Se);
            assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected load failure, got {:?}", other),
    }
}

#[test]
fn undecodable_file_is_a_load_failure() {
    let (mut engine, _) = engine();
    assert!(matches!(
        engine.try_bgm_load("broken.mp3"),
        Err(EngineError::LoadFailed {
            source: BackendError::Decode(_),
            ..
        })
    ));
    assert_eq!(engine.bgm_live_count(), 0);
    assert_eq!(engine.bgm_load("theme.ogg").raw(), 1);
}

#[test]
fn bgm_loops_by_default_and_se_does_not() {
    let (mut engine, journal) = engine();
    let bgm = engine.bgm_load("theme.ogg");
    let se = engine.se_load("hit.wav");

    let bgm_key = journal.key_for("theme.ogg").expect("bgm loaded");
    let se_key = journal.key_for("hit.wav").expect("se loaded");
    assert_eq!(
        journal.calls_for(bgm_key),
        vec![
            BackendCall::LoadStream {
                path: "theme.ogg".into(),
                key: bgm_key
            },
            BackendCall::SetLoop(bgm_key, true),
        ]
    );
    assert_eq!(
        journal.calls_for(se_key),
        vec![BackendCall::LoadBuffer {
            path: "hit.wav".into(),
            key: se_key
        }]
    );

    let backend = engine.backend();
    assert!(backend.voice(bgm_key).expect("bgm voice").looping);
    assert!(backend.voice(bgm_key).expect("bgm voice").streaming);
    assert!(!backend.voice(se_key).expect("se voice").looping);
    assert!(!engine.bgm_is_playing(bgm));
    assert!(!engine.se_is_playing(se));
}

#[test]
fn invalid_handles_are_silent_no_ops() {
    let (mut engine, journal) = engine();
    let bgm = engine.bgm_load("theme.ogg");
    let freed = engine.se_load("hit.wav");
    engine.se_free(freed);
    journal.clear();

    for id in [SoundId::NONE, SoundId::from_raw(9), SoundId::from_raw(u32::MAX), freed] {
        engine.se_play(id);
        engine.se_play_with_volume(id, 0.5);
        engine.se_stop(id);
        engine.se_set_volume(id, 0.5);
        engine.se_set_pitch(id, 2.0);
        engine.se_set_pan(id, -1.0);
        engine.se_set_loop(id, true);
        engine.se_free(id);
        assert!(!engine.se_is_playing(id));
        assert_eq!(engine.se_duration(id), 0.0);
        assert_eq!(engine.se_position(id), 0.0);
    }
    for id in [SoundId::NONE, SoundId::from_raw(2), SoundId::from_raw(17)] {
        engine.bgm_play(id);
        engine.bgm_stop(id);
        engine.bgm_pause(id);
        engine.bgm_resume(id);
        engine.bgm_seek(id, 3.0);
        engine.bgm_set_volume(id, 0.1);
        engine.bgm_set_pitch(id, 0.5);
        engine.bgm_set_pan(id, 1.0);
        engine.bgm_set_loop(id, false);
        engine.bgm_fade_in(id, 1.0);
        engine.bgm_fade_out(id, 1.0);
        engine.bgm_free(id);
        assert!(!engine.bgm_is_playing(id));
        assert_eq!(engine.bgm_position(id), 0.0);
        assert_eq!(engine.bgm_duration(id), 0.0);
    }
    engine.bgm_crossfade(SoundId::NONE, SoundId::from_raw(5), 1.0);

    assert!(journal.calls().is_empty());
    assert_eq!(engine.bgm_live_count(), 1);
    assert!(engine.validate_bgm(bgm).is_ok());
}

#[test]
fn categories_have_independent_handle_spaces() {
    let (mut engine, journal) = engine();
    let bgm = engine.bgm_load("theme.ogg");
    let se = engine.se_load("hit.wav");
    assert_eq!(bgm.raw(), 1);
    assert_eq!(se.raw(), 1);

    let se_key = journal.key_for("hit.wav").expect("se loaded");
    engine.bgm_free(bgm);
    assert_eq!(engine.bgm_live_count(), 0);
    assert_eq!(engine.se_live_count(), 1);

    // BGM table is now empty, so handle 1 no longer names anything there.
    engine.bgm_play(se);
    assert!(!engine.backend().voice(se_key).expect("se voice").playing);
    engine.se_play(se);
    assert!(engine.se_is_playing(se));
}

#[test]
fn validate_reports_rejected_handles() {
    let (mut engine, _) = engine();
    let se = engine.se_load("hit.wav");
    assert!(engine.validate_se(se).is_ok());

    match engine.validate_bgm(se) {
        Err(EngineError::InvalidHandle { category, id }) => {
            assert_eq!(category, SoundCategory::Bgm);
            assert_eq!(id, se);
        }
        other => panic!("expected invalid handle, got {:?}", other),
    }
    assert!(engine.validate_se(SoundId::NONE).is_err());
}

#[test]
fn free_unloads_backend_sound() {
    let (mut engine, journal) = engine();
    let bgm = engine.bgm_load("theme.ogg");
    let key = journal.key_for("theme.ogg").expect("bgm loaded");
    assert_eq!(engine.backend().live_voices(), 1);

    engine.bgm_free(bgm);
    assert_eq!(engine.backend().live_voices(), 0);
    assert_eq!(journal.calls().last(), Some(&BackendCall::Unload(key)));

    engine.bgm_free(bgm);
    assert_eq!(
        journal
            .calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::Unload(_)))
            .count(),
        1
    );
}

#[test]
fn teardown_releases_every_slot_before_shutdown() {
    let (mut engine, journal) = engine();
    engine.bgm_load("theme.ogg");
    engine.bgm_load("battle.ogg");
    engine.se_load("hit.wav");
    journal.clear();

    engine.destroy();

    let calls = journal.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[..3]
        .iter()
        .all(|call| matches!(call, BackendCall::Unload(_))));
    assert_eq!(calls[3], BackendCall::Shutdown);
}

#[test]
fn engine_drop_tears_down_too() {
    let (mut engine, journal) = engine();
    engine.se_load("hit.wav");
    drop(engine);
    assert_eq!(journal.calls().last(), Some(&BackendCall::Shutdown));
}

#[test]
fn recreated_engine_starts_empty() {
    let (mut engine, _) = engine();
    engine.bgm_load("theme.ogg");
    engine.se_load("hit.wav");
    engine.destroy();

    let (mut engine, _) = self::engine();
    assert_eq!(engine.bgm_live_count(), 0);
    assert_eq!(engine.se_live_count(), 0);
    assert_eq!(engine.bgm_load("battle.ogg").raw(), 1);
}
