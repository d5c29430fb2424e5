use trellis::{
    ChainSpec, EngineConfig, Instrument, LAYER_KEYS, LayerSpec, NoteVoice, POLY_VOICES, PolySynth, ScaleGenerator,
    Voice, VoiceState, create_bridge, default_layers,
};

fn ramp_scale() -> [f32; LAYER_KEYS] {
    std::array::from_fn(|i| 110.0 + 5.0 * i as f32)
}

fn render(inst: &mut Instrument, frames: usize) -> (Vec<f32>, Vec<f32>) {
    let mut left = vec![0.0; frames];
    let mut right = vec![0.0; frames];
    inst.process_block(&mut left, &mut right);
    (left, right)
}

#[test]
fn retriggered_note_runs_full_lifecycle_on_one_voice() {
    let layers = [LayerSpec::uniform("tri", |_| NoteVoice::soft_triangle())];
    let mut inst = Instrument::new(EngineConfig::default(), &layers, &ChainSpec::bare()).unwrap();
    inst.set_scale(&ramp_scale());

    let mut states = vec![inst.voice_state(0, 0).unwrap()];

    inst.note_on(0);
    states.push(inst.voice_state(0, 0).unwrap());
    render(&mut inst, 2205);

    inst.note_on(0);
    states.push(inst.voice_state(0, 0).unwrap());
    render(&mut inst, 2205);

    inst.note_off(0);
    states.push(inst.voice_state(0, 0).unwrap());
    // Release is 84.5 ms
    render(&mut inst, 8820);
    states.push(inst.voice_state(0, 0).unwrap());

    assert_eq!(
        states,
        [
            VoiceState::Idle,
            VoiceState::Sounding,
            VoiceState::Sounding,
            VoiceState::Releasing,
            VoiceState::Idle
        ]
    );
    assert_eq!(inst.active_voices(), 0);
    assert!((1..LAYER_KEYS).all(|i| inst.voice_state(0, i) == Some(VoiceState::Idle)));
}

#[test]
fn selected_layer_output_matches_layer_alone() {
    let config = EngineConfig::default();
    let pair = [
        LayerSpec::uniform("tri", |_| NoteVoice::soft_triangle()),
        LayerSpec::uniform("pluck", |_| NoteVoice::cheap_pluck()),
    ];
    let alone = [LayerSpec::uniform("pluck", |_| NoteVoice::cheap_pluck())];

    let mut mixed = Instrument::new(config, &pair, &ChainSpec::default()).unwrap();
    let mut single = Instrument::new(config, &alone, &ChainSpec::default()).unwrap();
    for inst in [&mut mixed, &mut single] {
        inst.set_scale(&ramp_scale());
    }

    // Notes held on the old layer must not carry over
    mixed.note_on(3);
    mixed.note_on(17);
    mixed.select_layer(1);
    assert!(!mixed.layer(0).unwrap().is_enabled());

    for inst in [&mut mixed, &mut single] {
        inst.note_on(5);
        inst.note_on(30);
    }

    let (ml, mr) = render(&mut mixed, 4096);
    let (sl, sr) = render(&mut single, 4096);
    assert!(sl.iter().any(|s| *s != 0.0));
    for (a, b) in ml.iter().chain(&mr).zip(sl.iter().chain(&sr)) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn set_scale_twice_is_idempotent_across_layers() {
    let mut inst = Instrument::with_default_layers(EngineConfig::default()).unwrap();
    let table = ScaleGenerator::new(2, 5).generate();

    inst.set_scale(&table);
    let first: Vec<_> = (0..inst.layer_count())
        .map(|k| inst.layer(k).unwrap().frequencies(inst.graph()))
        .collect();
    inst.set_scale(&table);
    let second: Vec<_> = (0..inst.layer_count())
        .map(|k| inst.layer(k).unwrap().frequencies(inst.graph()))
        .collect();

    assert_eq!(first, second);
    assert!(first.iter().all(|f| *f == table));
}

#[test]
fn sample_layer_plays_reference_pitch_at_unity_speed() {
    let mut inst = Instrument::with_default_layers(EngineConfig::default()).unwrap();
    let mut table = ramp_scale();
    table[0] = 220.0;
    table[1] = 230.0;
    inst.set_scale(&table);
    inst.select_layer(1);
    inst.note_on(0);
    inst.note_on(1);

    let layer = inst.layer(1).unwrap();
    let speed = |key: usize| {
        inst.graph()
            .voice(layer.voice_id(key).unwrap())
            .and_then(|v| v.as_sample())
            .map(|s| s.speed())
            .unwrap()
    };
    assert_eq!(speed(0), 1.0);
    assert!((speed(1) - 230.0 / 220.0).abs() < 1e-6);
}

#[test]
fn retrigger_restarts_sample_playback() {
    let mut inst = Instrument::with_default_layers(EngineConfig::default()).unwrap();
    inst.set_scale(&ramp_scale());
    inst.select_layer(1);
    inst.note_on(4);
    render(&mut inst, 4096);

    let id = inst.layer(1).unwrap().voice_id(4).unwrap();
    let played = inst.graph().voice(id).and_then(|v| v.as_sample()).unwrap().position();
    assert!(played > 1000.0);

    inst.note_on(4);
    let restarted = inst.graph().voice(id).and_then(|v| v.as_sample()).unwrap().position();
    assert!(restarted < 600.0);
    assert_eq!(inst.voice_state(1, 4), Some(VoiceState::Sounding));
}

#[test]
fn delay_bypass_leaves_no_tail() {
    let layers = [LayerSpec::uniform("tri", |_| NoteVoice::soft_triangle())];
    let mut inst = Instrument::new(EngineConfig::default(), &layers, &ChainSpec::default()).unwrap();
    inst.set_scale(&ramp_scale());
    inst.set_delay_active(false);

    inst.note_on(0);
    render(&mut inst, 2048);
    inst.note_off(0);
    // Release finishes well inside 200 ms; the delay would still ring
    render(&mut inst, 8820);
    let (l, r) = render(&mut inst, 4096);
    assert!(l.iter().chain(&r).all(|s| *s == 0.0));
}

#[test]
fn pool_steals_oldest_note() {
    let mut synth = PolySynth::new(EngineConfig::default()).unwrap();
    let mut left = vec![0.0; 441];
    let mut right = vec![0.0; 441];

    for note in 0..=POLY_VOICES {
        let a = synth.note_on(note).unwrap();
        if note < POLY_VOICES {
            assert_eq!(a.voice, note);
            assert_eq!(a.stolen, None);
        } else {
            assert_eq!(a.stolen, Some(0));
            assert_eq!(a.voice, 0);
        }
        synth.process_block(&mut left, &mut right);
    }
    assert_eq!(synth.allocator().voice_for(0), None);
    assert_eq!(synth.allocator().active_count(), POLY_VOICES);
}

#[test]
fn bridge_drives_default_instrument() {
    let config = EngineConfig::default();
    let inst = Instrument::new(config, &default_layers(config.sample_rate as f32), &ChainSpec::default()).unwrap();
    let (mut control, mut audio) = create_bridge(inst, config.command_capacity);
    let mut left = vec![0.0; config.block_size];
    let mut right = vec![0.0; config.block_size];

    control.set_scale(&ScaleGenerator::default().generate()).unwrap();
    control.select_layer(2).unwrap();
    control.note_on(8).unwrap();
    audio.process(&mut left, &mut right);

    let t = control.telemetry();
    assert_eq!(t.current_layer, 2);
    assert_eq!(t.active_voices, 1);
    assert!(audio.instrument().layer(2).unwrap().is_enabled());

    // Disabled layers ignore notes even if the voices are poked directly
    let id = audio.instrument().layer(0).unwrap().voice_id(8).unwrap();
    assert!(!audio.instrument().graph().voice(id).unwrap().is_enabled());
}
