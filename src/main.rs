// src/main.rs
//
// Offline demo: plays an arpeggio through every layer and logs telemetry.
// Run with RUST_LOG=info (or debug) to see the output.

use trellis::{EngineConfig, Instrument, ScaleGenerator, create_bridge};

const NOTES: [usize; 8] = [0, 2, 4, 9, 11, 16, 20, 27];
const BLOCKS_PER_NOTE: usize = 40;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = EngineConfig::default();
    let instrument = Instrument::with_default_layers(config)?;
    let (mut control, mut audio) = create_bridge(instrument, config.command_capacity);

    let mut scale = ScaleGenerator::default();
    let mut left = vec![0.0_f32; config.block_size];
    let mut right = vec![0.0_f32; config.block_size];

    for layer in 0..control.layer_count() {
        control.select_layer(layer)?;
        control.set_scale(&scale.generate())?;
        log::info!(
            "Layer {} in {} {}",
            layer,
            scale.root_name(),
            scale.pattern().name
        );

        let mut peak = 0.0_f32;
        for &note in &NOTES {
            control.note_on(note)?;
            for b in 0..BLOCKS_PER_NOTE {
                if b == BLOCKS_PER_NOTE / 2 {
                    control.note_off(note)?;
                }
                audio.process(&mut left, &mut right);
                let t = control.telemetry();
                peak = peak.max(t.peaks[0]).max(t.peaks[1]);
            }
        }

        let t = control.telemetry();
        log::info!(
            "  blocks {} | active voices {} | peak {:.3} | dropped {}",
            t.blocks,
            t.active_voices,
            peak,
            t.dropped_commands
        );

        scale.nudge_pattern(1);
        scale.nudge_root(5);
    }

    // Last default layer switches row timbres
    control.select_layer(control.layer_count() - 1)?;
    for voice in 0..3 {
        control.select_voice(0, voice)?;
        control.note_on(4)?;
        for _ in 0..BLOCKS_PER_NOTE {
            audio.process(&mut left, &mut right);
        }
        let t = control.telemetry();
        log::info!("Row 0 voice {}: peak {:.3}", voice, t.peaks[0].max(t.peaks[1]));
    }
    control.reset()?;

    // Parameter edits bypass the command queue
    control.set_param("crusher.bits", 6.0)?;
    control.set_param("delay.active", 0.0)?;
    control.note_on(0)?;
    for _ in 0..BLOCKS_PER_NOTE {
        audio.process(&mut left, &mut right);
    }
    let t = control.telemetry();
    log::info!(
        "Crushed: peak L {:.3} R {:.3} after {} frames",
        t.peaks[0],
        t.peaks[1],
        t.frames
    );

    Ok(())
}
