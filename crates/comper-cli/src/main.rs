//! comper-cli: terminal playback of a demo progression

use std::thread;
use std::time::Duration;

use anyhow::Result;
use comper_core::{ChordQuality, HarmonicBlock, MelodyMark, PitchClass, TempoRamp};
use comper_services::PlaybackEngine;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("comper=debug".parse()?),
        )
        .init();

    info!("Starting comper");

    // The stock I-vi-ii-V workout, four beats per chord
    let blocks = vec![
        HarmonicBlock::new(PitchClass::C, ChordQuality::from_tag("Major 9"), 0.0, 4.0),
        HarmonicBlock::new(PitchClass::A, ChordQuality::from_tag("Minor 7"), 4.0, 4.0),
        HarmonicBlock::new(PitchClass::D, ChordQuality::from_tag("Minor 9"), 8.0, 4.0),
        HarmonicBlock::new(PitchClass::G, ChordQuality::from_tag("Dominant 13"), 12.0, 4.0),
    ];
    // A sparse guide-tone line over the changes
    let marks = vec![
        MelodyMark::new(0, 0),
        MelodyMark::new(3, 4),
        MelodyMark::new(5, 8),
        MelodyMark::new(1, 12),
        MelodyMark::new(0, 14),
    ];

    let mut engine = PlaybackEngine::new(TempoRamp::default());
    engine.play(&blocks, &marks, 120.0)?;

    // Two loop passes of the 8-second form
    for _ in 0..16 {
        thread::sleep(Duration::from_secs(1));
        if let Some(err) = engine.take_stream_error() {
            info!(error = %err, "Stream reported an error");
        }
        info!(
            bpm = %engine.display_bpm(),
            playhead = format!("{:.2}", engine.playhead_secs()),
            "Transport"
        );
    }

    engine.stop();
    engine.dispose();
    Ok(())
}
