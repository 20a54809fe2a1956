#![no_main]

use libfuzzer_sys::fuzz_target;
use playshelf::audio::NullMediaEngine;
use playshelf::controller::PlaybackController;
use playshelf::model::{Playlist, Track};
use std::time::Instant;

fuzz_target!(|data: &[u8]| {
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let len = data.first().map_or(1, |byte| usize::from(byte % 8));
    let mut tracks = Vec::with_capacity(len);
    for idx in 0..len {
        let name = format!("track_{idx}.mp3");
        if std::fs::write(dir.path().join(&name), b"").is_err() {
            return;
        }
        tracks.push(Track::new(name));
    }
    let playlist = Playlist {
        name: String::from("fuzz"),
        dir: dir.path().to_path_buf(),
        tracks,
    };

    let mut controller = PlaybackController::new(Box::new(NullMediaEngine::new()), None);
    controller.open_playlist(&playlist);

    for byte in data.iter().skip(1) {
        let _ = match byte % 10 {
            0 => controller.play_current(),
            1 => controller.next(true),
            2 => controller.next(false),
            3 => controller.previous(),
            4 => controller.shuffle(),
            5 => controller.on_end_of_track(),
            6 => controller.drain_events().map(|_| ()),
            7 => controller.select_track(usize::from(byte / 10)),
            8 => controller.set_volume(i32::from(*byte) - 50),
            _ => {
                controller.toggle_pause();
                controller.tick(Instant::now());
                Ok(())
            }
        };
        let session = controller.session();
        assert!(session.ordered_tracks.is_empty() || session.current_index < session.ordered_tracks.len());
        assert!(session.volume <= 100);
    }
});
