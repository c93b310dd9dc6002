//! Built-in sample tracks loaded when no other playlist is available

use std::path::Path;

use super::track::Track;

struct Sample {
    id: &'static str,
    title: &'static str,
    artist: &'static str,
    album: &'static str,
    duration: f64,
    cover: &'static str,
    file: &'static str,
    color: &'static str,
}

const SAMPLES: [Sample; 5] = [
    Sample {
        id: "1",
        title: "Blinding Lights",
        artist: "The Weeknd",
        album: "After Hours",
        duration: 201.0,
        cover: "assets/covers/blinding-lights.jpeg",
        file: "sample1.mp3",
        color: "#E13300",
    },
    Sample {
        id: "2",
        title: "Bad Guy",
        artist: "Billie Eilish",
        album: "When We All Fall Asleep, Where Do We Go?",
        duration: 194.0,
        cover: "assets/covers/bad-guy.jpeg",
        file: "sample2.mp3",
        color: "#00E1DD",
    },
    Sample {
        id: "3",
        title: "Shape of You",
        artist: "Ed Sheeran",
        album: "÷ (Divide)",
        duration: 234.0,
        cover: "assets/covers/shape-of-you.jpeg",
        file: "sample3.mp3",
        color: "#3300E1",
    },
    Sample {
        id: "4",
        title: "Don't Start Now",
        artist: "Dua Lipa",
        album: "Future Nostalgia",
        duration: 183.0,
        cover: "assets/covers/dont-start-now.jpeg",
        file: "sample4.mp3",
        color: "#E100DD",
    },
    Sample {
        id: "5",
        title: "Uptown Funk",
        artist: "Mark Ronson ft. Bruno Mars",
        album: "Uptown Special",
        duration: 270.0,
        cover: "assets/covers/uptown-funk.jpeg",
        file: "sample5.mp3",
        color: "#A1E100",
    },
];

/// Sample tracks with audio files resolved under `music_dir`
pub fn sample_tracks(music_dir: &Path) -> Vec<Track> {
    SAMPLES
        .iter()
        .map(|sample| {
            let path = music_dir.join(sample.file);
            Track::new(
                sample.id,
                sample.title,
                sample.artist,
                sample.album,
                sample.duration,
                &path.to_string_lossy(),
            )
            .with_cover(sample.cover)
            .with_accent(sample.color)
        })
        .collect()
}
