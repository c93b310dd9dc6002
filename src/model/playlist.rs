//! Ordered track list used for navigation

use crate::error::{PlayerError, Result};

use super::track::Track;

/// Ordered sequence of tracks; insertion order defines next/previous
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn append(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Track> {
        if index >= self.tracks.len() {
            return Err(PlayerError::NotFound {
                index,
                len: self.tracks.len(),
            });
        }
        Ok(self.tracks.remove(index))
    }

    /// Case-insensitive substring search over title/artist/album
    pub fn search(&self, query: &str) -> Vec<Track> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.tracks
            .iter()
            .filter(|track| track.matches(&needle))
            .cloned()
            .collect()
    }
}

impl From<Vec<Track>> for Playlist {
    fn from(tracks: Vec<Track>) -> Self {
        Self::new(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist() -> Playlist {
        Playlist::new(vec![
            Track::new("1", "Blinding Lights", "The Weeknd", "After Hours", 201.0, "a.mp3"),
            Track::new("2", "Bad Guy", "Billie Eilish", "When We All Fall Asleep", 194.0, "b.mp3"),
            Track::new("3", "Uptown Funk", "Mark Ronson ft. Bruno Mars", "Uptown Special", 270.0, "c.mp3"),
        ])
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let list = playlist();

        let titles: Vec<_> = list.search("LIGHTS").into_iter().map(|t| t.id).collect();
        assert_eq!(titles, vec!["1"]);

        let by_artist: Vec<_> = list.search("bruno").into_iter().map(|t| t.id).collect();
        assert_eq!(by_artist, vec!["3"]);

        let by_album: Vec<_> = list.search("fall asleep").into_iter().map(|t| t.id).collect();
        assert_eq!(by_album, vec!["2"]);

        assert!(list.search("   ").is_empty());
        assert!(list.search("polka").is_empty());
    }

    #[test]
    fn remove_out_of_range_is_not_found() {
        let mut list = playlist();
        assert_eq!(
            list.remove_at(3),
            Err(PlayerError::NotFound { index: 3, len: 3 })
        );

        let removed = list.remove_at(1).unwrap();
        assert_eq!(removed.id, "2");
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).map(|t| t.id.as_str()), Some("3"));
    }
}
