//! Search and library data returned by the remote service or the local playlist

use super::track::Track;

/// Categories a remote search can ask for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchType {
    Track,
    Artist,
    Album,
    Playlist,
}

impl SearchType {
    pub const ALL: [SearchType; 4] = [
        SearchType::Track,
        SearchType::Artist,
        SearchType::Album,
        SearchType::Playlist,
    ];
}

/// An album from search results
#[derive(Clone, Debug, PartialEq)]
pub struct SearchAlbum {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub cover_url: String,
}

/// An artist from search results
#[derive(Clone, Debug, PartialEq)]
pub struct SearchArtist {
    pub id: String,
    pub name: String,
    pub image_url: String,
}

/// A playlist as listed in search results or the user's library
#[derive(Clone, Debug, PartialEq)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub total_tracks: u32,
}

/// Where a set of search results came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchSource {
    Remote,
    #[default]
    Local,
}

/// Combined search results
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResults {
    pub tracks: Vec<Track>,
    pub albums: Vec<SearchAlbum>,
    pub artists: Vec<SearchArtist>,
    pub playlists: Vec<PlaylistSummary>,
    pub source: SearchSource,
}

impl SearchResults {
    pub fn local(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            source: SearchSource::Local,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
            && self.albums.is_empty()
            && self.artists.is_empty()
            && self.playlists.is_empty()
    }
}
