//! Per-layer grouping of clips for presentation.

use montage_core::RationalTime;
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::clip::Clip;

/// The clips on one layer, sorted by start.
#[derive(Debug, Clone)]
pub struct Track<'a> {
    pub layer: i32,
    pub clips: SmallVec<[&'a Clip; 8]>,
}

impl<'a> Track<'a> {
    /// End of the last clip on this layer.
    pub fn duration(&self) -> RationalTime {
        self.clips
            .iter()
            .map(|c| c.end())
            .max()
            .unwrap_or(RationalTime::ZERO)
    }

    /// The clip covering `time` on this layer, if any.
    pub fn clip_at(&self, time: RationalTime) -> Option<&'a Clip> {
        self.clips.iter().copied().find(|c| c.range().contains(time))
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

/// Group clips per layer, ascending by layer, clips within a layer by start.
pub fn tracks_by_layer(clips: &[Clip]) -> Vec<Track<'_>> {
    let mut layers: BTreeMap<i32, SmallVec<[&Clip; 8]>> = BTreeMap::new();
    for clip in clips {
        layers.entry(clip.layer).or_default().push(clip);
    }
    layers
        .into_iter()
        .map(|(layer, mut clips)| {
            clips.sort_by_key(|c| c.start);
            Track { layer, clips }
        })
        .collect()
}
