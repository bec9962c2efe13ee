// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Section model: a derived partition of the track timeline.
//!
//! Sections are computed from word-level lyric timing when it exists,
//! falling back to fixed-size slicing of the known duration. The model is
//! pure output of `(word timings | none, duration)`: it has no mutation
//! operations and is recomputed wholesale whenever its inputs change.
//!
//! Replacement history is tracked alongside by raw time range, never by
//! section index, so a later recomputation of the partition cannot drift
//! the markers.

use serde::{Deserialize, Serialize};

/// Default length of a fallback section slice, in seconds.
pub const DEFAULT_SLICE_SECONDS: f64 = 30.0;

/// One word with aligned start/end times, as delivered by the lyric
/// timing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedWord {
    /// The word text. May carry lyric-structure markup: a bracketed label
    /// like `[Chorus]`, or embedded blank lines separating stanzas.
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
}

impl TimedWord {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Whether this word is a structural marker like `[Verse 2]` rather
    /// than sung text.
    fn is_marker(&self) -> bool {
        let t = self.text.trim();
        t.len() > 2 && t.starts_with('[') && t.ends_with(']')
    }

    /// Whether a stanza break follows this word in the source lyric text.
    fn ends_stanza(&self) -> bool {
        self.text.contains("\n\n")
    }

    /// Marker label without brackets.
    fn marker_label(&self) -> Option<String> {
        if self.is_marker() {
            let t = self.text.trim();
            Some(t[1..t.len() - 1].trim().to_string())
        } else {
            None
        }
    }
}

/// A named, time-bounded structural segment of the track.
///
/// Sections are contiguous and ordered: section `i`'s `end` equals
/// section `i + 1`'s `start`, the first anchors to `0` and the last to
/// the track duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub index: usize,
    pub label: String,
    pub start: f64,
    pub end: f64,
}

impl Section {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

/// Record of a sub-range that has been regenerated at least once.
///
/// Additive: replacing an overlapping range adds a new entry, it never
/// deletes the old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacedRange {
    pub start: f64,
    pub end: f64,
    pub result_audio_url: String,
    pub job_id: String,
}

impl ReplacedRange {
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.start < end && start < self.end
    }
}

/// The derived section partition plus replacement history for one track.
#[derive(Debug, Clone, Default)]
pub struct SectionMap {
    sections: Vec<Section>,
    duration: f64,
    replaced: Vec<ReplacedRange>,
}

impl SectionMap {
    /// Derive the partition. Word timing wins when present; otherwise the
    /// duration is sliced into fixed-size segments.
    pub fn derive(words: Option<&[TimedWord]>, duration: f64, slice_seconds: f64) -> Self {
        let sections = match words {
            Some(words) if !words.is_empty() && duration > 0.0 => {
                sections_from_words(words, duration)
            }
            _ => fallback_sections(duration, slice_seconds),
        };
        Self {
            sections,
            duration,
            replaced: Vec::new(),
        }
    }

    /// Recompute the partition with new inputs, keeping replacement
    /// history: ranges are recorded by raw time, not by section index.
    pub fn recompute(&mut self, words: Option<&[TimedWord]>, duration: f64, slice_seconds: f64) {
        let replaced = std::mem::take(&mut self.replaced);
        *self = Self::derive(words, duration, slice_seconds);
        self.replaced = replaced;
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn get(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// The section containing the given time, if any.
    pub fn section_at(&self, time: f64) -> Option<&Section> {
        if self.sections.is_empty() {
            return None;
        }
        // The final section includes its end bound.
        let last = self.sections.len() - 1;
        self.sections
            .iter()
            .enumerate()
            .find(|(i, s)| s.contains(time) || (*i == last && time == s.end))
            .map(|(_, s)| s)
    }

    /// Record that a range was replaced. Additive.
    pub fn record_replacement(&mut self, range: ReplacedRange) {
        self.replaced.push(range);
    }

    pub fn replaced_ranges(&self) -> &[ReplacedRange] {
        &self.replaced
    }

    /// Replacement entries intersecting `[start, end)`, for rendering
    /// "already edited" markers over a selection.
    pub fn replaced_ranges_overlapping(&self, start: f64, end: f64) -> Vec<&ReplacedRange> {
        self.replaced
            .iter()
            .filter(|r| r.overlaps(start, end))
            .collect()
    }
}

/// Group timed words into sections at lyric-structure boundaries.
fn sections_from_words(words: &[TimedWord], duration: f64) -> Vec<Section> {
    struct Group {
        label: Option<String>,
        start: f64,
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut break_after_previous = false;

    for word in words {
        if let Some(label) = word.marker_label() {
            groups.push(Group {
                label: Some(label),
                start: word.start,
            });
            break_after_previous = false;
            continue;
        }
        if groups.is_empty() || break_after_previous {
            groups.push(Group {
                label: None,
                start: word.start,
            });
        }
        break_after_previous = word.ends_stanza();
    }

    if groups.is_empty() {
        return fallback_sections(duration, DEFAULT_SLICE_SECONDS);
    }

    // Boundaries come from group starts; contiguity is enforced by
    // anchoring section i's end to section i+1's start, the first section
    // to 0 and the last to the duration.
    let count = groups.len();
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let start = if i == 0 { 0.0 } else { groups[i].start };
            let end = if i + 1 < count {
                groups[i + 1].start
            } else {
                duration
            };
            let label = group
                .label
                .clone()
                .unwrap_or_else(|| format!("Section {}", i + 1));
            Section {
                index: i,
                label,
                start,
                end,
            }
        })
        .filter(|s| s.start < s.end || count == 1)
        .enumerate()
        .map(|(i, mut s)| {
            s.index = i;
            s
        })
        .collect()
}

/// Fixed-size time slicing for tracks without word timing.
fn fallback_sections(duration: f64, slice_seconds: f64) -> Vec<Section> {
    if duration <= 0.0 {
        return Vec::new();
    }
    let slice = if slice_seconds > 0.0 {
        slice_seconds
    } else {
        DEFAULT_SLICE_SECONDS
    };
    let count = (duration / slice).ceil().max(1.0) as usize;
    (0..count)
        .map(|i| {
            let start = i as f64 * slice;
            let end = if i + 1 == count {
                duration
            } else {
                (i as f64 + 1.0) * slice
            };
            Section {
                index: i,
                label: format!("Segment {}", i + 1),
                start,
                end,
            }
        })
        .collect()
}

/// Extract the lyric text covered by a time range, for prefilling
/// replacement instructions. Words within a small tolerance of the bounds
/// are included; markup and line breaks are flattened to spaces.
pub fn lyrics_for_range(words: &[TimedWord], start: f64, end: f64) -> String {
    const TOLERANCE: f64 = 0.1;
    words
        .iter()
        .filter(|w| w.start >= start - TOLERANCE && w.end <= end + TOLERANCE)
        .filter(|w| !w.is_marker())
        .map(|w| w.text.replace('\n', " ").trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
