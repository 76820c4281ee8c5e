//! Source URL resolution: responsive candidates and URL filters.

use crate::domain::entities::ElementId;
use crate::domain::options::LazyOptions;
use crate::domain::ports::SourceFilter;

/// Width assumed for a candidate without a descriptor.
const UNSIZED_CANDIDATE_WIDTH: u32 = 99_999;

/// Leading integer of a descriptor: `640w` is 640, `2x` is 2, `1.5x` is 1.
fn descriptor_value(descriptor: &str) -> Option<u32> {
    let end = descriptor
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(descriptor.len());
    descriptor[..end].parse().ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    width: u32,
    url: String,
}

fn parse_candidates(srcset: &str) -> Vec<Candidate> {
    srcset
        .trim()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.rfind(' ') {
            None => Some(Candidate {
                width: UNSIZED_CANDIDATE_WIDTH,
                url: entry.to_string(),
            }),
            Some(split) => {
                let width = descriptor_value(&entry[split + 1..])?;
                Some(Candidate {
                    width,
                    url: entry[..split].trim().to_string(),
                })
            }
        })
        .collect()
}

/// Picks a candidate from a `srcset` list for a box `target_width` device
/// pixels wide.
///
/// Candidates are ranked widest first, a `.webp` winning ties. The pick is
/// the first candidate whose next narrower neighbour would fall below the
/// target, or the narrowest one.
#[must_use]
pub fn select_from_srcset(srcset: &str, target_width: f64) -> Option<String> {
    let mut candidates = parse_candidates(srcset);
    candidates.sort_by(|a, b| {
        b.width
            .cmp(&a.width)
            .then_with(|| b.url.ends_with(".webp").cmp(&a.url.ends_with(".webp")))
    });

    for (index, candidate) in candidates.iter().enumerate() {
        match candidates.get(index + 1) {
            Some(next) if f64::from(next.width) < target_width => {
                return Some(candidate.url.clone());
            }
            Some(_) => {}
            None => return Some(candidate.url.clone()),
        }
    }
    None
}

/// Appends a fixed query parameter, e.g. a cache-busting token.
#[derive(Debug, Clone)]
pub struct AppendQuery {
    key: String,
    value: String,
}

impl AppendQuery {
    /// Creates the filter.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl SourceFilter for AppendQuery {
    fn filter(&self, _element: ElementId, src: String, _options: &LazyOptions) -> String {
        if src.starts_with("data:") {
            return src;
        }
        let separator = if src.contains('?') { '&' } else { '?' };
        format!("{src}{separator}{}={}", self.key, self.value)
    }
}
