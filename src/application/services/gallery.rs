//! Gallery view over loaded images: sanitizing, filtering and thumbnail sizing.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::domain::entities::TrackedElement;

/// Longest thumbnail edge, in pixels.
pub const THUMBNAIL_EDGE: f64 = 250.0;

/// Image format as far as the gallery cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// JPEG.
    Jpeg,
    /// PNG.
    Png,
    /// GIF.
    Gif,
    /// Anything else, webp and svg included.
    Other,
}

impl ImageKind {
    /// Short lowercase key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Other => "other",
        }
    }

    /// Guesses the kind from a URL's extension, ignoring query and fragment.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        match path.rsplit_once('.').map(|(_, ext)| ext) {
            Some("jpg" | "jpeg") => Self::Jpeg,
            Some("png") => Self::Png,
            Some("gif") => Self::Gif,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A loaded image with its natural size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryImage {
    /// Image URL.
    pub src: String,
    /// Natural width in pixels.
    pub natural_width: u32,
    /// Natural height in pixels.
    pub natural_height: u32,
}

impl GalleryImage {
    /// Kind guessed from the URL.
    #[must_use]
    pub fn kind(&self) -> ImageKind {
        ImageKind::from_url(&self.src)
    }

    /// Builds an entry from a loaded element.
    #[must_use]
    pub fn from_element(element: &TrackedElement) -> Option<Self> {
        if !element.state.is_loaded() {
            return None;
        }
        let natural = element.natural?;
        Some(Self {
            src: element.src.clone(),
            natural_width: natural.width,
            natural_height: natural.height,
        })
    }
}

/// Drops duplicates, inline `data:` images and tracking pixels.
#[must_use]
pub fn sanitize(images: impl IntoIterator<Item = GalleryImage>) -> Vec<GalleryImage> {
    let mut seen = HashSet::new();
    images
        .into_iter()
        .filter(|img| !img.src.starts_with("data:"))
        .filter(|img| img.natural_width > 1 && img.natural_height > 1)
        .filter(|img| seen.insert(img.src.clone()))
        .collect()
}

/// User-selected gallery filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryFilter {
    /// Allowed kinds; `None` allows every kind.
    pub kinds: Option<BTreeSet<ImageKind>>,
    /// Allowed natural widths.
    pub width: RangeInclusive<u32>,
    /// Allowed natural heights.
    pub height: RangeInclusive<u32>,
}

impl Default for GalleryFilter {
    fn default() -> Self {
        Self {
            kinds: None,
            width: 0..=u32::MAX,
            height: 0..=u32::MAX,
        }
    }
}

impl GalleryFilter {
    const KIND_ORDER: [ImageKind; 4] = [
        ImageKind::Jpeg,
        ImageKind::Png,
        ImageKind::Gif,
        ImageKind::Other,
    ];

    /// Requires at least `min_width x min_height` natural pixels.
    #[must_use]
    pub fn with_min_size(mut self, min_width: u32, min_height: u32) -> Self {
        self.width = min_width..=u32::MAX;
        self.height = min_height..=u32::MAX;
        self
    }

    /// Steps through single-kind filters: all, jpeg, png, gif, other, all.
    #[must_use]
    pub fn cycle_kind(mut self) -> Self {
        let current = self
            .kinds
            .as_ref()
            .filter(|kinds| kinds.len() == 1)
            .and_then(|kinds| kinds.first().copied());
        let next = match current {
            None => Some(Self::KIND_ORDER[0]),
            Some(kind) => Self::KIND_ORDER
                .iter()
                .position(|k| *k == kind)
                .and_then(|i| Self::KIND_ORDER.get(i + 1))
                .copied(),
        };
        self.kinds = next.map(|kind| BTreeSet::from([kind]));
        self
    }

    /// Short description, e.g. `png >= 100x0`.
    #[must_use]
    pub fn label(&self) -> String {
        let kinds = self.kinds.as_ref().map_or_else(
            || "all".to_string(),
            |kinds| {
                kinds
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            },
        );
        let (min_w, min_h) = (*self.width.start(), *self.height.start());
        if min_w == 0 && min_h == 0 {
            kinds
        } else {
            format!("{kinds} >= {min_w}x{min_h}")
        }
    }

    /// Narrows the filter to the given kinds.
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = ImageKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Returns whether `image` passes.
    #[must_use]
    pub fn matches(&self, image: &GalleryImage) -> bool {
        let kind_ok = self
            .kinds
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&image.kind()));
        kind_ok
            && self.width.contains(&image.natural_width)
            && self.height.contains(&image.natural_height)
    }
}

/// Number of images per kind.
#[must_use]
pub fn kind_counts(images: &[GalleryImage]) -> BTreeMap<ImageKind, usize> {
    let mut counts = BTreeMap::new();
    for image in images {
        *counts.entry(image.kind()).or_insert(0) += 1;
    }
    counts
}

/// Largest width and height over all images.
#[must_use]
pub fn max_dimensions(images: &[GalleryImage]) -> (u32, u32) {
    images.iter().fold((0, 0), |(w, h), img| {
        (w.max(img.natural_width), h.max(img.natural_height))
    })
}

/// Scales `width x height` down so neither edge exceeds `edge`. Never upscales.
#[must_use]
pub fn fit_within(width: u32, height: u32, edge: f64) -> (f64, f64) {
    let (w, h) = (f64::from(width), f64::from(height));
    if w <= 0.0 || h <= 0.0 {
        return (0.0, 0.0);
    }
    let ratio = (edge / w).min(edge / h).min(1.0);
    (w * ratio, h * ratio)
}

/// Serializable gallery snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct GallerySummary {
    /// Sanitized images in element order.
    pub images: Vec<GalleryImage>,
    /// Count per kind.
    pub kinds: BTreeMap<ImageKind, usize>,
    /// Widest natural width.
    pub max_width: u32,
    /// Tallest natural height.
    pub max_height: u32,
}

impl GallerySummary {
    /// Collects loaded elements into a sanitized summary.
    pub fn collect<'a>(elements: impl IntoIterator<Item = &'a TrackedElement>) -> Self {
        Self::collect_filtered(elements, &GalleryFilter::default())
    }

    /// Like `collect`, keeping only images that pass `filter`.
    pub fn collect_filtered<'a>(
        elements: impl IntoIterator<Item = &'a TrackedElement>,
        filter: &GalleryFilter,
    ) -> Self {
        let mut images = sanitize(elements.into_iter().filter_map(GalleryImage::from_element));
        images.retain(|image| filter.matches(image));
        let kinds = kind_counts(&images);
        let (max_width, max_height) = max_dimensions(&images);
        Self {
            images,
            kinds,
            max_width,
            max_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::entities::{ContainerId, ElementId, ImageSize, LoadState};

    fn img(src: &str, w: u32, h: u32) -> GalleryImage {
        GalleryImage {
            src: src.to_string(),
            natural_width: w,
            natural_height: h,
        }
    }

    #[test_case("a.jpg", ImageKind::Jpeg ; "jpg")]
    #[test_case("A.JPEG?w=20", ImageKind::Jpeg ; "jpeg with query")]
    #[test_case("b.png#frag", ImageKind::Png ; "png with fragment")]
    #[test_case("https://x.io/c.gif", ImageKind::Gif ; "gif")]
    #[test_case("d.webp", ImageKind::Other ; "webp")]
    #[test_case("noext", ImageKind::Other ; "no extension")]
    fn test_kind_from_url(url: &str, expected: ImageKind) {
        assert_eq!(ImageKind::from_url(url), expected);
    }

    #[test]
    fn test_sanitize() {
        let images = vec![
            img("a.jpg", 100, 100),
            img("a.jpg", 100, 100),
            img("data:image/gif;base64,AA", 10, 10),
            img("pixel.gif", 1, 1),
            img("b.png", 20, 30),
        ];
        let clean = sanitize(images);
        assert_eq!(clean, vec![img("a.jpg", 100, 100), img("b.png", 20, 30)]);
    }

    #[test]
    fn test_filter_by_kind_and_size() {
        let images = vec![
            img("a.jpg", 800, 600),
            img("b.png", 200, 200),
            img("c.gif", 50, 50),
        ];
        let kept = |filter: &GalleryFilter| -> Vec<&str> {
            images
                .iter()
                .filter(|image| filter.matches(image))
                .map(|image| image.src.as_str())
                .collect()
        };

        assert_eq!(kept(&GalleryFilter::default()).len(), 3);
        assert_eq!(
            kept(&GalleryFilter::default().with_kinds([ImageKind::Jpeg, ImageKind::Png])),
            ["a.jpg", "b.png"]
        );

        let filter = GalleryFilter {
            width: 100..=500,
            ..GalleryFilter::default()
        };
        assert_eq!(kept(&filter), ["b.png"]);
    }

    #[test]
    fn test_cycle_kind_wraps_to_all() {
        let mut filter = GalleryFilter::default();
        let mut labels = Vec::new();
        for _ in 0..5 {
            filter = filter.cycle_kind();
            labels.push(filter.label());
        }
        assert_eq!(labels, ["jpeg", "png", "gif", "other", "all"]);
        assert_eq!(filter, GalleryFilter::default());
    }

    #[test]
    fn test_cycle_kind_keeps_size_bounds() {
        let filter = GalleryFilter::default().with_min_size(100, 50).cycle_kind();
        assert_eq!(filter.label(), "jpeg >= 100x50");
        assert!(filter.matches(&img("a.jpg", 100, 50)));
        assert!(!filter.matches(&img("a.jpg", 99, 50)));
        assert!(!filter.matches(&img("b.png", 800, 600)));
    }

    #[test_case(1000, 500, (250.0, 125.0) ; "landscape")]
    #[test_case(300, 600, (125.0, 250.0) ; "portrait")]
    #[test_case(100, 80, (100.0, 80.0) ; "small stays")]
    #[test_case(0, 80, (0.0, 0.0) ; "degenerate")]
    fn test_fit_within(w: u32, h: u32, expected: (f64, f64)) {
        let (fw, fh) = fit_within(w, h, THUMBNAIL_EDGE);
        assert!((fw - expected.0).abs() < 1e-9);
        assert!((fh - expected.1).abs() < 1e-9);
    }

    #[test]
    fn test_summary_from_elements() {
        let mut loaded = TrackedElement::new(
            ElementId::new(1),
            ContainerId::Viewport,
            "a.jpg".to_string(),
            String::new(),
            String::new(),
        );
        loaded.state = LoadState::Loaded;
        loaded.natural = Some(ImageSize::new(640, 480));

        let idle = TrackedElement::new(
            ElementId::new(2),
            ContainerId::Viewport,
            "b.png".to_string(),
            String::new(),
            String::new(),
        );

        let summary = GallerySummary::collect([&loaded, &idle]);
        assert_eq!(summary.images, vec![img("a.jpg", 640, 480)]);
        assert_eq!(summary.kinds.get(&ImageKind::Jpeg), Some(&1));
        assert_eq!((summary.max_width, summary.max_height), (640, 480));
    }

    #[test]
    fn test_summary_respects_filter() {
        let loaded = |id: u64, src: &str, w: u32, h: u32| {
            let mut element = TrackedElement::new(
                ElementId::new(id),
                ContainerId::Viewport,
                src.to_string(),
                String::new(),
                String::new(),
            );
            element.state = LoadState::Loaded;
            element.natural = Some(ImageSize::new(w, h));
            element
        };
        let elements = [
            loaded(1, "a.jpg", 640, 480),
            loaded(2, "b.png", 64, 64),
            loaded(3, "c.png", 300, 200),
        ];

        let pngs = GalleryFilter::default().with_kinds([ImageKind::Png]);
        let summary = GallerySummary::collect_filtered(&elements, &pngs);
        assert_eq!(summary.images.len(), 2);
        assert_eq!(summary.kinds.get(&ImageKind::Jpeg), None);
        assert_eq!((summary.max_width, summary.max_height), (300, 200));

        let large = pngs.with_min_size(100, 100);
        let summary = GallerySummary::collect_filtered(&elements, &large);
        assert_eq!(summary.images, vec![img("c.png", 300, 200)]);
    }
}
