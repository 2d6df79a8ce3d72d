//! Choose which variant playlist to download.

use std::fmt;

use crate::error::VodError;
use crate::model::{SOURCE_QUALITY, VariantDescriptor};

/// Which rule of the fallback chain produced the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPath {
    /// The requested label was listed
    Exact,
    /// The requested label was missing, the source variant was used instead
    SourceFallback,
    /// Neither was listed; the highest resolution/frame-rate variant won
    BestAvailable,
}

impl fmt::Display for SelectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "requested quality",
            Self::SourceFallback => "source fallback",
            Self::BestAvailable => "best available",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub label: String,
    pub playlist_url: String,
    pub path: SelectionPath,
}

impl Selection {
    /// Label for humans: the source sentinel reads as "source".
    pub fn display_label(&self) -> &str {
        if self.label == SOURCE_QUALITY {
            "source"
        } else {
            &self.label
        }
    }
}

/// Rank of a `<resolution>p[<fps>]` label. Anything else ranks `(0, 0)`.
pub fn quality_rank(label: &str) -> (u32, u32) {
    let Some((resolution, fps)) = label.split_once('p') else {
        return (label.parse().unwrap_or(0), 0);
    };
    let resolution = resolution.parse().unwrap_or(0);
    let fps = if fps.is_empty() {
        0
    } else {
        fps.parse().unwrap_or(0)
    };
    (resolution, fps)
}

fn find<'a>(variants: &'a [VariantDescriptor], label: &str) -> Option<&'a VariantDescriptor> {
    variants.iter().find(|v| v.quality_label == label)
}

/// Pick a variant for `requested`, falling back to the source variant and then to the best
/// ranked one. Deterministic for a given list; ties go to the variant listed first.
pub fn select_variant(
    variants: &[VariantDescriptor],
    requested: &str,
) -> Result<Selection, VodError> {
    let pick = |variant: &VariantDescriptor, path| Selection {
        label: variant.quality_label.clone(),
        playlist_url: variant.playlist_url.clone(),
        path,
    };

    if let Some(variant) = find(variants, requested) {
        return Ok(pick(variant, SelectionPath::Exact));
    }

    if requested != SOURCE_QUALITY
        && let Some(variant) = find(variants, SOURCE_QUALITY)
    {
        return Ok(pick(variant, SelectionPath::SourceFallback));
    }

    // max_by_key keeps the last maximum, so fold manually to keep the first one.
    let best = variants.iter().fold(None, |best: Option<&VariantDescriptor>, v| match best {
        Some(b) if quality_rank(&v.quality_label) <= quality_rank(&b.quality_label) => Some(b),
        _ => Some(v),
    });

    best.map(|variant| pick(variant, SelectionPath::BestAvailable))
        .ok_or(VodError::NoVariants)
}
