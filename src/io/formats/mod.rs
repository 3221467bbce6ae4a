//! Format adapters.
//!
//! | id | format | payload |
//! |---|---|---|
//! | `ecf` | embroidery compound file | compound container, Huffman stitch streams |
//! | `ofm` | Melco OFM (read only) | compound container, object stream |
//! | `hus` | Husqvarna Viking | LZH attribute/x/y streams |
//! | `jef` | Janome | fixed header, 2-byte records |
//! | `dst` | Tajima | 512-byte text header, ternary 3-byte records |
//! | `exp` | Melco | headerless 2-byte records |

pub mod dst;
pub mod ecf;
pub mod exp;
pub mod hus;
pub mod jef;
pub mod ofm;

pub use dst::DstFormat;
pub use ecf::EcfFormat;
pub use exp::ExpFormat;
pub use hus::HusFormat;
pub use jef::JefFormat;
pub use ofm::OfmFormat;

use super::stitch_stream::default_thread;
use crate::error::{EmbroideryError, Result};
use crate::notification::{NotificationCollection, NotificationType};
use crate::palette::{nearest_index, Catalog};
use crate::pattern::{Pattern, Thread};

/// Index of `thread` in a format's palette.
///
/// A thread from the same brand with a known code maps to that entry; any
/// other color maps to the nearest entry, reported as degraded, or rejected
/// when `strict` is set.
pub(crate) fn palette_index(
    catalog: &Catalog,
    thread: &Thread,
    strict: bool,
    format: &'static str,
    notifications: &mut NotificationCollection,
) -> Result<usize> {
    let same_brand = thread
        .brand
        .as_deref()
        .is_some_and(|b| b.eq_ignore_ascii_case(catalog.brand()));
    if same_brand {
        if let Some(index) = thread.catalog_code.as_deref().and_then(|c| catalog.index_of(c)) {
            return Ok(index);
        }
    }
    if let Some(index) = catalog.exact(thread.color) {
        return Ok(index);
    }

    let index = nearest_index(catalog, thread.color);
    let Some(entry) = catalog.entry(index) else {
        return Err(EmbroideryError::UnsupportedFeature(format!(
            "{} palette is empty",
            catalog.brand()
        )));
    };
    if strict {
        return Err(EmbroideryError::UnsupportedFeature(format!(
            "thread {} is not in the {} palette",
            thread,
            catalog.brand()
        )));
    }
    notifications.notify(
        NotificationType::Degraded,
        format,
        format!(
            "thread {} written as {} {} {}",
            thread,
            catalog.brand(),
            entry.code,
            entry.name
        ),
    );
    Ok(index)
}

/// Thread for palette `index`, or a generic thread with a warning when the
/// index is outside the palette
pub(crate) fn palette_thread(
    catalog: &Catalog,
    index: usize,
    position: usize,
    format: &'static str,
    notifications: &mut NotificationCollection,
) -> Thread {
    match catalog.entry(index) {
        Some(entry) => Thread::from_catalog(catalog, entry),
        None => {
            notifications.notify(
                NotificationType::Warning,
                format,
                format!("color {} uses unknown {} index {}", position, catalog.brand(), index),
            );
            default_thread(position)
        }
    }
}

/// Report thread information a count-only format cannot keep
pub(crate) fn note_unstored_threads(
    pattern: &Pattern,
    segment_threads: &[usize],
    format: &'static str,
    notifications: &mut NotificationCollection,
) {
    let lost = segment_threads
        .iter()
        .enumerate()
        .any(|(segment, &thread)| pattern.threads.get(thread) != Some(&default_thread(segment)));
    if lost {
        notifications.notify(
            NotificationType::FeatureDropped,
            format,
            "thread colors not stored; generic colors are used on load",
        );
    }
}

/// Report pattern fields a stitch-only format has no place for
pub(crate) fn note_unstored_header(
    pattern: &Pattern,
    keep_name: bool,
    keep_hoop: bool,
    format: &'static str,
    notifications: &mut NotificationCollection,
) {
    if !keep_name && !pattern.name.is_empty() {
        notifications.notify(NotificationType::FeatureDropped, format, "pattern name not stored");
    }
    if !keep_hoop && pattern.hoop.is_some() {
        notifications.notify(NotificationType::FeatureDropped, format, "hoop size not stored");
    }
}
