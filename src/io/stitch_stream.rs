//! Machine stitch streams shared by the stitch-only formats.
//!
//! Saving lowers a pattern to a flat list of [`Record`]s (integer deltas in
//! pattern units) under the limits of the target format; loading folds the
//! records of a file back into blocks with [`PatternBuilder`].

use crate::error::{EmbroideryError, Result};
use crate::notification::{NotificationCollection, NotificationType};
use crate::palette;
use crate::pattern::{Block, Layer, Pattern, StitchType, Thread};
use crate::types::{Rgb, Vector2};
use std::borrow::Cow;

/// Largest coordinate magnitude a stitch stream can reach, in pattern units
pub const MAX_COORDINATE: f64 = 1.0e9;

/// Command carried by a stitch record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Stitch,
    Jump,
    Trim,
    Stop,
    ColorChange,
    End,
}

/// One machine record: a command plus a relative move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordKind,
    pub dx: i32,
    pub dy: i32,
}

impl Record {
    pub fn new(kind: RecordKind, dx: i32, dy: i32) -> Self {
        Record { kind, dx, dy }
    }

    pub fn stitch(dx: i32, dy: i32) -> Self {
        Self::new(RecordKind::Stitch, dx, dy)
    }

    pub fn jump(dx: i32, dy: i32) -> Self {
        Self::new(RecordKind::Jump, dx, dy)
    }

    /// A command that does not move the frame
    pub fn command(kind: RecordKind) -> Self {
        Self::new(kind, 0, 0)
    }
}

/// What a format can express in its stitch stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLimits {
    /// Largest |dx| or |dy| of one record
    pub max_step: i32,
    /// Trim command available; otherwise trims become a zero-length jump
    pub trim: bool,
    /// Stop command available; otherwise stops become color changes
    pub stop: bool,
}

/// Lowered pattern content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StitchStream {
    /// Records, always terminated by an `End` record
    pub records: Vec<Record>,
    /// Pattern thread index sewn in each color segment
    pub segment_threads: Vec<usize>,
}

impl StitchStream {
    /// Records other than the final `End`
    pub fn body(&self) -> &[Record] {
        match self.records.split_last() {
            Some((last, body)) if last.kind == RecordKind::End => body,
            _ => &self.records,
        }
    }

    /// Number of color change records
    pub fn color_changes(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.kind == RecordKind::ColorChange)
            .count()
    }
}

/// Validate a pattern for a stitch-only format and flatten its geometry.
///
/// Dimensions and layer boundaries cannot be stored and are reported as
/// dropped.
pub fn prepare<'a>(
    pattern: &'a Pattern,
    tolerance: f64,
    format: &'static str,
    notifications: &mut NotificationCollection,
) -> Result<Cow<'a, Pattern>> {
    pattern.validate()?;

    let dimensions: usize = pattern.layers.iter().map(|l| l.dimensions.len()).sum();
    if dimensions > 0 {
        notifications.notify(
            NotificationType::FeatureDropped,
            format,
            format!("{} dimension(s) not stored", dimensions),
        );
    }
    let stitched_layers = pattern.layers.iter().filter(|l| !l.blocks.is_empty()).count();
    if stitched_layers > 1 {
        notifications.notify(
            NotificationType::FeatureDropped,
            format,
            format!("{} layers merged into one stitch sequence", stitched_layers),
        );
    }

    let prepared = if pattern.blocks().any(Block::is_geometry) {
        notifications.notify(
            NotificationType::Degraded,
            format,
            format!("geometry flattened to stitches (tolerance {})", tolerance),
        );
        Cow::Owned(pattern.flattened(tolerance)?)
    } else {
        Cow::Borrowed(pattern)
    };

    if let Some(bounds) = prepared.bounds() {
        let reach = bounds.reach();
        if reach > MAX_COORDINATE {
            return Err(EmbroideryError::UnsupportedFeature(format!(
                "coordinate {} is beyond the {} units a stitch stream can reach",
                reach, MAX_COORDINATE
            )));
        }
    }
    Ok(prepared)
}

struct Lowering<'n> {
    limits: StreamLimits,
    format: &'static str,
    notifications: &'n mut NotificationCollection,
    position: (i64, i64),
    records: Vec<Record>,
    segment_threads: Vec<usize>,
    split_moves: usize,
}

impl Lowering<'_> {
    /// Close the current color segment and open one sewn with `thread`
    fn color_change(&mut self, thread: usize) {
        if !self.segment_threads.is_empty() {
            self.records.push(Record::command(RecordKind::ColorChange));
        }
        self.segment_threads.push(thread);
    }

    fn travel(&mut self, target: Vector2, kind: RecordKind) {
        let tx = target.x.round() as i64;
        let ty = target.y.round() as i64;
        let (sx, sy) = self.position;
        let (dx, dy) = (tx - sx, ty - sy);
        let max = self.limits.max_step.max(1) as i64;
        let steps = ((dx.abs() + max - 1) / max).max((dy.abs() + max - 1) / max).max(1);
        if steps > 1 {
            self.split_moves += 1;
        }
        let (mut px, mut py) = (sx, sy);
        for i in 1..=steps {
            let nx = sx + dx * i / steps;
            let ny = sy + dy * i / steps;
            self.records.push(Record::new(kind, (nx - px) as i32, (ny - py) as i32));
            px = nx;
            py = ny;
        }
        self.position = (tx, ty);
    }

    fn command(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Trim if !self.limits.trim => {
                self.notifications.notify(
                    NotificationType::Degraded,
                    self.format,
                    "trim written as a zero-length jump",
                );
                self.records.push(Record::command(RecordKind::Jump));
            }
            RecordKind::Stop if !self.limits.stop => {
                self.notifications.notify(
                    NotificationType::Degraded,
                    self.format,
                    "stop written as a color change",
                );
                // same thread continues after the stop
                self.records.push(Record::command(RecordKind::ColorChange));
                if let Some(&thread) = self.segment_threads.last() {
                    self.segment_threads.push(thread);
                }
            }
            other => self.records.push(Record::command(other)),
        }
    }
}

/// Lower the stitch blocks of `pattern` to machine records.
///
/// Blocks are visited in layer order. A change of thread index between
/// consecutive blocks emits a color change, and so does an explicit
/// `ColorChange` block even when the thread stays the same. An `End` block
/// ends the stream; stitch content after it is reported as dropped. Moves
/// longer than `limits.max_step` are split into equal parts. Geometry blocks
/// are skipped, so callers run [`prepare`] first.
pub fn lower(
    pattern: &Pattern,
    limits: StreamLimits,
    format: &'static str,
    notifications: &mut NotificationCollection,
) -> StitchStream {
    let mut lowering = Lowering {
        limits,
        format,
        notifications,
        position: (0, 0),
        records: Vec::new(),
        segment_threads: Vec::new(),
        split_moves: 0,
    };

    let mut runs = pattern.blocks().filter_map(|block| Some((block.thread_index, block.as_stitches()?)));
    for (thread, run) in runs.by_ref() {
        if run.stitch_type == StitchType::ColorChange || lowering.segment_threads.last() != Some(&thread) {
            lowering.color_change(thread);
        }
        let kind = match run.stitch_type {
            StitchType::Normal => RecordKind::Stitch,
            StitchType::Trim => {
                lowering.command(RecordKind::Trim);
                RecordKind::Jump
            }
            StitchType::Stop => {
                lowering.command(RecordKind::Stop);
                RecordKind::Jump
            }
            StitchType::Jump | StitchType::ColorChange | StitchType::End => RecordKind::Jump,
        };
        for &point in &run.points {
            lowering.travel(point, kind);
        }
        if run.stitch_type == StitchType::End {
            break;
        }
    }
    let after_end = runs.filter(|(_, run)| !run.points.is_empty()).count();
    if after_end > 0 {
        lowering.notifications.notify(
            NotificationType::FeatureDropped,
            format,
            format!("{} stitch block(s) after the end command not stored", after_end),
        );
    }

    if lowering.split_moves > 0 {
        let count = lowering.split_moves;
        lowering.notifications.notify(
            NotificationType::Degraded,
            format,
            format!("{} move(s) longer than {} split", count, limits.max_step),
        );
    }
    lowering.records.push(Record::command(RecordKind::End));
    tracing::trace!(format, records = lowering.records.len(), "lowered stitch stream");
    StitchStream {
        records: lowering.records,
        segment_threads: lowering.segment_threads,
    }
}

/// Thread `index` of the generic catalog, cycling through it
pub fn default_thread(index: usize) -> Thread {
    let catalog = palette::generic();
    catalog
        .entry(index % catalog.len().max(1))
        .map(|entry| Thread::from_catalog(catalog, entry))
        .unwrap_or_else(|| Thread::new(Rgb::BLACK))
}

/// Folds machine records back into pattern blocks
#[derive(Debug, Default)]
pub struct PatternBuilder {
    blocks: Vec<Block>,
    current: Option<(StitchType, Vec<Vector2>)>,
    position: (i64, i64),
    thread: usize,
    ended: bool,
}

impl PatternBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute position after the records pushed so far
    pub fn position(&self) -> Vector2 {
        Vector2::new(self.position.0 as f64, self.position.1 as f64)
    }

    /// An `End` record was seen; later records are ignored
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Number of color segments that contain blocks
    pub fn segment_count(&self) -> usize {
        let last = self.current.as_ref().map(|_| self.thread);
        self.blocks
            .iter()
            .map(|b| b.thread_index)
            .chain(last)
            .max()
            .map_or(0, |m| m + 1)
    }

    pub fn push(&mut self, record: Record) {
        if self.ended {
            return;
        }
        self.position.0 += record.dx as i64;
        self.position.1 += record.dy as i64;
        let moved = record.dx != 0 || record.dy != 0;
        match record.kind {
            RecordKind::Stitch => self.extend(StitchType::Normal),
            RecordKind::Jump => self.extend(StitchType::Jump),
            RecordKind::Trim | RecordKind::Stop => {
                self.flush();
                let stitch_type = if record.kind == RecordKind::Trim {
                    StitchType::Trim
                } else {
                    StitchType::Stop
                };
                let points = if moved { vec![self.position()] } else { Vec::new() };
                self.blocks.push(Block::stitches(self.thread, stitch_type, points));
            }
            RecordKind::ColorChange => {
                self.flush();
                self.thread += 1;
            }
            RecordKind::End => {
                self.flush();
                self.ended = true;
            }
        }
    }

    fn extend(&mut self, stitch_type: StitchType) {
        let point = self.position();
        match &mut self.current {
            Some((t, points)) if *t == stitch_type => points.push(point),
            _ => {
                self.flush();
                self.current = Some((stitch_type, vec![point]));
            }
        }
    }

    fn flush(&mut self) {
        if let Some((stitch_type, points)) = self.current.take() {
            self.blocks.push(Block::stitches(self.thread, stitch_type, points));
        }
    }

    /// Build the pattern; missing threads are filled from the generic catalog.
    ///
    /// The blocks go to a single layer "0", created only when there is
    /// content.
    pub fn finish(
        mut self,
        mut threads: Vec<Thread>,
        format: &'static str,
        notifications: &mut NotificationCollection,
    ) -> Pattern {
        self.flush();
        let needed = self.segment_count();
        if threads.len() < needed {
            if !threads.is_empty() {
                notifications.notify(
                    NotificationType::Warning,
                    format,
                    format!(
                        "{} color segment(s) but {} thread(s) listed; using generic colors",
                        needed,
                        threads.len()
                    ),
                );
            }
            while threads.len() < needed {
                threads.push(default_thread(threads.len()));
            }
        }

        let mut pattern = Pattern::new();
        pattern.threads = threads;
        if !self.blocks.is_empty() {
            let mut layer = Layer::layer_0();
            layer.blocks = self.blocks;
            pattern.layers.push(layer);
        }
        pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Line;

    const LIMITS: StreamLimits = StreamLimits {
        max_step: 121,
        trim: false,
        stop: false,
    };

    fn two_color_pattern() -> Pattern {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(default_thread(0));
        p.add_thread(default_thread(1));
        p.add_stitch_with_thread(layer, 0, Vector2::new(10.0, 0.0), StitchType::Normal).unwrap();
        p.add_stitch_with_thread(layer, 0, Vector2::new(20.0, 5.0), StitchType::Normal).unwrap();
        p.add_stitch_with_thread(layer, 1, Vector2::new(40.0, 5.0), StitchType::Jump).unwrap();
        p.add_stitch_with_thread(layer, 1, Vector2::new(40.0, -5.0), StitchType::Normal).unwrap();
        p
    }

    #[test]
    fn test_lower_emits_color_change() {
        let mut notes = NotificationCollection::new();
        let stream = lower(&two_color_pattern(), LIMITS, "test", &mut notes);
        assert_eq!(
            stream.records,
            vec![
                Record::stitch(10, 0),
                Record::stitch(10, 5),
                Record::command(RecordKind::ColorChange),
                Record::jump(20, 0),
                Record::stitch(0, -10),
                Record::command(RecordKind::End),
            ]
        );
        assert_eq!(stream.segment_threads, vec![0, 1]);
        assert_eq!(stream.color_changes(), 1);
        assert_eq!(stream.body().len(), 5);
        assert!(notes.is_empty());
    }

    fn stitched(points: &[(f64, f64)]) -> Vec<Vector2> {
        points.iter().map(|&(x, y)| Vector2::new(x, y)).collect()
    }

    #[test]
    fn test_explicit_color_change_and_end() {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(default_thread(0));
        p.add_block(layer, Block::stitches(0, StitchType::Normal, stitched(&[(10.0, 0.0), (20.0, 0.0)])))
            .unwrap();
        p.add_block(layer, Block::stitches(0, StitchType::ColorChange, Vec::new())).unwrap();
        p.add_block(layer, Block::stitches(0, StitchType::End, Vec::new())).unwrap();
        p.add_block(layer, Block::stitches(0, StitchType::Normal, stitched(&[(30.0, 30.0)])))
            .unwrap();

        let mut notes = NotificationCollection::new();
        let stream = lower(&p, LIMITS, "test", &mut notes);
        assert_eq!(
            stream.records,
            vec![
                Record::stitch(10, 0),
                Record::stitch(10, 0),
                Record::command(RecordKind::ColorChange),
                Record::command(RecordKind::End),
            ]
        );
        assert_eq!(stream.segment_threads, vec![0, 0]);
        assert_eq!(notes.of_type(NotificationType::FeatureDropped).len(), 1);
    }

    #[test]
    fn test_color_change_block_with_new_thread_emits_one_change() {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(default_thread(0));
        p.add_thread(default_thread(1));
        p.add_block(layer, Block::stitches(0, StitchType::Normal, stitched(&[(5.0, 5.0)]))).unwrap();
        p.add_block(layer, Block::stitches(1, StitchType::ColorChange, stitched(&[(8.0, 5.0)])))
            .unwrap();
        p.add_block(layer, Block::stitches(1, StitchType::Normal, stitched(&[(9.0, 9.0)]))).unwrap();

        let mut notes = NotificationCollection::new();
        let stream = lower(&p, LIMITS, "test", &mut notes);
        assert_eq!(stream.color_changes(), 1);
        assert_eq!(stream.segment_threads, vec![0, 1]);
        assert_eq!(stream.records[2], Record::jump(3, 0));
        assert!(notes.is_empty());
    }

    #[test]
    fn test_end_without_trailing_content_is_silent() {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(default_thread(0));
        p.add_block(layer, Block::stitches(0, StitchType::Normal, stitched(&[(1.0, 1.0)]))).unwrap();
        p.add_block(layer, Block::stitches(0, StitchType::End, Vec::new())).unwrap();
        let mut notes = NotificationCollection::new();
        let stream = lower(&p, LIMITS, "test", &mut notes);
        assert_eq!(stream.records.len(), 2);
        assert_eq!(stream.records[1].kind, RecordKind::End);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_long_moves_split() {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(default_thread(0));
        p.add_stitch(layer, Vector2::new(300.0, -50.0), StitchType::Normal).unwrap();
        let mut notes = NotificationCollection::new();
        let stream = lower(&p, LIMITS, "test", &mut notes);
        let body = stream.body();
        assert_eq!(body.len(), 3);
        assert!(body.iter().all(|r| r.dx.abs() <= 121 && r.dy.abs() <= 121));
        assert_eq!(body.iter().map(|r| r.dx).sum::<i32>(), 300);
        assert_eq!(body.iter().map(|r| r.dy).sum::<i32>(), -50);
        assert!(notes.has_type(NotificationType::Degraded));
    }

    #[test]
    fn test_stop_degraded_to_color_change() {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(default_thread(0));
        p.add_block(layer, Block::stitches(0, StitchType::Stop, Vec::new())).unwrap();
        let mut notes = NotificationCollection::new();
        let stream = lower(&p, LIMITS, "test", &mut notes);
        assert_eq!(stream.records[0].kind, RecordKind::ColorChange);
        assert_eq!(notes.of_type(NotificationType::Degraded).len(), 1);
    }

    #[test]
    fn test_builder_round_trip() {
        let original = two_color_pattern();
        let mut notes = NotificationCollection::new();
        let stream = lower(&original, LIMITS, "test", &mut notes);
        let mut builder = PatternBuilder::new();
        for record in &stream.records {
            builder.push(*record);
        }
        assert!(builder.is_ended());
        assert_eq!(builder.segment_count(), 2);
        let loaded = builder.finish(original.threads.clone(), "test", &mut notes);
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_empty_builder_has_no_layers() {
        let mut notes = NotificationCollection::new();
        let mut builder = PatternBuilder::new();
        builder.push(Record::command(RecordKind::End));
        let pattern = builder.finish(Vec::new(), "test", &mut notes);
        assert!(pattern.layers.is_empty());
        assert!(pattern.threads.is_empty());
    }

    #[test]
    fn test_prepare_flattens_geometry() {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(default_thread(0));
        p.add_geometry(layer, 0, Line::from_coords(0.0, 0.0, 50.0, 0.0)).unwrap();
        let mut notes = NotificationCollection::new();
        let prepared = prepare(&p, 1.0, "test", &mut notes).unwrap();
        assert!(matches!(prepared, Cow::Owned(_)));
        assert!(!prepared.blocks().any(Block::is_geometry));
        assert_eq!(prepared.stitch_count(), 2);
    }

    #[test]
    fn test_missing_threads_filled() {
        let mut notes = NotificationCollection::new();
        let mut builder = PatternBuilder::new();
        builder.push(Record::stitch(1, 1));
        builder.push(Record::command(RecordKind::ColorChange));
        builder.push(Record::stitch(1, 1));
        let pattern = builder.finish(vec![default_thread(0)], "test", &mut notes);
        assert_eq!(pattern.threads.len(), 2);
        assert!(notes.has_type(NotificationType::Warning));
        assert!(pattern.validate().is_ok());
    }

    #[test]
    fn test_unreachable_coordinates_rejected() {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(default_thread(0));
        p.add_stitch(layer, Vector2::new(1.0e12, 0.0), StitchType::Normal).unwrap();
        let mut notes = NotificationCollection::new();
        assert!(matches!(
            prepare(&p, 1.0, "test", &mut notes),
            Err(EmbroideryError::UnsupportedFeature(_))
        ));
    }
}
