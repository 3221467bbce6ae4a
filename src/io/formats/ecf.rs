//! Embroidery compound file, the lossless native format.
//!
//! A compound container holding:
//!
//! - `Header`: magic, version, pattern name, units, hoop, metadata, layer count
//! - `Threads`: color, catalog code, brand and description of every thread
//! - `LayerNNNN/Blocks`: layer name and flags, then each block's thread,
//!   kind, stitch type and point count, or its geometry items
//! - `LayerNNNN/Stitches`: the stitch points of the layer as little-endian
//!   f64 pairs, compressed as one Huffman block
//! - `LayerNNNN/Dimensions`: the layer's dimension annotations

use crate::error::{EmbroideryError, Result};
use crate::geometry::{
    Arc, Bezier, Circle, Dimension, DimensionKind, Ellipse, Geometry, InfiniteLine, Line, Path, PathSegment, Point,
    Ray, Rect, Spline,
};
use crate::io::compound::{sector::SIGNATURE, CompoundFile};
use crate::io::huffman::{compress_block, decompress_block};
use crate::io::{FormatAdapter, FormatFeatures, IoConfiguration};
use crate::notification::NotificationCollection;
use crate::pattern::{Block, BlockKind, Hoop, Layer, LayerFlags, Pattern, StitchRun, StitchType, Thread, Units};
use crate::types::{Rgb, Vector2};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

const FORMAT: &str = "ecf";

pub const MAGIC: [u8; 4] = *b"ECF\x01";
pub const VERSION: u16 = 1;

pub const HEADER_STREAM: &str = "Header";
pub const THREADS_STREAM: &str = "Threads";
pub const BLOCKS_STREAM: &str = "Blocks";
pub const STITCHES_STREAM: &str = "Stitches";
pub const DIMENSIONS_STREAM: &str = "Dimensions";

/// Storage name of layer `index`
pub fn layer_storage(index: usize) -> String {
    format!("Layer{:04}", index)
}

// ---------------------------------------------------------------------------
// Field encoding
// ---------------------------------------------------------------------------

fn put_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    out.write_u32::<LittleEndian>(s.len() as u32)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn put_opt_str(out: &mut Vec<u8>, s: Option<&str>) -> Result<()> {
    match s {
        Some(s) => {
            out.write_u8(1)?;
            put_str(out, s)
        }
        None => Ok(out.write_u8(0)?),
    }
}

fn put_vec(out: &mut Vec<u8>, v: Vector2) -> Result<()> {
    out.write_f64::<LittleEndian>(v.x)?;
    out.write_f64::<LittleEndian>(v.y)?;
    Ok(())
}

fn put_points(out: &mut Vec<u8>, points: &[Vector2]) -> Result<()> {
    out.write_u32::<LittleEndian>(points.len() as u32)?;
    for &p in points {
        put_vec(out, p)?;
    }
    Ok(())
}

fn get_str(r: &mut Cursor<&[u8]>) -> Result<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let remaining = r.get_ref().len() - r.position() as usize;
    if len > remaining {
        return Err(EmbroideryError::truncated(format!(
            "string of {} bytes with {} remaining",
            len, remaining
        )));
    }
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| EmbroideryError::corrupt(format!("string is not UTF-8: {}", e)))
}

fn get_opt_str(r: &mut Cursor<&[u8]>) -> Result<Option<String>> {
    match r.read_u8()? {
        0 => Ok(None),
        1 => get_str(r).map(Some),
        other => Err(EmbroideryError::corrupt(format!("optional string flag {}", other))),
    }
}

fn get_vec(r: &mut Cursor<&[u8]>) -> Result<Vector2> {
    let x = r.read_f64::<LittleEndian>()?;
    let y = r.read_f64::<LittleEndian>()?;
    Ok(Vector2::new(x, y))
}

fn get_points(r: &mut Cursor<&[u8]>) -> Result<Vec<Vector2>> {
    let count = r.read_u32::<LittleEndian>()?;
    (0..count).map(|_| get_vec(r)).collect()
}

fn get_bool(r: &mut Cursor<&[u8]>) -> Result<bool> {
    Ok(r.read_u8()? != 0)
}

fn stitch_type_code(t: StitchType) -> u8 {
    match t {
        StitchType::Normal => 0,
        StitchType::Jump => 1,
        StitchType::Trim => 2,
        StitchType::Stop => 3,
        StitchType::ColorChange => 4,
        StitchType::End => 5,
    }
}

fn stitch_type_from(code: u8) -> Result<StitchType> {
    Ok(match code {
        0 => StitchType::Normal,
        1 => StitchType::Jump,
        2 => StitchType::Trim,
        3 => StitchType::Stop,
        4 => StitchType::ColorChange,
        5 => StitchType::End,
        other => return Err(EmbroideryError::corrupt(format!("stitch type {}", other))),
    })
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

fn put_geometry(out: &mut Vec<u8>, g: &Geometry) -> Result<()> {
    match g {
        Geometry::Point(p) => {
            out.write_u8(0)?;
            put_vec(out, p.location)?;
        }
        Geometry::Line(l) => {
            out.write_u8(1)?;
            put_vec(out, l.start)?;
            put_vec(out, l.end)?;
        }
        Geometry::Arc(a) => {
            out.write_u8(2)?;
            put_vec(out, a.center)?;
            for v in [a.radius, a.start_angle, a.end_angle] {
                out.write_f64::<LittleEndian>(v)?;
            }
        }
        Geometry::Circle(c) => {
            out.write_u8(3)?;
            put_vec(out, c.center)?;
            out.write_f64::<LittleEndian>(c.radius)?;
        }
        Geometry::Ellipse(e) => {
            out.write_u8(4)?;
            put_vec(out, e.center)?;
            put_vec(out, e.major_axis)?;
            for v in [e.minor_axis_ratio, e.start_parameter, e.end_parameter] {
                out.write_f64::<LittleEndian>(v)?;
            }
        }
        Geometry::Bezier(b) => {
            out.write_u8(5)?;
            put_points(out, &b.control_points)?;
        }
        Geometry::Spline(s) => {
            out.write_u8(6)?;
            out.write_u32::<LittleEndian>(s.degree as u32)?;
            put_points(out, &s.control_points)?;
        }
        Geometry::Path(p) => {
            out.write_u8(7)?;
            out.write_u32::<LittleEndian>(p.segments.len() as u32)?;
            for segment in &p.segments {
                match *segment {
                    PathSegment::MoveTo(p) => {
                        out.write_u8(0)?;
                        put_vec(out, p)?;
                    }
                    PathSegment::LineTo(p) => {
                        out.write_u8(1)?;
                        put_vec(out, p)?;
                    }
                    PathSegment::QuadTo(c, p) => {
                        out.write_u8(2)?;
                        put_vec(out, c)?;
                        put_vec(out, p)?;
                    }
                    PathSegment::CubicTo(c1, c2, p) => {
                        out.write_u8(3)?;
                        put_vec(out, c1)?;
                        put_vec(out, c2)?;
                        put_vec(out, p)?;
                    }
                    PathSegment::Close => out.write_u8(4)?,
                }
            }
        }
        Geometry::Ray(r) => {
            out.write_u8(8)?;
            put_vec(out, r.base_point)?;
            put_vec(out, r.direction)?;
        }
        Geometry::InfiniteLine(l) => {
            out.write_u8(9)?;
            put_vec(out, l.base_point)?;
            put_vec(out, l.direction)?;
        }
        Geometry::Rect(r) => {
            out.write_u8(10)?;
            put_vec(out, r.origin)?;
            for v in [r.width, r.height, r.rotation] {
                out.write_f64::<LittleEndian>(v)?;
            }
        }
    }
    Ok(())
}

fn get_geometry(r: &mut Cursor<&[u8]>) -> Result<Geometry> {
    let f = |r: &mut Cursor<&[u8]>| r.read_f64::<LittleEndian>();
    Ok(match r.read_u8()? {
        0 => Point::new(get_vec(r)?).into(),
        1 => Line::new(get_vec(r)?, get_vec(r)?).into(),
        2 => Arc::new(get_vec(r)?, f(r)?, f(r)?, f(r)?).into(),
        3 => Circle::new(get_vec(r)?, f(r)?).into(),
        4 => Ellipse {
            center: get_vec(r)?,
            major_axis: get_vec(r)?,
            minor_axis_ratio: f(r)?,
            start_parameter: f(r)?,
            end_parameter: f(r)?,
        }
        .into(),
        5 => Bezier::new(get_points(r)?).into(),
        6 => {
            let degree = r.read_u32::<LittleEndian>()? as usize;
            Spline {
                degree,
                control_points: get_points(r)?,
            }
            .into()
        }
        7 => {
            let count = r.read_u32::<LittleEndian>()?;
            let mut path = Path::new();
            for _ in 0..count {
                let segment = match r.read_u8()? {
                    0 => PathSegment::MoveTo(get_vec(r)?),
                    1 => PathSegment::LineTo(get_vec(r)?),
                    2 => PathSegment::QuadTo(get_vec(r)?, get_vec(r)?),
                    3 => PathSegment::CubicTo(get_vec(r)?, get_vec(r)?, get_vec(r)?),
                    4 => PathSegment::Close,
                    other => return Err(EmbroideryError::corrupt(format!("path segment {}", other))),
                };
                path.segments.push(segment);
            }
            path.into()
        }
        8 => Ray {
            base_point: get_vec(r)?,
            direction: get_vec(r)?,
        }
        .into(),
        9 => InfiniteLine {
            base_point: get_vec(r)?,
            direction: get_vec(r)?,
        }
        .into(),
        10 => Rect {
            origin: get_vec(r)?,
            width: f(r)?,
            height: f(r)?,
            rotation: f(r)?,
        }
        .into(),
        other => return Err(EmbroideryError::corrupt(format!("geometry tag {}", other))),
    })
}

fn put_dimension(out: &mut Vec<u8>, d: &Dimension) -> Result<()> {
    put_str(out, &d.text)?;
    put_vec(out, d.text_position)?;
    match &d.kind {
        DimensionKind::Aligned {
            first,
            second,
            line_point,
        } => {
            out.write_u8(0)?;
            for p in [first, second, line_point] {
                put_vec(out, *p)?;
            }
        }
        DimensionKind::Angular {
            vertex,
            first,
            second,
            arc_point,
        } => {
            out.write_u8(1)?;
            for p in [vertex, first, second, arc_point] {
                put_vec(out, *p)?;
            }
        }
        DimensionKind::ArcLength {
            center,
            first,
            second,
            arc_point,
        } => {
            out.write_u8(2)?;
            for p in [center, first, second, arc_point] {
                put_vec(out, *p)?;
            }
        }
        DimensionKind::Diameter {
            center,
            chord_point,
            leader_length,
        } => {
            out.write_u8(3)?;
            put_vec(out, *center)?;
            put_vec(out, *chord_point)?;
            out.write_f64::<LittleEndian>(*leader_length)?;
        }
        DimensionKind::Leader { points, arrow } => {
            out.write_u8(4)?;
            put_points(out, points)?;
            out.write_u8(*arrow as u8)?;
        }
        DimensionKind::Linear {
            first,
            second,
            line_point,
            rotation,
        } => {
            out.write_u8(5)?;
            for p in [first, second, line_point] {
                put_vec(out, *p)?;
            }
            out.write_f64::<LittleEndian>(*rotation)?;
        }
        DimensionKind::Ordinate {
            feature_point,
            leader_end,
            x_type,
        } => {
            out.write_u8(6)?;
            put_vec(out, *feature_point)?;
            put_vec(out, *leader_end)?;
            out.write_u8(*x_type as u8)?;
        }
        DimensionKind::Radius {
            center,
            chord_point,
            leader_length,
        } => {
            out.write_u8(7)?;
            put_vec(out, *center)?;
            put_vec(out, *chord_point)?;
            out.write_f64::<LittleEndian>(*leader_length)?;
        }
    }
    Ok(())
}

fn get_dimension(r: &mut Cursor<&[u8]>) -> Result<Dimension> {
    let text = get_str(r)?;
    let text_position = get_vec(r)?;
    let kind = match r.read_u8()? {
        0 => DimensionKind::Aligned {
            first: get_vec(r)?,
            second: get_vec(r)?,
            line_point: get_vec(r)?,
        },
        1 => DimensionKind::Angular {
            vertex: get_vec(r)?,
            first: get_vec(r)?,
            second: get_vec(r)?,
            arc_point: get_vec(r)?,
        },
        2 => DimensionKind::ArcLength {
            center: get_vec(r)?,
            first: get_vec(r)?,
            second: get_vec(r)?,
            arc_point: get_vec(r)?,
        },
        3 => DimensionKind::Diameter {
            center: get_vec(r)?,
            chord_point: get_vec(r)?,
            leader_length: r.read_f64::<LittleEndian>()?,
        },
        4 => DimensionKind::Leader {
            points: get_points(r)?,
            arrow: get_bool(r)?,
        },
        5 => DimensionKind::Linear {
            first: get_vec(r)?,
            second: get_vec(r)?,
            line_point: get_vec(r)?,
            rotation: r.read_f64::<LittleEndian>()?,
        },
        6 => DimensionKind::Ordinate {
            feature_point: get_vec(r)?,
            leader_end: get_vec(r)?,
            x_type: get_bool(r)?,
        },
        7 => DimensionKind::Radius {
            center: get_vec(r)?,
            chord_point: get_vec(r)?,
            leader_length: r.read_f64::<LittleEndian>()?,
        },
        other => return Err(EmbroideryError::corrupt(format!("dimension tag {}", other))),
    };
    Ok(Dimension {
        text,
        text_position,
        kind,
    })
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

fn header_bytes(pattern: &Pattern) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.write_u16::<LittleEndian>(VERSION)?;
    put_str(&mut out, &pattern.name)?;
    out.write_u8(match pattern.units {
        Units::Millimeters => 0,
        Units::Inches => 1,
    })?;
    match pattern.hoop {
        Some(hoop) => {
            out.write_u8(1)?;
            out.write_f64::<LittleEndian>(hoop.width)?;
            out.write_f64::<LittleEndian>(hoop.height)?;
        }
        None => out.write_u8(0)?,
    }
    out.write_u32::<LittleEndian>(pattern.metadata.len() as u32)?;
    for (key, value) in &pattern.metadata {
        put_str(&mut out, key)?;
        put_str(&mut out, value)?;
    }
    out.write_u32::<LittleEndian>(pattern.layers.len() as u32)?;
    Ok(out)
}

/// Pattern with header fields filled in, and the declared layer count
fn read_header(bytes: &[u8]) -> Result<(Pattern, usize)> {
    let mut r = Cursor::new(bytes);
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(EmbroideryError::UnrecognizedFormat("ECF header magic".into()));
    }
    let version = r.read_u16::<LittleEndian>()?;
    if version != VERSION {
        return Err(EmbroideryError::UnsupportedFeature(format!("ECF version {}", version)));
    }
    let mut pattern = Pattern::new();
    pattern.name = get_str(&mut r)?;
    pattern.units = match r.read_u8()? {
        0 => Units::Millimeters,
        1 => Units::Inches,
        other => return Err(EmbroideryError::corrupt(format!("units code {}", other))),
    };
    if get_bool(&mut r)? {
        let width = r.read_f64::<LittleEndian>()?;
        let height = r.read_f64::<LittleEndian>()?;
        pattern.hoop = Some(Hoop::new(width, height));
    }
    let entries = r.read_u32::<LittleEndian>()?;
    for _ in 0..entries {
        let key = get_str(&mut r)?;
        let value = get_str(&mut r)?;
        pattern.metadata.insert(key, value);
    }
    let layers = r.read_u32::<LittleEndian>()? as usize;
    Ok((pattern, layers))
}

fn threads_bytes(threads: &[Thread]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(threads.len() as u32)?;
    for thread in threads {
        out.write_u32::<LittleEndian>(thread.color.to_u32())?;
        put_opt_str(&mut out, thread.catalog_code.as_deref())?;
        put_opt_str(&mut out, thread.brand.as_deref())?;
        put_opt_str(&mut out, thread.description.as_deref())?;
    }
    Ok(out)
}

fn read_threads(bytes: &[u8]) -> Result<Vec<Thread>> {
    let mut r = Cursor::new(bytes);
    let count = r.read_u32::<LittleEndian>()?;
    let mut threads = Vec::new();
    for _ in 0..count {
        let color = Rgb::from_u32(r.read_u32::<LittleEndian>()?);
        threads.push(Thread {
            color,
            catalog_code: get_opt_str(&mut r)?,
            brand: get_opt_str(&mut r)?,
            description: get_opt_str(&mut r)?,
        });
    }
    Ok(threads)
}

/// `Blocks` and `Stitches` stream contents of a layer
fn layer_bytes(layer: &Layer) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut blocks = Vec::new();
    let mut points = Vec::new();
    put_str(&mut blocks, &layer.name)?;
    blocks.write_u8(layer.flags.bits())?;
    blocks.write_u32::<LittleEndian>(layer.blocks.len() as u32)?;
    for block in &layer.blocks {
        blocks.write_u32::<LittleEndian>(block.thread_index as u32)?;
        match &block.kind {
            BlockKind::Stitches(run) => {
                blocks.write_u8(0)?;
                blocks.write_u8(stitch_type_code(run.stitch_type))?;
                blocks.write_u32::<LittleEndian>(run.points.len() as u32)?;
                for &p in &run.points {
                    put_vec(&mut points, p)?;
                }
            }
            BlockKind::Geometry(items) => {
                blocks.write_u8(1)?;
                blocks.write_u32::<LittleEndian>(items.len() as u32)?;
                for item in items {
                    put_geometry(&mut blocks, item)?;
                }
            }
        }
    }
    let symbols: Vec<u16> = points.iter().map(|&b| b as u16).collect();
    Ok((blocks, compress_block(&symbols, None)?))
}

fn read_layer(blocks_bytes: &[u8], stitches_bytes: &[u8], dimensions_bytes: &[u8]) -> Result<Layer> {
    let (symbols, _) = decompress_block(stitches_bytes, None)?;
    let points = symbols
        .iter()
        .map(|&s| u8::try_from(s).map_err(|_| EmbroideryError::corrupt(format!("stitch byte symbol {}", s))))
        .collect::<Result<Vec<u8>>>()?;
    let mut point_reader = Cursor::new(points.as_slice());

    let mut r = Cursor::new(blocks_bytes);
    let mut layer = Layer::new(get_str(&mut r)?);
    layer.flags = LayerFlags::from_bits_truncate(r.read_u8()?);
    let count = r.read_u32::<LittleEndian>()?;
    for _ in 0..count {
        let thread_index = r.read_u32::<LittleEndian>()? as usize;
        let kind = match r.read_u8()? {
            0 => {
                let stitch_type = stitch_type_from(r.read_u8()?)?;
                let n = r.read_u32::<LittleEndian>()?;
                let points = (0..n).map(|_| get_vec(&mut point_reader)).collect::<Result<Vec<_>>>()?;
                BlockKind::Stitches(StitchRun::new(stitch_type, points))
            }
            1 => {
                let n = r.read_u32::<LittleEndian>()?;
                BlockKind::Geometry((0..n).map(|_| get_geometry(&mut r)).collect::<Result<Vec<_>>>()?)
            }
            other => return Err(EmbroideryError::corrupt(format!("block kind {}", other))),
        };
        layer.blocks.push(Block { thread_index, kind });
    }
    if (point_reader.position() as usize) != points.len() {
        return Err(EmbroideryError::corrupt(format!(
            "stitch stream has {} bytes, blocks use {}",
            points.len(),
            point_reader.position()
        )));
    }

    let mut r = Cursor::new(dimensions_bytes);
    let count = r.read_u32::<LittleEndian>()?;
    for _ in 0..count {
        layer.dimensions.push(get_dimension(&mut r)?);
    }
    Ok(layer)
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Embroidery compound file adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct EcfFormat;

impl FormatAdapter for EcfFormat {
    fn id(&self) -> &'static str {
        FORMAT
    }

    fn description(&self) -> &'static str {
        "Embroidery compound file"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ecf"]
    }

    fn features(&self) -> FormatFeatures {
        FormatFeatures::all()
    }

    fn detect(&self, bytes: &[u8]) -> u8 {
        if !bytes.starts_with(&SIGNATURE) {
            return 0;
        }
        match CompoundFile::open(bytes) {
            Ok(file) if file.read_stream(HEADER_STREAM).is_ok_and(|h| h.starts_with(&MAGIC)) => 100,
            _ => 0,
        }
    }

    fn load(&self, bytes: &[u8], _notifications: &mut NotificationCollection) -> Result<Pattern> {
        let file = CompoundFile::open(bytes)?;
        let (mut pattern, layer_count) = read_header(file.read_stream(HEADER_STREAM)?)?;
        pattern.threads = read_threads(file.read_stream(THREADS_STREAM)?)?;
        for index in 0..layer_count {
            let storage = layer_storage(index);
            let stream = |name: &str| file.read_stream(&format!("{}/{}", storage, name));
            pattern.layers.push(read_layer(
                stream(BLOCKS_STREAM)?,
                stream(STITCHES_STREAM)?,
                stream(DIMENSIONS_STREAM)?,
            )?);
        }
        pattern.validate()?;
        tracing::debug!(streams = file.list_streams().len(), layers = layer_count, "read ECF streams");
        Ok(pattern)
    }

    fn save(
        &self,
        pattern: &Pattern,
        config: &IoConfiguration,
        _notifications: &mut NotificationCollection,
    ) -> Result<Vec<u8>> {
        pattern.validate()?;
        let mut file = CompoundFile::create(config.container)?;
        file.write_stream(HEADER_STREAM, &header_bytes(pattern)?)?;
        file.write_stream(THREADS_STREAM, &threads_bytes(&pattern.threads)?)?;
        for (index, layer) in pattern.layers.iter().enumerate() {
            let storage = layer_storage(index);
            let (blocks, stitches) = layer_bytes(layer)?;
            let mut dimensions = Vec::new();
            dimensions.write_u32::<LittleEndian>(layer.dimensions.len() as u32)?;
            for dimension in &layer.dimensions {
                put_dimension(&mut dimensions, dimension)?;
            }
            file.write_stream(&format!("{}/{}", storage, BLOCKS_STREAM), &blocks)?;
            file.write_stream(&format!("{}/{}", storage, STITCHES_STREAM), &stitches)?;
            file.write_stream(&format!("{}/{}", storage, DIMENSIONS_STREAM), &dimensions)?;
        }
        file.serialize()
    }
}
