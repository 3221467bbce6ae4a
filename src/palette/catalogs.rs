//! Built-in manufacturer thread tables.
//!
//! Entry order is significant: index-based formats (JEF, HUS) store a
//! position in these tables, and nearest-color ties go to the earlier entry.

/// (code, name, r, g, b)
pub(super) type RawEntry = (&'static str, &'static str, u8, u8, u8);

pub(super) const GENERIC: &[RawEntry] = &[
    ("1", "Black", 0, 0, 0),
    ("2", "Blue", 0, 0, 255),
    ("3", "Red", 255, 0, 0),
    ("4", "Green", 0, 128, 0),
    ("5", "Yellow", 255, 255, 0),
    ("6", "Magenta", 255, 0, 255),
    ("7", "Cyan", 0, 255, 255),
    ("8", "Orange", 255, 165, 0),
    ("9", "Purple", 128, 0, 128),
    ("10", "Brown", 139, 69, 19),
    ("11", "Gray", 128, 128, 128),
    ("12", "Pink", 255, 192, 203),
    ("13", "Navy", 0, 0, 128),
    ("14", "Dark Green", 0, 100, 0),
    ("15", "Gold", 255, 215, 0),
    ("16", "Silver", 192, 192, 192),
    ("17", "Maroon", 128, 0, 0),
    ("18", "Teal", 0, 128, 128),
    ("19", "Lime", 0, 255, 0),
    ("20", "White", 255, 255, 255),
];

/// Janome thread table, in JEF color index order starting at index 1
pub(super) const JANOME: &[RawEntry] = &[
    ("002", "Black", 0, 0, 0),
    ("001", "White", 255, 255, 255),
    ("204", "Yellow", 255, 255, 23),
    ("203", "Orange", 255, 102, 0),
    ("219", "Olive Green", 47, 89, 51),
    ("226", "Green", 35, 115, 54),
    ("217", "Sky", 101, 194, 200),
    ("208", "Purple", 171, 90, 150),
    ("201", "Pink", 246, 105, 160),
    ("225", "Red", 255, 0, 0),
    ("214", "Brown", 177, 112, 78),
    ("207", "Blue", 11, 47, 132),
    ("003", "Gold", 228, 195, 93),
    ("205", "Dark Brown", 72, 26, 5),
    ("209", "Pale Violet", 172, 156, 199),
    ("210", "Pale Yellow", 252, 242, 148),
    ("211", "Pale Pink", 249, 153, 183),
    ("212", "Peach", 250, 179, 129),
    ("213", "Beige", 201, 164, 128),
    ("215", "Wine Red", 151, 5, 51),
    ("216", "Pale Sky", 160, 184, 204),
    ("218", "Yellow Green", 127, 194, 28),
    ("220", "Silver Gray", 229, 229, 229),
    ("221", "Gray", 136, 155, 155),
    ("227", "Pale Aqua", 152, 214, 189),
    ("228", "Baby Blue", 178, 225, 227),
    ("229", "Powder Blue", 54, 139, 160),
    ("230", "Bright Blue", 79, 131, 171),
    ("231", "Slate Blue", 56, 106, 145),
    ("232", "Navy Blue", 7, 22, 80),
];

/// Brother PEC thread table
pub(super) const BROTHER: &[RawEntry] = &[
    ("007", "Prussian Blue", 26, 10, 148),
    ("405", "Blue", 15, 117, 255),
    ("534", "Teal Green", 0, 147, 76),
    ("070", "Corn Flower Blue", 186, 189, 254),
    ("800", "Red", 236, 0, 0),
    ("000", "Reddish Brown", 228, 153, 90),
    ("620", "Magenta", 204, 72, 171),
    ("810", "Light Lilac", 253, 196, 250),
    ("612", "Lilac", 221, 132, 205),
    ("502", "Mint Green", 107, 211, 138),
    ("214", "Deep Gold", 228, 169, 69),
    ("208", "Orange", 255, 189, 66),
    ("205", "Yellow", 255, 230, 0),
    ("513", "Lime Green", 108, 217, 0),
    ("328", "Brass", 193, 169, 65),
    ("005", "Silver", 181, 173, 151),
    ("337", "Russet Brown", 186, 156, 95),
    ("010", "Cream Brown", 250, 245, 158),
    ("704", "Pewter", 128, 128, 128),
    ("900", "Black", 0, 0, 0),
    ("406", "Ultramarine", 0, 28, 223),
    ("869", "Royal Purple", 223, 0, 184),
    ("707", "Dark Gray", 98, 98, 98),
    ("058", "Dark Brown", 105, 38, 13),
    ("086", "Deep Rose", 255, 0, 96),
    ("323", "Light Brown", 191, 130, 0),
    ("079", "Salmon Pink", 243, 145, 120),
    ("030", "Vermilion", 255, 104, 5),
    ("001", "White", 240, 240, 240),
    ("613", "Violet", 200, 50, 205),
];

/// Husqvarna Viking HUS color table, in HUS color index order starting at 0
pub(super) const HUSQVARNA_VIKING: &[RawEntry] = &[
    ("00", "Black", 0, 0, 0),
    ("01", "Blue", 0, 0, 255),
    ("02", "Light Green", 0, 255, 0),
    ("03", "Red", 255, 0, 0),
    ("04", "Purple", 255, 0, 255),
    ("05", "Yellow", 255, 255, 0),
    ("06", "Gray", 127, 127, 127),
    ("07", "Light Blue", 51, 154, 255),
    ("08", "Green", 51, 204, 102),
    ("09", "Orange", 255, 127, 0),
    ("10", "Pink", 255, 160, 180),
    ("11", "Brown", 153, 75, 0),
    ("12", "White", 255, 255, 255),
    ("13", "Dark Blue", 0, 0, 127),
    ("14", "Dark Green", 0, 127, 0),
    ("15", "Dark Red", 127, 0, 0),
    ("16", "Light Red", 255, 127, 127),
    ("17", "Dark Purple", 127, 0, 127),
    ("18", "Light Purple", 255, 127, 255),
    ("19", "Dark Yellow", 200, 200, 0),
    ("20", "Light Yellow", 255, 255, 153),
    ("21", "Dark Gray", 60, 60, 60),
    ("22", "Light Gray", 192, 192, 192),
    ("23", "Dark Orange", 255, 102, 0),
    ("24", "Light Orange", 255, 204, 102),
    ("25", "Dark Pink", 255, 102, 204),
    ("26", "Light Pink", 255, 204, 255),
    ("27", "Dark Brown", 102, 51, 0),
    ("28", "Light Brown", 255, 204, 153),
];
