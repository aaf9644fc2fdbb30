//! Font registry: the PDF base-14 faces whose metrics are compiled in.
//!
//! Placement needs the width of a string before drawing it (centering,
//! right alignment, signature autofit), so a face is only usable if its
//! advance widths are known. Widths come from the Adobe AFM files, in
//! 1/1000 em, for the printable ASCII range. Oblique faces share the
//! widths of their upright counterpart; Courier is monospaced.
//!
//! Text is written with `WinAnsiEncoding`. Characters outside it are
//! drawn (and measured) as `?`.

use std::iter;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontFace {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

const ALL_FACES: [FontFace; 10] = [
    FontFace::Helvetica,
    FontFace::HelveticaBold,
    FontFace::HelveticaOblique,
    FontFace::HelveticaBoldOblique,
    FontFace::TimesRoman,
    FontFace::TimesBold,
    FontFace::Courier,
    FontFace::CourierBold,
    FontFace::CourierOblique,
    FontFace::CourierBoldOblique,
];

impl FontFace {
    /// Look a face up by its PostScript name (case-insensitive).
    pub fn from_name(name: &str) -> Option<FontFace> {
        let name = name.trim();
        ALL_FACES
            .iter()
            .copied()
            .find(|f| f.base_font().eq_ignore_ascii_case(name))
    }

    /// PostScript name written as `/BaseFont`.
    pub fn base_font(self) -> &'static str {
        match self {
            FontFace::Helvetica => "Helvetica",
            FontFace::HelveticaBold => "Helvetica-Bold",
            FontFace::HelveticaOblique => "Helvetica-Oblique",
            FontFace::HelveticaBoldOblique => "Helvetica-BoldOblique",
            FontFace::TimesRoman => "Times-Roman",
            FontFace::TimesBold => "Times-Bold",
            FontFace::Courier => "Courier",
            FontFace::CourierBold => "Courier-Bold",
            FontFace::CourierOblique => "Courier-Oblique",
            FontFace::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    fn widths(self) -> Widths {
        match self {
            FontFace::Helvetica | FontFace::HelveticaOblique => Widths::Table(&HELVETICA),
            FontFace::HelveticaBold | FontFace::HelveticaBoldOblique => {
                Widths::Table(&HELVETICA_BOLD)
            }
            FontFace::TimesRoman => Widths::Table(&TIMES_ROMAN),
            FontFace::TimesBold => Widths::Table(&TIMES_BOLD),
            FontFace::Courier
            | FontFace::CourierBold
            | FontFace::CourierOblique
            | FontFace::CourierBoldOblique => Widths::Fixed(600),
        }
    }

    /// Advance width of one character in 1/1000 em.
    pub fn char_width(self, c: char) -> u16 {
        let widths = self.widths();
        if is_printable_ascii(c) {
            return widths.ascii(c);
        }
        if encode_char(c) == b'?' {
            return widths.ascii('?');
        }
        // Encodable non-ASCII (á, Ñ, ü, …): measure as the base letter.
        match iter::once(c).nfd().next() {
            Some(base) if is_printable_ascii(base) => widths.ascii(base),
            _ => widths.ascii('n'),
        }
    }

    /// Width of `text` in points at `size` points.
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| u32::from(self.char_width(c))).sum();
        units as f32 * size / 1000.0
    }
}

/// Pick a face by name, falling back to `default` when the name is absent
/// or not in the registry.
pub fn resolve_font(name: Option<&str>, default: FontFace) -> FontFace {
    match name {
        None => default,
        Some(n) => FontFace::from_name(n).unwrap_or_else(|| {
            log::debug!("unknown font '{n}', using {}", default.base_font());
            default
        }),
    }
}

enum Widths {
    Table(&'static [u16; 95]),
    Fixed(u16),
}

impl Widths {
    fn ascii(&self, c: char) -> u16 {
        match self {
            Widths::Table(table) => table[(c as usize) - 32],
            Widths::Fixed(w) => *w,
        }
    }
}

fn is_printable_ascii(c: char) -> bool {
    (' '..='~').contains(&c)
}

/// Encode text as WinAnsi bytes. Unmappable characters become `?`,
/// control characters become spaces.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(encode_char).collect()
}

fn encode_char(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        c if c.is_control() => b' ',
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => b'?',
    }
}

// Advance widths for U+0020..=U+007E.

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    //  ' '  !    "    #    $    %    &    '    (    )    *    +    ,    -    .    /
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    //  0    1    2    3    4    5    6    7    8    9    :    ;    <    =    >    ?
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    //  @    A    B    C    D    E    F    G    H    I    J    K    L    M    N    O
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    //  P    Q    R    S    T    U    V    W    X    Y    Z    [    \    ]    ^    _
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    //  `    a    b    c    d    e    f    g    h    i    j    k    l    m    n    o
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    //  p    q    r    s    t    u    v    w    x    y    z    {    |    }    ~
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];
