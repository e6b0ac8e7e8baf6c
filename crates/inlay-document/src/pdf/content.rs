// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Overlay content — build the content-stream operations that draw one text
// or image insertion on a page.

use inlay_core::{Position, TextInsertion};
use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

use crate::coords::{CoordinateReconciler, Matrix};

/// Line spacing as a multiple of the font size.
pub const LEADING: f32 = 1.2;

/// One of the 14 standard PDF fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardFont {
    pub base_font: &'static str,
    /// Symbolic fonts carry their own built-in encoding.
    pub symbolic: bool,
}

impl StandardFont {
    pub const HELVETICA: Self = Self::text("Helvetica");

    const fn text(base_font: &'static str) -> Self {
        Self {
            base_font,
            symbolic: false,
        }
    }

    const fn symbol(base_font: &'static str) -> Self {
        Self {
            base_font,
            symbolic: true,
        }
    }

    /// Look up a font by short name ("helv", "tibo", ...) or by its full
    /// PostScript name, ignoring case.
    pub fn lookup(name: &str) -> Option<Self> {
        let font = match name.trim().to_ascii_lowercase().as_str() {
            "helv" | "helvetica" => Self::HELVETICA,
            "hebo" | "helvetica-bold" => Self::text("Helvetica-Bold"),
            "heit" | "helvetica-oblique" => Self::text("Helvetica-Oblique"),
            "hebi" | "helvetica-boldoblique" => Self::text("Helvetica-BoldOblique"),
            "tiro" | "times-roman" => Self::text("Times-Roman"),
            "tibo" | "times-bold" => Self::text("Times-Bold"),
            "tiit" | "times-italic" => Self::text("Times-Italic"),
            "tibi" | "times-bolditalic" => Self::text("Times-BoldItalic"),
            "cour" | "courier" => Self::text("Courier"),
            "cobo" | "courier-bold" => Self::text("Courier-Bold"),
            "coit" | "courier-oblique" => Self::text("Courier-Oblique"),
            "cobi" | "courier-boldoblique" => Self::text("Courier-BoldOblique"),
            "symb" | "symbol" => Self::symbol("Symbol"),
            "zadb" | "zapfdingbats" => Self::symbol("ZapfDingbats"),
            _ => return None,
        };
        Some(font)
    }
}

/// Encode `text` as WinAnsi bytes. Characters outside the encoding become
/// `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(c: char) -> u8 {
    match c {
        '\t' => b' ',
        ' '..='~' => c as u8,
        '\u{00A0}'..='\u{00FF}' => c as u32 as u8,
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

/// Split content into lines on `\n`, dropping a trailing `\r` from each.
pub fn lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

fn matrix_operands(m: Matrix) -> Vec<Object> {
    m.to_array().into_iter().map(Object::Real).collect()
}

fn name(resource: &[u8]) -> Object {
    Object::Name(resource.to_vec())
}

/// Operations drawing `text` with its first baseline at `at`. The font must
/// already be registered on the page under `font_resource`.
pub fn text_operations(
    reconciler: &CoordinateReconciler,
    at: Position,
    text: &TextInsertion,
    font_resource: &[u8],
) -> Vec<Operation> {
    let color = text.color;
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("cm", matrix_operands(reconciler.placement_space())),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![name(font_resource), Object::Real(text.font_size)],
        ),
        Operation::new(
            "rg",
            vec![
                Object::Real(color.r),
                Object::Real(color.g),
                Object::Real(color.b),
            ],
        ),
    ];

    let leading = text.font_size * LEADING;
    for (index, line) in lines(&text.content).enumerate() {
        let baseline = Position {
            x: at.x,
            y: at.y + leading * index as f32,
        };
        ops.push(Operation::new(
            "Tm",
            matrix_operands(reconciler.text_matrix(baseline)),
        ));
        if !line.is_empty() {
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
            ));
        }
    }

    ops.push(Operation::new("ET", vec![]));
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Operations painting the image XObject `xobject_resource` over the
/// rectangle `(width, height)` whose top-left corner is `top_left`.
pub fn image_operations(
    reconciler: &CoordinateReconciler,
    top_left: Position,
    width: f32,
    height: f32,
    xobject_resource: &[u8],
) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            matrix_operands(reconciler.image_matrix(top_left, width, height)),
        ),
        Operation::new("Do", vec![name(xobject_resource)]),
        Operation::new("Q", vec![]),
    ]
}
