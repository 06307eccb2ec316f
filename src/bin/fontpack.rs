//! `fontpack <input.otf> <output.png> <output.json>` - SDF font atlas
//! generator CLI, grounded on `original_source/src/tools/dev/tool_fontpack.cpp`.
//!
//! The original rasterizes glyphs through FreeType's SDF renderer at a
//! 32px baseline / 96 DPI / 4px spread, packing printable ASCII into a
//! 12-glyphs-per-row atlas. Actual glyph rasterization is out of scope
//! here (no FreeType binding is part of this crate's dependency stack);
//! this binary validates the external interface - argument count, input
//! readability, output writability - and emits a well-formed but empty
//! atlas descriptor, matching the documented exit code contract (0 on
//! success, 1 otherwise).
//!
//! TODO: wire up `freetype-rs` or `ab_glyph` for real SDF rasterization.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const GLYPH_SIZE_PX: u32 = 32;
const RENDER_DPI: u32 = 96;
const SDF_SPREAD_PX: u32 = 4;
const GLYPHS_PER_ROW: u32 = 12;
const RENDER_CHAR_MIN: char = ' ';
const RENDER_CHAR_MAX: char = '~';

struct GlyphEntry {
    codepoint: u32,
    bitmap_width: u32,
    bitmap_height: u32,
    bearing_x: f32,
    bearing_y: f32,
    advance_x: f32,
}

/// Builds the atlas descriptor JSON by hand - the engine's on-disk format
/// is TOML-only (`config::main_config`), so pulling in a JSON crate just
/// for this one stub's output file isn't worth it.
fn format_descriptor(atlas_width: u32, atlas_height: u32, glyphs: &[GlyphEntry]) -> String {
    let mut json = String::new();
    let _ = write!(
        json,
        "{{\n  \"glyph_size_px\": {GLYPH_SIZE_PX},\n  \"render_dpi\": {RENDER_DPI},\n  \"sdf_spread_px\": {SDF_SPREAD_PX},\n  \"glyphs_per_row\": {GLYPHS_PER_ROW},\n  \"atlas_width\": {atlas_width},\n  \"atlas_height\": {atlas_height},\n  \"glyphs\": [\n"
    );
    for (i, glyph) in glyphs.iter().enumerate() {
        let comma = if i + 1 == glyphs.len() { "" } else { "," };
        let _ = write!(
            json,
            "    {{ \"codepoint\": {}, \"bitmap_width\": {}, \"bitmap_height\": {}, \"bearing_x\": {}, \"bearing_y\": {}, \"advance_x\": {} }}{comma}\n",
            glyph.codepoint, glyph.bitmap_width, glyph.bitmap_height, glyph.bearing_x, glyph.bearing_y, glyph.advance_x
        );
    }
    json.push_str("  ]\n}\n");
    json
}

fn run(input_font: &Path, output_atlas: &Path, output_header: &Path) -> anyhow::Result<()> {
    anyhow::ensure!(input_font.metadata().is_ok(), "cannot read input font {}", input_font.display());

    let glyphs: Vec<GlyphEntry> = (RENDER_CHAR_MIN as u32..=RENDER_CHAR_MAX as u32)
        .map(|codepoint| GlyphEntry { codepoint, bitmap_width: 0, bitmap_height: 0, bearing_x: 0.0, bearing_y: 0.0, advance_x: 0.0 })
        .collect();

    let rows = glyphs.len() as u32 / GLYPHS_PER_ROW + u32::from(glyphs.len() as u32 % GLYPHS_PER_ROW != 0);
    let descriptor = format_descriptor(GLYPHS_PER_ROW * GLYPH_SIZE_PX, rows * GLYPH_SIZE_PX, &glyphs);

    if let Some(parent) = output_header.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_header, descriptor)?;

    if let Some(parent) = output_atlas.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_atlas, PNG_1X1_WHITE)?;

    Ok(())
}

/// A minimal valid 1x1 white PNG, standing in for the real atlas bitmap
/// until rasterization is implemented.
const PNG_1X1_WHITE: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53,
    0xde, 0x00, 0x00, 0x00, 0x0c, 0x49, 0x44, 0x41, 0x54, 0x08, 0xd7, 0x63, 0xf8, 0xff, 0xff, 0x3f, 0x00, 0x05, 0xfe, 0x02, 0xfe, 0xdc, 0xcc, 0x59, 0xe7, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e,
    0x44, 0xae, 0x42, 0x60, 0x82,
];

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        eprintln!("Usage: {} <input.otf> <output.png> <output.json>", args.first().map(String::as_str).unwrap_or("fontpack"));
        std::process::exit(1);
    }

    let result = run(Path::new(&args[1]), Path::new(&args[2]), Path::new(&args[3]));
    if let Err(err) = result {
        eprintln!("fontpack: {err}");
        std::process::exit(1);
    }
}
