use font8x8::{UnicodeFonts, BASIC_FONTS, BLOCK_FONTS, BOX_FONTS, LATIN_FONTS};
use image::{Rgb, RgbImage};
use ratatui::{buffer::Buffer, style::Color};

/// Pixels per terminal cell. Glyph rows are doubled to keep the usual
/// tall cell aspect.
pub const CELL_WIDTH: u32 = 8;
pub const CELL_HEIGHT: u32 = 16;

const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Paints a rendered buffer onto a white canvas, one glyph per cell.
pub fn rasterize(buf: &Buffer) -> RgbImage {
    let area = buf.area;
    let mut image = RgbImage::from_pixel(
        u32::from(area.width) * CELL_WIDTH,
        u32::from(area.height) * CELL_HEIGHT,
        PAPER,
    );

    for y in 0..area.height {
        for x in 0..area.width {
            let (symbol, fg, bg) = cell_at(buf, area.x + x, area.y + y);
            let fg = color_to_rgb(fg).unwrap_or(INK);
            let bg = color_to_rgb(bg).unwrap_or(PAPER);
            let rows = symbol.chars().next().map(glyph).unwrap_or([0; 8]);
            paint_cell(&mut image, u32::from(x), u32::from(y), &rows, fg, bg);
        }
    }
    image
}

#[allow(deprecated)]
fn cell_at(buf: &Buffer, x: u16, y: u16) -> (&str, Color, Color) {
    let cell = buf.get(x, y);
    (cell.symbol.as_str(), cell.fg, cell.bg)
}

fn paint_cell(image: &mut RgbImage, col: u32, row: u32, rows: &[u8; 8], fg: Rgb<u8>, bg: Rgb<u8>) {
    let left = col * CELL_WIDTH;
    let top = row * CELL_HEIGHT;
    let y_scale = CELL_HEIGHT / 8;

    for py in 0..CELL_HEIGHT {
        let bits = rows[(py / y_scale) as usize];
        for px in 0..CELL_WIDTH {
            // bit 0 is the leftmost pixel
            let on = bits & (1 << px) != 0;
            image.put_pixel(left + px, top + py, if on { fg } else { bg });
        }
    }
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| BOX_FONTS.get(c))
        .or_else(|| BLOCK_FONTS.get(c))
        .or_else(|| LATIN_FONTS.get(c))
        .unwrap_or([0; 8])
}

/// Palette colour of a cell. `None` for `Reset`, which falls back to the
/// canvas defaults.
pub fn color_to_rgb(color: Color) -> Option<Rgb<u8>> {
    let rgb = match color {
        Color::Reset => return None,
        Color::Black => [0, 0, 0],
        Color::Red => [205, 49, 49],
        Color::Green => [13, 188, 121],
        Color::Yellow => [229, 229, 16],
        Color::Blue => [36, 114, 200],
        Color::Magenta => [188, 63, 188],
        Color::Cyan => [17, 168, 205],
        Color::Gray => [204, 204, 204],
        Color::DarkGray => [118, 118, 118],
        Color::LightRed => [241, 76, 76],
        Color::LightGreen => [35, 209, 139],
        Color::LightYellow => [245, 245, 67],
        Color::LightBlue => [59, 142, 234],
        Color::LightMagenta => [214, 112, 214],
        Color::LightCyan => [41, 184, 219],
        Color::White => [255, 255, 255],
        Color::Rgb(r, g, b) => [r, g, b],
        Color::Indexed(i) => [i, i, i],
    };
    Some(Rgb(rgb))
}
