use std::collections::HashMap;
use std::io::Cursor;

use image::ImageReader;

pub const MAX_COLORS: usize = 10;
pub const FALLBACK_COLORS: [&str; 2] = ["#000000", "#ffffff"];

const SAMPLE_SIZE: u32 = 64;
const BUCKET_SHIFT: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: String,
}

/// Reads dimensions and format from the header without decoding pixels.
pub fn read_info(bytes: &[u8]) -> Result<ImageInfo, String> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| err.to_string())?;
    let format = reader
        .format()
        .map(|format| format!("{format:?}").to_ascii_lowercase())
        .ok_or_else(|| "unrecognised image format".to_string())?;
    let (width, height) = reader.into_dimensions().map_err(|err| err.to_string())?;

    Ok(ImageInfo {
        width,
        height,
        format,
    })
}

/// Most frequent colors as `#rrggbb`, after downsampling and bucketing.
pub fn dominant_colors(bytes: &[u8], max: usize) -> Result<Vec<String>, String> {
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| err.to_string())?
        .decode()
        .map_err(|err| err.to_string())?;

    let sample = if image.width() > SAMPLE_SIZE || image.height() > SAMPLE_SIZE {
        image.thumbnail(SAMPLE_SIZE, SAMPLE_SIZE)
    } else {
        image
    }
    .to_rgb8();

    // bucket -> (pixel count, channel sums)
    let mut buckets: HashMap<[u8; 3], (u64, [u64; 3])> = HashMap::new();
    for pixel in sample.pixels() {
        let [r, g, b] = pixel.0;
        let key = [r >> BUCKET_SHIFT, g >> BUCKET_SHIFT, b >> BUCKET_SHIFT];
        let entry = buckets.entry(key).or_insert((0, [0; 3]));
        entry.0 += 1;
        entry.1[0] += u64::from(r);
        entry.1[1] += u64::from(g);
        entry.1[2] += u64::from(b);
    }

    if buckets.is_empty() {
        return Err("image has no pixels".into());
    }

    let mut ranked: Vec<([u8; 3], (u64, [u64; 3]))> = buckets.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(&b.0)));

    Ok(ranked
        .into_iter()
        .take(max)
        .map(|(_, (count, sums))| {
            format!(
                "#{:02x}{:02x}{:02x}",
                sums[0] / count,
                sums[1] / count,
                sums[2] / count
            )
        })
        .collect())
}
