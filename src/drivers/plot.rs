use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;
use crate::drivers::error::RasterError;
use crate::types::RenderFrame;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    /// Height of one channel strip.
    pub strip_height: u32,
    pub background: RGBColor,
    pub spike: RGBColor,
    pub text: RGBColor,
    /// Draw channel ids, the span caption and legends. Needs a system font.
    pub labels: bool,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            strip_height: 80,
            background: RGBColor(10, 10, 10),
            spike: WHITE,
            text: RGBColor(180, 180, 180),
            labels: true,
        }
    }
}
/// Renders one strip per channel: a vertical mark per spike, a solid bar for a
/// saturated channel, and the legend text when present.
pub fn render_raster_png(frame: &RenderFrame, style: PlotStyle) -> Result<Vec<u8>, RasterError> {
    if frame.channels.is_empty() {
        return Err(RasterError::Plot("raster frame has no channels".into()));
    }
    let too_large = || RasterError::Plot("raster image too large".into());
    let height = u32::try_from(frame.channels.len())
        .ok()
        .and_then(|n| n.checked_mul(style.strip_height))
        .ok_or_else(too_large)?;
    let len = (style.width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(too_large)?;
    let mut buffer = vec![0u8; len];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let strips = root.split_evenly((frame.channels.len(), 1));
        let width = frame.window_width as f32;
        let last = frame.channels.len() - 1;
        for (idx, (area, channel)) in strips.iter().zip(&frame.channels).enumerate() {
            let left = if style.labels { 40 } else { 0 };
            let bottom = if style.labels && idx == last { 20 } else { 0 };
            let mut chart = ChartBuilder::on(area)
                .margin(4)
                .set_label_area_size(LabelAreaPosition::Left, left)
                .set_label_area_size(LabelAreaPosition::Bottom, bottom)
                .build_cartesian_2d(0f32..width, 0f32..1.1f32)?;
            if style.labels {
                let mut mesh = chart.configure_mesh();
                mesh.disable_mesh()
                    .x_labels(0)
                    .y_labels(0)
                    .axis_style(style.text)
                    .y_desc(channel.id.to_string())
                    .label_style(("sans-serif", 14).into_font().color(&style.text));
                if idx == last {
                    mesh.x_desc(frame.span_label.as_str());
                }
                mesh.draw()?;
            }
            if channel.saturated {
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(0.0, 0.2), (width, 0.8)],
                    style.spike.filled(),
                )))?;
            } else {
                chart.draw_series(
                    channel
                        .spikes
                        .iter()
                        .map(|&x| PathElement::new(vec![(x, 0.0), (x, 1.0)], style.spike)),
                )?;
            }
            if let Some(legend) = channel.legend.as_ref().filter(|_| style.labels) {
                chart.draw_series(std::iter::once(Text::new(
                    legend.clone(),
                    (width * 0.01, 1.05),
                    ("sans-serif", 14).into_font().color(&style.text),
                )))?;
            }
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RasterError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| RasterError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
