//! Rendering of current traces
//!
//! Every measurement window leaves a plot of its samples behind, which is
//! what gets looked at first when a current assertion starts failing. The
//! plots are purely diagnostic; callers log render failures and move on
//! instead of failing a test over them.


use std::path::Path;

use plotters::prelude::*;


/// Size of the rendered plot, in pixels
const PLOT_SIZE: (u32, u32) = (1200, 600);


/// Render a current trace into an SVG file
///
/// The samples are plotted in arrival order against their index; there is
/// no timebase in the sample stream to plot against.
pub fn render_trace(samples: &[f64], path: &Path) -> Result<(), PlotError> {
    render_trace_inner(samples, path)
        .map_err(|err| PlotError(err))
}

fn render_trace_inner(samples: &[f64], path: &Path) -> Result<(), String> {
    if samples.is_empty() {
        return Ok(());
    }

    let mut lower = f64::INFINITY;
    let mut upper = f64::NEG_INFINITY;
    for &sample in samples {
        lower = lower.min(sample);
        upper = upper.max(sample);
    }

    // A flat trace still needs a non-empty value range.
    let margin = ((upper - lower) * 0.05).max(1.);
    let lower  = lower - margin;
    let upper  = upper + margin;

    let root = SVGBackend::new(path, PLOT_SIZE)
        .into_drawing_area();
    root.fill(&WHITE)
        .map_err(|err| err.to_string())?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0. ..samples.len() as f64, lower..upper)
        .map_err(|err| err.to_string())?;

    chart.configure_mesh()
        .x_desc("Sample")
        .y_desc("Current (uA)")
        .draw()
        .map_err(|err| err.to_string())?;

    chart.draw_series(LineSeries::new(
        samples.iter()
            .enumerate()
            .map(|(index, &sample)| (index as f64, sample)),
        &BLUE,
    ))
    .map_err(|err| err.to_string())?;

    root.present()
        .map_err(|err| err.to_string())?;

    Ok(())
}


/// Error rendering a current trace
///
/// The rendering backend's errors are generic over the backend, so only
/// their message is kept.
#[derive(Debug)]
pub struct PlotError(pub String);
